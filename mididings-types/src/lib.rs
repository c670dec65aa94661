//! # mididings-types
//!
//! Plain event data shared by the router core and its front-ends.
//! Nothing in here knows about threads, callbacks or the interpreter lock.

use std::sync::Arc;

mod event_type;

pub use event_type::EventType;

/// Default output port for events that are created from scratch.
pub const DEFAULT_PORT: u32 = 0;

/// Pitch bend range, centred at zero.
pub const PITCHBEND_MIN: i16 = -8192;
pub const PITCHBEND_MAX: i16 = 8191;

/// One MIDI message moving through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct MidiEvent {
    /// Logical port the event arrived on (or will be sent to)
    pub port: u32,
    /// MIDI channel, 0-based (0..=15). Ignored for system messages.
    pub channel: u8,
    /// The typed payload
    pub kind: MidiEventKind,
}

/// Typed payload of a [`MidiEvent`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MidiEventKind {
    NoteOn { note: u8, velocity: u8 },
    NoteOff { note: u8, velocity: u8 },
    Ctrl { param: u8, value: u8 },
    /// Pitch bend value: -8192 (full down) to +8191 (full up), 0 = center
    Pitchbend { value: i16 },
    Aftertouch { value: u8 },
    PolyAftertouch { note: u8, value: u8 },
    Program { program: u8 },
    /// Complete system exclusive message, including the F0/F7 framing bytes.
    /// Reference counted so cloning an event for a deferred call stays cheap.
    SysEx { data: Arc<[u8]> },
    /// Placeholder event that units may produce and the output stage drops
    Dummy,
}

impl MidiEvent {
    pub fn new(port: u32, channel: u8, kind: MidiEventKind) -> Self {
        Self {
            port,
            channel,
            kind,
        }
    }

    pub fn note_on(port: u32, channel: u8, note: u8, velocity: u8) -> Self {
        Self::new(port, channel, MidiEventKind::NoteOn { note, velocity })
    }

    pub fn note_off(port: u32, channel: u8, note: u8) -> Self {
        Self::new(port, channel, MidiEventKind::NoteOff { note, velocity: 0 })
    }

    pub fn ctrl(port: u32, channel: u8, param: u8, value: u8) -> Self {
        Self::new(port, channel, MidiEventKind::Ctrl { param, value })
    }

    pub fn pitchbend(port: u32, channel: u8, value: i16) -> Self {
        let value = value.clamp(PITCHBEND_MIN, PITCHBEND_MAX);
        Self::new(port, channel, MidiEventKind::Pitchbend { value })
    }

    pub fn program(port: u32, channel: u8, program: u8) -> Self {
        Self::new(port, channel, MidiEventKind::Program { program })
    }

    pub fn sysex(port: u32, data: &[u8]) -> Self {
        Self::new(port, 0, MidiEventKind::SysEx { data: Arc::from(data) })
    }

    /// The bare type tag of this event.
    pub fn event_type(&self) -> EventType {
        self.kind.event_type()
    }

    /// Note number for note and poly-aftertouch events.
    pub fn note(&self) -> Option<u8> {
        match self.kind {
            MidiEventKind::NoteOn { note, .. }
            | MidiEventKind::NoteOff { note, .. }
            | MidiEventKind::PolyAftertouch { note, .. } => Some(note),
            _ => None,
        }
    }

    /// Shift the note number of note events, saturating at the MIDI range.
    /// Other event kinds are left untouched.
    pub fn transpose(&mut self, offset: i16) {
        if let MidiEventKind::NoteOn { note, .. } | MidiEventKind::NoteOff { note, .. } =
            &mut self.kind
        {
            *note = (*note as i16).saturating_add(offset).clamp(0, 127) as u8;
        }
    }
}

impl MidiEventKind {
    pub fn event_type(&self) -> EventType {
        match self {
            MidiEventKind::NoteOn { .. } => EventType::NOTEON,
            MidiEventKind::NoteOff { .. } => EventType::NOTEOFF,
            MidiEventKind::Ctrl { .. } => EventType::CTRL,
            MidiEventKind::Pitchbend { .. } => EventType::PITCHBEND,
            MidiEventKind::Aftertouch { .. } => EventType::AFTERTOUCH,
            MidiEventKind::PolyAftertouch { .. } => EventType::POLY_AFTERTOUCH,
            MidiEventKind::Program { .. } => EventType::PROGRAM,
            MidiEventKind::SysEx { .. } => EventType::SYSEX,
            MidiEventKind::Dummy => EventType::DUMMY,
        }
    }
}

impl std::fmt::Display for MidiEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            MidiEventKind::NoteOn { note, velocity } => write!(
                f,
                "[{}, {}] note on: {} {}",
                self.port, self.channel, note, velocity
            ),
            MidiEventKind::NoteOff { note, velocity } => write!(
                f,
                "[{}, {}] note off: {} {}",
                self.port, self.channel, note, velocity
            ),
            MidiEventKind::Ctrl { param, value } => write!(
                f,
                "[{}, {}] control change: {} {}",
                self.port, self.channel, param, value
            ),
            MidiEventKind::Pitchbend { value } => {
                write!(f, "[{}, {}] pitch bend: {}", self.port, self.channel, value)
            }
            MidiEventKind::Aftertouch { value } => {
                write!(f, "[{}, {}] aftertouch: {}", self.port, self.channel, value)
            }
            MidiEventKind::PolyAftertouch { note, value } => write!(
                f,
                "[{}, {}] poly aftertouch: {} {}",
                self.port, self.channel, note, value
            ),
            MidiEventKind::Program { program } => write!(
                f,
                "[{}, {}] program change: {}",
                self.port, self.channel, program
            ),
            MidiEventKind::SysEx { data } => {
                write!(f, "[{}] sysex: {} bytes", self.port, data.len())
            }
            MidiEventKind::Dummy => write!(f, "[{}] dummy", self.port),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_matches_kind() {
        assert_eq!(MidiEvent::note_on(0, 0, 60, 100).event_type(), EventType::NOTEON);
        assert_eq!(MidiEvent::ctrl(0, 0, 7, 64).event_type(), EventType::CTRL);
        assert_eq!(MidiEvent::sysex(0, &[0xF0, 0xF7]).event_type(), EventType::SYSEX);
    }

    #[test]
    fn test_transpose_saturates() {
        let mut ev = MidiEvent::note_on(0, 0, 120, 100);
        ev.transpose(12);
        assert_eq!(ev.note(), Some(127));
        ev.transpose(-200);
        assert_eq!(ev.note(), Some(0));
    }

    #[test]
    fn test_transpose_extreme_offsets() {
        let mut ev = MidiEvent::note_on(0, 0, 60, 100);
        ev.transpose(i16::MAX);
        assert_eq!(ev.note(), Some(127));
        ev.transpose(i16::MIN);
        assert_eq!(ev.note(), Some(0));
    }

    #[test]
    fn test_transpose_ignores_other_kinds() {
        let mut ev = MidiEvent::ctrl(0, 0, 1, 64);
        ev.transpose(5);
        assert_eq!(ev, MidiEvent::ctrl(0, 0, 1, 64));
    }

    #[test]
    fn test_pitchbend_clamped() {
        let ev = MidiEvent::pitchbend(0, 0, i16::MAX);
        assert_eq!(ev.kind, MidiEventKind::Pitchbend { value: PITCHBEND_MAX });
    }

    #[test]
    fn test_sysex_clone_shares_payload() {
        let ev = MidiEvent::sysex(1, &[0xF0, 0x7E, 0xF7]);
        let copy = ev.clone();
        match (&ev.kind, &copy.kind) {
            (MidiEventKind::SysEx { data: a }, MidiEventKind::SysEx { data: b }) => {
                assert!(Arc::ptr_eq(a, b))
            }
            _ => panic!("Expected SysEx"),
        }
    }

    #[test]
    fn test_serde_tagged_json() {
        let ev = MidiEvent::note_on(2, 3, 60, 90);
        let json = serde_json::to_string(&ev).unwrap();
        assert!(json.contains("\"type\":\"note_on\""));
        let back: MidiEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ev);
    }

    #[test]
    fn test_display() {
        let ev = MidiEvent::program(1, 0, 5);
        assert_eq!(ev.to_string(), "[1, 0] program change: 5");
    }
}
