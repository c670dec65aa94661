//! Raw MIDI wire format <-> [`MidiEvent`].

use mididings_types::{MidiEvent, MidiEventKind};

/// Parse one raw MIDI message received on `port`.
///
/// Returns `None` for empty or truncated messages and for system messages
/// other than sysex.
pub fn parse_midi_message(port: u32, data: &[u8]) -> Option<MidiEvent> {
    let (&status, rest) = data.split_first()?;
    let channel = status & 0x0F;
    let message_type = status & 0xF0;

    let kind = match message_type {
        0x80 => MidiEventKind::NoteOff {
            note: *rest.first()?,
            velocity: *rest.get(1)?,
        },
        0x90 => {
            let note = *rest.first()?;
            let velocity = *rest.get(1)?;
            // Note On with velocity 0 is a Note Off
            if velocity == 0 {
                MidiEventKind::NoteOff { note, velocity: 0 }
            } else {
                MidiEventKind::NoteOn { note, velocity }
            }
        }
        0xA0 => MidiEventKind::PolyAftertouch {
            note: *rest.first()?,
            value: *rest.get(1)?,
        },
        0xB0 => MidiEventKind::Ctrl {
            param: *rest.first()?,
            value: *rest.get(1)?,
        },
        0xC0 => MidiEventKind::Program {
            program: *rest.first()?,
        },
        0xD0 => MidiEventKind::Aftertouch {
            value: *rest.first()?,
        },
        0xE0 => {
            let lsb = *rest.first()? as i16;
            let msb = *rest.get(1)? as i16;
            MidiEventKind::Pitchbend {
                value: ((msb << 7) | lsb) - 8192,
            }
        }
        0xF0 if status == 0xF0 => {
            if data.last() != Some(&0xF7) {
                log::debug!(target: "midi", "dropping unterminated sysex ({} bytes)", data.len());
                return None;
            }
            return Some(MidiEvent::sysex(port, data));
        }
        _ => return None,
    };

    Some(MidiEvent::new(port, channel, kind))
}

/// Encode an event as a raw MIDI message. Dummy events encode to nothing.
pub fn encode_midi_event(event: &MidiEvent) -> Vec<u8> {
    let ch = event.channel & 0x0F;
    match &event.kind {
        MidiEventKind::NoteOn { note, velocity } => {
            vec![0x90 | ch, *note & 0x7F, *velocity & 0x7F]
        }
        MidiEventKind::NoteOff { note, velocity } => {
            vec![0x80 | ch, *note & 0x7F, *velocity & 0x7F]
        }
        MidiEventKind::PolyAftertouch { note, value } => {
            vec![0xA0 | ch, *note & 0x7F, *value & 0x7F]
        }
        MidiEventKind::Ctrl { param, value } => vec![0xB0 | ch, *param & 0x7F, *value & 0x7F],
        MidiEventKind::Program { program } => vec![0xC0 | ch, *program & 0x7F],
        MidiEventKind::Aftertouch { value } => vec![0xD0 | ch, *value & 0x7F],
        MidiEventKind::Pitchbend { value } => {
            let raw = (*value as i32 + 8192).clamp(0, 0x3FFF) as u16;
            vec![0xE0 | ch, (raw & 0x7F) as u8, (raw >> 7) as u8]
        }
        MidiEventKind::SysEx { data } => data.to_vec(),
        MidiEventKind::Dummy => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_note_on() {
        let event = parse_midi_message(2, &[0x91, 60, 100]).unwrap();
        assert_eq!(event, MidiEvent::note_on(2, 1, 60, 100));
    }

    #[test]
    fn test_parse_note_on_velocity_zero() {
        let event = parse_midi_message(0, &[0x90, 60, 0]).unwrap();
        assert!(matches!(event.kind, MidiEventKind::NoteOff { note: 60, .. }));
    }

    #[test]
    fn test_parse_pitch_bend() {
        // LSB=0, MSB=64 = 8192 = center
        let event = parse_midi_message(0, &[0xE0, 0x00, 0x40]).unwrap();
        assert_eq!(event.kind, MidiEventKind::Pitchbend { value: 0 });

        let event = parse_midi_message(0, &[0xE0, 0x7F, 0x7F]).unwrap();
        assert_eq!(event.kind, MidiEventKind::Pitchbend { value: 8191 });

        let event = parse_midi_message(0, &[0xE0, 0x00, 0x00]).unwrap();
        assert_eq!(event.kind, MidiEventKind::Pitchbend { value: -8192 });
    }

    #[test]
    fn test_parse_control_change() {
        let event = parse_midi_message(0, &[0xB3, 1, 64]).unwrap();
        assert_eq!(event, MidiEvent::ctrl(0, 3, 1, 64));
    }

    #[test]
    fn test_parse_sysex() {
        let event = parse_midi_message(1, &[0xF0, 0x7E, 0x7F, 0x06, 0x01, 0xF7]).unwrap();
        assert_eq!(event, MidiEvent::sysex(1, &[0xF0, 0x7E, 0x7F, 0x06, 0x01, 0xF7]));
        assert!(parse_midi_message(1, &[0xF0, 0x7E]).is_none());
    }

    #[test]
    fn test_parse_rejects_short_and_unknown() {
        assert!(parse_midi_message(0, &[]).is_none());
        assert!(parse_midi_message(0, &[0x90, 60]).is_none());
        assert!(parse_midi_message(0, &[0xC0]).is_none());
        assert!(parse_midi_message(0, &[0x00]).is_none());
        assert!(parse_midi_message(0, &[0xF8]).is_none());
    }

    #[test]
    fn test_encode_pitchbend_extremes() {
        assert_eq!(encode_midi_event(&MidiEvent::pitchbend(0, 0, -8192)), vec![0xE0, 0, 0]);
        assert_eq!(encode_midi_event(&MidiEvent::pitchbend(0, 2, 8191)), vec![0xE2, 0x7F, 0x7F]);
    }

    #[test]
    fn test_encode_reparses_to_same_event() {
        let event = MidiEvent::new(0, 5, MidiEventKind::PolyAftertouch { note: 40, value: 7 });
        assert_eq!(parse_midi_message(0, &encode_midi_event(&event)), Some(event));
    }

    #[test]
    fn test_encode_dummy_is_empty() {
        assert!(encode_midi_event(&MidiEvent::new(0, 0, MidiEventKind::Dummy)).is_empty());
    }
}
