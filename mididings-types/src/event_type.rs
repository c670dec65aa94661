/// Event type tag. Each type occupies one bit so tags combine into masks
/// (e.g. `EventType::NOTE` matches both note-on and note-off).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct EventType(u32);

impl EventType {
    pub const NONE: EventType = EventType(0);
    pub const NOTEON: EventType = EventType(1 << 0);
    pub const NOTEOFF: EventType = EventType(1 << 1);
    pub const CTRL: EventType = EventType(1 << 2);
    pub const PITCHBEND: EventType = EventType(1 << 3);
    pub const AFTERTOUCH: EventType = EventType(1 << 4);
    pub const POLY_AFTERTOUCH: EventType = EventType(1 << 5);
    pub const PROGRAM: EventType = EventType(1 << 6);
    pub const SYSEX: EventType = EventType(1 << 7);
    pub const DUMMY: EventType = EventType(1 << 29);

    pub const NOTE: EventType = EventType(Self::NOTEON.0 | Self::NOTEOFF.0);
    pub const ANY: EventType = EventType(!Self::DUMMY.0);

    pub fn bits(self) -> u32 {
        self.0
    }

    /// True if any bit of `other` is set in `self`.
    pub fn intersects(self, other: EventType) -> bool {
        self.0 & other.0 != 0
    }
}

impl std::ops::BitOr for EventType {
    type Output = EventType;

    fn bitor(self, rhs: EventType) -> EventType {
        EventType(self.0 | rhs.0)
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match *self {
            EventType::NONE => "none",
            EventType::NOTEON => "noteon",
            EventType::NOTEOFF => "noteoff",
            EventType::CTRL => "ctrl",
            EventType::PITCHBEND => "pitchbend",
            EventType::AFTERTOUCH => "aftertouch",
            EventType::POLY_AFTERTOUCH => "poly_aftertouch",
            EventType::PROGRAM => "program",
            EventType::SYSEX => "sysex",
            EventType::DUMMY => "dummy",
            EventType::NOTE => "note",
            EventType::ANY => "any",
            _ => return write!(f, "{:#x}", self.0),
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_mask() {
        assert!(EventType::NOTE.intersects(EventType::NOTEON));
        assert!(EventType::NOTE.intersects(EventType::NOTEOFF));
        assert!(!EventType::NOTE.intersects(EventType::CTRL));
    }

    #[test]
    fn test_any_excludes_dummy() {
        assert!(EventType::ANY.intersects(EventType::SYSEX));
        assert!(!EventType::ANY.intersects(EventType::DUMMY));
    }

    #[test]
    fn test_display_combined_mask() {
        assert_eq!(EventType::NOTE.to_string(), "note");
        assert_eq!((EventType::CTRL | EventType::PROGRAM).to_string(), "0x44");
    }
}
