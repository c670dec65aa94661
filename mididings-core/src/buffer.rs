//! Event buffer: the events produced by one pipeline pass.
//!
//! Units address events by position and report what they did to the buffer
//! as an [`EventRange`]. The caller resumes iteration at `range.end`, which
//! stays valid whether the unit kept, deleted or replaced the event.

use std::ops::{Index, IndexMut, Range};

use mididings_types::MidiEvent;

/// Half-open range of buffer positions `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventRange {
    pub start: usize,
    pub end: usize,
}

impl EventRange {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end);
        Self { start, end }
    }

    /// Empty range anchored at `position`.
    pub fn empty(position: usize) -> Self {
        Self::new(position, position)
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn as_range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Ordered, growable sequence of events being processed in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventBuffer {
    events: Vec<MidiEvent>,
}

impl EventBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn push(&mut self, event: MidiEvent) {
        self.events.push(event);
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn get(&self, position: usize) -> Option<&MidiEvent> {
        self.events.get(position)
    }

    pub fn get_mut(&mut self, position: usize) -> Option<&mut MidiEvent> {
        self.events.get_mut(position)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MidiEvent> {
        self.events.iter()
    }

    pub fn as_slice(&self) -> &[MidiEvent] {
        &self.events
    }

    /// Events covered by `range`.
    pub fn slice(&self, range: EventRange) -> &[MidiEvent] {
        &self.events[range.as_range()]
    }

    pub fn into_vec(self) -> Vec<MidiEvent> {
        self.events
    }

    /// Remove the event at `position`. The returned empty range sits where the
    /// following event now lives (or at the one-past-end sentinel).
    ///
    /// Panics if `position` is out of bounds.
    pub fn delete(&mut self, position: usize) -> EventRange {
        self.events.remove(position);
        EventRange::empty(position)
    }

    /// Replace exactly one event at `position` with `new_events` (0..N).
    /// Returns the range spanning the inserted events.
    ///
    /// Panics if `position` is out of bounds.
    pub fn replace<I>(&mut self, position: usize, new_events: I) -> EventRange
    where
        I: IntoIterator<Item = MidiEvent>,
    {
        let before = self.events.len();
        self.events.splice(position..position + 1, new_events);
        let inserted = self.events.len() + 1 - before;
        EventRange::new(position, position + inserted)
    }

    /// Leave the event at `position` untouched.
    ///
    /// Panics if `position` is out of bounds.
    pub fn keep(&self, position: usize) -> EventRange {
        assert!(
            position < self.events.len(),
            "keep position {} out of bounds (len {})",
            position,
            self.events.len()
        );
        EventRange::new(position, position + 1)
    }
}

impl Index<usize> for EventBuffer {
    type Output = MidiEvent;

    fn index(&self, position: usize) -> &MidiEvent {
        &self.events[position]
    }
}

impl IndexMut<usize> for EventBuffer {
    fn index_mut(&mut self, position: usize) -> &mut MidiEvent {
        &mut self.events[position]
    }
}

impl From<Vec<MidiEvent>> for EventBuffer {
    fn from(events: Vec<MidiEvent>) -> Self {
        Self { events }
    }
}

impl FromIterator<MidiEvent> for EventBuffer {
    fn from_iter<T: IntoIterator<Item = MidiEvent>>(iter: T) -> Self {
        Self {
            events: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a EventBuffer {
    type Item = &'a MidiEvent;
    type IntoIter = std::slice::Iter<'a, MidiEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notes(pitches: &[u8]) -> EventBuffer {
        pitches
            .iter()
            .map(|&p| MidiEvent::note_on(0, 0, p, 100))
            .collect()
    }

    fn pitches(buf: &EventBuffer) -> Vec<u8> {
        buf.iter().filter_map(|e| e.note()).collect()
    }

    #[test]
    fn test_delete_middle() {
        let mut buf = notes(&[60, 61, 62]);
        let range = buf.delete(1);
        assert_eq!(range, EventRange::empty(1));
        assert_eq!(pitches(&buf), vec![60, 62]);
        // Iteration resumes at the event that followed the deleted one
        assert_eq!(buf[range.end].note(), Some(62));
    }

    #[test]
    fn test_delete_last_yields_end_sentinel() {
        let mut buf = notes(&[60, 61]);
        let range = buf.delete(1);
        assert_eq!(range.end, buf.len());
        assert!(range.is_empty());
    }

    #[test]
    fn test_replace_grows() {
        let mut buf = notes(&[60, 61, 62]);
        let range = buf.replace(1, vec![MidiEvent::note_on(0, 0, 70, 1); 3]);
        assert_eq!(range, EventRange::new(1, 4));
        assert_eq!(pitches(&buf), vec![60, 70, 70, 70, 62]);
    }

    #[test]
    fn test_replace_with_nothing_is_delete() {
        let mut buf = notes(&[60, 61, 62]);
        let range = buf.replace(0, Vec::new());
        assert_eq!(range, EventRange::empty(0));
        assert_eq!(pitches(&buf), vec![61, 62]);
    }

    #[test]
    fn test_replace_single_in_place() {
        let mut buf = notes(&[60, 61]);
        let range = buf.replace(1, std::iter::once(MidiEvent::note_on(0, 0, 99, 1)));
        assert_eq!(range.len(), 1);
        assert_eq!(pitches(&buf), vec![60, 99]);
    }

    #[test]
    fn test_keep_is_single_element() {
        let buf = notes(&[60, 61]);
        let range = buf.keep(1);
        assert_eq!(range, EventRange::new(1, 2));
        assert_eq!(buf.slice(range)[0].note(), Some(61));
    }

    #[test]
    #[should_panic(expected = "out of bounds")]
    fn test_keep_out_of_bounds_panics() {
        let buf = notes(&[60]);
        buf.keep(1);
    }
}
