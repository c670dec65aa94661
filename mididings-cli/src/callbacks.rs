//! Built-in callbacks the command line can wire into the pipeline.

use std::sync::Arc;

use mididings_core::{Callback, ScriptError, ScriptResult};
use mididings_types::{EventType, MidiEvent};

/// Print each event. Meant to run deferred, off the real-time thread.
pub fn monitor(json: bool) -> Arc<dyn Callback> {
    Arc::new(move |ev: &mut MidiEvent| -> ScriptResult {
        if json {
            let line = serde_json::to_string(&*ev).map_err(|e| ScriptError::Conversion {
                expected: "JSON-serializable event".to_string(),
                found: e.to_string(),
            })?;
            println!("monitor: {}", line);
        } else {
            println!("monitor: {}", ev);
        }
        Ok(true.into())
    })
}

/// Shift note events by `semitones`, leaving other events alone.
pub fn transpose(semitones: i16) -> Arc<dyn Callback> {
    Arc::new(move |ev: &mut MidiEvent| -> ScriptResult {
        let mut out = ev.clone();
        out.transpose(semitones);
        Ok(out.into())
    })
}

/// Add a note one octave above every note event.
pub fn octave() -> Arc<dyn Callback> {
    Arc::new(|ev: &mut MidiEvent| -> ScriptResult {
        if !ev.event_type().intersects(EventType::NOTE) {
            return Ok(true.into());
        }
        let mut up = ev.clone();
        up.transpose(12);
        Ok(vec![ev.clone(), up].into())
    })
}
