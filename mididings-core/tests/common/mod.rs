#![allow(dead_code)]
//! Test harness utilities for mididings-core integration tests.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};
use mididings_core::{Callback, CallbackDispatcher, DispatchConfig, EventBuffer, ScriptResult};
use mididings_types::MidiEvent;

pub type ExecLog = Arc<Mutex<Vec<usize>>>;

pub fn dispatcher() -> CallbackDispatcher {
    CallbackDispatcher::new(DispatchConfig::default()).unwrap()
}

pub fn dispatcher_with_timeout(timeout: Duration) -> CallbackDispatcher {
    CallbackDispatcher::new(DispatchConfig::default().with_shutdown_timeout(timeout)).unwrap()
}

/// Buffer of `n` note-ons with pitches 60, 61, ...
pub fn note_buffer(n: u8) -> EventBuffer {
    (0..n).map(|i| MidiEvent::note_on(0, 0, 60 + i, 100)).collect()
}

/// Callback that appends `index` to `log` when it runs.
pub fn index_callback(log: &ExecLog, index: usize) -> Arc<dyn Callback> {
    let log = Arc::clone(log);
    Arc::new(move |_: &mut MidiEvent| -> ScriptResult {
        log.lock().unwrap().push(index);
        Ok(().into())
    })
}

/// Callback that announces it has started, then blocks until released.
/// Dropping the release sender also unblocks it.
pub fn blocking_callback() -> (Arc<dyn Callback>, Receiver<()>, Sender<()>) {
    let (started_tx, started_rx) = crossbeam_channel::unbounded();
    let (release_tx, release_rx) = crossbeam_channel::unbounded::<()>();
    let cb: Arc<dyn Callback> = Arc::new(move |_: &mut MidiEvent| -> ScriptResult {
        let _ = started_tx.send(());
        let _ = release_rx.recv();
        Ok(().into())
    });
    (cb, started_rx, release_tx)
}

/// Poll `cond` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    cond()
}
