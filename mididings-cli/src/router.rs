use std::thread;
use std::time::{Duration, Instant};

use mididings_core::units::{process_buffer, Call, CallMode};
use mididings_core::{CallbackDispatcher, EventBuffer, MAX_ASYNC_CALLS};
use mididings_types::MidiEvent;

/// A chain of units run in order over each incoming event.
pub struct Router {
    dispatcher: CallbackDispatcher,
    units: Vec<Call>,
}

impl Router {
    pub fn new(dispatcher: CallbackDispatcher) -> Self {
        Self { dispatcher, units: Vec::new() }
    }

    pub fn push_unit(&mut self, unit: Call) {
        self.units.push(unit);
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// Run one event through every unit, returning what comes out the end.
    ///
    /// Input here is not real-time, so a deferred unit waits for room in the
    /// call queue instead of overflowing it.
    pub fn process(&mut self, event: MidiEvent) -> Vec<MidiEvent> {
        let mut buffer = EventBuffer::from(vec![event]);
        for unit in &self.units {
            if buffer.is_empty() {
                break;
            }
            match unit.mode() {
                CallMode::Immediate => process_buffer(&mut self.dispatcher, &mut buffer, unit),
                CallMode::Deferred { .. } => {
                    let mut position = 0;
                    while position < buffer.len() {
                        self.wait_for_queue_room();
                        position = unit.process(&mut self.dispatcher, &mut buffer, position).end;
                    }
                }
            }
        }
        buffer.into_vec()
    }

    /// Block while the deferred call queue is full. Only this thread pushes,
    /// so once a slot frees up it stays free until the next call.
    fn wait_for_queue_room(&self) {
        if self.dispatcher.pending_calls() < MAX_ASYNC_CALLS {
            return;
        }
        log::debug!(target: "router", "deferred call queue full, waiting for the worker");
        while self.dispatcher.pending_calls() >= MAX_ASYNC_CALLS {
            thread::sleep(Duration::from_millis(1));
        }
    }

    /// Wait up to `timeout` for deferred calls to drain.
    /// Returns `false` if work was still pending when time ran out.
    pub fn settle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            let stats = self.dispatcher.stats();
            if stats.completed_deferred + stats.skipped_requests >= stats.deferred_calls {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    pub fn dispatcher(&self) -> &CallbackDispatcher {
        &self.dispatcher
    }

    pub fn dispatcher_mut(&mut self) -> &mut CallbackDispatcher {
        &mut self.dispatcher
    }
}
