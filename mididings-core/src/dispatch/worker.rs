//! Async worker: the thread that runs deferred callbacks.
//!
//! Sleeps on the call queue while idle, runs one request at a time under the
//! interpreter lock, and exits as soon as the queue is closed, abandoning any
//! requests still queued.

use std::io;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use mididings_types::MidiEvent;

use super::queue::CallQueue;
use crate::interpreter::{self, Callback, ErrorReporter, InterpreterLock};
use crate::telemetry::DispatchStats;

/// A deferred call waiting in the queue.
pub(crate) struct CallRequest {
    /// Owned by the unit that issued the call, not by the request
    pub(crate) callback: Weak<dyn Callback>,
    /// Private copy; the pipeline may have moved on from the original slot
    pub(crate) event: MidiEvent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Waiting on the queue's condition variable
    Idle,
    /// Running queued requests
    Draining,
    /// Shutdown observed; the thread is exiting or gone
    Terminating,
}

impl WorkerState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => WorkerState::Idle,
            1 => WorkerState::Draining,
            _ => WorkerState::Terminating,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            WorkerState::Idle => 0,
            WorkerState::Draining => 1,
            WorkerState::Terminating => 2,
        }
    }
}

/// State shared between the dispatcher and its worker thread.
pub(crate) struct Shared {
    pub(crate) queue: CallQueue<CallRequest>,
    pub(crate) stats: DispatchStats,
    pub(crate) reporter: Arc<dyn ErrorReporter>,
    state: AtomicU8,
}

impl Shared {
    pub(crate) fn new(capacity: usize, reporter: Arc<dyn ErrorReporter>) -> Self {
        Self {
            queue: CallQueue::with_capacity(capacity),
            stats: DispatchStats::default(),
            reporter,
            state: AtomicU8::new(WorkerState::Idle.as_u8()),
        }
    }

    pub(crate) fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: WorkerState) {
        self.state.store(state.as_u8(), Ordering::Release);
    }
}

/// Join handle plus an exit signal that supports a bounded wait.
pub(crate) struct WorkerHandle {
    pub(crate) join_handle: JoinHandle<()>,
    /// Disconnects when the worker thread finishes (or unwinds)
    pub(crate) exited: Receiver<()>,
}

pub(crate) fn spawn_worker(name: &str, shared: Arc<Shared>) -> io::Result<WorkerHandle> {
    let (exit_tx, exited) = crossbeam_channel::bounded::<()>(1);
    let join_handle = thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            run(&shared);
            notify_exit(exit_tx);
        })?;
    Ok(WorkerHandle {
        join_handle,
        exited,
    })
}

fn notify_exit(exit_tx: Sender<()>) {
    let _ = exit_tx.try_send(());
}

fn run(shared: &Shared) {
    log::debug!(target: "dispatch::worker", "async worker started");

    while let Some(request) = shared.queue.wait_pop() {
        shared.set_state(WorkerState::Draining);
        execute(shared, request);
        if shared.queue.is_empty() {
            shared.set_state(WorkerState::Idle);
        }
    }

    shared.set_state(WorkerState::Terminating);
    log::debug!(
        target: "dispatch::worker",
        "async worker exiting, {} request(s) abandoned",
        shared.queue.len()
    );
}

fn execute(shared: &Shared, request: CallRequest) {
    let Some(callback) = request.callback.upgrade() else {
        shared.stats.record_skipped();
        log::debug!(
            target: "dispatch::worker",
            "callable dropped before deferred call ran; skipping"
        );
        return;
    };
    let mut event = request.event;

    let guard = InterpreterLock::acquire();
    if let Err(e) = interpreter::invoke(callback.as_ref(), &guard, &mut event) {
        shared.reporter.report(&e);
        shared.stats.record_error();
    }
    // Release the callable under the lock; this may be the last reference
    drop(callback);
    drop(guard);

    shared.stats.record_completed();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpreter::{LogReporter, ScriptResult};
    use std::time::Duration;

    fn shared(capacity: usize) -> Arc<Shared> {
        Arc::new(Shared::new(capacity, Arc::new(LogReporter)))
    }

    #[test]
    fn test_state_roundtrip() {
        for state in [WorkerState::Idle, WorkerState::Draining, WorkerState::Terminating] {
            assert_eq!(WorkerState::from_u8(state.as_u8()), state);
        }
    }

    #[test]
    fn test_worker_runs_request_and_exits_on_close() {
        let shared = shared(4);
        let handle = spawn_worker("test-worker", Arc::clone(&shared)).unwrap();

        let (tx, rx) = crossbeam_channel::unbounded();
        let cb: Arc<dyn Callback> = Arc::new(move |ev: &mut MidiEvent| -> ScriptResult {
            tx.send(ev.clone()).unwrap();
            Ok(().into())
        });
        let event = MidiEvent::note_on(0, 1, 64, 90);
        shared
            .queue
            .push(CallRequest {
                callback: Arc::downgrade(&cb),
                event: event.clone(),
            })
            .unwrap();

        assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), event);

        shared.queue.close();
        assert!(handle.exited.recv_timeout(Duration::from_secs(2)).is_ok());
        handle.join_handle.join().unwrap();
        assert_eq!(shared.state(), WorkerState::Terminating);
        assert_eq!(shared.stats.snapshot().completed_deferred, 1);
    }

    #[test]
    fn test_dropped_callable_is_skipped() {
        let shared = shared(4);
        let cb: Arc<dyn Callback> =
            Arc::new(|_: &mut MidiEvent| -> ScriptResult { Ok(true.into()) });
        let weak = Arc::downgrade(&cb);
        drop(cb);

        execute(
            &shared,
            CallRequest {
                callback: weak,
                event: MidiEvent::ctrl(0, 0, 1, 1),
            },
        );
        let snap = shared.stats.snapshot();
        assert_eq!(snap.skipped_requests, 1);
        assert_eq!(snap.completed_deferred, 0);
    }
}
