//! Callback dispatcher: the pipeline's entry point into script code.
//!
//! Two modes:
//! - [`CallbackDispatcher::call_now`] runs the callback on the real-time thread
//!   under the interpreter lock and splices its result into the event buffer.
//! - [`CallbackDispatcher::call_deferred`] copies the event into the bounded
//!   call queue and returns at once; the async worker runs the callback later
//!   and its result is discarded.
//!
//! Dropping the dispatcher closes the queue and waits a bounded time for the
//! worker. A worker stuck inside a callback that never returns is abandoned
//! and keeps running detached.

pub mod queue;
mod worker;

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crossbeam_channel::RecvTimeoutError;

use crate::buffer::{EventBuffer, EventRange};
use crate::config::DispatchConfig;
use crate::interpreter::{
    self, Callback, CallbackReturn, ErrorReporter, InterpreterLock, LogReporter,
};
use crate::telemetry::{CallSummary, CallTelemetry, StatsSnapshot};

pub use queue::{CallQueue, QueueFull, MAX_ASYNC_CALLS};
pub use worker::WorkerState;

use worker::{CallRequest, Shared, WorkerHandle};

#[derive(Debug)]
pub enum DispatchError {
    /// The async worker thread could not be started
    Spawn(std::io::Error),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spawn(e) => write!(f, "failed to spawn async worker: {}", e),
        }
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Spawn(e) => Some(e),
        }
    }
}

/// Owns the deferred call queue and the async worker. One per engine.
pub struct CallbackDispatcher {
    shared: Arc<Shared>,
    worker: Option<WorkerHandle>,
    telemetry: CallTelemetry,
    config: DispatchConfig,
}

impl CallbackDispatcher {
    /// Start a dispatcher that reports callback errors to the log.
    pub fn new(config: DispatchConfig) -> Result<Self, DispatchError> {
        Self::with_reporter(config, Arc::new(LogReporter))
    }

    pub fn with_reporter(
        config: DispatchConfig,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Result<Self, DispatchError> {
        let shared = Arc::new(Shared::new(MAX_ASYNC_CALLS, reporter));
        let worker = worker::spawn_worker(&config.worker_thread_name, Arc::clone(&shared))
            .map_err(DispatchError::Spawn)?;
        log::debug!(
            target: "dispatch",
            "callback dispatcher started (worker '{}', queue capacity {})",
            config.worker_thread_name,
            MAX_ASYNC_CALLS
        );
        Ok(Self {
            shared,
            worker: Some(worker),
            telemetry: CallTelemetry::new(),
            config,
        })
    }

    /// Run `callback` on the event at `position` and apply its result:
    ///
    /// | callback returns                | buffer effect                |
    /// |---------------------------------|------------------------------|
    /// | `None`, empty `Events`, `false` | event deleted                |
    /// | non-empty `Events`              | event replaced by the events |
    /// | `true`                          | event kept unchanged         |
    /// | `Event(e)`                      | event overwritten with `e`   |
    /// | error or panic                  | reported, event deleted      |
    ///
    /// Blocks for the full callback duration while holding the interpreter lock.
    /// Panics if `position` is out of bounds.
    pub fn call_now(
        &mut self,
        buffer: &mut EventBuffer,
        position: usize,
        callback: &dyn Callback,
    ) -> EventRange {
        self.shared.stats.record_immediate();

        let requested = Instant::now();
        let guard = InterpreterLock::acquire();
        let acquired = Instant::now();
        let range = match interpreter::invoke(callback, &guard, &mut buffer[position]) {
            Ok(CallbackReturn::None) => buffer.delete(position),
            Ok(CallbackReturn::Events(events)) if events.is_empty() => buffer.delete(position),
            Ok(CallbackReturn::Events(events)) => buffer.replace(position, events),
            Ok(CallbackReturn::Bool(true)) => buffer.keep(position),
            Ok(CallbackReturn::Bool(false)) => buffer.delete(position),
            Ok(CallbackReturn::Event(event)) => {
                buffer[position] = event;
                buffer.keep(position)
            }
            Err(e) => {
                self.shared.reporter.report(&e);
                self.shared.stats.record_error();
                buffer.delete(position)
            }
        };
        drop(guard);

        self.telemetry.record(
            acquired - requested,
            acquired.elapsed(),
            self.config.call_budget_us,
        );
        range
    }

    /// Queue `callback` to run later on a copy of the event at `position`, and
    /// keep or delete the event right away according to `keep`.
    ///
    /// Only holds `callback` weakly: if the caller drops it before the worker
    /// gets to the request, the request is skipped.
    ///
    /// Panics if the queue already holds [`MAX_ASYNC_CALLS`] requests; callers
    /// must pace deferred calls within that capacity.
    pub fn call_deferred(
        &mut self,
        buffer: &mut EventBuffer,
        position: usize,
        callback: &Arc<dyn Callback>,
        keep: bool,
    ) -> EventRange {
        let request = CallRequest {
            callback: Arc::downgrade(callback),
            event: buffer[position].clone(),
        };
        match self.shared.queue.push(request) {
            Ok(len) => self.shared.stats.record_deferred(len),
            Err(QueueFull(_)) => panic!(
                "deferred call queue overflow: {} calls already pending (MAX_ASYNC_CALLS)",
                MAX_ASYNC_CALLS
            ),
        }

        if keep {
            buffer.keep(position)
        } else {
            buffer.delete(position)
        }
    }

    /// Deferred calls queued but not yet started.
    pub fn pending_calls(&self) -> usize {
        self.shared.queue.len()
    }

    pub fn worker_state(&self) -> WorkerState {
        self.shared.state()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Lock-wait and callback timing of synchronous calls since the last
    /// summary.
    pub fn take_call_summary(&mut self) -> CallSummary {
        self.telemetry.take_summary()
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }
}

impl Drop for CallbackDispatcher {
    fn drop(&mut self) {
        let pending = self.shared.queue.len();
        self.shared.queue.close();

        let Some(worker) = self.worker.take() else {
            return;
        };
        match worker.exited.recv_timeout(self.config.shutdown_timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if worker.join_handle.join().is_err() {
                    log::error!(target: "dispatch", "async worker panicked");
                }
                if pending > 0 {
                    log::debug!(
                        target: "dispatch",
                        "{} deferred call(s) abandoned at shutdown",
                        pending
                    );
                }
            }
            Err(RecvTimeoutError::Timeout) => {
                // Dropping the JoinHandle detaches the thread
                log::warn!(
                    target: "dispatch",
                    "async worker '{}' did not exit within {:?}; abandoning it",
                    self.config.worker_thread_name,
                    self.config.shutdown_timeout
                );
            }
        }
    }
}
