use std::fmt;
use std::sync::Arc;

use crate::buffer::{EventBuffer, EventRange};
use crate::dispatch::CallbackDispatcher;
use crate::interpreter::Callback;

/// How a [`Call`] unit hands events to its callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallMode {
    /// Run on the real-time thread; the return value decides the event's fate
    Immediate,
    /// Run later on the async worker; `keep` decides whether the event continues
    Deferred { keep: bool },
}

/// Pipeline unit that invokes a script-level callback for every event.
///
/// The unit owns the callable. Deferred requests only hold it weakly, so a
/// patch that is torn down cancels its outstanding deferred calls.
#[derive(Clone)]
pub struct Call {
    callback: Arc<dyn Callback>,
    mode: CallMode,
}

impl Call {
    pub fn new(callback: Arc<dyn Callback>, mode: CallMode) -> Self {
        Self { callback, mode }
    }

    pub fn immediate(callback: Arc<dyn Callback>) -> Self {
        Self::new(callback, CallMode::Immediate)
    }

    pub fn deferred(callback: Arc<dyn Callback>, keep: bool) -> Self {
        Self::new(callback, CallMode::Deferred { keep })
    }

    pub fn mode(&self) -> CallMode {
        self.mode
    }

    /// Process the event at `position`.
    pub fn process(
        &self,
        dispatcher: &mut CallbackDispatcher,
        buffer: &mut EventBuffer,
        position: usize,
    ) -> EventRange {
        match self.mode {
            CallMode::Immediate => dispatcher.call_now(buffer, position, self.callback.as_ref()),
            CallMode::Deferred { keep } => {
                dispatcher.call_deferred(buffer, position, &self.callback, keep)
            }
        }
    }
}

impl fmt::Debug for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Call").field("mode", &self.mode).finish()
    }
}
