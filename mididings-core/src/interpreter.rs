//! Interpreter-layer boundary: the global interpreter lock and the callback
//! contract script code is invoked through.
//!
//! Only one thread may execute script-level code at any instant, no matter
//! which native thread initiated the call. Every invocation therefore happens
//! while an [`InterpreterGuard`] is alive, and [`Callback::call`] takes the
//! guard as a parameter so that requirement is checked by the compiler.

use std::cell::Cell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, MutexGuard, PoisonError, TryLockError};

use mididings_types::MidiEvent;

/// Process-wide interpreter lock. Guards no data; holding it *is* the permission.
static INTERPRETER_LOCK: Mutex<()> = Mutex::new(());

thread_local! {
    static HELD_BY_THIS_THREAD: Cell<bool> = const { Cell::new(false) };
}

/// Entry point for acquiring the global interpreter lock.
pub struct InterpreterLock;

impl InterpreterLock {
    /// Block until the lock is available.
    ///
    /// Panics if the current thread already holds it: the lock is not
    /// re-entrant and recursive acquisition would otherwise deadlock.
    pub fn acquire() -> InterpreterGuard {
        assert_not_held();
        let inner = INTERPRETER_LOCK
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        InterpreterGuard::new(inner)
    }

    /// Acquire the lock only if no other thread holds it.
    pub fn try_acquire() -> Option<InterpreterGuard> {
        assert_not_held();
        match INTERPRETER_LOCK.try_lock() {
            Ok(inner) => Some(InterpreterGuard::new(inner)),
            Err(TryLockError::Poisoned(e)) => Some(InterpreterGuard::new(e.into_inner())),
            Err(TryLockError::WouldBlock) => None,
        }
    }

    pub fn is_held_by_current_thread() -> bool {
        HELD_BY_THIS_THREAD.with(Cell::get)
    }
}

fn assert_not_held() {
    assert!(
        !InterpreterLock::is_held_by_current_thread(),
        "interpreter lock acquired recursively on thread {:?}",
        std::thread::current().name().unwrap_or("<unnamed>")
    );
}

/// Scoped ownership of the interpreter lock. Released on drop.
pub struct InterpreterGuard {
    _inner: MutexGuard<'static, ()>,
}

impl InterpreterGuard {
    fn new(inner: MutexGuard<'static, ()>) -> Self {
        HELD_BY_THIS_THREAD.with(|held| held.set(true));
        Self { _inner: inner }
    }
}

impl Drop for InterpreterGuard {
    fn drop(&mut self) {
        HELD_BY_THIS_THREAD.with(|held| held.set(false));
    }
}

/// Value handed back by a callback, already converted by the interpreter layer.
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackReturn {
    /// No result: the event is deleted
    None,
    /// Zero or more events replacing the input event
    Events(Vec<MidiEvent>),
    /// `true` keeps the event unchanged, `false` deletes it
    Bool(bool),
    /// Any other value, coerced into the event's slot and kept
    Event(MidiEvent),
}

impl From<()> for CallbackReturn {
    fn from(_: ()) -> Self {
        CallbackReturn::None
    }
}

impl From<bool> for CallbackReturn {
    fn from(keep: bool) -> Self {
        CallbackReturn::Bool(keep)
    }
}

impl From<MidiEvent> for CallbackReturn {
    fn from(event: MidiEvent) -> Self {
        CallbackReturn::Event(event)
    }
}

impl From<Vec<MidiEvent>> for CallbackReturn {
    fn from(events: Vec<MidiEvent>) -> Self {
        CallbackReturn::Events(events)
    }
}

impl From<Option<MidiEvent>> for CallbackReturn {
    fn from(event: Option<MidiEvent>) -> Self {
        match event {
            Some(event) => CallbackReturn::Event(event),
            None => CallbackReturn::None,
        }
    }
}

/// Error raised by callback code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptError {
    /// The callback raised an error of its own
    Raised(String),
    /// The return value could not be converted into something the router understands
    Conversion { expected: String, found: String },
    /// The callback panicked; the payload message if it was a string
    Panicked(String),
}

impl ScriptError {
    pub fn raised(message: impl Into<String>) -> Self {
        ScriptError::Raised(message.into())
    }
}

impl fmt::Display for ScriptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptError::Raised(msg) => write!(f, "callback raised: {}", msg),
            ScriptError::Conversion { expected, found } => {
                write!(f, "cannot convert callback result: expected {}, found {}", expected, found)
            }
            ScriptError::Panicked(msg) => write!(f, "callback panicked: {}", msg),
        }
    }
}

impl std::error::Error for ScriptError {}

pub type ScriptResult = Result<CallbackReturn, ScriptError>;

/// A script-level callable that units hand to the dispatcher.
pub trait Callback: Send + Sync {
    /// Invoke the callable with the event. May mutate the event in place.
    fn call(&self, guard: &InterpreterGuard, event: &mut MidiEvent) -> ScriptResult;
}

impl<F> Callback for F
where
    F: Fn(&mut MidiEvent) -> ScriptResult + Send + Sync,
{
    fn call(&self, _guard: &InterpreterGuard, event: &mut MidiEvent) -> ScriptResult {
        self(event)
    }
}

/// Receives errors raised by callbacks. Called with the interpreter lock held.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, error: &ScriptError);
}

/// Default reporter: writes to the diagnostic log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, error: &ScriptError) {
        log::error!(target: "dispatch::callback", "{}", error);
    }
}

/// Run `callback` on `event`, converting a panic into [`ScriptError::Panicked`].
pub(crate) fn invoke(
    callback: &dyn Callback,
    guard: &InterpreterGuard,
    event: &mut MidiEvent,
) -> ScriptResult {
    match panic::catch_unwind(AssertUnwindSafe(|| callback.call(guard, event))) {
        Ok(result) => result,
        Err(payload) => Err(ScriptError::Panicked(panic_message(payload.as_ref()))),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_marks_thread() {
        {
            let _guard = InterpreterLock::acquire();
            assert!(InterpreterLock::is_held_by_current_thread());
        }
        assert!(!InterpreterLock::is_held_by_current_thread());
    }

    #[test]
    #[should_panic(expected = "acquired recursively")]
    fn test_recursive_acquire_panics() {
        let _outer = InterpreterLock::acquire();
        let _inner = InterpreterLock::acquire();
    }

    #[test]
    fn test_try_acquire_fails_while_other_thread_holds() {
        let guard = InterpreterLock::acquire();
        let contended = std::thread::spawn(|| InterpreterLock::try_acquire().is_none())
            .join()
            .unwrap();
        drop(guard);
        assert!(contended);
    }

    #[test]
    fn test_closure_is_callback() {
        let cb = |ev: &mut MidiEvent| -> ScriptResult {
            ev.transpose(2);
            Ok(true.into())
        };
        let mut ev = MidiEvent::note_on(0, 0, 60, 100);
        let guard = InterpreterLock::acquire();
        assert_eq!(invoke(&cb, &guard, &mut ev), Ok(CallbackReturn::Bool(true)));
        assert_eq!(ev.note(), Some(62));
    }

    #[test]
    fn test_invoke_catches_panic() {
        let cb = |_: &mut MidiEvent| -> ScriptResult { panic!("boom") };
        let mut ev = MidiEvent::note_on(0, 0, 60, 100);
        let guard = InterpreterLock::acquire();
        assert_eq!(
            invoke(&cb, &guard, &mut ev),
            Err(ScriptError::Panicked("boom".to_string()))
        );
    }

    #[test]
    fn test_option_conversion() {
        assert_eq!(CallbackReturn::from(None::<MidiEvent>), CallbackReturn::None);
        let ev = MidiEvent::ctrl(0, 0, 1, 2);
        assert_eq!(CallbackReturn::from(Some(ev.clone())), CallbackReturn::Event(ev));
    }
}
