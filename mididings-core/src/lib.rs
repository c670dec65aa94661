//! # mididings-core
//!
//! Callback dispatch for the MIDI router: lets the real-time event pipeline
//! call into externally defined callback code, either synchronously (result
//! spliced into the event stream) or deferred onto a dedicated worker thread.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use mididings_core::{Callback, CallbackDispatcher, DispatchConfig, EventBuffer, ScriptResult};
//! use mididings_core::units::{self, Call};
//! use mididings_types::MidiEvent;
//!
//! let mut dispatcher = CallbackDispatcher::new(DispatchConfig::load())?;
//! let octave: Arc<dyn Callback> = Arc::new(|ev: &mut MidiEvent| -> ScriptResult {
//!     let mut up = ev.clone();
//!     up.transpose(12);
//!     Ok(vec![ev.clone(), up].into())
//! });
//! let mut buffer: EventBuffer = vec![MidiEvent::note_on(0, 0, 60, 100)].into();
//! units::process_buffer(&mut dispatcher, &mut buffer, &Call::immediate(octave));
//! ```
//!
//! ## Module Overview
//!
//! - [`buffer`]: `EventBuffer` and the `EventRange` every unit returns
//! - [`interpreter`]: global interpreter lock, `Callback` trait, `ScriptError`
//! - [`dispatch`]: `CallbackDispatcher`, bounded call queue, async worker
//! - [`units`]: the `Call` unit that connects a callback to the pipeline
//! - [`midi`]: raw MIDI message parsing and encoding
//! - [`config`]: TOML configuration (embedded defaults + user override)
//! - [`telemetry`]: call timing and dispatch counters

pub mod buffer;
pub mod config;
pub mod dispatch;
pub mod interpreter;
pub mod midi;
pub mod telemetry;
pub mod units;

pub use buffer::{EventBuffer, EventRange};
pub use config::{ConfigError, DispatchConfig};
pub use dispatch::{CallbackDispatcher, DispatchError, WorkerState, MAX_ASYNC_CALLS};
pub use interpreter::{
    Callback, CallbackReturn, ErrorReporter, InterpreterGuard, InterpreterLock, LogReporter,
    ScriptError, ScriptResult,
};
