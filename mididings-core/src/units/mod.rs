//! Pipeline units that call into script code.

mod call;

pub use call::{Call, CallMode};

use crate::buffer::EventBuffer;
use crate::dispatch::CallbackDispatcher;

/// Run `unit` over every event in `buffer`, in order. Events a callback
/// inserts are not fed back into the same unit.
pub fn process_buffer(dispatcher: &mut CallbackDispatcher, buffer: &mut EventBuffer, unit: &Call) {
    let mut position = 0;
    while position < buffer.len() {
        position = unit.process(dispatcher, buffer, position).end;
    }
}
