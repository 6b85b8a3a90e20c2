/// Protocol types for console message correlation and serialization
///
/// This module defines the JSON envelopes exchanged with the embedded
/// console and the `call_id` correlation token.
mod correlation;
mod message;

pub use correlation::CallId;
pub use message::{Action, CallResult, Command, InboundResult};
