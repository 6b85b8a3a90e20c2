//! Transport implementations.
//!
//! Concrete implementations of the domain-level `Transport` trait, exposed
//! only through constructor functions, plus the receive-loop runner shared
//! by every consumer of a transport.
//!
//! Domain code must not depend on transport-specific types.

mod memory;
mod runner;

pub use memory::create_transport as create_memory_transport;
pub use runner::{run_consumer, TransportConsumer};
