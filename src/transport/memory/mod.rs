// src/transport/memory/mod.rs

//! In-memory transport implementation.
//!
//! A pure in-process implementation of the domain-level `Transport` trait,
//! standing in for cross-window messaging in tests, demos and single-process
//! embeddings.
//!
//! ## Reference Semantics
//!
//! - Once `subscribe()` returns, envelopes published after that point to the
//!   subscribed address are deliverable.
//! - Delivery is deterministic and ordered per publisher within a process.
//! - No envelope is dropped while its subscription is alive.

mod transport;

pub use transport::create_transport;
