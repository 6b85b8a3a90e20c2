//! Domain layer public interface.
//!
//! Channel abstractions that are independent of any concrete transport.
//! Consumers import these symbols via this module, not from individual files.

mod transport;

// --- Transport domain re-exports ---

pub use transport::{
    //
    Address,
    Envelope,
    Subscription,
    SubscriptionHandle,
    Transport,
    TransportPtr,
};
