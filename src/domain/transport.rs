// src/domain/transport.rs

//! Message channel abstractions.
//!
//! This module defines the channel used by the console session to reach
//! the embedded console and to hear back from it. It plays the role of the
//! browser's cross-window messaging: a sender posts an opaque payload to a
//! named window, and every listener on that window receives it.
//!
//! The channel is responsible only for delivering opaque envelopes to
//! subscribed listeners. Correlation of results to calls lives in
//! [`Correlator`](crate::Correlator).
//!
//! Concrete implementations of this interface live under `src/transport/`.
use crate::Result;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;

/// A window address.
///
/// Names the inbox a message is posted to (the host page, or the embedded
/// console frame). Treated as an opaque identifier; the in-memory transport
/// matches addresses by exact string equality.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Address(pub Arc<str>);

impl<T> From<T> for Address
where
    T: Into<Arc<str>>,
{
    fn from(value: T) -> Self {
        // ---
        Address(value.into())
    }
}

/// A request to receive envelopes posted to an address.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Subscription(pub Arc<str>);

impl From<Address> for Subscription {
    fn from(address: Address) -> Self {
        // ---
        Subscription(address.0)
    }
}

impl<T> From<T> for Subscription
where
    T: Into<Arc<str>>,
{
    fn from(value: T) -> Self {
        // ---
        Subscription(value.into())
    }
}

/// A posted message.
///
/// # Example
///
/// ```
/// # use console_bridge::{Envelope, Address};
/// # use bytes::Bytes;
/// let envelope = Envelope::new(
///     Address::from("console/docs"),
///     Bytes::from_static(br#"{"action":"input","data":["RETURN 1"],"call_id":0}"#),
/// )
/// .with_source(Address::from("host/docs"));
///
/// assert_eq!(envelope.source, Some(Address::from("host/docs")));
/// ```
#[derive(Clone, Debug)]
pub struct Envelope {
    // ---
    /// Window the message is posted to.
    pub address: Address,

    /// Opaque payload bytes (JSON for the console protocol).
    pub payload: Bytes,

    /// Window that posted the message, if known.
    ///
    /// The embedded console replies to this address.
    pub source: Option<Address>,
}

impl Envelope {
    // ---

    /// Create an envelope with no source.
    pub fn new(address: Address, payload: Bytes) -> Self {
        // ---
        Self {
            address,
            payload,
            source: None,
        }
    }

    /// Record the posting window.
    pub fn with_source(mut self, source: Address) -> Self {
        // ---
        self.source = Some(source);
        self
    }
}

/// Handle returned from a successful subscription.
///
/// Dropping the handle unsubscribes; closing the transport ends the inbox.
pub struct SubscriptionHandle {
    // ---
    /// Receiver channel for delivered envelopes matching this subscription.
    pub inbox: mpsc::Receiver<Envelope>,
}

/// Message channel abstraction.
///
/// Implementations must ensure that:
/// - Once `subscribe()` returns successfully, envelopes published *after*
///   that point to a matching address are deliverable.
/// - Envelopes from one publisher to one address arrive in publish order.
/// - `close()` ends every open inbox, which ends the receive loops reading them.
///
/// The in-memory transport is the reference implementation.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    // ---
    /// Post an envelope to its address.
    async fn publish(&self, env: Envelope) -> Result<()>;

    /// Register a subscription and return a handle for receiving envelopes.
    async fn subscribe(&self, sub: Subscription) -> Result<SubscriptionHandle>;

    /// Close the transport and release any associated resources.
    async fn close(&self) -> Result<()>;
}

/// Shared transport pointer.
///
/// Cloning is cheap and all clones share the same channel.
pub type TransportPtr = Arc<dyn Transport>;
