// src/transport/memory/transport.rs

//! In-memory message channel.
//!
//! Concrete implementation of the domain-level `Transport` trait using
//! in-process data structures only. Both the host session and the
//! embedded console (or a test double standing in for it) share one
//! instance and address each other by window name.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};

use crate::{
    // ---
    log_debug,
    ConsoleConfig,
    ConsoleError,
    Envelope,
    Result,
    Subscription,
    SubscriptionHandle,
    Transport,
    TransportPtr,
};

/// In-memory transport.
///
/// ## Semantics
///
/// - Subscriptions are registered immediately.
/// - A subscription matches an envelope when the address strings are equal.
/// - Each subscription has a bounded inbox; `publish()` waits for room.
/// - Dropping a `SubscriptionHandle` implicitly unregisters the subscription.
/// - `close()` drops every subscription; later publishes fail.
struct MemoryTransport {
    // ---
    subscriptions: RwLock<HashMap<Subscription, Vec<mpsc::Sender<Envelope>>>>,
    inbox_capacity: usize,
    closed: RwLock<bool>,
}

#[async_trait::async_trait]
impl Transport for MemoryTransport {
    // ---

    /// Deliver an envelope to every inbox subscribed to its address.
    ///
    /// Senders are cloned out of the table before delivery so a full inbox
    /// never blocks `subscribe()` or `close()`.
    async fn publish(&self, env: Envelope) -> Result<()> {
        // ---
        if *self.closed.read().await {
            return Err(ConsoleError::Transport("transport closed".into()));
        }

        let senders: Vec<mpsc::Sender<Envelope>> = {
            let subs = self.subscriptions.read().await;
            subs.iter()
                .filter(|(sub, _)| sub.0 == env.address.0)
                .flat_map(|(_, senders)| senders.iter().cloned())
                .collect()
        };

        if senders.is_empty() {
            log_debug!("no listener for {}", env.address.0);
        }

        for sender in senders {
            // A closed channel indicates a dropped SubscriptionHandle.
            let _ = sender.send(env.clone()).await;
        }

        Ok(())
    }

    /// Register a subscription.
    ///
    /// Once this returns, subsequent publishes to the subscribed address
    /// are deliverable to the returned inbox.
    async fn subscribe(&self, sub: Subscription) -> Result<SubscriptionHandle> {
        // ---
        if *self.closed.read().await {
            return Err(ConsoleError::Transport("transport closed".into()));
        }

        let (tx, rx) = mpsc::channel(self.inbox_capacity);

        let mut subs = self.subscriptions.write().await;
        subs.entry(sub).or_default().push(tx);

        Ok(SubscriptionHandle { inbox: rx })
    }

    /// Close the transport and drop every subscription.
    async fn close(&self) -> Result<()> {
        // ---
        *self.closed.write().await = true;

        let mut subs = self.subscriptions.write().await;
        subs.clear();
        Ok(())
    }
}

/// Create a new in-memory transport.
///
/// Only `inbox_capacity` is read from the config; addresses are chosen by
/// whoever subscribes.
pub async fn create_transport(config: &ConsoleConfig) -> Result<TransportPtr> {
    // ---
    let transport = MemoryTransport {
        // ---
        subscriptions: RwLock::new(HashMap::new()),
        inbox_capacity: config.inbox_capacity.max(1),
        closed: RwLock::new(false),
    };

    Ok(Arc::new(transport))
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use crate::Address;
    use bytes::Bytes;

    #[tokio::test]
    async fn test_publish_reaches_only_matching_subscription() {
        // ---
        let transport = create_transport(&ConsoleConfig::memory("t")).await.unwrap();

        let mut host = transport.subscribe(Subscription::from("host")).await.unwrap();
        let mut frame = transport.subscribe(Subscription::from("frame")).await.unwrap();

        let env = Envelope::new(Address::from("frame"), Bytes::from_static(b"{}"));
        transport.publish(env).await.unwrap();

        let got = frame.inbox.recv().await.unwrap();
        assert_eq!(got.address, Address::from("frame"));
        assert!(host.inbox.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_close_ends_inboxes_and_rejects_publish() {
        // ---
        let transport = create_transport(&ConsoleConfig::memory("t")).await.unwrap();
        let mut handle = transport.subscribe(Subscription::from("host")).await.unwrap();

        transport.close().await.unwrap();

        assert!(handle.inbox.recv().await.is_none());

        let env = Envelope::new(Address::from("host"), Bytes::new());
        assert!(matches!(
            transport.publish(env).await,
            Err(ConsoleError::Transport(_))
        ));
    }
}
