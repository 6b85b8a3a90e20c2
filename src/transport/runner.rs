//! Transport receive-loop runner.
//!
//! Glue between a [`Transport`](crate::Transport) and whatever reacts to
//! the envelopes it delivers: the host-side result receiver of a
//! [`ConsoleSession`](crate::ConsoleSession), or an embedded console
//! answering commands.
//!
//! [`run_consumer`] subscribes on behalf of a [`TransportConsumer`] and
//! spawns a task that hands it each envelope in delivery order, one at a
//! time. The loop ends when the transport closes or the subscription is
//! dropped.
//!
//! Errors returned by [`TransportConsumer::handle_envelope`] are logged at
//! `warn` level and do not terminate the loop; a single bad message must not
//! take the channel down.

use tokio::task::JoinHandle;

use crate::{
    // ---
    log_debug,
    log_warn,
    Envelope,
    Result,
    Subscription,
    TransportPtr,
};

/// A consumer of transport-delivered envelopes.
///
/// Implementations should assume envelopes from different publishers may
/// interleave arbitrarily.
#[async_trait::async_trait]
pub trait TransportConsumer: Send + Sync {
    /// The subscription used to receive incoming envelopes.
    fn subscription(&self) -> Subscription;

    /// Handle a single incoming envelope.
    ///
    /// Returning an error does not stop the receive loop.
    async fn handle_envelope(&self, env: Envelope) -> Result<()>;
}

/// Start a receive loop for `consumer`.
///
/// The subscription is established before this function returns, so
/// anything published afterwards reaches the consumer. The returned handle
/// completes when the loop ends; dropping it does not stop the loop.
///
/// # Errors
///
/// Returns `ConsoleError::Transport` if the subscription cannot be
/// established.
pub async fn run_consumer<T>(transport: TransportPtr, consumer: T) -> Result<JoinHandle<Result<()>>>
where
    T: TransportConsumer + 'static,
{
    // ---
    let sub = consumer.subscription();
    let mut handle = transport.subscribe(sub.clone()).await?;

    let join = tokio::spawn(async move {
        // ---
        log_debug!("receive loop started for {}", sub.0);

        while let Some(env) = handle.inbox.recv().await {
            if let Err(err) = consumer.handle_envelope(env).await {
                log_warn!("transport consumer error on {}: {err}", sub.0);
            }
        }

        log_debug!("receive loop stopped for {} (transport closed)", sub.0);
        Ok(())
    });

    Ok(join)
}
