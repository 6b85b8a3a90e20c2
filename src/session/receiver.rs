use std::sync::{Arc, Mutex};

use super::lock_ignore_poison;
use crate::{
    // ---
    log_debug,
    ConsoleError,
    Correlator,
    Envelope,
    InboundResult,
    Result,
    Subscription,
    TransportConsumer,
};

/// Host-side consumer that feeds console results into the correlator.
///
/// Unaddressed and malformed messages are dropped here rather than
/// returned as errors: the host window is a shared channel and other
/// traffic on it is not a fault.
pub(super) struct ResultReceiver {
    // ---
    subscription: Subscription,
    correlator: Arc<Mutex<Correlator>>,
}

impl ResultReceiver {
    // ---

    pub(super) fn new(subscription: Subscription, correlator: Arc<Mutex<Correlator>>) -> Self {
        // ---
        Self {
            subscription,
            correlator,
        }
    }
}

impl Drop for ResultReceiver {
    // ---

    /// The receive loop owns this consumer; once it ends no result can
    /// arrive, so pending calls lose their handlers.
    fn drop(&mut self) {
        // ---
        log_debug!("result receiver stopped on {}", self.subscription.0);
        lock_ignore_poison(&self.correlator).release_handlers();
    }
}

#[async_trait::async_trait]
impl TransportConsumer for ResultReceiver {
    // ---

    fn subscription(&self) -> Subscription {
        self.subscription.clone()
    }

    async fn handle_envelope(&self, env: Envelope) -> Result<()> {
        // ---
        let result = match InboundResult::parse(&env.payload) {
            Ok(Some(result)) => result,
            Ok(None) => {
                log_debug!("ignoring message without call_id");
                return Ok(());
            }
            Err(ConsoleError::InvalidCallId(raw)) => {
                log_debug!("unexpected result for call_id {raw}");
                return Ok(());
            }
            Err(_err) => {
                log_debug!("ignoring malformed message: {_err}");
                return Ok(());
            }
        };

        // The lock covers bookkeeping only; handlers run after it is released
        // so they may register further calls.
        let accepted = lock_ignore_poison(&self.correlator).accept(&result);

        if let Ok(delivery) = accepted {
            delivery.invoke(&result);
        }

        Ok(())
    }
}
