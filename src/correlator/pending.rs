// src/correlator/pending.rs

use crate::protocol::{CallId, CallResult, InboundResult};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Callback invoked with a delivered result and its zero-based sequence index.
pub type ResultCallback = Arc<dyn Fn(&InboundResult, usize) + Send + Sync>;

/// Success and error callbacks attached to a call.
///
/// A call registered with empty handlers expects no reply and is sent
/// with [`CallId::NONE`].
#[derive(Clone, Default)]
pub struct Handlers {
    // ---
    on_success: Option<ResultCallback>,
    on_error: Option<ResultCallback>,
}

impl Handlers {
    // ---

    /// No callbacks; the call is fire-and-forget.
    pub fn new() -> Self {
        // ---
        Self::default()
    }

    /// Set the callback for results without an error flag.
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(&InboundResult, usize) + Send + Sync + 'static,
    {
        // ---
        self.on_success = Some(Arc::new(f));
        self
    }

    /// Set the callback for results carrying an error flag.
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&InboundResult, usize) + Send + Sync + 'static,
    {
        // ---
        self.on_error = Some(Arc::new(f));
        self
    }

    /// Handlers that forward every delivery into a channel as a [`CallResult`].
    ///
    /// The receiver sees each accepted result exactly once. Sends to a dropped
    /// receiver are discarded.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<CallResult>) {
        // ---
        let (tx, rx) = mpsc::unbounded_channel();
        let err_tx = tx.clone();

        let handlers = Self::new()
            .on_success(move |result, index| {
                let _ = tx.send(CallResult::Success {
                    result: result.clone(),
                    index,
                });
            })
            .on_error(move |result, index| {
                let _ = err_tx.send(CallResult::Error {
                    result: result.clone(),
                    index,
                });
            });

        (handlers, rx)
    }

    /// True when neither callback is set.
    pub fn is_empty(&self) -> bool {
        // ---
        self.on_success.is_none() && self.on_error.is_none()
    }

    pub(crate) fn for_outcome(&self, is_error: bool) -> Option<&ResultCallback> {
        if is_error {
            self.on_error.as_ref()
        } else {
            self.on_success.as_ref()
        }
    }
}

impl fmt::Debug for Handlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handlers")
            .field("on_success", &self.on_success.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}

/// Record of an outstanding call awaiting one or more results.
#[derive(Debug)]
pub(super) struct PendingCall {
    // ---
    pub(super) id: CallId,
    pub(super) handlers: Handlers,
    pub(super) expected: usize,
    pub(super) remaining: usize,
}

impl PendingCall {
    // ---

    pub(super) fn new(id: CallId, handlers: Handlers, expected: usize) -> Self {
        // ---
        Self {
            id,
            handlers,
            expected,
            remaining: expected,
        }
    }

    /// Consume one expected result, returning its sequence index.
    ///
    /// Returns `None` once every expected result has been delivered.
    pub(super) fn take_slot(&mut self) -> Option<usize> {
        // ---
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        Some(self.expected - self.remaining - 1)
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_take_slot_counts_up_then_stops() {
        // ---
        let mut call = PendingCall::new(CallId::from(1), Handlers::new(), 3);

        assert_eq!(call.take_slot(), Some(0));
        assert_eq!(call.take_slot(), Some(1));
        assert_eq!(call.take_slot(), Some(2));
        assert_eq!(call.remaining, 0);

        assert_eq!(call.take_slot(), None);
        assert_eq!(call.remaining, 0);
    }

    #[test]
    fn test_handlers_select_by_outcome() {
        // ---
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();

        let handlers = Handlers::new().on_error(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!handlers.is_empty());
        assert!(handlers.for_outcome(false).is_none());

        let result = InboundResult::failure(CallId::from(1), "x");
        (handlers.for_outcome(true).unwrap())(&result, 0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_channel_handlers_tag_results() {
        // ---
        let (handlers, mut rx) = Handlers::channel();
        let ok = InboundResult::success(CallId::from(1), Default::default());
        let bad = InboundResult::failure(CallId::from(1), true);

        (handlers.for_outcome(false).unwrap())(&ok, 1);
        (handlers.for_outcome(true).unwrap())(&bad, 0);

        let first = rx.try_recv().unwrap();
        assert!(!first.is_error());
        assert_eq!(first.index(), 1);

        let second = rx.try_recv().unwrap();
        assert!(second.is_error());
        assert_eq!(second.result(), &bad);
    }
}
