// src/correlator/mod.rs
//! Request/response correlation over a single message channel.
//!
//! Every call that expects a reply is given the next identifier from an
//! append-only registry. The identifier travels out as `call_id` and the
//! console echoes it back on each result. An inbound result is matched to
//! its call by position (`call_id - 1`) and delivered to the call's success
//! or error handler together with its sequence index within the batch.
//!
//! Identifier 0 is never registered. Entries are never removed, so a call
//! that has received all of its results stays addressable and any further
//! result for it is reported as unexpected.
//!
//! There are no timeouts. A call whose results never arrive stays pending.

mod pending;

pub use pending::{Handlers, ResultCallback};

use pending::PendingCall;

use crate::protocol::{CallId, InboundResult};
use crate::{log_debug, log_warn};

/// Outcome of offering an inbound result to the correlator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Routed to the success handler with this sequence index.
    Success { index: usize },

    /// Routed to the error handler with this sequence index.
    Error { index: usize },

    /// `call_id` was 0 or has no registry entry.
    Unaddressed,

    /// The call already received every result it expected.
    Exhausted,
}

impl Dispatch {
    /// Whether the result consumed one of the call's expected slots.
    pub fn is_delivered(&self) -> bool {
        matches!(self, Dispatch::Success { .. } | Dispatch::Error { .. })
    }
}

/// An accepted result that is ready to be handed to its callback.
///
/// Produced by [`Correlator::accept`]. Holding a `Delivery` does not borrow
/// the correlator, so the callback can be run after any registry lock has
/// been released.
#[must_use = "a delivery does nothing until it is invoked"]
pub struct Delivery {
    // ---
    call_id: CallId,
    outcome: Dispatch,
    callback: Option<ResultCallback>,
}

impl Delivery {
    // ---

    /// The accepted outcome (always `Success` or `Error`).
    pub fn outcome(&self) -> Dispatch {
        self.outcome
    }

    /// Run the selected callback, if the call registered one for this outcome.
    pub fn invoke(self, result: &InboundResult) -> Dispatch {
        // ---
        let index = match self.outcome {
            Dispatch::Success { index } | Dispatch::Error { index } => index,
            other => return other,
        };

        match self.callback {
            Some(callback) => callback(result, index),
            None => log_debug!(
                "no handler for {:?} on call {} (index {index})",
                self.outcome,
                self.call_id
            ),
        }

        self.outcome
    }
}

/// Registry of pending calls keyed by `call_id`.
///
/// Owned by whoever owns the message channel; there is no process-wide
/// instance.
#[derive(Debug, Default)]
pub struct Correlator {
    // ---
    calls: Vec<PendingCall>,
}

impl Correlator {
    // ---

    /// Create an empty registry.
    pub fn new() -> Self {
        // ---
        Self::default()
    }

    /// Register a call and return the identifier to send as `call_id`.
    ///
    /// With empty `handlers` nothing is recorded and [`CallId::NONE`] is
    /// returned. Otherwise a new entry expecting `expected` results is
    /// appended (default 1; 0 is treated as 1) and its 1-based identifier
    /// is returned.
    pub fn register(&mut self, handlers: Handlers, expected: Option<usize>) -> CallId {
        // ---
        if handlers.is_empty() {
            return CallId::NONE;
        }

        let expected = expected.unwrap_or(1).max(1);
        let id = CallId::from(self.calls.len() as u64 + 1);

        self.calls.push(PendingCall::new(id, handlers, expected));
        log_debug!("registered call {id} expecting {expected} result(s)");

        id
    }

    /// Match a result to its call and consume one expected slot.
    ///
    /// Returns `Err` with `Dispatch::Unaddressed` or `Dispatch::Exhausted`
    /// when the result must be dropped; both are logged here.
    pub fn accept(&mut self, result: &InboundResult) -> std::result::Result<Delivery, Dispatch> {
        // ---
        let call_id = result.call_id;

        let Some(call) = call_id.slot().and_then(|slot| self.calls.get_mut(slot)) else {
            log_debug!("unexpected result for unknown call_id {call_id}");
            return Err(Dispatch::Unaddressed);
        };

        let Some(index) = call.take_slot() else {
            log_warn!(
                "unexpected result for call {} (all {} result(s) already delivered)",
                call.id,
                call.expected
            );
            return Err(Dispatch::Exhausted);
        };

        let is_error = result.is_error();
        let outcome = if is_error {
            Dispatch::Error { index }
        } else {
            Dispatch::Success { index }
        };

        Ok(Delivery {
            call_id,
            outcome,
            callback: call.handlers.for_outcome(is_error).cloned(),
        })
    }

    /// Deliver a result to its call's handler.
    ///
    /// Never fails: unaddressed and surplus results are logged and dropped.
    pub fn dispatch(&mut self, result: &InboundResult) -> Dispatch {
        // ---
        match self.accept(result) {
            Ok(delivery) => delivery.invoke(result),
            Err(dropped) => dropped,
        }
    }

    /// Number of calls ever registered.
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    /// Whether no call has ever been registered.
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    /// Give up on a call whose command was never posted.
    ///
    /// The identifier stays burned, but the call no longer counts as
    /// pending and its handlers are dropped. Any later result for it is
    /// reported as unexpected.
    pub fn abandon(&mut self, call_id: CallId) {
        // ---
        if let Some(call) = call_id.slot().and_then(|slot| self.calls.get_mut(slot)) {
            log_debug!("abandoning call {} with {} result(s) outstanding", call.id, call.remaining);
            call.remaining = 0;
            call.handlers = Handlers::new();
        }
    }

    /// Drop the handlers of every registered call.
    ///
    /// Used when the channel goes away: no further result can arrive, and
    /// dropping the handlers ends any channel-form result stream. Slot
    /// counts are left untouched.
    pub fn release_handlers(&mut self) {
        // ---
        for call in &mut self.calls {
            call.handlers = Handlers::new();
        }
    }

    /// Results still expected for `call_id`, or `None` if it was never registered.
    pub fn remaining(&self, call_id: CallId) -> Option<usize> {
        // ---
        call_id
            .slot()
            .and_then(|slot| self.calls.get(slot))
            .map(|call| call.remaining)
    }

    /// Number of calls still waiting for at least one result.
    pub fn pending_count(&self) -> usize {
        // ---
        self.calls.iter().filter(|call| call.remaining > 0).count()
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<(&'static str, Option<serde_json::Value>, usize)>>>;

    fn recording_handlers(log: &Log) -> Handlers {
        // ---
        let ok_log = log.clone();
        let err_log = log.clone();

        Handlers::new()
            .on_success(move |r, i| {
                ok_log
                    .lock()
                    .unwrap()
                    .push(("success", r.field("payload").cloned(), i))
            })
            .on_error(move |r, i| err_log.lock().unwrap().push(("error", r.error.clone(), i)))
    }

    fn ok(call_id: u64, payload: &str) -> InboundResult {
        InboundResult::success(CallId::from(call_id), Default::default()).with_field("payload", payload)
    }

    #[test]
    fn test_register_without_handlers_yields_none() {
        // ---
        let mut correlator = Correlator::new();

        assert_eq!(correlator.register(Handlers::new(), None), CallId::NONE);
        assert_eq!(correlator.register(Handlers::new(), Some(5)), CallId::NONE);
        assert!(correlator.is_empty());
    }

    #[test]
    fn test_register_assigns_increasing_ids() {
        // ---
        let mut correlator = Correlator::new();
        let log = Log::default();

        let ids: Vec<u64> = (0..5)
            .map(|_| correlator.register(recording_handlers(&log), None).get())
            .collect();

        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert_eq!(correlator.len(), 5);
        assert_eq!(correlator.pending_count(), 5);
    }

    #[test]
    fn test_zero_expected_is_treated_as_one() {
        // ---
        let mut correlator = Correlator::new();
        let id = correlator.register(recording_handlers(&Log::default()), Some(0));

        assert_eq!(correlator.remaining(id), Some(1));
    }

    #[test]
    fn test_accepts_exactly_expected_count() {
        // ---
        let mut correlator = Correlator::new();
        let log = Log::default();
        let id = correlator.register(recording_handlers(&log), Some(2));

        assert!(correlator.dispatch(&ok(id.get(), "a")).is_delivered());
        assert!(correlator.dispatch(&ok(id.get(), "b")).is_delivered());
        assert_eq!(correlator.dispatch(&ok(id.get(), "c")), Dispatch::Exhausted);

        assert_eq!(log.lock().unwrap().len(), 2);
        assert_eq!(correlator.remaining(id), Some(0));
        assert_eq!(correlator.pending_count(), 0);
        // Exhausted calls stay registered.
        assert_eq!(correlator.len(), 1);
    }

    #[test]
    fn test_unaddressed_results_invoke_nothing() {
        // ---
        let mut correlator = Correlator::new();
        let log = Log::default();
        correlator.register(recording_handlers(&log), None);

        assert_eq!(correlator.dispatch(&ok(0, "a")), Dispatch::Unaddressed);
        assert_eq!(correlator.dispatch(&ok(2, "a")), Dispatch::Unaddressed);
        assert_eq!(correlator.dispatch(&ok(u64::MAX, "a")), Dispatch::Unaddressed);

        assert!(log.lock().unwrap().is_empty());
        assert_eq!(correlator.pending_count(), 1);
    }

    #[test]
    fn test_error_flag_selects_error_handler_only() {
        // ---
        let mut correlator = Correlator::new();
        let log = Log::default();
        let id = correlator.register(recording_handlers(&log), Some(2));

        let failure = InboundResult::failure(id, "boom");
        assert_eq!(correlator.dispatch(&failure), Dispatch::Error { index: 0 });
        assert_eq!(correlator.dispatch(&ok(id.get(), "fine")), Dispatch::Success { index: 1 });

        let log = log.lock().unwrap();
        assert_eq!(log[0], ("error", Some(json!("boom")), 0));
        assert_eq!(log[1], ("success", Some(json!("fine")), 1));
    }

    #[test]
    fn test_missing_handler_still_consumes_slot() {
        // ---
        let mut correlator = Correlator::new();
        let log = Log::default();
        let err_log = log.clone();
        let id = correlator.register(
            Handlers::new().on_error(move |_, i| err_log.lock().unwrap().push(("error", None, i))),
            Some(2),
        );

        assert_eq!(correlator.dispatch(&ok(id.get(), "a")), Dispatch::Success { index: 0 });
        assert_eq!(correlator.remaining(id), Some(1));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_batch_scenario_with_mixed_outcomes() {
        // ---
        let mut correlator = Correlator::new();
        let log = Log::default();
        let id = correlator.register(recording_handlers(&log), Some(3));
        assert_eq!(id.get(), 1);

        correlator.dispatch(&ok(1, "a"));
        correlator.dispatch(&InboundResult::failure(CallId::from(1), "x"));
        correlator.dispatch(&ok(1, "c"));

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 3);
        assert_eq!(log.iter().filter(|(kind, _, _)| *kind == "error").count(), 1);

        let mut indices: Vec<usize> = log.iter().map(|(_, _, i)| *i).collect();
        indices.sort_unstable();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_interleaved_calls_are_independent() {
        // ---
        let mut correlator = Correlator::new();
        let first = correlator.register(recording_handlers(&Log::default()), Some(2));
        let second = correlator.register(recording_handlers(&Log::default()), Some(1));

        assert_eq!(correlator.dispatch(&ok(second.get(), "s")), Dispatch::Success { index: 0 });
        assert_eq!(correlator.dispatch(&ok(first.get(), "f")), Dispatch::Success { index: 0 });
        assert_eq!(correlator.dispatch(&ok(second.get(), "s")), Dispatch::Exhausted);
        assert_eq!(correlator.dispatch(&ok(first.get(), "f")), Dispatch::Success { index: 1 });
    }

    #[test]
    fn test_accept_defers_invocation() {
        // ---
        let mut correlator = Correlator::new();
        let log = Log::default();
        let id = correlator.register(recording_handlers(&log), None);
        let result = ok(id.get(), "later");

        let delivery = correlator.accept(&result).unwrap();
        assert_eq!(delivery.outcome(), Dispatch::Success { index: 0 });
        assert!(log.lock().unwrap().is_empty());

        assert!(matches!(correlator.accept(&result), Err(Dispatch::Exhausted)));

        delivery.invoke(&result);
        assert_eq!(log.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_abandoned_call_is_not_pending() {
        // ---
        let mut correlator = Correlator::new();
        let log = Log::default();
        let kept = correlator.register(recording_handlers(&log), None);
        let dropped = correlator.register(recording_handlers(&log), Some(3));

        correlator.abandon(dropped);

        assert_eq!(correlator.remaining(dropped), Some(0));
        assert_eq!(correlator.pending_count(), 1);
        assert_eq!(correlator.dispatch(&ok(dropped.get(), "late")), Dispatch::Exhausted);
        assert!(log.lock().unwrap().is_empty());

        // Abandoning the reserved or an unknown id is a no-op.
        correlator.abandon(CallId::NONE);
        correlator.abandon(CallId::from(99));
        assert_eq!(correlator.remaining(kept), Some(1));
    }

    #[test]
    fn test_release_handlers_closes_result_channels() {
        // ---
        let mut correlator = Correlator::new();
        let (handlers, mut rx) = Handlers::channel();
        let id = correlator.register(handlers, Some(2));

        correlator.release_handlers();

        assert!(matches!(
            rx.try_recv(),
            Err(tokio::sync::mpsc::error::TryRecvError::Disconnected)
        ));
        // Slots are still counted; a late result is accepted but reaches no one.
        assert_eq!(correlator.remaining(id), Some(2));
        assert_eq!(correlator.dispatch(&ok(id.get(), "a")), Dispatch::Success { index: 0 });
    }
}
