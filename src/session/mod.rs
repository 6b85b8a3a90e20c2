// src/session/mod.rs
//! Host-side console session.
//!
//! [`ConsoleSession`] is what a page embedding the console talks to. It
//! posts `init`, `query` and `input` commands to the console window and
//! routes every result the console posts back to the call that asked for
//! it.
//!
//! # Architecture
//!
//! The session owns one [`Correlator`] and one transport. On construction
//! it subscribes to its host address and starts a receive loop (see
//! [`run_consumer`](crate::run_consumer)) that parses inbound messages and
//! hands them to the correlator in delivery order.
//!
//! Each command that expects results is registered before it is posted, so
//! a reply can never overtake its own registration.
//!
//! # Concurrency
//!
//! Calls may be issued from any task. The registry is behind a mutex held
//! only for registration and slot bookkeeping; result handlers run outside
//! it.

mod receiver;

use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use receiver::ResultReceiver;

use crate::{
    // ---
    log_debug,
    Action,
    Address,
    CallId,
    CallResult,
    Command,
    ConsoleConfig,
    Correlator,
    Envelope,
    Handlers,
    Result,
    Subscription,
    TransportPtr,
};

/// Acquire a mutex guard, ignoring poisoning.
///
/// A panic inside a result handler never happens under this lock, and the
/// registry has no invariants spanning entries; at worst a slot count is
/// off by one for the call that was being accepted.
fn lock_ignore_poison<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    // ---
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Running console session.
///
/// Cheap to clone (internally `Arc`-backed).
#[derive(Clone)]
pub struct ConsoleSession {
    inner: Arc<Inner>,
}

struct Inner {
    // ---
    transport: TransportPtr,
    config: ConsoleConfig,
    correlator: Arc<Mutex<Correlator>>,

    /// Receive loop handle; the loop ends when the transport closes.
    _rx_task: JoinHandle<Result<()>>,
}

impl ConsoleSession {
    // ---

    /// Create a session on an explicitly provided transport.
    ///
    /// # Errors
    ///
    /// Returns `ConsoleError::Transport` if the host address cannot be
    /// subscribed.
    pub async fn with_transport(transport: TransportPtr, config: ConsoleConfig) -> Result<Self> {
        // ---
        let correlator = Arc::new(Mutex::new(Correlator::new()));

        let receiver = ResultReceiver::new(
            Subscription::from(config.host_address.as_str()),
            correlator.clone(),
        );
        let rx_task = crate::run_consumer(transport.clone(), receiver).await?;

        log_debug!(
            "console session {} listening on {}",
            config.session_id,
            config.host_address
        );

        Ok(Self {
            inner: Arc::new(Inner {
                transport,
                config,
                correlator,
                _rx_task: rx_task,
            }),
        })
    }

    /// Create a session on the crate-default transport for `config`.
    ///
    /// # Errors
    ///
    /// Returns `ConsoleError::Transport` if the transport cannot be created
    /// or subscribed.
    pub async fn new(config: ConsoleConfig) -> Result<Self> {
        // ---
        let transport = crate::create_transport(&config).await?;
        Self::with_transport(transport, config).await
    }

    /// Send an `init` command carrying `params`.
    ///
    /// Expects one result. With empty `handlers` the command is sent with
    /// `call_id` 0 and no result is tracked.
    ///
    /// # Errors
    ///
    /// - `ConsoleError::Serialization` if `params` cannot be serialized
    /// - `ConsoleError::Transport` if the command cannot be posted
    pub async fn init<P>(&self, params: P, handlers: Handlers) -> Result<CallId>
    where
        P: Serialize,
    {
        // ---
        let data = serde_json::to_value(params)?;
        self.call(Action::Init, data, handlers, 1).await
    }

    /// Send a `query` command for a batch of queries.
    ///
    /// Expects one result per query (at least one). Results may arrive in
    /// any order; each carries its sequence index within the batch.
    ///
    /// # Errors
    ///
    /// - `ConsoleError::Transport` if the command cannot be posted
    pub async fn query<I, S>(&self, queries: I, handlers: Handlers) -> Result<CallId>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        // ---
        let queries: Vec<String> = queries.into_iter().map(Into::into).collect();
        let expected = queries.len();

        self.call(Action::Query, Value::from(queries), handlers, expected)
            .await
    }

    /// Place `query` in the console's input field. No result is expected.
    ///
    /// # Errors
    ///
    /// - `ConsoleError::Transport` if the command cannot be posted
    pub async fn input(&self, query: impl Into<String>) -> Result<()> {
        // ---
        let data = Value::from(vec![query.into()]);
        self.send(Action::Input, data, CallId::NONE).await
    }

    /// Like [`init`](Self::init), delivering the result through a [`Replies`] stream.
    pub async fn init_replies<P>(&self, params: P) -> Result<Replies>
    where
        P: Serialize,
    {
        // ---
        let (handlers, rx) = Handlers::channel();
        let call_id = self.init(params, handlers).await?;

        Ok(Replies::new(call_id, 1, rx))
    }

    /// Like [`query`](Self::query), delivering results through a [`Replies`] stream.
    pub async fn query_replies<I, S>(&self, queries: I) -> Result<Replies>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        // ---
        let queries: Vec<String> = queries.into_iter().map(Into::into).collect();
        let expected = queries.len().max(1);

        let (handlers, rx) = Handlers::channel();
        let call_id = self.query(queries, handlers).await?;

        Ok(Replies::new(call_id, expected, rx))
    }

    /// Number of registered calls still waiting for results.
    pub fn pending_calls(&self) -> usize {
        lock_ignore_poison(&self.inner.correlator).pending_count()
    }

    /// Results still expected for `call_id`, if it was ever registered.
    pub fn remaining(&self, call_id: CallId) -> Option<usize> {
        lock_ignore_poison(&self.inner.correlator).remaining(call_id)
    }

    /// The configuration this session was created with.
    pub fn config(&self) -> &ConsoleConfig {
        &self.inner.config
    }

    /// The transport this session posts on.
    pub fn transport(&self) -> TransportPtr {
        self.inner.transport.clone()
    }

    /// Close the underlying transport, ending the receive loop.
    ///
    /// Calls still pending are never completed. Their handlers are dropped,
    /// so open [`Replies`] streams end.
    pub async fn close(&self) -> Result<()> {
        // ---
        let closed = self.inner.transport.close().await;
        lock_ignore_poison(&self.inner.correlator).release_handlers();
        closed
    }

    /// Register a call, then post its command.
    ///
    /// A call whose command could not be posted is abandoned so it never
    /// shows up as pending.
    async fn call(
        &self,
        action: Action,
        data: Value,
        handlers: Handlers,
        expected: usize,
    ) -> Result<CallId> {
        // ---
        let call_id = lock_ignore_poison(&self.inner.correlator).register(handlers, Some(expected));

        if let Err(err) = self.send(action, data, call_id).await {
            if !call_id.is_none() {
                lock_ignore_poison(&self.inner.correlator).abandon(call_id);
            }
            return Err(err);
        }

        Ok(call_id)
    }

    async fn send(&self, action: Action, data: Value, call_id: CallId) -> Result<()> {
        // ---
        let command = Command::new(action, data, call_id);
        let env = Envelope::new(
            Address::from(self.inner.config.frame_address.as_str()),
            command.to_bytes()?,
        )
        .with_source(Address::from(self.inner.config.host_address.as_str()));

        log_debug!("posting {action:?} with call_id {call_id}");
        self.inner.transport.publish(env).await
    }
}

/// Stream of results for a single call.
///
/// Yields at most the call's expected number of results, each tagged with
/// its sequence index, then ends. Also ends early if the session's
/// transport closes.
pub struct Replies {
    // ---
    call_id: CallId,
    expected: usize,
    received: usize,
    rx: mpsc::UnboundedReceiver<CallResult>,
}

impl Replies {
    // ---

    fn new(call_id: CallId, expected: usize, rx: mpsc::UnboundedReceiver<CallResult>) -> Self {
        // ---
        Self {
            call_id,
            expected,
            received: 0,
            rx,
        }
    }

    /// The `call_id` the command was sent with.
    pub fn call_id(&self) -> CallId {
        self.call_id
    }

    /// Number of results the call expects.
    pub fn expected(&self) -> usize {
        self.expected
    }

    /// Next result, or `None` once all expected results were received or
    /// the session closed.
    pub async fn recv(&mut self) -> Option<CallResult> {
        // ---
        if self.received >= self.expected {
            return None;
        }

        let result = self.rx.recv().await?;
        self.received += 1;
        Some(result)
    }

    /// Wait for every expected result, in arrival order.
    pub async fn collect(mut self) -> Vec<CallResult> {
        // ---
        let mut results = Vec::with_capacity(self.expected);
        while let Some(result) = self.recv().await {
            results.push(result);
        }
        results
    }
}
