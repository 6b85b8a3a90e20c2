//! Console session configuration.
//!
//! Names the two windows taking part in the conversation and sizes the
//! in-memory inboxes. Nothing here describes how the embedded console is
//! rendered or where it is loaded from.

/// Default number of envelopes buffered per subscription.
pub const DEFAULT_INBOX_CAPACITY: usize = 16;

/// Addresses and channel settings for a console session.
///
/// # Example
///
/// ```
/// use console_bridge::ConsoleConfig;
///
/// let config = ConsoleConfig::memory("cypher-docs").with_inbox_capacity(64);
///
/// assert_eq!(config.host_address, "host/cypher-docs");
/// assert_eq!(config.frame_address, "console/cypher-docs");
/// ```
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    // ---
    /// Identifier of this session, used for logging and default addresses.
    pub session_id: String,

    /// Window the session listens on for results.
    ///
    /// Sent as the `source` of every outbound envelope so the console knows
    /// where to reply.
    pub host_address: String,

    /// Window the embedded console listens on for commands.
    pub frame_address: String,

    /// Buffered envelopes per subscription (minimum 1).
    pub inbox_capacity: usize,
}

impl ConsoleConfig {
    /// Config for an in-process channel with addresses derived from `session_id`.
    ///
    /// - `host_address`: `host/{session_id}`
    /// - `frame_address`: `console/{session_id}`
    pub fn memory(session_id: impl Into<String>) -> Self {
        // ---
        let session_id = session_id.into();
        Self {
            host_address: format!("host/{session_id}"),
            frame_address: format!("console/{session_id}"),
            session_id,
            inbox_capacity: DEFAULT_INBOX_CAPACITY,
        }
    }

    /// Override the address results are received on.
    pub fn with_host_address(mut self, address: impl Into<String>) -> Self {
        self.host_address = address.into();
        self
    }

    /// Override the address commands are posted to.
    pub fn with_frame_address(mut self, address: impl Into<String>) -> Self {
        self.frame_address = address.into();
        self
    }

    /// Set the per-subscription inbox capacity.
    pub fn with_inbox_capacity(mut self, capacity: usize) -> Self {
        self.inbox_capacity = capacity;
        self
    }
}
