//! Request/response correlation between a host page and an embedded query console
//!
//! A page that embeds a remote console talks to it over a single message
//! channel. Commands go out tagged with a `call_id`; the console echoes that
//! `call_id` on every result it posts back. This crate assigns the
//! identifiers, keeps a registry of the calls waiting for results, and routes
//! each result to the right success or error handler together with its
//! position in the batch.
//!
//! ```no_run
//! use console_bridge::{ConsoleConfig, ConsoleSession, Handlers};
//!
//! # async fn example() -> console_bridge::Result<()> {
//! let session = ConsoleSession::new(ConsoleConfig::memory("docs")).await?;
//!
//! session
//!     .query(
//!         ["CREATE (n {name: 'x'})", "MATCH (n) RETURN n"],
//!         Handlers::new()
//!             .on_success(|result, index| println!("#{index}: {:?}", result.fields))
//!             .on_error(|result, index| eprintln!("#{index} failed: {:?}", result.error)),
//!     )
//!     .await?;
//!
//! session.input("MATCH (n) RETURN count(n)").await?;
//! # Ok(())
//! # }
//! ```

// Import all sub modules once...
mod correlator;
mod domain;
mod protocol;
mod session;
mod transport;

mod console_config;

mod error;
mod macros;

pub(crate) use macros::{log_debug, log_info, log_warn};

// Re-export main types
pub use correlator::{Correlator, Delivery, Dispatch, Handlers, ResultCallback};
pub use session::{ConsoleSession, Replies};

pub use console_config::{ConsoleConfig, DEFAULT_INBOX_CAPACITY};

pub use error::{ConsoleError, Result};

pub use protocol::{Action, CallId, CallResult, Command, InboundResult};

pub use transport::{create_memory_transport, run_consumer, TransportConsumer};

// --- public re-exports
pub use domain::{
    //
    Address,
    Envelope,
    Subscription,
    SubscriptionHandle,
    Transport,
    TransportPtr,
};

/// Create the transport selected for `config`.
///
/// The in-memory channel is the only transport built in; embedders bridging
/// to a real window system implement [`Transport`] and use
/// [`ConsoleSession::with_transport`].
pub async fn create_transport(config: &ConsoleConfig) -> Result<TransportPtr> {
    // ---
    log_info!("creating memory transport for session {}", config.session_id);
    create_memory_transport(config).await
}
