use thiserror::Error;

/// Errors that can occur while talking to the embedded console
#[derive(Error, Debug)]
pub enum ConsoleError {
    /// JSON serialization or deserialization failed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The message channel rejected a publish or subscription
    #[error("transport error: {0}")]
    Transport(String),

    /// Inbound message carried a `call_id` that is not a non-negative integer
    #[error("invalid call_id: {0}")]
    InvalidCallId(String),

    /// Inbound message could not be interpreted as a result envelope
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

/// Result type alias for console operations
pub type Result<T> = std::result::Result<T, ConsoleError>;
