use crate::protocol::CallId;
use crate::{ConsoleError, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Command verbs understood by the embedded console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Load an initial dataset / setup script.
    Init,
    /// Execute a batch of queries, one result per query.
    Query,
    /// Place a query in the console's input field without running it.
    Input,
}

/// Outbound command envelope: `{ "action", "data", "call_id" }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    pub action: Action,
    pub data: Value,
    pub call_id: CallId,
}

impl Command {
    // ---

    pub fn new(action: Action, data: Value, call_id: CallId) -> Self {
        // ---
        Self {
            action,
            data,
            call_id,
        }
    }

    /// Serialize to the JSON bytes posted to the console window.
    pub fn to_bytes(&self) -> Result<Bytes> {
        // ---
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }
}

/// Inbound result envelope: `{ "call_id", "error"?, ...fields }`.
///
/// Everything other than `call_id` and `error` is kept verbatim in
/// [`fields`](Self::fields); the bridge never interprets result bodies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundResult {
    pub call_id: CallId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl InboundResult {
    // ---

    /// Build a successful result (frame side).
    pub fn success(call_id: CallId, fields: Map<String, Value>) -> Self {
        // ---
        Self {
            call_id,
            error: None,
            fields,
        }
    }

    /// Build a failed result carrying `error` (frame side).
    pub fn failure(call_id: CallId, error: impl Into<Value>) -> Self {
        // ---
        Self {
            call_id,
            error: Some(error.into()),
            fields: Map::new(),
        }
    }

    /// Attach an extra result field.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        // ---
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Parse a raw inbound message.
    ///
    /// Returns `Ok(None)` for messages that are not addressed at all: JSON
    /// objects without a `call_id` member. Such messages belong to some other
    /// conversation on the same channel and are ignored entirely.
    ///
    /// # Errors
    ///
    /// - `ConsoleError::Serialization` if the payload is not JSON
    /// - `ConsoleError::InvalidMessage` if the payload is not a JSON object
    /// - `ConsoleError::InvalidCallId` if `call_id` is not a non-negative integer
    pub fn parse(payload: &[u8]) -> Result<Option<Self>> {
        // ---
        let value: Value = serde_json::from_slice(payload)?;

        let mut map = match value {
            Value::Object(map) => map,
            other => {
                return Err(ConsoleError::InvalidMessage(format!(
                    "expected a JSON object, got {other}"
                )));
            }
        };

        let Some(raw_id) = map.remove("call_id") else {
            return Ok(None);
        };

        let call_id = raw_id
            .as_u64()
            .map(CallId::from)
            .ok_or_else(|| ConsoleError::InvalidCallId(raw_id.to_string()))?;

        let error = match map.remove("error") {
            Some(Value::Null) | None => None,
            Some(err) => Some(err),
        };

        Ok(Some(Self {
            call_id,
            error,
            fields: map,
        }))
    }

    /// Whether the result carries an application-level error.
    ///
    /// Follows the console's truthiness rules: `null`, `false`, `0` and `""`
    /// do not count as errors.
    pub fn is_error(&self) -> bool {
        // ---
        match &self.error {
            None | Some(Value::Null) => false,
            Some(Value::Bool(flag)) => *flag,
            Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
            Some(Value::String(s)) => !s.is_empty(),
            Some(Value::Array(_)) | Some(Value::Object(_)) => true,
        }
    }

    /// Look up a result field by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        // ---
        self.fields.get(name)
    }

    /// Serialize to the JSON bytes posted back to the host window.
    pub fn to_bytes(&self) -> Result<Bytes> {
        // ---
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }
}

/// A single delivery for a registered call, tagged by outcome.
///
/// `index` is the zero-based position of this result within the call's
/// expected batch. For a batch of `k`, the indices delivered are exactly
/// `0..k`, each once, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum CallResult {
    Success { result: InboundResult, index: usize },
    Error { result: InboundResult, index: usize },
}

impl CallResult {
    // ---

    pub fn index(&self) -> usize {
        // ---
        match self {
            CallResult::Success { index, .. } | CallResult::Error { index, .. } => *index,
        }
    }

    pub fn result(&self) -> &InboundResult {
        // ---
        match self {
            CallResult::Success { result, .. } | CallResult::Error { result, .. } => result,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, CallResult::Error { .. })
    }
}
