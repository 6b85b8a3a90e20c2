use serde::{Deserialize, Serialize};
use std::fmt;

/// Wire-level correlation token carried in the `call_id` field.
///
/// Identifiers are assigned by the [`Correlator`](crate::Correlator) in
/// registration order starting at 1. The value 0 is reserved and means
/// "no reply expected".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallId(u64);

impl CallId {
    // ---

    /// The fire-and-forget identifier.
    pub const NONE: CallId = CallId(0);

    /// Raw numeric value as it appears on the wire.
    pub fn get(self) -> u64 {
        // ---
        self.0
    }

    /// Whether this is the reserved fire-and-forget identifier.
    pub fn is_none(self) -> bool {
        // ---
        self.0 == 0
    }

    /// Zero-based registry slot for this identifier, if it has one.
    pub(crate) fn slot(self) -> Option<usize> {
        // ---
        usize::try_from(self.0).ok()?.checked_sub(1)
    }
}

impl fmt::Display for CallId {
    // ---

    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ---
        write!(f, "{}", self.0)
    }
}

impl From<u64> for CallId {
    // ---

    fn from(value: u64) -> Self {
        // ---
        Self(value)
    }
}
