//! Machine-readable status codes for failed calls
//!
//! Every failed Upload, Download or List call ends with an `Error` message
//! carrying one of these codes, so clients can tell a busy server from a bad
//! request without parsing the human-readable message.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Outcome category of a failed call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    /// The request was malformed or out of order (bad filename, frames in the
    /// wrong order, empty upload)
    InvalidArgument,

    /// The requested file does not exist
    NotFound,

    /// The relevant admission pool was full; retrying later may succeed
    ResourceExhausted,

    /// Storage or transport failure on the server
    Internal,

    /// The call was cancelled or its deadline expired
    Cancelled,
}

impl StatusCode {
    /// Convert to the string representation used in protocol messages
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidArgument => "invalid_argument",
            Self::NotFound => "not_found",
            Self::ResourceExhausted => "resource_exhausted",
            Self::Internal => "internal",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
