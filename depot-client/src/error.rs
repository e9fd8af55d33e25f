//! Client error type

use std::io;

use depot_common::StatusCode;
use depot_common::framing::FrameError;
use depot_common::validators::FilenameError;
use thiserror::Error;

/// Errors returned by [`DepotClient`](crate::DepotClient)
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server rejected the call
    #[error("{message} ({code})")]
    Status { code: StatusCode, message: String },

    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("timed out waiting for server")]
    Timeout,

    /// The server sent something the client does not understand
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A filename was rejected before contacting the server
    #[error("invalid filename: {0}")]
    InvalidFilename(#[from] FilenameError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ClientError {
    /// Status code of a server rejection
    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ClientError::Status { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<FrameError> for ClientError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::IdleTimeout | FrameError::FrameTimeout => ClientError::Timeout,
            FrameError::Io(message) => ClientError::Io(io::Error::other(message)),
            other => ClientError::Protocol(other.to_string()),
        }
    }
}
