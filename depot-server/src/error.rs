//! Call errors
//!
//! Every failure of an Upload, Download or List call is a [`CallError`]: a
//! [`StatusCode`] plus the human-readable message sent to the client.

use depot_common::StatusCode;
use thiserror::Error;

use crate::constants::{ERR_CANCELLED, ERR_DEADLINE_EXCEEDED};

/// Terminal failure of a call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} ({code})")]
pub struct CallError {
    /// Machine-readable category
    pub code: StatusCode,
    /// Message sent to the client
    pub message: String,
}

impl CallError {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(StatusCode::InvalidArgument, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NotFound, message)
    }

    pub fn resource_exhausted(message: impl Into<String>) -> Self {
        Self::new(StatusCode::ResourceExhausted, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::Internal, message)
    }

    /// The call was cancelled (client gone, server shutting down)
    pub fn cancelled() -> Self {
        Self::new(StatusCode::Cancelled, ERR_CANCELLED)
    }

    /// The call outlived its deadline
    pub fn deadline_exceeded() -> Self {
        Self::new(StatusCode::Cancelled, ERR_DEADLINE_EXCEEDED)
    }

    /// `file <name> not found`
    pub fn file_not_found(filename: &str) -> Self {
        Self::not_found(format!("file {filename} not found"))
    }
}
