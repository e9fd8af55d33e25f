//! Framing errors

use std::io;

use thiserror::Error;

/// Errors produced while reading or writing frames
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("I/O error: {0}")]
    Io(String),
    #[error("connection closed")]
    ConnectionClosed,
    #[error("frame timed out")]
    FrameTimeout,
    #[error("idle timeout waiting for frame")]
    IdleTimeout,
    #[error("invalid magic bytes")]
    InvalidMagic,
    #[error("invalid type length")]
    InvalidTypeLength,
    #[error("type length has too many digits")]
    TypeLengthTooManyDigits,
    #[error("type length out of range")]
    TypeLengthOutOfRange,
    #[error("unknown message type: {0}")]
    UnknownMessageType(String),
    #[error("missing delimiter")]
    MissingDelimiter,
    #[error("invalid message ID")]
    InvalidMessageId,
    #[error("invalid payload length")]
    InvalidPayloadLength,
    #[error("payload length has too many digits")]
    PayloadLengthTooManyDigits,
    #[error("payload length {length} exceeds maximum {max} for {message_type}")]
    PayloadLengthExceedsTypeMax {
        message_type: String,
        length: u64,
        max: u64,
    },
    #[error("missing frame terminator")]
    MissingTerminator,
    #[error("invalid JSON: {0}")]
    InvalidJson(String),
}

impl From<io::Error> for FrameError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => FrameError::ConnectionClosed,
            _ => FrameError::Io(err.to_string()),
        }
    }
}
