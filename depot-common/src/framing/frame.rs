//! Raw frame representation

use super::message_id::MessageId;
use super::{DELIMITER, MAGIC, TERMINATOR};

/// A complete frame as read from or written to the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    pub message_id: MessageId,
    /// Type name, e.g. `FileInfo` or `FileChunk`
    pub message_type: String,
    /// JSON for control messages, raw bytes for chunks
    pub payload: Vec<u8>,
}

impl RawFrame {
    pub fn new(message_id: MessageId, message_type: String, payload: Vec<u8>) -> Self {
        Self {
            message_id,
            message_type,
            payload,
        }
    }

    /// Wire representation of the whole frame
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = encode_header(
            &self.message_type,
            &self.message_id,
            self.payload.len() as u64,
        );
        bytes.reserve(self.payload.len() + 1);
        bytes.extend_from_slice(&self.payload);
        bytes.push(TERMINATOR);
        bytes
    }
}

/// Everything before the payload: `DP|<type_len>|<type>|<msg_id>|<payload_len>|`
pub(crate) fn encode_header(message_type: &str, message_id: &MessageId, payload_len: u64) -> Vec<u8> {
    let mut header = Vec::with_capacity(MAGIC.len() + message_type.len() + 40);
    header.extend_from_slice(MAGIC);
    for field in [
        message_type.len().to_string().as_bytes(),
        message_type.as_bytes(),
        message_id.as_bytes(),
        payload_len.to_string().as_bytes(),
    ] {
        header.extend_from_slice(field);
        header.push(DELIMITER);
    }
    header
}
