//! Message IDs for request-response correlation

use std::fmt;

use super::MSG_ID_LENGTH;
use super::error::FrameError;

/// A 12-character hex message ID
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageId([u8; MSG_ID_LENGTH]);

impl MessageId {
    /// Generate a new random message ID
    #[must_use]
    pub fn new() -> Self {
        use rand::RngExt;
        let bytes: [u8; MSG_ID_LENGTH / 2] = rand::rng().random();
        let mut id = [0u8; MSG_ID_LENGTH];
        id.copy_from_slice(hex::encode(bytes).as_bytes());
        Self(id)
    }

    /// Parse a message ID from its wire bytes
    ///
    /// # Errors
    ///
    /// Returns `FrameError::InvalidMessageId` unless `bytes` is exactly
    /// 12 ASCII hex digits.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() != MSG_ID_LENGTH || !bytes.iter().all(u8::is_ascii_hexdigit) {
            return Err(FrameError::InvalidMessageId);
        }
        let mut id = [0u8; MSG_ID_LENGTH];
        id.copy_from_slice(bytes);
        id.make_ascii_lowercase();
        Ok(Self(id))
    }

    /// The wire bytes of this ID
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            write!(f, "{}", b as char)?;
        }
        Ok(())
    }
}

impl fmt::Debug for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageId({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_hex() {
        let id = MessageId::new();
        assert_eq!(id.as_bytes().len(), MSG_ID_LENGTH);
        assert!(id.as_bytes().iter().all(u8::is_ascii_hexdigit));
    }

    #[test]
    fn test_new_ids_differ() {
        assert_ne!(MessageId::new(), MessageId::new());
    }

    #[test]
    fn test_from_bytes_normalizes_case() {
        let upper = MessageId::from_bytes(b"A1B2C3D4E5F6").unwrap();
        let lower = MessageId::from_bytes(b"a1b2c3d4e5f6").unwrap();
        assert_eq!(upper, lower);
        assert_eq!(upper.to_string(), "a1b2c3d4e5f6");
    }

    #[test]
    fn test_from_bytes_rejects_bad_input() {
        assert_eq!(
            MessageId::from_bytes(b"a1b2c3"),
            Err(FrameError::InvalidMessageId)
        );
        assert_eq!(
            MessageId::from_bytes(b"zzzzzzzzzzzz"),
            Err(FrameError::InvalidMessageId)
        );
    }
}
