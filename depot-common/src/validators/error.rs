//! Error message validation constants

/// Maximum length for error messages in `Error` responses (bytes)
///
/// Longer messages are truncated by the sender.
pub const MAX_ERROR_LENGTH: usize = 2048;

/// Truncate an error message to [`MAX_ERROR_LENGTH`] on a char boundary
#[must_use]
pub fn truncate_error_message(message: &str) -> &str {
    if message.len() <= MAX_ERROR_LENGTH {
        return message;
    }
    let mut end = MAX_ERROR_LENGTH;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    &message[..end]
}
