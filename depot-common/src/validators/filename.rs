//! Stored filename validation
//!
//! The store is a single flat namespace, so a client-supplied filename must
//! already be a bare base name. Anything that carries a directory component
//! is rejected rather than silently reduced.

use thiserror::Error;

/// Maximum length for stored filenames in bytes
pub const MAX_FILENAME_LENGTH: usize = 255;

/// Maximum length of a candidate filename accepted on the wire
///
/// Candidates longer than a bare filename are still carried so they can be
/// rejected by [`validate_filename`] with a precise error.
pub const MAX_FILE_PATH_LENGTH: usize = 4096;

/// Validation error for filenames
///
/// The messages are what clients see in `InvalidArgument` responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FilenameError {
    /// Name is empty, or nothing remains once separators are stripped
    #[error("filename is required")]
    Empty,
    /// Name contains a directory component, or is `.` / `..`
    #[error("filename must not contain path")]
    ContainsPath,
    #[error("filename is too long")]
    TooLong,
    #[error("filename contains invalid characters")]
    ContainsNull,
    /// Name contains control characters
    #[error("filename contains invalid characters")]
    InvalidCharacters,
}

/// Final component of `name`, treating both `/` and `\` as separators
///
/// Trailing separators are ignored, so `"a/b/"` yields `"b"`. A name made
/// only of separators yields `""`.
#[must_use]
pub fn base_name(name: &str) -> &str {
    let is_separator = |c: char| c == '/' || c == '\\';
    let trimmed = name.trim_end_matches(is_separator);
    match trimmed.rfind(is_separator) {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

/// Validate a client-supplied filename
///
/// Checks:
/// - Not empty
/// - Equal to its own base name (no `/` or `\`)
/// - Not `.` or `..`
/// - Does not exceed maximum length (255 bytes)
/// - No null bytes
/// - No control characters
///
/// # Errors
///
/// Returns a `FilenameError` variant describing the validation failure.
pub fn validate_filename(name: &str) -> Result<(), FilenameError> {
    if name.is_empty() {
        return Err(FilenameError::Empty);
    }

    let base = base_name(name);
    if base.is_empty() {
        return Err(FilenameError::Empty);
    }
    if base != name || base == "." || base == ".." {
        return Err(FilenameError::ContainsPath);
    }

    if name.len() > MAX_FILENAME_LENGTH {
        return Err(FilenameError::TooLong);
    }

    for ch in name.chars() {
        if ch == '\0' {
            return Err(FilenameError::ContainsNull);
        }
        if ch.is_control() {
            return Err(FilenameError::InvalidCharacters);
        }
    }

    Ok(())
}
