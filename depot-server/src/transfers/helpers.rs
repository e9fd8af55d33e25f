//! Helper utilities shared by uploads and downloads

use depot_common::validators;

use crate::error::CallError;

/// Validate a client-supplied filename, mapping failures to `InvalidArgument`
pub(crate) fn validate_transfer_filename(filename: &str) -> Result<(), CallError> {
    validators::validate_filename(filename).map_err(|e| CallError::invalid_argument(e.to_string()))
}

/// Generate a short random ID used to correlate log lines of one call
pub(crate) fn generate_transfer_id() -> String {
    use rand::RngExt;
    let bytes: [u8; 4] = rand::rng().random();
    hex::encode(bytes)
}
