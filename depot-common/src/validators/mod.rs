//! Input validation functions
//!
//! Validators shared between client and server - clients use them for
//! pre-validation, servers use them for enforcement.

mod error;
mod filename;

pub use error::{MAX_ERROR_LENGTH, truncate_error_message};
pub use filename::{
    FilenameError, MAX_FILE_PATH_LENGTH, MAX_FILENAME_LENGTH, base_name, validate_filename,
};
