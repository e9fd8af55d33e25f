//! Client constants and user-facing messages

use std::time::Duration;

/// Default server address
pub const DEFAULT_ADDR: &str = "127.0.0.1:7600";

/// Default time allowed for one call
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Suffix for incomplete downloads
pub const PART_SUFFIX: &str = ".part";

pub const ERR_CONNECTION_CLOSED: &str = "server closed the connection";
pub const ERR_MESSAGE_ID_MISMATCH: &str = "response does not match the request";
pub const ERR_UNEXPECTED_RESPONSE: &str = "unexpected response: ";
pub const ERR_NO_LOCAL_NAME: &str = "cannot derive a file name from ";


pub const MSG_NO_FILES: &str = "no files found";
pub const MSG_LIST_HEADER: &str = "NAME\tCREATED\tUPDATED";
