//! Server constants and user-facing messages

use std::time::Duration;

// =============================================================================
// Paths
// =============================================================================

/// Directory name under the platform data dir
pub const DATA_DIR_NAME: &str = "depotd";

/// Store directory name under [`DATA_DIR_NAME`]
pub const FILES_DIR_NAME: &str = "files";

// =============================================================================
// Admission
// =============================================================================

/// Default number of concurrent upload and download calls
pub const DEFAULT_TRANSFER_CAPACITY: usize = 10;

/// Default number of concurrent list calls
pub const DEFAULT_LIST_CAPACITY: usize = 100;

/// Name of the pool shared by uploads and downloads
pub const TRANSFER_POOL: &str = "transfer";

/// Name of the pool used by list calls
pub const LIST_POOL: &str = "list";

// =============================================================================
// Timeouts
// =============================================================================

/// How long to wait for in-flight calls after shutdown is requested
pub const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// How long to keep reading a rejected upload so the client sees the error
pub const REJECTED_UPLOAD_DRAIN: Duration = Duration::from_secs(2);

// =============================================================================
// Call errors
// =============================================================================

pub const ERR_TOO_MANY_UPLOADS: &str = "too many concurrent uploads";
pub const ERR_TOO_MANY_DOWNLOADS: &str = "too many concurrent downloads";
pub const ERR_TOO_MANY_LISTS: &str = "too many concurrent list requests";

pub const ERR_INFO_ALREADY_RECEIVED: &str = "file info already received";
pub const ERR_INFO_FIRST: &str = "file info must be sent first";
pub const ERR_INFO_NOT_RECEIVED: &str = "file info not received";
pub const ERR_UPLOAD_EMPTY: &str = "uploaded file is empty";
pub const ERR_UPLOAD_CLOSED: &str = "upload already finished";


pub const ERR_CREATE_FILE: &str = "failed to create file: ";
pub const ERR_WRITE_CHUNK: &str = "failed to write chunk: ";
pub const ERR_FINISH_FILE: &str = "failed to finish file: ";
pub const ERR_READ_FILE: &str = "failed to read file: ";
pub const ERR_READ_FILES: &str = "failed to read files: ";
pub const ERR_SEND_CHUNK: &str = "failed to send chunk: ";
pub const ERR_SEND_RESPONSE: &str = "failed to send response: ";

pub const ERR_CANCELLED: &str = "call cancelled";
pub const ERR_DEADLINE_EXCEEDED: &str = "deadline exceeded";
pub const ERR_CLIENT_DISCONNECTED: &str = "client disconnected before the upload finished";
pub const ERR_CLIENT_TIMEOUT: &str = "timed out waiting for client";
pub const ERR_INVALID_FRAME: &str = "invalid frame: ";
pub const ERR_UNEXPECTED_MESSAGE: &str = "unexpected message: ";
pub const ERR_MESSAGE_ID_MISMATCH: &str = "frame belongs to a different call";
pub const ERR_UNEXPECTED_OPENING: &str = "a call must start with Upload, Download or List";

/// Prefix of the message returned by a committed upload
pub const MSG_UPLOAD_SUCCESS: &str = "file uploaded successfully: ";

// =============================================================================
// Startup
// =============================================================================

pub const ERR_NO_FILE_ROOT: &str = "could not determine the platform data directory";
pub const ERR_CREATE_FILE_ROOT: &str = "failed to create file root ";
pub const ERR_FILE_ROOT_CANONICALIZE: &str = "failed to resolve file root: ";
pub const ERR_SIGNAL_SIGTERM: &str = "failed to install SIGTERM handler";
pub const ERR_SIGNAL_SIGINT: &str = "failed to install SIGINT handler";
pub const ERR_SIGNAL_CTRLC: &str = "failed to listen for Ctrl+C";
pub const ERR_BIND: &str = "failed to bind ";

pub const MSG_BANNER: &str = "depotd v";
pub const MSG_FILE_ROOT: &str = "file root: ";
