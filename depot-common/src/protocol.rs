//! Protocol definitions for Depot
//!
//! Control messages are JSON objects tagged by `type`. File bytes never go
//! through JSON: they travel in `FileChunk` frames whose payload is the raw
//! chunk (see [`crate::io`]).
//!
//! Each connection carries exactly one call:
//!
//! **Upload:** `Upload`, `FileInfo`, any number of `FileChunk`, `UploadEnd`
//! → `UploadResponse` or `Error`
//!
//! **Download:** `Download` → any number of `FileChunk`, then `DownloadEnd`
//! or `Error`
//!
//! **List:** `List` → `ListResponse` or `Error`

use serde::{Deserialize, Serialize};

use crate::StatusCode;

/// Client request messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Open an upload call
    Upload,
    /// Name of the file being uploaded - must precede any chunk
    FileInfo { filename: String },
    /// End of the upload stream
    UploadEnd,
    /// Open a download call for a stored file
    Download { filename: String },
    /// Open a list call
    List,
}

/// Server response messages
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Upload committed
    UploadResponse { message: String },
    /// All chunks of a download have been sent
    DownloadEnd,
    /// Stored files
    ListResponse { files: Vec<FileMetadata> },
    /// Terminal failure of the call
    Error { code: StatusCode, message: String },
}

/// A stored file as reported by List
///
/// The store tracks a single modification time, reported as both
/// `created_at` and `updated_at` (unix seconds).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub filename: String,
    pub created_at: i64,
    pub updated_at: i64,
}
