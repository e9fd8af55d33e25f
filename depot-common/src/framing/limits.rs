//! Per-type payload limits for protocol messages
//!
//! Each direction of a connection has its own table. A server never accepts
//! a server message type and a client never accepts a client message type,
//! so every frame a peer can send is bounded before its payload is read.

use std::collections::HashMap;
use std::sync::LazyLock;

use crate::MAX_CHUNK_SIZE;
use crate::validators::{MAX_ERROR_LENGTH, MAX_FILE_PATH_LENGTH, MAX_FILENAME_LENGTH};

/// Largest `ListResponse` payload a client will accept (64 MiB)
pub const MAX_LIST_RESPONSE_SIZE: u64 = 64 * 1024 * 1024;

/// Which way the frames being read are travelling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Frames sent by a client, read by the server
    ToServer,
    /// Frames sent by the server, read by a client
    ToClient,
}

/// Apply 20% padding to a limit for safety margin
const fn pad_limit(base: u64) -> u64 {
    (base * 6) / 5
}

// JSON limits match the largest serialization the validators allow, plus 20%.
// `FileInfo` and `Download` are sized for a full path rather than a bare
// filename so that a path-bearing name reaches the filename validator and is
// rejected with a proper status instead of a framing error.
static TO_SERVER_LIMITS: LazyLock<HashMap<&'static str, u64>> = LazyLock::new(|| {
    let path = MAX_FILE_PATH_LENGTH as u64;
    HashMap::from([
        ("Upload", pad_limit(17)), // {"type":"Upload"}
        ("FileInfo", pad_limit(path + 33)), // {"type":"FileInfo","filename":"..."}
        ("UploadEnd", pad_limit(20)), // {"type":"UploadEnd"}
        ("Download", pad_limit(path + 33)), // {"type":"Download","filename":"..."}
        ("List", pad_limit(15)), // {"type":"List"}
        ("FileChunk", MAX_CHUNK_SIZE as u64), // raw bytes, never padded
    ])
});

static TO_CLIENT_LIMITS: LazyLock<HashMap<&'static str, u64>> = LazyLock::new(|| {
    let name = MAX_FILENAME_LENGTH as u64;
    HashMap::from([
        // "file uploaded successfully: <name>", every byte possibly escaped
        ("UploadResponse", pad_limit(2 * name + 68)),
        ("DownloadEnd", pad_limit(22)), // {"type":"DownloadEnd"}
        ("ListResponse", MAX_LIST_RESPONSE_SIZE),
        ("Error", pad_limit(MAX_ERROR_LENGTH as u64 + 60)), // code (18) + message + overhead
        ("FileChunk", MAX_CHUNK_SIZE as u64),
    ])
});

fn limits(direction: Direction) -> &'static HashMap<&'static str, u64> {
    match direction {
        Direction::ToServer => &TO_SERVER_LIMITS,
        Direction::ToClient => &TO_CLIENT_LIMITS,
    }
}

/// Maximum payload size for `message_type` travelling in `direction`
///
/// `None` if the type may not be sent that way.
#[must_use]
pub fn max_payload(direction: Direction, message_type: &str) -> Option<u64> {
    limits(direction).get(message_type).copied()
}
