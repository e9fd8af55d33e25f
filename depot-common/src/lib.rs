//! Depot Common Library
//!
//! Wire framing, protocol messages, status codes and validators shared by
//! the Depot server and client.

pub mod framing;
pub mod io;
pub mod protocol;
mod status;
pub mod validators;

pub use status::StatusCode;

/// Default port for Depot connections
pub const DEFAULT_PORT: u16 = 7600;

/// Size of the chunks file contents are split into when streamed (64 KiB)
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Largest `FileChunk` payload a peer will accept (4 MiB)
///
/// Senders use [`CHUNK_SIZE`]; the larger receive limit tolerates peers that
/// choose bigger chunks.
pub const MAX_CHUNK_SIZE: usize = 4 * 1024 * 1024;
