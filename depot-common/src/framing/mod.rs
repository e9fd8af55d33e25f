//! Wire framing for the Depot protocol
//!
//! Every message travels as a single frame:
//!
//! ```text
//! DP|<type_len>|<type>|<msg_id>|<payload_len>|<payload>\n
//! ```
//!
//! - `type_len` is the decimal length of `type` (at most 3 digits)
//! - `type` is the message type name, which must be allowed in the frame's
//!   direction (see [`limits`])
//! - `msg_id` is 12 lowercase hex characters
//! - `payload_len` is the decimal payload length (at most 20 digits)
//! - `payload` is JSON for control messages or raw bytes for `FileChunk`

mod error;
mod frame;
pub mod limits;
mod message_id;
mod reader;
mod writer;

pub use error::FrameError;
pub use frame::RawFrame;
pub use limits::Direction;
pub use message_id::MessageId;
pub use reader::{
    DEFAULT_FRAME_TIMEOUT, DEFAULT_IDLE_TIMEOUT, DEFAULT_PROGRESS_TIMEOUT, FrameHeader,
    FrameReader,
};
pub use writer::FrameWriter;

/// Magic prefix including the first delimiter
pub const MAGIC: &[u8; 3] = b"DP|";

/// Field delimiter
pub const DELIMITER: u8 = b'|';

/// Frame terminator
pub const TERMINATOR: u8 = b'\n';

/// Length of a message ID in bytes (hex characters)
pub const MSG_ID_LENGTH: usize = 12;

/// Maximum length of a message type name
pub const MAX_TYPE_LENGTH: usize = 64;

/// Maximum number of digits in the type length field
pub const MAX_TYPE_LENGTH_DIGITS: usize = 3;

/// Maximum number of digits in the payload length field (fits any u64)
pub const MAX_PAYLOAD_LENGTH_DIGITS: usize = 20;
