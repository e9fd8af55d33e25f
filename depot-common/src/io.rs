//! Message-level reads and writes on top of the frame codec
//!
//! Control messages travel as JSON payloads whose frame type names the enum
//! variant. File bytes travel raw in `FileChunk` frames. Both directions
//! share the same machinery through [`WireMessage`].

use std::io;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

use crate::framing::{
    DEFAULT_FRAME_TIMEOUT, DEFAULT_IDLE_TIMEOUT, FrameError, FrameReader, FrameWriter, MessageId,
    RawFrame,
};
use crate::protocol::{ClientMessage, ServerMessage};

/// Frame type for raw file bytes, used in both directions
pub const CHUNK_MESSAGE_TYPE: &str = "FileChunk";

impl From<FrameError> for io::Error {
    fn from(err: FrameError) -> Self {
        let kind = match &err {
            FrameError::Io(_) => io::ErrorKind::Other,
            FrameError::ConnectionClosed => io::ErrorKind::ConnectionReset,
            FrameError::FrameTimeout | FrameError::IdleTimeout => io::ErrorKind::TimedOut,
            _ => io::ErrorKind::InvalidData,
        };
        io::Error::new(kind, err.to_string())
    }
}

/// A JSON control message that can be carried in a frame
pub trait WireMessage: Serialize + DeserializeOwned {
    /// Frame type naming this message's variant
    fn message_type(&self) -> &'static str;
}

impl WireMessage for ClientMessage {
    fn message_type(&self) -> &'static str {
        match self {
            Self::Upload => "Upload",
            Self::FileInfo { .. } => "FileInfo",
            Self::UploadEnd => "UploadEnd",
            Self::Download { .. } => "Download",
            Self::List => "List",
        }
    }
}

impl WireMessage for ServerMessage {
    fn message_type(&self) -> &'static str {
        match self {
            Self::UploadResponse { .. } => "UploadResponse",
            Self::DownloadEnd => "DownloadEnd",
            Self::ListResponse { .. } => "ListResponse",
            Self::Error { .. } => "Error",
        }
    }
}

/// Either a control message or a chunk of file bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame<M> {
    Message(M),
    Chunk(Vec<u8>),
}

/// What a server reads from a client
pub type ClientFrame = Frame<ClientMessage>;

/// What a client reads from a server
pub type ServerFrame = Frame<ServerMessage>;

/// A decoded frame together with the call it belongs to
#[derive(Debug)]
pub struct Received<M> {
    pub message_id: MessageId,
    pub frame: Frame<M>,
}

/// Serialize `message` and write it under `message_id`
///
/// Responses reuse the id of the request that opened the call.
pub async fn send_message<W, M>(
    writer: &mut FrameWriter<W>,
    message: &M,
    message_id: MessageId,
) -> io::Result<()>
where
    W: AsyncWriteExt + Unpin,
    M: WireMessage,
{
    let payload = serde_json::to_vec(message).map_err(io::Error::other)?;
    writer
        .write_payload(message_id, message.message_type(), &payload)
        .await?;
    Ok(())
}

/// Send one chunk of file bytes
pub async fn send_chunk<W>(
    writer: &mut FrameWriter<W>,
    data: &[u8],
    message_id: MessageId,
) -> io::Result<()>
where
    W: AsyncWriteExt + Unpin,
{
    writer
        .write_payload(message_id, CHUNK_MESSAGE_TYPE, data)
        .await?;
    Ok(())
}

/// Send `len` bytes taken from `reader` as one chunk, without buffering them
pub async fn send_chunk_from_reader<W, R>(
    writer: &mut FrameWriter<W>,
    reader: &mut R,
    len: u64,
    message_id: MessageId,
) -> io::Result<()>
where
    W: AsyncWriteExt + Unpin,
    R: AsyncRead + Unpin,
{
    writer
        .write_from_reader(message_id, CHUNK_MESSAGE_TYPE, reader, len)
        .await?;
    Ok(())
}

/// Read and decode the next frame
///
/// `idle_timeout` bounds the wait for the frame to start and `frame_timeout`
/// bounds the rest of it; `None` picks the framing defaults. A clean close
/// between frames yields `Ok(None)`.
pub async fn read_frame<M, R>(
    reader: &mut FrameReader<R>,
    idle_timeout: Option<Duration>,
    frame_timeout: Option<Duration>,
) -> Result<Option<Received<M>>, FrameError>
where
    M: WireMessage,
    R: AsyncReadExt + Unpin,
{
    let raw = reader
        .read_frame_with_full_timeout(
            idle_timeout.unwrap_or(DEFAULT_IDLE_TIMEOUT),
            frame_timeout.unwrap_or(DEFAULT_FRAME_TIMEOUT),
        )
        .await?;
    match raw {
        Some(raw) => parse_frame(raw)
            .map(Some)
            .map_err(|e| FrameError::InvalidJson(e.to_string())),
        None => Ok(None),
    }
}

/// Decode a raw frame whose payload has already been read
///
/// JSON frames must carry a `type` tag that agrees with the frame type.
pub fn parse_frame<M: WireMessage>(raw: RawFrame) -> io::Result<Received<M>> {
    let RawFrame {
        message_id,
        message_type,
        payload,
    } = raw;
    if message_type == CHUNK_MESSAGE_TYPE {
        return Ok(Received {
            message_id,
            frame: Frame::Chunk(payload),
        });
    }

    let message: M = serde_json::from_slice(&payload)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("invalid JSON: {e}")))?;
    let tagged = message.message_type();
    if message_type != tagged {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("frame type mismatch: {message_type} frame carries {tagged}"),
        ));
    }
    Ok(Received {
        message_id,
        frame: Frame::Message(message),
    })
}
