//! Depot client
//!
//! Each method opens a fresh connection, performs one call and closes it.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::fs::{self, File};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::time::timeout;

use depot_common::CHUNK_SIZE;
use depot_common::framing::{Direction, FrameReader, FrameWriter, MessageId, RawFrame};
use depot_common::io::{
    CHUNK_MESSAGE_TYPE, ServerFrame, WireMessage, parse_frame, read_frame, send_chunk_from_reader,
    send_message,
};
use depot_common::protocol::{ClientMessage, FileMetadata, ServerMessage};
use depot_common::validators::validate_filename;

use crate::constants::{
    DEFAULT_ADDR, DEFAULT_TIMEOUT, ERR_CONNECTION_CLOSED, ERR_MESSAGE_ID_MISMATCH,
    ERR_UNEXPECTED_RESPONSE, PART_SUFFIX,
};
use crate::error::ClientError;

/// Client for a Depot server
#[derive(Debug, Clone)]
pub struct DepotClient {
    addr: String,
    timeout: Duration,
}

impl Default for DepotClient {
    fn default() -> Self {
        Self::new(DEFAULT_ADDR, DEFAULT_TIMEOUT)
    }
}

impl DepotClient {
    /// `timeout` bounds each call as a whole, from connecting to the final
    /// response
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            timeout,
        }
    }

    #[must_use]
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// List stored files
    pub async fn list(&self) -> Result<Vec<FileMetadata>, ClientError> {
        self.within_deadline(async {
            let mut conn = self.connect().await?;
            conn.send(&ClientMessage::List).await?;

            match conn.read_message().await? {
                ServerMessage::ListResponse { files } => Ok(files),
                other => Err(unexpected(other)),
            }
        })
        .await
    }

    /// Upload the file at `path` under `name`
    ///
    /// Returns the server's confirmation message.
    pub async fn upload(&self, path: &Path, name: &str) -> Result<String, ClientError> {
        validate_filename(name)?;

        let mut file = File::open(path).await?;
        let len = file.metadata().await?.len();

        self.within_deadline(async {
            let mut conn = self.connect().await?;
            let sent = conn.send_upload(&mut file, len, name).await;

            // A rejected upload is answered early; prefer the server's reason
            // over the write error it caused.
            match (sent, conn.read_message().await) {
                (_, Ok(ServerMessage::UploadResponse { message })) => Ok(message),
                (_, Err(err @ ClientError::Status { .. })) => Err(err),
                (_, Ok(other)) => Err(unexpected(other)),
                (Err(send_err), Err(_)) => Err(send_err),
                (Ok(()), Err(err)) => Err(err),
            }
        })
        .await
    }

    /// Download `name` into `dest`
    ///
    /// Bytes are written to `dest` with a `.part` suffix and renamed once the
    /// server reports the end of the file. On failure the partial file is
    /// removed. Returns the number of bytes received.
    pub async fn download(&self, name: &str, dest: &Path) -> Result<u64, ClientError> {
        validate_filename(name)?;

        let part_path = part_path(dest);
        let mut file = File::create(&part_path).await?;

        let result = self
            .within_deadline(async {
                let mut conn = self.connect().await?;
                conn.send(&ClientMessage::Download {
                    filename: name.to_string(),
                })
                .await?;
                conn.receive_download(&mut file).await
            })
            .await;

        match result {
            Ok(received) => {
                file.flush().await?;
                drop(file);
                fs::rename(&part_path, dest).await?;
                tracing::debug!(name, bytes = received, "download complete");
                Ok(received)
            }
            Err(err) => {
                drop(file);
                let _ = fs::remove_file(&part_path).await;
                Err(err)
            }
        }
    }

    /// Run one call, failing with [`ClientError::Timeout`] once the call's
    /// time is up
    async fn within_deadline<T, F>(&self, call: F) -> Result<T, ClientError>
    where
        F: Future<Output = Result<T, ClientError>>,
    {
        timeout(self.timeout, call)
            .await
            .unwrap_or(Err(ClientError::Timeout))
    }

    async fn connect(&self) -> Result<Connection, ClientError> {
        let stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|source| ClientError::Connect {
                addr: self.addr.clone(),
                source,
            })?;
        let _ = stream.set_nodelay(true);
        tracing::debug!(addr = %self.addr, "connected");

        let (reader, writer) = stream.into_split();
        Ok(Connection {
            reader: FrameReader::new(BufReader::new(reader), Direction::ToClient),
            writer: FrameWriter::new(writer),
            message_id: MessageId::new(),
            timeout: self.timeout,
        })
    }
}

/// One call's connection
struct Connection {
    reader: FrameReader<BufReader<OwnedReadHalf>>,
    writer: FrameWriter<OwnedWriteHalf>,
    /// Shared by every frame of the call
    message_id: MessageId,
    timeout: Duration,
}

impl Connection {
    async fn send(&mut self, message: &ClientMessage) -> Result<(), ClientError> {
        send_message(&mut self.writer, message, self.message_id).await?;
        Ok(())
    }

    async fn send_upload(&mut self, file: &mut File, len: u64, name: &str) -> Result<(), ClientError> {
        self.send(&ClientMessage::Upload).await?;
        self.send(&ClientMessage::FileInfo {
            filename: name.to_string(),
        })
        .await?;

        let mut remaining = len;
        while remaining > 0 {
            let chunk = remaining.min(CHUNK_SIZE as u64);
            send_chunk_from_reader(&mut self.writer, file, chunk, self.message_id).await?;
            remaining -= chunk;
        }

        self.send(&ClientMessage::UploadEnd).await?;
        tracing::debug!(name, bytes = len, "upload sent");
        Ok(())
    }

    /// Read the next control message, turning `Error` into [`ClientError::Status`]
    async fn read_message(&mut self) -> Result<ServerMessage, ClientError> {
        let received =
            read_frame::<ServerMessage, _>(&mut self.reader, Some(self.timeout), Some(self.timeout))
                .await?
                .ok_or_else(|| ClientError::Protocol(ERR_CONNECTION_CLOSED.to_string()))?;
        self.check_id(received.message_id)?;

        match received.frame {
            ServerFrame::Message(ServerMessage::Error { code, message }) => {
                Err(ClientError::Status { code, message })
            }
            ServerFrame::Message(message) => Ok(message),
            ServerFrame::Chunk(_) => Err(ClientError::Protocol(format!(
                "{ERR_UNEXPECTED_RESPONSE}{CHUNK_MESSAGE_TYPE}"
            ))),
        }
    }

    /// Stream chunks into `file` until `DownloadEnd`
    async fn receive_download(&mut self, file: &mut File) -> Result<u64, ClientError> {
        let mut received: u64 = 0;

        loop {
            let header = match timeout(self.timeout, self.reader.read_frame_header()).await {
                Ok(Ok(Some(header))) => header,
                Ok(Ok(None)) => return Err(ClientError::Protocol(ERR_CONNECTION_CLOSED.to_string())),
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => return Err(ClientError::Timeout),
            };
            self.check_id(header.message_id)?;

            if header.message_type == CHUNK_MESSAGE_TYPE {
                // Chunks go straight to disk without buffering the payload
                received += self
                    .reader
                    .stream_payload_to_writer(&header, file, self.timeout)
                    .await?;
                continue;
            }

            let payload = self.reader.read_payload_into_vec(&header).await?;
            let frame = RawFrame::new(header.message_id, header.message_type, payload);
            let parsed = parse_frame::<ServerMessage>(frame).map_err(|e| ClientError::Protocol(e.to_string()))?;

            return match parsed.frame {
                ServerFrame::Message(ServerMessage::DownloadEnd) => Ok(received),
                ServerFrame::Message(ServerMessage::Error { code, message }) => {
                    Err(ClientError::Status { code, message })
                }
                ServerFrame::Message(other) => Err(unexpected(other)),
                ServerFrame::Chunk(_) => Err(ClientError::Protocol(format!(
                    "{ERR_UNEXPECTED_RESPONSE}{CHUNK_MESSAGE_TYPE}"
                ))),
            };
        }
    }

    fn check_id(&self, message_id: MessageId) -> Result<(), ClientError> {
        if message_id != self.message_id {
            return Err(ClientError::Protocol(ERR_MESSAGE_ID_MISMATCH.to_string()));
        }
        Ok(())
    }
}

fn unexpected(message: ServerMessage) -> ClientError {
    ClientError::Protocol(format!(
        "{ERR_UNEXPECTED_RESPONSE}{}",
        message.message_type()
    ))
}

/// `dest` with [`PART_SUFFIX`] appended to its file name
fn part_path(dest: &Path) -> PathBuf {
    let mut path = OsString::from(dest.as_os_str());
    path.push(PART_SUFFIX);
    PathBuf::from(path)
}
