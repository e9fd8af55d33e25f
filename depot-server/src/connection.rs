//! Client connection handling
//!
//! Each connection carries a single call. The first frame selects the call;
//! the server sends the final response and then closes the connection.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{Stream, StreamExt, stream};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::Instrument;

use depot_common::StatusCode;
use depot_common::framing::{Direction, FrameError, FrameReader, FrameWriter, MessageId};
use depot_common::io::{ClientFrame, WireMessage, read_frame, send_chunk, send_message};
use depot_common::protocol::{ClientMessage, ServerMessage};
use depot_common::validators::truncate_error_message;

use crate::constants::{
    ERR_CLIENT_DISCONNECTED, ERR_CLIENT_TIMEOUT, ERR_INVALID_FRAME, ERR_MESSAGE_ID_MISMATCH,
    ERR_SEND_CHUNK, ERR_SEND_RESPONSE, ERR_UNEXPECTED_MESSAGE, ERR_UNEXPECTED_OPENING,
    REJECTED_UPLOAD_DRAIN,
};
use crate::context::CallContext;
use crate::error::CallError;
use crate::service::FileService;
use crate::transfers::{UploadFrame, generate_transfer_id};

/// Parameters for handling a connection
pub struct ConnectionParams {
    pub peer_addr: SocketAddr,
    pub service: FileService,
    /// Cancellation and deadline of the call carried by this connection
    pub ctx: CallContext,
    /// Longest wait for the next frame to start arriving
    pub idle_timeout: Duration,
    /// Longest time a single frame may take once it has started
    pub frame_timeout: Duration,
}

/// Which call a connection carries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Method {
    Upload,
    Download,
    List,
}

impl Method {
    fn as_str(self) -> &'static str {
        match self {
            Method::Upload => "upload",
            Method::Download => "download",
            Method::List => "list",
        }
    }
}

type Reader<S> = FrameReader<BufReader<tokio::io::ReadHalf<S>>>;
type Writer<S> = FrameWriter<tokio::io::WriteHalf<S>>;

/// Handle one client connection
///
/// Call failures are reported to the client as `Error` frames, so the only
/// errors returned here are transport errors writing that final frame.
pub async fn handle_connection<S>(socket: S, params: ConnectionParams) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let ConnectionParams {
        peer_addr,
        service,
        ctx,
        idle_timeout,
        frame_timeout,
    } = params;

    let (reader, writer) = tokio::io::split(socket);
    let mut frame_reader = FrameReader::new(BufReader::new(reader), Direction::ToServer);
    let mut frame_writer = FrameWriter::new(writer);

    let opening = tokio::select! {
        result = read_frame::<ClientMessage, _>(
            &mut frame_reader,
            Some(idle_timeout),
            Some(frame_timeout),
        ) => result,
        err = ctx.done() => {
            tracing::debug!(peer = %peer_addr, error = %err, "connection closed before a call started");
            return Ok(());
        }
    };

    let received = match opening {
        Ok(Some(received)) => received,
        // Closed without sending anything
        Ok(None) => return Ok(()),
        Err(e) => {
            // Scanners and dropped connections are common, so keep this quiet
            tracing::debug!(peer = %peer_addr, error = %e, "invalid opening frame");
            let err = CallError::invalid_argument(format!("{ERR_INVALID_FRAME}{e}"));
            return send_error(&mut frame_writer, &err, MessageId::new()).await;
        }
    };
    let message_id = received.message_id;

    let (method, filename) = match received.frame {
        ClientFrame::Message(ClientMessage::Upload) => (Method::Upload, None),
        ClientFrame::Message(ClientMessage::Download { filename }) => {
            (Method::Download, Some(filename))
        }
        ClientFrame::Message(ClientMessage::List) => (Method::List, None),
        _ => {
            tracing::debug!(peer = %peer_addr, "unexpected opening frame");
            let err = CallError::invalid_argument(ERR_UNEXPECTED_OPENING);
            return send_error(&mut frame_writer, &err, message_id).await;
        }
    };

    let span = tracing::info_span!(
        "call",
        id = %generate_transfer_id(),
        method = method.as_str(),
        peer = %peer_addr,
    );

    async move {
        tracing::info!(filename = filename.as_deref(), "call started");

        let mut call = Call {
            reader: &mut frame_reader,
            writer: &mut frame_writer,
            service: &service,
            ctx: &ctx,
            message_id,
            idle_timeout,
            frame_timeout,
        };

        let result = match method {
            Method::Upload => call.upload().await,
            Method::Download => call.download(filename.unwrap_or_default()).await,
            Method::List => call.list().await,
        };

        match result {
            Ok(()) => {
                tracing::info!("call finished");
                frame_writer.get_mut().shutdown().await
            }
            Err(err) => {
                tracing::warn!(code = %err.code, message = %err.message, "call failed");
                let sent = send_error(&mut frame_writer, &err, message_id).await;
                if method == Method::Upload && err.code != StatusCode::Cancelled {
                    drain(&mut frame_reader).await;
                }
                sent
            }
        }
    }
    .instrument(span)
    .await
}

/// Send a terminal `Error` frame and close the write side
async fn send_error<W>(
    writer: &mut FrameWriter<W>,
    err: &CallError,
    message_id: MessageId,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let message = ServerMessage::Error {
        code: err.code,
        message: truncate_error_message(&err.message).to_string(),
    };
    send_message(writer, &message, message_id).await?;
    writer.get_mut().shutdown().await
}

/// Discard whatever the client is still sending
///
/// A rejected upload client may still be writing chunks. Closing with unread
/// data would reset the connection and could discard the `Error` frame
/// before the client reads it.
async fn drain<R>(reader: &mut FrameReader<R>)
where
    R: AsyncRead + Unpin,
{
    let _ = tokio::time::timeout(
        REJECTED_UPLOAD_DRAIN,
        tokio::io::copy(reader.get_mut(), &mut tokio::io::sink()),
    )
    .await;
}

// =============================================================================
// Calls
// =============================================================================

struct Call<'a, S> {
    reader: &'a mut Reader<S>,
    writer: &'a mut Writer<S>,
    service: &'a FileService,
    ctx: &'a CallContext,
    message_id: MessageId,
    idle_timeout: Duration,
    frame_timeout: Duration,
}

impl<S> Call<'_, S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    async fn upload(&mut self) -> Result<(), CallError> {
        let frames = upload_frames(
            self.reader,
            self.message_id,
            self.idle_timeout,
            self.frame_timeout,
        );
        let message = self.service.upload(self.ctx, frames).await?;
        tracing::debug!(%message);

        self.respond(&ServerMessage::UploadResponse { message }).await
    }

    async fn download(&mut self, filename: String) -> Result<(), CallError> {
        let mut chunks = self.service.download(self.ctx, &filename).await?;
        let mut sent: u64 = 0;

        loop {
            let next = self
                .ctx
                .run(async { Ok::<_, CallError>(chunks.next().await) })
                .await?;
            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk?;

            let writer = &mut *self.writer;
            let message_id = self.message_id;
            self.ctx
                .run(async {
                    send_chunk(writer, &chunk, message_id)
                        .await
                        .map_err(|e| disconnected(ERR_SEND_CHUNK, &e))
                })
                .await?;
            sent += chunk.len() as u64;
        }

        // Release the permit before the final frame
        drop(chunks);
        tracing::debug!(bytes = sent, "file sent");

        self.respond(&ServerMessage::DownloadEnd).await
    }

    async fn list(&mut self) -> Result<(), CallError> {
        let files = self.service.list(self.ctx).await?;
        tracing::debug!(count = files.len(), "listed files");

        self.respond(&ServerMessage::ListResponse { files }).await
    }

    async fn respond(&mut self, message: &ServerMessage) -> Result<(), CallError> {
        send_message(self.writer, message, self.message_id)
            .await
            .map_err(|e| disconnected(ERR_SEND_RESPONSE, &e))
    }
}

/// A failed write means the client has gone away
fn disconnected(prefix: &str, e: &io::Error) -> CallError {
    CallError::new(StatusCode::Cancelled, format!("{prefix}{e}"))
}

/// Adapt the frames following `Upload` into an upload stream
///
/// `UploadEnd` ends the stream. A frame carrying another call's id, anything
/// that is not `FileInfo` or a chunk, and every transport failure is yielded
/// as an error and ends the stream.
fn upload_frames<R>(
    reader: &mut FrameReader<R>,
    message_id: MessageId,
    idle_timeout: Duration,
    frame_timeout: Duration,
) -> impl Stream<Item = Result<UploadFrame, CallError>> + '_
where
    R: AsyncReadExt + Unpin,
{
    stream::unfold(Some(reader), move |reader| async move {
        let reader = reader?;
        let result =
            read_frame::<ClientMessage, _>(reader, Some(idle_timeout), Some(frame_timeout)).await;

        let err = match result {
            Ok(Some(received)) if received.message_id != message_id => {
                CallError::invalid_argument(ERR_MESSAGE_ID_MISMATCH)
            }
            Ok(Some(received)) => match received.frame {
                ClientFrame::Chunk(data) => {
                    return Some((Ok(UploadFrame::Chunk(data)), Some(reader)));
                }
                ClientFrame::Message(ClientMessage::FileInfo { filename }) => {
                    return Some((Ok(UploadFrame::Info { filename }), Some(reader)));
                }
                ClientFrame::Message(ClientMessage::UploadEnd) => return None,
                ClientFrame::Message(other) => CallError::invalid_argument(format!(
                    "{ERR_UNEXPECTED_MESSAGE}{}",
                    other.message_type()
                )),
            },
            Ok(None) | Err(FrameError::ConnectionClosed) => {
                CallError::new(StatusCode::Cancelled, ERR_CLIENT_DISCONNECTED)
            }
            Err(FrameError::IdleTimeout | FrameError::FrameTimeout) => {
                CallError::new(StatusCode::Cancelled, ERR_CLIENT_TIMEOUT)
            }
            Err(e) => CallError::invalid_argument(format!("{ERR_INVALID_FRAME}{e}")),
        };
        Some((Err(err), None))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use depot_common::io::{ServerFrame, send_chunk as send_client_chunk};
    use depot_common::protocol::FileMetadata;
    use tempfile::TempDir;
    use tokio::io::DuplexStream;

    use crate::service::ServiceConfig;
    use crate::store::FileStore;

    const TIMEOUT: Duration = Duration::from_secs(5);

    struct Harness {
        _temp: TempDir,
        service: FileService,
    }

    impl Harness {
        fn new(config: ServiceConfig) -> Self {
            let temp = TempDir::new().unwrap();
            let store = FileStore::open(temp.path()).unwrap();
            Self {
                _temp: temp,
                service: FileService::new(store, config),
            }
        }

        /// Start a server-side handler and return the client end
        fn connect(&self) -> (Reader<DuplexStream>, Writer<DuplexStream>) {
            let (client, server) = tokio::io::duplex(256 * 1024);
            let params = ConnectionParams {
                peer_addr: "127.0.0.1:50000".parse().unwrap(),
                service: self.service.clone(),
                ctx: CallContext::background(),
                idle_timeout: TIMEOUT,
                frame_timeout: TIMEOUT,
            };
            tokio::spawn(async move {
                let _ = handle_connection(server, params).await;
            });

            let (reader, writer) = tokio::io::split(client);
            (
                FrameReader::new(BufReader::new(reader), Direction::ToClient),
                FrameWriter::new(writer),
            )
        }
    }

    async fn send(writer: &mut Writer<DuplexStream>, message: ClientMessage, id: MessageId) {
        send_message(writer, &message, id).await.unwrap();
    }

    async fn recv(reader: &mut Reader<DuplexStream>) -> (MessageId, ServerFrame) {
        let received = read_frame::<ServerMessage, _>(reader, Some(TIMEOUT), Some(TIMEOUT))
            .await
            .unwrap()
            .unwrap();
        (received.message_id, received.frame)
    }

    async fn upload(harness: &Harness, name: &str, chunks: &[&[u8]]) -> ServerMessage {
        let (mut reader, mut writer) = harness.connect();
        let id = MessageId::new();
        send(&mut writer, ClientMessage::Upload, id).await;
        send(
            &mut writer,
            ClientMessage::FileInfo {
                filename: name.to_string(),
            },
            id,
        )
        .await;
        for chunk in chunks {
            send_client_chunk(&mut writer, chunk, id).await.unwrap();
        }
        send(&mut writer, ClientMessage::UploadEnd, id).await;

        let (reply_id, frame) = recv(&mut reader).await;
        assert_eq!(reply_id, id);
        match frame {
            ServerFrame::Message(message) => message,
            ServerFrame::Chunk(_) => panic!("unexpected chunk"),
        }
    }

    #[tokio::test]
    async fn test_upload_then_download() {
        let harness = Harness::new(ServiceConfig::default());

        let response = upload(&harness, "report.csv", &[b"id,val\n", b"1,2\n"]).await;
        assert_eq!(
            response,
            ServerMessage::UploadResponse {
                message: "file uploaded successfully: report.csv".to_string()
            }
        );

        let (mut reader, mut writer) = harness.connect();
        let id = MessageId::new();
        send(
            &mut writer,
            ClientMessage::Download {
                filename: "report.csv".to_string(),
            },
            id,
        )
        .await;

        let mut content = Vec::new();
        loop {
            let (reply_id, frame) = recv(&mut reader).await;
            assert_eq!(reply_id, id);
            match frame {
                ServerFrame::Chunk(data) => content.extend(data),
                ServerFrame::Message(ServerMessage::DownloadEnd) => break,
                ServerFrame::Message(other) => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(content, b"id,val\n1,2\n");
    }

    #[tokio::test]
    async fn test_upload_error_reported() {
        let harness = Harness::new(ServiceConfig::default());

        let response = upload(&harness, "../secret", &[b"x"]).await;

        assert_eq!(
            response,
            ServerMessage::Error {
                code: StatusCode::InvalidArgument,
                message: "filename must not contain path".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_list() {
        let harness = Harness::new(ServiceConfig::default());
        upload(&harness, "a.txt", &[b"a"]).await;

        let (mut reader, mut writer) = harness.connect();
        send(&mut writer, ClientMessage::List, MessageId::new()).await;

        match recv(&mut reader).await.1 {
            ServerFrame::Message(ServerMessage::ListResponse { files }) => {
                let names: Vec<_> = files.iter().map(|f: &FileMetadata| f.filename.as_str()).collect();
                assert_eq!(names, vec!["a.txt"]);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_download_missing() {
        let harness = Harness::new(ServiceConfig::default());

        let (mut reader, mut writer) = harness.connect();
        send(
            &mut writer,
            ClientMessage::Download {
                filename: "nope.txt".to_string(),
            },
            MessageId::new(),
        )
        .await;

        match recv(&mut reader).await.1 {
            ServerFrame::Message(ServerMessage::Error { code, .. }) => {
                assert_eq!(code, StatusCode::NotFound);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unexpected_opening() {
        let harness = Harness::new(ServiceConfig::default());

        let (mut reader, mut writer) = harness.connect();
        send(&mut writer, ClientMessage::UploadEnd, MessageId::new()).await;

        match recv(&mut reader).await.1 {
            ServerFrame::Message(ServerMessage::Error { code, message }) => {
                assert_eq!(code, StatusCode::InvalidArgument);
                assert_eq!(message, ERR_UNEXPECTED_OPENING);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unexpected_message_during_upload() {
        let harness = Harness::new(ServiceConfig::default());

        let (mut reader, mut writer) = harness.connect();
        let id = MessageId::new();
        send(&mut writer, ClientMessage::Upload, id).await;
        send(
            &mut writer,
            ClientMessage::FileInfo {
                filename: "a.txt".to_string(),
            },
            id,
        )
        .await;
        send(&mut writer, ClientMessage::List, id).await;

        match recv(&mut reader).await.1 {
            ServerFrame::Message(ServerMessage::Error { code, message }) => {
                assert_eq!(code, StatusCode::InvalidArgument);
                assert_eq!(message, "unexpected message: List");
            }
            other => panic!("unexpected {other:?}"),
        }
        drop(writer);
        drop(reader);

        // The partial file was removed
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!harness.service.store().path_for("a.txt").exists());
    }

    #[tokio::test]
    async fn test_upload_frame_from_other_call_rejected() {
        let harness = Harness::new(ServiceConfig::default());

        let (mut reader, mut writer) = harness.connect();
        let id = MessageId::new();
        send(&mut writer, ClientMessage::Upload, id).await;
        send(
            &mut writer,
            ClientMessage::FileInfo {
                filename: "a.txt".to_string(),
            },
            id,
        )
        .await;
        send_client_chunk(&mut writer, b"stray", MessageId::new())
            .await
            .unwrap();

        let (reply_id, frame) = recv(&mut reader).await;
        assert_eq!(reply_id, id);
        match frame {
            ServerFrame::Message(ServerMessage::Error { code, message }) => {
                assert_eq!(code, StatusCode::InvalidArgument);
                assert_eq!(message, ERR_MESSAGE_ID_MISMATCH);
            }
            other => panic!("unexpected {other:?}"),
        }
        drop(writer);
        drop(reader);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!harness.service.store().path_for("a.txt").exists());
    }

    #[tokio::test]
    async fn test_server_message_type_as_opening_rejected() {
        let harness = Harness::new(ServiceConfig::default());

        let (mut reader, mut writer) = harness.connect();
        writer
            .get_mut()
            .write_all(b"DP|12|ListResponse|0123456789ab|5000000000000000000|")
            .await
            .unwrap();

        match recv(&mut reader).await.1 {
            ServerFrame::Message(ServerMessage::Error { code, message }) => {
                assert_eq!(code, StatusCode::InvalidArgument);
                assert!(message.starts_with(ERR_INVALID_FRAME), "{message}");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_disconnect_mid_upload_removes_file() {
        let harness = Harness::new(ServiceConfig::default());

        let (reader, mut writer) = harness.connect();
        let id = MessageId::new();
        send(&mut writer, ClientMessage::Upload, id).await;
        send(
            &mut writer,
            ClientMessage::FileInfo {
                filename: "a.txt".to_string(),
            },
            id,
        )
        .await;
        send_client_chunk(&mut writer, b"partial", id).await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(harness.service.store().path_for("a.txt").exists());

        drop(writer);
        drop(reader);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!harness.service.store().path_for("a.txt").exists());
        assert_eq!(harness.service.transfer_gate().active(), 0);
    }
}
