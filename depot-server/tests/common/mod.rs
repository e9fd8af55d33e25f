//! Shared harness for server integration tests
//!
//! Starts a real server on a loopback port and speaks the wire protocol
//! with raw frames.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use depot_common::StatusCode;
use depot_common::framing::{Direction, FrameReader, FrameWriter, MessageId};
use depot_common::io::{ServerFrame, read_frame, send_chunk, send_message};
use depot_common::protocol::{ClientMessage, FileMetadata, ServerMessage};
use depot_server::{FileService, FileStore, ServerConfig, ServiceConfig, serve};
use tempfile::TempDir;
use tokio::io::BufReader;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub const TIMEOUT: Duration = Duration::from_secs(5);

/// Running server backed by a temporary store
pub struct TestServer {
    /// Parent of the store root, so escapes from the root are observable
    pub temp_dir: TempDir,
    pub addr: SocketAddr,
    pub service: FileService,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with(ServiceConfig::default(), ServerConfig::default()).await
    }

    pub async fn start_with(service_config: ServiceConfig, server_config: ServerConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = FileStore::open(temp_dir.path().join("files")).unwrap();
        let service = FileService::new(store, service_config);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (tx, rx) = oneshot::channel();
        let handle = tokio::spawn(serve(listener, service.clone(), server_config, async {
            let _ = rx.await;
        }));

        Self {
            temp_dir,
            addr,
            service,
            shutdown: Some(tx),
            handle: Some(handle),
        }
    }

    pub fn file_path(&self, name: &str) -> std::path::PathBuf {
        self.service.store().path_for(name)
    }

    /// Names present in the store root
    pub fn stored_names(&self) -> Vec<String> {
        let mut names: Vec<_> = std::fs::read_dir(self.service.store().root())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        names.sort();
        names
    }

    /// Open a connection for one call
    pub async fn connect(&self) -> Conn {
        let stream = TcpStream::connect(self.addr).await.unwrap();
        let (reader, writer) = stream.into_split();
        Conn {
            reader: FrameReader::new(BufReader::new(reader), Direction::ToClient),
            writer: FrameWriter::new(writer),
            id: MessageId::new(),
        }
    }

    /// Wait until `active` transfer permits are held
    pub async fn wait_for_transfers(&self, active: usize) {
        tokio::time::timeout(TIMEOUT, async {
            while self.service.transfer_gate().active() != active {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("transfer permits never reached the expected count");
    }

    /// Trigger shutdown and wait for the accept loop to finish
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            tokio::time::timeout(Duration::from_secs(10), handle)
                .await
                .expect("server did not stop")
                .unwrap();
        }
    }

    pub async fn upload(&self, name: &str, chunks: &[&[u8]]) -> Result<String, (StatusCode, String)> {
        let mut conn = self.connect().await;
        conn.send(ClientMessage::Upload).await;
        conn.send(ClientMessage::FileInfo {
            filename: name.to_string(),
        })
        .await;
        for chunk in chunks {
            conn.chunk(chunk).await;
        }
        conn.send(ClientMessage::UploadEnd).await;

        match conn.recv_message().await {
            ServerMessage::UploadResponse { message } => Ok(message),
            ServerMessage::Error { code, message } => Err((code, message)),
            other => panic!("unexpected response: {other:?}"),
        }
    }

    pub async fn download(&self, name: &str) -> Result<Vec<u8>, (StatusCode, String)> {
        let mut conn = self.connect().await;
        conn.send(ClientMessage::Download {
            filename: name.to_string(),
        })
        .await;

        let mut content = Vec::new();
        loop {
            match conn.recv().await {
                ServerFrame::Chunk(data) => content.extend(data),
                ServerFrame::Message(ServerMessage::DownloadEnd) => return Ok(content),
                ServerFrame::Message(ServerMessage::Error { code, message }) => {
                    return Err((code, message));
                }
                ServerFrame::Message(other) => panic!("unexpected response: {other:?}"),
            }
        }
    }

    pub async fn list(&self) -> Result<Vec<FileMetadata>, (StatusCode, String)> {
        let mut conn = self.connect().await;
        conn.send(ClientMessage::List).await;

        match conn.recv_message().await {
            ServerMessage::ListResponse { files } => Ok(files),
            ServerMessage::Error { code, message } => Err((code, message)),
            other => panic!("unexpected response: {other:?}"),
        }
    }
}

/// Client side of one call
pub struct Conn {
    pub reader: FrameReader<BufReader<OwnedReadHalf>>,
    pub writer: FrameWriter<OwnedWriteHalf>,
    pub id: MessageId,
}

impl Conn {
    pub async fn send(&mut self, message: ClientMessage) {
        send_message(&mut self.writer, &message, self.id)
            .await
            .unwrap();
    }

    pub async fn chunk(&mut self, data: &[u8]) {
        send_chunk(&mut self.writer, data, self.id).await.unwrap();
    }

    pub async fn recv(&mut self) -> ServerFrame {
        let received = read_frame::<ServerMessage, _>(&mut self.reader, Some(TIMEOUT), Some(TIMEOUT))
            .await
            .unwrap()
            .expect("server closed the connection");
        assert_eq!(received.message_id, self.id);
        received.frame
    }

    pub async fn recv_message(&mut self) -> ServerMessage {
        match self.recv().await {
            ServerFrame::Message(message) => message,
            ServerFrame::Chunk(_) => panic!("unexpected chunk"),
        }
    }

    /// Start an upload of `name` and leave it open
    pub async fn begin_upload(&mut self, name: &str) {
        self.send(ClientMessage::Upload).await;
        self.send(ClientMessage::FileInfo {
            filename: name.to_string(),
        })
        .await;
    }
}
