//! Upload sessions
//!
//! An upload is an ordered stream of [`UploadFrame`]s: exactly one
//! `Info` naming the file, then any number of `Chunk`s, then end of stream.
//! Bytes are written straight into the destination as they arrive. If the
//! upload fails at any point after the destination was created, the partial
//! file is deleted before the error is reported.

use std::path::PathBuf;

use futures_util::{Stream, StreamExt, pin_mut};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::constants::{
    ERR_CREATE_FILE, ERR_FINISH_FILE, ERR_INFO_ALREADY_RECEIVED, ERR_INFO_FIRST,
    ERR_INFO_NOT_RECEIVED, ERR_UPLOAD_CLOSED, ERR_UPLOAD_EMPTY, ERR_WRITE_CHUNK,
    MSG_UPLOAD_SUCCESS,
};
use crate::context::CallContext;
use crate::error::CallError;
use crate::store::FileStore;

use super::helpers::validate_transfer_filename;

/// One inbound element of an upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadFrame {
    /// Name of the file being uploaded
    Info { filename: String },
    /// Next fragment of file content
    Chunk(Vec<u8>),
}

// =============================================================================
// Session State Machine
// =============================================================================

enum UploadState {
    AwaitingInfo,
    Receiving {
        filename: String,
        file: File,
        bytes_written: u64,
    },
    Closed,
}

/// State machine for a single upload
pub(crate) struct UploadSession<'a> {
    store: &'a FileStore,
    state: UploadState,
    /// Destination created by this session and not yet committed
    artifact: Option<PathBuf>,
}

impl<'a> UploadSession<'a> {
    pub(crate) fn new(store: &'a FileStore) -> Self {
        Self {
            store,
            state: UploadState::AwaitingInfo,
            artifact: None,
        }
    }

    /// Apply the next frame
    ///
    /// Any error closes the session; the caller must then [`abort`](Self::abort).
    pub(crate) async fn receive(&mut self, frame: UploadFrame) -> Result<(), CallError> {
        let result = match frame {
            UploadFrame::Info { filename } => match self.state {
                UploadState::AwaitingInfo => self.accept_info(filename).await,
                UploadState::Receiving { .. } => {
                    Err(CallError::invalid_argument(ERR_INFO_ALREADY_RECEIVED))
                }
                UploadState::Closed => Err(CallError::invalid_argument(ERR_UPLOAD_CLOSED)),
            },
            UploadFrame::Chunk(data) => match &mut self.state {
                UploadState::Receiving {
                    file,
                    bytes_written,
                    ..
                } => {
                    if data.is_empty() {
                        Ok(())
                    } else {
                        match file.write_all(&data).await {
                            Ok(()) => {
                                *bytes_written += data.len() as u64;
                                Ok(())
                            }
                            Err(e) => {
                                Err(CallError::internal(format!("{ERR_WRITE_CHUNK}{e}")))
                            }
                        }
                    }
                }
                UploadState::AwaitingInfo => Err(CallError::invalid_argument(ERR_INFO_FIRST)),
                UploadState::Closed => Err(CallError::invalid_argument(ERR_UPLOAD_CLOSED)),
            },
        };

        if result.is_err() {
            self.state = UploadState::Closed;
        }
        result
    }

    /// Validate the filename and create the destination
    async fn accept_info(&mut self, filename: String) -> Result<(), CallError> {
        validate_transfer_filename(&filename)?;

        let path = self.store.path_for(&filename);
        let file = self
            .store
            .create(&path)
            .await
            .map_err(|e| CallError::internal(format!("{ERR_CREATE_FILE}{e}")))?;
        self.artifact = Some(path);

        tracing::debug!(filename = %filename, "receiving file");

        self.state = UploadState::Receiving {
            filename,
            file,
            bytes_written: 0,
        };
        Ok(())
    }

    /// Handle end of stream: flush and commit the file
    ///
    /// On success the destination is no longer owned by the session and
    /// the returned message names the file.
    pub(crate) async fn finish(&mut self) -> Result<String, CallError> {
        match std::mem::replace(&mut self.state, UploadState::Closed) {
            UploadState::AwaitingInfo => Err(CallError::invalid_argument(ERR_INFO_NOT_RECEIVED)),
            UploadState::Closed => Err(CallError::invalid_argument(ERR_UPLOAD_CLOSED)),
            UploadState::Receiving {
                bytes_written: 0, ..
            } => Err(CallError::invalid_argument(ERR_UPLOAD_EMPTY)),
            UploadState::Receiving {
                filename,
                mut file,
                bytes_written,
            } => {
                file.flush()
                    .await
                    .map_err(|e| CallError::internal(format!("{ERR_FINISH_FILE}{e}")))?;
                file.sync_all()
                    .await
                    .map_err(|e| CallError::internal(format!("{ERR_FINISH_FILE}{e}")))?;

                self.artifact = None;
                tracing::debug!(filename = %filename, bytes = bytes_written, "file committed");
                Ok(format!("{MSG_UPLOAD_SUCCESS}{filename}"))
            }
        }
    }

    /// Close the session and delete any uncommitted destination
    pub(crate) async fn abort(&mut self) {
        // Close the handle before removing so the delete also works on Windows
        self.state = UploadState::Closed;

        if let Some(path) = self.artifact.take() {
            if let Err(e) = self.store.remove(&path).await {
                tracing::warn!(path = %path.display(), error = %e, "failed to remove partial upload");
            } else {
                tracing::debug!(path = %path.display(), "removed partial upload");
            }
        }
    }
}

// =============================================================================
// Driver
// =============================================================================

/// Consume an upload stream into the store
///
/// The stream ends normally with `None`. An `Err` item (transport failure),
/// a protocol violation, an I/O error or cancellation of `ctx` all fail the
/// upload and remove the partial file.
pub(crate) async fn receive_upload<S>(
    store: &FileStore,
    ctx: &CallContext,
    frames: S,
) -> Result<String, CallError>
where
    S: Stream<Item = Result<UploadFrame, CallError>>,
{
    pin_mut!(frames);
    let mut session = UploadSession::new(store);

    let result = async {
        loop {
            let next = ctx
                .run(async { Ok::<_, CallError>(frames.next().await) })
                .await?;
            match next {
                Some(frame) => session.receive(frame?).await?,
                None => return session.finish().await,
            }
        }
    }
    .await;

    if result.is_err() {
        session.abort().await;
    }
    result
}
