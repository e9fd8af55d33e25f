//! Download streams
//!
//! A download opens the file once, then yields its contents lazily in
//! [`CHUNK_SIZE`] pieces. Only the final chunk may be shorter. Nothing is
//! read ahead of the consumer.

use depot_common::CHUNK_SIZE;
use futures_util::stream::{self, BoxStream};
use futures_util::{Stream, StreamExt};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::constants::ERR_READ_FILE;
use crate::error::CallError;
use crate::store::{FileStore, StoreError};

use super::helpers::validate_transfer_filename;

/// Lazy stream of file chunks produced by a download
pub type ChunkStream = BoxStream<'static, Result<Vec<u8>, CallError>>;

/// Open `filename` for download
///
/// `guard` is held by the stream and dropped when the stream finishes or is
/// dropped, whichever comes first.
///
/// # Errors
///
/// - `InvalidArgument` if the filename is not a plain name
/// - `NotFound` if no regular file with that name exists
/// - `Internal` if the file exists but cannot be opened
pub(crate) async fn open_download<G>(
    store: &FileStore,
    filename: &str,
    guard: G,
) -> Result<ChunkStream, CallError>
where
    G: Send + 'static,
{
    validate_transfer_filename(filename)?;

    let file = match store.open_read(&store.path_for(filename)).await {
        Ok(file) => file,
        Err(StoreError::NotFound) => return Err(CallError::file_not_found(filename)),
        Err(StoreError::Io(e)) => {
            return Err(CallError::internal(format!("{ERR_READ_FILE}{e}")));
        }
    };

    tracing::debug!(filename = %filename, "sending file");
    Ok(chunk_stream(file, guard).boxed())
}

/// Split `reader` into a stream of chunks
///
/// A read error is yielded once and ends the stream.
pub(crate) fn chunk_stream<R, G>(
    reader: R,
    guard: G,
) -> impl Stream<Item = Result<Vec<u8>, CallError>>
where
    R: AsyncRead + Unpin,
{
    stream::try_unfold((reader, guard), |(mut reader, guard)| async move {
        let mut buf = vec![0u8; CHUNK_SIZE];
        let n = read_full(&mut reader, &mut buf)
            .await
            .map_err(|e| CallError::internal(format!("{ERR_READ_FILE}{e}")))?;
        if n == 0 {
            return Ok(None);
        }
        buf.truncate(n);
        Ok(Some((buf, (reader, guard))))
    })
}

/// Read until `buf` is full or the reader is exhausted
async fn read_full<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]).await? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}
