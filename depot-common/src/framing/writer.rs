//! Frame writer
//!
//! Every write ends with a flush, so a frame is on the wire once the call
//! returns.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::error::FrameError;
use super::frame::{RawFrame, encode_header};
use super::message_id::MessageId;
use super::TERMINATOR;

/// Writes frames to an async writer
pub struct FrameWriter<W> {
    inner: W,
}

impl<W> FrameWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Underlying writer, e.g. to shut down the write side
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    /// Write an assembled frame
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    pub async fn write_frame(&mut self, frame: &RawFrame) -> Result<(), FrameError> {
        self.inner.write_all(&frame.to_bytes()).await?;
        self.inner.flush().await?;
        Ok(())
    }

    /// Write a frame whose payload is borrowed from the caller
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    pub async fn write_payload(
        &mut self,
        message_id: MessageId,
        message_type: &str,
        payload: &[u8],
    ) -> Result<(), FrameError> {
        let header = encode_header(message_type, &message_id, payload.len() as u64);
        self.inner.write_all(&header).await?;
        self.inner.write_all(payload).await?;
        self.finish().await
    }

    /// Write a frame whose payload is the next `payload_len` bytes of `source`
    ///
    /// Nothing is buffered beyond what `tokio::io::copy` uses internally.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs or `source` ends before
    /// `payload_len` bytes. The frame on the wire is then incomplete and
    /// the connection must be abandoned.
    pub async fn write_from_reader<R>(
        &mut self,
        message_id: MessageId,
        message_type: &str,
        source: &mut R,
        payload_len: u64,
    ) -> Result<(), FrameError>
    where
        R: AsyncRead + Unpin,
    {
        let header = encode_header(message_type, &message_id, payload_len);
        self.inner.write_all(&header).await?;

        let copied = tokio::io::copy(&mut source.take(payload_len), &mut self.inner).await?;
        if copied != payload_len {
            return Err(FrameError::Io(format!(
                "source ended after {copied} of {payload_len} bytes"
            )));
        }

        self.finish().await
    }

    async fn finish(&mut self) -> Result<(), FrameError> {
        self.inner.write_all(&[TERMINATOR]).await?;
        self.inner.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn test_write_frame() {
        let mut buffer = Vec::new();
        let id = MessageId::new();

        let mut writer = FrameWriter::new(&mut buffer);
        let frame = RawFrame::new(id, "List".to_string(), b"{\"type\":\"List\"}".to_vec());
        writer.write_frame(&frame).await.unwrap();

        let expected = format!("DP|4|List|{id}|15|{{\"type\":\"List\"}}\n");
        assert_eq!(buffer, expected.as_bytes());
    }

    #[tokio::test]
    async fn test_write_payload_matches_assembled_frame() {
        let id = MessageId::new();

        let mut direct = Vec::new();
        FrameWriter::new(&mut direct)
            .write_payload(id, "FileChunk", b"id,val\n")
            .await
            .unwrap();

        let frame = RawFrame::new(id, "FileChunk".to_string(), b"id,val\n".to_vec());
        assert_eq!(direct, frame.to_bytes());
    }

    #[tokio::test]
    async fn test_write_from_reader() {
        let mut buffer = Vec::new();
        let id = MessageId::new();
        let mut source = Cursor::new(b"abcdef".as_slice());

        let mut writer = FrameWriter::new(&mut buffer);
        writer
            .write_from_reader(id, "FileChunk", &mut source, 3)
            .await
            .unwrap();

        let expected = format!("DP|9|FileChunk|{id}|3|abc\n");
        assert_eq!(buffer, expected.as_bytes());
        // The rest of the source is left for the next chunk
        assert_eq!(source.position(), 3);
    }

    #[tokio::test]
    async fn test_write_from_short_reader() {
        let mut buffer = Vec::new();
        let mut source = Cursor::new(b"Short".as_slice());

        let mut writer = FrameWriter::new(&mut buffer);
        let result = writer
            .write_from_reader(MessageId::new(), "FileChunk", &mut source, 100)
            .await;

        assert!(matches!(result, Err(FrameError::Io(_))));
    }
}
