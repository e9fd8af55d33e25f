//! Frame reader
//!
//! Frames are validated field by field as they arrive: a type that may not
//! travel in the reader's [`Direction`] or a payload longer than its type
//! allows is rejected before any payload byte is read.

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

use super::error::FrameError;
use super::frame::RawFrame;
use super::limits::{Direction, max_payload};
use super::message_id::MessageId;
use super::{
    DELIMITER, MAGIC, MAX_PAYLOAD_LENGTH_DIGITS, MAX_TYPE_LENGTH, MAX_TYPE_LENGTH_DIGITS,
    MSG_ID_LENGTH, TERMINATOR,
};

/// Default time allowed to finish a frame once its first byte arrived
pub const DEFAULT_FRAME_TIMEOUT: Duration = Duration::from_secs(60);

/// Default wait for the first byte of the next frame
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default longest gap between bytes while streaming a payload
pub const DEFAULT_PROGRESS_TIMEOUT: Duration = Duration::from_secs(60);

const STREAM_BUFFER_SIZE: usize = 64 * 1024;

/// A validated header whose payload is still unread
///
/// Follow up with [`FrameReader::read_payload_into_vec`] or, for chunks,
/// [`FrameReader::stream_payload_to_writer`].
#[derive(Debug, Clone)]
pub struct FrameHeader {
    pub message_type: String,
    pub message_id: MessageId,
    pub payload_length: u64,
}

/// Reads frames from an async reader
pub struct FrameReader<R> {
    inner: R,
    direction: Direction,
}

impl<R> FrameReader<R> {
    /// Reader accepting the frame types that travel in `direction`
    pub fn new(inner: R, direction: Direction) -> Self {
        Self { inner, direction }
    }

    /// Underlying reader, e.g. to drain what the peer is still sending
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Read the next frame with no time limit
    ///
    /// Returns `Ok(None)` if the peer closed the connection between frames.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is malformed or an I/O error occurs.
    pub async fn read_frame(&mut self) -> Result<Option<RawFrame>, FrameError> {
        match self.read_frame_header().await? {
            Some(header) => self.finish_frame(header).await.map(Some),
            None => Ok(None),
        }
    }

    /// Read the next frame within time limits
    ///
    /// `idle_timeout` bounds the wait for the first byte and `frame_timeout`
    /// bounds the rest of the frame.
    ///
    /// # Errors
    ///
    /// [`FrameError::IdleTimeout`] or [`FrameError::FrameTimeout`] when a
    /// limit is hit, otherwise as [`read_frame`](Self::read_frame).
    pub async fn read_frame_with_full_timeout(
        &mut self,
        idle_timeout: Duration,
        frame_timeout: Duration,
    ) -> Result<Option<RawFrame>, FrameError> {
        let first = timeout(idle_timeout, self.first_byte())
            .await
            .map_err(|_| FrameError::IdleTimeout)??;
        let Some(first) = first else {
            return Ok(None);
        };

        let frame = timeout(frame_timeout, async {
            let header = self.header_after(first).await?;
            self.finish_frame(header).await
        })
        .await
        .map_err(|_| FrameError::FrameTimeout)??;
        Ok(Some(frame))
    }

    /// Read and validate a header, leaving the payload unread
    ///
    /// Returns `Ok(None)` if the peer closed the connection between frames.
    /// Has no time limit of its own.
    pub async fn read_frame_header(&mut self) -> Result<Option<FrameHeader>, FrameError> {
        match self.first_byte().await? {
            Some(first) => self.header_after(first).await.map(Some),
            None => Ok(None),
        }
    }

    /// Read the payload announced by `header` into memory
    ///
    /// The buffer grows with the bytes actually received, so a peer that
    /// announces a large payload and stops sending costs little memory.
    pub async fn read_payload_into_vec(
        &mut self,
        header: &FrameHeader,
    ) -> Result<Vec<u8>, FrameError> {
        let len =
            usize::try_from(header.payload_length).map_err(|_| FrameError::InvalidPayloadLength)?;
        let mut payload = Vec::with_capacity(len.min(STREAM_BUFFER_SIZE));
        (&mut self.inner)
            .take(header.payload_length)
            .read_to_end(&mut payload)
            .await?;
        if payload.len() != len {
            return Err(FrameError::ConnectionClosed);
        }
        self.expect_byte(TERMINATOR, FrameError::MissingTerminator)
            .await?;
        Ok(payload)
    }

    /// Copy the payload announced by `header` into `writer`
    ///
    /// `progress_timeout` restarts with every read, so a slow but steady
    /// peer is never cut off. Returns the number of bytes copied.
    pub async fn stream_payload_to_writer<W>(
        &mut self,
        header: &FrameHeader,
        writer: &mut W,
        progress_timeout: Duration,
    ) -> Result<u64, FrameError>
    where
        W: AsyncWrite + Unpin,
    {
        let mut buffer = vec![0u8; STREAM_BUFFER_SIZE];
        let mut copied: u64 = 0;

        while copied < header.payload_length {
            let want = usize::try_from(header.payload_length - copied)
                .unwrap_or(usize::MAX)
                .min(buffer.len());
            let n = timeout(progress_timeout, self.inner.read(&mut buffer[..want]))
                .await
                .map_err(|_| FrameError::FrameTimeout)??;
            if n == 0 {
                return Err(FrameError::ConnectionClosed);
            }
            writer.write_all(&buffer[..n]).await?;
            copied += n as u64;
        }
        writer.flush().await?;

        timeout(
            progress_timeout,
            self.expect_byte(TERMINATOR, FrameError::MissingTerminator),
        )
        .await
        .map_err(|_| FrameError::FrameTimeout)??;
        Ok(copied)
    }

    async fn finish_frame(&mut self, header: FrameHeader) -> Result<RawFrame, FrameError> {
        let payload = self.read_payload_into_vec(&header).await?;
        Ok(RawFrame::new(header.message_id, header.message_type, payload))
    }

    /// Parse the rest of a header whose first byte has already been read
    async fn header_after(&mut self, first: u8) -> Result<FrameHeader, FrameError> {
        let mut magic = [first, 0, 0];
        if first != MAGIC[0] {
            return Err(FrameError::InvalidMagic);
        }
        self.inner.read_exact(&mut magic[1..]).await?;
        if &magic != MAGIC {
            return Err(FrameError::InvalidMagic);
        }

        let type_length = self
            .read_decimal(
                MAX_TYPE_LENGTH_DIGITS,
                FrameError::InvalidTypeLength,
                FrameError::TypeLengthTooManyDigits,
            )
            .await?;
        if !(1..=MAX_TYPE_LENGTH as u64).contains(&type_length) {
            return Err(FrameError::TypeLengthOutOfRange);
        }

        let mut raw_type = vec![0u8; type_length as usize];
        self.inner.read_exact(&mut raw_type).await?;
        let message_type = String::from_utf8(raw_type)
            .map_err(|_| FrameError::UnknownMessageType("<invalid utf8>".to_string()))?;
        let Some(max) = max_payload(self.direction, &message_type) else {
            return Err(FrameError::UnknownMessageType(message_type));
        };
        self.expect_byte(DELIMITER, FrameError::MissingDelimiter)
            .await?;

        let mut raw_id = [0u8; MSG_ID_LENGTH];
        self.inner.read_exact(&mut raw_id).await?;
        let message_id = MessageId::from_bytes(&raw_id)?;
        self.expect_byte(DELIMITER, FrameError::MissingDelimiter)
            .await?;

        let payload_length = self
            .read_decimal(
                MAX_PAYLOAD_LENGTH_DIGITS,
                FrameError::InvalidPayloadLength,
                FrameError::PayloadLengthTooManyDigits,
            )
            .await?;
        if payload_length > max {
            return Err(FrameError::PayloadLengthExceedsTypeMax {
                message_type,
                length: payload_length,
                max,
            });
        }

        Ok(FrameHeader {
            message_type,
            message_id,
            payload_length,
        })
    }

    /// First byte of a frame, or `None` on a clean close
    async fn first_byte(&mut self) -> Result<Option<u8>, FrameError> {
        match self.read_byte().await {
            Ok(byte) => Ok(Some(byte)),
            Err(FrameError::ConnectionClosed) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn read_byte(&mut self) -> Result<u8, FrameError> {
        Ok(self.inner.read_u8().await?)
    }

    async fn expect_byte(&mut self, expected: u8, err: FrameError) -> Result<(), FrameError> {
        if self.read_byte().await? != expected {
            return Err(err);
        }
        Ok(())
    }

    /// Decimal field of at most `max_digits` digits, ended by a delimiter
    async fn read_decimal(
        &mut self,
        max_digits: usize,
        invalid: FrameError,
        too_long: FrameError,
    ) -> Result<u64, FrameError> {
        let mut value: u64 = 0;
        let mut digits = 0;

        loop {
            let byte = self.read_byte().await?;
            if byte == DELIMITER {
                return if digits == 0 { Err(invalid) } else { Ok(value) };
            }
            if !byte.is_ascii_digit() {
                return Err(invalid);
            }
            if digits == max_digits {
                return Err(too_long);
            }
            value = value
                .checked_mul(10)
                .and_then(|v| v.checked_add(u64::from(byte - b'0')))
                .ok_or_else(|| invalid.clone())?;
            digits += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tokio::io::{AsyncWriteExt, BufReader};

    fn reader_for(data: &[u8]) -> FrameReader<BufReader<Cursor<Vec<u8>>>> {
        FrameReader::new(BufReader::new(Cursor::new(data.to_vec())), Direction::ToServer)
    }

    fn client_reader_for(data: &[u8]) -> FrameReader<BufReader<Cursor<Vec<u8>>>> {
        FrameReader::new(BufReader::new(Cursor::new(data.to_vec())), Direction::ToClient)
    }

    #[tokio::test]
    async fn test_frame_reader_valid_frame() {
        let mut reader =
            reader_for(b"DP|8|FileInfo|a1b2c3d4e5f6|38|{\"type\":\"FileInfo\",\"filename\":\"a.txt\"}\n");

        let frame = reader.read_frame().await.unwrap().unwrap();
        assert_eq!(frame.message_type, "FileInfo");
        assert_eq!(
            frame.message_id,
            MessageId::from_bytes(b"a1b2c3d4e5f6").unwrap()
        );
        assert_eq!(
            frame.payload,
            b"{\"type\":\"FileInfo\",\"filename\":\"a.txt\"}"
        );
    }

    #[tokio::test]
    async fn test_frame_reader_binary_payload() {
        let mut reader = reader_for(b"DP|9|FileChunk|a1b2c3d4e5f6|3|\n|\0\n");

        let frame = reader.read_frame().await.unwrap().unwrap();
        assert_eq!(frame.message_type, "FileChunk");
        assert_eq!(frame.payload, b"\n|\0");
    }

    #[tokio::test]
    async fn test_frame_reader_multiple_frames() {
        let mut reader =
            reader_for(b"DP|4|List|a1b2c3d4e5f6|2|{}\nDP|9|UploadEnd|b2c3d4e5f6a1|2|{}\n");

        let frame1 = reader.read_frame().await.unwrap().unwrap();
        assert_eq!(frame1.message_type, "List");

        let frame2 = reader.read_frame().await.unwrap().unwrap();
        assert_eq!(frame2.message_type, "UploadEnd");
    }

    #[tokio::test]
    async fn test_frame_reader_connection_closed() {
        let mut reader = reader_for(b"");
        assert!(reader.read_frame().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_frame_reader_invalid_magic() {
        let mut reader = reader_for(b"NX|4|List|a1b2c3d4e5f6|2|{}\n");
        let result = reader.read_frame().await;
        assert!(matches!(result, Err(FrameError::InvalidMagic)));
    }

    #[tokio::test]
    async fn test_frame_reader_invalid_message_id() {
        let mut reader = reader_for(b"DP|4|List|not_hex_chars|2|{}\n");
        let result = reader.read_frame().await;
        assert!(matches!(result, Err(FrameError::InvalidMessageId)));
    }

    #[tokio::test]
    async fn test_frame_reader_type_length_zero() {
        let mut reader = reader_for(b"DP|0||a1b2c3d4e5f6|2|{}\n");
        let result = reader.read_frame().await;
        assert!(matches!(result, Err(FrameError::TypeLengthOutOfRange)));
    }

    #[tokio::test]
    async fn test_frame_reader_type_length_too_many_digits() {
        let mut reader = reader_for(b"DP|1234|X|a1b2c3d4e5f6|2|{}\n");
        let result = reader.read_frame().await;
        assert!(matches!(result, Err(FrameError::TypeLengthTooManyDigits)));
    }

    #[tokio::test]
    async fn test_frame_reader_rejects_unknown_type() {
        let mut reader = reader_for(b"DP|8|ChatSend|a1b2c3d4e5f6|2|{}\n");
        let result = reader.read_frame().await;
        assert!(matches!(
            result,
            Err(FrameError::UnknownMessageType(t)) if t == "ChatSend"
        ));
    }

    #[tokio::test]
    async fn test_frame_reader_rejects_type_from_other_direction() {
        let mut reader = reader_for(b"DP|12|ListResponse|a1b2c3d4e5f6|5000000000000000000|");
        let result = reader.read_frame().await;
        assert!(matches!(
            result,
            Err(FrameError::UnknownMessageType(t)) if t == "ListResponse"
        ));

        let mut reader = client_reader_for(b"DP|4|List|a1b2c3d4e5f6|2|{}\n");
        let result = reader.read_frame().await;
        assert!(matches!(
            result,
            Err(FrameError::UnknownMessageType(t)) if t == "List"
        ));
    }

    #[tokio::test]
    async fn test_frame_reader_list_response_is_capped() {
        let mut reader = client_reader_for(b"DP|12|ListResponse|a1b2c3d4e5f6|5000000000000000000|");
        let result = reader.read_frame().await;
        assert!(matches!(
            result,
            Err(FrameError::PayloadLengthExceedsTypeMax {
                length: 5_000_000_000_000_000_000,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_frame_reader_payload_exceeds_type_max() {
        // List carries no fields, so a large payload is rejected before it is read
        let mut reader = reader_for(b"DP|4|List|a1b2c3d4e5f6|2000|");
        let result = reader.read_frame().await;
        assert!(matches!(
            result,
            Err(FrameError::PayloadLengthExceedsTypeMax {
                message_type,
                length: 2000,
                ..
            }) if message_type == "List"
        ));
    }

    #[tokio::test]
    async fn test_frame_reader_wrong_terminator() {
        let mut reader = reader_for(b"DP|4|List|a1b2c3d4e5f6|2|{} ");
        let result = reader.read_frame().await;
        assert!(matches!(result, Err(FrameError::MissingTerminator)));
    }

    #[tokio::test]
    async fn test_frame_reader_eof_mid_frame() {
        for data in [
            b"DP".as_slice(),
            b"DP|4|Li",
            b"DP|4|List|a1b2c3",
            b"DP|9|FileChunk|a1b2c3d4e5f6|10|short",
            b"DP|4|List|a1b2c3d4e5f6|2|{}",
        ] {
            let mut reader = reader_for(data);
            let result = reader.read_frame().await;
            assert!(
                matches!(result, Err(FrameError::ConnectionClosed)),
                "expected ConnectionClosed for {:?}, got {:?}",
                String::from_utf8_lossy(data),
                result
            );
        }
    }

    #[tokio::test]
    async fn test_full_timeout_idle() {
        let (_client, server) = tokio::io::duplex(64);
        let mut reader = FrameReader::new(server, Direction::ToServer);

        let result = reader
            .read_frame_with_full_timeout(Duration::from_millis(20), Duration::from_secs(1))
            .await;
        assert!(matches!(result, Err(FrameError::IdleTimeout)));
    }

    #[tokio::test]
    async fn test_full_timeout_partial_frame() {
        let (mut client, server) = tokio::io::duplex(64);
        let mut reader = FrameReader::new(server, Direction::ToServer);
        client.write_all(b"DP|4|Li").await.unwrap();

        let result = reader
            .read_frame_with_full_timeout(Duration::from_secs(1), Duration::from_millis(20))
            .await;
        assert!(matches!(result, Err(FrameError::FrameTimeout)));
    }

    #[tokio::test]
    async fn test_stream_payload_to_writer() {
        let mut reader = reader_for(b"DP|9|FileChunk|a1b2c3d4e5f6|11|hello world\n");

        let header = reader.read_frame_header().await.unwrap().unwrap();
        assert_eq!(header.message_type, "FileChunk");
        assert_eq!(header.payload_length, 11);

        let mut sink = Vec::new();
        let written = reader
            .stream_payload_to_writer(&header, &mut sink, DEFAULT_PROGRESS_TIMEOUT)
            .await
            .unwrap();
        assert_eq!(written, 11);
        assert_eq!(sink, b"hello world");
    }

    #[tokio::test]
    async fn test_read_payload_into_vec_after_header() {
        let mut reader = client_reader_for(b"DP|11|DownloadEnd|a1b2c3d4e5f6|22|{\"type\":\"DownloadEnd\"}\n");

        let header = reader.read_frame_header().await.unwrap().unwrap();
        let payload = reader.read_payload_into_vec(&header).await.unwrap();
        assert_eq!(payload, b"{\"type\":\"DownloadEnd\"}");
    }
}
