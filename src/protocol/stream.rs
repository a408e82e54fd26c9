//! Message-level reading and writing over async byte streams.
//!
//! [`MessageReader`] pulls bytes from the pipe into a [`FrameBuffer`] until a
//! whole message is available. [`MessageWriter`] encodes, writes and flushes
//! one message per call; the peer is blocked waiting for it, so nothing is
//! held back in a userspace buffer.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::FrameBuffer;
use crate::codec::Codec;
use crate::config::ChannelConfig;
use crate::error::{Result, ShellError};
use crate::value::Value;

/// Reads whole messages from an async byte stream.
pub struct MessageReader<R> {
    reader: R,
    frames: FrameBuffer,
    chunk: Vec<u8>,
}

impl<R: AsyncRead + Unpin> MessageReader<R> {
    pub fn new(reader: R, config: &ChannelConfig) -> Self {
        Self {
            reader,
            frames: FrameBuffer::with_max_message_size(config.serializer, config.max_message_size),
            chunk: vec![0u8; config.read_chunk_size.max(1)],
        }
    }

    /// Read the next message.
    ///
    /// Suspends until a complete message has arrived.
    ///
    /// # Errors
    ///
    /// - `UnexpectedEndOfStream` if the stream closes first, whether or not
    ///   part of a message had been received.
    /// - `ProtocolDecode` for a malformed message; the following call reads
    ///   the next one.
    /// - `FramingLost` once message boundaries cannot be recovered.
    pub async fn read_value(&mut self) -> Result<Value> {
        loop {
            if let Some(value) = self.frames.try_extract()? {
                return Ok(value);
            }

            let n = self.reader.read(&mut self.chunk).await?;
            if n == 0 {
                if !self.frames.is_empty() {
                    tracing::debug!(
                        buffered = self.frames.len(),
                        "Stream closed mid-message"
                    );
                }
                return Err(ShellError::UnexpectedEndOfStream);
            }

            self.frames.extend(&self.chunk[..n]);
        }
    }

    pub fn codec(&self) -> Codec {
        self.frames.codec()
    }

    pub fn into_inner(self) -> R {
        self.reader
    }
}

/// Writes whole messages to an async byte stream.
pub struct MessageWriter<W> {
    writer: W,
    codec: Codec,
}

impl<W: AsyncWrite + Unpin> MessageWriter<W> {
    pub fn new(writer: W, codec: Codec) -> Self {
        Self { writer, codec }
    }

    /// Encode `value`, write it with its framing, and flush.
    pub async fn write_value(&mut self, value: &Value) -> Result<()> {
        let bytes = self.codec.encode(value)?;
        self.writer.write_all(&bytes).await?;
        self.writer.flush().await?;
        Ok(())
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_then_read_both_codecs() {
        for codec in [Codec::Json, Codec::MsgPack] {
            let config = ChannelConfig::new().serializer(codec).read_chunk_size(3);
            let (a, b) = tokio::io::duplex(1024);
            let mut writer = MessageWriter::new(a, codec);
            let mut reader = MessageReader::new(b, &config);

            writer.write_value(&Value::from("one")).await.unwrap();
            writer.write_value(&Value::Int(2)).await.unwrap();

            assert_eq!(reader.read_value().await.unwrap(), Value::from("one"));
            assert_eq!(reader.read_value().await.unwrap(), Value::Int(2));
        }
    }

    #[tokio::test]
    async fn test_end_of_stream_between_messages() {
        let config = ChannelConfig::new().serializer(Codec::Json);
        let mut reader = MessageReader::new(&b""[..], &config);
        assert!(matches!(
            reader.read_value().await,
            Err(ShellError::UnexpectedEndOfStream)
        ));
    }

    #[tokio::test]
    async fn test_end_of_stream_mid_message() {
        let config = ChannelConfig::new().serializer(Codec::Json);
        let mut reader = MessageReader::new(&b"{\"pid\": 1}\n"[..], &config);
        assert!(matches!(
            reader.read_value().await,
            Err(ShellError::UnexpectedEndOfStream)
        ));
    }

    #[tokio::test]
    async fn test_recovers_after_malformed_message() {
        let config = ChannelConfig::new().serializer(Codec::Json);
        let mut reader = MessageReader::new(&b"nope{\nend\n3\nend\n"[..], &config);

        let err = reader.read_value().await.unwrap_err();
        assert!(!err.is_fatal());
        assert_eq!(reader.read_value().await.unwrap(), Value::Int(3));
    }
}
