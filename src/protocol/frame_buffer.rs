//! Frame buffer for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` for zero-copy buffer management. Bytes from the
//! pipe are appended as they arrive; the active [`Codec`] decides where one
//! message ends. Extraction is a small state machine:
//! - `Open`: messages are cut off the front of the buffer as they complete
//! - `Lost`: boundaries can no longer be found, every call fails
//!
//! # Example
//!
//! ```
//! use shellwire::codec::Codec;
//! use shellwire::protocol::FrameBuffer;
//! use shellwire::value::Value;
//!
//! let mut buffer = FrameBuffer::new(Codec::Json);
//! let encoded = Codec::Json.encode(&Value::Int(1)).unwrap();
//!
//! // Data arrives in chunks from the pipe
//! buffer.extend(&encoded[..3]);
//! assert_eq!(buffer.try_extract().unwrap(), None);
//! buffer.extend(&encoded[3..]);
//! assert_eq!(buffer.try_extract().unwrap(), Some(Value::Int(1)));
//! ```

use bytes::BytesMut;

use crate::codec::{Codec, FrameScan};
use crate::error::{Result, ShellError};
use crate::value::Value;

/// Default upper bound on a single buffered message: 64 MiB.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024 * 1024;

/// State machine for message extraction.
#[derive(Debug, Clone)]
enum State {
    Open,
    /// Framing was lost; the reason is repeated on every later call.
    Lost(String),
}

/// Buffer for accumulating incoming bytes and extracting complete messages.
pub struct FrameBuffer {
    /// Accumulated bytes from pipe reads.
    buffer: BytesMut,
    codec: Codec,
    /// Boundary search progress into `buffer`, kept across reads.
    scan: FrameScan,
    state: State,
    /// Largest incomplete message tolerated before framing is declared lost.
    max_message_size: usize,
}

impl FrameBuffer {
    /// Create a frame buffer with the default size limit.
    ///
    /// Default capacity: 64KB, max message: 64MiB.
    pub fn new(codec: Codec) -> Self {
        Self::with_max_message_size(codec, DEFAULT_MAX_MESSAGE_SIZE)
    }

    /// Create a frame buffer with a custom size limit.
    pub fn with_max_message_size(codec: Codec, max_message_size: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(64 * 1024),
            codec,
            scan: FrameScan::default(),
            state: State::Open,
            max_message_size,
        }
    }

    /// Codec this buffer frames with.
    pub fn codec(&self) -> Codec {
        self.codec
    }

    /// Append data to the buffer without extracting messages.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Try to extract a single message from the buffer.
    ///
    /// Returns:
    /// - `Ok(Some(value))` if a complete message was extracted
    /// - `Ok(None)` if more data is needed
    /// - `Err(ProtocolDecode)` if one message was malformed; it has been
    ///   consumed and the next call continues with the following message
    /// - `Err(FramingLost)` if boundaries can no longer be found, either
    ///   because the codec says so or because more than the size limit is
    ///   buffered without completing a message. This is permanent.
    pub fn try_extract(&mut self) -> Result<Option<Value>> {
        if let State::Lost(reason) = &self.state {
            return Err(ShellError::FramingLost(reason.clone()));
        }

        match self.codec.decode_frame_with(&mut self.buffer, &mut self.scan) {
            Ok(None) if self.buffer.len() > self.max_message_size => {
                Err(self.lose(format!(
                    "{} bytes buffered without a complete message, maximum is {}",
                    self.buffer.len(),
                    self.max_message_size
                )))
            }
            Err(ShellError::FramingLost(reason)) => Err(self.lose(reason)),
            other => other,
        }
    }

    fn lose(&mut self, reason: String) -> ShellError {
        self.buffer.clear();
        self.scan = FrameScan::default();
        self.state = State::Lost(reason.clone());
        ShellError::FramingLost(reason)
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Whether framing has been lost.
    pub fn is_lost(&self) -> bool {
        matches!(self.state, State::Lost(_))
    }

    /// Clear the buffer and reset state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.scan = FrameScan::default();
        self.state = State::Open;
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new(Codec::default())
    }
}
