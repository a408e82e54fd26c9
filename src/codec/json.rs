//! JSON codec with `end` sentinel framing.
//!
//! A JSON document does not delimit itself on a byte stream, so every
//! message is followed by a line holding only `end`:
//!
//! ```text
//! {"command":"sync"}
//! end
//! ```
//!
//! The decoder collects lines until the sentinel and parses what came before
//! it as a single document. Documents may span several lines.

use bytes::BytesMut;

use super::FrameScan;
use crate::error::{Result, ShellError};
use crate::value::Value;

/// Line that terminates every JSON message.
pub const END_SENTINEL: &str = "end";

/// JSON codec for protocol messages.
pub struct JsonCodec;

impl JsonCodec {
    /// Encode a value followed by the sentinel line.
    pub fn encode(value: &Value) -> Result<Vec<u8>> {
        let mut out = serde_json::to_vec(value)?;
        out.push(b'\n');
        out.extend_from_slice(END_SENTINEL.as_bytes());
        out.push(b'\n');
        Ok(out)
    }

    /// Take one message off the front of `buf` if its sentinel has arrived.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolDecode` if the collected document is not valid JSON.
    /// The message and its sentinel are consumed either way, so the next call
    /// starts at the following message.
    pub fn decode_frame(buf: &mut BytesMut) -> Result<Option<Value>> {
        Self::decode_frame_with(buf, &mut FrameScan::default())
    }

    /// Resumable form of [`decode_frame`](Self::decode_frame). Lines already
    /// known not to be the sentinel are not searched again.
    pub(crate) fn decode_frame_with(buf: &mut BytesMut, scan: &mut FrameScan) -> Result<Option<Value>> {
        loop {
            let from = scan.searched.max(scan.pos);
            let Some(offset) = buf[from..].iter().position(|&b| b == b'\n') else {
                scan.searched = buf.len();
                return Ok(None);
            };
            let line_end = from + offset;

            if is_sentinel(&buf[scan.pos..line_end]) {
                let document_end = scan.pos;
                let frame = buf.split_to(line_end + 1);
                return parse_document(&frame[..document_end]).map(Some);
            }

            scan.pos = line_end + 1;
            scan.searched = scan.pos;
        }
    }
}

fn is_sentinel(line: &[u8]) -> bool {
    std::str::from_utf8(line)
        .map(|s| s.trim() == END_SENTINEL)
        .unwrap_or(false)
}

fn parse_document(document: &[u8]) -> Result<Value> {
    serde_json::from_slice(document)
        .map_err(|e| ShellError::ProtocolDecode(format!("invalid JSON message: {}", e)))
}
