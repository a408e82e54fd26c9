//! MsgPack codec using `rmp-serde`.
//!
//! MessagePack values carry their own length: every value starts with a
//! marker byte that gives its type and either its size or the width of a
//! size prefix. No sentinel is written; [`message_len`] walks the markers to
//! find where one message ends before the bytes are handed to `rmp-serde`.
//!
//! # Example
//!
//! ```
//! use shellwire::codec::{message_len, MsgPackCodec};
//! use shellwire::value::Value;
//!
//! let encoded = MsgPackCodec::encode(&Value::Array(vec![Value::Int(1), Value::from("a")])).unwrap();
//! assert_eq!(message_len(&encoded).unwrap(), Some(encoded.len()));
//! assert_eq!(message_len(&encoded[..2]).unwrap(), None);
//! ```

use bytes::BytesMut;
use rmp::Marker;

use super::FrameScan;
use crate::error::{Result, ShellError};
use crate::value::Value;

/// Read a big-endian length prefix of `width` bytes at `pos`, advancing
/// `pos` past it. Returns `Ok(None)` from the enclosing function if the
/// prefix has not fully arrived.
macro_rules! try_len {
    ($buf:expr, $pos:ident, $width:expr) => {{
        let Some(prefix) = $buf.get($pos..$pos + $width) else {
            return Ok(None);
        };
        $pos += $width;
        prefix.iter().fold(0u64, |acc, &b| (acc << 8) | u64::from(b))
    }};
}

/// MessagePack codec for protocol messages.
pub struct MsgPackCodec;

impl MsgPackCodec {
    /// Encode a value to MsgPack bytes.
    ///
    /// Uses `to_vec_named` so any struct reaching the encoder is written as a
    /// map with field names, which is what workers expect.
    #[inline]
    pub fn encode(value: &Value) -> Result<Vec<u8>> {
        Ok(rmp_serde::to_vec_named(value)?)
    }

    /// Take one message off the front of `buf` if it is complete.
    ///
    /// # Errors
    ///
    /// - `FramingLost` if a reserved marker makes the boundary unknowable.
    /// - `ProtocolDecode` if the frame is complete but is not a valid value
    ///   (for instance an unsigned integer above `i64::MAX`). The frame is
    ///   consumed, so reading can continue.
    pub fn decode_frame(buf: &mut BytesMut) -> Result<Option<Value>> {
        Self::decode_frame_with(buf, &mut FrameScan::default())
    }

    /// Resumable form of [`decode_frame`](Self::decode_frame). Markers already
    /// walked are not walked again.
    pub(crate) fn decode_frame_with(buf: &mut BytesMut, scan: &mut FrameScan) -> Result<Option<Value>> {
        let Some(len) = scan_message(buf, scan)? else {
            return Ok(None);
        };

        let frame = buf.split_to(len);
        rmp_serde::from_slice(&frame)
            .map(Some)
            .map_err(|e| ShellError::ProtocolDecode(format!("invalid MsgPack message: {}", e)))
    }
}

/// Length in bytes of the first complete MsgPack value in `buf`.
///
/// Returns `Ok(None)` if `buf` ends before the value does.
pub fn message_len(buf: &[u8]) -> Result<Option<usize>> {
    scan_message(buf, &mut FrameScan::default())
}

/// Walk markers from where `scan` stopped. `scan` only advances past markers
/// whose length prefix has fully arrived; payload bytes are skipped by count,
/// so a long string or binary is never inspected.
fn scan_message(buf: &[u8], scan: &mut FrameScan) -> Result<Option<usize>> {
    // Fresh scan: one top-level value. Every array element and map key/value
    // discovered along the way adds to `pending`.
    if scan.pos == 0 {
        scan.pending = 1;
    }

    loop {
        if scan.pos > buf.len() {
            return Ok(None);
        }
        if scan.pending == 0 {
            return Ok(Some(scan.pos));
        }

        let mut pos = scan.pos;
        let mut pending = scan.pending;
        let Some(&byte) = buf.get(pos) else {
            return Ok(None);
        };
        pending -= 1;
        pos += 1;

        let skip = match Marker::from_u8(byte) {
            Marker::FixPos(_) | Marker::FixNeg(_) | Marker::Null | Marker::True | Marker::False => 0,
            Marker::U8 | Marker::I8 => 1,
            Marker::U16 | Marker::I16 => 2,
            Marker::U32 | Marker::I32 | Marker::F32 => 4,
            Marker::U64 | Marker::I64 | Marker::F64 => 8,
            Marker::FixStr(n) => u64::from(n),
            Marker::Str8 | Marker::Bin8 => try_len!(buf, pos, 1),
            Marker::Str16 | Marker::Bin16 => try_len!(buf, pos, 2),
            Marker::Str32 | Marker::Bin32 => try_len!(buf, pos, 4),
            Marker::FixArray(n) => {
                pending += u64::from(n);
                0
            }
            Marker::Array16 => {
                pending += try_len!(buf, pos, 2);
                0
            }
            Marker::Array32 => {
                pending += try_len!(buf, pos, 4);
                0
            }
            Marker::FixMap(n) => {
                pending += 2 * u64::from(n);
                0
            }
            Marker::Map16 => {
                pending += 2 * try_len!(buf, pos, 2);
                0
            }
            Marker::Map32 => {
                pending += 2 * try_len!(buf, pos, 4);
                0
            }
            // Extension payloads are preceded by a one-byte type tag.
            Marker::FixExt1 => 2,
            Marker::FixExt2 => 3,
            Marker::FixExt4 => 5,
            Marker::FixExt8 => 9,
            Marker::FixExt16 => 17,
            Marker::Ext8 => try_len!(buf, pos, 1) + 1,
            Marker::Ext16 => try_len!(buf, pos, 2) + 1,
            Marker::Ext32 => try_len!(buf, pos, 4) + 1,
            Marker::Reserved => {
                return Err(ShellError::FramingLost(format!(
                    "reserved MsgPack marker 0x{:02x} at offset {}",
                    byte,
                    pos - 1
                )))
            }
        };

        scan.pos = usize::try_from(skip)
            .ok()
            .and_then(|skip| pos.checked_add(skip))
            .ok_or_else(|| ShellError::FramingLost("MsgPack length overflows".to_string()))?;
        scan.pending = pending;
    }
}
