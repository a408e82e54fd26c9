//! Codec module - wire formats for protocol messages.
//!
//! Two interchangeable formats, selected once per topology:
//!
//! - [`JsonCodec`] - JSON documents followed by an `end` sentinel line
//! - [`MsgPackCodec`] - self-delimiting MessagePack values
//!
//! # Design
//!
//! Each format is a marker struct with static methods. [`Codec`] is the
//! runtime selector the rest of the crate passes around; it is `Copy` and
//! carries no state, so any number of channels can share one.
//!
//! # Example
//!
//! ```
//! use bytes::BytesMut;
//! use shellwire::codec::Codec;
//! use shellwire::value::Value;
//!
//! let codec: Codec = "json".parse().unwrap();
//! let encoded = codec.encode(&Value::from("hello")).unwrap();
//! assert!(encoded.ends_with(b"\nend\n"));
//!
//! let mut buf = BytesMut::from(&encoded[..]);
//! let decoded = codec.decode_frame(&mut buf).unwrap();
//! assert_eq!(decoded, Some(Value::from("hello")));
//! ```

mod json;
mod msgpack;

use std::fmt;
use std::str::FromStr;

use bytes::BytesMut;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ShellError};
use crate::value::Value;

pub use json::{JsonCodec, END_SENTINEL};
pub use msgpack::{message_len, MsgPackCodec};

/// Progress of a boundary search over a partially received message.
///
/// Kept between calls on the same buffer so bytes already inspected are
/// skipped when more data arrives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameScan {
    /// JSON: start of the line being collected. MsgPack: next marker.
    pos: usize,
    /// JSON: bytes already searched for a newline.
    searched: usize,
    /// MsgPack: values still to be walked.
    pending: u64,
}

/// Wire format used by every channel of a topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    /// JSON text with an `end` sentinel line after each document.
    Json,
    /// MessagePack, self-delimiting.
    #[default]
    MsgPack,
}

impl Codec {
    /// Encode one message, including any framing the format needs.
    pub fn encode(self, value: &Value) -> Result<Vec<u8>> {
        match self {
            Codec::Json => JsonCodec::encode(value),
            Codec::MsgPack => MsgPackCodec::encode(value),
        }
    }

    /// Take one complete message off the front of `buf`.
    ///
    /// Returns `Ok(None)` when `buf` does not yet hold a whole message; the
    /// buffer is left untouched in that case.
    pub fn decode_frame(self, buf: &mut BytesMut) -> Result<Option<Value>> {
        self.decode_frame_with(buf, &mut FrameScan::default())
    }

    /// Like [`decode_frame`](Self::decode_frame), but resumes the boundary
    /// search where `scan` left it on the previous call with the same buffer.
    ///
    /// `scan` is reset whenever bytes are taken off `buf`. Callers that drop
    /// bytes from `buf` some other way must reset it themselves.
    pub fn decode_frame_with(self, buf: &mut BytesMut, scan: &mut FrameScan) -> Result<Option<Value>> {
        let result = match self {
            Codec::Json => JsonCodec::decode_frame_with(buf, scan),
            Codec::MsgPack => MsgPackCodec::decode_frame_with(buf, scan),
        };
        if !matches!(result, Ok(None)) {
            *scan = FrameScan::default();
        }
        result
    }

    /// Configuration name of this format.
    pub fn name(self) -> &'static str {
        match self {
            Codec::Json => "json",
            Codec::MsgPack => "msgpack",
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Codec {
    type Err = ShellError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(Codec::Json),
            "msgpack" => Ok(Codec::MsgPack),
            other => Err(ShellError::InvalidConfig(format!(
                "unknown serializer: {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Map;

    fn sample() -> Value {
        let mut conf = Map::new();
        conf.insert("topology.name".to_string(), Value::from("t"));
        conf.insert("ratio".to_string(), Value::Float(0.25));
        conf.insert("negative".to_string(), Value::Int(-40_000));
        conf.insert("big".to_string(), Value::Int(i64::MIN));
        conf.insert(
            "list".to_string(),
            Value::Array(vec![Value::Null, Value::Bool(false), Value::from("ü")]),
        );
        Value::Map(conf)
    }

    #[test]
    fn test_roundtrip_both_codecs() {
        for codec in [Codec::Json, Codec::MsgPack] {
            let value = sample();
            let mut buf = BytesMut::from(&codec.encode(&value).unwrap()[..]);
            let decoded = codec.decode_frame(&mut buf).unwrap();
            assert_eq!(decoded, Some(value), "codec {}", codec);
            assert!(buf.is_empty(), "codec {} left bytes behind", codec);
        }
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("json".parse::<Codec>().unwrap(), Codec::Json);
        assert_eq!("msgpack".parse::<Codec>().unwrap(), Codec::MsgPack);
        assert!(matches!(
            "yaml".parse::<Codec>(),
            Err(ShellError::InvalidConfig(_))
        ));
        assert_eq!(Codec::default(), Codec::MsgPack);
    }

    #[test]
    fn test_serde_names() {
        let codec: Codec = serde_json::from_str(r#""json""#).unwrap();
        assert_eq!(codec, Codec::Json);
        assert_eq!(serde_json::to_string(&Codec::MsgPack).unwrap(), r#""msgpack""#);
    }

    /// xorshift64*: deterministic bit patterns without a rand dependency.
    fn bit_patterns(mut state: u64) -> impl Iterator<Item = u64> {
        std::iter::repeat_with(move || {
            state ^= state >> 12;
            state ^= state << 25;
            state ^= state >> 27;
            state.wrapping_mul(0x2545_f491_4f6c_dd1d)
        })
    }

    #[test]
    fn test_floats_roundtrip_exactly() {
        let floats: Vec<f64> = bit_patterns(0x9e37_79b9_7f4a_7c15)
            .map(f64::from_bits)
            .filter(|f| f.is_finite())
            .take(50_000)
            .chain([f64::MIN_POSITIVE, f64::MAX, f64::MIN, 5e-324, 0.1, -0.0])
            .collect();

        for codec in [Codec::Json, Codec::MsgPack] {
            for &f in &floats {
                let mut buf = BytesMut::from(&codec.encode(&Value::Float(f)).unwrap()[..]);
                let decoded = codec.decode_frame(&mut buf).unwrap();
                assert_eq!(
                    decoded.as_ref().and_then(Value::as_f64),
                    Some(f),
                    "codec {} changed {:e}",
                    codec,
                    f
                );
            }
        }
    }

    #[test]
    fn test_non_finite_floats() {
        for f in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let value = Value::Array(vec![Value::Float(f)]);
            assert!(matches!(Codec::Json.encode(&value), Err(ShellError::Json(_))));

            let mut buf = BytesMut::from(&Codec::MsgPack.encode(&value).unwrap()[..]);
            let decoded = Codec::MsgPack.decode_frame(&mut buf).unwrap().unwrap();
            let back = decoded.as_array().and_then(|items| items[0].as_f64()).unwrap();
            assert_eq!(back.is_nan(), f.is_nan());
            if !f.is_nan() {
                assert_eq!(back, f);
            }
        }
    }
}
