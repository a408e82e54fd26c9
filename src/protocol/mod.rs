//! Protocol module - framing and message types.
//!
//! This module implements the message layer on top of the codecs:
//! - Frame buffer for accumulating partial reads
//! - Async reader and writer for whole messages
//! - Handshake and runtime message types with typed field extraction

mod fields;
mod frame_buffer;
mod handshake;
mod message;
mod stream;

pub use frame_buffer::{FrameBuffer, DEFAULT_MAX_MESSAGE_SIZE};
pub use handshake::{HandshakeRequest, HandshakeResponse, TopologyContext};
pub use message::{
    task_ids_from_value, task_ids_to_value, BoltRelay, Emit, HostMessage, LogLevel, ShellMessage,
    SpoutCommand, DEFAULT_STREAM, HEARTBEAT_STREAM, SYSTEM_COMPONENT, TICK_STREAM,
};
pub use stream::{MessageReader, MessageWriter};
