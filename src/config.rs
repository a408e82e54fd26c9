//! Channel configuration.
//!
//! Read from the topology document alongside the component specs:
//!
//! ```json
//! { "serializer": "json", "max_message_size": 1048576 }
//! ```
//!
//! Every field is optional.

use serde::{Deserialize, Serialize};

use crate::codec::Codec;
use crate::error::{Result, ShellError};
use crate::protocol::DEFAULT_MAX_MESSAGE_SIZE;

/// Default size of a single pipe read: 64KB.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 64 * 1024;

/// Settings shared by every channel of a topology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Wire format.
    pub serializer: Codec,
    /// Largest message accepted from a worker, in bytes.
    pub max_message_size: usize,
    /// Bytes requested from the pipe per read.
    pub read_chunk_size: usize,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            serializer: Codec::default(),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
        }
    }
}

impl ChannelConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the wire format.
    pub fn serializer(mut self, codec: Codec) -> Self {
        self.serializer = codec;
        self
    }

    /// Set the maximum message size.
    pub fn max_message_size(mut self, bytes: usize) -> Self {
        self.max_message_size = bytes;
        self
    }

    /// Set the pipe read size.
    pub fn read_chunk_size(mut self, bytes: usize) -> Self {
        self.read_chunk_size = bytes;
        self
    }

    /// Parse from a JSON topology document and validate.
    pub fn from_json(document: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(document)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject sizes that would make a channel unusable.
    pub fn validate(&self) -> Result<()> {
        if self.max_message_size == 0 {
            return Err(ShellError::InvalidConfig(
                "max_message_size must be positive".to_string(),
            ));
        }
        if self.read_chunk_size == 0 {
            return Err(ShellError::InvalidConfig(
                "read_chunk_size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
