//! Host side of the shell protocol.
//!
//! A [`ShellChannel`] owns both pipe halves of one worker. It is driven by
//! the task that owns the component; there is no internal locking and every
//! write is flushed before the call returns.
//!
//! # Lifecycle
//!
//! ```text
//! new ──► connect ──► read_message / write_* ... ──► (drop)
//!            │
//!            └─ fails ──► unusable
//! ```

use tokio::io::{AsyncRead, AsyncWrite};

use crate::codec::Codec;
use crate::config::ChannelConfig;
use crate::error::{Result, ShellError};
use crate::protocol::{
    task_ids_to_value, BoltRelay, HandshakeRequest, HandshakeResponse, MessageReader,
    MessageWriter, ShellMessage, SpoutCommand, TopologyContext,
};
use crate::value::Map;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Fresh,
    Connected { pid: i64 },
    Failed,
}

/// Host end of a worker's stdin/stdout.
pub struct ShellChannel<R, W> {
    reader: MessageReader<R>,
    writer: MessageWriter<W>,
    pid_dir: String,
    state: State,
}

impl<R, W> ShellChannel<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Wrap the worker's stdout (`reader`) and stdin (`writer`).
    pub fn new(reader: R, writer: W, config: &ChannelConfig) -> Self {
        Self {
            reader: MessageReader::new(reader, config),
            writer: MessageWriter::new(writer, config.serializer),
            pid_dir: String::new(),
            state: State::Fresh,
        }
    }

    /// Directory sent to the worker for its pid file.
    pub fn with_pid_dir(mut self, pid_dir: impl Into<String>) -> Self {
        self.pid_dir = pid_dir.into();
        self
    }

    /// Perform the handshake and return the worker's pid.
    ///
    /// # Errors
    ///
    /// - `HandshakeFailed` if the pipes fail or close before the reply
    ///   arrives, or the worker replies with anything other than a map
    ///   holding an integer `pid`.
    /// - `Protocol` if the channel already connected (or tried to).
    pub async fn connect(&mut self, conf: Map, context: TopologyContext) -> Result<i64> {
        if self.state != State::Fresh {
            return Err(ShellError::Protocol(
                "handshake already performed on this channel".to_string(),
            ));
        }
        self.state = State::Failed;

        let request = HandshakeRequest {
            conf,
            pid_dir: self.pid_dir.clone(),
            context,
        };
        tracing::debug!(task_id = request.context.task_id, "Sending handshake");
        let HandshakeResponse { pid } = self
            .exchange_handshake(&request)
            .await
            .map_err(|e| match e {
                ShellError::HandshakeFailed(reason) => ShellError::HandshakeFailed(reason),
                other => ShellError::HandshakeFailed(other.to_string()),
            })?;

        tracing::debug!(pid, "Handshake complete");
        self.state = State::Connected { pid };
        Ok(pid)
    }

    async fn exchange_handshake(&mut self, request: &HandshakeRequest) -> Result<HandshakeResponse> {
        self.writer.write_value(&request.to_value()).await?;
        let reply = self.reader.read_value().await?;
        HandshakeResponse::from_value(reply)
    }

    /// Worker pid, once connected.
    pub fn pid(&self) -> Option<i64> {
        match self.state {
            State::Connected { pid } => Some(pid),
            _ => None,
        }
    }

    pub fn codec(&self) -> Codec {
        self.writer.codec()
    }

    fn ensure_connected(&self) -> Result<()> {
        match self.state {
            State::Connected { .. } => Ok(()),
            State::Fresh => Err(ShellError::Protocol(
                "channel used before handshake".to_string(),
            )),
            State::Failed => Err(ShellError::Protocol(
                "channel used after a failed handshake".to_string(),
            )),
        }
    }

    /// Read and classify the next message from the worker.
    ///
    /// Suspends until a whole message arrives. Errors that concern a single
    /// message (see [`ShellError::is_fatal`]) leave the channel usable.
    pub async fn read_message(&mut self) -> Result<ShellMessage> {
        self.ensure_connected()?;

        let result = self
            .reader
            .read_value()
            .await
            .and_then(ShellMessage::from_value);

        if let Err(e) = &result {
            if e.is_fatal() {
                tracing::error!(pid = ?self.pid(), "Channel failed: {}", e);
            }
        }
        result
    }

    /// Read the next valid message, dropping malformed ones.
    ///
    /// Only fatal errors are returned.
    pub async fn next_message(&mut self) -> Result<ShellMessage> {
        loop {
            match self.read_message().await {
                Ok(message) => return Ok(message),
                Err(e) if !e.is_fatal() && !matches!(e, ShellError::Protocol(_)) => {
                    tracing::warn!(pid = ?self.pid(), "Dropping message: {}", e);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Send an input tuple to a bolt.
    pub async fn write_bolt_relay(&mut self, relay: &BoltRelay) -> Result<()> {
        self.ensure_connected()?;
        self.writer.write_value(&relay.to_value()).await
    }

    /// Send a command to a spout.
    pub async fn write_spout_command(&mut self, command: &SpoutCommand) -> Result<()> {
        self.ensure_connected()?;
        self.writer.write_value(&command.to_value()).await
    }

    /// Answer an emit that asked for the receiving task ids.
    pub async fn write_task_ids(&mut self, task_ids: &[i64]) -> Result<()> {
        self.ensure_connected()?;
        self.writer.write_value(&task_ids_to_value(task_ids)).await
    }
}
