//! Worker side of the shell protocol.
//!
//! A worker process reads the handshake from stdin, answers with its pid,
//! then alternates between reading input from the host and writing commands.
//! [`WorkerChannel`] manages that lifecycle:
//! 1. Read the handshake and reply with the pid
//! 2. Touch `<pidDir>/<pid>` so the host can watch the process
//! 3. Read tuples or spout commands; write emit/ack/fail/log/sync
//!
//! # Example
//!
//! ```ignore
//! use shellwire::worker::WorkerChannel;
//! use shellwire::protocol::Emit;
//!
//! #[tokio::main]
//! async fn main() -> shellwire::Result<()> {
//!     let mut channel = WorkerChannel::stdio(&Default::default());
//!     channel.handshake(std::process::id().into()).await?;
//!
//!     loop {
//!         let tuple = channel.next_tuple().await?;
//!         channel.emit(&Emit::new(tuple.tuple.clone()).anchored_to(vec![tuple.id.clone()])).await?;
//!         channel.ack(&tuple.id).await?;
//!     }
//! }
//! ```
//!
//! The host may send task-id replies and new commands in either order, so each
//! kind read out of turn is queued until asked for.

use std::collections::VecDeque;
use std::path::Path;

use tokio::io::{AsyncRead, AsyncWrite, Stdin, Stdout};

use crate::config::ChannelConfig;
use crate::error::{Result, ShellError};
use crate::protocol::{
    BoltRelay, Emit, HandshakeRequest, HandshakeResponse, HostMessage, LogLevel, MessageReader,
    MessageWriter, ShellMessage,
};

/// Worker end of the host's pipes.
pub struct WorkerChannel<R, W> {
    reader: MessageReader<R>,
    writer: MessageWriter<W>,
    pending_commands: VecDeque<HostMessage>,
    pending_task_ids: VecDeque<Vec<i64>>,
}

impl WorkerChannel<Stdin, Stdout> {
    /// Bind the process's own stdin and stdout.
    ///
    /// Anything else written to stdout corrupts the protocol; log to stderr.
    pub fn stdio(config: &ChannelConfig) -> Self {
        Self::new(tokio::io::stdin(), tokio::io::stdout(), config)
    }
}

impl<R, W> WorkerChannel<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// Wrap the host's output (`reader`) and input (`writer`).
    pub fn new(reader: R, writer: W, config: &ChannelConfig) -> Self {
        Self {
            reader: MessageReader::new(reader, config),
            writer: MessageWriter::new(writer, config.serializer),
            pending_commands: VecDeque::new(),
            pending_task_ids: VecDeque::new(),
        }
    }

    /// Receive the handshake, reply with `pid` and create the pid file.
    ///
    /// # Errors
    ///
    /// - `HandshakeFailed` if the first message is not a handshake.
    /// - `Io` if the pid file cannot be created.
    pub async fn handshake(&mut self, pid: i64) -> Result<HandshakeRequest> {
        let request = self
            .reader
            .read_value()
            .await
            .and_then(HandshakeRequest::from_value)
            .map_err(|e| match e {
                ShellError::Io(e) => ShellError::Io(e),
                other => ShellError::HandshakeFailed(other.to_string()),
            })?;

        self.writer
            .write_value(&HandshakeResponse { pid }.to_value())
            .await?;

        if !request.pid_dir.is_empty() {
            let path = Path::new(&request.pid_dir).join(pid.to_string());
            tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await?;
            tracing::debug!(path = %path.display(), "Created pid file");
        }

        Ok(request)
    }

    async fn read_host_message(&mut self) -> Result<HostMessage> {
        let value = self.reader.read_value().await?;
        HostMessage::from_value(value)
    }

    /// Next tuple or spout command, queueing task-id replies read first.
    pub async fn read_command(&mut self) -> Result<HostMessage> {
        if let Some(command) = self.pending_commands.pop_front() {
            return Ok(command);
        }

        loop {
            match self.read_host_message().await? {
                HostMessage::TaskIds(ids) => self.pending_task_ids.push_back(ids),
                command => return Ok(command),
            }
        }
    }

    /// Next task-id reply, queueing commands read first.
    pub async fn read_task_ids(&mut self) -> Result<Vec<i64>> {
        if let Some(ids) = self.pending_task_ids.pop_front() {
            return Ok(ids);
        }

        loop {
            match self.read_host_message().await? {
                HostMessage::TaskIds(ids) => return Ok(ids),
                command => self.pending_commands.push_back(command),
            }
        }
    }

    /// Next tuple for a bolt. Heartbeats are answered with `sync` and not
    /// returned; tick tuples are.
    ///
    /// # Errors
    ///
    /// `Protocol` if the host sends a spout command.
    pub async fn next_tuple(&mut self) -> Result<BoltRelay> {
        loop {
            match self.read_command().await? {
                HostMessage::Tuple(relay) if relay.is_heartbeat() => self.sync().await?,
                HostMessage::Tuple(relay) => return Ok(relay),
                other => {
                    return Err(ShellError::Protocol(format!(
                        "bolt received a spout command: {:?}",
                        other
                    )))
                }
            }
        }
    }

    /// Write one command.
    pub async fn send(&mut self, message: &ShellMessage) -> Result<()> {
        self.writer.write_value(&message.to_value()).await
    }

    /// Emit a tuple. Returns the receiving task ids when they were asked for.
    pub async fn emit(&mut self, emit: &Emit) -> Result<Option<Vec<i64>>> {
        self.send(&ShellMessage::Emit(emit.clone())).await?;
        if emit.need_task_ids {
            self.read_task_ids().await.map(Some)
        } else {
            Ok(None)
        }
    }

    pub async fn ack(&mut self, id: &str) -> Result<()> {
        self.send(&ShellMessage::Ack { id: id.to_string() }).await
    }

    pub async fn fail(&mut self, id: &str) -> Result<()> {
        self.send(&ShellMessage::Fail { id: id.to_string() }).await
    }

    /// Ask the host to log `msg`.
    pub async fn log(&mut self, msg: &str, level: LogLevel) -> Result<()> {
        self.send(&ShellMessage::Log {
            msg: msg.to_string(),
            level,
        })
        .await
    }

    /// Report a failure in the component logic.
    pub async fn error(&mut self, msg: &str) -> Result<()> {
        self.send(&ShellMessage::Error {
            msg: msg.to_string(),
        })
        .await
    }

    /// Answer a heartbeat, or end a spout command.
    pub async fn sync(&mut self) -> Result<()> {
        self.send(&ShellMessage::Sync).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Codec;
    use crate::protocol::{task_ids_to_value, SpoutCommand, TopologyContext};
    use crate::value::{Map, Value};
    use tokio::io::{duplex, DuplexStream, ReadHalf, WriteHalf};

    type Host = (
        MessageReader<ReadHalf<DuplexStream>>,
        MessageWriter<WriteHalf<DuplexStream>>,
    );

    fn pipes(codec: Codec) -> (WorkerChannel<ReadHalf<DuplexStream>, WriteHalf<DuplexStream>>, Host) {
        let config = ChannelConfig::new().serializer(codec);
        let (worker, host) = duplex(64 * 1024);
        let (worker_read, worker_write) = tokio::io::split(worker);
        let (host_read, host_write) = tokio::io::split(host);
        (
            WorkerChannel::new(worker_read, worker_write, &config),
            (
                MessageReader::new(host_read, &config),
                MessageWriter::new(host_write, codec),
            ),
        )
    }

    fn relay(id: &str) -> BoltRelay {
        BoltRelay {
            id: id.to_string(),
            comp: "spout".to_string(),
            stream: "default".to_string(),
            task: 1,
            tuple: vec![Value::Int(1)],
        }
    }

    #[tokio::test]
    async fn test_handshake_touches_pid_file() {
        let dir = std::env::temp_dir().join(format!("shellwire-pid-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let (mut worker, (mut reader, mut writer)) = pipes(Codec::MsgPack);
        let request = HandshakeRequest {
            conf: Map::new(),
            pid_dir: dir.to_string_lossy().into_owned(),
            context: TopologyContext::new(3).with_task(3, "b1"),
        };
        writer.write_value(&request.to_value()).await.unwrap();

        let received = worker.handshake(4242).await.unwrap();
        assert_eq!(received.context.component(), Some("b1"));

        let reply = HandshakeResponse::from_value(reader.read_value().await.unwrap()).unwrap();
        assert_eq!(reply.pid, 4242);
        assert!(dir.join("4242").exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_handshake_rejects_non_handshake() {
        let (mut worker, (_reader, mut writer)) = pipes(Codec::Json);
        writer.write_value(&Value::Array(vec![])).await.unwrap();
        assert!(matches!(
            worker.handshake(1).await,
            Err(ShellError::HandshakeFailed(_))
        ));
    }

    #[tokio::test]
    async fn test_out_of_turn_messages_are_queued() {
        let (mut worker, (_reader, mut writer)) = pipes(Codec::Json);

        writer.write_value(&relay("t2").to_value()).await.unwrap();
        writer.write_value(&task_ids_to_value(&[7])).await.unwrap();
        writer.write_value(&task_ids_to_value(&[8])).await.unwrap();
        writer.write_value(&relay("t3").to_value()).await.unwrap();

        assert_eq!(worker.read_task_ids().await.unwrap(), vec![7]);
        assert_eq!(
            worker.read_command().await.unwrap(),
            HostMessage::Tuple(relay("t2"))
        );
        assert_eq!(
            worker.read_command().await.unwrap(),
            HostMessage::Tuple(relay("t3"))
        );
        assert_eq!(worker.read_task_ids().await.unwrap(), vec![8]);
    }

    #[tokio::test]
    async fn test_emit_waits_for_task_ids() {
        let (mut worker, (mut reader, mut writer)) = pipes(Codec::MsgPack);
        writer.write_value(&task_ids_to_value(&[4, 5])).await.unwrap();

        let ids = worker.emit(&Emit::new(vec![Value::from("w")])).await.unwrap();
        assert_eq!(ids, Some(vec![4, 5]));

        let none = worker
            .emit(&Emit::new(vec![Value::from("w")]).without_task_ids())
            .await
            .unwrap();
        assert_eq!(none, None);

        for _ in 0..2 {
            let message = ShellMessage::from_value(reader.read_value().await.unwrap()).unwrap();
            assert_eq!(message.command(), "emit");
        }
    }

    #[tokio::test]
    async fn test_next_tuple_answers_heartbeat() {
        let (mut worker, (mut reader, mut writer)) = pipes(Codec::Json);
        writer.write_value(&BoltRelay::heartbeat().to_value()).await.unwrap();
        writer.write_value(&BoltRelay::tick("9").to_value()).await.unwrap();

        let tuple = worker.next_tuple().await.unwrap();
        assert!(tuple.is_tick());

        assert_eq!(
            ShellMessage::from_value(reader.read_value().await.unwrap()).unwrap(),
            ShellMessage::Sync
        );
    }

    #[tokio::test]
    async fn test_next_tuple_rejects_spout_command() {
        let (mut worker, (_reader, mut writer)) = pipes(Codec::Json);
        writer.write_value(&SpoutCommand::Next.to_value()).await.unwrap();
        assert!(matches!(
            worker.next_tuple().await,
            Err(ShellError::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn test_commands_written() {
        let (mut worker, (mut reader, _writer)) = pipes(Codec::Json);
        worker.ack("1").await.unwrap();
        worker.fail("2").await.unwrap();
        worker.log("hello", LogLevel::Warn).await.unwrap();
        worker.error("trace").await.unwrap();

        let mut commands = Vec::new();
        for _ in 0..4 {
            commands.push(ShellMessage::from_value(reader.read_value().await.unwrap()).unwrap());
        }
        assert_eq!(
            commands,
            vec![
                ShellMessage::Ack { id: "1".into() },
                ShellMessage::Fail { id: "2".into() },
                ShellMessage::Log {
                    msg: "hello".into(),
                    level: LogLevel::Warn
                },
                ShellMessage::Error {
                    msg: "trace".into()
                },
            ]
        );
    }
}
