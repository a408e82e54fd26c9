//! Drivers that run a component's channel on behalf of the host.
//!
//! The host keeps ownership of tuple routing; the drivers only turn worker
//! commands into [`OutputCollector`] calls and answer task-id requests.

use tokio::io::{AsyncRead, AsyncWrite};

use super::{ComponentKind, ShellComponent};
use crate::channel::ShellChannel;
use crate::error::{Result, ShellError};
use crate::protocol::{BoltRelay, Emit, LogLevel, ShellMessage, SpoutCommand, TopologyContext};
use crate::value::Map;

/// Target of worker log commands re-emitted through `tracing`.
const WORKER_LOG_TARGET: &str = "shellwire::worker";

/// Host-side sink for what a worker produces.
pub trait OutputCollector {
    /// Route an emitted tuple. Returns the ids of the tasks it was sent to.
    fn emit(&mut self, emit: &Emit) -> Vec<i64>;

    fn ack(&mut self, id: &str);

    fn fail(&mut self, id: &str);

    /// The worker reported a failure in its component logic.
    fn report_error(&mut self, msg: &str);
}

fn forward_log(component: &str, msg: &str, level: LogLevel) {
    match level {
        LogLevel::Trace => tracing::trace!(target: WORKER_LOG_TARGET, component, "{}", msg),
        LogLevel::Debug => tracing::debug!(target: WORKER_LOG_TARGET, component, "{}", msg),
        LogLevel::Info => tracing::info!(target: WORKER_LOG_TARGET, component, "{}", msg),
        LogLevel::Warn => tracing::warn!(target: WORKER_LOG_TARGET, component, "{}", msg),
        LogLevel::Error => tracing::error!(target: WORKER_LOG_TARGET, component, "{}", msg),
    }
}

/// Channel plus component, shared by both drivers.
struct Driver<R, W> {
    component: ShellComponent,
    channel: ShellChannel<R, W>,
}

impl<R, W> Driver<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    fn new(component: ShellComponent, channel: ShellChannel<R, W>, kind: ComponentKind) -> Result<Self> {
        if component.kind() != kind {
            return Err(ShellError::InvalidConfig(format!(
                "'{}' is a {}, not a {}",
                component.name(),
                component.kind().as_str(),
                kind.as_str()
            )));
        }
        Ok(Self { component, channel })
    }

    async fn connect(&mut self, mut conf: Map, context: TopologyContext) -> Result<i64> {
        if let Some(component_conf) = self.component.component_configuration() {
            conf.extend(component_conf);
        }
        self.channel.connect(conf, context).await
    }

    /// Read one message and act on it. The message is returned so callers
    /// can decide whether they are done.
    async fn process_message(&mut self, collector: &mut impl OutputCollector) -> Result<ShellMessage> {
        let message = self.channel.next_message().await?;

        match &message {
            ShellMessage::Emit(emit) => {
                let task_ids = collector.emit(emit);
                if emit.need_task_ids {
                    self.channel.write_task_ids(&task_ids).await?;
                }
            }
            ShellMessage::Ack { id } => collector.ack(id),
            ShellMessage::Fail { id } => collector.fail(id),
            ShellMessage::Log { msg, level } => forward_log(self.component.name(), msg, *level),
            ShellMessage::Error { msg } => {
                tracing::error!(component = self.component.name(), "Worker error: {}", msg);
                collector.report_error(msg);
            }
            ShellMessage::Sync | ShellMessage::Next => {}
        }

        Ok(message)
    }
}

/// Drives a bolt worker.
pub struct ShellBolt<R, W> {
    driver: Driver<R, W>,
}

impl<R, W> ShellBolt<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// # Errors
    ///
    /// `InvalidConfig` if `component` is not a bolt.
    pub fn new(component: ShellComponent, channel: ShellChannel<R, W>) -> Result<Self> {
        Driver::new(component, channel, ComponentKind::Bolt).map(|driver| Self { driver })
    }

    pub fn component(&self) -> &ShellComponent {
        &self.driver.component
    }

    /// Handshake with the worker. The component's own configuration is
    /// merged into `conf`.
    pub async fn prepare(&mut self, conf: Map, context: TopologyContext) -> Result<i64> {
        self.driver.connect(conf, context).await
    }

    /// Send a tuple without waiting for the worker to finish with it.
    pub async fn send(&mut self, relay: &BoltRelay) -> Result<()> {
        self.driver.channel.write_bolt_relay(relay).await
    }

    /// Read and dispatch one message from the worker.
    pub async fn process_message(&mut self, collector: &mut impl OutputCollector) -> Result<ShellMessage> {
        self.driver.process_message(collector).await
    }

    /// Send a tuple and dispatch messages until the worker acks or fails it.
    ///
    /// Only for workers that settle each tuple before reading the next one.
    /// A worker that defers acks (batching or windowing) never answers here
    /// and this call waits forever; drive such workers with
    /// [`send`](Self::send) and [`process_message`](Self::process_message).
    pub async fn execute(&mut self, relay: &BoltRelay, collector: &mut impl OutputCollector) -> Result<()> {
        self.send(relay).await?;
        loop {
            match self.process_message(collector).await? {
                ShellMessage::Ack { id } | ShellMessage::Fail { id } if id == relay.id => {
                    return Ok(())
                }
                _ => {}
            }
        }
    }

    /// Send a tick tuple and dispatch messages until it is acked or failed.
    pub async fn tick(&mut self, id: &str, collector: &mut impl OutputCollector) -> Result<()> {
        self.execute(&BoltRelay::tick(id), collector).await
    }

    /// Send a heartbeat and dispatch messages until the worker syncs.
    pub async fn heartbeat(&mut self, collector: &mut impl OutputCollector) -> Result<()> {
        self.send(&BoltRelay::heartbeat()).await?;
        while self.process_message(collector).await? != ShellMessage::Sync {}
        Ok(())
    }
}

/// Drives a spout worker.
pub struct ShellSpout<R, W> {
    driver: Driver<R, W>,
}

impl<R, W> ShellSpout<R, W>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    /// # Errors
    ///
    /// `InvalidConfig` if `component` is not a spout.
    pub fn new(component: ShellComponent, channel: ShellChannel<R, W>) -> Result<Self> {
        Driver::new(component, channel, ComponentKind::Spout).map(|driver| Self { driver })
    }

    pub fn component(&self) -> &ShellComponent {
        &self.driver.component
    }

    /// Handshake with the worker. The component's own configuration is
    /// merged into `conf`.
    pub async fn open(&mut self, conf: Map, context: TopologyContext) -> Result<i64> {
        self.driver.connect(conf, context).await
    }

    /// Send `command` and dispatch messages until the worker syncs.
    pub async fn command(&mut self, command: &SpoutCommand, collector: &mut impl OutputCollector) -> Result<()> {
        self.driver.channel.write_spout_command(command).await?;
        while self.driver.process_message(collector).await? != ShellMessage::Sync {}
        Ok(())
    }

    pub async fn next_tuple(&mut self, collector: &mut impl OutputCollector) -> Result<()> {
        self.command(&SpoutCommand::Next, collector).await
    }

    pub async fn ack(&mut self, id: &str, collector: &mut impl OutputCollector) -> Result<()> {
        self.command(&SpoutCommand::Ack(id.to_string()), collector).await
    }

    pub async fn fail(&mut self, id: &str, collector: &mut impl OutputCollector) -> Result<()> {
        self.command(&SpoutCommand::Fail(id.to_string()), collector).await
    }

    pub async fn activate(&mut self, collector: &mut impl OutputCollector) -> Result<()> {
        self.command(&SpoutCommand::Activate, collector).await
    }

    pub async fn deactivate(&mut self, collector: &mut impl OutputCollector) -> Result<()> {
        self.command(&SpoutCommand::Deactivate, collector).await
    }
}
