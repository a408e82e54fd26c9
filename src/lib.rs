//! # shellwire
//!
//! Host and worker sides of the multilang shell protocol, used by
//! stream-processing topologies to run components as subprocesses.
//!
//! This crate lets a host drive spouts and bolts that live in another
//! process, and lets a Rust program be such a worker.
//!
//! ## Architecture
//!
//! - **Handshake**: the host sends configuration, pid directory and topology
//!   context; the worker replies with its pid
//! - **Runtime**: tuples and spout commands flow to the worker over its stdin,
//!   emits/acks/fails/logs flow back over its stdout
//! - **Wire format**: JSON documents followed by an `end` line, or
//!   self-delimiting MessagePack, chosen once per topology
//!
//! ## Example
//!
//! ```ignore
//! use shellwire::{ChannelConfig, ShellProcess, TopologyContext};
//!
//! #[tokio::main]
//! async fn main() -> shellwire::Result<()> {
//!     let (mut channel, _process) =
//!         ShellProcess::spawn(&["./word_count_worker"], &ChannelConfig::default())?;
//!     let pid = channel
//!         .connect(Default::default(), TopologyContext::new(1).with_task(1, "count"))
//!         .await?;
//!
//!     loop {
//!         let message = channel.next_message().await?;
//!         println!("{pid}: {message:?}");
//!     }
//! }
//! ```

pub mod channel;
pub mod codec;
pub mod component;
pub mod config;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod value;
pub mod worker;

pub use channel::ShellChannel;
pub use codec::Codec;
pub use component::{OutputCollector, OutputFields, ShellBolt, ShellComponent, ShellSpout};
pub use config::ChannelConfig;
pub use error::{Result, ShellError};
pub use protocol::{BoltRelay, Emit, LogLevel, ShellMessage, SpoutCommand, TopologyContext};
pub use transport::ShellProcess;
pub use value::{Map, Value};
pub use worker::WorkerChannel;
