//! Word Count Worker - a bolt written in Rust.
//!
//! This example demonstrates:
//! - Handshaking over stdin/stdout with `WorkerChannel::stdio`
//! - Emitting anchored tuples and acking the input
//! - Handling tick tuples (heartbeats are answered automatically)
//! - Logging through the host with the `log` command
//!
//! Diagnostics go to stderr; stdout belongs to the protocol.
//!
//! # Running
//!
//! ```sh
//! cargo build --example word_count_worker
//! cargo run --example host -- target/debug/examples/word_count_worker
//! ```

use std::collections::HashMap;

use shellwire::component::WORKER_CONFIG_FLAG;
use shellwire::{ChannelConfig, Emit, LogLevel, ShellError, Value, WorkerChannel};
use tracing_subscriber::EnvFilter;

/// Channel settings from `--pyleus-config <json>`, as the host passes them.
fn channel_config() -> shellwire::Result<ChannelConfig> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == WORKER_CONFIG_FLAG {
            if let Some(document) = args.next() {
                return ChannelConfig::from_json(&document);
            }
        }
    }
    Ok(ChannelConfig::default())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = channel_config()?;
    let mut channel = WorkerChannel::stdio(&config);
    let request = channel.handshake(i64::from(std::process::id())).await?;
    tracing::info!(
        task = request.context.task_id,
        component = ?request.context.component(),
        serializer = %config.serializer,
        "Word count worker ready"
    );

    let mut counts: HashMap<String, i64> = HashMap::new();

    loop {
        let tuple = match channel.next_tuple().await {
            Ok(tuple) => tuple,
            // Host closed our stdin: normal shutdown.
            Err(ShellError::UnexpectedEndOfStream) => break,
            Err(e) => return Err(e.into()),
        };

        if tuple.is_tick() {
            let summary = format!("{} distinct words so far", counts.len());
            channel.log(&summary, LogLevel::Info).await?;
            channel.ack(&tuple.id).await?;
            continue;
        }

        let words = tuple
            .tuple
            .iter()
            .filter_map(Value::as_str)
            .flat_map(str::split_whitespace)
            .map(str::to_lowercase);

        for word in words {
            let count = counts.entry(word.clone()).or_insert(0);
            *count += 1;

            let emit = Emit::new(vec![Value::from(word), Value::Int(*count)])
                .anchored_to(vec![tuple.id.clone()])
                .without_task_ids();
            channel.emit(&emit).await?;
        }

        channel.ack(&tuple.id).await?;
    }

    tracing::info!(distinct = counts.len(), "Word count worker exiting");
    Ok(())
}
