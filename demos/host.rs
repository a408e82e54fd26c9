//! Host - drives a bolt worker subprocess.
//!
//! This example demonstrates:
//! - Declaring a bolt with output fields and a tick frequency
//! - Spawning the worker with `ShellProcess` (its stderr lands in our logs)
//! - Sending tuples, a tick and a heartbeat through `ShellBolt`
//! - Collecting emits and acks with an `OutputCollector`
//!
//! # Running
//!
//! ```sh
//! cargo build --example word_count_worker
//! RUST_LOG=debug cargo run --example host -- target/debug/examples/word_count_worker
//! ```

use shellwire::codec::Codec;
use shellwire::component::{ComponentSpec, WORKER_CONFIG_FLAG};
use shellwire::{
    BoltRelay, ChannelConfig, Emit, Map, OutputCollector, OutputFields, ShellBolt, ShellComponent,
    ShellProcess, TopologyContext, Value,
};
use tracing_subscriber::EnvFilter;

const LINES: &[&str] = &[
    "the quick brown fox",
    "jumps over the lazy dog",
    "The dog sleeps",
];

/// Prints what the worker produces.
struct Printer {
    acked: usize,
}

impl OutputCollector for Printer {
    fn emit(&mut self, emit: &Emit) -> Vec<i64> {
        let fields: Vec<String> = emit
            .tuple
            .iter()
            .map(|v| match v {
                Value::Str(s) => s.clone(),
                Value::Int(n) => n.to_string(),
                other => format!("{:?}", other),
            })
            .collect();
        println!("emit [{}] on {}", fields.join(", "), emit.stream);
        Vec::new()
    }

    fn ack(&mut self, id: &str) {
        self.acked += 1;
        println!("ack {}", id);
    }

    fn fail(&mut self, id: &str) {
        println!("fail {}", id);
    }

    fn report_error(&mut self, msg: &str) {
        eprintln!("worker error: {}", msg);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let worker = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "target/debug/examples/word_count_worker".to_string());

    let config = ChannelConfig::new().serializer(Codec::Json);
    let component = ShellComponent::bolt(
        ComponentSpec::new("count", "word_count")
            .output_fields(OutputFields::flat(["word", "count"]))
            .tick_freq_secs(1.0),
    )?;

    let argv = [
        worker,
        WORKER_CONFIG_FLAG.to_string(),
        serde_json::to_string(&config)?,
    ];
    let (channel, mut process) = ShellProcess::spawn(&argv, &config)?;
    let mut bolt = ShellBolt::new(component, channel)?;

    let mut conf = Map::new();
    conf.insert("topology.name".to_string(), Value::from("word-count"));
    let pid = bolt
        .prepare(conf, TopologyContext::new(1).with_task(1, "count"))
        .await?;
    tracing::info!(pid, "Worker connected");

    let mut printer = Printer { acked: 0 };
    for (n, line) in LINES.iter().enumerate() {
        let relay = BoltRelay {
            id: format!("line-{}", n),
            comp: "lines".to_string(),
            stream: "default".to_string(),
            task: 0,
            tuple: vec![Value::from(*line)],
        };
        bolt.execute(&relay, &mut printer).await?;
    }

    bolt.tick("tick-1", &mut printer).await?;
    bolt.heartbeat(&mut printer).await?;

    // Closing the worker's stdin ends its loop.
    drop(bolt);
    let status = process.wait().await?;
    tracing::info!(%status, acked = printer.acked, "Worker exited");

    Ok(())
}
