//! Component module - what the host knows about each worker.
//!
//! - [`ShellComponent`]: a validated declaration (output fields, tick
//!   frequency, launch command)
//! - [`ShellBolt`] / [`ShellSpout`]: drivers that run a component's channel
//!   and hand its commands to an [`OutputCollector`]

mod driver;
mod output_fields;
mod spec;

use std::time::Duration;

use crate::codec::Codec;
use crate::error::{Result, ShellError};
use crate::value::{Map, Value};

pub use driver::{OutputCollector, ShellBolt, ShellSpout};
pub use output_fields::{OutputFields, OutputFieldsDeclarer, StreamDeclaration};
pub use spec::{ComponentEntry, ComponentKind, ComponentSpec};

/// Configuration key carrying a component's tick frequency in seconds.
pub const TICK_FREQ_CONFIG_KEY: &str = "topology.tick.tuple.freq.secs";

/// Worker flag whose JSON argument carries the channel settings.
pub const WORKER_CONFIG_FLAG: &str = "--pyleus-config";

/// A component ready to be placed in a topology.
#[derive(Debug, Clone, PartialEq)]
pub struct ShellComponent {
    kind: ComponentKind,
    name: String,
    module: String,
    options: Map,
    output_fields: OutputFields,
    tick_frequency: Option<f64>,
    parallelism_hint: Option<u32>,
    tasks: Option<u32>,
}

impl ShellComponent {
    /// Validate a declaration.
    ///
    /// Bolts without output fields declare an empty default stream.
    ///
    /// # Errors
    ///
    /// - `MissingRequiredField` for a spout without output fields.
    /// - `InvalidConfig` for a tick frequency that is not a positive number.
    pub fn new(kind: ComponentKind, spec: ComponentSpec) -> Result<Self> {
        let output_fields = match (kind, spec.output_fields) {
            (_, Some(fields)) if !fields.is_empty() => fields,
            (ComponentKind::Bolt, _) => OutputFields::flat(Vec::<String>::new()),
            (ComponentKind::Spout, _) => {
                return Err(ShellError::missing(
                    format!("spout '{}'", spec.name),
                    "output_fields",
                ))
            }
        };

        let mut component = Self {
            kind,
            name: spec.name,
            module: spec.module,
            options: spec.options,
            output_fields,
            tick_frequency: None,
            parallelism_hint: spec.parallelism_hint,
            tasks: spec.tasks,
        };
        component.set_tick_frequency(spec.tick_freq_secs)?;
        Ok(component)
    }

    pub fn bolt(spec: ComponentSpec) -> Result<Self> {
        Self::new(ComponentKind::Bolt, spec)
    }

    pub fn spout(spec: ComponentSpec) -> Result<Self> {
        Self::new(ComponentKind::Spout, spec)
    }

    pub fn from_entry(entry: ComponentEntry) -> Result<Self> {
        let (kind, spec) = entry.into_parts();
        Self::new(kind, spec)
    }

    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn options(&self) -> &Map {
        &self.options
    }

    pub fn output_fields(&self) -> &OutputFields {
        &self.output_fields
    }

    pub fn parallelism_hint(&self) -> Option<u32> {
        self.parallelism_hint
    }

    pub fn tasks(&self) -> Option<u32> {
        self.tasks
    }

    /// Push this component's stream declarations.
    pub fn declare_output_fields(&self, declarer: &mut impl OutputFieldsDeclarer) {
        self.output_fields.declare(declarer);
    }

    /// Set or clear the tick frequency, in seconds.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` unless the frequency is greater than zero and fits in
    /// a [`Duration`].
    pub fn set_tick_frequency(&mut self, secs: Option<f64>) -> Result<()> {
        if let Some(secs) = secs {
            if secs <= 0.0 || Duration::try_from_secs_f64(secs).is_err() {
                return Err(ShellError::InvalidConfig(format!(
                    "tick frequency of '{}' must be a positive number of seconds, got {}",
                    self.name, secs
                )));
            }
        }
        self.tick_frequency = secs;
        Ok(())
    }

    pub fn tick_frequency(&self) -> Option<f64> {
        self.tick_frequency
    }

    /// Period at which the host should deliver tick tuples.
    pub fn tick_interval(&self) -> Option<Duration> {
        self.tick_frequency
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }

    /// Per-component configuration, `None` when there is nothing to set.
    pub fn component_configuration(&self) -> Option<Map> {
        self.tick_frequency.map(|secs| {
            let mut conf = Map::new();
            conf.insert(TICK_FREQ_CONFIG_KEY.to_string(), Value::Float(secs));
            conf
        })
    }

    /// Arguments that start this component's worker with `interpreter`.
    ///
    /// ```text
    /// <interpreter> -m <module> [--options <json>] --pyleus-config {"serializer":"msgpack"}
    /// ```
    pub fn launch_command(&self, interpreter: &str, serializer: Codec) -> Result<Vec<String>> {
        let mut argv = vec![
            interpreter.to_string(),
            "-m".to_string(),
            self.module.clone(),
        ];

        if !self.options.is_empty() {
            argv.push("--options".to_string());
            argv.push(serde_json::to_string(&self.options)?);
        }

        let mut config = Map::new();
        config.insert("serializer".to_string(), Value::from(serializer.name()));
        argv.push(WORKER_CONFIG_FLAG.to_string());
        argv.push(serde_json::to_string(&config)?);

        Ok(argv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spout_without_output_fields() {
        let err = ShellComponent::spout(ComponentSpec::new("lines", "wc.lines")).unwrap_err();
        assert!(matches!(
            err,
            ShellError::MissingRequiredField {
                field: "output_fields",
                ..
            }
        ));
    }

    #[test]
    fn test_bolt_without_output_fields_declares_empty_default() {
        let bolt = ShellComponent::bolt(ComponentSpec::new("log", "wc.log")).unwrap();
        let mut declared = Vec::new();
        bolt.declare_output_fields(&mut declared);

        assert_eq!(
            declared,
            vec![StreamDeclaration {
                stream: "default".to_string(),
                fields: vec![],
            }]
        );
    }

    #[test]
    fn test_spout_with_null_default_stream() {
        let fields: OutputFields = serde_json::from_str(r#"{"default": null}"#).unwrap();
        let spout =
            ShellComponent::spout(ComponentSpec::new("s", "m").output_fields(fields)).unwrap();
        assert_eq!(spout.output_fields().fields("default"), Some(&[][..]));
    }

    #[test]
    fn test_tick_frequency() {
        let mut bolt = ShellComponent::bolt(ComponentSpec::new("b", "m")).unwrap();
        assert_eq!(bolt.component_configuration(), None);
        assert_eq!(bolt.tick_interval(), None);

        bolt.set_tick_frequency(Some(0.25)).unwrap();
        assert_eq!(bolt.tick_interval(), Some(Duration::from_millis(250)));
        assert_eq!(
            bolt.component_configuration()
                .and_then(|c| c.get(TICK_FREQ_CONFIG_KEY).cloned()),
            Some(Value::Float(0.25))
        );

        bolt.set_tick_frequency(None).unwrap();
        assert_eq!(bolt.tick_frequency(), None);
    }

    #[test]
    fn test_invalid_tick_frequency() {
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY, 1e300, 1.9e19] {
            let spec = ComponentSpec::new("b", "m").tick_freq_secs(bad);
            assert!(
                matches!(ShellComponent::bolt(spec), Err(ShellError::InvalidConfig(_))),
                "{} accepted",
                bad
            );
        }
    }

    #[test]
    fn test_launch_command() {
        let mut spec = ComponentSpec::new("count", "wc.count");
        spec.options.insert("limit".to_string(), Value::Int(3));
        let bolt = ShellComponent::bolt(spec).unwrap();

        let argv = bolt.launch_command("python3", Codec::Json).unwrap();
        assert_eq!(
            argv,
            vec![
                "python3",
                "-m",
                "wc.count",
                "--options",
                r#"{"limit":3}"#,
                "--pyleus-config",
                r#"{"serializer":"json"}"#,
            ]
        );
    }
}
