//! Component declarations from the topology document.
//!
//! Each entry of the topology list is tagged with its kind:
//!
//! ```json
//! [
//!   {"spout": {"name": "lines", "module": "word_count.line_spout", "output_fields": ["line"]}},
//!   {"bolt": {"name": "count", "module": "word_count.count_words", "tick_freq_secs": 0.5}}
//! ]
//! ```
//!
//! Everything except `output_fields` and `tick_freq_secs` is passed through
//! without interpretation.

use serde::{Deserialize, Serialize};

use super::OutputFields;
use crate::value::Map;

/// Whether a component consumes tuples or produces them from outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    Bolt,
    Spout,
}

impl ComponentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ComponentKind::Bolt => "bolt",
            ComponentKind::Spout => "spout",
        }
    }
}

/// Declaration of one component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSpec {
    pub name: String,
    /// Entry point the worker process runs.
    pub module: String,
    /// Launch options handed to the worker.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub options: Map,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_fields: Option<OutputFields>,
    /// Seconds between tick tuples; absent disables ticking.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tick_freq_secs: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallelism_hint: Option<u32>,
    /// Number of tasks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks: Option<u32>,
}

impl ComponentSpec {
    pub fn new(name: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            module: module.into(),
            options: Map::new(),
            output_fields: None,
            tick_freq_secs: None,
            parallelism_hint: None,
            tasks: None,
        }
    }

    pub fn output_fields(mut self, fields: OutputFields) -> Self {
        self.output_fields = Some(fields);
        self
    }

    pub fn tick_freq_secs(mut self, secs: f64) -> Self {
        self.tick_freq_secs = Some(secs);
        self
    }
}

/// One entry of the topology's component list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentEntry {
    Bolt(ComponentSpec),
    Spout(ComponentSpec),
}

impl ComponentEntry {
    pub fn kind(&self) -> ComponentKind {
        match self {
            ComponentEntry::Bolt(_) => ComponentKind::Bolt,
            ComponentEntry::Spout(_) => ComponentKind::Spout,
        }
    }

    pub fn spec(&self) -> &ComponentSpec {
        match self {
            ComponentEntry::Bolt(spec) | ComponentEntry::Spout(spec) => spec,
        }
    }

    pub fn into_parts(self) -> (ComponentKind, ComponentSpec) {
        match self {
            ComponentEntry::Bolt(spec) => (ComponentKind::Bolt, spec),
            ComponentEntry::Spout(spec) => (ComponentKind::Spout, spec),
        }
    }
}
