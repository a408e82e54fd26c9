//! Output-field declarations.
//!
//! A component declares the schema of every stream it emits on, in one of two
//! shapes:
//!
//! ```yaml
//! output_fields: [word, count]          # the default stream
//! output_fields:                        # one schema per stream
//!   default: [word]
//!   errors: [line, reason]
//!   heartbeat: ~                        # a stream with no fields
//! ```
//!
//! Both normalize to [`OutputFields`], a map from stream to field names.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::ShellError;
use crate::protocol::DEFAULT_STREAM;

/// Receives one declaration per stream.
pub trait OutputFieldsDeclarer {
    fn declare_stream(&mut self, stream: &str, fields: &[String]);
}

/// A single declared stream, as collected by `Vec<StreamDeclaration>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDeclaration {
    pub stream: String,
    pub fields: Vec<String>,
}

impl OutputFieldsDeclarer for Vec<StreamDeclaration> {
    fn declare_stream(&mut self, stream: &str, fields: &[String]) {
        self.push(StreamDeclaration {
            stream: stream.to_string(),
            fields: fields.to_vec(),
        });
    }
}

/// Field schema of each output stream.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "OutputFieldsRepr", into = "BTreeMap<String, Vec<String>>")]
pub struct OutputFields {
    streams: BTreeMap<String, Vec<String>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OutputFieldsRepr {
    Flat(Vec<String>),
    PerStream(BTreeMap<String, Option<Vec<String>>>),
}

impl TryFrom<OutputFieldsRepr> for OutputFields {
    type Error = ShellError;

    fn try_from(repr: OutputFieldsRepr) -> Result<Self, Self::Error> {
        let streams = match repr {
            OutputFieldsRepr::Flat(fields) => {
                BTreeMap::from([(DEFAULT_STREAM.to_string(), fields)])
            }
            OutputFieldsRepr::PerStream(streams) => streams
                .into_iter()
                .map(|(stream, fields)| (stream, fields.unwrap_or_default()))
                .collect(),
        };

        for (stream, fields) in &streams {
            let mut seen = BTreeSet::new();
            if let Some(duplicate) = fields.iter().find(|f| !seen.insert(f.as_str())) {
                return Err(ShellError::InvalidConfig(format!(
                    "field '{}' declared twice on stream '{}'",
                    duplicate, stream
                )));
            }
        }

        Ok(Self { streams })
    }
}

impl From<OutputFields> for BTreeMap<String, Vec<String>> {
    fn from(fields: OutputFields) -> Self {
        fields.streams
    }
}

impl OutputFields {
    /// Schema for the default stream only.
    pub fn flat<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::default().with_stream(DEFAULT_STREAM, fields)
    }

    /// Add or replace the schema of `stream`.
    pub fn with_stream<I, S>(mut self, stream: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.streams
            .insert(stream.into(), fields.into_iter().map(Into::into).collect());
        self
    }

    /// Fields of `stream`, if declared.
    pub fn fields(&self, stream: &str) -> Option<&[String]> {
        self.streams.get(stream).map(Vec::as_slice)
    }

    /// Declared streams in name order.
    pub fn streams(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.streams
            .iter()
            .map(|(stream, fields)| (stream.as_str(), fields.as_slice()))
    }

    /// Whether no stream is declared at all.
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Push one declaration per stream.
    pub fn declare(&self, declarer: &mut impl OutputFieldsDeclarer) {
        for (stream, fields) in &self.streams {
            declarer.declare_stream(stream, fields);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn declared(fields: &OutputFields) -> Vec<StreamDeclaration> {
        let mut out = Vec::new();
        fields.declare(&mut out);
        out
    }

    #[test]
    fn test_flat_list_is_default_stream() {
        let fields: OutputFields = serde_json::from_str(r#"["word", "count"]"#).unwrap();
        assert_eq!(
            declared(&fields),
            vec![StreamDeclaration {
                stream: "default".to_string(),
                fields: vec!["word".to_string(), "count".to_string()],
            }]
        );
        assert_eq!(fields, OutputFields::flat(["word", "count"]));
    }

    #[test]
    fn test_per_stream_map() {
        let fields: OutputFields =
            serde_json::from_str(r#"{"default": ["word"], "errors": ["line", "reason"]}"#).unwrap();

        assert_eq!(fields.fields("default"), Some(&["word".to_string()][..]));
        assert_eq!(fields.fields("errors").map(<[String]>::len), Some(2));
        assert_eq!(declared(&fields).len(), 2);
    }

    #[test]
    fn test_null_stream_has_zero_fields() {
        let fields: OutputFields = serde_json::from_str(r#"{"default": null}"#).unwrap();
        assert_eq!(
            declared(&fields),
            vec![StreamDeclaration {
                stream: "default".to_string(),
                fields: vec![],
            }]
        );
    }

    #[test]
    fn test_duplicate_field_rejected() {
        let result: Result<OutputFields, _> = serde_json::from_str(r#"["a", "b", "a"]"#);
        let err = result.unwrap_err();
        assert!(err.to_string().contains("declared twice"));
    }

    #[test]
    fn test_serializes_as_map() {
        let fields = OutputFields::flat(["x"]).with_stream("other", Vec::<String>::new());
        assert_eq!(
            serde_json::to_string(&fields).unwrap(),
            r#"{"default":["x"],"other":[]}"#
        );
    }
}
