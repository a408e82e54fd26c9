//! Error types for shellwire.

use thiserror::Error;

/// Main error type for all shell protocol operations.
#[derive(Debug, Error)]
pub enum ShellError {
    /// I/O error on the subprocess pipes.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error (encoding, config documents).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// MsgPack serialization error.
    #[error("MsgPack encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// Malformed bytes for the active codec. The stream is positioned at the
    /// next message, so the channel can keep reading.
    #[error("Protocol decode error: {0}")]
    ProtocolDecode(String),

    /// Message boundaries can no longer be found on the stream.
    #[error("Framing lost: {0}")]
    FramingLost(String),

    /// The worker closed its output before a complete message was read.
    #[error("Unexpected end of stream")]
    UnexpectedEndOfStream,

    /// The handshake did not complete.
    #[error("Handshake failed: {0}")]
    HandshakeFailed(String),

    /// The worker sent a command this host does not understand.
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// A field required by the message or declaration is absent.
    #[error("Missing required field '{field}' in {context}")]
    MissingRequiredField {
        /// What was being read (a command name, a component).
        context: String,
        /// The absent field.
        field: &'static str,
    },

    /// A field is present but holds the wrong kind of value.
    #[error("Field '{field}' must be {expected}, found {found}")]
    InvalidField {
        /// Offending field.
        field: &'static str,
        /// Expected value kind.
        expected: &'static str,
        /// Kind actually found.
        found: &'static str,
    },

    /// Invalid component or channel configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Channel used out of order (e.g. reading before the handshake).
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl ShellError {
    /// Whether the channel that produced this error is unusable.
    ///
    /// Non-fatal errors concern a single message; the caller may drop it and
    /// keep reading.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ShellError::Io(_)
                | ShellError::FramingLost(_)
                | ShellError::UnexpectedEndOfStream
                | ShellError::HandshakeFailed(_)
        )
    }

    pub(crate) fn missing(context: impl Into<String>, field: &'static str) -> Self {
        ShellError::MissingRequiredField {
            context: context.into(),
            field,
        }
    }
}

/// Result type alias using ShellError.
pub type Result<T> = std::result::Result<T, ShellError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(ShellError::UnexpectedEndOfStream.is_fatal());
        assert!(ShellError::FramingLost("x".into()).is_fatal());
        assert!(ShellError::HandshakeFailed("x".into()).is_fatal());

        assert!(!ShellError::ProtocolDecode("x".into()).is_fatal());
        assert!(!ShellError::UnknownCommand("metrics".into()).is_fatal());
        assert!(!ShellError::missing("log", "msg").is_fatal());
    }

    #[test]
    fn test_missing_field_message() {
        let err = ShellError::missing("spout 'lines'", "output_fields");
        assert_eq!(
            err.to_string(),
            "Missing required field 'output_fields' in spout 'lines'"
        );
    }
}
