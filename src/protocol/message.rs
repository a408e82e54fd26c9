//! Runtime message vocabulary.
//!
//! Worker to host: [`ShellMessage`], tagged by its `command` field.
//! Host to worker: [`BoltRelay`] (an input tuple for a bolt),
//! [`SpoutCommand`] and task-id replies. A worker tells these apart by shape:
//! a map with `command` is a spout command, any other map is a tuple, and an
//! array is a task-id reply (see [`HostMessage`]).
//!
//! Every type converts to and from [`Value`]; the codecs only ever see
//! values.

use crate::error::{Result, ShellError};
use crate::value::{Map, Value};

use super::fields;

/// Stream a tuple belongs to when the worker names none.
pub const DEFAULT_STREAM: &str = "default";

/// Component id of host-generated tuples.
pub const SYSTEM_COMPONENT: &str = "__system";

/// Stream of tick tuples.
pub const TICK_STREAM: &str = "__tick";

/// Stream of heartbeat tuples.
pub const HEARTBEAT_STREAM: &str = "__heartbeat";

/// Severity of a worker `log` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Map a wire level code. Unknown codes are treated as info.
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => LogLevel::Trace,
            1 => LogLevel::Debug,
            2 => LogLevel::Info,
            3 => LogLevel::Warn,
            4 => LogLevel::Error,
            _ => LogLevel::Info,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            LogLevel::Trace => 0,
            LogLevel::Debug => 1,
            LogLevel::Info => 2,
            LogLevel::Warn => 3,
            LogLevel::Error => 4,
        }
    }
}

/// An `emit` command: the worker produced a tuple.
#[derive(Debug, Clone, PartialEq)]
pub struct Emit {
    /// Tuple id for reliability tracking; `None` means fire-and-forget.
    pub id: Option<String>,
    /// Output stream.
    pub stream: String,
    /// Direct task, 0 when not a direct emit.
    pub task: i64,
    /// Whether the worker waits for the receiving task ids.
    pub need_task_ids: bool,
    /// Tuple values.
    pub tuple: Vec<Value>,
    /// Ids of the input tuples this one is anchored to.
    pub anchors: Vec<String>,
}

impl Emit {
    /// Emit on the default stream with every optional field at its default.
    pub fn new(tuple: Vec<Value>) -> Self {
        Self {
            id: None,
            stream: DEFAULT_STREAM.to_string(),
            task: 0,
            need_task_ids: true,
            tuple,
            anchors: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn on_stream(mut self, stream: impl Into<String>) -> Self {
        self.stream = stream.into();
        self
    }

    pub fn anchored_to(mut self, anchors: Vec<String>) -> Self {
        self.anchors = anchors;
        self
    }

    pub fn direct_to(mut self, task: i64) -> Self {
        self.task = task;
        self
    }

    pub fn without_task_ids(mut self) -> Self {
        self.need_task_ids = false;
        self
    }
}

/// A command sent by a worker to the host.
#[derive(Debug, Clone, PartialEq)]
pub enum ShellMessage {
    Emit(Emit),
    Ack { id: String },
    Fail { id: String },
    Log { msg: String, level: LogLevel },
    /// The worker's component logic failed; `msg` is its report.
    Error { msg: String },
    Sync,
    Next,
}

impl ShellMessage {
    /// Wire name of this command.
    pub fn command(&self) -> &'static str {
        match self {
            ShellMessage::Emit(_) => "emit",
            ShellMessage::Ack { .. } => "ack",
            ShellMessage::Fail { .. } => "fail",
            ShellMessage::Log { .. } => "log",
            ShellMessage::Error { .. } => "error",
            ShellMessage::Sync => "sync",
            ShellMessage::Next => "next",
        }
    }

    /// Classify a decoded message by its `command` field.
    ///
    /// # Errors
    ///
    /// - `ProtocolDecode` if the message is not a map.
    /// - `MissingRequiredField` if `command` or a field the command needs is
    ///   absent.
    /// - `InvalidField` if a field has the wrong kind.
    /// - `UnknownCommand` for any other command.
    pub fn from_value(value: Value) -> Result<Self> {
        let mut map = fields::into_map(value, "shell message")?;
        let command = fields::req_string(&mut map, "command", "shell message")?;

        let message = match command.as_str() {
            "emit" => ShellMessage::Emit(Emit {
                id: fields::opt_id(&mut map, "id")?,
                stream: fields::opt_string(&mut map, "stream")?
                    .unwrap_or_else(|| DEFAULT_STREAM.to_string()),
                task: fields::opt_i64(&mut map, "task")?.unwrap_or(0),
                need_task_ids: fields::opt_bool(&mut map, "need_task_ids")?.unwrap_or(true),
                tuple: fields::req_array(&mut map, "tuple", "emit")?,
                anchors: fields::opt_id_array(&mut map, "anchors")?.unwrap_or_default(),
            }),
            "ack" => ShellMessage::Ack {
                id: fields::req_id(&mut map, "id", "ack")?,
            },
            "fail" => ShellMessage::Fail {
                id: fields::req_id(&mut map, "id", "fail")?,
            },
            "log" => ShellMessage::Log {
                msg: fields::req_string(&mut map, "msg", "log")?,
                level: fields::opt_i64(&mut map, "level")?
                    .map(LogLevel::from_code)
                    .unwrap_or_default(),
            },
            "error" => ShellMessage::Error {
                msg: fields::req_string(&mut map, "msg", "error")?,
            },
            "sync" => ShellMessage::Sync,
            "next" => ShellMessage::Next,
            _ => return Err(ShellError::UnknownCommand(command)),
        };

        Ok(message)
    }

    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("command".to_string(), Value::from(self.command()));

        match self {
            ShellMessage::Emit(emit) => {
                if let Some(id) = &emit.id {
                    map.insert("id".to_string(), Value::from(id.as_str()));
                }
                map.insert("stream".to_string(), Value::from(emit.stream.as_str()));
                map.insert("task".to_string(), Value::Int(emit.task));
                map.insert("need_task_ids".to_string(), Value::Bool(emit.need_task_ids));
                map.insert("tuple".to_string(), Value::Array(emit.tuple.clone()));
                map.insert(
                    "anchors".to_string(),
                    Value::Array(emit.anchors.iter().map(|a| Value::from(a.as_str())).collect()),
                );
            }
            ShellMessage::Ack { id } | ShellMessage::Fail { id } => {
                map.insert("id".to_string(), Value::from(id.as_str()));
            }
            ShellMessage::Log { msg, level } => {
                map.insert("msg".to_string(), Value::from(msg.as_str()));
                map.insert("level".to_string(), Value::Int(level.code()));
            }
            ShellMessage::Error { msg } => {
                map.insert("msg".to_string(), Value::from(msg.as_str()));
            }
            ShellMessage::Sync | ShellMessage::Next => {}
        }

        Value::Map(map)
    }
}

/// An input tuple relayed to a bolt worker.
#[derive(Debug, Clone, PartialEq)]
pub struct BoltRelay {
    pub id: String,
    /// Component that produced the tuple.
    pub comp: String,
    pub stream: String,
    /// Task that produced the tuple.
    pub task: i64,
    pub tuple: Vec<Value>,
}

impl BoltRelay {
    /// Synthetic tick tuple, scheduled by the host at the tick frequency.
    pub fn tick(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            comp: SYSTEM_COMPONENT.to_string(),
            stream: TICK_STREAM.to_string(),
            task: -1,
            tuple: Vec::new(),
        }
    }

    /// Heartbeat tuple; the worker must answer with `sync`.
    pub fn heartbeat() -> Self {
        Self {
            id: "-1".to_string(),
            comp: SYSTEM_COMPONENT.to_string(),
            stream: HEARTBEAT_STREAM.to_string(),
            task: -1,
            tuple: Vec::new(),
        }
    }

    pub fn is_tick(&self) -> bool {
        self.comp == SYSTEM_COMPONENT && self.stream == TICK_STREAM
    }

    pub fn is_heartbeat(&self) -> bool {
        self.task == -1 && self.stream == HEARTBEAT_STREAM
    }

    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("id".to_string(), Value::from(self.id.as_str()));
        map.insert("comp".to_string(), Value::from(self.comp.as_str()));
        map.insert("stream".to_string(), Value::from(self.stream.as_str()));
        map.insert("task".to_string(), Value::Int(self.task));
        map.insert("tuple".to_string(), Value::Array(self.tuple.clone()));
        Value::Map(map)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        let map = fields::into_map(value, "tuple")?;
        Self::from_map(map)
    }

    fn from_map(mut map: Map) -> Result<Self> {
        Ok(Self {
            id: fields::req_id(&mut map, "id", "tuple")?,
            comp: fields::req_string(&mut map, "comp", "tuple")?,
            stream: fields::req_string(&mut map, "stream", "tuple")?,
            task: fields::req_i64(&mut map, "task", "tuple")?,
            tuple: fields::req_array(&mut map, "tuple", "tuple")?,
        })
    }
}

/// A command sent by the host to a spout worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpoutCommand {
    /// Emit the next tuple, if any.
    Next,
    /// A tuple emitted with this id was fully processed.
    Ack(String),
    /// A tuple emitted with this id failed.
    Fail(String),
    Activate,
    Deactivate,
}

impl SpoutCommand {
    pub fn command(&self) -> &'static str {
        match self {
            SpoutCommand::Next => "next",
            SpoutCommand::Ack(_) => "ack",
            SpoutCommand::Fail(_) => "fail",
            SpoutCommand::Activate => "activate",
            SpoutCommand::Deactivate => "deactivate",
        }
    }

    /// Commands without an id carry an empty one on the wire.
    pub fn to_value(&self) -> Value {
        let id = match self {
            SpoutCommand::Ack(id) | SpoutCommand::Fail(id) => id.as_str(),
            _ => "",
        };

        let mut map = Map::new();
        map.insert("command".to_string(), Value::from(self.command()));
        map.insert("id".to_string(), Value::from(id));
        Value::Map(map)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        let map = fields::into_map(value, "spout command")?;
        Self::from_map(map)
    }

    fn from_map(mut map: Map) -> Result<Self> {
        let command = fields::req_string(&mut map, "command", "spout command")?;
        match command.as_str() {
            "next" => Ok(SpoutCommand::Next),
            "ack" => Ok(SpoutCommand::Ack(fields::req_id(&mut map, "id", "ack")?)),
            "fail" => Ok(SpoutCommand::Fail(fields::req_id(&mut map, "id", "fail")?)),
            "activate" => Ok(SpoutCommand::Activate),
            "deactivate" => Ok(SpoutCommand::Deactivate),
            _ => Err(ShellError::UnknownCommand(command)),
        }
    }
}

/// Encode the ids of the tasks that received an emitted tuple.
pub fn task_ids_to_value(ids: &[i64]) -> Value {
    Value::Array(ids.iter().map(|&id| Value::Int(id)).collect())
}

/// Decode a task-id reply.
pub fn task_ids_from_value(value: Value) -> Result<Vec<i64>> {
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::Int(n) => Ok(n),
                other => Err(ShellError::InvalidField {
                    field: "task ids",
                    expected: "integers",
                    found: other.kind(),
                }),
            })
            .collect(),
        other => Err(ShellError::ProtocolDecode(format!(
            "task ids must be an array, found {}",
            other.kind()
        ))),
    }
}

/// Anything the host sends to a worker after the handshake.
#[derive(Debug, Clone, PartialEq)]
pub enum HostMessage {
    Tuple(BoltRelay),
    Spout(SpoutCommand),
    TaskIds(Vec<i64>),
}

impl HostMessage {
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Array(_) => task_ids_from_value(value).map(HostMessage::TaskIds),
            Value::Map(map) if map.contains_key("command") => {
                SpoutCommand::from_map(map).map(HostMessage::Spout)
            }
            Value::Map(map) => BoltRelay::from_map(map).map(HostMessage::Tuple),
            other => Err(ShellError::ProtocolDecode(format!(
                "host message must be a map or array, found {}",
                other.kind()
            ))),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            HostMessage::Tuple(relay) => relay.to_value(),
            HostMessage::Spout(command) => command.to_value(),
            HostMessage::TaskIds(ids) => task_ids_to_value(ids),
        }
    }
}
