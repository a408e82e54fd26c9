//! Handshake messages.
//!
//! The host opens every channel by sending the topology configuration, the
//! directory the worker should record its pid in, and the task's topology
//! context. The worker answers once with its pid.
//!
//! ```json
//! {"conf": {...}, "pidDir": "/tmp/pids", "context": {"taskid": 3, "task->component": {"3": "b1"}}}
//! {"pid": 4242}
//! ```

use std::collections::BTreeMap;

use crate::error::{Result, ShellError};
use crate::value::{Map, Value};

use super::fields;

/// Where a task sits in the topology.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopologyContext {
    /// Id of the task this channel serves.
    pub task_id: i64,
    /// Component name of every task id, keyed by the id in string form.
    pub task_to_component: BTreeMap<String, String>,
}

impl TopologyContext {
    pub fn new(task_id: i64) -> Self {
        Self {
            task_id,
            task_to_component: BTreeMap::new(),
        }
    }

    pub fn with_task(mut self, task_id: i64, component: impl Into<String>) -> Self {
        self.task_to_component
            .insert(task_id.to_string(), component.into());
        self
    }

    /// Component this task belongs to, if the mapping names it.
    pub fn component(&self) -> Option<&str> {
        self.task_to_component
            .get(&self.task_id.to_string())
            .map(String::as_str)
    }

    pub fn to_value(&self) -> Value {
        let tasks = self
            .task_to_component
            .iter()
            .map(|(task, component)| (task.clone(), Value::from(component.as_str())))
            .collect();

        let mut map = Map::new();
        map.insert("taskid".to_string(), Value::Int(self.task_id));
        map.insert("task->component".to_string(), Value::Map(tasks));
        Value::Map(map)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        let mut map = fields::into_map(value, "context")?;
        let task_id = fields::req_i64(&mut map, "taskid", "context")?;

        let mut task_to_component = BTreeMap::new();
        for (task, component) in fields::opt_map(&mut map, "task->component")?.unwrap_or_default() {
            match component {
                Value::Str(name) => {
                    task_to_component.insert(task, name);
                }
                other => {
                    return Err(ShellError::InvalidField {
                        field: "task->component",
                        expected: "a map of component names",
                        found: other.kind(),
                    })
                }
            }
        }

        Ok(Self {
            task_id,
            task_to_component,
        })
    }
}

/// First message on every channel, host to worker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HandshakeRequest {
    /// Topology configuration.
    pub conf: Map,
    /// Directory the worker touches its pid file in.
    pub pid_dir: String,
    pub context: TopologyContext,
}

impl HandshakeRequest {
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("conf".to_string(), Value::Map(self.conf.clone()));
        map.insert("pidDir".to_string(), Value::from(self.pid_dir.as_str()));
        map.insert("context".to_string(), self.context.to_value());
        Value::Map(map)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        let mut map = fields::into_map(value, "handshake")?;
        let conf = fields::opt_map(&mut map, "conf")?.unwrap_or_default();
        let pid_dir = fields::opt_string(&mut map, "pidDir")?.unwrap_or_default();
        let context = map
            .remove("context")
            .map(TopologyContext::from_value)
            .transpose()?
            .ok_or_else(|| ShellError::missing("handshake", "context"))?;

        Ok(Self {
            conf,
            pid_dir,
            context,
        })
    }
}

/// The worker's single reply to the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeResponse {
    pub pid: i64,
}

impl HandshakeResponse {
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("pid".to_string(), Value::Int(self.pid));
        Value::Map(map)
    }

    /// # Errors
    ///
    /// `HandshakeFailed` unless the reply is a map with an integer `pid`.
    pub fn from_value(value: Value) -> Result<Self> {
        let mut map = fields::into_map(value, "handshake reply")
            .map_err(|e| ShellError::HandshakeFailed(e.to_string()))?;

        match fields::req_i64(&mut map, "pid", "handshake reply") {
            Ok(pid) => Ok(Self { pid }),
            Err(e) => Err(ShellError::HandshakeFailed(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> HandshakeRequest {
        let mut conf = Map::new();
        conf.insert("topology.name".to_string(), Value::from("t"));
        HandshakeRequest {
            conf,
            pid_dir: "/tmp/pids".to_string(),
            context: TopologyContext::new(3).with_task(3, "b1").with_task(4, "b1"),
        }
    }

    #[test]
    fn test_request_wire_keys() {
        let value = request().to_value();
        assert_eq!(value.get("pidDir").and_then(Value::as_str), Some("/tmp/pids"));

        let context = value.get("context").unwrap();
        assert_eq!(context.get("taskid"), Some(&Value::Int(3)));
        assert_eq!(
            context
                .get("task->component")
                .and_then(|m| m.get("3"))
                .and_then(Value::as_str),
            Some("b1")
        );
    }

    #[test]
    fn test_request_roundtrip() {
        let request = request();
        assert_eq!(
            HandshakeRequest::from_value(request.to_value()).unwrap(),
            request
        );
        assert_eq!(request.context.component(), Some("b1"));
    }

    #[test]
    fn test_request_requires_context() {
        let mut map = Map::new();
        map.insert("conf".to_string(), Value::Map(Map::new()));
        let err = HandshakeRequest::from_value(Value::Map(map)).unwrap_err();
        assert!(matches!(
            err,
            ShellError::MissingRequiredField { field: "context", .. }
        ));
    }

    #[test]
    fn test_response_requires_integer_pid() {
        let ok = HandshakeResponse::from_value(HandshakeResponse { pid: 4242 }.to_value());
        assert_eq!(ok.unwrap().pid, 4242);

        let mut map = Map::new();
        map.insert("pid".to_string(), Value::from("4242"));
        assert!(matches!(
            HandshakeResponse::from_value(Value::Map(map)),
            Err(ShellError::HandshakeFailed(_))
        ));

        assert!(matches!(
            HandshakeResponse::from_value(Value::Map(Map::new())),
            Err(ShellError::HandshakeFailed(_))
        ));

        assert!(matches!(
            HandshakeResponse::from_value(Value::Int(4242)),
            Err(ShellError::HandshakeFailed(_))
        ));
    }
}
