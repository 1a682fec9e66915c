use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::RelayError;

/// Name under which the relay itself takes part in routing.
pub const SERVER_NAME: &str = "server";

/// Placeholder name a connection carries until it identifies.
pub const UNKNOWN_NAME: &str = "unknown";

/// The two kinds of peer traffic: control commands and opaque data.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Cmd,
    Data,
}

/// Addressing field of a message: a single peer name or a list of names.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(untagged)]
pub enum TargetSpec {
    One(String),
    Many(Vec<String>),
}

impl TargetSpec {
    pub fn names(&self) -> &[String] {
        match self {
            TargetSpec::One(name) => std::slice::from_ref(name),
            TargetSpec::Many(names) => names,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names().iter().any(|n| n == name)
    }
}

/// One wire frame.
///
/// `sender` is optional on decode: a peer that has not identified yet may
/// omit it, and the relay stamps the sending connection's current name onto
/// every inbound frame before routing anyway. Fields the relay does not
/// recognize land in `extra` and are forwarded untouched.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
pub struct Message {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<TargetSpec>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<MessageKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cmd: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub kwargs: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Message {
    /// Parse one inbound frame. Peer traffic must carry `type` and `target`;
    /// `sender` may be absent.
    pub fn decode(raw: &str) -> std::result::Result<Message, RelayError> {
        let message: Message = serde_json::from_str(raw)?;
        if message.kind.is_none() {
            return Err(RelayError::MalformedMessage(String::from(
                "missing field `type`",
            )));
        }
        if message.target.is_none() {
            return Err(RelayError::MalformedMessage(String::from(
                "missing field `target`",
            )));
        }
        Ok(message)
    }

    /// Serialize for the wire. Round-trips every field set `decode` accepts,
    /// unknown fields included.
    pub fn encode(&self) -> std::result::Result<String, RelayError> {
        Ok(serde_json::to_string(self)?)
    }

    /// The identify challenge the relay sends to every fresh connection.
    pub fn identify_challenge() -> Message {
        Message {
            sender: Some(String::from(SERVER_NAME)),
            target: None,
            kind: None,
            cmd: Some(String::from("identify")),
            kwargs: Map::new(),
            data: None,
            extra: Map::new(),
        }
    }

    /// The time sync frame that follows the identify challenge.
    pub fn set_time(time: f64) -> Message {
        let mut extra = Map::new();
        extra.insert(String::from("time"), json!(time));
        Message {
            sender: Some(String::from(SERVER_NAME)),
            target: None,
            kind: None,
            cmd: Some(String::from("set_time")),
            kwargs: Map::new(),
            data: None,
            extra,
        }
    }

    pub fn command_name(&self) -> Option<&str> {
        self.cmd.as_deref()
    }

    /// The `name` argument of an identify command, if present.
    pub fn identify_name(&self) -> Option<&str> {
        self.kwargs.get("name").and_then(Value::as_str)
    }

    pub fn is_command(&self, name: &str) -> bool {
        self.kind == Some(MessageKind::Cmd) && self.command_name() == Some(name)
    }
}
