//! Message types for the OKX v5 WebSocket protocol.
//!
//! This module contains the request frames the client sends and the closed
//! set of inbound message variants the router produces.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::auth::WsLoginArgs;

/// Keepalive request, sent as a plain text frame.
pub const PING: &str = "ping";

/// Keepalive reply, received as a plain text frame.
pub const PONG: &str = "pong";

// ============================================================================
// REQUEST TYPES (Client → Server)
// ============================================================================

/// Operation name of an outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Op {
    Login,
    Subscribe,
    Unsubscribe,
}

/// `{"op": ..., "args": [...]}` request wrapper
#[derive(Debug, Clone, Serialize)]
pub struct WsRequest<A> {
    pub op: Op,
    pub args: Vec<A>,
}

impl WsRequest<Subscription> {
    /// Create a subscribe request
    pub fn subscribe(args: Vec<Subscription>) -> Self {
        Self { op: Op::Subscribe, args }
    }

    /// Create an unsubscribe request
    pub fn unsubscribe(args: Vec<Subscription>) -> Self {
        Self {
            op: Op::Unsubscribe,
            args,
        }
    }
}

impl WsRequest<WsLoginArgs> {
    /// Create a login request
    pub fn login(args: WsLoginArgs) -> Self {
        Self {
            op: Op::Login,
            args: vec![args],
        }
    }
}

impl<A: Serialize> WsRequest<A> {
    /// Serialize to the text frame payload.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// ============================================================================
// SUBSCRIPTION
// ============================================================================

/// A channel name plus its instrument-scoped parameters.
///
/// Serializes to the flat `arg` object used on the wire, e.g.
/// `{"channel":"tickers","instId":"BTC-USDT"}`. Equality and hashing are
/// structural over the channel and every parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Subscription {
    pub channel: String,
    #[serde(flatten)]
    pub params: BTreeMap<String, String>,
}

impl Subscription {
    /// Subscription with no parameters.
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            params: BTreeMap::new(),
        }
    }

    /// Add a parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Add a parameter only when a value is given.
    pub fn with_optional_param(self, key: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(value) => self.with_param(key, value),
            None => self,
        }
    }

    /// Look up a parameter.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// The `instId` parameter, if any.
    pub fn inst_id(&self) -> Option<&str> {
        self.param("instId")
    }

    /// Build from an echoed `arg` object. Non-string values are skipped.
    pub fn from_arg(arg: &Value) -> Option<Self> {
        let object = arg.as_object()?;
        let channel = object.get("channel")?.as_str()?.to_string();
        let params = object
            .iter()
            .filter(|(key, _)| key.as_str() != "channel")
            .filter_map(|(key, value)| value.as_str().map(|v| (key.clone(), v.to_string())))
            .collect();
        Some(Self { channel, params })
    }
}

impl std::fmt::Display for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.channel)?;
        for (key, value) in &self.params {
            write!(f, " {}={}", key, value)?;
        }
        Ok(())
    }
}

// ============================================================================
// RESPONSE TYPES (Server → Client)
// ============================================================================

/// Raw inbound frame, before classification.
#[derive(Debug, Clone, Deserialize)]
pub struct RawWsMessage {
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub arg: Option<Value>,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub code: Option<Value>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default, rename = "connId")]
    pub conn_id: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
}

/// Kind of a non-data frame.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Subscribe acknowledgement
    Subscribe,
    /// Unsubscribe acknowledgement
    Unsubscribe,
    /// Server-side error, usually a rejected subscription
    Error,
    /// Login result
    Login,
    /// Service notice (e.g. upcoming disconnect for maintenance)
    Notice,
    /// Per-channel connection count report
    ChannelConnCount,
    /// Frame could not be decoded; `raw` holds the original text
    ParseError,
    /// Any other event name
    Other(String),
}

impl EventKind {
    pub fn from_event_name(name: &str) -> Self {
        match name {
            "subscribe" => Self::Subscribe,
            "unsubscribe" => Self::Unsubscribe,
            "error" => Self::Error,
            "login" => Self::Login,
            "notice" => Self::Notice,
            "channel-conn-count" => Self::ChannelConnCount,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Event frame: acks, errors, login results and parse failures.
#[derive(Debug, Clone, PartialEq)]
pub struct EventMessage {
    pub kind: EventKind,
    /// Echoed subscription argument, when present
    pub arg: Option<Subscription>,
    pub code: Option<String>,
    pub msg: Option<String>,
    pub conn_id: Option<String>,
    /// Original frame text
    pub raw: String,
}

impl EventMessage {
    /// Router-level decode failure.
    pub fn parse_error(raw: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            kind: EventKind::ParseError,
            arg: None,
            code: None,
            msg: Some(reason.into()),
            conn_id: None,
            raw: raw.into(),
        }
    }

    /// `true` when the server reported success (`code` absent or `"0"`).
    pub fn is_success(&self) -> bool {
        !matches!(self.kind, EventKind::Error | EventKind::ParseError)
            && self.code.as_deref().map_or(true, |code| code == "0")
    }
}

/// Data frame: channel argument plus opaque records.
#[derive(Debug, Clone, PartialEq)]
pub struct DataMessage {
    pub arg: Subscription,
    /// `snapshot` / `update` on incremental channels
    pub action: Option<String>,
    pub data: Vec<Value>,
}

/// What the stream yields to callers.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    Event(EventMessage),
    Data(DataMessage),
}

impl InboundMessage {
    /// Channel name of the argument, if the frame carried one.
    pub fn channel(&self) -> Option<&str> {
        match self {
            Self::Event(event) => event.arg.as_ref().map(|arg| arg.channel.as_str()),
            Self::Data(data) => Some(data.arg.channel.as_str()),
        }
    }

    /// `instId` of the argument, if any.
    pub fn inst_id(&self) -> Option<&str> {
        match self {
            Self::Event(event) => event.arg.as_ref().and_then(Subscription::inst_id),
            Self::Data(data) => data.arg.inst_id(),
        }
    }

    pub fn is_data(&self) -> bool {
        matches!(self, Self::Data(_))
    }

    pub fn as_data(&self) -> Option<&DataMessage> {
        match self {
            Self::Data(data) => Some(data),
            Self::Event(_) => None,
        }
    }

    pub fn as_event(&self) -> Option<&EventMessage> {
        match self {
            Self::Event(event) => Some(event),
            Self::Data(_) => None,
        }
    }
}
