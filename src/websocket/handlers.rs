//! Inbound frame routing.
//!
//! Decodes every text frame exactly once into a closed set of variants.
//! Keepalive replies are consumed here, subscribe acks update the registry's
//! confirmation bits, and everything else is handed back for delivery.

use serde_json::Value;

use crate::websocket::subscriptions::SubscriptionRegistry;
use crate::websocket::types::{
    DataMessage, EventKind, EventMessage, InboundMessage, RawWsMessage, Subscription, PONG,
};

/// Outcome of routing one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Routed {
    /// Keepalive reply; resets the pong deadline
    Pong,
    /// Consumed internally, nothing to deliver
    Consumed,
    /// Deliver to the caller
    Deliver(InboundMessage),
}

/// Classifies inbound frames.
#[derive(Debug, Clone)]
pub struct MessageRouter {
    registry: SubscriptionRegistry,
    forward_acks: bool,
}

impl MessageRouter {
    pub fn new(registry: SubscriptionRegistry, forward_acks: bool) -> Self {
        Self {
            registry,
            forward_acks,
        }
    }

    /// Route a text frame.
    pub fn route(&self, text: &str) -> Routed {
        if text == PONG {
            return Routed::Pong;
        }

        let message = match decode(text) {
            Ok(message) => message,
            Err(reason) => {
                tracing::warn!(reason = %reason, raw = %text, "Failed to parse WebSocket frame");
                return Routed::Deliver(InboundMessage::Event(EventMessage::parse_error(text, reason)));
            }
        };

        match message {
            InboundMessage::Event(event) => self.route_event(event),
            data @ InboundMessage::Data(_) => Routed::Deliver(data),
        }
    }

    fn route_event(&self, event: EventMessage) -> Routed {
        match event.kind {
            EventKind::Subscribe => {
                if let Some(arg) = &event.arg {
                    if !self.registry.confirm(arg) {
                        tracing::debug!(subscription = %arg, "Ack for untracked subscription");
                    }
                }
                self.ack(event)
            }
            EventKind::Unsubscribe => self.ack(event),
            EventKind::Error => {
                tracing::warn!(
                    code = event.code.as_deref().unwrap_or(""),
                    msg = event.msg.as_deref().unwrap_or(""),
                    "Server reported an error"
                );
                Routed::Deliver(InboundMessage::Event(event))
            }
            EventKind::Notice => {
                tracing::info!(msg = event.msg.as_deref().unwrap_or(""), "Server notice");
                Routed::Deliver(InboundMessage::Event(event))
            }
            _ => Routed::Deliver(InboundMessage::Event(event)),
        }
    }

    fn ack(&self, event: EventMessage) -> Routed {
        if self.forward_acks {
            Routed::Deliver(InboundMessage::Event(event))
        } else {
            Routed::Consumed
        }
    }
}

/// Decode a JSON frame into an event or data message.
pub fn decode(text: &str) -> Result<InboundMessage, String> {
    let raw: RawWsMessage = serde_json::from_str(text).map_err(|e| e.to_string())?;

    if let Some(event) = raw.event.as_deref() {
        return Ok(InboundMessage::Event(EventMessage {
            kind: EventKind::from_event_name(event),
            arg: raw.arg.as_ref().and_then(Subscription::from_arg),
            code: raw.code.as_ref().map(code_to_string),
            msg: raw.msg,
            conn_id: raw.conn_id,
            raw: text.to_string(),
        }));
    }

    match (raw.arg, raw.data) {
        (Some(arg), Some(data)) => {
            let arg = Subscription::from_arg(&arg)
                .ok_or_else(|| "data frame `arg` has no channel".to_string())?;
            let data = match data {
                Value::Array(records) => records,
                Value::Null => Vec::new(),
                record => vec![record],
            };
            Ok(InboundMessage::Data(DataMessage {
                arg,
                action: raw.action,
                data,
            }))
        }
        _ => Err("frame has neither `event` nor `arg`/`data`".to_string()),
    }
}

fn code_to_string(code: &Value) -> String {
    match code {
        Value::String(code) => code.clone(),
        other => other.to_string(),
    }
}
