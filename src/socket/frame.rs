//! socket.io v0.9 text frames: `<type>:<id>:<endpoint>:<data>`.
//!
//! Only the frame types the real-time service actually exchanges with a
//! project client carry payloads here; the rest are recognised so they can
//! be skipped.

use serde_json::{Value, json};

use crate::error::{OverleafError, Result};

/// One decoded socket frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// `0`: Server closed the session.
    Disconnect,
    /// `1`: Connection acknowledged.
    Connect,
    /// `2`: Keep-alive, must be echoed.
    Heartbeat,
    /// `3`: Plain message.
    Message(String),
    /// `4`: JSON message.
    Json(Value),
    /// `5`: Named event, optionally requesting an ack (`N+`).
    Event {
        ack: Option<u64>,
        endpoint: String,
        name: String,
        args: Vec<Value>,
    },
    /// `6`: Acknowledgement of event `ack`, with optional JSON arguments.
    Ack { ack: u64, payload: Option<Value> },
    /// `7`: Error; the service uses it to reject unauthorized sessions.
    Error { reason: String },
    /// `8`: No-op.
    Noop,
}

impl Frame {
    /// Build an event frame that requests an acknowledgement.
    pub fn event(ack: u64, name: impl Into<String>, args: Vec<Value>) -> Self {
        Frame::Event {
            ack: Some(ack),
            endpoint: String::new(),
            name: name.into(),
            args,
        }
    }

    /// Decode one text frame.
    pub fn parse(text: &str) -> Result<Self> {
        let mut parts = text.splitn(4, ':');
        let kind = parts.next().unwrap_or_default();
        let id = parts.next().unwrap_or_default();
        let endpoint = parts.next().unwrap_or_default();
        let data = parts.next().unwrap_or_default();

        let kind: u8 = kind
            .parse()
            .map_err(|_| OverleafError::Protocol(format!("Invalid frame type in {:?}", truncate(text))))?;

        match kind {
            0 => Ok(Frame::Disconnect),
            1 => Ok(Frame::Connect),
            2 => Ok(Frame::Heartbeat),
            3 => Ok(Frame::Message(data.to_string())),
            4 => Ok(Frame::Json(serde_json::from_str(data)?)),
            5 => {
                let ack = parse_ack_id(id)?;
                let body: Value = serde_json::from_str(data)?;
                let name = body
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| OverleafError::Protocol("Event frame without name".to_string()))?
                    .to_string();
                let args = match body.get("args") {
                    Some(Value::Array(args)) => args.clone(),
                    Some(other) => vec![other.clone()],
                    None => Vec::new(),
                };
                Ok(Frame::Event {
                    ack,
                    endpoint: endpoint.to_string(),
                    name,
                    args,
                })
            }
            6 => {
                // Ack data is "<id>" or "<id>+<json args>".
                let (ack, payload) = match data.split_once('+') {
                    Some((ack, rest)) if !rest.is_empty() => (ack, Some(serde_json::from_str(rest)?)),
                    Some((ack, _)) => (ack, None),
                    None => (data, None),
                };
                let ack = ack
                    .parse()
                    .map_err(|_| OverleafError::Protocol(format!("Invalid ack id {:?}", ack)))?;
                Ok(Frame::Ack { ack, payload })
            }
            7 => Ok(Frame::Error {
                reason: data.to_string(),
            }),
            8 => Ok(Frame::Noop),
            other => Err(OverleafError::Protocol(format!("Unknown frame type {}", other))),
        }
    }

    /// Encode the frame as sent on the wire.
    pub fn encode(&self) -> String {
        match self {
            Frame::Disconnect => "0::".to_string(),
            Frame::Connect => "1::".to_string(),
            Frame::Heartbeat => "2::".to_string(),
            Frame::Message(text) => format!("3:::{}", text),
            Frame::Json(value) => format!("4:::{}", value),
            Frame::Event {
                ack,
                endpoint,
                name,
                args,
            } => {
                let id = ack.map(|a| format!("{}+", a)).unwrap_or_default();
                let body = if args.is_empty() {
                    json!({ "name": name })
                } else {
                    json!({ "name": name, "args": args })
                };
                format!("5:{}:{}:{}", id, endpoint, body)
            }
            Frame::Ack { ack, payload } => match payload {
                Some(payload) => format!("6:::{}+{}", ack, payload),
                None => format!("6:::{}", ack),
            },
            Frame::Error { reason } => format!("7:::{}", reason),
            Frame::Noop => "8::".to_string(),
        }
    }
}

/// Parse the message-id field: empty, `N`, or `N+` (ack with data requested).
fn parse_ack_id(id: &str) -> Result<Option<u64>> {
    let digits = id.trim_end_matches('+');
    if digits.is_empty() {
        return Ok(None);
    }
    digits
        .parse()
        .map(Some)
        .map_err(|_| OverleafError::Protocol(format!("Invalid message id {:?}", id)))
}

fn truncate(text: &str) -> &str {
    match text.char_indices().nth(32) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
