//! Engine.IO v4 / Socket.IO v5 text framing.
//!
//! Only what a receive-only client on the default namespace needs: the
//! Engine.IO open handshake and ping/pong, the namespace connect exchange,
//! and event packets such as `42["progress_update",{...}]`.

use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Join the default namespace
pub const CONNECT: &str = "40";

/// Answer to a server ping
pub const PONG: &str = "3";

/// Engine.IO `open` payload
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default = "default_ping_interval")]
    pub ping_interval: u64,
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout: u64,
}

fn default_ping_interval() -> u64 {
    25_000
}

fn default_ping_timeout() -> u64 {
    20_000
}

impl Handshake {
    /// Longest silence tolerated before the connection counts as dead
    pub fn liveness(&self) -> Duration {
        Duration::from_millis(self.ping_interval + self.ping_timeout)
    }
}

impl Default for Handshake {
    fn default() -> Self {
        Self {
            sid: String::new(),
            ping_interval: default_ping_interval(),
            ping_timeout: default_ping_timeout(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    Open(Handshake),
    Close,
    Ping,
    Pong,
    Noop,
    /// The namespace accepted us
    Connected,
    /// The server left the namespace
    Disconnected,
    ConnectError(String),
    Event { name: String, data: Value },
    /// Acks, binary events and packets for other namespaces
    Other,
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("empty frame")]
    Empty,

    #[error("unknown packet type '{0}'")]
    UnknownType(char),

    #[error("event packet without a name")]
    Unnamed,

    #[error("malformed payload: {0}")]
    Payload(#[from] serde_json::Error),
}

fn split(text: &str) -> Result<(char, &str), FrameError> {
    let mut chars = text.chars();
    let kind = chars.next().ok_or(FrameError::Empty)?;
    Ok((kind, chars.as_str()))
}

/// Decode one WebSocket text frame
pub fn decode(text: &str) -> Result<Packet, FrameError> {
    let (kind, rest) = split(text)?;
    match kind {
        '0' => Ok(Packet::Open(serde_json::from_str(rest)?)),
        '1' => Ok(Packet::Close),
        '2' => Ok(Packet::Ping),
        '3' => Ok(Packet::Pong),
        '4' => decode_message(rest),
        '5' | '6' => Ok(Packet::Noop),
        other => Err(FrameError::UnknownType(other)),
    }
}

fn decode_message(text: &str) -> Result<Packet, FrameError> {
    let (kind, rest) = split(text)?;
    if rest.starts_with('/') {
        return Ok(Packet::Other);
    }

    match kind {
        '0' => Ok(Packet::Connected),
        '1' => Ok(Packet::Disconnected),
        '2' => {
            // An ack id may sit between the type and the arguments
            let payload = rest.trim_start_matches(|c: char| c.is_ascii_digit());
            let mut args = serde_json::from_str::<Vec<Value>>(payload)?.into_iter();
            let name = match args.next() {
                Some(Value::String(name)) => name,
                _ => return Err(FrameError::Unnamed),
            };
            Ok(Packet::Event {
                name,
                data: args.next().unwrap_or(Value::Null),
            })
        }
        '4' => {
            let message = serde_json::from_str::<Value>(rest)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| rest.to_string());
            Ok(Packet::ConnectError(message))
        }
        '3' | '5' | '6' => Ok(Packet::Other),
        other => Err(FrameError::UnknownType(other)),
    }
}
