use crate::core::errors::ExchangeError;
use crate::core::kernel::WsCodec;
use crate::core::types::Subscription;
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::Message;

/// Engine.IO v4 / Socket.IO v5 packets seen on the futures rate socket
#[derive(Debug, Clone, PartialEq)]
pub enum SocketIoPacket {
    /// Engine.IO handshake. Intervals are in milliseconds.
    Open {
        sid: String,
        ping_interval: u64,
        ping_timeout: u64,
    },
    Ping,
    Pong,
    Close,
    Noop,
    /// Namespace connect acknowledged
    Connected { namespace: String },
    /// Server dropped the namespace
    Disconnected { namespace: String },
    ConnectError { namespace: String, message: Value },
    Event {
        namespace: String,
        name: String,
        payload: Value,
    },
}

/// Socket.IO framing over a plain WebSocket, bound to one namespace
#[derive(Debug, Clone)]
pub struct SocketIoCodec {
    namespace: String,
}

impl SocketIoCodec {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// `/ns,` prefix, empty for the root namespace
    fn namespace_prefix(&self) -> String {
        if self.namespace == "/" || self.namespace.is_empty() {
            String::new()
        } else {
            format!("{},", self.namespace)
        }
    }

    /// Socket.IO CONNECT for the bound namespace
    pub fn encode_namespace_connect(&self) -> Message {
        Message::Text(format!("40{}", self.namespace_prefix()))
    }

    /// Engine.IO pong, the answer to a server ping
    pub fn encode_pong(&self) -> Message {
        Message::Text("3".to_string())
    }

    /// Socket.IO EVENT emit: `42/ns,["name",payload]`
    pub fn encode_event(&self, name: &str, payload: &Value) -> Result<Message, ExchangeError> {
        let args = serde_json::to_string(&json!([name, payload])).map_err(|e| {
            ExchangeError::SerializationError(format!("Failed to encode event: {}", e))
        })?;
        Ok(Message::Text(format!("42{}{}", self.namespace_prefix(), args)))
    }

    /// Parse one text frame
    pub fn decode_text(&self, text: &str) -> Result<Option<SocketIoPacket>, ExchangeError> {
        let mut chars = text.chars();
        let engine_type = chars
            .next()
            .ok_or_else(|| ExchangeError::ProtocolError("Empty frame".to_string()))?;
        let rest = chars.as_str();

        match engine_type {
            '0' => Self::decode_open(rest).map(Some),
            '1' => Ok(Some(SocketIoPacket::Close)),
            '2' => Ok(Some(SocketIoPacket::Ping)),
            '3' => Ok(Some(SocketIoPacket::Pong)),
            '4' => self.decode_socket_packet(rest),
            // upgrade
            '5' => Ok(None),
            '6' => Ok(Some(SocketIoPacket::Noop)),
            other => Err(ExchangeError::ProtocolError(format!(
                "Unknown Engine.IO packet type '{}'",
                other
            ))),
        }
    }

    fn decode_open(body: &str) -> Result<SocketIoPacket, ExchangeError> {
        let value: Value = serde_json::from_str(body)
            .map_err(|e| ExchangeError::ProtocolError(format!("Invalid open packet: {}", e)))?;

        Ok(SocketIoPacket::Open {
            sid: value
                .get("sid")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            ping_interval: value
                .get("pingInterval")
                .and_then(Value::as_u64)
                .unwrap_or(25_000),
            ping_timeout: value
                .get("pingTimeout")
                .and_then(Value::as_u64)
                .unwrap_or(20_000),
        })
    }

    fn decode_socket_packet(&self, body: &str) -> Result<Option<SocketIoPacket>, ExchangeError> {
        let mut chars = body.chars();
        let packet_type = chars.next().ok_or_else(|| {
            ExchangeError::ProtocolError("Missing Socket.IO packet type".to_string())
        })?;
        let mut rest = chars.as_str();

        let namespace = if rest.starts_with('/') {
            match rest.find(',') {
                Some(idx) => {
                    let ns = &rest[..idx];
                    rest = &rest[idx + 1..];
                    ns.to_string()
                }
                None => {
                    let ns = rest.to_string();
                    rest = "";
                    ns
                }
            }
        } else {
            "/".to_string()
        };

        // ack id
        let data = rest.trim_start_matches(|c: char| c.is_ascii_digit());

        if namespace != self.namespace {
            return Ok(None);
        }

        match packet_type {
            '0' => Ok(Some(SocketIoPacket::Connected { namespace })),
            '1' => Ok(Some(SocketIoPacket::Disconnected { namespace })),
            '2' => Self::decode_event(namespace, data).map(Some),
            '4' => {
                let message = if data.is_empty() {
                    Value::Null
                } else {
                    serde_json::from_str(data).unwrap_or_else(|_| Value::String(data.to_string()))
                };
                Ok(Some(SocketIoPacket::ConnectError { namespace, message }))
            }
            // acks and binary packets are not used on this socket
            '3' | '5' | '6' => Ok(None),
            other => Err(ExchangeError::ProtocolError(format!(
                "Unknown Socket.IO packet type '{}'",
                other
            ))),
        }
    }

    fn decode_event(namespace: String, data: &str) -> Result<SocketIoPacket, ExchangeError> {
        let value: Value = serde_json::from_str(data)
            .map_err(|e| ExchangeError::ProtocolError(format!("Invalid event payload: {}", e)))?;

        let mut args = match value {
            Value::Array(args) => args.into_iter(),
            _ => {
                return Err(ExchangeError::ProtocolError(
                    "Event payload is not an array".to_string(),
                ))
            }
        };

        let name = match args.next() {
            Some(Value::String(name)) => name,
            _ => {
                return Err(ExchangeError::ProtocolError(
                    "Event name missing".to_string(),
                ))
            }
        };

        Ok(SocketIoPacket::Event {
            namespace,
            name,
            payload: args.next().unwrap_or(Value::Null),
        })
    }
}

impl WsCodec for SocketIoCodec {
    type Message = SocketIoPacket;

    fn encode_subscription(&self, subscription: &Subscription) -> Result<Message, ExchangeError> {
        self.encode_event(
            &subscription.event,
            &json!({"event": "subscribe", "pair": subscription.pair}),
        )
    }

    fn decode_message(&self, message: Message) -> Result<Option<Self::Message>, ExchangeError> {
        match message {
            Message::Text(text) => self.decode_text(&text),
            Message::Binary(data) => {
                let text = String::from_utf8(data).map_err(|e| {
                    ExchangeError::ProtocolError(format!("Invalid UTF-8 frame: {}", e))
                })?;
                self.decode_text(&text)
            }
            _ => Ok(None),
        }
    }
}
