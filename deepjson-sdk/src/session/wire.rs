//! Socket.IO v4 framing over Engine.IO v4 text frames.
//!
//! Only what a WebSocket-only client needs is covered: the Engine.IO
//! open/close/ping/pong/message/noop packets and the Socket.IO connect,
//! disconnect, event, ack and connect-error packets. Binary attachments are
//! rejected.
//!
//! ```text
//! 0{"sid":"..","pingInterval":25000}   engine.io open
//! 2 / 3                                ping / pong
//! 40 / 40{"sid":".."}                  socket.io connect (client / server)
//! 42["message",{"type":"t","data":1}]  socket.io event
//! 44{"message":"unauthorized"}         socket.io connect error
//! ```

use serde_json::Value;

use crate::errors::SessionError;

/// One Engine.IO text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Handshake sent by the server right after the WebSocket opens.
    Open(Value),
    /// Transport close.
    Close,
    /// Heartbeat ping, with optional payload.
    Ping(String),
    /// Heartbeat reply, with optional payload.
    Pong(String),
    /// No-op.
    Noop,
    /// Socket.IO packet carried in an Engine.IO message.
    Socket(Packet),
}

/// Socket.IO packet on the default namespace.
#[derive(Debug, Clone, PartialEq)]
pub enum Packet {
    /// Namespace connect; the server's reply carries `{"sid": ..}`.
    Connect(Option<Value>),
    /// Namespace disconnect.
    Disconnect,
    /// Named event with its arguments.
    Event {
        /// Event name.
        name: String,
        /// Event arguments, in order.
        args: Vec<Value>,
    },
    /// Acknowledgement of an event that asked for one.
    Ack {
        /// Ack id of the acknowledged event.
        id: u64,
        /// Ack arguments.
        args: Vec<Value>,
    },
    /// Server refused the namespace connect.
    ConnectError(Value),
}

impl Packet {
    /// An event packet `[name, arg]`.
    pub fn event<S: Into<String>>(name: S, arg: Value) -> Self {
        Packet::Event {
            name: name.into(),
            args: vec![arg],
        }
    }
}

fn protocol(message: impl Into<String>) -> SessionError {
    SessionError::Protocol(message.into())
}

/// Serialize a frame into its text form.
pub fn encode(frame: &Frame) -> String {
    match frame {
        Frame::Open(data) => format!("0{data}"),
        Frame::Close => "1".to_string(),
        Frame::Ping(data) => format!("2{data}"),
        Frame::Pong(data) => format!("3{data}"),
        Frame::Noop => "6".to_string(),
        Frame::Socket(packet) => format!("4{}", encode_packet(packet)),
    }
}

fn encode_packet(packet: &Packet) -> String {
    match packet {
        Packet::Connect(None) => "0".to_string(),
        Packet::Connect(Some(data)) => format!("0{data}"),
        Packet::Disconnect => "1".to_string(),
        Packet::Event { name, args } => {
            let mut items = Vec::with_capacity(args.len() + 1);
            items.push(Value::String(name.clone()));
            items.extend(args.iter().cloned());
            format!("2{}", Value::Array(items))
        }
        Packet::Ack { id, args } => format!("3{id}{}", Value::Array(args.clone())),
        Packet::ConnectError(data) => format!("4{data}"),
    }
}

/// Parse one text frame.
pub fn decode(text: &str) -> Result<Frame, SessionError> {
    let mut chars = text.chars();
    let kind = chars.next().ok_or_else(|| protocol("empty frame"))?;
    let rest = chars.as_str();

    match kind {
        '0' => {
            let data = serde_json::from_str(rest)
                .map_err(|e| protocol(format!("invalid open payload: {e}")))?;
            Ok(Frame::Open(data))
        }
        '1' => Ok(Frame::Close),
        '2' => Ok(Frame::Ping(rest.to_string())),
        '3' => Ok(Frame::Pong(rest.to_string())),
        '4' => decode_packet(rest).map(Frame::Socket),
        '6' => Ok(Frame::Noop),
        other => Err(protocol(format!("unsupported engine.io packet type `{other}`"))),
    }
}

fn decode_packet(text: &str) -> Result<Packet, SessionError> {
    let mut chars = text.chars();
    let kind = chars.next().ok_or_else(|| protocol("empty socket.io packet"))?;
    let mut rest = chars.as_str();

    if kind == '5' || kind == '6' {
        return Err(protocol("binary socket.io packets are not supported"));
    }

    // Optional namespace, terminated by `,`.
    if rest.starts_with('/') {
        rest = match rest.split_once(',') {
            Some((_ns, tail)) => tail,
            None => "",
        };
    }

    // Optional ack id.
    let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
    let ack_id = if digits > 0 {
        Some(
            rest[..digits]
                .parse::<u64>()
                .map_err(|e| protocol(format!("invalid ack id: {e}")))?,
        )
    } else {
        None
    };
    let payload = &rest[digits..];

    let json = |what: &str| -> Result<Value, SessionError> {
        serde_json::from_str(payload).map_err(|e| protocol(format!("invalid {what} payload: {e}")))
    };

    match kind {
        '0' if payload.is_empty() => Ok(Packet::Connect(None)),
        '0' => Ok(Packet::Connect(Some(json("connect")?))),
        '1' => Ok(Packet::Disconnect),
        '2' => {
            let Value::Array(mut items) = json("event")? else {
                return Err(protocol("event payload must be an array"));
            };
            if items.is_empty() {
                return Err(protocol("event payload is missing its name"));
            }
            let Value::String(name) = items.remove(0) else {
                return Err(protocol("event name must be a string"));
            };
            Ok(Packet::Event { name, args: items })
        }
        '3' => {
            let Value::Array(args) = json("ack")? else {
                return Err(protocol("ack payload must be an array"));
            };
            let id = ack_id.ok_or_else(|| protocol("ack packet without id"))?;
            Ok(Packet::Ack { id, args })
        }
        '4' => Ok(Packet::ConnectError(if payload.is_empty() {
            Value::Null
        } else {
            json("connect error")?
        })),
        other => Err(protocol(format!("unsupported socket.io packet type `{other}`"))),
    }
}
