//! One WebSocket transport and the task that pumps it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use super::events::{HandlerRegistry, SessionEvent};
use super::wire::{self, Frame, Packet};
use crate::errors::{Result, SessionError};

/// Engine.IO protocol revision spoken by this client.
const ENGINE_IO_VERSION: &str = "4";

/// What a connection is asked to do with the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionAction {
    /// Ask the server for a fresh channel.
    Create,
    /// Join the channel named in [`ConnectParams::channel_id`].
    Connect,
}

impl SessionAction {
    /// Query-string value of the action.
    pub fn as_str(self) -> &'static str {
        match self {
            SessionAction::Create => "create",
            SessionAction::Connect => "connect",
        }
    }
}

/// Outbound connection parameters, sent in the socket URL's query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectParams {
    /// Bearer token at connect time.
    pub token: Option<String>,
    /// Create or join.
    pub action: SessionAction,
    /// Channel to join (only with [`SessionAction::Connect`]).
    pub channel_id: Option<String>,
}

/// Build `ws(s)://<base>/socket.io/?EIO=4&transport=websocket&...`.
pub(crate) fn socket_url(base: &Url, params: &ConnectParams) -> Result<Url> {
    let mut url = base.clone();
    let scheme = match base.scheme() {
        "https" | "wss" => "wss",
        _ => "ws",
    };
    if url.set_scheme(scheme).is_err() {
        // `set_scheme` refuses special<->non-special switches; rebuild instead.
        let rest = &base.as_str()[base.scheme().len()..];
        url = Url::parse(&format!("{scheme}{rest}"))?;
    }

    let prefix = url.path().trim_end_matches('/').to_string();
    url.set_path(&format!("{prefix}/socket.io/"));
    url.set_query(None);
    {
        let mut q = url.query_pairs_mut();
        q.append_pair("EIO", ENGINE_IO_VERSION);
        q.append_pair("transport", "websocket");
        if let Some(token) = &params.token {
            q.append_pair("token", token);
        }
        q.append_pair("action", params.action.as_str());
        if let Some(channel_id) = &params.channel_id {
            q.append_pair("channelId", channel_id);
        }
    }
    Ok(url)
}

/// How the server confirmed the session.
#[derive(Debug)]
pub(crate) enum Established {
    /// `session-created {channelId}`.
    Created(String),
    /// `session-joined <sessionData>`.
    Joined(Value),
}

type Pending = Option<oneshot::Sender<std::result::Result<Established, SessionError>>>;

enum Outbound {
    Frame(String),
    Close,
}

/// Handle to a live transport. Dropping it without [`Connection::close`]
/// aborts the pump task.
#[derive(Debug)]
pub(crate) struct Connection {
    pub(crate) params: ConnectParams,
    outbound: mpsc::UnboundedSender<Outbound>,
    connected: Arc<AtomicBool>,
    task: JoinHandle<()>,
    closed: bool,
}

impl std::fmt::Debug for Outbound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outbound::Frame(text) => f.debug_tuple("Frame").field(text).finish(),
            Outbound::Close => f.write_str("Close"),
        }
    }
}

impl Connection {
    /// Open the WebSocket and start pumping it.
    ///
    /// The receiver resolves once the server confirms the session, reports an
    /// error, or the transport goes away first.
    pub(crate) async fn open(
        url: Url,
        params: ConnectParams,
        registry: HandlerRegistry,
    ) -> std::result::Result<
        (
            Connection,
            oneshot::Receiver<std::result::Result<Established, SessionError>>,
        ),
        SessionError,
    > {
        tracing::info!(action = params.action.as_str(), channel = ?params.channel_id, "opening session transport");
        tracing::debug!(%url, "session socket url");

        let (ws, _response) = tokio_tungstenite::connect_async(url.as_str()).await?;

        let (done_tx, done_rx) = oneshot::channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(false));

        let pump = Pump {
            registry,
            connected: Arc::clone(&connected),
            outbound: outbound_tx.clone(),
            pending: Some(done_tx),
        };
        let task = tokio::spawn(pump.run(ws, outbound_rx));

        Ok((
            Connection {
                params,
                outbound: outbound_tx,
                connected,
                task,
                closed: false,
            },
            done_rx,
        ))
    }

    /// Whether the namespace is connected and the transport still up.
    pub(crate) fn is_connected(&self) -> bool {
        !self.closed && self.connected.load(Ordering::SeqCst)
    }

    /// Queue a Socket.IO packet for sending.
    pub(crate) fn emit(&self, packet: Packet) -> std::result::Result<(), SessionError> {
        let text = wire::encode(&Frame::Socket(packet));
        self.outbound
            .send(Outbound::Frame(text))
            .map_err(|_closed| SessionError::NotConnected)
    }

    /// Say goodbye to the server and let the pump finish on its own.
    pub(crate) fn close(mut self) {
        self.closed = true;
        if self.outbound.send(Outbound::Close).is_err() {
            tracing::debug!("session transport already gone");
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if !self.closed {
            self.task.abort();
        }
    }
}

struct Pump {
    registry: HandlerRegistry,
    connected: Arc<AtomicBool>,
    outbound: mpsc::UnboundedSender<Outbound>,
    pending: Pending,
}

impl Pump {
    fn settle(&mut self, result: std::result::Result<Established, SessionError>) {
        if let Some(tx) = self.pending.take() {
            // The establishing future may have been dropped already.
            let _ = tx.send(result);
        }
    }

    fn reply(&self, frame: Frame) {
        let _ = self.outbound.send(Outbound::Frame(wire::encode(&frame)));
    }

    async fn run<S>(mut self, ws: S, mut outbound_rx: mpsc::UnboundedReceiver<Outbound>)
    where
        S: futures_util::Stream<
                Item = std::result::Result<Message, tokio_tungstenite::tungstenite::Error>,
            > + futures_util::Sink<Message, Error = tokio_tungstenite::tungstenite::Error>
            + Unpin,
    {
        let (mut sink, mut stream) = ws.split();

        let reason = loop {
            tokio::select! {
                inbound = stream.next() => match inbound {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reason) = self.handle_text(&text) {
                            break reason;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break "transport close",
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "session transport error");
                        break "transport error";
                    }
                },
                outbound = outbound_rx.recv() => match outbound {
                    Some(Outbound::Frame(text)) => {
                        tracing::trace!(frame = %text, "session frame out");
                        if let Err(e) = sink.send(Message::Text(text)).await {
                            tracing::warn!(error = %e, "failed to write session frame");
                            break "transport error";
                        }
                    }
                    Some(Outbound::Close) | None => {
                        let bye = wire::encode(&Frame::Socket(Packet::Disconnect));
                        let _ = sink.send(Message::Text(bye)).await;
                        let _ = sink.close().await;
                        break "io client disconnect";
                    }
                },
            }
        };

        let was_connected = self.connected.swap(false, Ordering::SeqCst);
        self.settle(Err(SessionError::Closed));
        tracing::info!(reason, "session transport closed");
        if was_connected {
            self.registry
                .dispatch(&SessionEvent::Disconnect, &Value::String(reason.to_string()));
        }
    }

    /// Handle one inbound text frame; `Some(reason)` ends the connection.
    fn handle_text(&mut self, text: &str) -> Option<&'static str> {
        tracing::trace!(frame = %text, "session frame in");
        let frame = match wire::decode(text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "dropping undecodable session frame");
                return None;
            }
        };

        match frame {
            Frame::Open(_) => self.reply(Frame::Socket(Packet::Connect(None))),
            Frame::Ping(data) => self.reply(Frame::Pong(data)),
            Frame::Pong(_) | Frame::Noop => {}
            Frame::Close => return Some("transport close"),
            Frame::Socket(packet) => return self.handle_packet(packet),
        }
        None
    }

    fn handle_packet(&mut self, packet: Packet) -> Option<&'static str> {
        match packet {
            Packet::Connect(data) => {
                self.connected.store(true, Ordering::SeqCst);
                self.registry
                    .dispatch(&SessionEvent::Connect, &data.unwrap_or(Value::Null));
            }
            Packet::Disconnect => return Some("io server disconnect"),
            Packet::ConnectError(data) => {
                self.settle(Err(SessionError::Rejected(describe(&data))));
                return Some("connect error");
            }
            Packet::Ack { id, .. } => tracing::debug!(id, "ignoring unsolicited ack"),
            Packet::Event { name, mut args } => {
                let first = if args.is_empty() {
                    Value::Null
                } else {
                    args.swap_remove(0)
                };
                self.handle_event(&name, first);
            }
        }
        None
    }

    fn handle_event(&mut self, name: &str, data: Value) {
        match name {
            "session-created" => {
                let result = match data.get("channelId").and_then(Value::as_str) {
                    Some(id) => Ok(Established::Created(id.to_string())),
                    None => Err(SessionError::Protocol(
                        "session-created without channelId".into(),
                    )),
                };
                self.settle(result);
            }
            "session-joined" => self.settle(Ok(Established::Joined(data))),
            "error" => {
                self.settle(Err(SessionError::Rejected(describe(&data))));
                self.registry
                    .dispatch(&SessionEvent::Message(name.to_string()), &data);
            }
            "message" => match data.get("type").and_then(Value::as_str) {
                Some(kind) => {
                    let kind = SessionEvent::Message(kind.to_string());
                    let payload = data.get("data").cloned().unwrap_or(Value::Null);
                    self.registry.dispatch(&kind, &payload);
                }
                None => tracing::warn!(%data, "dropping message envelope without type"),
            },
            other => {
                self.registry
                    .dispatch(&SessionEvent::Message(other.to_string()), &data);
            }
        }
    }
}

/// Human-readable text of an error payload.
fn describe(data: &Value) -> String {
    match data {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| data.to_string(), str::to_string),
        Value::Null => "unknown error".to_string(),
        other => other.to_string(),
    }
}
