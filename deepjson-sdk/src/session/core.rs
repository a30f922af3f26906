//! The session channel: lifecycle, handlers and outbound messages.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use super::connection::{socket_url, ConnectParams, Connection, Established, SessionAction};
use super::events::{typed_handler, Handler, HandlerRegistry, SessionEvent};
use super::wire::Packet;
use crate::auth::LoginResponse;
use crate::errors::{Error, Result, SessionError};
use crate::DeepJsonClient;

/// Where a [`SessionChannel`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No transport attached.
    Idle,
    /// A transport is open and waiting for the server to confirm the session.
    Connecting,
    /// Session confirmed; messages flow.
    Active,
}

/// A single real-time session on top of a [`DeepJsonClient`]'s credentials.
///
/// The channel owns at most one transport at a time. Creating, joining or
/// reconnecting always tears the previous transport down first; handlers
/// registered with [`on`](Self::on) survive all of that, only
/// [`disconnect`](Self::disconnect) forgets the channel id.
///
/// # Example
/// ```no_run
/// use deepjson::{DeepJsonClient, SessionEvent};
///
/// # async fn run() -> deepjson::Result<()> {
/// let client = DeepJsonClient::new("https://db.example.com")?;
/// client.login("alice", "s3cret").await?;
///
/// let mut channel = client.session_channel();
/// channel.on_message("chat", |text: String| println!("chat: {text}"));
/// channel.on(SessionEvent::Disconnect, deepjson::handler(|why| println!("gone: {why}")));
///
/// let id = channel.create_session().await?;
/// println!("share this id: {id}");
/// channel.send("chat", "hello")?;
/// # Ok(()) }
/// ```
#[derive(Debug)]
pub struct SessionChannel {
    client: DeepJsonClient,
    registry: HandlerRegistry,
    connection: Option<Connection>,
    channel_id: Option<String>,
    state: SessionState,
    establish_timeout: Option<Duration>,
}

impl DeepJsonClient {
    /// A new, idle [`SessionChannel`] sharing this client's token.
    pub fn session_channel(&self) -> SessionChannel {
        SessionChannel::new(self.clone())
    }
}

impl SessionChannel {
    /// Idle channel on top of `client`.
    ///
    /// Session establishment times out after the client's request timeout
    /// unless changed with [`Self::set_establish_timeout`].
    pub fn new(client: DeepJsonClient) -> Self {
        let establish_timeout = Some(client.request_timeout());
        Self {
            client,
            registry: HandlerRegistry::default(),
            connection: None,
            channel_id: None,
            state: SessionState::Idle,
            establish_timeout,
        }
    }

    /// How long `create_session`/`join_session` wait for the server's
    /// confirmation. `None` waits forever.
    pub fn set_establish_timeout(&mut self, timeout: Option<Duration>) -> &mut Self {
        self.establish_timeout = timeout;
        self
    }

    /// The client whose credentials this channel uses.
    pub fn client(&self) -> &DeepJsonClient {
        &self.client
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Identifier of the current (or last confirmed) channel.
    pub fn channel_id(&self) -> Option<&str> {
        self.channel_id.as_deref()
    }

    /// Outbound parameters of the attached transport, if any.
    pub fn connect_params(&self) -> Option<&ConnectParams> {
        self.connection.as_ref().map(|c| &c.params)
    }

    /// `true` while a transport is attached and its namespace connected.
    pub fn is_connected(&self) -> bool {
        self.connection.as_ref().is_some_and(Connection::is_connected)
    }

    // === Session management ===

    /// Ask the server for a fresh channel; resolves with its id.
    pub async fn create_session(&mut self) -> Result<String> {
        let params = ConnectParams {
            token: self.client.token(),
            action: SessionAction::Create,
            channel_id: None,
        };
        match self.establish(params).await? {
            Established::Created(id) => {
                self.channel_id = Some(id.clone());
                Ok(id)
            }
            Established::Joined(_) => Err(SessionError::Protocol(
                "server answered a create with session-joined".into(),
            )
            .into()),
        }
    }

    /// Join an existing channel; resolves with the server's session data.
    ///
    /// An empty `channel_id` fails immediately, before any connection attempt.
    pub async fn join_session(&mut self, channel_id: &str) -> Result<Value> {
        if channel_id.is_empty() {
            return Err(SessionError::MissingChannelId.into());
        }
        let params = ConnectParams {
            token: self.client.token(),
            action: SessionAction::Connect,
            channel_id: Some(channel_id.to_string()),
        };
        match self.establish(params).await? {
            Established::Joined(data) => {
                self.channel_id = Some(channel_id.to_string());
                Ok(data)
            }
            Established::Created(_) => Err(SessionError::Protocol(
                "server answered a join with session-created".into(),
            )
            .into()),
        }
    }

    async fn establish(&mut self, params: ConnectParams) -> Result<Established> {
        self.disconnect();
        let url = socket_url(self.client.base_url(), &params)?;
        self.state = SessionState::Connecting;

        // The half-open connection stays local until confirmed, so dropping
        // this future (or timing out) drops it and aborts its task.
        let registry = self.registry.clone();
        let attempt = async move {
            let (conn, confirmed) = Connection::open(url, params, registry).await?;
            match confirmed.await {
                Ok(Ok(established)) => Ok((conn, established)),
                Ok(Err(e)) => Err(e),
                Err(_sender_dropped) => Err(SessionError::Closed),
            }
        };

        let outcome = match self.establish_timeout {
            Some(limit) => tokio::time::timeout(limit, attempt)
                .await
                .unwrap_or(Err(SessionError::Timeout)),
            None => attempt.await,
        };

        match outcome {
            Ok((conn, established)) => {
                tracing::info!(action = conn.params.action.as_str(), "session established");
                self.connection = Some(conn);
                self.state = SessionState::Active;
                Ok(established)
            }
            Err(e) => {
                tracing::warn!(error = %e, "session establishment failed");
                self.state = SessionState::Idle;
                Err(Error::from(e))
            }
        }
    }

    /// Tear down the transport and forget the channel id. Handlers stay.
    pub fn disconnect(&mut self) {
        if let Some(conn) = self.connection.take() {
            tracing::info!(channel = ?self.channel_id, "disconnecting session");
            conn.close();
        }
        self.channel_id = None;
        self.state = SessionState::Idle;
    }

    /// Rejoin the stored channel; `Ok(None)` when there is none.
    ///
    /// Handlers of [`SessionEvent::Reconnecting`] run before the attempt and
    /// those of [`SessionEvent::Reconnect`] after it succeeds, both with the
    /// channel id as payload.
    pub async fn reconnect(&mut self) -> Result<Option<Value>> {
        let Some(channel_id) = self.channel_id.clone() else {
            return Ok(None);
        };
        let payload = Value::String(channel_id.clone());
        self.registry.dispatch(&SessionEvent::Reconnecting, &payload);
        let data = self.join_session(&channel_id).await?;
        self.registry.dispatch(&SessionEvent::Reconnect, &payload);
        Ok(Some(data))
    }

    /// Log in through the client and, if a transport is attached, rejoin the
    /// current channel with the fresh token.
    ///
    /// The token is stored before the rejoin starts. If only the rejoin
    /// fails, its error is returned, [`DeepJsonClient::token`] already holds
    /// the new token and the channel is left idle.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<LoginResponse> {
        let response = self.client.login(username, password).await?;
        if self.connection.is_some() {
            // `reconnect` reads the token store, so the new connection
            // carries the fresh token.
            self.reconnect().await?;
        }
        Ok(response)
    }

    // === Message handling ===

    /// Register `handler` for `event`. Handlers run in registration order;
    /// registering the same handler twice makes it run twice.
    pub fn on<E: Into<SessionEvent>>(&self, event: E, handler: Handler) {
        self.registry.add(event.into(), handler);
    }

    /// Register a typed handler for application messages of `kind`.
    ///
    /// Returns the registered [`Handler`] so it can be passed to [`Self::off`].
    pub fn on_message<T, F>(&self, kind: &str, f: F) -> Handler
    where
        T: DeserializeOwned,
        F: Fn(T) + Send + Sync + 'static,
    {
        let handler = typed_handler(f);
        self.registry
            .add(SessionEvent::Message(kind.to_string()), std::sync::Arc::clone(&handler));
        handler
    }

    /// Remove the first registration of `handler` for `event`.
    pub fn off<E: Into<SessionEvent>>(&self, event: E, handler: &Handler) -> bool {
        self.registry.remove(&event.into(), handler)
    }

    /// Number of handlers registered for `event`.
    pub fn handler_count<E: Into<SessionEvent>>(&self, event: E) -> usize {
        self.registry.count(&event.into())
    }

    /// Emit the envelope `{type, data}` over the session.
    ///
    /// Fails with [`SessionError::NotConnected`] when no connected transport
    /// is attached.
    pub fn send<T: Serialize>(&self, kind: &str, data: T) -> Result<()> {
        let conn = self
            .connection
            .as_ref()
            .filter(|c| c.is_connected())
            .ok_or(SessionError::NotConnected)?;
        let data = serde_json::to_value(data)
            .map_err(|e| SessionError::Protocol(format!("failed to encode message data: {e}")))?;
        conn.emit(Packet::event("message", json!({ "type": kind, "data": data })))?;
        Ok(())
    }
}

impl Drop for SessionChannel {
    fn drop(&mut self) {
        self.disconnect();
    }
}
