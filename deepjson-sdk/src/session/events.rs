//! Session event kinds and the handler registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Callback invoked with an event's payload.
///
/// Handlers are compared by identity (`Arc::ptr_eq`), so keep the `Arc` around
/// if you intend to [`off`](crate::SessionChannel::off) it later.
pub type Handler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Wrap a closure into a [`Handler`].
pub fn handler<F>(f: F) -> Handler
where
    F: Fn(&Value) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wrap a closure taking a typed payload into a [`Handler`].
///
/// Payloads that fail to deserialize into `T` are logged and skipped.
pub fn typed_handler<T, F>(f: F) -> Handler
where
    T: DeserializeOwned,
    F: Fn(T) + Send + Sync + 'static,
{
    Arc::new(move |data: &Value| match T::deserialize(data) {
        Ok(payload) => f(payload),
        Err(e) => tracing::warn!(error = %e, "dropping session payload of unexpected shape"),
    })
}

/// Everything a session handler can subscribe to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SessionEvent {
    /// Namespace connected. Payload: the server's connect data (or `null`).
    Connect,
    /// Transport went away. Payload: the reason as a string.
    Disconnect,
    /// A `reconnect()` rejoined its channel. Payload: the channel id.
    Reconnect,
    /// A `reconnect()` is about to rejoin. Payload: the channel id.
    Reconnecting,
    /// Application message (envelope `type`) or a named server event.
    /// Payload: the envelope's `data` or the event's first argument.
    Message(String),
}

impl SessionEvent {
    /// Map an event name onto its kind; unknown names are messages.
    pub fn parse(name: &str) -> Self {
        match name {
            "connect" => SessionEvent::Connect,
            "disconnect" => SessionEvent::Disconnect,
            "reconnect" => SessionEvent::Reconnect,
            "reconnecting" => SessionEvent::Reconnecting,
            other => SessionEvent::Message(other.to_string()),
        }
    }

    /// Wire name of the event.
    pub fn name(&self) -> &str {
        match self {
            SessionEvent::Connect => "connect",
            SessionEvent::Disconnect => "disconnect",
            SessionEvent::Reconnect => "reconnect",
            SessionEvent::Reconnecting => "reconnecting",
            SessionEvent::Message(name) => name,
        }
    }

    /// `true` for transport lifecycle events.
    pub fn is_lifecycle(&self) -> bool {
        !matches!(self, SessionEvent::Message(_))
    }
}

impl fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<&str> for SessionEvent {
    fn from(value: &str) -> Self {
        SessionEvent::parse(value)
    }
}

impl From<String> for SessionEvent {
    fn from(value: String) -> Self {
        SessionEvent::parse(&value)
    }
}

/// Ordered handler lists per event kind, shared with the connection task.
#[derive(Clone, Default)]
pub(crate) struct HandlerRegistry {
    inner: Arc<Mutex<HashMap<SessionEvent, Vec<Handler>>>>,
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let mut dbg = f.debug_map();
        for (event, handlers) in map.iter() {
            dbg.entry(&event.name(), &handlers.len());
        }
        dbg.finish()
    }
}

impl HandlerRegistry {
    fn with_map<R>(&self, f: impl FnOnce(&mut HashMap<SessionEvent, Vec<Handler>>) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Append `handler`; duplicates are kept and invoked once per registration.
    pub(crate) fn add(&self, event: SessionEvent, handler: Handler) {
        self.with_map(|map| map.entry(event).or_default().push(handler));
    }

    /// Remove the first registration of `handler` for `event`.
    pub(crate) fn remove(&self, event: &SessionEvent, handler: &Handler) -> bool {
        self.with_map(|map| {
            let Some(handlers) = map.get_mut(event) else {
                return false;
            };
            match handlers.iter().position(|h| Arc::ptr_eq(h, handler)) {
                Some(index) => {
                    handlers.remove(index);
                    true
                }
                None => false,
            }
        })
    }

    pub(crate) fn count(&self, event: &SessionEvent) -> usize {
        self.with_map(|map| map.get(event).map_or(0, Vec::len))
    }

    /// Invoke every handler of `event` in registration order.
    ///
    /// The list is snapshotted first, so handlers may register or remove
    /// handlers without deadlocking.
    pub(crate) fn dispatch(&self, event: &SessionEvent, data: &Value) -> usize {
        let handlers = self.with_map(|map| map.get(event).cloned().unwrap_or_default());
        for handler in &handlers {
            handler(data);
        }
        handlers.len()
    }
}
