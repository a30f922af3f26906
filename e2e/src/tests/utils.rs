use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

static TRACING_INIT: Once = Once::new();

/// Initializes the tracing subscriber for tests.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(std::env::var("TRACING").unwrap_or_else(|_| "info".to_string()))
            // Use with_test_writer to ensure logs are captured correctly by the test runner.
            .with_test_writer()
            .init();
    });
}

/// Token the fake server refuses with an `error` event.
pub const BAD_TOKEN: &str = "bad-token";
/// Token handed out by the fake server's `/auth/login`.
pub const FRESH_TOKEN: &str = "fresh-token";
/// Logging in as this user yields [`BAD_TOKEN`].
pub const REVOKED_USER: &str = "revoked";
/// Channel id the fake server assigns on `action=create`.
pub const CREATED_CHANNEL: &str = "chan-1";
/// Joining this channel never gets an answer.
pub const SILENT_CHANNEL: &str = "silent";
/// Joining this channel succeeds, then the server drops the namespace.
pub const KICK_CHANNEL: &str = "kick";

const OPEN_PACKET: &str =
    r#"0{"sid":"eio-1","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#;

/// In-process DeepJSON stand-in: `POST /auth/login` plus Engine.IO v4 /
/// Socket.IO v4 over WebSocket at `/socket.io/`.
///
/// Every handshake query and every frame received after session
/// establishment is recorded for assertions.
#[derive(Clone)]
pub struct FakeServer {
    addr: SocketAddr,
    handshakes: Arc<Mutex<Vec<HashMap<String, String>>>>,
    frames: Arc<Mutex<Vec<String>>>,
}

impl FakeServer {
    pub async fn start() -> FakeServer {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server = FakeServer {
            addr: listener.local_addr().unwrap(),
            handshakes: Arc::default(),
            frames: Arc::default(),
        };

        let app = Router::new()
            .route("/auth/login", post(login))
            .route("/socket.io/", get(socket))
            .with_state(server.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        server
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Parsed query of every WebSocket handshake, in arrival order.
    pub fn handshakes(&self) -> Vec<HashMap<String, String>> {
        self.handshakes.lock().unwrap().clone()
    }

    /// Text frames received after establishment, in arrival order.
    pub fn frames(&self) -> Vec<String> {
        self.frames.lock().unwrap().clone()
    }

    /// Poll until `pred` holds for the recorded frames, or give up after 5s.
    pub async fn wait_for_frames(&self, pred: impl Fn(&[String]) -> bool) -> Vec<String> {
        for _ in 0..100 {
            let frames = self.frames();
            if pred(&frames) {
                return frames;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("timed out waiting for frames, have {:?}", self.frames());
    }

    async fn serve(self, socket: WebSocket, params: HashMap<String, String>) {
        self.handshakes.lock().unwrap().push(params.clone());

        let (mut tx, mut rx) = socket.split();
        if tx.send(text(OPEN_PACKET)).await.is_err() {
            return;
        }

        // Wait for the namespace connect.
        loop {
            match rx.next().await {
                Some(Ok(Message::Text(frame))) if frame.as_str().starts_with("40") => break,
                Some(Ok(_)) => continue,
                _ => return,
            }
        }
        let _ = tx.send(text(r#"40{"sid":"ns-1"}"#)).await;

        let token = params.get("token").map(String::as_str);
        let action = params.get("action").map(String::as_str);
        let channel = params.get("channelId").cloned().unwrap_or_default();

        let reply = if token == Some(BAD_TOKEN) {
            Some(r#"42["error",{"message":"invalid token"}]"#.to_string())
        } else if action == Some("create") {
            Some(format!(
                r#"42["session-created",{{"channelId":"{CREATED_CHANNEL}"}}]"#
            ))
        } else if channel == SILENT_CHANNEL {
            None
        } else {
            let data = json!({
                "channelId": channel,
                "token": token,
                "participants": 2,
            });
            Some(format!(r#"42["session-joined",{data}]"#))
        };
        if let Some(reply) = reply {
            let _ = tx.send(text(&reply)).await;
        }

        if channel == KICK_CHANNEL {
            let _ = tx.send(text("41")).await;
            return;
        }

        // Echo application messages back; send a named event on request.
        let (echo_tx, mut echo_rx) = mpsc::unbounded_channel::<String>();
        let frames = Arc::clone(&self.frames);
        let reader = async move {
            while let Some(Ok(msg)) = rx.next().await {
                let Message::Text(frame) = msg else { continue };
                let frame = frame.as_str().to_owned();
                frames.lock().unwrap().push(frame.clone());
                if frame == "41" {
                    break;
                }
                if frame.starts_with(r#"42["message""#) {
                    if frame.contains(r#""type":"notify-me""#) {
                        let _ = echo_tx.send(r#"42["presence",{"online":3}]"#.to_string());
                    } else {
                        let _ = echo_tx.send(frame);
                    }
                }
            }
        };
        let writer = async move {
            while let Some(frame) = echo_rx.recv().await {
                if tx.send(text(&frame)).await.is_err() {
                    break;
                }
            }
        };
        tokio::join!(reader, writer);
    }
}

fn text(frame: &str) -> Message {
    Message::Text(frame.to_owned().into())
}

#[derive(Deserialize)]
struct Credentials {
    username: String,
}

async fn login(Json(credentials): Json<Credentials>) -> Json<Value> {
    let token = if credentials.username == REVOKED_USER {
        BAD_TOKEN
    } else {
        FRESH_TOKEN
    };
    Json(json!({ "token": token }))
}

async fn socket(
    ws: WebSocketUpgrade,
    Query(params): Query<HashMap<String, String>>,
    State(server): State<FakeServer>,
) -> Response {
    ws.on_upgrade(move |socket| server.serve(socket, params))
}

/// Receive the next value from a handler-fed channel, failing after 5s.
pub async fn next<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a session event")
        .expect("event channel closed")
}
