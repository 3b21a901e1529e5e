//! Shared test utilities: credentials, fixtures and a local mock venue.

#![allow(dead_code)]

use std::path::PathBuf;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use prime_markup::auth::Credentials;
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tungstenite::Message;

pub const ACCESS_KEY: &str = "test-access-key";
pub const PASSPHRASE: &str = "test-passphrase";
pub const SIGNING_KEY: &str = "test-signing-key";
pub const SERVICE_ACCOUNT: &str = "test-svc";

/// How long a test waits for anything asynchronous before failing.
pub const WAIT: Duration = Duration::from_secs(5);

pub fn credentials() -> Credentials {
    Credentials::new(ACCESS_KEY, PASSPHRASE, SIGNING_KEY, SERVICE_ACCOUNT)
}

/// Reads `tests/fixtures/<name>` as JSON.
pub fn fixture(name: &str) -> Value {
    let path: PathBuf = [env!("CARGO_MANIFEST_DIR"), "tests", "fixtures", name]
        .iter()
        .collect();
    let text = std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
    serde_json::from_str(&text).expect("fixture is not valid JSON")
}

/// A client connection accepted by [`MockVenue`], after its subscription
/// request has been read.
pub struct VenueConnection {
    pub subscription: Value,
    ws: WebSocketStream<TcpStream>,
}

impl VenueConnection {
    pub async fn send_json(&mut self, value: &Value) {
        self.ws
            .send(Message::Text(value.to_string().into()))
            .await
            .expect("failed to send frame to client");
    }

    /// Sends a close frame and drops the connection.
    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }

    /// Waits until the client closes the connection or it drops.
    pub async fn closed(mut self) {
        tokio::time::timeout(WAIT, async {
            while let Some(Ok(msg)) = self.ws.next().await {
                if msg.is_close() {
                    break;
                }
            }
        })
        .await
        .expect("client did not close the connection");
    }
}

/// Plain `ws://` server on an ephemeral local port.
pub struct MockVenue {
    pub url: String,
    connections: mpsc::UnboundedReceiver<VenueConnection>,
}

impl MockVenue {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind mock venue");
        let url = format!("ws://{}", listener.local_addr().expect("no local addr"));
        let (tx, connections) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else {
                    continue;
                };
                let subscription = loop {
                    match ws.next().await {
                        Some(Ok(Message::Text(text))) => {
                            break serde_json::from_str(&text).unwrap_or(Value::Null);
                        }
                        Some(Ok(_)) => continue,
                        _ => break Value::Null,
                    }
                };
                if tx.send(VenueConnection { subscription, ws }).is_err() {
                    break;
                }
            }
        });

        Self { url, connections }
    }

    /// Next subscribed connection, failing the test after [`WAIT`].
    pub async fn accept(&mut self) -> VenueConnection {
        tokio::time::timeout(WAIT, self.connections.recv())
            .await
            .expect("timed out waiting for a client connection")
            .expect("mock venue stopped")
    }

    /// Returns a connection if one arrives within `within`.
    pub async fn try_accept(&mut self, within: Duration) -> Option<VenueConnection> {
        tokio::time::timeout(within, self.connections.recv())
            .await
            .ok()
            .flatten()
    }
}

/// Polls `condition` until it holds, failing the test after [`WAIT`].
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not met in time");
}
