//! Stream connection lifecycle management.
//!
//! [`StreamClient`] owns one logical subscription to a channel. It connects,
//! sends a freshly signed subscription, reads frames in arrival order and,
//! whenever the connection fails or closes, waits a fixed delay and starts
//! over. Only [`StreamClient::stop`] ends the loop.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use tungstenite::Message as WsMessage;

use super::{ChannelHandler, WsReader, WsWriter, connect, dispatch_frame, subscribe};
use crate::Result;
use crate::auth::{Credentials, unix_timestamp};
use crate::error::MarkupError;

/// Upper bound on the closing handshake with an unresponsive peer.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Source of subscription timestamps in unix seconds.
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

/// Where and how a [`StreamClient`] connects.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    pub url: String,
    pub credentials: Credentials,
    /// Fixed wait between a failure and the next connection attempt.
    pub reconnect_delay: Duration,
}

/// Observable lifecycle of a [`StreamClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Connecting,
    Subscribing,
    Streaming,
    /// Waiting out the reconnect delay.
    Reconnecting,
    Stopped,
}

/// Why the reader loop exited.
enum DisconnectReason {
    /// The connection was lost, errored or closed by the server.
    ConnectionError,
    /// [`StreamClient::stop`] was called.
    Shutdown,
}

/// A signed, self-healing subscription to one channel.
pub struct StreamClient {
    inner: Arc<Inner>,
    task: Mutex<Option<JoinHandle<()>>>,
}

struct Inner {
    config: StreamConfig,
    handler: Arc<dyn ChannelHandler>,
    clock: Clock,
    started: AtomicBool,
    state: watch::Sender<StreamState>,
    shutdown: watch::Sender<bool>,
}

impl StreamClient {
    /// Creates an idle client; nothing connects until [`start`](Self::start).
    #[must_use]
    pub fn new(config: StreamConfig, handler: Arc<dyn ChannelHandler>) -> Self {
        Self::with_clock(config, handler, Arc::new(unix_timestamp))
    }

    /// Like [`new`](Self::new) but with a custom timestamp source.
    #[must_use]
    pub fn with_clock(config: StreamConfig, handler: Arc<dyn ChannelHandler>, clock: Clock) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                handler,
                clock,
                started: AtomicBool::new(false),
                state: watch::Sender::new(StreamState::Idle),
                shutdown: watch::Sender::new(false),
            }),
            task: Mutex::new(None),
        }
    }

    pub fn channel_name(&self) -> &str {
        self.inner.handler.channel_name()
    }

    /// Spawns the connect/subscribe/stream loop and returns immediately.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`MarkupError::AlreadyStarted`] if the loop was already
    /// started on this client.
    pub fn start(&self) -> Result<()> {
        if self.inner.started.swap(true, Ordering::SeqCst) {
            return Err(MarkupError::AlreadyStarted(
                self.inner.handler.channel_name().to_string(),
            ));
        }

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move { inner.supervise().await });
        *self.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);

        Ok(())
    }

    /// Disables reconnection, cancels any pending read or delay and closes
    /// the connection. Safe to call repeatedly or before `start`.
    pub fn stop(&self) {
        let was_running = !self.inner.shutdown.send_replace(true);
        if was_running {
            info!(channel = self.channel_name(), "Stopping stream client");
        }
        if !self.inner.started.load(Ordering::SeqCst) {
            self.inner.state.send_replace(StreamState::Stopped);
        }
    }

    /// Waits for the loop spawned by `start` to exit.
    pub async fn join(&self) {
        let handle = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!(channel = self.channel_name(), "Stream task failed: {e}");
            }
        }
    }

    #[must_use]
    pub fn state(&self) -> StreamState {
        *self.inner.state.borrow()
    }

    /// Receiver notified on every state transition.
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<StreamState> {
        self.inner.state.subscribe()
    }
}

impl fmt::Debug for StreamClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamClient")
            .field("channel", &self.channel_name())
            .field("url", &self.inner.config.url)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Drop for StreamClient {
    fn drop(&mut self) {
        self.inner.shutdown.send_replace(true);
    }
}

impl Inner {
    fn channel(&self) -> &str {
        self.handler.channel_name()
    }

    fn set_state(&self, state: StreamState) {
        self.state.send_replace(state);
        debug!(channel = self.channel(), ?state, "Stream state changed");
    }

    /// Runs the stream loop, starting it over after a panic.
    ///
    /// A panic while handling a frame aborts only the current connection;
    /// the client waits out the reconnect delay and connects again.
    async fn supervise(self: Arc<Self>) {
        loop {
            match tokio::spawn(Arc::clone(&self).run()).await {
                Ok(()) => break,
                Err(e) if e.is_panic() => {
                    error!(channel = self.channel(), "Stream loop panicked, restarting");
                    let mut shutdown = self.shutdown.subscribe();
                    if !self.wait_before_retry(&mut shutdown).await {
                        break;
                    }
                }
                Err(e) => {
                    error!(channel = self.channel(), "Stream loop aborted: {e}");
                    break;
                }
            }
        }

        self.set_state(StreamState::Stopped);
        info!(channel = self.channel(), "Stream client stopped");
    }

    async fn run(self: Arc<Self>) {
        let mut shutdown = self.shutdown.subscribe();

        while !*shutdown.borrow_and_update() {
            self.set_state(StreamState::Connecting);
            info!(url = %self.config.url, channel = self.channel(), "Connecting to stream");

            let connected = tokio::select! {
                result = connect(&self.config.url) => result,
                _ = shutdown.changed() => break,
            };

            let (mut write, read) = match connected {
                Ok(pair) => pair,
                Err(e) => {
                    error!(channel = self.channel(), "Failed to connect: {e}");
                    if !self.wait_before_retry(&mut shutdown).await {
                        break;
                    }
                    continue;
                }
            };

            self.set_state(StreamState::Subscribing);
            let timestamp = (self.clock)();
            if let Err(e) = subscribe(
                &mut write,
                self.handler.as_ref(),
                &self.config.credentials,
                timestamp,
            )
            .await
            {
                error!(channel = self.channel(), "Failed to subscribe: {e}");
                self.close(&mut write).await;
                if !self.wait_before_retry(&mut shutdown).await {
                    break;
                }
                continue;
            }

            self.set_state(StreamState::Streaming);
            let reason = self.read_loop(read, &mut shutdown).await;
            self.close(&mut write).await;

            match reason {
                DisconnectReason::ConnectionError => {
                    info!(
                        channel = self.channel(),
                        delay_ms = self.config.reconnect_delay.as_millis() as u64,
                        "Reconnecting"
                    );
                    if !self.wait_before_retry(&mut shutdown).await {
                        break;
                    }
                }
                DisconnectReason::Shutdown => break,
            }
        }
    }

    /// Sends a close frame, giving up after [`CLOSE_TIMEOUT`].
    async fn close(&self, write: &mut WsWriter) {
        match tokio::time::timeout(CLOSE_TIMEOUT, write.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(channel = self.channel(), "Close failed: {e}"),
            Err(_) => warn!(channel = self.channel(), "Close timed out, dropping connection"),
        }
    }

    /// Sleeps for the reconnect delay. Returns `false` if stopped meanwhile.
    async fn wait_before_retry(&self, shutdown: &mut watch::Receiver<bool>) -> bool {
        if *shutdown.borrow() {
            return false;
        }
        self.set_state(StreamState::Reconnecting);
        tokio::select! {
            () = tokio::time::sleep(self.config.reconnect_delay) => true,
            _ = shutdown.changed() => false,
        }
    }

    /// Reads frames until the connection drops or the client is stopped.
    async fn read_loop(
        &self,
        mut read: WsReader,
        shutdown: &mut watch::Receiver<bool>,
    ) -> DisconnectReason {
        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(WsMessage::Text(text))) => self.handle_frame(&text),
                        Some(Ok(WsMessage::Close(frame))) => {
                            warn!(channel = self.channel(), ?frame, "Stream closed by server");
                            return DisconnectReason::ConnectionError;
                        }
                        Some(Ok(_)) => {} // Binary/Ping/Pong frames
                        Some(Err(e)) => {
                            warn!(channel = self.channel(), "WebSocket error: {e}");
                            return DisconnectReason::ConnectionError;
                        }
                        None => {
                            warn!(channel = self.channel(), "WebSocket stream ended");
                            return DisconnectReason::ConnectionError;
                        }
                    }
                }

                _ = shutdown.changed() => {
                    return DisconnectReason::Shutdown;
                }
            }
        }
    }

    fn handle_frame(&self, text: &str) {
        match dispatch_frame(self.handler.as_ref(), text) {
            Ok(()) => {}
            Err(MarkupError::Venue(message)) => {
                error!(channel = self.channel(), %message, "Venue reported an error");
            }
            Err(MarkupError::MalformedMessage(reason)) => {
                warn!(channel = self.channel(), %reason, "Skipping malformed frame");
            }
            Err(e) => {
                error!(channel = self.channel(), "Error handling message: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Quiet;

    impl ChannelHandler for Quiet {
        fn channel_name(&self) -> &str {
            "l2_data"
        }

        fn product_ids(&self) -> &[String] {
            &[]
        }

        fn handle_message(&self, _message: serde_json::Value) -> Result<()> {
            Ok(())
        }
    }

    fn client(url: &str) -> StreamClient {
        StreamClient::new(
            StreamConfig {
                url: url.to_string(),
                credentials: Credentials::new("AK", "pass", "secret", "SVC"),
                reconnect_delay: Duration::from_millis(20),
            },
            Arc::new(Quiet),
        )
    }

    #[test]
    fn stop_before_start_is_safe() {
        let client = client("ws://127.0.0.1:1");
        assert_eq!(client.state(), StreamState::Idle);
        client.stop();
        client.stop();
        assert_eq!(client.state(), StreamState::Stopped);
    }

    #[tokio::test]
    async fn second_start_is_rejected() {
        let client = client("ws://127.0.0.1:1");
        client.start().unwrap();
        assert!(matches!(client.start(), Err(MarkupError::AlreadyStarted(ref c)) if c == "l2_data"));
        client.stop();
        client.join().await;
        assert_eq!(client.state(), StreamState::Stopped);
    }

    #[tokio::test]
    async fn stop_before_start_exits_immediately() {
        let client = client("ws://127.0.0.1:1");
        client.stop();
        client.start().unwrap();
        client.join().await;
        assert_eq!(client.state(), StreamState::Stopped);
    }

    #[tokio::test]
    async fn failed_connects_keep_retrying_until_stopped() {
        // Nothing listens on port 1, so every attempt fails.
        let client = client("ws://127.0.0.1:1");
        let mut states = client.state_changes();
        client.start().unwrap();

        let mut reconnecting = 0;
        while reconnecting < 2 {
            states.changed().await.unwrap();
            if *states.borrow_and_update() == StreamState::Reconnecting {
                reconnecting += 1;
            }
        }

        client.stop();
        client.join().await;
        assert_eq!(client.state(), StreamState::Stopped);
    }
}
