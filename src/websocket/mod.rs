//! Signed, reconnecting WebSocket streams for the prime brokerage feed.
//!
//! This module is organized by concern:
//! - [`connection`] - [`StreamClient`] lifecycle: connect, subscribe, read, reconnect
//! - [`handler`] - The [`ChannelHandler`] trait and frame routing
//! - [`subscription`] - Building and sending the signed subscribe request
//! - [`market_data`] - `l2_data` handler feeding the order books
//! - [`orders`] - `orders` handler feeding the order processor

pub mod connection;
pub mod handler;
pub mod market_data;
pub mod orders;
pub mod subscription;

use futures_util::StreamExt;
use futures_util::stream::{SplitSink, SplitStream};
use tokio::net::TcpStream;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::debug;
use tungstenite::Message;

use crate::Result;

pub use connection::{Clock, StreamClient, StreamConfig, StreamState};
pub use handler::{ChannelHandler, dispatch_frame};
pub use market_data::MarketDataHandler;
pub use orders::OrderUpdateHandler;
pub use subscription::{build_subscription, subscribe};

/// Write half of a stream connection.
pub type WsWriter = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Read half of a stream connection.
pub type WsReader = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Establishes a WebSocket connection to the given URL.
///
/// # Errors
///
/// Returns a [`MarkupError`](crate::MarkupError) if the connection or TLS handshake fails.
pub async fn connect(url: &str) -> Result<(WsWriter, WsReader)> {
    let (ws_stream, _) = connect_async(url).await?;
    debug!(url, "WebSocket handshake completed");

    Ok(ws_stream.split())
}
