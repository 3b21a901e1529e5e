//! Signed subscription requests.

use futures_util::SinkExt;
use tracing::info;
use tungstenite::Message;

use super::{ChannelHandler, WsWriter};
use crate::Result;
use crate::auth::Credentials;
use crate::models::SubscribeRequest;

/// Builds the subscribe request for `handler`, signed for `timestamp`
/// (unix seconds).
///
/// # Errors
///
/// Returns [`MarkupError::Signing`](crate::MarkupError::Signing) if the
/// signing key is unusable.
pub fn build_subscription(
    handler: &dyn ChannelHandler,
    credentials: &Credentials,
    timestamp: i64,
) -> Result<SubscribeRequest> {
    let timestamp = timestamp.to_string();
    let message = handler.signature_message(credentials, &timestamp);
    let signature = credentials.sign(&message)?;

    Ok(handler.subscription_message(credentials, &timestamp, &signature))
}

/// Signs and sends the subscribe request for `handler`.
///
/// The request itself is never logged since it carries the passphrase.
///
/// # Errors
///
/// Returns a [`MarkupError`](crate::MarkupError) if signing, serialization
/// or sending fails.
pub async fn subscribe(
    write: &mut WsWriter,
    handler: &dyn ChannelHandler,
    credentials: &Credentials,
    timestamp: i64,
) -> Result<SubscribeRequest> {
    let request = build_subscription(handler, credentials, timestamp)?;
    let json = serde_json::to_string(&request)?;
    write.send(Message::Text(json.into())).await?;
    info!(
        channel = handler.channel_name(),
        products = ?request.product_ids,
        timestamp = %request.timestamp,
        "Sent subscription request"
    );

    Ok(request)
}
