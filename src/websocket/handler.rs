//! Channel-specific behaviour plugged into a [`StreamClient`](super::StreamClient).

use serde::Deserialize;
use tracing::{debug, info};

use crate::Result;
use crate::auth::Credentials;
use crate::error::MarkupError;
use crate::models::{Envelope, SubscribeRequest};

/// What a stream client needs to know about the channel it serves.
///
/// Implementors name the channel and interpret its frames; the signing and
/// subscription defaults cover the venue's standard format and only need
/// overriding for channels with extra fields.
pub trait ChannelHandler: Send + Sync + 'static {
    /// Wire name of the channel, e.g. `"l2_data"`.
    fn channel_name(&self) -> &str;

    /// Products included in the subscription.
    fn product_ids(&self) -> &[String];

    /// Portfolio scoping the subscription, for channels that need one.
    fn portfolio_id(&self) -> Option<&str> {
        None
    }

    /// The text that gets signed for a subscription at `timestamp`.
    ///
    /// Channel name, access key, service-account id and timestamp, then the
    /// portfolio id if any, then every product id, all concatenated without
    /// separators.
    fn signature_message(&self, credentials: &Credentials, timestamp: &str) -> String {
        let mut message = String::new();
        message.push_str(self.channel_name());
        message.push_str(&credentials.access_key);
        message.push_str(&credentials.service_account_id);
        message.push_str(timestamp);
        if let Some(portfolio_id) = self.portfolio_id() {
            message.push_str(portfolio_id);
        }
        message.push_str(&self.product_ids().concat());
        message
    }

    /// The subscribe request carrying `signature`.
    fn subscription_message(
        &self,
        credentials: &Credentials,
        timestamp: &str,
        signature: &str,
    ) -> SubscribeRequest {
        SubscribeRequest {
            tpe: "subscribe".to_string(),
            channel: self.channel_name().to_string(),
            access_key: credentials.access_key.clone(),
            api_key_id: credentials.service_account_id.clone(),
            timestamp: timestamp.to_string(),
            passphrase: credentials.passphrase.to_string(),
            signature: signature.to_string(),
            portfolio_id: self.portfolio_id().map(String::from),
            product_ids: self.product_ids().to_vec(),
        }
    }

    /// Interprets one data frame already known to belong to this channel.
    ///
    /// # Errors
    ///
    /// Returns a [`MarkupError`](crate::MarkupError) when the frame cannot
    /// be used; the client logs it and keeps streaming.
    fn handle_message(&self, message: serde_json::Value) -> Result<()>;
}

/// Routes one text frame.
///
/// Subscription confirmations are logged, `error` frames become
/// [`MarkupError::Venue`], frames for other channels are ignored and the
/// rest go to [`ChannelHandler::handle_message`].
///
/// # Errors
///
/// Returns [`MarkupError::MalformedMessage`] for frames that are not JSON
/// objects, [`MarkupError::Venue`] for venue errors, and whatever the
/// handler returns.
pub fn dispatch_frame(handler: &dyn ChannelHandler, text: &str) -> Result<()> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| MarkupError::MalformedMessage(e.to_string()))?;
    let envelope = Envelope::deserialize(&value)
        .map_err(|e| MarkupError::MalformedMessage(e.to_string()))?;

    match envelope.tpe.as_deref() {
        Some("subscriptions") => {
            info!(channel = handler.channel_name(), "Subscription confirmed");
            return Ok(());
        }
        Some("error") => {
            return Err(MarkupError::Venue(envelope.message.unwrap_or_default()));
        }
        _ => {}
    }

    if envelope.channel.as_deref() != Some(handler.channel_name()) {
        debug!(
            expected = handler.channel_name(),
            channel = ?envelope.channel,
            "Ignoring frame for another channel"
        );
        return Ok(());
    }

    handler.handle_message(value)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    struct Recorder {
        products: Vec<String>,
        portfolio: Option<String>,
        seen: Mutex<Vec<serde_json::Value>>,
    }

    impl Recorder {
        fn new(portfolio: Option<&str>) -> Self {
            Self {
                products: vec!["BTC-USD".to_string(), "ETH-USD".to_string()],
                portfolio: portfolio.map(String::from),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl ChannelHandler for Recorder {
        fn channel_name(&self) -> &str {
            "l2_data"
        }

        fn product_ids(&self) -> &[String] {
            &self.products
        }

        fn portfolio_id(&self) -> Option<&str> {
            self.portfolio.as_deref()
        }

        fn handle_message(&self, message: serde_json::Value) -> Result<()> {
            self.seen.lock().unwrap().push(message);
            Ok(())
        }
    }

    fn credentials() -> Credentials {
        Credentials::new("AK", "pass", "secret", "SVC")
    }

    #[test]
    fn signature_message_concatenates_fields() {
        let handler = Recorder::new(None);
        assert_eq!(
            handler.signature_message(&credentials(), "1700000000"),
            "l2_dataAKSVC1700000000BTC-USDETH-USD"
        );
    }

    #[test]
    fn portfolio_goes_between_timestamp_and_products() {
        let handler = Recorder::new(Some("PF"));
        assert_eq!(
            handler.signature_message(&credentials(), "1700000000"),
            "l2_dataAKSVC1700000000PFBTC-USDETH-USD"
        );
    }

    #[test]
    fn subscription_message_omits_signing_key() {
        let handler = Recorder::new(None);
        let request = handler.subscription_message(&credentials(), "1", "sig");
        let json = serde_json::to_string(&request).unwrap();

        assert!(json.contains("\"type\":\"subscribe\""));
        assert!(json.contains("\"api_key_id\":\"SVC\""));
        assert!(!json.contains("secret"));
        assert!(!json.contains("portfolio_id"));
    }

    #[test]
    fn routes_only_matching_channel() {
        let handler = Recorder::new(None);

        dispatch_frame(&handler, r#"{"channel":"l2_data","events":[]}"#).unwrap();
        dispatch_frame(&handler, r#"{"channel":"orders","events":[]}"#).unwrap();
        dispatch_frame(&handler, r#"{"events":[]}"#).unwrap();
        dispatch_frame(&handler, r#"{"type":"subscriptions","channel":"l2_data"}"#).unwrap();

        assert_eq!(handler.seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn error_frames_become_venue_errors() {
        let handler = Recorder::new(None);
        let err = dispatch_frame(&handler, r#"{"type":"error","message":"bad signature"}"#)
            .unwrap_err();
        assert!(matches!(err, MarkupError::Venue(ref m) if m == "bad signature"));
    }

    #[test]
    fn malformed_frames_are_rejected() {
        let handler = Recorder::new(None);
        assert!(matches!(
            dispatch_frame(&handler, "not json"),
            Err(MarkupError::MalformedMessage(_))
        ));
        assert!(matches!(
            dispatch_frame(&handler, "[1,2,3]"),
            Err(MarkupError::MalformedMessage(_))
        ));
        assert!(handler.seen.lock().unwrap().is_empty());
    }
}
