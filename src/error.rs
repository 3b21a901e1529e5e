//! Crate-level error types.
//!
//! [`MarkupError`] unifies every error source (configuration, WebSocket,
//! JSON, venue-reported failures) behind a single enum so callers can match
//! on the variant they care about while still using the `?` operator for
//! easy propagation.

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MarkupError>;

/// Top-level error type returned by all public APIs.
#[derive(Debug, thiserror::Error)]
pub enum MarkupError {
    /// Configuration is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// A WebSocket operation (connect, send, receive) failed.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A frame or event did not have the expected shape.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// The venue answered with an explicit `error` frame.
    #[error("venue error: {0}")]
    Venue(String),

    /// An order request failed validation.
    #[error("invalid order: {0}")]
    InvalidOrder(String),

    /// The HMAC signer could not be constructed.
    #[error("signing error: {0}")]
    Signing(String),

    /// `start()` was called on a stream client that is already running.
    #[error("stream client for channel {0} already started")]
    AlreadyStarted(String),

    /// The order-record store rejected an operation.
    #[error("order store error: {0}")]
    Store(String),
}
