//! Prime WebSocket subscription authentication.
//!
//! Every subscription carries an HMAC-SHA256 signature over a
//! channel-specific message (see
//! [`ChannelHandler::signature_message`](crate::websocket::ChannelHandler::signature_message)).
//! The signing key itself never leaves the process; only the base64-encoded
//! digest is sent alongside the access key, service-account id, timestamp
//! and passphrase.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use base64::prelude::*;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::Result;

/// API credentials used to authenticate stream subscriptions.
#[derive(Clone)]
pub struct Credentials {
    pub access_key: String,
    pub passphrase: Zeroizing<String>,
    pub signing_key: Zeroizing<String>,
    pub service_account_id: String,
}

impl Credentials {
    /// Bundles the four credential values.
    #[must_use]
    pub fn new(
        access_key: impl Into<String>,
        passphrase: impl Into<String>,
        signing_key: impl Into<String>,
        service_account_id: impl Into<String>,
    ) -> Self {
        Self {
            access_key: access_key.into(),
            passphrase: Zeroizing::new(passphrase.into()),
            signing_key: Zeroizing::new(signing_key.into()),
            service_account_id: service_account_id.into(),
        }
    }

    /// Signs `message` with this set's signing key.
    ///
    /// # Errors
    ///
    /// See [`sign`].
    pub fn sign(&self, message: &str) -> Result<String> {
        sign(&self.signing_key, message)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &"[REDACTED]")
            .field("passphrase", &"[REDACTED]")
            .field("signing_key", &"[REDACTED]")
            .field("service_account_id", &self.service_account_id)
            .finish()
    }
}

/// Computes `Base64(HMAC-SHA256(signing_key, message))`.
///
/// The key is used as raw UTF-8 bytes, not base64-decoded.
///
/// # Errors
///
/// Returns [`MarkupError::Signing`](crate::MarkupError::Signing) if the HMAC
/// cannot be keyed.
pub fn sign(signing_key: &str, message: &str) -> Result<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(signing_key.as_bytes())
        .map_err(|e| crate::MarkupError::Signing(format!("invalid HMAC key: {e}")))?;
    mac.update(message.as_bytes());
    let digest = mac.finalize().into_bytes();

    Ok(BASE64_STANDARD.encode(digest))
}

/// Current wall-clock time in whole seconds since the UNIX epoch.
///
/// A clock set before 1970 yields 0 rather than panicking.
#[must_use]
pub fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}
