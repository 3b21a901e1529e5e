//! Credential storage in the OS keychain.
//!
//! At startup, [`populate_env_from_keychain`] copies any stored credentials
//! into environment variables so [`crate::config::fetch_config`] picks them
//! up without the secrets living in a `.env` file.

use tracing::{debug, warn};
use zeroize::Zeroizing;

/// Keychain service name used for all stored credentials.
const SERVICE: &str = "prime-markup";

/// Venue credentials managed by this module.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CredentialKey {
    AccessKey,
    Passphrase,
    SigningKey,
    Portfolio,
    ServiceAccountId,
}

impl CredentialKey {
    /// Returns the keychain entry identifier.
    pub fn keyring_id(self) -> &'static str {
        match self {
            Self::AccessKey => "prime_access_key",
            Self::Passphrase => "prime_passphrase",
            Self::SigningKey => "prime_signing_key",
            Self::Portfolio => "prime_portfolio",
            Self::ServiceAccountId => "prime_service_account_id",
        }
    }

    /// Returns the environment variable name for this credential.
    pub fn env_var(self) -> &'static str {
        match self {
            Self::AccessKey => "PRIME_ACCESS_KEY",
            Self::Passphrase => "PRIME_PASSPHRASE",
            Self::SigningKey => "PRIME_SIGNING_KEY",
            Self::Portfolio => "PRIME_PORTFOLIO",
            Self::ServiceAccountId => "PRIME_SERVICE_ACCOUNT_ID",
        }
    }

    /// Returns a human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            Self::AccessKey => "Access Key",
            Self::Passphrase => "Passphrase",
            Self::SigningKey => "Signing Key",
            Self::Portfolio => "Portfolio Id",
            Self::ServiceAccountId => "Service Account Id",
        }
    }

    /// Whether the value must be kept out of logs and terminal output.
    pub fn is_secret(self) -> bool {
        matches!(self, Self::Passphrase | Self::SigningKey)
    }

    /// Looks a key up by its environment variable name.
    pub fn from_env_var(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.env_var() == name)
    }

    /// All credential keys in display order.
    pub const ALL: [CredentialKey; 5] = [
        Self::AccessKey,
        Self::Passphrase,
        Self::SigningKey,
        Self::Portfolio,
        Self::ServiceAccountId,
    ];
}

/// Loads a credential from the keychain, returning `None` if not set.
pub fn load(key: CredentialKey) -> Option<Zeroizing<String>> {
    let entry = keyring::Entry::new(SERVICE, key.keyring_id()).ok()?;
    match entry.get_password() {
        Ok(password) => Some(Zeroizing::new(password)),
        Err(keyring::Error::NoEntry) => None,
        Err(e) => {
            warn!(key = key.keyring_id(), error = %e, "failed to read keychain entry");
            None
        }
    }
}

/// Saves a credential to the keychain.
///
/// # Errors
///
/// Returns [`MarkupError::Config`](crate::MarkupError::Config) if the
/// keychain rejects the entry.
pub fn save(key: CredentialKey, value: &str) -> crate::Result<()> {
    let entry = keyring::Entry::new(SERVICE, key.keyring_id())
        .map_err(|e| crate::MarkupError::Config(format!("keyring entry error: {e}")))?;
    entry
        .set_password(value)
        .map_err(|e| crate::MarkupError::Config(format!("failed to save to keychain: {e}")))
}

/// Checks whether a credential exists in the keychain.
pub fn is_set(key: CredentialKey) -> bool {
    load(key).is_some()
}

/// Populates environment variables from the keychain for any
/// credentials not already set in the environment.
///
/// Call this at startup before [`crate::config::fetch_config`].
pub fn populate_env_from_keychain() {
    for key in CredentialKey::ALL {
        if std::env::var(key.env_var()).is_err()
            && let Some(value) = load(key)
        {
            debug!(key = key.env_var(), "loaded credential from keychain");
            // SAFETY: single-threaded at this point (before tokio runtime starts tasks)
            unsafe {
                std::env::set_var(key.env_var(), value.as_str());
            }
        }
    }
}
