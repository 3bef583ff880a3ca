//! API credentials.

use std::fmt;

/// Maximum number of API key characters shown in redacted output.
const VISIBLE_KEY_PREFIX: usize = 4;

/// OKX API credentials: API key, secret key and passphrase.
///
/// Immutable once constructed. The `Debug` representation only ever shows a
/// short prefix of the API key; the secret and passphrase are always masked.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    api_key: String,
    secret_key: String,
    passphrase: String,
}

impl Credentials {
    /// Create new credentials.
    pub fn new(
        api_key: impl Into<String>,
        secret_key: impl Into<String>,
        passphrase: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            secret_key: secret_key.into(),
            passphrase: passphrase.into(),
        }
    }

    /// The API key.
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// The secret key used for HMAC signing.
    pub fn secret_key(&self) -> &str {
        &self.secret_key
    }

    /// The passphrase chosen when the API key was created.
    pub fn passphrase(&self) -> &str {
        &self.passphrase
    }

    /// Redacted API key: at most half of the key (and never more than four
    /// characters) followed by `***`.
    pub fn redacted_api_key(&self) -> String {
        let visible = VISIBLE_KEY_PREFIX.min(self.api_key.chars().count() / 2);
        let prefix: String = self.api_key.chars().take(visible).collect();
        format!("{}***", prefix)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.redacted_api_key())
            .field("secret_key", &"***")
            .field("passphrase", &"***")
            .finish()
    }
}
