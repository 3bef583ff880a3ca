//! Request signing for the OKX v5 API.
//!
//! Provides the HMAC-SHA256 primitive shared by REST request signing and
//! the WebSocket login handshake.
//!
//! # Signing Flow
//!
//! 1. Build the pre-hash string `timestamp + METHOD + requestPath + body`
//! 2. HMAC-SHA256 it with the secret key
//! 3. Base64-encode the digest
//! 4. Send it as `OK-ACCESS-SIGN` (REST) or `sign` (WebSocket login)
//!
//! REST timestamps are ISO-8601 with millisecond precision; WebSocket login
//! timestamps are Unix seconds and the signed path is always
//! `GET /users/self/verify`.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use crate::network::SIMULATED_TRADING_HEADER;
use crate::shared::Credentials;

type HmacSha256 = Hmac<Sha256>;

/// Method signed by the WebSocket login handshake.
pub const WS_LOGIN_METHOD: &str = "GET";

/// Path signed by the WebSocket login handshake.
pub const WS_LOGIN_PATH: &str = "/users/self/verify";

pub const OK_ACCESS_KEY: &str = "OK-ACCESS-KEY";
pub const OK_ACCESS_SIGN: &str = "OK-ACCESS-SIGN";
pub const OK_ACCESS_TIMESTAMP: &str = "OK-ACCESS-TIMESTAMP";
pub const OK_ACCESS_PASSPHRASE: &str = "OK-ACCESS-PASSPHRASE";

/// Signing errors
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// The secret key could not initialise the MAC
    #[error("Invalid secret key: {0}")]
    InvalidSecret(String),
}

/// Result type alias for signing operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Build the string that gets signed.
pub fn pre_hash(timestamp: &str, method: &str, path: &str, body: &str) -> String {
    format!("{}{}{}{}", timestamp, method.to_uppercase(), path, body)
}

/// Sign a request: base64(HMAC-SHA256(secret, timestamp + METHOD + path + body)).
pub fn sign(secret: &str, timestamp: &str, method: &str, path: &str, body: &str) -> AuthResult<String> {
    sign_message(secret, &pre_hash(timestamp, method, path, body))
}

/// HMAC-SHA256 an arbitrary message and base64-encode the digest.
pub fn sign_message(secret: &str, message: &str) -> AuthResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AuthError::InvalidSecret(e.to_string()))?;
    mac.update(message.as_bytes());
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

/// Headers for an authenticated REST request.
pub fn rest_headers(
    credentials: &Credentials,
    timestamp: &str,
    method: &str,
    path: &str,
    body: &str,
    simulated: bool,
) -> AuthResult<Vec<(&'static str, String)>> {
    let signature = sign(credentials.secret_key(), timestamp, method, path, body)?;

    let mut headers = vec![
        (OK_ACCESS_KEY, credentials.api_key().to_string()),
        (OK_ACCESS_SIGN, signature),
        (OK_ACCESS_TIMESTAMP, timestamp.to_string()),
        (OK_ACCESS_PASSPHRASE, credentials.passphrase().to_string()),
    ];
    if simulated {
        headers.push((SIMULATED_TRADING_HEADER, "1".to_string()));
    }
    Ok(headers)
}

/// The single argument of a WebSocket `login` request.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsLoginArgs {
    pub api_key: String,
    pub passphrase: String,
    pub timestamp: String,
    pub sign: String,
}

impl std::fmt::Debug for WsLoginArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsLoginArgs")
            .field("timestamp", &self.timestamp)
            .finish_non_exhaustive()
    }
}

/// Build WebSocket login arguments for the given Unix-seconds timestamp.
pub fn ws_login_args(credentials: &Credentials, unix_secs: i64) -> AuthResult<WsLoginArgs> {
    let timestamp = unix_secs.to_string();
    let sign = sign(
        credentials.secret_key(),
        &timestamp,
        WS_LOGIN_METHOD,
        WS_LOGIN_PATH,
        "",
    )?;

    Ok(WsLoginArgs {
        api_key: credentials.api_key().to_string(),
        passphrase: credentials.passphrase().to_string(),
        timestamp,
        sign,
    })
}
