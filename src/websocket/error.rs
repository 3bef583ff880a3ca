//! WebSocket-specific error types for the OKX SDK.

use thiserror::Error;

/// WebSocket-specific errors
#[derive(Debug, Clone, Error)]
pub enum WebSocketError {
    /// Transport could not be established
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Server closed the connection
    #[error("Connection closed unexpectedly: code {code}, reason: {reason}")]
    ConnectionClosed { code: u16, reason: String },

    /// Malformed inbound frame
    #[error("Failed to parse message: {0}")]
    MessageParseError(String),

    /// No pong within the grace period
    #[error("Pong timeout: no pong received within {0}ms")]
    PongTimeout(u64),

    /// WebSocket protocol error
    #[error("WebSocket protocol error: {0}")]
    Protocol(String),

    /// Operation requires the `Ready` state
    #[error("Not connected to WebSocket server")]
    NotConnected,

    /// Send failed
    #[error("Failed to send message: {0}")]
    SendFailed(String),

    /// Internal channel closed
    #[error("Internal channel closed")]
    ChannelClosed,

    /// Invalid URL
    #[error("Invalid WebSocket URL: {0}")]
    InvalidUrl(String),

    /// Timeout
    #[error("Operation timed out")]
    Timeout,

    /// IO error
    #[error("IO error: {0}")]
    Io(String),

    /// Login rejected or timed out
    #[error("Authentication failed: {message} (code: {code})")]
    AuthenticationFailed { code: String, message: String },

    /// Private channel on a public connection
    #[error("Authentication required for private channel: {0}")]
    AuthRequired(String),

    /// Caller-supplied value failed local validation
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Signing failure
    #[error("Signing error: {0}")]
    Signing(String),

    /// Automatic reconnect gave up
    #[error("Reconnect failed after {attempts} attempt(s): {last_error}")]
    ReconnectExhausted { attempts: u32, last_error: String },

    /// Upgrade request rejected with an HTTP response
    #[error("HTTP error during upgrade: {0}")]
    HttpError(String),
}

impl WebSocketError {
    /// Login failures: not retried automatically.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Self::AuthenticationFailed { .. } | Self::Signing(_))
    }

    /// Failures the reconnect policy recovers from.
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed(_)
                | Self::ConnectionClosed { .. }
                | Self::PongTimeout(_)
                | Self::Protocol(_)
                | Self::Timeout
                | Self::Io(_)
                | Self::HttpError(_)
                | Self::SendFailed(_)
        )
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for WebSocketError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error;
        match err {
            Error::ConnectionClosed => WebSocketError::ConnectionClosed {
                code: 1000,
                reason: "Connection closed normally".to_string(),
            },
            Error::AlreadyClosed => WebSocketError::NotConnected,
            Error::Io(e) => WebSocketError::Io(e.to_string()),
            Error::Protocol(e) => WebSocketError::Protocol(e.to_string()),
            Error::Url(e) => WebSocketError::InvalidUrl(e.to_string()),
            Error::Http(resp) => WebSocketError::HttpError(format!("{:?}", resp.status())),
            Error::HttpFormat(e) => WebSocketError::ConnectionFailed(e.to_string()),
            other => WebSocketError::Protocol(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for WebSocketError {
    fn from(err: serde_json::Error) -> Self {
        WebSocketError::MessageParseError(err.to_string())
    }
}

impl From<crate::auth::AuthError> for WebSocketError {
    fn from(err: crate::auth::AuthError) -> Self {
        WebSocketError::Signing(err.to_string())
    }
}

impl From<crate::shared::InvalidValue> for WebSocketError {
    fn from(err: crate::shared::InvalidValue) -> Self {
        WebSocketError::InvalidParameter(err.0)
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for WebSocketError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        WebSocketError::ChannelClosed
    }
}

/// Result type alias for WebSocket operations
pub type WsResult<T> = Result<T, WebSocketError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let auth = WebSocketError::AuthenticationFailed {
            code: "60009".to_string(),
            message: "Login failed.".to_string(),
        };
        assert!(auth.is_auth_error());
        assert!(!auth.is_transport_error());

        assert!(WebSocketError::PongTimeout(10_000).is_transport_error());
        assert!(WebSocketError::Io("reset".to_string()).is_transport_error());
        assert!(!WebSocketError::InvalidParameter("bar".to_string()).is_transport_error());
    }

    #[test]
    fn test_from_tungstenite() {
        use tokio_tungstenite::tungstenite::Error;
        assert!(matches!(
            WebSocketError::from(Error::ConnectionClosed),
            WebSocketError::ConnectionClosed { code: 1000, .. }
        ));
        assert!(matches!(
            WebSocketError::from(Error::AlreadyClosed),
            WebSocketError::NotConnected
        ));
    }

    #[tokio::test]
    async fn test_from_closed_command_channel() {
        let (tx, rx) = tokio::sync::mpsc::channel::<u8>(1);
        drop(rx);
        let err: WebSocketError = tx.send(1).await.unwrap_err().into();
        assert!(matches!(err, WebSocketError::ChannelClosed));
        assert!(!err.is_auth_error());
    }

    #[test]
    fn test_display() {
        let err = WebSocketError::AuthenticationFailed {
            code: "60009".to_string(),
            message: "Login failed.".to_string(),
        };
        assert_eq!(err.to_string(), "Authentication failed: Login failed. (code: 60009)");
    }
}
