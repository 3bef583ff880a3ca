//! # okx-stream
//!
//! A Rust SDK for streaming OKX v5 market and account data.
//!
//! ## Modules
//!
//! - [`websocket`]: Resilient multiplexed WebSocket client (subscriptions,
//!   keepalive, automatic reconnect with replay, bounded delivery queue)
//! - [`api`]: Signed REST collaborator (server time, clock sync, generic calls)
//! - [`auth`]: Request signing and WebSocket login arguments
//! - [`shared`]: Credentials, endpoints, timestamp providers and channel parameter types
//! - [`network`]: Production and demo-trading URLs
//!
//! ## Quick Start - Streaming
//!
//! ```rust,ignore
//! use okx_stream::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), WebSocketError> {
//!     let client = OkxWebSocketClient::connect_public(&Endpoint::live(), Some(10)).await?;
//!     client.subscribe_tickers("BTC-USDT").await?;
//!     client.subscribe_books("ETH-USDT", "books5").await?;
//!
//!     while let Some(message) = client.receive().await {
//!         match message {
//!             InboundMessage::Data(data) => println!("{}: {:?}", data.arg, data.data),
//!             InboundMessage::Event(event) => println!("{:?}: {:?}", event.kind, event.msg),
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Quick Start - REST
//!
//! ```rust,ignore
//! use okx_stream::prelude::*;
//!
//! let client = OkxApiClient::new(&Endpoint::live())?;
//! let time = client.get_server_time().await?;
//! println!("Server time: {}", time.ts);
//! ```
//!
//! The crate logs through `tracing` and never installs a subscriber.

// ============================================================================
// MODULES
// ============================================================================

/// Shared utilities, types, and constants.
/// Used across all SDK modules.
pub mod shared;

/// Network URL constants (API and WebSocket endpoints).
pub mod network;

/// HMAC-SHA256 request signing and WebSocket login arguments.
pub mod auth;

/// REST API client (server time, signed generic requests).
#[cfg(feature = "api")]
pub mod api;

/// WebSocket client module for real-time data streaming.
#[cfg(feature = "websocket")]
pub mod websocket;

/// Synchronous wrapper around the WebSocket client.
#[cfg(feature = "blocking")]
pub mod blocking;

// ============================================================================
// PRELUDE
// ============================================================================

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use okx_stream::prelude::*;
/// ```
pub mod prelude {
    // Network constants
    pub use crate::network::{
        DEFAULT_API_URL, DEFAULT_WS_PRIVATE_URL, DEFAULT_WS_PUBLIC_URL, SIMULATED_WS_PRIVATE_URL,
        SIMULATED_WS_PUBLIC_URL,
    };

    // Auth module exports
    pub use crate::auth::{AuthError, AuthResult, WsLoginArgs};

    // Shared utilities (used by both API and WebSocket)
    pub use crate::shared::{
        current_timestamp, BookDepth, CandleInterval, Credentials, Endpoint, InvalidValue,
        LocalTimeProvider, OffsetTimeProvider, TimestampProvider,
    };

    // API module exports
    #[cfg(feature = "api")]
    pub use crate::api::{
        ApiError, ApiResponse, ApiResult, OkxApiClient, OkxApiClientBuilder, RetryConfig,
        ServerTime, TimeSync,
    };

    // WebSocket module exports
    #[cfg(feature = "websocket")]
    pub use crate::websocket::{
        ConnectionMode, ConnectionState, DataMessage, EventKind, EventMessage, InboundMessage,
        OkxWebSocketClient, OkxWebSocketClientBuilder, OverflowPolicy, ReconnectPolicy,
        Subscription, WebSocketConfig, WebSocketError, WsResult,
    };

    #[cfg(feature = "blocking")]
    pub use crate::blocking::BlockingClient;
}
