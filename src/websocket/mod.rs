//! WebSocket streaming client for the OKX v5 API.
//!
//! One [`OkxWebSocketClient`] multiplexes any number of channel
//! subscriptions over a single connection. Subscriptions are tracked and
//! replayed after every reconnect, keepalive runs in the background, and
//! inbound frames are decoded once into [`InboundMessage`] variants.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use okx_stream::prelude::*;
//!
//! let client = OkxWebSocketClient::connect_public(&Endpoint::live(), None).await?;
//! client.subscribe_tickers("BTC-USDT").await?;
//! client.subscribe_candles("BTC-USDT", "1m").await?;
//!
//! while let Some(message) = client.receive().await {
//!     match message {
//!         InboundMessage::Data(data) => println!("{} -> {} records", data.arg, data.data.len()),
//!         InboundMessage::Event(event) => println!("event: {:?}", event.kind),
//!     }
//! }
//! ```
//!
//! # Private channels
//!
//! ```rust,ignore
//! let credentials = Credentials::new("api-key", "secret", "passphrase");
//! let client = OkxWebSocketClient::connect_private(&Endpoint::live(), credentials, Some(5)).await?;
//! client.subscribe_orders("SPOT", None).await?;
//! ```
//!
//! # Flow control
//!
//! Messages wait in a bounded queue until [`OkxWebSocketClient::receive`]
//! takes them. With [`OverflowPolicy::Block`] a slow consumer stalls the
//! socket read loop; with [`OverflowPolicy::DropOldest`] the oldest queued
//! message is discarded instead.

pub mod channels;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod handlers;
pub mod queue;
pub mod reconnect;
pub mod subscriptions;
pub mod types;

pub use client::{OkxWebSocketClient, OkxWebSocketClientBuilder};
pub use config::WebSocketConfig;
pub use connection::{ConnectionMode, ConnectionState};
pub use error::{WebSocketError, WsResult};
pub use handlers::{decode, MessageRouter, Routed};
pub use queue::{OverflowPolicy, PendingQueue};
pub use reconnect::ReconnectPolicy;
pub use subscriptions::SubscriptionRegistry;
pub use types::{
    DataMessage, EventKind, EventMessage, InboundMessage, Op, RawWsMessage, Subscription,
    WsRequest,
};
