//! REST API client module for OKX.
//!
//! A small signed-request collaborator for the streaming client: server
//! time, clock synchronization, and generic public/private calls that
//! unwrap the OKX response envelope.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use okx_stream::api::{OkxApiClient, TimeSync};
//! use okx_stream::shared::Endpoint;
//!
//! let client = OkxApiClient::new(&Endpoint::live())?;
//! let sync = Arc::new(TimeSync::new());
//! sync.sync(&client).await?;
//!
//! // Sign WebSocket logins with the server-corrected clock
//! let ws = OkxWebSocketClient::builder(Endpoint::live())
//!     .with_timestamp_provider(sync.clone())
//!     .connect_private(credentials)
//!     .await?;
//! ```
//!
//! # Error Handling
//!
//! All methods return `ApiResult<T>` which is an alias for `Result<T, ApiError>`.
//! A non-zero envelope `code` becomes [`ApiError::Api`]:
//!
//! ```rust,ignore
//! match client.get_private::<Vec<serde_json::Value>>("/api/v5/account/balance", &[]).await {
//!     Ok(balances) => println!("{:?}", balances),
//!     Err(ApiError::Api { code, msg }) => println!("OKX rejected the request: {} {}", code, msg),
//!     Err(e) => println!("Other error: {}", e),
//! }
//! ```

pub mod client;
pub mod error;
pub mod time_sync;
pub mod types;

pub use client::{OkxApiClient, OkxApiClientBuilder, RetryConfig};
pub use error::{ApiError, ApiResult};
pub use time_sync::TimeSync;
pub use types::{ApiResponse, ServerTime};
