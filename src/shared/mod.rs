//! Shared utilities and types used across API and WebSocket modules.

pub mod credentials;
pub mod endpoint;
pub mod time;
pub mod types;

// Re-export commonly used items
pub use credentials::Credentials;
pub use endpoint::Endpoint;
pub use time::{current_timestamp, LocalTimeProvider, OffsetTimeProvider, TimestampProvider};
pub use types::*;
