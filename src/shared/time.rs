//! Timestamp sources used for request signing and WebSocket login.

use chrono::{DateTime, Utc};

/// ISO-8601 format OKX expects in `OK-ACCESS-TIMESTAMP`.
const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Source of signing timestamps.
///
/// Implementations may return local time or time corrected for the clock
/// offset against the exchange (see `api::TimeSync`).
pub trait TimestampProvider: Send + Sync {
    /// Current time as `2024-01-01T12:00:00.000Z`.
    fn timestamp_iso(&self) -> String;

    /// Current time as Unix seconds (WebSocket login).
    fn timestamp_unix_secs(&self) -> i64;
}

/// Local system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalTimeProvider;

impl TimestampProvider for LocalTimeProvider {
    fn timestamp_iso(&self) -> String {
        format_iso(Utc::now())
    }

    fn timestamp_unix_secs(&self) -> i64 {
        Utc::now().timestamp()
    }
}

/// Local clock shifted by a fixed offset (server time minus local time).
#[derive(Debug, Clone, Copy)]
pub struct OffsetTimeProvider {
    offset_ms: i64,
}

impl OffsetTimeProvider {
    pub const fn new(offset_ms: i64) -> Self {
        Self { offset_ms }
    }

    pub const fn offset_ms(&self) -> i64 {
        self.offset_ms
    }

    fn adjusted_now(&self) -> DateTime<Utc> {
        Utc::now() + chrono::Duration::milliseconds(self.offset_ms)
    }
}

impl TimestampProvider for OffsetTimeProvider {
    fn timestamp_iso(&self) -> String {
        format_iso(self.adjusted_now())
    }

    fn timestamp_unix_secs(&self) -> i64 {
        self.adjusted_now().timestamp()
    }
}

/// Current local time in the ISO-8601 signing format.
pub fn current_timestamp() -> String {
    LocalTimeProvider.timestamp_iso()
}

pub(crate) fn format_iso(at: DateTime<Utc>) -> String {
    at.format(ISO_FORMAT).to_string()
}
