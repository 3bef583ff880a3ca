//! Clock synchronization against the OKX server time.
//!
//! OKX rejects signatures whose timestamp drifts too far from its own clock.
//! [`TimeSync`] estimates the offset once (or periodically, at the caller's
//! discretion) and then acts as a [`TimestampProvider`] for both REST
//! signing and WebSocket login.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use chrono::Utc;

use crate::api::client::OkxApiClient;
use crate::api::error::{ApiError, ApiResult};
use crate::shared::{OffsetTimeProvider, TimestampProvider};

/// Server clock offset, shareable across clients via `Arc`.
#[derive(Debug, Default)]
pub struct TimeSync {
    offset_ms: AtomicI64,
    synced: AtomicBool,
}

impl TimeSync {
    pub fn new() -> Self {
        Self::default()
    }

    /// Measure the offset: server time minus the midpoint of the round trip.
    pub async fn sync(&self, client: &OkxApiClient) -> ApiResult<i64> {
        let sent_at = Utc::now().timestamp_millis();
        let server = client.get_server_time().await?;
        let received_at = Utc::now().timestamp_millis();

        let server_ms = server
            .ts_millis()
            .ok_or_else(|| ApiError::Deserialize(format!("invalid server timestamp: {}", server.ts)))?;
        let offset = estimate_offset(sent_at, received_at, server_ms);

        self.offset_ms.store(offset, Ordering::SeqCst);
        self.synced.store(true, Ordering::SeqCst);
        tracing::debug!(
            offset_ms = offset,
            rtt_ms = received_at - sent_at,
            "Synchronized with server clock"
        );
        Ok(offset)
    }

    pub fn offset_ms(&self) -> i64 {
        self.offset_ms.load(Ordering::SeqCst)
    }

    pub fn is_synced(&self) -> bool {
        self.synced.load(Ordering::SeqCst)
    }

    fn provider(&self) -> OffsetTimeProvider {
        OffsetTimeProvider::new(self.offset_ms())
    }
}

impl TimestampProvider for TimeSync {
    fn timestamp_iso(&self) -> String {
        self.provider().timestamp_iso()
    }

    fn timestamp_unix_secs(&self) -> i64 {
        self.provider().timestamp_unix_secs()
    }
}

fn estimate_offset(sent_at_ms: i64, received_at_ms: i64, server_ms: i64) -> i64 {
    let midpoint = sent_at_ms + (received_at_ms - sent_at_ms) / 2;
    server_ms - midpoint
}
