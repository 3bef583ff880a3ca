//! Channel catalog: typed constructors for the supported OKX channels.
//!
//! Every constructor produces a plain [`Subscription`]; callers that need a
//! channel not listed here can build one with [`Subscription::new`].

use crate::shared::{BookDepth, CandleInterval};
use crate::websocket::types::Subscription;

/// Channels served only on the private endpoint after login.
pub const PRIVATE_CHANNELS: &[&str] = &[
    "account",
    "positions",
    "balance_and_position",
    "orders",
    "orders-algo",
    "algo-advance",
    "liquidation-warning",
    "account-greeks",
];

impl Subscription {
    // ── Public ──────────────────────────────────────────────────────────────

    /// Ticker for an instrument.
    pub fn tickers(inst_id: impl Into<String>) -> Self {
        Self::new("tickers").with_param("instId", inst_id)
    }

    /// Public trades for an instrument.
    pub fn trades(inst_id: impl Into<String>) -> Self {
        Self::new("trades").with_param("instId", inst_id)
    }

    /// Candlesticks for an instrument at the given interval.
    pub fn candles(inst_id: impl Into<String>, interval: CandleInterval) -> Self {
        Self::new(interval.channel_name()).with_param("instId", inst_id)
    }

    /// Order book for an instrument at the given depth.
    pub fn books(inst_id: impl Into<String>, depth: BookDepth) -> Self {
        Self::new(depth.channel_name()).with_param("instId", inst_id)
    }

    /// Mark price for a derivative instrument.
    pub fn mark_price(inst_id: impl Into<String>) -> Self {
        Self::new("mark-price").with_param("instId", inst_id)
    }

    /// Index ticker, e.g. `BTC-USD`.
    pub fn index_tickers(inst_id: impl Into<String>) -> Self {
        Self::new("index-tickers").with_param("instId", inst_id)
    }

    /// Funding rate for a perpetual swap.
    pub fn funding_rate(inst_id: impl Into<String>) -> Self {
        Self::new("funding-rate").with_param("instId", inst_id)
    }

    // ── Private ─────────────────────────────────────────────────────────────

    /// Account balances, optionally for one currency.
    pub fn account(ccy: Option<impl Into<String>>) -> Self {
        Self::new("account").with_optional_param("ccy", ccy)
    }

    /// Positions for an instrument type (`MARGIN`, `SWAP`, `FUTURES`, `OPTION`, `ANY`).
    pub fn positions(inst_type: impl Into<String>, inst_id: Option<impl Into<String>>) -> Self {
        Self::new("positions")
            .with_param("instType", inst_type)
            .with_optional_param("instId", inst_id)
    }

    /// Order updates for an instrument type.
    pub fn orders(inst_type: impl Into<String>, inst_id: Option<impl Into<String>>) -> Self {
        Self::new("orders")
            .with_param("instType", inst_type)
            .with_optional_param("instId", inst_id)
    }

    /// Algo order updates for an instrument type.
    pub fn orders_algo(inst_type: impl Into<String>, inst_id: Option<impl Into<String>>) -> Self {
        Self::new("orders-algo")
            .with_param("instType", inst_type)
            .with_optional_param("instId", inst_id)
    }

    /// Combined balance and position updates.
    pub fn balance_and_position() -> Self {
        Self::new("balance_and_position")
    }

    /// Whether this channel needs an authenticated connection.
    pub fn is_private(&self) -> bool {
        PRIVATE_CHANNELS.contains(&self.channel.as_str())
    }
}
