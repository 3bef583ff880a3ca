//! Shared type definitions for the OKX SDK.
//!
//! This module contains types that are used by both the REST API and WebSocket modules.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A value outside an enumerated set was supplied.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct InvalidValue(pub String);

// ============================================================================
// CandleInterval (shared between API and WebSocket)
// ============================================================================

/// Candlestick interval.
///
/// Used as the `bar` query parameter on REST and as the `candle{bar}`
/// channel suffix on WebSocket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CandleInterval {
    /// 1 minute candles
    #[default]
    #[serde(rename = "1m")]
    OneMinute,
    /// 5 minute candles
    #[serde(rename = "5m")]
    FiveMinutes,
    /// 15 minute candles
    #[serde(rename = "15m")]
    FifteenMinutes,
    /// 1 hour candles
    #[serde(rename = "1H")]
    OneHour,
    /// 4 hour candles
    #[serde(rename = "4H")]
    FourHours,
    /// 1 day candles
    #[serde(rename = "1D")]
    OneDay,
}

impl CandleInterval {
    pub const ALL: [CandleInterval; 6] = [
        Self::OneMinute,
        Self::FiveMinutes,
        Self::FifteenMinutes,
        Self::OneHour,
        Self::FourHours,
        Self::OneDay,
    ];

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OneMinute => "1m",
            Self::FiveMinutes => "5m",
            Self::FifteenMinutes => "15m",
            Self::OneHour => "1H",
            Self::FourHours => "4H",
            Self::OneDay => "1D",
        }
    }

    /// WebSocket channel name, e.g. `candle1m`.
    pub fn channel_name(&self) -> String {
        format!("candle{}", self.as_str())
    }
}

impl FromStr for CandleInterval {
    type Err = InvalidValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|interval| interval.as_str() == s)
            .ok_or_else(|| {
                InvalidValue(format!(
                    "Invalid interval: {}. Valid values: 1m, 5m, 15m, 1H, 4H, 1D",
                    s
                ))
            })
    }
}

impl std::fmt::Display for CandleInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// BookDepth
// ============================================================================

/// Order book channel variant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum BookDepth {
    /// 400 levels, snapshot then incremental updates every 100ms
    #[default]
    Full,
    /// 5 levels, snapshot every 100ms
    Top5,
    /// 50 levels, tick-by-tick
    Tbt50,
    /// 400 levels, tick-by-tick
    TbtFull,
}

impl BookDepth {
    pub const ALL: [BookDepth; 4] = [Self::Full, Self::Top5, Self::Tbt50, Self::TbtFull];

    /// WebSocket channel name.
    pub fn channel_name(&self) -> &'static str {
        match self {
            Self::Full => "books",
            Self::Top5 => "books5",
            Self::Tbt50 => "books50-l2-tbt",
            Self::TbtFull => "books-l2-tbt",
        }
    }
}

impl FromStr for BookDepth {
    type Err = InvalidValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|depth| depth.channel_name() == s)
            .ok_or_else(|| {
                InvalidValue(format!(
                    "Invalid book depth: {}. Valid values: books, books5, books50-l2-tbt, books-l2-tbt",
                    s
                ))
            })
    }
}

impl std::fmt::Display for BookDepth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.channel_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_parse() {
        assert_eq!("1m".parse::<CandleInterval>(), Ok(CandleInterval::OneMinute));
        assert_eq!("4H".parse::<CandleInterval>(), Ok(CandleInterval::FourHours));
        assert_eq!(CandleInterval::OneDay.channel_name(), "candle1D");
    }

    #[test]
    fn test_interval_rejects_unknown() {
        let err = "invalid".parse::<CandleInterval>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid interval: invalid. Valid values: 1m, 5m, 15m, 1H, 4H, 1D"
        );
        // Case matters: OKX uses lowercase minutes and uppercase hours/days.
        assert!("1h".parse::<CandleInterval>().is_err());
    }

    #[test]
    fn test_interval_serde_matches_wire() {
        let json = serde_json::to_string(&CandleInterval::FifteenMinutes).unwrap();
        assert_eq!(json, "\"15m\"");
    }

    #[test]
    fn test_book_depth_parse() {
        assert_eq!("books5".parse::<BookDepth>(), Ok(BookDepth::Top5));
        assert_eq!(BookDepth::Tbt50.to_string(), "books50-l2-tbt");
        assert!("books10".parse::<BookDepth>().is_err());
    }
}
