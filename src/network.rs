//! Network URL constants for the OKX v5 API.

/// Default REST API base URL.
pub const DEFAULT_API_URL: &str = "https://www.okx.com";

/// Public WebSocket URL (market data channels).
pub const DEFAULT_WS_PUBLIC_URL: &str = "wss://ws.okx.com:8443/ws/v5/public";

/// Private WebSocket URL (account, positions, orders).
pub const DEFAULT_WS_PRIVATE_URL: &str = "wss://ws.okx.com:8443/ws/v5/private";

/// Public WebSocket URL for demo trading.
pub const SIMULATED_WS_PUBLIC_URL: &str = "wss://wspap.okx.com:8443/ws/v5/public?brokerId=9999";

/// Private WebSocket URL for demo trading.
pub const SIMULATED_WS_PRIVATE_URL: &str = "wss://wspap.okx.com:8443/ws/v5/private?brokerId=9999";

/// Header that routes a request to the demo trading environment.
pub const SIMULATED_TRADING_HEADER: &str = "x-simulated-trading";
