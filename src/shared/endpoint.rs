//! Endpoint selection: live or simulated (demo) environment.

use crate::network::{
    DEFAULT_API_URL, DEFAULT_WS_PRIVATE_URL, DEFAULT_WS_PUBLIC_URL, SIMULATED_TRADING_HEADER,
    SIMULATED_WS_PRIVATE_URL, SIMULATED_WS_PUBLIC_URL,
};

/// Target URLs for REST and WebSocket traffic.
///
/// The `simulated` flag selects the parallel demo-trading environment. It
/// switches the WebSocket URLs and adds the `x-simulated-trading: 1` header
/// to every REST request and WebSocket upgrade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    rest_url: String,
    ws_public_url: String,
    ws_private_url: String,
    simulated: bool,
}

impl Default for Endpoint {
    fn default() -> Self {
        Self::live()
    }
}

impl Endpoint {
    /// Production endpoints.
    pub fn live() -> Self {
        Self {
            rest_url: DEFAULT_API_URL.to_string(),
            ws_public_url: DEFAULT_WS_PUBLIC_URL.to_string(),
            ws_private_url: DEFAULT_WS_PRIVATE_URL.to_string(),
            simulated: false,
        }
    }

    /// Demo-trading endpoints.
    pub fn simulated() -> Self {
        Self {
            rest_url: DEFAULT_API_URL.to_string(),
            ws_public_url: SIMULATED_WS_PUBLIC_URL.to_string(),
            ws_private_url: SIMULATED_WS_PRIVATE_URL.to_string(),
            simulated: true,
        }
    }

    /// Override the REST base URL.
    pub fn with_rest_url(mut self, url: impl Into<String>) -> Self {
        self.rest_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Override the public WebSocket URL.
    pub fn with_ws_public_url(mut self, url: impl Into<String>) -> Self {
        self.ws_public_url = url.into();
        self
    }

    /// Override the private WebSocket URL.
    pub fn with_ws_private_url(mut self, url: impl Into<String>) -> Self {
        self.ws_private_url = url.into();
        self
    }

    pub fn rest_url(&self) -> &str {
        &self.rest_url
    }

    pub fn ws_public_url(&self) -> &str {
        &self.ws_public_url
    }

    pub fn ws_private_url(&self) -> &str {
        &self.ws_private_url
    }

    pub fn is_simulated(&self) -> bool {
        self.simulated
    }

    /// Extra headers required by this environment.
    pub fn extra_headers(&self) -> Vec<(&'static str, &'static str)> {
        if self.simulated {
            vec![(SIMULATED_TRADING_HEADER, "1")]
        } else {
            Vec::new()
        }
    }
}
