//! Response types for the OKX REST API.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Success code in the response envelope.
pub const SUCCESS_CODE: &str = "0";

/// `{"code": "0", "msg": "", "data": [...]}` envelope every OKX response uses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T = Value> {
    pub code: String,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE
    }
}

/// `GET /api/v5/public/time`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerTime {
    /// Milliseconds since the Unix epoch, as a string
    pub ts: String,
}

impl ServerTime {
    pub fn ts_millis(&self) -> Option<i64> {
        self.ts.parse().ok()
    }
}
