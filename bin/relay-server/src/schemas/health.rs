use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Always `"ok"` when the process answers.
    pub status: String,
    /// RFC 3339 server time.
    pub timestamp: String,
    /// Seconds since startup.
    pub uptime: u64,
    /// `"configured"` or `"missing"`.
    pub api_key: String,
    /// Active provider, e.g. `"cloudconvert"`.
    pub provider: String,
    pub version: String,
}
