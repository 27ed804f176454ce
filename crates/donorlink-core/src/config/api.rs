//! REST backend configuration.

use serde::{Deserialize, Serialize};

/// Settings for the HTTP gateway to the matching backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL every endpoint path is appended to.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Whole-request timeout in seconds (transport-level only).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
    /// TCP connect timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
    /// Header carrying the caller's user id.
    #[serde(default = "default_user_id_header")]
    pub user_id_header: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_seconds: default_request_timeout(),
            connect_timeout_seconds: default_connect_timeout(),
            user_id_header: default_user_id_header(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8080/api".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_user_id_header() -> String {
    "X-User-Id".to_string()
}
