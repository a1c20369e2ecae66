use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Transport settings for guest HTTP requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetConfig {
    /// Worker threads for the request runtime.
    pub worker_threads: usize,

    /// Timeout applied when the guest passes none.
    pub default_timeout_ms: u64,

    pub user_agent: String,
}

impl NetConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            worker_threads: 2,
            default_timeout_ms: 30_000,
            user_agent: concat!("hostlink/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}
