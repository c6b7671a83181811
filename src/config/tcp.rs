use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Target endpoint for a Modbus TCP client connection (spec §4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub target_addr: String,
    pub target_port: u16,

    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// Per-transaction timeout (write + wait-for-reply), the TCP analogue
    /// of `RtuConfig::transaction_timeout` (spec.md's "default response
    /// timeout 2000 ms").
    #[serde(with = "humantime_serde")]
    pub response_timeout: Duration,

    /// Minimum spacing enforced between consecutive transmissions (spec.md's
    /// "default minimum inter-request interval (TCP) 200 ms").
    #[serde(with = "humantime_serde")]
    pub min_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target_addr: "127.0.0.1".to_string(),
            target_port: 502,
            connect_timeout: Duration::from_secs(5),
            response_timeout: Duration::from_secs(2),
            min_interval: Duration::from_millis(200),
        }
    }
}

impl Config {
    pub fn target_description(&self) -> String {
        format!("{}:{}", self.target_addr, self.target_port)
    }
}
