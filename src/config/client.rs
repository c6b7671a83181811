use std::time::Duration;

use config::{Config as ConfigBuilder, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use super::{LoggingConfig, RtuConfig, TcpConfig};

/// Top-level client configuration: exactly one of `rtu`/`tcp` is meaningful
/// for a given [`crate::client::ModbusClient`] instance, selected at
/// construction time (spec §4.4) — both are carried here so the same
/// layered-source loading applies regardless of which transport is chosen.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub tcp: TcpConfig,
    pub rtu: RtuConfig,
    pub logging: LoggingConfig,

    /// Bound on outstanding requests before `add_request` rejects with
    /// `RequestQueueFull` (spec §4.3).
    pub queue_capacity: usize,

    /// Default patience for `sync_request` when the caller doesn't override
    /// it per-call (spec §4.4, bounded 10s-60s).
    #[serde(with = "humantime_serde")]
    pub default_sync_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tcp: TcpConfig::default(),
            rtu: RtuConfig::default(),
            logging: LoggingConfig::default(),
            queue_capacity: crate::queue::DEFAULT_CAPACITY,
            default_sync_timeout: Duration::from_secs(10),
        }
    }
}

impl Config {
    /// Environment variable prefix for overrides (`MODBUS_CLIENT_TCP__TARGET_ADDR`, etc).
    const ENV_PREFIX: &'static str = "MODBUS_CLIENT";

    /// Builds configuration from, in ascending priority: built-in defaults,
    /// an optional `config/default.{yaml,json}` file, and `MODBUS_CLIENT_*`
    /// environment variables — the same layering the teacher's relay config
    /// uses, narrowed to this crate's fields.
    pub fn new() -> Result<Self, ConfigError> {
        let defaults = Config::default();

        let builder = ConfigBuilder::builder()
            .set_default("tcp.target_addr", defaults.tcp.target_addr)?
            .set_default("tcp.target_port", defaults.tcp.target_port)?
            .set_default(
                "tcp.connect_timeout",
                format!("{}s", defaults.tcp.connect_timeout.as_secs()),
            )?
            .set_default(
                "tcp.response_timeout",
                format!("{}s", defaults.tcp.response_timeout.as_secs()),
            )?
            .set_default(
                "tcp.min_interval",
                format!("{}ms", defaults.tcp.min_interval.as_millis()),
            )?
            .set_default("rtu.device", defaults.rtu.device)?
            .set_default("rtu.baud_rate", defaults.rtu.baud_rate)?
            .set_default("rtu.data_bits", defaults.rtu.data_bits.to_string())?
            .set_default("rtu.parity", defaults.rtu.parity.to_string())?
            .set_default("rtu.stop_bits", defaults.rtu.stop_bits.to_string())?
            .set_default("rtu.flush_after_write", defaults.rtu.flush_after_write)?
            .set_default(
                "rtu.transaction_timeout",
                format!("{}s", defaults.rtu.transaction_timeout.as_secs()),
            )?
            .set_default("rtu.use_ascii", defaults.rtu.use_ascii)?
            .set_default("rtu.skip_leading_zero", defaults.rtu.skip_leading_zero)?
            .set_default("logging.trace_frames", defaults.logging.trace_frames)?
            .set_default("logging.level", defaults.logging.level)?
            .set_default("logging.format", defaults.logging.format)?
            .set_default("logging.include_location", defaults.logging.include_location)?
            .set_default("logging.thread_ids", defaults.logging.thread_ids)?
            .set_default("logging.thread_names", defaults.logging.thread_names)?
            .set_default("queue_capacity", defaults.queue_capacity as i64)?
            .set_default(
                "default_sync_timeout",
                format!("{}s", defaults.default_sync_timeout.as_secs()),
            )?
            .add_source(File::new("config/default", FileFormat::Yaml).required(false))
            .add_source(
                Environment::with_prefix(Self::ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Loads configuration from a specific file, still layered under env
    /// overrides — used by the demo binary's `--config` flag.
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let defaults = Config::default();
        let builder = ConfigBuilder::builder()
            .set_default("tcp.target_addr", defaults.tcp.target_addr)?
            .set_default("tcp.target_port", defaults.tcp.target_port)?
            .set_default(
                "tcp.connect_timeout",
                format!("{}s", defaults.tcp.connect_timeout.as_secs()),
            )?
            .set_default(
                "tcp.response_timeout",
                format!("{}s", defaults.tcp.response_timeout.as_secs()),
            )?
            .set_default(
                "tcp.min_interval",
                format!("{}ms", defaults.tcp.min_interval.as_millis()),
            )?
            .set_default("rtu.device", defaults.rtu.device)?
            .set_default("rtu.baud_rate", defaults.rtu.baud_rate)?
            .set_default("rtu.data_bits", defaults.rtu.data_bits.to_string())?
            .set_default("rtu.parity", defaults.rtu.parity.to_string())?
            .set_default("rtu.stop_bits", defaults.rtu.stop_bits.to_string())?
            .set_default("rtu.flush_after_write", defaults.rtu.flush_after_write)?
            .set_default(
                "rtu.transaction_timeout",
                format!("{}s", defaults.rtu.transaction_timeout.as_secs()),
            )?
            .set_default("rtu.use_ascii", defaults.rtu.use_ascii)?
            .set_default("rtu.skip_leading_zero", defaults.rtu.skip_leading_zero)?
            .set_default("logging.trace_frames", defaults.logging.trace_frames)?
            .set_default("logging.level", defaults.logging.level)?
            .set_default("logging.format", defaults.logging.format)?
            .set_default("logging.include_location", defaults.logging.include_location)?
            .set_default("logging.thread_ids", defaults.logging.thread_ids)?
            .set_default("logging.thread_names", defaults.logging.thread_names)?
            .set_default("queue_capacity", defaults.queue_capacity as i64)?
            .set_default(
                "default_sync_timeout",
                format!("{}s", defaults.default_sync_timeout.as_secs()),
            )?
            .add_source(File::new(path, FileFormat::Yaml))
            .add_source(
                Environment::with_prefix(Self::ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[serial_test::serial]
    fn defaults_load_without_a_config_file() {
        let config = Config::new().unwrap();
        assert_eq!(config.tcp.target_port, 502);
        assert_eq!(config.queue_capacity, crate::queue::DEFAULT_CAPACITY);
    }

    #[test]
    #[serial_test::serial]
    fn env_override_wins_over_defaults() {
        std::env::set_var("MODBUS_CLIENT_TCP__TARGET_PORT", "1502");
        let config = Config::new().unwrap();
        assert_eq!(config.tcp.target_port, 1502);
        std::env::remove_var("MODBUS_CLIENT_TCP__TARGET_PORT");
    }
}
