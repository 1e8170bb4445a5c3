//! Server configuration from the command line.

use crate::storage::{ExpiryConfig, StoreConfig, DEFAULT_MAX_KEYS};
use crate::{DEFAULT_HOST, DEFAULT_PORT};
use clap::Parser;
use std::time::Duration;

/// tidekv - in-memory data-structure server speaking RESP2
#[derive(Debug, Clone, Parser)]
#[command(name = "tidekv", author, version, about, long_about = None)]
pub struct Config {
    /// Host to bind to
    #[arg(long, default_value = DEFAULT_HOST)]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Maximum number of resident keys before LRU eviction kicks in
    #[arg(long, default_value_t = DEFAULT_MAX_KEYS)]
    pub max_keys: usize,

    /// Milliseconds between active expiry rounds
    #[arg(long, default_value_t = 100)]
    pub sweep_interval_ms: u64,

    /// Keys sampled per active expiry round
    #[arg(long, default_value_t = 20)]
    pub sweep_sample_size: usize,

    /// Log filter, e.g. `info` or `tidekv=debug` (RUST_LOG wins when set)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            max_keys: DEFAULT_MAX_KEYS,
            sweep_interval_ms: 100,
            sweep_sample_size: 20,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig {
            max_keys: self.max_keys.max(1),
        }
    }

    pub fn expiry_config(&self) -> ExpiryConfig {
        ExpiryConfig {
            interval: Duration::from_millis(self.sweep_interval_ms.max(1)),
            sample_size: self.sweep_sample_size.max(1),
            ..ExpiryConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_library_defaults() {
        let config = Config::try_parse_from(["tidekv"]).unwrap();
        assert_eq!(config.bind_address(), "127.0.0.1:6379");
        assert_eq!(config.store_config().max_keys, StoreConfig::default().max_keys);

        let expiry = config.expiry_config();
        let default = ExpiryConfig::default();
        assert_eq!(expiry.interval, default.interval);
        assert_eq!(expiry.sample_size, default.sample_size);
        assert_eq!(expiry.max_iterations, default.max_iterations);
    }

    #[test]
    fn test_flags() {
        let config = Config::try_parse_from([
            "tidekv",
            "--host",
            "0.0.0.0",
            "-p",
            "7000",
            "--max-keys",
            "10",
            "--sweep-interval-ms",
            "250",
            "--sweep-sample-size",
            "5",
            "--log-level",
            "debug",
        ])
        .unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:7000");
        assert_eq!(config.store_config().max_keys, 10);
        assert_eq!(config.expiry_config().interval, Duration::from_millis(250));
        assert_eq!(config.expiry_config().sample_size, 5);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_zero_values_are_clamped() {
        let config = Config {
            max_keys: 0,
            sweep_interval_ms: 0,
            sweep_sample_size: 0,
            ..Config::default()
        };
        assert_eq!(config.store_config().max_keys, 1);
        assert_eq!(config.expiry_config().interval, Duration::from_millis(1));
        assert_eq!(config.expiry_config().sample_size, 1);
    }

    #[test]
    fn test_rejects_bad_port() {
        assert!(Config::try_parse_from(["tidekv", "--port", "nope"]).is_err());
    }
}
