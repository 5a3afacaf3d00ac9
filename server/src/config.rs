//! Point server configuration.

use std::time::Duration;

use pointledger_common::time::constants;

/// How user ids map onto mutexes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockStrategy {
    /// One mutex per user id, created on first use and never evicted.
    PerKey,
    /// Fixed pool of mutexes indexed by `hash(id) % stripes`. Memory stays
    /// bounded; unrelated users may share a stripe.
    Striped { stripes: usize },
}

/// Whether balance and history reads take the user's lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadConsistency {
    /// Reads go straight to the store and may observe an in-flight mutation.
    Relaxed,
    /// Reads serialize with writers on the same user.
    Locked,
}

impl ReadConsistency {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "relaxed" => Some(ReadConsistency::Relaxed),
            "locked" => Some(ReadConsistency::Locked),
            _ => None,
        }
    }
}

/// Lock configuration.
#[derive(Debug, Clone)]
pub struct LockConfig {
    /// Bound on waiting for a user's lock.
    pub acquire_timeout: Duration,
    /// Key-to-mutex mapping.
    pub strategy: LockStrategy,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            acquire_timeout: constants::lock_acquisition_timeout(),
            strategy: LockStrategy::PerKey,
        }
    }
}

/// Main server configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Listen address.
    pub listen_addr: String,
    /// Listen port.
    pub listen_port: u16,
    /// Lock configuration.
    pub lock_config: LockConfig,
    /// Read locking policy.
    pub read_consistency: ReadConsistency,
    /// Artificial latency of the in-memory stores.
    pub store_latency: Duration,
    /// Log level used when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0".to_string(),
            listen_port: 8080,
            lock_config: LockConfig::default(),
            read_consistency: ReadConsistency::Relaxed,
            store_latency: Duration::ZERO,
            log_level: "info".to_string(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup. Unparseable values
    /// keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = lookup("POINT_LISTEN_ADDR") {
            config.listen_addr = addr;
        }

        if let Some(port) = lookup("POINT_LISTEN_PORT").and_then(|p| p.parse().ok()) {
            config.listen_port = port;
        }

        if let Some(ms) = lookup("POINT_LOCK_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            config.lock_config.acquire_timeout = Duration::from_millis(ms);
        }

        if let Some(stripes) = lookup("POINT_LOCK_STRIPES").and_then(|v| v.parse().ok()) {
            config.lock_config.strategy = LockStrategy::Striped { stripes };
        }

        if let Some(mode) = lookup("POINT_READ_CONSISTENCY").and_then(|v| ReadConsistency::parse(&v)) {
            config.read_consistency = mode;
        }

        if let Some(ms) = lookup("POINT_STORE_LATENCY_MS").and_then(|v| v.parse().ok()) {
            config.store_latency = Duration::from_millis(ms);
        }

        if let Some(level) = lookup("LOG_LEVEL") {
            config.log_level = level;
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.listen_port == 0 {
            return Err("Listen port cannot be 0".to_string());
        }

        if self.lock_config.acquire_timeout.is_zero() {
            return Err("Lock acquire timeout must be positive".to_string());
        }

        if let LockStrategy::Striped { stripes } = self.lock_config.strategy {
            if stripes == 0 {
                return Err("Lock stripe count must be positive".to_string());
            }
        }

        Ok(())
    }

    /// Socket address string to bind.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.listen_addr, self.listen_port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = ServiceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.lock_config.acquire_timeout, Duration::from_secs(5));
        assert_eq!(config.lock_config.strategy, LockStrategy::PerKey);
        assert_eq!(config.read_consistency, ReadConsistency::Relaxed);
    }

    #[test]
    fn test_invalid_config() {
        let mut config = ServiceConfig::default();
        config.listen_port = 0;
        assert!(config.validate().is_err());

        let mut config = ServiceConfig::default();
        config.lock_config.strategy = LockStrategy::Striped { stripes: 0 };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_lookup_overrides() {
        let config = ServiceConfig::from_lookup(lookup_from(&[
            ("POINT_LISTEN_PORT", "9000"),
            ("POINT_LOCK_TIMEOUT_MS", "250"),
            ("POINT_LOCK_STRIPES", "64"),
            ("POINT_READ_CONSISTENCY", "Locked"),
            ("POINT_STORE_LATENCY_MS", "not-a-number"),
        ]));

        assert_eq!(config.listen_port, 9000);
        assert_eq!(config.lock_config.acquire_timeout, Duration::from_millis(250));
        assert_eq!(config.lock_config.strategy, LockStrategy::Striped { stripes: 64 });
        assert_eq!(config.read_consistency, ReadConsistency::Locked);
        assert_eq!(config.store_latency, Duration::ZERO);
        assert_eq!(config.bind_addr(), "0.0.0.0:9000");
    }
}
