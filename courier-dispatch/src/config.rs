//! Dispatch queue configuration

use std::time::Duration;

use serde::Deserialize;

const fn default_rate_limit_per_minute() -> u32 {
    60
}

const fn default_retry_delay_ms() -> u64 {
    5_000
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_send_timeout_ms() -> u64 {
    30_000
}

/// Configuration for the dispatch queue and its drain worker.
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    /// Maximum sends per minute. The worker enforces a minimum interval
    /// of `60000ms / rate_limit_per_minute` between transport sends.
    #[serde(default = "default_rate_limit_per_minute")]
    pub rate_limit_per_minute: u32,

    /// Fixed delay before re-attempting after a transient failure.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Retry bound for counted (non-transient) failures. A job is
    /// rejected once its retry count reaches this bound.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Upper bound on a single transport send. A send that takes longer
    /// is abandoned and consumes a retry, so a hung relay cannot block
    /// the queue head indefinitely.
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            rate_limit_per_minute: default_rate_limit_per_minute(),
            retry_delay_ms: default_retry_delay_ms(),
            max_retries: default_max_retries(),
            send_timeout_ms: default_send_timeout_ms(),
        }
    }
}

impl DispatchConfig {
    /// Minimum interval between consecutive transport sends.
    #[must_use]
    pub fn min_send_interval(&self) -> Duration {
        Duration::from_millis(60_000 / u64::from(self.rate_limit_per_minute.max(1)))
    }

    /// Delay applied after a transient failure.
    #[must_use]
    pub const fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Per-send timeout.
    #[must_use]
    pub const fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interval_derived_from_rate() {
        let config = DispatchConfig {
            rate_limit_per_minute: 60,
            ..DispatchConfig::default()
        };
        assert_eq!(config.min_send_interval(), Duration::from_secs(1));

        let config = DispatchConfig {
            rate_limit_per_minute: 1,
            ..DispatchConfig::default()
        };
        assert_eq!(config.min_send_interval(), Duration::from_secs(60));
    }

    #[test]
    fn zero_rate_is_clamped() {
        let config = DispatchConfig {
            rate_limit_per_minute: 0,
            ..DispatchConfig::default()
        };
        assert_eq!(config.min_send_interval(), Duration::from_secs(60));
    }

    #[test]
    fn defaults_fill_missing_toml_fields() {
        let config: DispatchConfig = toml::from_str("rate_limit_per_minute = 10")
            .expect("partial config should deserialize");
        assert_eq!(config.rate_limit_per_minute, 10);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.retry_delay_ms, 5_000);
    }
}
