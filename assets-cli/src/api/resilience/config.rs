//! Resilience configuration with builder pattern
//!
//! Groups retry, concurrency and monitoring settings for the request
//! executor and the mass-update coordinator, with presets for common setups.

use super::retry::RetryConfig;
use log::LevelFilter;
use std::time::Duration;

/// Workers used by a mass update when the caller does not choose
pub const DEFAULT_WORKERS: usize = 5;

/// Upper bound on workers, so a batch cannot flood the service
pub const MAX_WORKERS: usize = 50;

#[derive(Debug, Clone, Default)]
pub struct ResilienceConfig {
    pub retry: RetryConfig,
    pub concurrency: ConcurrencyConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone)]
pub struct ConcurrencyConfig {
    /// Default worker count for mass updates
    pub workers: usize,
    /// Maximum HTTP requests in flight across the whole client
    pub max_concurrent_requests: usize,
    /// Whether the client-wide request cap is enforced
    pub enabled: bool,
}

#[derive(Debug, Clone)]
pub struct MonitoringConfig {
    /// Log each outgoing request at debug level
    pub request_logging: bool,
    pub log_level: LogLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Some(LogLevel::Error),
            "warn" | "warning" => Some(LogLevel::Warn),
            "info" => Some(LogLevel::Info),
            "debug" => Some(LogLevel::Debug),
            "trace" => Some(LogLevel::Trace),
            _ => None,
        }
    }
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            max_concurrent_requests: MAX_WORKERS,
            enabled: true,
        }
    }
}

impl ConcurrencyConfig {
    /// Clamp a requested worker count into `1..=MAX_WORKERS`
    pub fn clamp_workers(requested: usize) -> usize {
        requested.clamp(1, MAX_WORKERS)
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            request_logging: true,
            log_level: LogLevel::Warn,
        }
    }
}

impl ResilienceConfig {
    pub fn builder() -> ResilienceConfigBuilder {
        ResilienceConfigBuilder::new()
    }

    /// Fewer, slower retries and a small worker pool
    pub fn conservative() -> Self {
        Self {
            retry: RetryConfig::conservative(),
            concurrency: ConcurrencyConfig {
                workers: 2,
                max_concurrent_requests: 10,
                enabled: true,
            },
            monitoring: MonitoringConfig {
                request_logging: true,
                log_level: LogLevel::Warn,
            },
        }
    }

    /// More retries and workers, for large batches on a quiet workspace
    pub fn aggressive() -> Self {
        Self {
            retry: RetryConfig::aggressive(),
            concurrency: ConcurrencyConfig {
                workers: 20,
                max_concurrent_requests: MAX_WORKERS,
                enabled: true,
            },
            monitoring: MonitoringConfig {
                request_logging: true,
                log_level: LogLevel::Info,
            },
        }
    }

    /// No retries, no request cap, no request logging (for testing)
    pub fn disabled() -> Self {
        Self {
            retry: RetryConfig {
                honor_retry_after: false,
                near_limit_pause: Duration::ZERO,
                ..RetryConfig::no_retry()
            },
            concurrency: ConcurrencyConfig {
                workers: 1,
                max_concurrent_requests: MAX_WORKERS,
                enabled: false,
            },
            monitoring: MonitoringConfig {
                request_logging: false,
                log_level: LogLevel::Error,
            },
        }
    }
}

/// Builder for ResilienceConfig
#[derive(Debug)]
pub struct ResilienceConfigBuilder {
    config: ResilienceConfig,
}

impl ResilienceConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ResilienceConfig::default(),
        }
    }

    /// Start from an existing configuration, e.g. a preset
    pub fn from_config(config: ResilienceConfig) -> Self {
        Self { config }
    }

    pub fn retry_config(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.retry.max_retries = retries;
        self
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.config.retry.initial_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.config.retry.max_delay = delay;
        self
    }

    pub fn jitter(mut self, enabled: bool) -> Self {
        self.config.retry.jitter = enabled;
        self
    }

    pub fn honor_retry_after(mut self, enabled: bool) -> Self {
        self.config.retry.honor_retry_after = enabled;
        self
    }

    /// Set the default worker count (clamped to the allowed range)
    pub fn workers(mut self, workers: usize) -> Self {
        self.config.concurrency.workers = ConcurrencyConfig::clamp_workers(workers);
        self
    }

    pub fn max_concurrent_requests(mut self, max: usize) -> Self {
        self.config.concurrency.max_concurrent_requests = max.max(1);
        self
    }

    pub fn request_logging(mut self, enabled: bool) -> Self {
        self.config.monitoring.request_logging = enabled;
        self
    }

    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.monitoring.log_level = level;
        self
    }

    pub fn build(self) -> ResilienceConfig {
        self.config
    }
}

impl Default for ResilienceConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ResilienceConfig::default();

        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.initial_delay, Duration::from_secs(1));
        assert_eq!(config.retry.max_delay, Duration::from_secs(32));
        assert_eq!(config.concurrency.workers, 5);
        assert_eq!(config.concurrency.max_concurrent_requests, 50);
        assert!(config.concurrency.enabled);
        assert!(config.monitoring.request_logging);
    }

    #[test]
    fn test_conservative_config() {
        let config = ResilienceConfig::conservative();

        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.concurrency.workers, 2);
        assert_eq!(config.concurrency.max_concurrent_requests, 10);
    }

    #[test]
    fn test_disabled_config() {
        let config = ResilienceConfig::disabled();

        assert_eq!(config.retry.max_retries, 0);
        assert!(!config.concurrency.enabled);
        assert!(!config.monitoring.request_logging);
    }

    #[test]
    fn test_clamp_workers() {
        assert_eq!(ConcurrencyConfig::clamp_workers(0), 1);
        assert_eq!(ConcurrencyConfig::clamp_workers(7), 7);
        assert_eq!(ConcurrencyConfig::clamp_workers(500), MAX_WORKERS);
    }

    #[test]
    fn test_builder_pattern() {
        let config = ResilienceConfig::builder()
            .max_retries(2)
            .initial_delay(Duration::from_millis(250))
            .max_delay(Duration::from_secs(4))
            .jitter(true)
            .workers(80)
            .max_concurrent_requests(0)
            .log_level(LogLevel::Debug)
            .build();

        assert_eq!(config.retry.max_retries, 2);
        assert_eq!(config.retry.initial_delay, Duration::from_millis(250));
        assert_eq!(config.retry.max_delay, Duration::from_secs(4));
        assert!(config.retry.jitter);
        assert_eq!(config.concurrency.workers, MAX_WORKERS);
        assert_eq!(config.concurrency.max_concurrent_requests, 1);
        assert_eq!(config.monitoring.log_level, LogLevel::Debug);
    }

    #[test]
    fn test_log_level_parse() {
        assert_eq!(LogLevel::parse("WARNING"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::parse("trace"), Some(LogLevel::Trace));
        assert_eq!(LogLevel::parse("loud"), None);
        assert_eq!(LogLevel::Info.to_level_filter(), LevelFilter::Info);
    }
}
