//! Resilience layer for Assets API calls
//!
//! Retry policy with exponential backoff, a client-wide concurrency limiter,
//! and the executor that ties them together around the transport.

pub mod concurrency;
pub mod config;
pub mod executor;
pub mod retry;

pub use config::{ConcurrencyConfig, LogLevel, ResilienceConfig, ResilienceConfigBuilder};
pub use executor::{FailureKind, RequestExecutor, RequestFailure, RequestOutcome};
