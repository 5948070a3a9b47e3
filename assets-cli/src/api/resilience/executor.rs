//! Resilient request executor
//!
//! Runs one logical API call through the transport. Rate limiting (429),
//! server errors (5xx) and network failures are retried with exponential
//! backoff; any other client error fails on the first attempt.

use async_trait::async_trait;
use log::{debug, warn};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::concurrency::ConcurrencyLimiter;
use super::config::ResilienceConfig;
use super::retry::{RetryConfig, RetryPolicy};
use crate::api::credentials::CredentialContext;
use crate::api::transport::{ApiRequest, RawResponse, Transport};

/// Suspension point used for backoff, injectable so tests can observe delays
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Result of one HTTP attempt, or of a whole execution.
///
/// `RateLimited` only classifies an individual attempt; once retries are
/// exhausted it is reported as a `Failure` with kind `RateLimited`.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestOutcome {
    Success(Value),
    RateLimited {
        retry_after: Option<Duration>,
        body: String,
    },
    Failure(RequestFailure),
}

impl RequestOutcome {
    pub fn into_result(self) -> Result<Value, RequestFailure> {
        match self {
            RequestOutcome::Success(payload) => Ok(payload),
            RequestOutcome::RateLimited { body, .. } => Err(RequestFailure::new(
                FailureKind::RateLimited,
                Some(429),
                body,
            )),
            RequestOutcome::Failure(failure) => Err(failure),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// 429 responses until retries ran out
    RateLimited,
    /// 5xx responses until retries ran out
    Server,
    /// Timeouts or connection failures until retries ran out
    Network,
    /// 4xx other than 429
    Client,
    /// The request could not be sent at all
    Request,
    /// A 2xx response whose body is not JSON
    InvalidPayload,
    /// Stopped at a backoff boundary by cancellation
    Cancelled,
}

impl FailureKind {
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            FailureKind::RateLimited | FailureKind::Server | FailureKind::Network
        )
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FailureKind::RateLimited => "rate limited",
            FailureKind::Server => "server error",
            FailureKind::Network => "network error",
            FailureKind::Client => "client error",
            FailureKind::Request => "request error",
            FailureKind::InvalidPayload => "invalid payload",
            FailureKind::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

/// Terminal failure of a request, with the last status and body seen
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestFailure {
    pub kind: FailureKind,
    pub status: Option<u16>,
    pub body: String,
    pub attempts: u32,
}

impl RequestFailure {
    pub fn new(kind: FailureKind, status: Option<u16>, body: impl Into<String>) -> Self {
        Self {
            kind,
            status,
            body: body.into(),
            attempts: 1,
        }
    }

    pub fn cancelled(attempts: u32) -> Self {
        Self {
            kind: FailureKind::Cancelled,
            status: None,
            body: "cancelled while waiting to retry".to_string(),
            attempts,
        }
    }

    fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = attempts;
        self
    }
}

impl fmt::Display for RequestFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (HTTP {})", self.kind, status)?,
            None => write!(f, "{}", self.kind)?,
        }
        let body = self.body.trim();
        if !body.is_empty() {
            write!(f, ": {}", truncate(body, 200))?;
        }
        if self.attempts > 1 {
            write!(f, " after {} attempts", self.attempts)?;
        }
        Ok(())
    }
}

impl std::error::Error for RequestFailure {}

fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

/// Outcome plus the bookkeeping of how it was reached
#[derive(Debug, Clone)]
pub struct Execution {
    pub outcome: RequestOutcome,
    pub attempts: u32,
    /// Total time spent in backoff and near-limit pauses
    pub waited: Duration,
}

/// One classified attempt
struct Attempt {
    outcome: RequestOutcome,
    retry_after: Option<Duration>,
    near_limit: bool,
}

impl Attempt {
    fn failed(failure: RequestFailure) -> Self {
        Self {
            outcome: RequestOutcome::Failure(failure),
            retry_after: None,
            near_limit: false,
        }
    }
}

/// Shared, caller-constructed executor for every Assets API call.
///
/// Holds the credential context, the transport (and so the connection pool),
/// the retry policy and the client-wide concurrency limiter.
pub struct RequestExecutor {
    transport: Arc<dyn Transport>,
    credentials: CredentialContext,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    limiter: ConcurrencyLimiter,
    request_logging: bool,
}

impl RequestExecutor {
    pub fn new(
        transport: Arc<dyn Transport>,
        credentials: CredentialContext,
        config: &ResilienceConfig,
    ) -> Self {
        Self {
            transport,
            credentials,
            policy: RetryPolicy::new(config.retry.clone()),
            sleeper: Arc::new(TokioSleeper),
            limiter: ConcurrencyLimiter::new(&config.concurrency),
            request_logging: config.monitoring.request_logging,
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn credentials(&self) -> &CredentialContext {
        &self.credentials
    }

    pub fn retry_config(&self) -> &RetryConfig {
        self.policy.config()
    }

    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.limiter
    }

    /// Execute with retries. Never returns `RateLimited`.
    pub async fn execute(&self, request: &ApiRequest) -> RequestOutcome {
        self.execute_traced(request, &CancellationToken::new())
            .await
            .outcome
    }

    /// Execute with retries, stopping at a backoff boundary once `cancel` fires
    pub async fn execute_traced(
        &self,
        request: &ApiRequest,
        cancel: &CancellationToken,
    ) -> Execution {
        let max_retries = self.policy.config().max_retries;
        let mut attempt: u32 = 0;
        let mut waited = Duration::ZERO;

        loop {
            let Attempt {
                outcome,
                retry_after,
                near_limit,
            } = self.attempt(request).await;
            let attempts = attempt + 1;

            let failure = match outcome {
                RequestOutcome::Success(payload) => {
                    if near_limit {
                        let pause = self.policy.config().near_limit_pause;
                        warn!(
                            "Approaching rate limit, pausing {:.2}s before next request",
                            pause.as_secs_f64()
                        );
                        if !pause.is_zero() {
                            tokio::select! {
                                biased;
                                _ = cancel.cancelled() => {
                                    debug!(
                                        "{} {} cancelled during near-limit pause",
                                        request.method, request.path
                                    );
                                }
                                _ = self.sleeper.sleep(pause) => waited += pause,
                            }
                        }
                    }
                    return Execution {
                        outcome: RequestOutcome::Success(payload),
                        attempts,
                        waited,
                    };
                }
                RequestOutcome::RateLimited { body, .. } => {
                    RequestFailure::new(FailureKind::RateLimited, Some(429), body)
                }
                RequestOutcome::Failure(failure) => failure,
            };

            if !failure.kind.is_transient() || !self.policy.should_retry(attempt) {
                if failure.kind.is_transient() {
                    warn!(
                        "{} {} failed after {} attempts: {}",
                        request.method, request.path, attempts, failure
                    );
                }
                return Execution {
                    outcome: RequestOutcome::Failure(failure.with_attempts(attempts)),
                    attempts,
                    waited,
                };
            }

            let delay = self.policy.delay_for(attempt, retry_after);
            warn!(
                "{} {} failed ({}), retrying in {:.2}s (attempt {}/{})",
                request.method,
                request.path,
                failure.kind,
                delay.as_secs_f64(),
                attempts,
                max_retries
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("{} {} cancelled during backoff", request.method, request.path);
                    return Execution {
                        outcome: RequestOutcome::Failure(RequestFailure::cancelled(attempts)),
                        attempts,
                        waited,
                    };
                }
                _ = self.sleeper.sleep(delay) => {}
            }

            waited += delay;
            attempt += 1;
        }
    }

    async fn attempt(&self, request: &ApiRequest) -> Attempt {
        let _permit = match self.limiter.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                return Attempt::failed(RequestFailure::new(
                    FailureKind::Request,
                    None,
                    "concurrency limiter closed",
                ));
            }
        };

        if self.request_logging {
            debug!("{} {}", request.method, request.path);
        }

        match self.transport.send(request, &self.credentials).await {
            Ok(response) => classify(response),
            Err(err) => {
                let kind = if err.is_transient() {
                    FailureKind::Network
                } else {
                    FailureKind::Request
                };
                Attempt::failed(RequestFailure::new(kind, None, err.to_string()))
            }
        }
    }
}

/// Map one HTTP response onto an attempt outcome
fn classify(response: RawResponse) -> Attempt {
    let retry_after = response.retry_after();
    let near_limit = response.near_rate_limit();

    let outcome = match response.status {
        200..=299 => {
            if response.body.trim().is_empty() {
                RequestOutcome::Success(Value::Null)
            } else {
                match serde_json::from_str(&response.body) {
                    Ok(payload) => RequestOutcome::Success(payload),
                    Err(e) => RequestOutcome::Failure(RequestFailure::new(
                        FailureKind::InvalidPayload,
                        Some(response.status),
                        format!("{}: {}", e, response.body),
                    )),
                }
            }
        }
        429 => {
            if let Some(reset) = response.header("x-ratelimit-reset") {
                warn!("Rate limit will reset at: {}", reset);
            }
            RequestOutcome::RateLimited {
                retry_after,
                body: response.body,
            }
        }
        500..=599 => RequestOutcome::Failure(RequestFailure::new(
            FailureKind::Server,
            Some(response.status),
            response.body,
        )),
        status => RequestOutcome::Failure(RequestFailure::new(
            FailureKind::Client,
            Some(status),
            response.body,
        )),
    };

    Attempt {
        outcome,
        retry_after,
        near_limit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::{RecordingSleeper, Reply, ScriptedTransport, test_credentials};
    use crate::api::transport::{RawResponse, TransportError};
    use serde_json::json;

    const PATH: &str = "/object/201";

    fn executor_with(
        transport: Arc<ScriptedTransport>,
        retry: RetryConfig,
    ) -> (RequestExecutor, Arc<RecordingSleeper>) {
        let sleeper = Arc::new(RecordingSleeper::new());
        let config = ResilienceConfig::builder().retry_config(retry).build();
        let executor = RequestExecutor::new(transport, test_credentials(), &config)
            .with_sleeper(sleeper.clone());
        (executor, sleeper)
    }

    fn secs(values: &[u64]) -> Vec<Duration> {
        values.iter().map(|s| Duration::from_secs(*s)).collect()
    }

    #[tokio::test]
    async fn test_rate_limited_three_times_then_success() {
        let transport = Arc::new(ScriptedTransport::ok().script(
            PATH,
            vec![
                Reply::rate_limited(),
                Reply::rate_limited(),
                Reply::rate_limited(),
                Reply::json(200, json!({"id": "201"})),
            ],
        ));
        let (executor, sleeper) = executor_with(transport.clone(), RetryConfig::default());

        let execution = executor
            .execute_traced(&ApiRequest::get(PATH), &CancellationToken::new())
            .await;

        assert_eq!(execution.outcome, RequestOutcome::Success(json!({"id": "201"})));
        assert_eq!(execution.attempts, 4);
        assert_eq!(sleeper.sleeps(), secs(&[1, 2, 4]));
        assert_eq!(execution.waited, Duration::from_secs(7));
        assert_eq!(transport.calls_to(PATH), 4);
    }

    #[tokio::test]
    async fn test_nth_attempt_success_sleeps_n_minus_one_times() {
        let retry = RetryConfig {
            max_retries: 6,
            initial_delay: Duration::from_secs(3),
            max_delay: Duration::from_secs(10),
            ..Default::default()
        };

        for n in 1..=6u32 {
            let mut replies: Vec<Reply> = (1..n).map(|_| Reply::status(503, "busy")).collect();
            replies.push(Reply::json(200, json!({"ok": true})));
            let transport = Arc::new(ScriptedTransport::ok().script(PATH, replies));
            let (executor, sleeper) = executor_with(transport, retry.clone());

            let outcome = executor.execute(&ApiRequest::get(PATH)).await;

            assert!(matches!(outcome, RequestOutcome::Success(_)), "n = {}", n);
            let expected: Vec<Duration> = (0..n.saturating_sub(1))
                .map(|k| (Duration::from_secs(3) * 2u32.pow(k)).min(Duration::from_secs(10)))
                .collect();
            assert_eq!(sleeper.sleeps(), expected, "n = {}", n);
        }
    }

    #[tokio::test]
    async fn test_persistent_rate_limit_exhausts_retries() {
        let transport = Arc::new(ScriptedTransport::new(Reply::rate_limited()));
        let (executor, sleeper) = executor_with(transport.clone(), RetryConfig::default());

        let outcome = executor.execute(&ApiRequest::get(PATH)).await;

        match outcome {
            RequestOutcome::Failure(failure) => {
                assert_eq!(failure.kind, FailureKind::RateLimited);
                assert_eq!(failure.status, Some(429));
                assert_eq!(failure.body, "rate limit exceeded");
                assert_eq!(failure.attempts, 6);
            }
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(transport.calls_to(PATH), 6);
        assert_eq!(sleeper.sleeps(), secs(&[1, 2, 4, 8, 16]));
    }

    #[tokio::test]
    async fn test_client_error_fails_fast() {
        let transport = Arc::new(ScriptedTransport::new(Reply::status(404, "No object found")));
        let (executor, sleeper) = executor_with(transport.clone(), RetryConfig::default());

        let outcome = executor.execute(&ApiRequest::get(PATH)).await;

        let failure = outcome.into_result().unwrap_err();
        assert_eq!(failure.kind, FailureKind::Client);
        assert_eq!(failure.status, Some(404));
        assert_eq!(failure.attempts, 1);
        assert_eq!(transport.calls_to(PATH), 1);
        assert!(sleeper.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_retry_after_header_overrides_backoff() {
        let transport = Arc::new(ScriptedTransport::ok().script(
            PATH,
            vec![
                Reply::Response(RawResponse::new(429, "").with_header("Retry-After", "5")),
                Reply::Response(RawResponse::new(503, "").with_header("Retry-After", "90")),
                Reply::json(200, json!({})),
            ],
        ));
        let (executor, sleeper) = executor_with(transport, RetryConfig::default());

        let outcome = executor.execute(&ApiRequest::get(PATH)).await;

        assert!(matches!(outcome, RequestOutcome::Success(_)));
        assert_eq!(sleeper.sleeps(), secs(&[5, 90]));
    }

    #[tokio::test]
    async fn test_network_errors_are_retried() {
        let transport = Arc::new(ScriptedTransport::ok().script(
            PATH,
            vec![
                Reply::Error(TransportError::Timeout("slow".into())),
                Reply::Error(TransportError::Connect("refused".into())),
            ],
        ));
        let (executor, sleeper) = executor_with(transport, RetryConfig::default());

        let execution = executor
            .execute_traced(&ApiRequest::get(PATH), &CancellationToken::new())
            .await;

        assert!(matches!(execution.outcome, RequestOutcome::Success(_)));
        assert_eq!(execution.attempts, 3);
        assert_eq!(sleeper.sleeps(), secs(&[1, 2]));
    }

    #[tokio::test]
    async fn test_non_transient_transport_error_fails_fast() {
        let transport = Arc::new(ScriptedTransport::new(Reply::Error(TransportError::Other(
            "builder error".into(),
        ))));
        let (executor, sleeper) = executor_with(transport, RetryConfig::default());

        let failure = executor
            .execute(&ApiRequest::get(PATH))
            .await
            .into_result()
            .unwrap_err();

        assert_eq!(failure.kind, FailureKind::Request);
        assert!(sleeper.sleeps().is_empty());
    }

    #[tokio::test]
    async fn test_empty_and_invalid_success_bodies() {
        let transport = Arc::new(ScriptedTransport::ok().script(
            PATH,
            vec![Reply::status(204, ""), Reply::status(200, "<html>oops</html>")],
        ));
        let (executor, _) = executor_with(transport, RetryConfig::default());

        assert_eq!(
            executor.execute(&ApiRequest::get(PATH)).await,
            RequestOutcome::Success(Value::Null)
        );
        let failure = executor
            .execute(&ApiRequest::get(PATH))
            .await
            .into_result()
            .unwrap_err();
        assert_eq!(failure.kind, FailureKind::InvalidPayload);
    }

    #[tokio::test]
    async fn test_near_limit_pauses_after_success() {
        let transport = Arc::new(ScriptedTransport::ok().script(
            PATH,
            vec![Reply::Response(
                RawResponse::new(200, "{}").with_header("X-RateLimit-NearLimit", "true"),
            )],
        ));
        let (executor, sleeper) = executor_with(transport, RetryConfig::default());

        let execution = executor
            .execute_traced(&ApiRequest::get(PATH), &CancellationToken::new())
            .await;

        assert!(matches!(execution.outcome, RequestOutcome::Success(_)));
        assert_eq!(execution.attempts, 1);
        assert_eq!(sleeper.sleeps(), secs(&[1]));
    }

    #[tokio::test]
    async fn test_cancellation_cuts_near_limit_pause_short() {
        let transport = Arc::new(ScriptedTransport::ok().script(
            PATH,
            vec![Reply::Response(
                RawResponse::new(200, "{}").with_header("X-RateLimit-NearLimit", "true"),
            )],
        ));
        let config = ResilienceConfig::builder()
            .retry_config(RetryConfig {
                near_limit_pause: Duration::from_secs(60),
                ..Default::default()
            })
            .build();
        let executor = RequestExecutor::new(transport, test_credentials(), &config);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let execution = tokio::time::timeout(
            Duration::from_secs(5),
            executor.execute_traced(&ApiRequest::get(PATH), &cancel),
        )
        .await
        .expect("cancellation should interrupt the near-limit pause");

        assert!(matches!(execution.outcome, RequestOutcome::Success(_)));
        assert_eq!(execution.attempts, 1);
        assert_eq!(execution.waited, Duration::ZERO);
    }

    #[tokio::test]
    async fn test_cancellation_stops_at_backoff_boundary() {
        let transport = Arc::new(ScriptedTransport::new(Reply::status(503, "down")));
        let config = ResilienceConfig::builder()
            .initial_delay(Duration::from_secs(60))
            .max_delay(Duration::from_secs(60))
            .build();
        let executor = RequestExecutor::new(transport.clone(), test_credentials(), &config);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let execution = tokio::time::timeout(
            Duration::from_secs(5),
            executor.execute_traced(&ApiRequest::get(PATH), &cancel),
        )
        .await
        .expect("cancellation should interrupt the backoff sleep");

        let failure = execution.outcome.into_result().unwrap_err();
        assert_eq!(failure.kind, FailureKind::Cancelled);
        assert_eq!(execution.attempts, 1);
        assert_eq!(transport.calls_to(PATH), 1);
    }

    #[test]
    fn test_failure_display() {
        let failure = RequestFailure::new(FailureKind::Server, Some(502), "bad gateway")
            .with_attempts(6);
        assert_eq!(
            failure.to_string(),
            "server error (HTTP 502): bad gateway after 6 attempts"
        );
        assert_eq!(
            RequestFailure::new(FailureKind::Network, None, "").to_string(),
            "network error"
        );
    }
}
