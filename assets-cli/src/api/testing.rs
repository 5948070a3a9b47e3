//! Scripted transport and recording sleeper shared by unit tests

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::credentials::CredentialContext;
use super::resilience::executor::Sleeper;
use super::transport::{ApiRequest, RawResponse, Transport, TransportError};

#[derive(Debug, Clone)]
pub enum Reply {
    Response(RawResponse),
    Error(TransportError),
}

impl Reply {
    pub fn status(status: u16, body: &str) -> Self {
        Reply::Response(RawResponse::new(status, body))
    }

    pub fn json(status: u16, body: Value) -> Self {
        Reply::Response(RawResponse::new(status, body.to_string()))
    }

    pub fn rate_limited() -> Self {
        Reply::status(429, "rate limit exceeded")
    }
}

/// Replays per-path reply queues, falling back to a fixed reply
pub struct ScriptedTransport {
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    fallback: Reply,
    requests: Mutex<Vec<ApiRequest>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    latency: Duration,
}

impl ScriptedTransport {
    pub fn new(fallback: Reply) -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            fallback,
            requests: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            latency: Duration::ZERO,
        }
    }

    /// Every unscripted call succeeds with an empty JSON object
    pub fn ok() -> Self {
        Self::new(Reply::json(200, serde_json::json!({})))
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn script(self, path: &str, replies: Vec<Reply>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(path.to_string(), replies.into_iter().collect());
        self
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.path == path)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(
        &self,
        request: &ApiRequest,
        _credentials: &CredentialContext,
    ) -> Result<RawResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let reply = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&request.path)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| self.fallback.clone());

        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match reply {
            Reply::Response(response) => Ok(response),
            Reply::Error(err) => Err(err),
        }
    }
}

/// Records requested sleeps and returns immediately
#[derive(Default)]
pub struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        tokio::task::yield_now().await;
    }
}

pub fn test_credentials() -> CredentialContext {
    CredentialContext::new("https://assets.example.test/v1", "agent@example.com", "token")
}
