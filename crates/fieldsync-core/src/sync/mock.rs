//! Scripted in-process central server used by the engine's unit tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use serde_json::Value;

use super::transport::{CentralTransport, HttpReply, TransportError};

/// A request observed by the mock
#[derive(Debug, Clone, PartialEq)]
pub struct SeenRequest {
    pub method: &'static str,
    pub url: String,
    pub body: Option<Value>,
}

#[derive(Default)]
struct MockState {
    reachable: HashSet<String>,
    /// Bases that turn reachable once the first non-probe request arrives
    reachable_later: Vec<String>,
    replies: HashMap<String, VecDeque<Result<HttpReply, TransportError>>>,
    probes: Vec<String>,
    requests: Vec<SeenRequest>,
}

/// Mock transport with per-URL reply queues.
///
/// Unscripted requests to a reachable base get `404`; anything else fails
/// with a network error.
#[derive(Default)]
pub struct MockTransport {
    state: Mutex<MockState>,
    latency: Option<Duration>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mock that sleeps before answering each probe
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    pub fn reachable(self, base_url: &str) -> Self {
        self.lock().reachable.insert(base_url.to_string());
        self
    }

    pub fn reachable_after_first_request(self, base_url: &str) -> Self {
        self.lock().reachable_later.push(base_url.to_string());
        self
    }

    pub fn reply(&self, url: &str, status: u16, body: &str) {
        self.enqueue(url, Ok(HttpReply::new(status, body)));
    }

    pub fn fail(&self, url: &str, detail: &str) {
        self.enqueue(url, Err(TransportError::Network(detail.to_string())));
    }

    pub fn probes(&self) -> Vec<String> {
        self.lock().probes.clone()
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        self.lock().requests.clone()
    }

    fn enqueue(&self, url: &str, reply: Result<HttpReply, TransportError>) {
        self.lock()
            .replies
            .entry(url.to_string())
            .or_default()
            .push_back(reply);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn respond(&self, method: &'static str, url: &str, body: Option<Value>) -> Result<HttpReply, TransportError> {
        let mut state = self.lock();
        let later = std::mem::take(&mut state.reachable_later);
        state.reachable.extend(later);
        state.requests.push(SeenRequest {
            method,
            url: url.to_string(),
            body,
        });

        if let Some(reply) = state.replies.get_mut(url).and_then(VecDeque::pop_front) {
            return reply;
        }
        if state.reachable.iter().any(|base| url.starts_with(base.as_str())) {
            Ok(HttpReply::new(404, r#"{"message": "Not found"}"#))
        } else {
            Err(TransportError::Network(format!("connection refused: {url}")))
        }
    }
}

impl CentralTransport for MockTransport {
    async fn probe(&self, base_url: &str, _timeout: Duration) -> Result<u16, TransportError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let mut state = self.lock();
        state.probes.push(base_url.to_string());
        if state.reachable.contains(base_url) {
            Ok(200)
        } else {
            Err(TransportError::Network(format!("connection refused: {base_url}")))
        }
    }

    async fn post_json(
        &self,
        url: &str,
        body: &Value,
        _timeout: Duration,
    ) -> Result<HttpReply, TransportError> {
        self.respond("POST", url, Some(body.clone()))
    }

    async fn get(&self, url: &str, _timeout: Duration) -> Result<HttpReply, TransportError> {
        self.respond("GET", url, None)
    }
}
