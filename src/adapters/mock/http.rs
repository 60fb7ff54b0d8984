//! Mock HTTP client for testing.
//!
//! Responses are configured per URL. A URL can carry a queue of one-shot
//! responses (consumed in order) on top of a standing response, which is how
//! tests script "pending, pending, ..., granted" sequences.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::traits::{Headers, HttpClient, HttpError, Response};

/// A recorded HTTP request for verification in tests.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// HTTP method (GET, POST or DELETE)
    pub method: String,
    pub url: String,
    pub headers: Headers,
    /// Request body (POST only)
    pub body: Option<String>,
}

/// Configuration for a mock response.
#[derive(Debug, Clone)]
pub enum MockResponse {
    Success(Response),
    Error(HttpError),
}

impl MockResponse {
    /// Shorthand for a response with a status and a text body.
    pub fn status(status: u16, body: &str) -> Self {
        MockResponse::Success(Response::new(status, bytes::Bytes::from(body.to_string())))
    }
}

/// Mock HTTP client for testing.
///
/// URLs are matched exactly first, then by the longest configured prefix, so
/// `https://api.test/helix/users` also answers `https://api.test/helix/users?login=x`.
///
/// ```ignore
/// let client = MockHttpClient::new();
/// client.push_response(TOKEN_URL, MockResponse::status(400, PENDING));
/// client.set_response(TOKEN_URL, MockResponse::status(200, TOKENS));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockHttpClient {
    responses: Arc<Mutex<HashMap<String, MockResponse>>>,
    queued: Arc<Mutex<HashMap<String, VecDeque<MockResponse>>>>,
    default_response: Arc<Mutex<Option<MockResponse>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    delay: Arc<Mutex<Option<Duration>>>,
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the standing response for a URL.
    pub fn set_response(&self, url: &str, response: MockResponse) {
        let mut responses = self.responses.lock().unwrap();
        responses.insert(url.to_string(), response);
    }

    /// Queue a one-shot response for a URL, served before the standing one.
    pub fn push_response(&self, url: &str, response: MockResponse) {
        let mut queued = self.queued.lock().unwrap();
        queued
            .entry(url.to_string())
            .or_default()
            .push_back(response);
    }

    /// Set a default response for URLs without specific matches.
    pub fn set_default_response(&self, response: MockResponse) {
        let mut default = self.default_response.lock().unwrap();
        *default = Some(response);
    }

    /// Delay every response, to hold a request in flight.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn get_requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of recorded requests whose URL starts with `prefix`.
    pub fn count_requests(&self, method: &str, prefix: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.method == method && r.url.starts_with(prefix))
            .count()
    }

    pub fn clear_requests(&self) {
        self.requests.lock().unwrap().clear();
    }

    fn record_request(&self, method: &str, url: &str, headers: &Headers, body: Option<String>) {
        let mut requests = self.requests.lock().unwrap();
        requests.push(RecordedRequest {
            method: method.to_string(),
            url: url.to_string(),
            headers: headers.clone(),
            body,
        });
    }

    fn longest_prefix<'a, V>(map: &'a HashMap<String, V>, url: &str) -> Option<&'a String> {
        map.keys()
            .filter(|pattern| url.starts_with(pattern.as_str()))
            .max_by_key(|pattern| pattern.len())
    }

    fn get_response(&self, url: &str) -> Option<MockResponse> {
        {
            let mut queued = self.queued.lock().unwrap();
            if let Some(key) = Self::longest_prefix(&queued, url).cloned() {
                if let Some(response) = queued.get_mut(&key).and_then(|q| q.pop_front()) {
                    return Some(response);
                }
            }
        }

        let responses = self.responses.lock().unwrap();
        if let Some(key) = Self::longest_prefix(&responses, url) {
            return responses.get(key).cloned();
        }

        self.default_response.lock().unwrap().clone()
    }

    async fn respond(
        &self,
        method: &str,
        url: &str,
        headers: &Headers,
        body: Option<String>,
    ) -> Result<Response, HttpError> {
        self.record_request(method, url, headers, body);

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match self.get_response(url) {
            Some(MockResponse::Success(response)) => Ok(response),
            Some(MockResponse::Error(err)) => Err(err),
            None => Err(HttpError::Other(format!("No mock response for URL: {}", url))),
        }
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn get(&self, url: &str, headers: &Headers) -> Result<Response, HttpError> {
        self.respond("GET", url, headers, None).await
    }

    async fn post(&self, url: &str, body: &str, headers: &Headers) -> Result<Response, HttpError> {
        self.respond("POST", url, headers, Some(body.to_string()))
            .await
    }

    async fn delete(&self, url: &str, headers: &Headers) -> Result<Response, HttpError> {
        self.respond("DELETE", url, headers, None).await
    }
}
