//! Mock HTTP transport for testing.

use crate::error::{NetworkError, S3Error};
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

/// Canned HTTP response.
#[derive(Debug, Clone)]
pub struct MockResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HashMap<String, String>,
    /// Response body.
    pub body: Bytes,
}

impl MockResponse {
    /// A 200 response with an empty body.
    pub fn ok() -> Self {
        Self::error(200, Bytes::new())
    }

    /// A 204 response, as returned by abort.
    pub fn ok_empty() -> Self {
        Self::error(204, Bytes::new())
    }

    /// A 200 response with a body.
    pub fn ok_with_body(body: impl Into<Bytes>) -> Self {
        Self::error(200, body)
    }

    /// A response with any status.
    pub fn error(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    /// Add a header to the response.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

/// Transport that replays queued responses and records every request.
///
/// Once the queue is empty it falls back to the default response, or fails
/// with a connection error when there is none.
#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<MockResponse>>,
    requests: Mutex<Vec<HttpRequest>>,
    default_response: Option<MockResponse>,
}

impl MockTransport {
    /// Create a mock transport with no responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock transport with queued responses.
    pub fn with_responses(responses: Vec<MockResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            ..Self::default()
        }
    }

    /// Create a mock transport that always returns `response`.
    pub fn with_default(response: MockResponse) -> Self {
        Self {
            default_response: Some(response),
            ..Self::default()
        }
    }

    /// Queue a response to return.
    pub fn queue_response(&self, response: MockResponse) {
        self.responses.lock().push_back(response);
    }

    /// All recorded requests.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    /// Number of requests made.
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// The last request made.
    pub fn last_request(&self) -> Option<HttpRequest> {
        self.requests.lock().last().cloned()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, S3Error> {
        self.requests.lock().push(request);

        let response = self
            .responses
            .lock()
            .pop_front()
            .or_else(|| self.default_response.clone());

        match response {
            Some(mock) => Ok(HttpResponse {
                status: mock.status,
                headers: mock.headers,
                body: mock.body,
            }),
            None => Err(S3Error::Network(NetworkError::ConnectionFailed {
                message: "No mock response available".to_string(),
            })),
        }
    }
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("queued_responses", &self.responses.lock().len())
            .field("recorded_requests", &self.requests.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_responses_replay_in_order() {
        let transport = MockTransport::with_responses(vec![
            MockResponse::ok_with_body("first"),
            MockResponse::error(404, "Not Found"),
        ]);

        let first = transport.send(HttpRequest::new("GET", "https://example.com/1")).await.unwrap();
        let second = transport.send(HttpRequest::new("GET", "https://example.com/2")).await.unwrap();

        assert_eq!(first.body, Bytes::from("first"));
        assert_eq!(second.status, 404);
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test]
    async fn test_exhausted_queue_is_connection_error() {
        let transport = MockTransport::new();
        let err = transport
            .send(HttpRequest::new("GET", "https://example.com"))
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_default_response_and_recording() {
        let transport = MockTransport::with_default(MockResponse::ok().with_header("x-custom", "value"));

        let request = HttpRequest::new("POST", "https://example.com").with_body(Bytes::from("payload"));
        let response = transport.send(request).await.unwrap();

        assert_eq!(response.get_header("x-custom"), Some("value"));
        let recorded = transport.last_request().unwrap();
        assert_eq!(recorded.method, "POST");
        assert_eq!(recorded.body, Some(Bytes::from("payload")));
    }
}
