//! Mock signer for testing.

use crate::error::S3Error;
use crate::signing::{AwsSigner, SignedRequest};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use url::Url;

/// A recorded call to [`MockSigner::sign`].
#[derive(Debug, Clone)]
pub struct SignRequest {
    /// HTTP method.
    pub method: String,
    /// Request URL.
    pub url: Url,
    /// Headers passed in for signing.
    pub headers: HashMap<String, String>,
    /// Whether a payload was supplied.
    pub has_body: bool,
}

/// Signer that adds fixed headers instead of computing a signature.
pub struct MockSigner {
    headers: HashMap<String, String>,
    error: Mutex<Option<S3Error>>,
    sign_count: AtomicUsize,
    sign_requests: Mutex<Vec<SignRequest>>,
}

impl MockSigner {
    /// Create a mock signer.
    pub fn new() -> Self {
        let headers = HashMap::from([
            (
                "authorization".to_string(),
                "AWS4-HMAC-SHA256 Credential=mock/signing".to_string(),
            ),
            ("x-amz-date".to_string(), "20240115T100000Z".to_string()),
            (
                "x-amz-content-sha256".to_string(),
                "UNSIGNED-PAYLOAD".to_string(),
            ),
        ]);

        Self {
            headers,
            error: Mutex::new(None),
            sign_count: AtomicUsize::new(0),
            sign_requests: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock signer whose next call fails with `error`.
    pub fn with_error(error: S3Error) -> Self {
        let signer = Self::new();
        *signer.error.lock() = Some(error);
        signer
    }

    /// Number of sign calls.
    pub fn sign_count(&self) -> usize {
        self.sign_count.load(Ordering::Relaxed)
    }

    /// The last recorded sign call.
    pub fn last_sign_request(&self) -> Option<SignRequest> {
        self.sign_requests.lock().last().cloned()
    }
}

impl Default for MockSigner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AwsSigner for MockSigner {
    async fn sign(
        &self,
        method: &str,
        url: &Url,
        headers: &HashMap<String, String>,
        body: Option<&[u8]>,
    ) -> Result<SignedRequest, S3Error> {
        self.sign_count.fetch_add(1, Ordering::Relaxed);
        self.sign_requests.lock().push(SignRequest {
            method: method.to_string(),
            url: url.clone(),
            headers: headers.clone(),
            has_body: body.is_some(),
        });

        if let Some(error) = self.error.lock().take() {
            return Err(error);
        }

        let mut signed_headers = headers.clone();
        signed_headers.extend(self.headers.clone());

        Ok(SignedRequest {
            method: method.to_string(),
            url: url.clone(),
            headers: signed_headers,
        })
    }
}

impl std::fmt::Debug for MockSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSigner")
            .field("sign_count", &self.sign_count())
            .finish()
    }
}
