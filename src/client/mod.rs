//! Client entry point.
//!
//! `S3ClientImpl` wires configuration, transport, retry and signing into a
//! [`MultipartApi`] and hands out the upload and cleanup engines built on it.

use crate::config::S3Config;
use crate::error::S3Error;
use crate::resilience::{RetryConfig, RetryPolicy, RetryingTransport};
use crate::services::{MultipartApi, S3MultipartApi};
use crate::signing::AwsSignerV4;
use crate::transfer::{Cleanup, Uploader};
use crate::transport::{HttpTransport, ReqwestTransport};
use once_cell::sync::OnceCell;
use std::sync::Arc;

/// S3 client trait.
pub trait S3Client: Send + Sync {
    /// The multipart API all engines talk to.
    fn api(&self) -> Arc<dyn MultipartApi>;

    /// An uploader using the client's part sizing and listing settings.
    fn uploader(&self) -> Uploader;

    /// A cleanup engine using the client's listing settings.
    fn cleanup(&self) -> Cleanup;

    /// Get the client configuration.
    fn config(&self) -> &S3Config;
}

/// S3 client implementation.
pub struct S3ClientImpl {
    config: Arc<S3Config>,
    transport: Arc<dyn HttpTransport>,
    signer: Arc<AwsSignerV4>,

    api: OnceCell<Arc<S3MultipartApi>>,
}

impl S3ClientImpl {
    /// Create a client sending requests through `transport` as given.
    pub fn new(config: S3Config, transport: Arc<dyn HttpTransport>) -> Self {
        let config = Arc::new(config);
        let signer = Arc::new(AwsSignerV4::new(
            config.credentials_provider.clone(),
            config.region.clone(),
        ));

        Self {
            config,
            transport,
            signer,
            api: OnceCell::new(),
        }
    }
}

impl S3Client for S3ClientImpl {
    fn api(&self) -> Arc<dyn MultipartApi> {
        let api = self.api.get_or_init(|| {
            Arc::new(S3MultipartApi::new(
                self.config.clone(),
                self.transport.clone(),
                self.signer.clone(),
            ))
        });
        api.clone()
    }

    fn uploader(&self) -> Uploader {
        Uploader::from_config(self.api(), &self.config)
    }

    fn cleanup(&self) -> Cleanup {
        Cleanup::from_config(self.api(), &self.config)
    }

    fn config(&self) -> &S3Config {
        &self.config
    }
}

impl std::fmt::Debug for S3ClientImpl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3ClientImpl")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Builder for S3 client.
pub struct S3ClientBuilder {
    config: Option<S3Config>,
    from_env: bool,
    transport: Option<Arc<dyn HttpTransport>>,
}

impl S3ClientBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: None,
            from_env: false,
            transport: None,
        }
    }

    /// Use the provided configuration.
    pub fn config(mut self, config: S3Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Load configuration from environment variables.
    pub fn from_env(mut self) -> Self {
        self.from_env = true;
        self
    }

    /// Use a custom HTTP transport.
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the S3 client.
    ///
    /// The transport, given or default, is wrapped in a
    /// [`RetryingTransport`] unless `max_retries` is zero.
    pub fn build(self) -> Result<S3ClientImpl, S3Error> {
        let config = if let Some(config) = self.config {
            config
        } else if self.from_env {
            S3Config::builder().from_env().build()?
        } else {
            S3Config::default()
        };

        let transport: Arc<dyn HttpTransport> = if let Some(transport) = self.transport {
            transport
        } else {
            let transport = ReqwestTransport::builder()
                .connect_timeout(config.connect_timeout)
                .read_timeout(config.read_timeout)
                .verify_ssl(config.verify_ssl)
                .build()?;
            Arc::new(transport)
        };

        let transport: Arc<dyn HttpTransport> = if config.max_retries > 0 {
            let policy = RetryPolicy::new(RetryConfig::from_config(&config));
            Arc::new(RetryingTransport::new(transport, policy))
        } else {
            transport
        };

        Ok(S3ClientImpl::new(config, transport))
    }
}

impl Default for S3ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{AwsCredentials, StaticCredentialsProvider};
    use crate::mocks::{MockResponse, MockTransport, TestFixtures};

    fn config(max_retries: u32) -> S3Config {
        S3Config::builder()
            .region("eu-west-1")
            .endpoint("http://localhost:9000")
            .unwrap()
            .path_style(true)
            .credentials_provider(Arc::new(StaticCredentialsProvider::new(AwsCredentials::new(
                "AKID", "SECRET",
            ))))
            .max_retries(max_retries)
            .initial_backoff(std::time::Duration::from_millis(1))
            .build()
            .unwrap()
    }

    #[test]
    fn test_builder_default() {
        let result = S3ClientBuilder::new().build();
        assert!(result.is_ok());
    }

    #[test]
    fn test_builder_with_config() {
        let client = S3ClientBuilder::new().config(config(0)).build().unwrap();
        assert_eq!(client.config().region, "eu-west-1");
        assert_eq!(*client.uploader().policy(), client.config().part_size_policy);
    }

    #[tokio::test]
    async fn test_requests_are_signed() {
        let transport = Arc::new(MockTransport::with_responses(vec![MockResponse::ok_with_body(
            TestFixtures::initiate_multipart_xml(),
        )]));
        let client = S3ClientBuilder::new()
            .config(config(0))
            .transport(transport.clone())
            .build()
            .unwrap();

        let upload_id = client
            .api()
            .initiate_multipart_upload("test-bucket", "key", None)
            .await
            .unwrap();

        assert_eq!(upload_id, "upload-id-12345");
        let request = transport.last_request().unwrap();
        let auth = request.headers.get("authorization").unwrap();
        assert!(auth.starts_with("AWS4-HMAC-SHA256 Credential=AKID/"));
        assert!(auth.contains("/eu-west-1/s3/aws4_request"));
    }

    #[tokio::test]
    async fn test_retry_layer_installed() {
        let transport = Arc::new(MockTransport::with_responses(vec![
            MockResponse::error(503, ""),
            MockResponse::ok_empty(),
        ]));
        let client = S3ClientBuilder::new()
            .config(config(2))
            .transport(transport.clone())
            .build()
            .unwrap();

        client
            .api()
            .abort_multipart_upload("test-bucket", "key", "u-1")
            .await
            .unwrap();

        assert_eq!(transport.request_count(), 2);
    }
}
