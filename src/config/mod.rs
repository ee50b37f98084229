//! Client configuration.
//!
//! `S3Config` covers endpoint addressing, credentials, transport timeouts
//! and retry, plus the multipart knobs used by the upload engine.

use crate::credentials::{ChainCredentialsProvider, CredentialsProvider};
use crate::error::{ConfigurationError, S3Error};
use crate::transfer::PartSizePolicy;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Largest page the S3 listing APIs will return.
pub const MAX_LIST_PAGE_SIZE: u32 = 1000;

/// Configuration for the client.
#[derive(Clone)]
pub struct S3Config {
    /// AWS region (e.g., "us-east-1").
    pub region: String,

    /// Credentials provider.
    pub credentials_provider: Arc<dyn CredentialsProvider>,

    /// Custom endpoint URL for S3-compatible services.
    pub endpoint: Option<Url>,

    /// Use path-style addressing instead of virtual-hosted style.
    ///
    /// Path-style: `https://s3.region.amazonaws.com/bucket/key`
    /// Virtual-hosted: `https://bucket.s3.region.amazonaws.com/key`
    pub path_style: bool,

    /// Connection timeout.
    pub connect_timeout: Duration,

    /// Timeout for a single request, including the body upload.
    pub read_timeout: Duration,

    /// Maximum number of transport-level retries (0 disables retry).
    pub max_retries: u32,

    /// Initial backoff delay for retries.
    pub initial_backoff: Duration,

    /// Maximum backoff delay.
    pub max_backoff: Duration,

    /// Backoff multiplier for exponential backoff.
    pub backoff_multiplier: f64,

    /// Verify TLS certificates.
    pub verify_ssl: bool,

    /// Part sizing limits.
    pub part_size_policy: PartSizePolicy,

    /// Page size for part and upload listings.
    pub list_page_size: u32,

    /// Check resumed parts against the local data before skipping them.
    pub verify_resumed_parts: bool,

    /// Treat 32-hex ETags as the MD5 of the part. Only true for servers
    /// without SSE-KMS or SSE-C; when set, returned ETags are compared with
    /// the local digest and resumed parts are checked by MD5 as well as size.
    pub etags_are_md5: bool,
}

impl std::fmt::Debug for S3Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Config")
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("path_style", &self.path_style)
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("max_retries", &self.max_retries)
            .field("verify_ssl", &self.verify_ssl)
            .field("part_size_policy", &self.part_size_policy)
            .field("list_page_size", &self.list_page_size)
            .field("verify_resumed_parts", &self.verify_resumed_parts)
            .field("etags_are_md5", &self.etags_are_md5)
            .finish_non_exhaustive()
    }
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            credentials_provider: Arc::new(ChainCredentialsProvider::default()),
            endpoint: None,
            path_style: false,
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(300),
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(20),
            backoff_multiplier: 2.0,
            verify_ssl: true,
            part_size_policy: PartSizePolicy::default(),
            list_page_size: MAX_LIST_PAGE_SIZE,
            verify_resumed_parts: true,
            etags_are_md5: false,
        }
    }
}

impl S3Config {
    /// Create a new configuration builder.
    pub fn builder() -> S3ConfigBuilder {
        S3ConfigBuilder::default()
    }

    /// Base URL requests for `bucket` are sent to.
    pub fn resolve_endpoint(&self, bucket: Option<&str>) -> Result<Url, S3Error> {
        if let Some(endpoint) = &self.endpoint {
            return Ok(endpoint.clone());
        }

        let host = format!("s3.{}.amazonaws.com", self.region);
        let url_str = match bucket {
            Some(b) if !self.path_style => format!("https://{}.{}", b, host),
            _ => format!("https://{}", host),
        };

        Url::parse(&url_str).map_err(|e| {
            S3Error::Configuration(ConfigurationError::InvalidEndpoint {
                url: url_str.clone(),
                details: e.to_string(),
            })
        })
    }

    /// Path component for a bucket and optional key. Keys are not encoded here.
    pub fn build_path(&self, bucket: &str, key: Option<&str>) -> String {
        if self.path_style || self.endpoint.is_some() {
            match key {
                Some(k) => format!("/{}/{}", bucket, k),
                None => format!("/{}", bucket),
            }
        } else {
            match key {
                Some(k) => format!("/{}", k),
                None => "/".to_string(),
            }
        }
    }
}

/// Builder for [`S3Config`].
#[derive(Default)]
pub struct S3ConfigBuilder {
    region: Option<String>,
    credentials_provider: Option<Arc<dyn CredentialsProvider>>,
    endpoint: Option<Url>,
    path_style: Option<bool>,
    connect_timeout: Option<Duration>,
    read_timeout: Option<Duration>,
    max_retries: Option<u32>,
    initial_backoff: Option<Duration>,
    max_backoff: Option<Duration>,
    backoff_multiplier: Option<f64>,
    verify_ssl: Option<bool>,
    part_size_policy: Option<PartSizePolicy>,
    list_page_size: Option<u32>,
    verify_resumed_parts: Option<bool>,
    etags_are_md5: Option<bool>,
}

impl S3ConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the AWS region.
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Set the credentials provider.
    pub fn credentials_provider(mut self, provider: Arc<dyn CredentialsProvider>) -> Self {
        self.credentials_provider = Some(provider);
        self
    }

    /// Set a custom endpoint URL.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Result<Self, S3Error> {
        let url_str = endpoint.into();
        let url = Url::parse(&url_str).map_err(|e| {
            S3Error::Configuration(ConfigurationError::InvalidEndpoint {
                url: url_str.clone(),
                details: e.to_string(),
            })
        })?;
        self.endpoint = Some(url);
        Ok(self)
    }

    /// Enable path-style addressing.
    pub fn path_style(mut self, enabled: bool) -> Self {
        self.path_style = Some(enabled);
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the per-request timeout.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Set the maximum number of retries.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    /// Set the initial backoff delay.
    pub fn initial_backoff(mut self, delay: Duration) -> Self {
        self.initial_backoff = Some(delay);
        self
    }

    /// Set the maximum backoff delay.
    pub fn max_backoff(mut self, delay: Duration) -> Self {
        self.max_backoff = Some(delay);
        self
    }

    /// Set the backoff multiplier.
    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = Some(multiplier);
        self
    }

    /// Enable or disable TLS verification.
    pub fn verify_ssl(mut self, verify: bool) -> Self {
        self.verify_ssl = Some(verify);
        self
    }

    /// Override the part sizing limits.
    pub fn part_size_policy(mut self, policy: PartSizePolicy) -> Self {
        self.part_size_policy = Some(policy);
        self
    }

    /// Set the listing page size.
    pub fn list_page_size(mut self, size: u32) -> Self {
        self.list_page_size = Some(size);
        self
    }

    /// Enable or disable resumed-part verification.
    pub fn verify_resumed_parts(mut self, verify: bool) -> Self {
        self.verify_resumed_parts = Some(verify);
        self
    }

    /// Treat plain-hex ETags as content MD5s.
    pub fn etags_are_md5(mut self, enabled: bool) -> Self {
        self.etags_are_md5 = Some(enabled);
        self
    }

    /// Load configuration from environment variables.
    ///
    /// Values already set on the builder are overwritten by present variables;
    /// unparseable values are ignored.
    pub fn from_env(mut self) -> Self {
        if let Some(region) = env_var("AWS_REGION").or_else(|| env_var("AWS_DEFAULT_REGION")) {
            self.region = Some(region);
        }

        if let Some(url) = env_var("AWS_ENDPOINT_URL_S3")
            .or_else(|| env_var("AWS_ENDPOINT_URL"))
            .and_then(|e| Url::parse(&e).ok())
        {
            self.endpoint = Some(url);
        }

        if let Some(val) = env_var("S3MP_PATH_STYLE") {
            self.path_style = Some(parse_bool(&val));
        }
        if let Some(retries) = env_var("S3MP_MAX_RETRIES").and_then(|v| v.parse().ok()) {
            self.max_retries = Some(retries);
        }
        if let Some(ms) = env_var("S3MP_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.read_timeout = Some(Duration::from_millis(ms));
        }
        if let Some(val) = env_var("S3MP_VERIFY_RESUMED_PARTS") {
            self.verify_resumed_parts = Some(parse_bool(&val));
        }
        if let Some(val) = env_var("S3MP_ETAGS_ARE_MD5") {
            self.etags_are_md5 = Some(parse_bool(&val));
        }

        self
    }

    /// Build the configuration.
    pub fn build(self) -> Result<S3Config, S3Error> {
        let defaults = S3Config::default();

        let part_size_policy = self.part_size_policy.unwrap_or(defaults.part_size_policy);
        part_size_policy.validate()?;

        let list_page_size = self.list_page_size.unwrap_or(defaults.list_page_size);
        if list_page_size == 0 || list_page_size > MAX_LIST_PAGE_SIZE {
            return Err(S3Error::Configuration(ConfigurationError::InvalidConfiguration {
                field: "list_page_size".to_string(),
                message: format!("must be between 1 and {}", MAX_LIST_PAGE_SIZE),
            }));
        }

        Ok(S3Config {
            region: self.region.unwrap_or(defaults.region),
            credentials_provider: self
                .credentials_provider
                .unwrap_or(defaults.credentials_provider),
            endpoint: self.endpoint,
            path_style: self.path_style.unwrap_or(defaults.path_style),
            connect_timeout: self.connect_timeout.unwrap_or(defaults.connect_timeout),
            read_timeout: self.read_timeout.unwrap_or(defaults.read_timeout),
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            initial_backoff: self.initial_backoff.unwrap_or(defaults.initial_backoff),
            max_backoff: self.max_backoff.unwrap_or(defaults.max_backoff),
            backoff_multiplier: self.backoff_multiplier.unwrap_or(defaults.backoff_multiplier),
            verify_ssl: self.verify_ssl.unwrap_or(defaults.verify_ssl),
            part_size_policy,
            list_page_size,
            verify_resumed_parts: self
                .verify_resumed_parts
                .unwrap_or(defaults.verify_resumed_parts),
            etags_are_md5: self.etags_are_md5.unwrap_or(defaults.etags_are_md5),
        })
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = S3Config::default();
        assert_eq!(config.region, "us-east-1");
        assert!(config.endpoint.is_none());
        assert_eq!(config.list_page_size, 1000);
        assert!(config.verify_resumed_parts);
        assert!(!config.etags_are_md5);
        assert_eq!(config.part_size_policy, PartSizePolicy::default());
    }

    #[test]
    fn test_builder() {
        let config = S3Config::builder()
            .region("eu-west-1")
            .max_retries(0)
            .path_style(true)
            .list_page_size(2)
            .verify_resumed_parts(false)
            .etags_are_md5(true)
            .build()
            .unwrap();

        assert_eq!(config.region, "eu-west-1");
        assert_eq!(config.max_retries, 0);
        assert!(config.path_style);
        assert_eq!(config.list_page_size, 2);
        assert!(!config.verify_resumed_parts);
        assert!(config.etags_are_md5);
    }

    #[test]
    fn test_rejects_oversized_page() {
        assert!(S3Config::builder().list_page_size(1001).build().is_err());
        assert!(S3Config::builder().list_page_size(0).build().is_err());
    }

    #[test]
    fn test_rejects_inconsistent_part_policy() {
        let policy = PartSizePolicy {
            max_part_count: 10_000,
            min_part_size: 10,
            max_part_size: 5,
        };
        assert!(S3Config::builder().part_size_policy(policy).build().is_err());
    }

    #[test]
    fn test_resolve_endpoint() {
        let config = S3Config::default();
        assert_eq!(
            config.resolve_endpoint(Some("my-bucket")).unwrap().as_str(),
            "https://my-bucket.s3.us-east-1.amazonaws.com/"
        );

        let path_style = S3Config::builder().path_style(true).build().unwrap();
        assert_eq!(
            path_style.resolve_endpoint(Some("my-bucket")).unwrap().as_str(),
            "https://s3.us-east-1.amazonaws.com/"
        );

        let custom = S3Config::builder()
            .endpoint("http://localhost:9000")
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(
            custom.resolve_endpoint(Some("my-bucket")).unwrap().as_str(),
            "http://localhost:9000/"
        );
    }

    #[test]
    fn test_build_path() {
        let config = S3Config::default();
        assert_eq!(config.build_path("bucket", Some("dir/key")), "/dir/key");
        assert_eq!(config.build_path("bucket", None), "/");

        let path_style = S3Config::builder().path_style(true).build().unwrap();
        assert_eq!(path_style.build_path("bucket", Some("dir/key")), "/bucket/dir/key");
        assert_eq!(path_style.build_path("bucket", None), "/bucket");
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("TRUE"));
        assert!(parse_bool("1"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool("nope"));
    }
}
