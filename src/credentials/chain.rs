//! Provider chain with caching.

use super::{AwsCredentials, CredentialsProvider, EnvCredentialsProvider};
use crate::error::{CredentialsError, S3Error};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, trace};

/// Tries each provider in order and caches the first success.
///
/// Cached credentials are reused until they come within the refresh buffer
/// of their expiration.
pub struct ChainCredentialsProvider {
    providers: Vec<Arc<dyn CredentialsProvider>>,
    cached: RwLock<Option<CachedCredentials>>,
    refresh_buffer_seconds: i64,
}

struct CachedCredentials {
    credentials: AwsCredentials,
    provider_name: &'static str,
}

impl ChainCredentialsProvider {
    /// Chain containing only the environment provider.
    pub fn new() -> Self {
        Self::with_providers(vec![Arc::new(EnvCredentialsProvider::new())])
    }

    /// Chain with custom providers.
    pub fn with_providers(providers: Vec<Arc<dyn CredentialsProvider>>) -> Self {
        Self {
            providers,
            cached: RwLock::new(None),
            refresh_buffer_seconds: 300,
        }
    }

    /// Set the refresh buffer in seconds.
    pub fn with_refresh_buffer(mut self, seconds: i64) -> Self {
        self.refresh_buffer_seconds = seconds;
        self
    }

    /// Put a provider in front of the chain.
    pub fn prepend_provider(mut self, provider: Arc<dyn CredentialsProvider>) -> Self {
        self.providers.insert(0, provider);
        self
    }

    /// Drop any cached credentials.
    pub fn invalidate(&self) {
        *self.cached.write() = None;
    }

    fn cached_credentials(&self) -> Option<AwsCredentials> {
        let cache = self.cached.read();
        let cached = cache.as_ref()?;
        if cached
            .credentials
            .will_expire_within(chrono::Duration::seconds(self.refresh_buffer_seconds))
        {
            return None;
        }
        trace!(provider = cached.provider_name, "Using cached credentials");
        Some(cached.credentials.clone())
    }

    async fn try_providers(&self) -> Result<(AwsCredentials, &'static str), S3Error> {
        let mut last_error: Option<S3Error> = None;

        for provider in &self.providers {
            let name = provider.name();
            match provider.get_credentials().await {
                Ok(creds) => {
                    debug!(provider = name, "Credentials loaded");
                    return Ok((creds, name));
                }
                Err(e) => {
                    trace!(provider = name, error = %e, "Credentials provider failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(S3Error::Credentials(CredentialsError::NotFound)))
    }
}

impl Default for ChainCredentialsProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialsProvider for ChainCredentialsProvider {
    async fn get_credentials(&self) -> Result<AwsCredentials, S3Error> {
        if let Some(creds) = self.cached_credentials() {
            return Ok(creds);
        }

        let (creds, name) = self.try_providers().await?;
        *self.cached.write() = Some(CachedCredentials {
            credentials: creds.clone(),
            provider_name: name,
        });
        Ok(creds)
    }

    fn name(&self) -> &'static str {
        "chain"
    }
}

impl std::fmt::Debug for ChainCredentialsProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainCredentialsProvider")
            .field(
                "providers",
                &self.providers.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .field("refresh_buffer_seconds", &self.refresh_buffer_seconds)
            .finish()
    }
}
