//! Credentials used to sign requests.
//!
//! Credentials come from an explicit key pair or from the standard
//! `AWS_*` environment variables, tried in that order by
//! [`ChainCredentialsProvider`].

mod chain;
mod env;

pub use chain::ChainCredentialsProvider;
pub use env::EnvCredentialsProvider;

use crate::error::{CredentialsError, S3Error};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use std::fmt;

/// Access key pair, optionally with a session token.
#[derive(Clone)]
pub struct AwsCredentials {
    access_key_id: String,
    secret_access_key: SecretString,
    session_token: Option<SecretString>,
    expiration: Option<DateTime<Utc>>,
}

impl AwsCredentials {
    /// Create long-term credentials.
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: SecretString::new(secret_access_key.into()),
            session_token: None,
            expiration: None,
        }
    }

    /// Create temporary credentials with a session token.
    pub fn with_session_token(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: impl Into<String>,
    ) -> Self {
        Self {
            session_token: Some(SecretString::new(session_token.into())),
            ..Self::new(access_key_id, secret_access_key)
        }
    }

    /// Attach an expiration time.
    pub fn expiring_at(mut self, expiration: DateTime<Utc>) -> Self {
        self.expiration = Some(expiration);
        self
    }

    /// Get the access key ID.
    pub fn access_key_id(&self) -> &str {
        &self.access_key_id
    }

    /// Get the secret access key. Never log the result.
    pub fn secret_access_key(&self) -> &str {
        self.secret_access_key.expose_secret()
    }

    /// Get the session token, if any.
    pub fn session_token(&self) -> Option<&str> {
        self.session_token.as_ref().map(|s| s.expose_secret().as_str())
    }

    /// Get the expiration time, if any.
    pub fn expiration(&self) -> Option<&DateTime<Utc>> {
        self.expiration.as_ref()
    }

    /// Check if credentials have expired.
    pub fn is_expired(&self) -> bool {
        self.expiration.map(|exp| Utc::now() >= exp).unwrap_or(false)
    }

    /// Check if credentials will expire within the given duration.
    pub fn will_expire_within(&self, duration: chrono::Duration) -> bool {
        self.expiration
            .map(|exp| Utc::now() + duration >= exp)
            .unwrap_or(false)
    }
}

impl fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .field(
                "session_token",
                &self.session_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expiration", &self.expiration)
            .finish()
    }
}

/// Source of credentials.
#[async_trait]
pub trait CredentialsProvider: Send + Sync {
    /// Get credentials from this provider.
    async fn get_credentials(&self) -> Result<AwsCredentials, S3Error>;

    /// Provider name for logging.
    fn name(&self) -> &'static str;
}

/// Provider that always returns the same credentials.
pub struct StaticCredentialsProvider {
    credentials: AwsCredentials,
}

impl StaticCredentialsProvider {
    /// Create a new static credentials provider.
    pub fn new(credentials: AwsCredentials) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl CredentialsProvider for StaticCredentialsProvider {
    async fn get_credentials(&self) -> Result<AwsCredentials, S3Error> {
        if self.credentials.is_expired() {
            return Err(S3Error::Credentials(CredentialsError::Expired {
                expiration: self
                    .credentials
                    .expiration()
                    .map(|e| e.to_rfc3339())
                    .unwrap_or_default(),
            }));
        }
        Ok(self.credentials.clone())
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

impl fmt::Debug for StaticCredentialsProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticCredentialsProvider")
            .field("credentials", &self.credentials)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_session_token_credentials() {
        let creds = AwsCredentials::with_session_token("AKID", "SECRET", "TOKEN");
        assert_eq!(creds.access_key_id(), "AKID");
        assert_eq!(creds.secret_access_key(), "SECRET");
        assert_eq!(creds.session_token(), Some("TOKEN"));
    }

    #[test]
    fn test_expiration() {
        let creds = AwsCredentials::new("AKID", "SECRET");
        assert!(!creds.is_expired());
        assert!(!creds.will_expire_within(Duration::hours(1)));

        let soon = AwsCredentials::new("AKID", "SECRET").expiring_at(Utc::now() + Duration::minutes(5));
        assert!(!soon.is_expired());
        assert!(soon.will_expire_within(Duration::minutes(10)));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let debug = format!("{:?}", AwsCredentials::with_session_token("AKID", "SECRET", "TOKEN"));
        assert!(debug.contains("AKID"));
        assert!(!debug.contains("SECRET"));
        assert!(!debug.contains("TOKEN"));
    }

    #[tokio::test]
    async fn test_static_provider_rejects_expired() {
        let expired =
            AwsCredentials::new("AKID", "SECRET").expiring_at(Utc::now() - Duration::hours(1));
        let provider = StaticCredentialsProvider::new(expired);

        let err = provider.get_credentials().await.unwrap_err();
        assert!(matches!(err, S3Error::Credentials(CredentialsError::Expired { .. })));
    }
}
