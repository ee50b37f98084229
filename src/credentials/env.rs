//! Environment variable credentials provider.

use super::{AwsCredentials, CredentialsProvider};
use crate::error::{CredentialsError, S3Error};
use async_trait::async_trait;
use std::env;

/// Access key ID variable.
pub const AWS_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
/// Secret access key variable.
pub const AWS_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
/// Optional session token variable.
pub const AWS_SESSION_TOKEN: &str = "AWS_SESSION_TOKEN";

/// Reads credentials from `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY` and
/// `AWS_SESSION_TOKEN`, or from custom variable names.
#[derive(Debug, Clone)]
pub struct EnvCredentialsProvider {
    access_key_var: String,
    secret_key_var: String,
    session_token_var: String,
}

impl EnvCredentialsProvider {
    /// Create a provider reading the standard variables.
    pub fn new() -> Self {
        Self::with_vars(AWS_ACCESS_KEY_ID, AWS_SECRET_ACCESS_KEY, AWS_SESSION_TOKEN)
    }

    /// Create a provider with custom variable names.
    pub fn with_vars(
        access_key_var: impl Into<String>,
        secret_key_var: impl Into<String>,
        session_token_var: impl Into<String>,
    ) -> Self {
        Self {
            access_key_var: access_key_var.into(),
            secret_key_var: secret_key_var.into(),
            session_token_var: session_token_var.into(),
        }
    }

    fn required(&self, var: &str) -> Result<String, S3Error> {
        match env::var(var) {
            Ok(value) if value.is_empty() => Err(S3Error::Credentials(CredentialsError::Invalid {
                message: format!("{} is empty", var),
            })),
            Ok(value) => Ok(value),
            Err(_) => Err(S3Error::Credentials(CredentialsError::NotFound)),
        }
    }
}

impl Default for EnvCredentialsProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialsProvider for EnvCredentialsProvider {
    async fn get_credentials(&self) -> Result<AwsCredentials, S3Error> {
        let access_key_id = self.required(&self.access_key_var)?;
        let secret_access_key = self.required(&self.secret_key_var)?;

        let credentials = match env::var(&self.session_token_var).ok().filter(|s| !s.is_empty()) {
            Some(token) => AwsCredentials::with_session_token(access_key_id, secret_access_key, token),
            None => AwsCredentials::new(access_key_id, secret_access_key),
        };
        Ok(credentials)
    }

    fn name(&self) -> &'static str {
        "environment"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test uses its own variable names so tests can run in parallel.

    #[tokio::test]
    async fn test_reads_custom_vars() {
        env::set_var("S3MP_TEST_ENV_AK_1", "AKID");
        env::set_var("S3MP_TEST_ENV_SK_1", "SECRET");
        env::set_var("S3MP_TEST_ENV_TOKEN_1", "TOKEN");

        let provider =
            EnvCredentialsProvider::with_vars("S3MP_TEST_ENV_AK_1", "S3MP_TEST_ENV_SK_1", "S3MP_TEST_ENV_TOKEN_1");
        let creds = provider.get_credentials().await.unwrap();

        assert_eq!(creds.access_key_id(), "AKID");
        assert_eq!(creds.secret_access_key(), "SECRET");
        assert_eq!(creds.session_token(), Some("TOKEN"));
    }

    #[tokio::test]
    async fn test_missing_vars() {
        let provider =
            EnvCredentialsProvider::with_vars("S3MP_TEST_ENV_AK_2", "S3MP_TEST_ENV_SK_2", "S3MP_TEST_ENV_TOKEN_2");
        let err = provider.get_credentials().await.unwrap_err();
        assert!(matches!(err, S3Error::Credentials(CredentialsError::NotFound)));
    }

    #[tokio::test]
    async fn test_empty_secret_is_invalid() {
        env::set_var("S3MP_TEST_ENV_AK_3", "AKID");
        env::set_var("S3MP_TEST_ENV_SK_3", "");

        let provider =
            EnvCredentialsProvider::with_vars("S3MP_TEST_ENV_AK_3", "S3MP_TEST_ENV_SK_3", "S3MP_TEST_ENV_TOKEN_3");
        let err = provider.get_credentials().await.unwrap_err();
        assert!(matches!(err, S3Error::Credentials(CredentialsError::Invalid { .. })));
    }
}
