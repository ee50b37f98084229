//! Resumable multipart uploads for S3-compatible object storage.
//!
//! # Features
//!
//! - **Resumable uploads**: an interrupted upload is picked up by the next
//!   `put_object` for the same key; parts already on the server are skipped
//! - **Part sizing**: part size derived from the object size within the
//!   10,000-part / 5 MiB / 5 GiB limits
//! - **Cleanup**: list and abort abandoned sessions, with per-session outcomes
//! - **AWS Signature V4**: requests signed for AWS and S3-compatible services
//! - **Transport retry**: exponential backoff below the upload engine
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use s3_multipart::{PutObjectInput, S3Client};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), s3_multipart::S3Error> {
//!     let client = s3_multipart::create_client_from_env()?;
//!
//!     let file = tokio::fs::File::open("backup.tar").await.map_err(|e| {
//!         s3_multipart::TransferError::StreamInterrupted {
//!             bytes_transferred: 0,
//!             message: e.to_string(),
//!         }
//!     })?;
//!     let size = 64 * 1024 * 1024;
//!
//!     let outcome = client
//!         .uploader()
//!         .put_object(PutObjectInput::new("my-bucket", "backup.tar", size), file)
//!         .await?;
//!
//!     println!("Uploaded {} parts, ETag {:?}", outcome.parts_uploaded, outcome.e_tag);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod credentials;
pub mod error;
pub mod mocks;
pub mod resilience;
pub mod services;
pub mod signing;
pub mod transfer;
pub mod transport;
pub mod types;
pub mod xml;

// Re-export main types at crate root
pub use client::{S3Client, S3ClientBuilder, S3ClientImpl};
pub use config::S3Config;
pub use credentials::{
    AwsCredentials, ChainCredentialsProvider, CredentialsProvider, EnvCredentialsProvider,
    StaticCredentialsProvider,
};
pub use error::{
    AbortFailure, AccessError, BucketError, ConfigurationError, CredentialsError, MultipartError,
    NetworkError, ObjectError, RequestError, ResponseError, S3Error, ServerError, SigningError,
    TransferError,
};
pub use services::{MultipartApi, S3MultipartApi};
pub use signing::{AwsSigner, AwsSignerV4};
pub use transfer::{
    AbortOutcome, AbortReport, Chunk, Chunker, Cleanup, PartSizePolicy, PutObjectInput,
    PutObjectOutcome, SkipSet, TransferProgress, UploadMode, Uploader,
};
pub use transport::{HttpRequest, HttpResponse, HttpTransport};
pub use types::{
    // Request types
    ListMultipartUploadsRequest,
    ListPartsRequest,
    PutObjectRequest,
    UploadPartRequest,
    // Response types
    CompleteMultipartUploadOutput,
    ListMultipartUploadsOutput,
    ListPartsOutput,
    PutObjectOutput,
    // Data model
    CompletedPart,
    IncompleteUpload,
    MultipartUpload,
    Part,
    UploadSession,
};

/// Create a new client from environment variables.
///
/// This will attempt to read configuration from:
/// - `AWS_REGION` / `AWS_DEFAULT_REGION` for region
/// - `AWS_ACCESS_KEY_ID` and `AWS_SECRET_ACCESS_KEY` for credentials
/// - `AWS_SESSION_TOKEN` for temporary credentials
/// - `AWS_ENDPOINT_URL_S3` / `AWS_ENDPOINT_URL` for custom endpoints
/// - `S3MP_*` for path-style addressing, retries, timeout and part verification
pub fn create_client_from_env() -> Result<S3ClientImpl> {
    S3ClientBuilder::new().from_env().build()
}

/// Create a new client with explicit configuration.
///
/// # Example
///
/// ```rust,no_run
/// use s3_multipart::{AwsCredentials, S3Config, StaticCredentialsProvider};
/// use std::sync::Arc;
///
/// let config = S3Config::builder()
///     .region("us-west-2")
///     .credentials_provider(Arc::new(StaticCredentialsProvider::new(
///         AwsCredentials::new("AKID", "SECRET"),
///     )))
///     .build()?;
///
/// let client = s3_multipart::create_client(config)?;
/// # Ok::<(), s3_multipart::S3Error>(())
/// ```
pub fn create_client(config: S3Config) -> Result<S3ClientImpl> {
    S3ClientBuilder::new().config(config).build()
}

/// Result type alias for S3 operations.
pub type Result<T> = std::result::Result<T, S3Error>;
