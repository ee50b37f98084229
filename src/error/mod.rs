//! Error types for the multipart upload engine.
//!
//! Errors are grouped by where they originate: local validation and source
//! reads on one side, server responses and the network on the other. The
//! server-side groups together form the protocol error family that the
//! upload orchestrator propagates without retrying.

mod mapping;

pub use mapping::{map_http_status, map_s3_error_code, S3ErrorResponse};

use std::time::Duration;
use thiserror::Error;

/// Top-level error type for the crate.
#[derive(Debug, Error)]
pub enum S3Error {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Credential-related errors.
    #[error("Credentials error: {0}")]
    Credentials(#[from] CredentialsError),

    /// AWS signing errors.
    #[error("Signing error: {0}")]
    Signing(#[from] SigningError),

    /// Request validation errors.
    #[error("Request error: {0}")]
    Request(#[from] RequestError),

    /// Bucket operation errors.
    #[error("Bucket error: {0}")]
    Bucket(#[from] BucketError),

    /// Object operation errors.
    #[error("Object error: {0}")]
    Object(#[from] ObjectError),

    /// Multipart upload errors.
    #[error("Multipart error: {0}")]
    Multipart(#[from] MultipartError),

    /// Access and authorization errors.
    #[error("Access error: {0}")]
    Access(#[from] AccessError),

    /// Network and transport errors.
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// Server-side errors.
    #[error("Server error: {0}")]
    Server(#[from] ServerError),

    /// Response parsing errors.
    #[error("Response error: {0}")]
    Response(#[from] ResponseError),

    /// Source stream and body errors.
    #[error("Transfer error: {0}")]
    Transfer(#[from] TransferError),
}

impl S3Error {
    /// Returns true if the error is retryable at the transport level.
    pub fn is_retryable(&self) -> bool {
        match self {
            S3Error::Network(e) => e.is_retryable(),
            S3Error::Server(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Returns true if the error came back from a remote call.
    ///
    /// Local failures (bad configuration, a short source, request
    /// validation) are not protocol errors.
    pub fn is_protocol_error(&self) -> bool {
        match self {
            S3Error::Bucket(_)
            | S3Error::Object(_)
            | S3Error::Access(_)
            | S3Error::Network(_)
            | S3Error::Server(_)
            | S3Error::Response(_) => true,
            S3Error::Multipart(e) => e.is_protocol_error(),
            _ => false,
        }
    }

    /// Returns the retry delay hint if available.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            S3Error::Server(ServerError::SlowDown { retry_after, .. }) => *retry_after,
            S3Error::Server(ServerError::ServiceUnavailable { retry_after, .. }) => *retry_after,
            _ => None,
        }
    }

    /// Returns the HTTP status code if applicable.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            S3Error::Access(_) => Some(403),
            S3Error::Bucket(BucketError::NotFound { .. }) => Some(404),
            S3Error::Object(ObjectError::NotFound { .. }) => Some(404),
            S3Error::Multipart(MultipartError::UploadNotFound { .. }) => Some(404),
            S3Error::Multipart(MultipartError::PartUploadFailed { source, .. }) => {
                source.status_code()
            }
            S3Error::Request(_) => Some(400),
            S3Error::Server(ServerError::InternalError { .. }) => Some(500),
            S3Error::Server(ServerError::ServiceUnavailable { .. }) => Some(503),
            S3Error::Server(ServerError::SlowDown { .. }) => Some(503),
            S3Error::Server(ServerError::BadGateway { .. }) => Some(502),
            _ => None,
        }
    }

    /// Returns the S3 error code if available.
    pub fn s3_error_code(&self) -> Option<&str> {
        match self {
            S3Error::Bucket(e) => Some(e.code()),
            S3Error::Object(e) => Some(e.code()),
            S3Error::Multipart(e) => e.code(),
            S3Error::Access(e) => Some(e.code()),
            S3Error::Server(e) => Some(e.code()),
            _ => None,
        }
    }

    /// Returns the AWS request ID if available.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            S3Error::Bucket(e) => e.request_id(),
            S3Error::Object(e) => e.request_id(),
            S3Error::Multipart(e) => e.request_id(),
            S3Error::Access(e) => e.request_id(),
            S3Error::Server(e) => e.request_id(),
            _ => None,
        }
    }
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// Invalid endpoint URL.
    #[error("Invalid endpoint URL: {url} ({details})")]
    InvalidEndpoint {
        /// The invalid URL.
        url: String,
        /// Details about the validation error.
        details: String,
    },

    /// Invalid configuration value.
    #[error("Invalid configuration: {field} - {message}")]
    InvalidConfiguration {
        /// The configuration field name.
        field: String,
        /// Error message.
        message: String,
    },
}

/// Credential-related errors.
#[derive(Debug, Error)]
pub enum CredentialsError {
    /// No credentials could be found.
    #[error("Credentials not found: no credentials could be loaded from any source")]
    NotFound,

    /// Credentials have expired.
    #[error("Credentials expired: session credentials expired at {expiration}")]
    Expired {
        /// When the credentials expired.
        expiration: String,
    },

    /// Credentials are invalid.
    #[error("Invalid credentials: {message}")]
    Invalid {
        /// Details about why credentials are invalid.
        message: String,
    },
}

/// AWS Signature V4 signing errors.
#[derive(Debug, Error)]
pub enum SigningError {
    /// Signature calculation failed.
    #[error("Signature calculation failed: {message}")]
    CalculationFailed {
        /// Details about the calculation error.
        message: String,
    },
}

/// Request validation errors, raised before anything is sent.
#[derive(Debug, Error)]
pub enum RequestError {
    /// General validation error.
    #[error("Validation error: {message}")]
    Validation {
        /// Details about the validation error.
        message: String,
    },

    /// Invalid bucket name.
    #[error("Invalid bucket name '{bucket}': {reason}")]
    InvalidBucketName {
        /// The invalid bucket name.
        bucket: String,
        /// Reason why the name is invalid.
        reason: String,
    },

    /// Invalid object key.
    #[error("Invalid object key '{key}': {reason}")]
    InvalidObjectKey {
        /// The invalid object key.
        key: String,
        /// Reason why the key is invalid.
        reason: String,
    },

    /// Entity too large.
    #[error("Entity too large: {size} bytes exceeds maximum of {max_size} bytes")]
    EntityTooLarge {
        /// The size of the entity.
        size: u64,
        /// Maximum allowed size.
        max_size: u64,
    },

    /// Entity too small.
    #[error("Entity too small: {size} bytes is below minimum of {min_size} bytes")]
    EntityTooSmall {
        /// The size of the entity.
        size: u64,
        /// Minimum required size.
        min_size: u64,
    },
}

/// Bucket operation errors.
#[derive(Debug, Error)]
pub enum BucketError {
    /// Bucket not found.
    #[error("Bucket not found: '{bucket}'")]
    NotFound {
        /// The bucket name.
        bucket: String,
        /// AWS request ID.
        request_id: Option<String>,
    },

    /// Invalid bucket state.
    #[error("Invalid bucket state: '{bucket}' - {message}")]
    InvalidState {
        /// The bucket name.
        bucket: String,
        /// Error message.
        message: String,
        /// AWS request ID.
        request_id: Option<String>,
    },
}

impl BucketError {
    /// Returns the S3 error code.
    pub fn code(&self) -> &str {
        match self {
            BucketError::NotFound { .. } => "NoSuchBucket",
            BucketError::InvalidState { .. } => "InvalidBucketState",
        }
    }

    /// Returns the AWS request ID if available.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            BucketError::NotFound { request_id, .. }
            | BucketError::InvalidState { request_id, .. } => request_id.as_deref(),
        }
    }
}

/// Object operation errors.
#[derive(Debug, Error)]
pub enum ObjectError {
    /// Object not found.
    #[error("Object not found: '{bucket}/{key}'")]
    NotFound {
        /// The bucket name.
        bucket: String,
        /// The object key.
        key: String,
        /// AWS request ID.
        request_id: Option<String>,
    },

    /// Content-MD5 sent with the body did not match what the server received.
    #[error("Bad digest for '{bucket}/{key}'")]
    BadDigest {
        /// The bucket name.
        bucket: String,
        /// The object key.
        key: String,
        /// AWS request ID.
        request_id: Option<String>,
    },
}

impl ObjectError {
    /// Returns the S3 error code.
    pub fn code(&self) -> &str {
        match self {
            ObjectError::NotFound { .. } => "NoSuchKey",
            ObjectError::BadDigest { .. } => "BadDigest",
        }
    }

    /// Returns the AWS request ID if available.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            ObjectError::NotFound { request_id, .. }
            | ObjectError::BadDigest { request_id, .. } => request_id.as_deref(),
        }
    }
}

/// Outcome of one failed abort inside a bulk cleanup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbortFailure {
    /// Object key of the session.
    pub key: String,
    /// Upload ID of the session.
    pub upload_id: String,
    /// Rendered error from the abort call.
    pub message: String,
}

/// Multipart upload errors.
#[derive(Debug, Error)]
pub enum MultipartError {
    /// Upload not found.
    #[error("Upload not found: upload_id '{upload_id}' for '{bucket}/{key}'")]
    UploadNotFound {
        /// The bucket name.
        bucket: String,
        /// The object key.
        key: String,
        /// The upload ID.
        upload_id: String,
        /// AWS request ID.
        request_id: Option<String>,
    },

    /// Invalid part.
    #[error("Invalid part {part_number}: {reason}")]
    InvalidPart {
        /// The part number.
        part_number: u32,
        /// Reason why the part is invalid.
        reason: String,
        /// AWS request ID.
        request_id: Option<String>,
    },

    /// Invalid part order.
    #[error("Invalid part order: parts must be in ascending order")]
    InvalidPartOrder {
        /// AWS request ID.
        request_id: Option<String>,
    },

    /// Too many parts.
    #[error("Too many parts: maximum is 10,000 parts")]
    TooManyParts {
        /// AWS request ID.
        request_id: Option<String>,
    },

    /// A part upload call failed. The session stays open on the server.
    #[error("Upload of part {part_number} for '{bucket}/{key}' (upload_id '{upload_id}') failed: {source}")]
    PartUploadFailed {
        /// The bucket name.
        bucket: String,
        /// The object key.
        key: String,
        /// The upload ID.
        upload_id: String,
        /// The part number.
        part_number: u32,
        /// The underlying error.
        source: Box<S3Error>,
    },

    /// More than one in-progress session exists for the same key.
    #[error("Ambiguous in-progress upload for '{bucket}/{key}': {} sessions found ({})", upload_ids.len(), upload_ids.join(", "))]
    AmbiguousUpload {
        /// The bucket name.
        bucket: String,
        /// The object key.
        key: String,
        /// Every matching upload ID, in listing order.
        upload_ids: Vec<String>,
    },

    /// Some sessions failed to abort during a bulk cleanup.
    #[error("{} of {attempted} aborts failed in bucket '{bucket}'", failed.len())]
    PartialAbort {
        /// The bucket name.
        bucket: String,
        /// Number of abort calls attempted.
        attempted: usize,
        /// Each failed abort.
        failed: Vec<AbortFailure>,
    },
}

impl MultipartError {
    /// Returns the S3 error code, if this error came from the server.
    pub fn code(&self) -> Option<&str> {
        match self {
            MultipartError::UploadNotFound { .. } => Some("NoSuchUpload"),
            MultipartError::InvalidPart { .. } => Some("InvalidPart"),
            MultipartError::InvalidPartOrder { .. } => Some("InvalidPartOrder"),
            MultipartError::TooManyParts { .. } => Some("TooManyParts"),
            MultipartError::PartUploadFailed { source, .. } => source.s3_error_code(),
            MultipartError::AmbiguousUpload { .. } | MultipartError::PartialAbort { .. } => None,
        }
    }

    /// Returns the AWS request ID if available.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            MultipartError::UploadNotFound { request_id, .. }
            | MultipartError::InvalidPart { request_id, .. }
            | MultipartError::InvalidPartOrder { request_id }
            | MultipartError::TooManyParts { request_id } => request_id.as_deref(),
            MultipartError::PartUploadFailed { source, .. } => source.request_id(),
            MultipartError::AmbiguousUpload { .. } | MultipartError::PartialAbort { .. } => None,
        }
    }

    fn is_protocol_error(&self) -> bool {
        match self {
            MultipartError::PartUploadFailed { source, .. } => source.is_protocol_error(),
            MultipartError::AmbiguousUpload { .. } | MultipartError::PartialAbort { .. } => false,
            _ => true,
        }
    }
}

/// Access and authorization errors.
#[derive(Debug, Error)]
pub enum AccessError {
    /// Access denied.
    #[error("Access denied")]
    AccessDenied {
        /// Additional message if available.
        message: Option<String>,
        /// AWS request ID.
        request_id: Option<String>,
    },

    /// Invalid access key ID.
    #[error("Invalid access key ID")]
    InvalidAccessKeyId {
        /// AWS request ID.
        request_id: Option<String>,
    },

    /// Signature does not match.
    #[error("Signature does not match")]
    SignatureDoesNotMatch {
        /// AWS request ID.
        request_id: Option<String>,
    },

    /// Expired token.
    #[error("Token has expired")]
    ExpiredToken {
        /// AWS request ID.
        request_id: Option<String>,
    },
}

impl AccessError {
    /// Returns the S3 error code.
    pub fn code(&self) -> &str {
        match self {
            AccessError::AccessDenied { .. } => "AccessDenied",
            AccessError::InvalidAccessKeyId { .. } => "InvalidAccessKeyId",
            AccessError::SignatureDoesNotMatch { .. } => "SignatureDoesNotMatch",
            AccessError::ExpiredToken { .. } => "ExpiredToken",
        }
    }

    /// Returns the AWS request ID if available.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            AccessError::AccessDenied { request_id, .. }
            | AccessError::InvalidAccessKeyId { request_id }
            | AccessError::SignatureDoesNotMatch { request_id }
            | AccessError::ExpiredToken { request_id } => request_id.as_deref(),
        }
    }
}

/// Network and transport errors.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// Connection failed.
    #[error("Connection failed: {message}")]
    ConnectionFailed {
        /// Error message.
        message: String,
    },

    /// Request timed out.
    #[error("Request timed out after {duration:?}")]
    Timeout {
        /// The timeout duration.
        duration: Duration,
    },

    /// TLS/SSL error.
    #[error("TLS error: {message}")]
    TlsError {
        /// Error message.
        message: String,
    },

    /// Connection reset.
    #[error("Connection reset by peer")]
    ConnectionReset,
}

impl NetworkError {
    /// Returns true if the error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            NetworkError::ConnectionFailed { .. }
                | NetworkError::Timeout { .. }
                | NetworkError::ConnectionReset
        )
    }
}

/// Server-side errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Internal server error (500).
    #[error("Internal server error{}", message.as_deref().map(|m| format!(": {}", m)).unwrap_or_default())]
    InternalError {
        /// Error message.
        message: Option<String>,
        /// AWS request ID.
        request_id: Option<String>,
    },

    /// Service unavailable (503).
    #[error("Service unavailable")]
    ServiceUnavailable {
        /// Retry after duration hint.
        retry_after: Option<Duration>,
        /// AWS request ID.
        request_id: Option<String>,
    },

    /// Slow down (503) - rate limiting.
    #[error("Slow down - reduce request rate")]
    SlowDown {
        /// Retry after duration hint.
        retry_after: Option<Duration>,
        /// AWS request ID.
        request_id: Option<String>,
    },

    /// Bad gateway (502).
    #[error("Bad gateway")]
    BadGateway {
        /// AWS request ID.
        request_id: Option<String>,
    },
}

impl ServerError {
    /// Returns the S3 error code.
    pub fn code(&self) -> &str {
        match self {
            ServerError::InternalError { .. } => "InternalError",
            ServerError::ServiceUnavailable { .. } => "ServiceUnavailable",
            ServerError::SlowDown { .. } => "SlowDown",
            ServerError::BadGateway { .. } => "BadGateway",
        }
    }

    /// Returns the AWS request ID if available.
    pub fn request_id(&self) -> Option<&str> {
        match self {
            ServerError::InternalError { request_id, .. }
            | ServerError::ServiceUnavailable { request_id, .. }
            | ServerError::SlowDown { request_id, .. }
            | ServerError::BadGateway { request_id } => request_id.as_deref(),
        }
    }

    /// Returns true if the error is retryable.
    pub fn is_retryable(&self) -> bool {
        true
    }
}

/// Response parsing errors.
#[derive(Debug, Error)]
pub enum ResponseError {
    /// XML parse error.
    #[error("XML parse error: {message}")]
    XmlParseError {
        /// Error message.
        message: String,
    },

    /// Invalid response format.
    #[error("Invalid response: {message}")]
    InvalidResponse {
        /// Error message.
        message: String,
    },

    /// Missing required field.
    #[error("Missing required field '{field}' in response")]
    MissingField {
        /// The missing field name.
        field: String,
    },
}

/// Source stream and body errors.
#[derive(Debug, Error)]
pub enum TransferError {
    /// Reading the source failed.
    #[error("Source read failed at byte {bytes_transferred}: {message}")]
    StreamInterrupted {
        /// Bytes successfully read before the failure.
        bytes_transferred: u64,
        /// Error message.
        message: String,
    },

    /// The server confirmed a different digest than the one computed locally.
    #[error("Checksum mismatch on part {part_number}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// The part number (1 for single-part uploads).
        part_number: u32,
        /// Locally computed digest.
        expected: String,
        /// Digest reported by the server.
        actual: String,
    },

    /// The source ended before the declared size was reached.
    #[error(
        "Incomplete body for '{bucket}/{key}'{}: expected {expected} bytes, received {received} bytes",
        part_number.map(|n| format!(" at part {}", n)).unwrap_or_default()
    )]
    IncompleteBody {
        /// The bucket name.
        bucket: String,
        /// The object key.
        key: String,
        /// The part being read when the source ran dry, if multipart.
        part_number: Option<u32>,
        /// Expected total size.
        expected: u64,
        /// Bytes actually read.
        received: u64,
    },
}
