//! Error code mapping from S3 responses to typed errors.

use super::*;

/// Parsed S3 error response.
#[derive(Debug, Clone, Default)]
pub struct S3ErrorResponse {
    /// S3 error code (e.g., "NoSuchUpload").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Affected bucket, if any.
    pub bucket: Option<String>,
    /// Affected key, if any.
    pub key: Option<String>,
    /// Affected upload ID, if any.
    pub upload_id: Option<String>,
    /// AWS request ID.
    pub request_id: Option<String>,
    /// Extended request ID.
    pub host_id: Option<String>,
}

/// Map an S3 error code to a typed error.
///
/// Unknown codes become a generic server error carrying the original code
/// and message.
pub fn map_s3_error_code(code: &str, response: Option<S3ErrorResponse>) -> S3Error {
    let resp = response.unwrap_or_else(|| S3ErrorResponse {
        code: code.to_string(),
        ..Default::default()
    });
    let message = (!resp.message.is_empty()).then(|| resp.message.clone());

    match code {
        "NoSuchBucket" => S3Error::Bucket(BucketError::NotFound {
            bucket: resp.bucket.unwrap_or_default(),
            request_id: resp.request_id,
        }),
        "InvalidBucketState" => S3Error::Bucket(BucketError::InvalidState {
            bucket: resp.bucket.unwrap_or_default(),
            message: resp.message,
            request_id: resp.request_id,
        }),

        "NoSuchKey" => S3Error::Object(ObjectError::NotFound {
            bucket: resp.bucket.unwrap_or_default(),
            key: resp.key.unwrap_or_default(),
            request_id: resp.request_id,
        }),
        "BadDigest" | "InvalidDigest" => S3Error::Object(ObjectError::BadDigest {
            bucket: resp.bucket.unwrap_or_default(),
            key: resp.key.unwrap_or_default(),
            request_id: resp.request_id,
        }),

        "NoSuchUpload" => S3Error::Multipart(MultipartError::UploadNotFound {
            bucket: resp.bucket.unwrap_or_default(),
            key: resp.key.unwrap_or_default(),
            upload_id: resp.upload_id.unwrap_or_default(),
            request_id: resp.request_id,
        }),
        "InvalidPart" => S3Error::Multipart(MultipartError::InvalidPart {
            part_number: 0,
            reason: resp.message,
            request_id: resp.request_id,
        }),
        "InvalidPartOrder" => S3Error::Multipart(MultipartError::InvalidPartOrder {
            request_id: resp.request_id,
        }),
        "TooManyParts" => S3Error::Multipart(MultipartError::TooManyParts {
            request_id: resp.request_id,
        }),

        "AccessDenied" => S3Error::Access(AccessError::AccessDenied {
            message,
            request_id: resp.request_id,
        }),
        "InvalidAccessKeyId" => S3Error::Access(AccessError::InvalidAccessKeyId {
            request_id: resp.request_id,
        }),
        "SignatureDoesNotMatch" => S3Error::Access(AccessError::SignatureDoesNotMatch {
            request_id: resp.request_id,
        }),
        "ExpiredToken" => S3Error::Access(AccessError::ExpiredToken {
            request_id: resp.request_id,
        }),

        "InternalError" => S3Error::Server(ServerError::InternalError {
            message,
            request_id: resp.request_id,
        }),
        "ServiceUnavailable" => S3Error::Server(ServerError::ServiceUnavailable {
            retry_after: None,
            request_id: resp.request_id,
        }),
        "SlowDown" => S3Error::Server(ServerError::SlowDown {
            retry_after: None,
            request_id: resp.request_id,
        }),

        "InvalidBucketName" => S3Error::Request(RequestError::InvalidBucketName {
            bucket: resp.bucket.unwrap_or_default(),
            reason: resp.message,
        }),
        "InvalidRequest" | "MalformedXML" | "InvalidArgument" => {
            S3Error::Request(RequestError::Validation {
                message: resp.message,
            })
        }
        "EntityTooLarge" => S3Error::Request(RequestError::EntityTooLarge {
            size: 0,
            max_size: 0,
        }),
        "EntityTooSmall" => S3Error::Request(RequestError::EntityTooSmall {
            size: 0,
            min_size: 0,
        }),

        _ => S3Error::Server(ServerError::InternalError {
            message: Some(format!("Unknown S3 error code {}: {}", code, resp.message)),
            request_id: resp.request_id,
        }),
    }
}

/// Map a bare HTTP status to a typed error, for responses without an XML body.
pub fn map_http_status(status: u16, request_id: Option<String>) -> S3Error {
    match status {
        400 => S3Error::Request(RequestError::Validation {
            message: "Bad request".to_string(),
        }),
        403 => S3Error::Access(AccessError::AccessDenied {
            message: None,
            request_id,
        }),
        404 => S3Error::Response(ResponseError::InvalidResponse {
            message: "Resource not found".to_string(),
        }),
        500 => S3Error::Server(ServerError::InternalError {
            message: None,
            request_id,
        }),
        502 => S3Error::Server(ServerError::BadGateway { request_id }),
        503 => S3Error::Server(ServerError::ServiceUnavailable {
            retry_after: None,
            request_id,
        }),
        _ => S3Error::Response(ResponseError::InvalidResponse {
            message: format!("Unexpected HTTP status {}", status),
        }),
    }
}
