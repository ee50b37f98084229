//! Remote multipart operations.
//!
//! [`MultipartApi`] is the seam between the upload engine and the object
//! store. [`S3MultipartApi`] speaks the S3 REST dialect over an
//! [`HttpTransport`](crate::transport::HttpTransport); tests substitute
//! [`InMemoryMultipartApi`](crate::mocks::InMemoryMultipartApi).

mod multipart;

pub use multipart::S3MultipartApi;

use crate::error::S3Error;
use crate::types::*;
use async_trait::async_trait;

/// The remote operations the upload engine consumes.
///
/// Every method maps onto one request. Implementations must not retry on
/// their own account beyond what their transport does.
#[async_trait]
pub trait MultipartApi: Send + Sync {
    /// Start a multipart upload and return its upload ID.
    async fn initiate_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<&str>,
    ) -> Result<String, S3Error>;

    /// Upload one part and return the entity tag the server assigned.
    async fn upload_part(&self, request: UploadPartRequest) -> Result<String, S3Error>;

    /// Assemble the uploaded parts into the final object.
    ///
    /// `parts` must be sorted ascending by part number.
    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<CompleteMultipartUploadOutput, S3Error>;

    /// Abort an upload and discard its parts.
    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Result<(), S3Error>;

    /// Fetch one page of the parts of an upload.
    async fn list_parts(&self, request: ListPartsRequest) -> Result<ListPartsOutput, S3Error>;

    /// Fetch one page of the in-progress uploads of a bucket.
    async fn list_multipart_uploads(
        &self,
        request: ListMultipartUploadsRequest,
    ) -> Result<ListMultipartUploadsOutput, S3Error>;

    /// Store a whole object with a single request.
    async fn put_object_single_part(
        &self,
        request: PutObjectRequest,
    ) -> Result<PutObjectOutput, S3Error>;
}
