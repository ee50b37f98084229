//! The upload orchestrator.

use super::chunker::{Chunk, Chunker, SkipSet};
use super::listing::{list_in_progress_uploads, list_parts};
use super::part_size::PartSizePolicy;
use super::{ProgressCallback, TransferProgress};
use crate::config::{S3Config, MAX_LIST_PAGE_SIZE};
use crate::error::{MultipartError, RequestError, S3Error, TransferError};
use crate::services::MultipartApi;
use crate::types::*;
use futures::TryStreamExt;
use std::sync::Arc;
use tokio::io::AsyncRead;
use tracing::{debug, info, warn};

/// What to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutObjectInput {
    /// Bucket name.
    pub bucket: String,
    /// Object key.
    pub key: String,
    /// Content type of the object.
    pub content_type: Option<String>,
    /// Exact number of bytes the source holds. Must not change between an
    /// interrupted upload and its resumption.
    pub total_size: u64,
}

impl PutObjectInput {
    /// Describe an upload of `total_size` bytes.
    pub fn new(bucket: impl Into<String>, key: impl Into<String>, total_size: u64) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            content_type: None,
            total_size,
        }
    }

    /// Set the content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// How an object was uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadMode {
    /// One direct put.
    SinglePut,
    /// A fresh multipart session.
    Multipart,
    /// An existing multipart session picked up where it stopped.
    Resumed,
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PutObjectOutcome {
    /// Bucket name.
    pub bucket: String,
    /// Object key.
    pub key: String,
    /// How the object went up.
    pub mode: UploadMode,
    /// Upload ID of the multipart session, if one was used.
    pub upload_id: Option<String>,
    /// Final object ETag.
    pub e_tag: Option<String>,
    /// Object location, for multipart uploads.
    pub location: Option<String>,
    /// Version ID, if the bucket is versioned.
    pub version_id: Option<String>,
    /// Object size in bytes.
    pub size: u64,
    /// Parts sent by this call.
    pub parts_uploaded: u32,
    /// Parts already on the server and reused.
    pub parts_skipped: u32,
}

/// Parts gathered while driving a session.
#[derive(Debug, Default)]
struct DriveResult {
    completed: Vec<CompletedPart>,
    uploaded: u32,
    skipped: u32,
}

/// Uploads objects, resuming interrupted multipart sessions.
///
/// Parts are uploaded strictly one after another. A failure leaves the
/// multipart session on the server so a later call can resume it.
#[derive(Clone)]
pub struct Uploader {
    api: Arc<dyn MultipartApi>,
    policy: PartSizePolicy,
    list_page_size: u32,
    verify_resumed_parts: bool,
    etags_are_md5: bool,
    progress: Option<ProgressCallback>,
}

impl Uploader {
    /// Create an uploader with the default S3 limits.
    pub fn new(api: Arc<dyn MultipartApi>) -> Self {
        Self {
            api,
            policy: PartSizePolicy::default(),
            list_page_size: MAX_LIST_PAGE_SIZE,
            verify_resumed_parts: true,
            etags_are_md5: false,
            progress: None,
        }
    }

    /// Create an uploader with the multipart settings of `config`.
    pub fn from_config(api: Arc<dyn MultipartApi>, config: &S3Config) -> Self {
        Self {
            api,
            policy: config.part_size_policy,
            list_page_size: config.list_page_size,
            verify_resumed_parts: config.verify_resumed_parts,
            etags_are_md5: config.etags_are_md5,
            progress: None,
        }
    }

    /// Use a different part size policy.
    pub fn with_policy(mut self, policy: PartSizePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Page size for the listings behind session resolution and resume.
    pub fn with_list_page_size(mut self, page_size: u32) -> Self {
        self.list_page_size = page_size.clamp(1, MAX_LIST_PAGE_SIZE);
        self
    }

    /// Check parts found on the server against the local bytes before
    /// reusing them.
    pub fn with_verify_resumed_parts(mut self, verify: bool) -> Self {
        self.verify_resumed_parts = verify;
        self
    }

    /// Treat plain-hex ETags as content MD5s.
    ///
    /// Off by default: with SSE-KMS or SSE-C the server returns 32-hex ETags
    /// that are not digests of the data. When on, an ETag returned for an
    /// upload must equal the local MD5, and resumed parts are also checked by
    /// MD5. Integrity in transit is covered by `Content-MD5` either way.
    pub fn with_md5_etags(mut self, enabled: bool) -> Self {
        self.etags_are_md5 = enabled;
        self
    }

    /// Report progress after every part.
    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    /// The part size policy in use.
    pub fn policy(&self) -> &PartSizePolicy {
        &self.policy
    }

    /// Upload `input.total_size` bytes read from `source`.
    ///
    /// Objects smaller than the minimum part size, including empty ones, go
    /// up with a single put. Larger objects resume the one in-progress
    /// session for the key if there is one and start a new one otherwise.
    pub async fn put_object<R>(&self, input: PutObjectInput, source: R) -> Result<PutObjectOutcome, S3Error>
    where
        R: AsyncRead + Unpin + Send,
    {
        self.validate(&input)?;

        if self.policy.is_single_put(input.total_size) {
            debug!(
                bucket = %input.bucket,
                key = %input.key,
                size = input.total_size,
                "Uploading with a single put"
            );
            return self.single_put(&input, source).await;
        }

        let (session, mode, skip) = match self.resolve_session(&input.bucket, &input.key).await? {
            Some(session) => {
                let skip = self.load_skip_set(&session).await?;
                info!(
                    bucket = %session.bucket,
                    key = %session.key,
                    upload_id = %session.upload_id,
                    confirmed_parts = skip.len(),
                    "Resuming multipart upload"
                );
                (session, UploadMode::Resumed, skip)
            }
            None => {
                let session = self.start_session(&input).await?;
                (session, UploadMode::Multipart, SkipSet::new())
            }
        };

        let drive = self.drive_parts(&session, &input, source, skip).await?;
        let output = self.complete(&session, drive.completed).await?;

        info!(
            bucket = %session.bucket,
            key = %session.key,
            upload_id = %session.upload_id,
            uploaded = drive.uploaded,
            skipped = drive.skipped,
            "Completed multipart upload"
        );

        Ok(PutObjectOutcome {
            bucket: input.bucket,
            key: input.key,
            mode,
            upload_id: Some(session.upload_id),
            e_tag: output.e_tag,
            location: output.location,
            version_id: output.version_id,
            size: input.total_size,
            parts_uploaded: drive.uploaded,
            parts_skipped: drive.skipped,
        })
    }

    /// Find the in-progress session for exactly this key.
    ///
    /// More than one matching session is an error rather than a guess.
    pub async fn resolve_session(&self, bucket: &str, key: &str) -> Result<Option<UploadSession>, S3Error> {
        let uploads: Vec<MultipartUpload> = list_in_progress_uploads(
            self.api.clone(),
            bucket,
            Some(key.to_string()),
            self.list_page_size,
        )
        .try_filter(|upload| futures::future::ready(upload.key == key))
        .try_collect()
        .await?;

        match uploads.len() {
            0 => Ok(None),
            1 => Ok(uploads.into_iter().next().map(|u| u.session(bucket))),
            _ => Err(S3Error::Multipart(MultipartError::AmbiguousUpload {
                bucket: bucket.to_string(),
                key: key.to_string(),
                upload_ids: uploads.into_iter().map(|u| u.upload_id).collect(),
            })),
        }
    }

    async fn start_session(&self, input: &PutObjectInput) -> Result<UploadSession, S3Error> {
        let upload_id = self
            .api
            .initiate_multipart_upload(&input.bucket, &input.key, input.content_type.as_deref())
            .await?;
        info!(
            bucket = %input.bucket,
            key = %input.key,
            upload_id = %upload_id,
            "Started multipart upload"
        );
        Ok(UploadSession::new(&input.bucket, &input.key, upload_id))
    }

    async fn load_skip_set(&self, session: &UploadSession) -> Result<SkipSet, S3Error> {
        list_parts(self.api.clone(), session.clone(), self.list_page_size)
            .try_collect()
            .await
    }

    async fn single_put<R>(&self, input: &PutObjectInput, source: R) -> Result<PutObjectOutcome, S3Error>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut chunker = Chunker::new(source, input.total_size, self.policy.min_part_size, SkipSet::new())
            .for_object(&input.bucket, &input.key);
        let incomplete = |received: u64| {
            S3Error::Transfer(TransferError::IncompleteBody {
                bucket: input.bucket.clone(),
                key: input.key.clone(),
                part_number: None,
                expected: input.total_size,
                received,
            })
        };
        let chunk = match chunker.next_chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => return Err(incomplete(0)),
            Err(S3Error::Transfer(TransferError::IncompleteBody { received, .. })) => {
                return Err(incomplete(received))
            }
            Err(e) => return Err(e),
        };

        let request = PutObjectRequest::new(&input.bucket, &input.key, chunk.data.clone(), &chunk.digest.base64)
            .with_content_type(input.content_type.clone());
        let output = self.api.put_object_single_part(request).await?;

        if let Some(e_tag) = output.e_tag.as_deref().filter(|_| self.etags_are_md5) {
            check_returned_etag(&chunk, e_tag)?;
        }
        self.report(input.total_size, input.total_size, None, None);

        Ok(PutObjectOutcome {
            bucket: input.bucket.clone(),
            key: input.key.clone(),
            mode: UploadMode::SinglePut,
            upload_id: None,
            e_tag: output.e_tag,
            location: None,
            version_id: output.version_id,
            size: input.total_size,
            parts_uploaded: 1,
            parts_skipped: 0,
        })
    }

    async fn drive_parts<R>(
        &self,
        session: &UploadSession,
        input: &PutObjectInput,
        source: R,
        skip: SkipSet,
    ) -> Result<DriveResult, S3Error>
    where
        R: AsyncRead + Unpin + Send,
    {
        let part_size = self.policy.compute_part_size(input.total_size);
        let total_parts = self.policy.part_count(input.total_size);
        if let Some(extra) = skip.iter().find(|p| p.part_number > total_parts) {
            warn!(
                upload_id = %session.upload_id,
                part_number = extra.part_number,
                total_parts = total_parts,
                "Session holds parts beyond the expected count; they will not be completed"
            );
        }

        let mut chunker = Chunker::new(source, input.total_size, part_size, skip)
            .for_object(&session.bucket, &session.key);
        let mut result = DriveResult::default();

        while let Some(chunk) = chunker.next_chunk().await? {
            let reusable = chunk
                .confirmed
                .as_ref()
                .filter(|remote| !self.verify_resumed_parts || confirmed_matches(&chunk, remote, self.etags_are_md5));

            let e_tag = match reusable {
                Some(remote) => {
                    debug!(
                        upload_id = %session.upload_id,
                        part_number = chunk.part_number,
                        size = chunk.size(),
                        "Skipping part already on the server"
                    );
                    result.skipped += 1;
                    remote.e_tag.clone()
                }
                None => {
                    if let Some(remote) = &chunk.confirmed {
                        warn!(
                            upload_id = %session.upload_id,
                            part_number = chunk.part_number,
                            remote_etag = %remote.e_tag,
                            remote_size = remote.size,
                            local_md5 = %chunk.digest.hex,
                            local_size = chunk.size(),
                            "Stored part does not match local data, uploading again"
                        );
                    }
                    let e_tag = self.upload_chunk(session, &chunk).await?;
                    result.uploaded += 1;
                    e_tag
                }
            };

            result.completed.push(CompletedPart {
                part_number: chunk.part_number,
                e_tag,
            });
            self.report(
                input.total_size,
                chunker.bytes_read(),
                Some(chunk.part_number),
                Some(total_parts),
            );
        }

        Ok(result)
    }

    async fn upload_chunk(&self, session: &UploadSession, chunk: &Chunk) -> Result<String, S3Error> {
        let request = UploadPartRequest::new(
            &session.bucket,
            &session.key,
            &session.upload_id,
            chunk.part_number,
            chunk.data.clone(),
            &chunk.digest.base64,
        );

        let e_tag = self.api.upload_part(request).await.map_err(|source| {
            S3Error::Multipart(MultipartError::PartUploadFailed {
                bucket: session.bucket.clone(),
                key: session.key.clone(),
                upload_id: session.upload_id.clone(),
                part_number: chunk.part_number,
                source: Box::new(source),
            })
        })?;
        if self.etags_are_md5 {
            check_returned_etag(chunk, &e_tag)?;
        }

        debug!(
            upload_id = %session.upload_id,
            part_number = chunk.part_number,
            size = chunk.size(),
            e_tag = %e_tag,
            "Uploaded part"
        );
        Ok(e_tag)
    }

    async fn complete(
        &self,
        session: &UploadSession,
        mut parts: Vec<CompletedPart>,
    ) -> Result<CompleteMultipartUploadOutput, S3Error> {
        parts.sort_by_key(|p| p.part_number);
        if parts.windows(2).any(|w| w[0].part_number >= w[1].part_number) {
            return Err(S3Error::Multipart(MultipartError::InvalidPartOrder { request_id: None }));
        }

        self.api
            .complete_multipart_upload(&session.bucket, &session.key, &session.upload_id, &parts)
            .await
    }

    fn validate(&self, input: &PutObjectInput) -> Result<(), S3Error> {
        validate_bucket_name(&input.bucket)?;
        if input.key.is_empty() || input.key.len() > 1024 {
            return Err(S3Error::Request(RequestError::InvalidObjectKey {
                key: input.key.clone(),
                reason: "object key must be 1 to 1024 bytes".to_string(),
            }));
        }
        let max_size = self.policy.max_object_size();
        if input.total_size > max_size {
            return Err(S3Error::Request(RequestError::EntityTooLarge {
                size: input.total_size,
                max_size,
            }));
        }
        Ok(())
    }

    fn report(&self, total: u64, transferred: u64, current_part: Option<u32>, total_parts: Option<u32>) {
        if let Some(callback) = &self.progress {
            callback(TransferProgress {
                total_bytes: total,
                transferred_bytes: transferred,
                current_part,
                total_parts,
            });
        }
    }
}

impl std::fmt::Debug for Uploader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Uploader")
            .field("policy", &self.policy)
            .field("list_page_size", &self.list_page_size)
            .field("verify_resumed_parts", &self.verify_resumed_parts)
            .field("etags_are_md5", &self.etags_are_md5)
            .finish_non_exhaustive()
    }
}

/// A stored part can be reused when its size matches and, with
/// `etags_are_md5`, its plain-hex ETag equals the local digest.
fn confirmed_matches(chunk: &Chunk, remote: &Part, etags_are_md5: bool) -> bool {
    if remote.size != chunk.size() {
        return false;
    }
    if !etags_are_md5 {
        return true;
    }
    match etag_md5_hex(&remote.e_tag) {
        Some(remote_md5) => remote_md5 == chunk.digest.hex,
        None => true,
    }
}

fn check_returned_etag(chunk: &Chunk, e_tag: &str) -> Result<(), S3Error> {
    match etag_md5_hex(e_tag) {
        Some(actual) if actual != chunk.digest.hex => {
            Err(S3Error::Transfer(TransferError::ChecksumMismatch {
                part_number: chunk.part_number,
                expected: chunk.digest.hex.clone(),
                actual,
            }))
        }
        _ => Ok(()),
    }
}

/// Bucket names are 3 to 63 lowercase letters, digits, dots or hyphens,
/// starting and ending with a letter or digit.
fn validate_bucket_name(bucket: &str) -> Result<(), S3Error> {
    let invalid = |reason: &str| {
        Err(S3Error::Request(RequestError::InvalidBucketName {
            bucket: bucket.to_string(),
            reason: reason.to_string(),
        }))
    };

    if !(3..=63).contains(&bucket.len()) {
        return invalid("bucket name must be 3 to 63 characters");
    }
    if !bucket
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '-')
    {
        return invalid("bucket name may only contain lowercase letters, digits, '.' and '-'");
    }
    let edges_ok = |c: Option<char>| c.is_some_and(|c| c.is_ascii_alphanumeric());
    if !edges_ok(bucket.chars().next()) || !edges_ok(bucket.chars().last()) {
        return invalid("bucket name must start and end with a letter or digit");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::InMemoryMultipartApi;
    use crate::transfer::PartDigest;
    use bytes::Bytes;

    #[test]
    fn test_bucket_name_validation() {
        assert!(validate_bucket_name("my-bucket.logs").is_ok());
        assert!(validate_bucket_name("ab").is_err());
        assert!(validate_bucket_name("My-Bucket").is_err());
        assert!(validate_bucket_name("-bucket").is_err());
        assert!(validate_bucket_name("bucket_name").is_err());
    }

    #[test]
    fn test_confirmed_matches() {
        let chunk = Chunk {
            part_number: 1,
            data: Bytes::from_static(b"hello"),
            digest: PartDigest::compute(b"hello"),
            confirmed: None,
        };
        let md5 = Part::new(1, "\"5d41402abc4b2a76b9719d911017c592\"", 5);
        let other_hex = Part::new(1, "\"00000000000000000000000000000000\"", 5);
        assert!(confirmed_matches(&chunk, &md5, true));
        assert!(!confirmed_matches(&chunk, &other_hex, true));
        assert!(!confirmed_matches(&chunk, &Part::new(1, "\"5d41402abc4b2a76b9719d911017c592\"", 4), true));
        assert!(confirmed_matches(&chunk, &Part::new(1, "\"opaque-kms-etag\"", 5), true));

        // Without MD5 ETags only the size counts.
        assert!(confirmed_matches(&chunk, &other_hex, false));
        assert!(!confirmed_matches(&chunk, &Part::new(1, "\"00000000000000000000000000000000\"", 4), false));
    }

    #[tokio::test]
    async fn test_invalid_key_makes_no_calls() {
        let server = Arc::new(InMemoryMultipartApi::new());
        let uploader = Uploader::new(server.clone());

        let err = uploader
            .put_object(PutObjectInput::new("bucket", "", 3), &b"abc"[..])
            .await
            .unwrap_err();

        assert!(matches!(err, S3Error::Request(RequestError::InvalidObjectKey { .. })));
        assert!(server.calls().is_empty());
    }

    #[tokio::test]
    async fn test_too_large_is_rejected() {
        let server = Arc::new(InMemoryMultipartApi::new());
        let policy = PartSizePolicy {
            max_part_count: 2,
            min_part_size: 4,
            max_part_size: 4,
        };
        let uploader = Uploader::new(server.clone()).with_policy(policy);

        let err = uploader
            .put_object(PutObjectInput::new("bucket", "key", 9), &b"123456789"[..])
            .await
            .unwrap_err();

        assert!(matches!(err, S3Error::Request(RequestError::EntityTooLarge { size: 9, max_size: 8 })));
        assert!(server.calls().is_empty());
    }

    #[tokio::test]
    async fn test_small_policy_multipart() {
        let server = Arc::new(InMemoryMultipartApi::new());
        let policy = PartSizePolicy {
            max_part_count: 100,
            min_part_size: 4,
            max_part_size: 64,
        };
        let uploader = Uploader::new(server.clone()).with_policy(policy);

        let outcome = uploader
            .put_object(PutObjectInput::new("bucket", "key", 10), &b"0123456789"[..])
            .await
            .unwrap();

        assert_eq!(outcome.mode, UploadMode::Multipart);
        assert_eq!(outcome.parts_uploaded, 3);
        assert_eq!(server.object("bucket", "key").unwrap(), Bytes::from_static(b"0123456789"));
    }
}
