//! In-memory multipart server for testing the upload engine.

use crate::error::{map_s3_error_code, S3Error, S3ErrorResponse, ServerError};
use crate::services::MultipartApi;
use crate::transfer::PartDigest;
use crate::types::*;
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use uuid::Uuid;

/// Operations a failure can be injected into.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Initiate multipart upload.
    Initiate,
    /// Upload of the given part number, in any session.
    UploadPart(u32),
    /// Complete multipart upload.
    Complete,
    /// Abort of the given upload ID.
    Abort(String),
    /// List parts.
    ListParts,
    /// List multipart uploads.
    ListUploads,
    /// Single-part put.
    PutObject,
}

#[derive(Debug, Clone)]
struct StoredPart {
    data: Bytes,
    e_tag: String,
}

#[derive(Debug, Default)]
struct UploadState {
    initiated: String,
    content_type: Option<String>,
    parts: BTreeMap<u32, StoredPart>,
}

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    content_type: Option<String>,
}

type UploadKey = (String, String, String);

#[derive(Debug, Default)]
struct State {
    uploads: BTreeMap<UploadKey, UploadState>,
    objects: HashMap<(String, String), StoredObject>,
    completions: Vec<(UploadSession, Vec<CompletedPart>)>,
    failures: HashSet<Operation>,
    delayed_failures: HashMap<Operation, usize>,
    wrong_etags: HashSet<u32>,
    calls: Vec<String>,
    sequence: u64,
}

/// A fake object store implementing [`MultipartApi`] in memory.
///
/// Every call is recorded as a short line such as `upload_part bucket/key#3`.
/// ETags are quoted hex MD5s, as S3 returns for unencrypted parts.
#[derive(Debug, Default)]
pub struct InMemoryMultipartApi {
    state: Mutex<State>,
    min_part_size: u64,
}

impl InMemoryMultipartApi {
    /// Create an empty server that accepts parts of any size.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject completion when a part other than the last is smaller than
    /// `size`, as S3 does.
    pub fn with_min_part_size(mut self, size: u64) -> Self {
        self.min_part_size = size;
        self
    }

    /// Make every call to `operation` fail with a server error until
    /// [`clear_failures`](Self::clear_failures).
    pub fn fail_on(&self, operation: Operation) {
        self.state.lock().failures.insert(operation);
    }

    /// Let `successes` calls to `operation` through, then fail every later
    /// one as [`fail_on`](Self::fail_on) does.
    pub fn fail_after(&self, operation: Operation, successes: usize) {
        self.state.lock().delayed_failures.insert(operation, successes);
    }

    /// Remove all injected failures.
    pub fn clear_failures(&self) {
        let mut state = self.state.lock();
        state.failures.clear();
        state.delayed_failures.clear();
    }

    /// Answer uploads of `part_number` with an ETag that is not the MD5 of
    /// the data received.
    pub fn return_wrong_etag(&self, part_number: u32) {
        self.state.lock().wrong_etags.insert(part_number);
    }

    /// Create an in-progress upload directly.
    pub fn seed_upload(&self, bucket: &str, key: &str) -> UploadSession {
        let mut state = self.state.lock();
        let upload_id = next_upload_id(&mut state);
        let initiated = next_timestamp(&mut state);
        state.uploads.insert(
            (bucket.to_string(), key.to_string(), upload_id.clone()),
            UploadState {
                initiated,
                ..Default::default()
            },
        );
        UploadSession::new(bucket, key, upload_id)
    }

    /// Store a part in an existing upload directly.
    pub fn seed_part(&self, session: &UploadSession, part_number: u32, data: impl Into<Bytes>) {
        let data = data.into();
        let e_tag = quoted_md5(&data);
        if let Some(upload) = self.state.lock().uploads.get_mut(&upload_key(session)) {
            upload.parts.insert(part_number, StoredPart { data, e_tag });
        }
    }

    /// Calls received so far.
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().calls.clone()
    }

    /// Number of calls whose line starts with `operation`.
    pub fn call_count(&self, operation: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.split(' ').next() == Some(operation))
            .count()
    }

    /// Part numbers received by `upload_part`, in call order.
    pub fn uploaded_part_numbers(&self) -> Vec<u32> {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.starts_with("upload_part "))
            .filter_map(|c| c.rsplit('#').next().and_then(|n| n.parse().ok()))
            .collect()
    }

    /// Part lists passed to successful completion calls.
    pub fn completions(&self) -> Vec<(UploadSession, Vec<CompletedPart>)> {
        self.state.lock().completions.clone()
    }

    /// Body of a stored object.
    pub fn object(&self, bucket: &str, key: &str) -> Option<Bytes> {
        self.state
            .lock()
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|o| o.data.clone())
    }

    /// Content type of a stored object.
    pub fn object_content_type(&self, bucket: &str, key: &str) -> Option<String> {
        self.state
            .lock()
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .and_then(|o| o.content_type.clone())
    }

    /// Sessions still in progress in `bucket`.
    pub fn in_progress(&self, bucket: &str) -> Vec<UploadSession> {
        self.state
            .lock()
            .uploads
            .keys()
            .filter(|(b, _, _)| b == bucket)
            .map(|(b, k, u)| UploadSession::new(b, k, u))
            .collect()
    }

    fn begin(&self, state: &mut State, call: String, operation: Operation) -> Result<(), S3Error> {
        state.calls.push(call);
        if let Some(remaining) = state.delayed_failures.get_mut(&operation) {
            if *remaining == 0 {
                state.failures.insert(operation.clone());
            } else {
                *remaining -= 1;
            }
        }
        if state.failures.contains(&operation) {
            return Err(S3Error::Server(ServerError::InternalError {
                message: Some(format!("injected failure for {:?}", operation)),
                request_id: Some("in-memory".to_string()),
            }));
        }
        Ok(())
    }
}

fn upload_key(session: &UploadSession) -> UploadKey {
    (
        session.bucket.clone(),
        session.key.clone(),
        session.upload_id.clone(),
    )
}

fn next_upload_id(state: &mut State) -> String {
    state.sequence += 1;
    format!("{:06}-{}", state.sequence, Uuid::new_v4().simple())
}

fn next_timestamp(state: &mut State) -> String {
    state.sequence += 1;
    format!("2024-01-15T10:{:02}:{:02}.000Z", (state.sequence / 60) % 60, state.sequence % 60)
}

fn quoted_md5(data: &[u8]) -> String {
    format!("\"{}\"", PartDigest::compute(data).hex)
}

fn no_such_upload(bucket: &str, key: &str, upload_id: &str) -> S3Error {
    map_s3_error_code(
        "NoSuchUpload",
        Some(S3ErrorResponse {
            code: "NoSuchUpload".to_string(),
            message: "The specified upload does not exist.".to_string(),
            bucket: Some(bucket.to_string()),
            key: Some(key.to_string()),
            upload_id: Some(upload_id.to_string()),
            ..Default::default()
        }),
    )
}

fn s3_error(code: &str, message: impl Into<String>) -> S3Error {
    map_s3_error_code(
        code,
        Some(S3ErrorResponse {
            code: code.to_string(),
            message: message.into(),
            ..Default::default()
        }),
    )
}

#[async_trait]
impl MultipartApi for InMemoryMultipartApi {
    async fn initiate_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: Option<&str>,
    ) -> Result<String, S3Error> {
        let mut state = self.state.lock();
        self.begin(&mut state, format!("initiate {}/{}", bucket, key), Operation::Initiate)?;

        let upload_id = next_upload_id(&mut state);
        let initiated = next_timestamp(&mut state);
        state.uploads.insert(
            (bucket.to_string(), key.to_string(), upload_id.clone()),
            UploadState {
                initiated,
                content_type: content_type.map(String::from),
                parts: BTreeMap::new(),
            },
        );
        Ok(upload_id)
    }

    async fn upload_part(&self, request: UploadPartRequest) -> Result<String, S3Error> {
        let mut state = self.state.lock();
        self.begin(
            &mut state,
            format!("upload_part {}/{}#{}", request.bucket, request.key, request.part_number),
            Operation::UploadPart(request.part_number),
        )?;

        let digest = PartDigest::compute(&request.body);
        if digest.base64 != request.content_md5 {
            return Err(s3_error("BadDigest", "The Content-MD5 you specified did not match what we received."));
        }

        let e_tag = if state.wrong_etags.contains(&request.part_number) {
            quoted_md5(b"not the part body")
        } else {
            format!("\"{}\"", digest.hex)
        };

        let key = (request.bucket.clone(), request.key.clone(), request.upload_id.clone());
        let upload = state
            .uploads
            .get_mut(&key)
            .ok_or_else(|| no_such_upload(&request.bucket, &request.key, &request.upload_id))?;
        upload.parts.insert(
            request.part_number,
            StoredPart {
                data: request.body,
                e_tag: e_tag.clone(),
            },
        );
        Ok(e_tag)
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<CompleteMultipartUploadOutput, S3Error> {
        let mut state = self.state.lock();
        self.begin(&mut state, format!("complete {}/{}", bucket, key), Operation::Complete)?;

        if parts.windows(2).any(|w| w[0].part_number >= w[1].part_number) {
            return Err(s3_error("InvalidPartOrder", "The list of parts was not in ascending order."));
        }

        let upload_key = (bucket.to_string(), key.to_string(), upload_id.to_string());
        let upload = state
            .uploads
            .get(&upload_key)
            .ok_or_else(|| no_such_upload(bucket, key, upload_id))?;

        let mut body = BytesMut::new();
        for (index, part) in parts.iter().enumerate() {
            let stored = upload
                .parts
                .get(&part.part_number)
                .filter(|stored| stored.e_tag == part.e_tag)
                .ok_or_else(|| s3_error("InvalidPart", format!("part {} not found", part.part_number)))?;
            if index + 1 < parts.len() && (stored.data.len() as u64) < self.min_part_size {
                return Err(s3_error("EntityTooSmall", "Your proposed upload is smaller than the minimum allowed size"));
            }
            body.extend_from_slice(&stored.data);
        }

        let content_type = upload.content_type.clone();
        state.uploads.remove(&upload_key);
        state.objects.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                data: body.freeze(),
                content_type,
            },
        );
        let session = UploadSession::new(bucket, key, upload_id);
        state.completions.push((session, parts.to_vec()));

        Ok(CompleteMultipartUploadOutput {
            bucket: Some(bucket.to_string()),
            key: Some(key.to_string()),
            e_tag: Some(format!("\"{}-{}\"", PartDigest::compute(upload_id.as_bytes()).hex, parts.len())),
            location: Some(format!("http://in-memory/{}/{}", bucket, key)),
            version_id: None,
            request_id: Some("in-memory".to_string()),
        })
    }

    async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Result<(), S3Error> {
        let mut state = self.state.lock();
        self.begin(
            &mut state,
            format!("abort {}/{} {}", bucket, key, upload_id),
            Operation::Abort(upload_id.to_string()),
        )?;

        state
            .uploads
            .remove(&(bucket.to_string(), key.to_string(), upload_id.to_string()))
            .map(|_| ())
            .ok_or_else(|| no_such_upload(bucket, key, upload_id))
    }

    async fn list_parts(&self, request: ListPartsRequest) -> Result<ListPartsOutput, S3Error> {
        let mut state = self.state.lock();
        self.begin(
            &mut state,
            format!("list_parts {}/{}", request.bucket, request.key),
            Operation::ListParts,
        )?;

        let upload = state
            .uploads
            .get(&(request.bucket.clone(), request.key.clone(), request.upload_id.clone()))
            .ok_or_else(|| no_such_upload(&request.bucket, &request.key, &request.upload_id))?;

        let marker = request.part_number_marker.unwrap_or(0);
        let max_parts = request.max_parts.unwrap_or(1000).max(1) as usize;
        let mut remaining = upload.parts.range(marker + 1..);
        let parts: Vec<Part> = remaining
            .by_ref()
            .take(max_parts)
            .map(|(number, stored)| Part::new(*number, stored.e_tag.clone(), stored.data.len() as u64))
            .collect();
        let is_truncated = remaining.next().is_some();

        Ok(ListPartsOutput {
            bucket: Some(request.bucket),
            key: Some(request.key),
            upload_id: Some(request.upload_id),
            part_number_marker: request.part_number_marker,
            next_part_number_marker: parts.last().map(|p| p.part_number),
            max_parts: request.max_parts,
            is_truncated,
            parts,
            request_id: Some("in-memory".to_string()),
        })
    }

    async fn list_multipart_uploads(
        &self,
        request: ListMultipartUploadsRequest,
    ) -> Result<ListMultipartUploadsOutput, S3Error> {
        let mut state = self.state.lock();
        self.begin(
            &mut state,
            format!("list_multipart_uploads {}", request.bucket),
            Operation::ListUploads,
        )?;

        let prefix = request.prefix.clone().unwrap_or_default();

        // (key, upload id) sort keys; a common prefix sorts as its own key
        // with an empty upload id.
        let mut entries: BTreeMap<(String, String), Option<MultipartUpload>> = BTreeMap::new();
        for ((bucket, key, upload_id), upload) in &state.uploads {
            if bucket != &request.bucket || !key.starts_with(&prefix) {
                continue;
            }
            let rolled_up = request.delimiter.as_deref().and_then(|delimiter| {
                key[prefix.len()..]
                    .find(delimiter)
                    .map(|i| key[..prefix.len() + i + delimiter.len()].to_string())
            });
            match rolled_up {
                Some(common) => {
                    entries.insert((common, String::new()), None);
                }
                None => {
                    entries.insert(
                        (key.clone(), upload_id.clone()),
                        Some(MultipartUpload {
                            key: key.clone(),
                            upload_id: upload_id.clone(),
                            initiated: Some(upload.initiated.clone()),
                        }),
                    );
                }
            }
        }

        let after_marker = |(key, upload_id): &(String, String)| match (&request.key_marker, &request.upload_id_marker) {
            (Some(key_marker), Some(id_marker)) => (key, upload_id) > (key_marker, id_marker),
            (Some(key_marker), None) => key > key_marker,
            (None, _) => true,
        };

        let max_uploads = request.max_uploads.unwrap_or(1000).max(1) as usize;
        let (page, is_truncated) = {
            let mut remaining = entries.into_iter().filter(|(sort_key, _)| after_marker(sort_key));
            let page: Vec<((String, String), Option<MultipartUpload>)> =
                remaining.by_ref().take(max_uploads).collect();
            let is_truncated = remaining.next().is_some();
            (page, is_truncated)
        };

        let (next_key_marker, next_upload_id_marker) = match page.last() {
            Some(((key, _), None)) => (Some(key.clone()), None),
            Some(((key, upload_id), Some(_))) => (Some(key.clone()), Some(upload_id.clone())),
            None => (None, None),
        };

        let mut uploads = Vec::new();
        let mut common_prefixes = Vec::new();
        for ((key, _), upload) in page {
            match upload {
                Some(upload) => uploads.push(upload),
                None => common_prefixes.push(key),
            }
        }

        Ok(ListMultipartUploadsOutput {
            bucket: Some(request.bucket),
            prefix: request.prefix,
            delimiter: request.delimiter,
            key_marker: request.key_marker,
            upload_id_marker: request.upload_id_marker,
            next_key_marker,
            next_upload_id_marker,
            max_uploads: request.max_uploads,
            is_truncated,
            uploads,
            common_prefixes,
            request_id: Some("in-memory".to_string()),
        })
    }

    async fn put_object_single_part(
        &self,
        request: PutObjectRequest,
    ) -> Result<PutObjectOutput, S3Error> {
        let mut state = self.state.lock();
        self.begin(
            &mut state,
            format!("put_object {}/{}", request.bucket, request.key),
            Operation::PutObject,
        )?;

        let digest = PartDigest::compute(&request.body);
        if digest.base64 != request.content_md5 {
            return Err(s3_error("BadDigest", "The Content-MD5 you specified did not match what we received."));
        }

        state.objects.insert(
            (request.bucket, request.key),
            StoredObject {
                data: request.body,
                content_type: request.content_type,
            },
        );

        Ok(PutObjectOutput {
            e_tag: Some(format!("\"{}\"", digest.hex)),
            version_id: None,
            request_id: Some("in-memory".to_string()),
        })
    }
}
