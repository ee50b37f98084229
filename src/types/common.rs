//! Core data model shared by the services and the upload engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One multipart upload in flight, identified by bucket, key and upload ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UploadSession {
    /// Bucket name.
    pub bucket: String,
    /// Object key.
    pub key: String,
    /// Server-assigned upload ID, never empty.
    pub upload_id: String,
}

impl UploadSession {
    /// Create a session handle.
    pub fn new(
        bucket: impl Into<String>,
        key: impl Into<String>,
        upload_id: impl Into<String>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            upload_id: upload_id.into(),
        }
    }
}

impl fmt::Display for UploadSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} ({})", self.bucket, self.key, self.upload_id)
    }
}

/// A part confirmed by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    /// Part number (1-10000).
    pub part_number: u32,
    /// ETag of the uploaded part, as returned by the server (usually quoted).
    pub e_tag: String,
    /// Size of the part in bytes.
    pub size: u64,
    /// Last modified date.
    pub last_modified: Option<String>,
}

impl Part {
    /// Create a new part.
    pub fn new(part_number: u32, e_tag: impl Into<String>, size: u64) -> Self {
        Self {
            part_number,
            e_tag: e_tag.into(),
            size,
            last_modified: None,
        }
    }
}

/// Part entry sent with the completion call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedPart {
    /// Part number.
    pub part_number: u32,
    /// ETag, passed back verbatim.
    pub e_tag: String,
}

impl From<Part> for CompletedPart {
    fn from(part: Part) -> Self {
        Self {
            part_number: part.part_number,
            e_tag: part.e_tag,
        }
    }
}

/// Entry from the in-progress multipart upload listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultipartUpload {
    /// Object key.
    pub key: String,
    /// Upload ID.
    pub upload_id: String,
    /// Upload initiated date.
    pub initiated: Option<String>,
}

impl MultipartUpload {
    /// Session handle for this upload in `bucket`.
    pub fn session(&self, bucket: &str) -> UploadSession {
        UploadSession::new(bucket, self.key.clone(), self.upload_id.clone())
    }
}

/// An incomplete upload together with how much of it is already stored.
///
/// In non-recursive listings a common prefix is reported as an entry with no
/// upload ID and a size of zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncompleteUpload {
    /// Object key, or the common prefix.
    pub key: String,
    /// Upload ID; `None` for a common prefix.
    pub upload_id: Option<String>,
    /// Upload initiated date.
    pub initiated: Option<String>,
    /// Sum of the sizes of the parts uploaded so far.
    pub size: u64,
}

impl IncompleteUpload {
    /// True if this entry is a common prefix rather than an upload.
    pub fn is_prefix(&self) -> bool {
        self.upload_id.is_none()
    }
}

/// Strip surrounding quotes from an ETag.
pub fn normalize_etag(e_tag: &str) -> &str {
    e_tag.trim().trim_matches('"')
}

/// Returns the lowercase hex if the ETag looks like a plain MD5.
///
/// Multipart-object ETags (`<hex>-<n>`) yield `None`. A 32-hex ETag is not
/// proof of a content digest: objects under SSE-KMS or SSE-C carry ETags of
/// the same shape that are not MD5s of the data.
pub fn etag_md5_hex(e_tag: &str) -> Option<String> {
    let bare = normalize_etag(e_tag);
    (bare.len() == 32 && bare.chars().all(|c| c.is_ascii_hexdigit()))
        .then(|| bare.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_into_completed() {
        let completed: CompletedPart = Part::new(3, "\"abc\"", 10).into();
        assert_eq!(completed.part_number, 3);
        assert_eq!(completed.e_tag, "\"abc\"");
    }

    #[test]
    fn test_etag_md5_hex() {
        assert_eq!(
            etag_md5_hex("\"5EB63BBBE01EEED093CB22BB8F5ACDC3\"").as_deref(),
            Some("5eb63bbbe01eeed093cb22bb8f5acdc3")
        );
        assert_eq!(etag_md5_hex("\"5eb63bbbe01eeed093cb22bb8f5acdc3-2\""), None);
        assert_eq!(etag_md5_hex("etag-1"), None);
    }

    #[test]
    fn test_session_display() {
        let session = UploadSession::new("bucket", "dir/key", "u-1");
        assert_eq!(session.to_string(), "bucket/dir/key (u-1)");
    }
}
