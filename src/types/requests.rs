//! Request types for the multipart API.

use bytes::Bytes;

/// Request to upload a single part.
#[derive(Debug, Clone)]
pub struct UploadPartRequest {
    /// Bucket name.
    pub bucket: String,
    /// Object key.
    pub key: String,
    /// Upload ID.
    pub upload_id: String,
    /// Part number (1-10000).
    pub part_number: u32,
    /// Part body.
    pub body: Bytes,
    /// Base64 MD5 of the body, sent as `Content-MD5`.
    pub content_md5: String,
}

impl UploadPartRequest {
    /// Create a new upload part request.
    pub fn new(
        bucket: impl Into<String>,
        key: impl Into<String>,
        upload_id: impl Into<String>,
        part_number: u32,
        body: impl Into<Bytes>,
        content_md5: impl Into<String>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            upload_id: upload_id.into(),
            part_number,
            body: body.into(),
            content_md5: content_md5.into(),
        }
    }
}

/// Request for one page of a part listing.
#[derive(Debug, Clone)]
pub struct ListPartsRequest {
    /// Bucket name.
    pub bucket: String,
    /// Object key.
    pub key: String,
    /// Upload ID.
    pub upload_id: String,
    /// Max parts to return.
    pub max_parts: Option<u32>,
    /// Return parts after this number.
    pub part_number_marker: Option<u32>,
}

impl ListPartsRequest {
    /// Create a new list parts request.
    pub fn new(
        bucket: impl Into<String>,
        key: impl Into<String>,
        upload_id: impl Into<String>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            upload_id: upload_id.into(),
            max_parts: None,
            part_number_marker: None,
        }
    }

    /// Set the page size.
    pub fn with_max_parts(mut self, max_parts: u32) -> Self {
        self.max_parts = Some(max_parts);
        self
    }

    /// Set the pagination cursor.
    pub fn with_part_number_marker(mut self, marker: u32) -> Self {
        self.part_number_marker = Some(marker);
        self
    }
}

/// Request for one page of the in-progress upload listing.
#[derive(Debug, Clone, Default)]
pub struct ListMultipartUploadsRequest {
    /// Bucket name.
    pub bucket: String,
    /// Prefix filter.
    pub prefix: Option<String>,
    /// Delimiter for hierarchy.
    pub delimiter: Option<String>,
    /// Key marker for pagination.
    pub key_marker: Option<String>,
    /// Upload ID marker for pagination.
    pub upload_id_marker: Option<String>,
    /// Maximum uploads to return.
    pub max_uploads: Option<u32>,
}

impl ListMultipartUploadsRequest {
    /// Create a new list multipart uploads request.
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            ..Default::default()
        }
    }

    /// Set prefix filter.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Set delimiter.
    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = Some(delimiter.into());
        self
    }

    /// Set max uploads.
    pub fn with_max_uploads(mut self, max_uploads: u32) -> Self {
        self.max_uploads = Some(max_uploads);
        self
    }

    /// Set the pagination cursor pair.
    pub fn with_markers(mut self, key_marker: Option<String>, upload_id_marker: Option<String>) -> Self {
        self.key_marker = key_marker;
        self.upload_id_marker = upload_id_marker;
        self
    }
}

/// Request to store a whole object with one PUT.
#[derive(Debug, Clone)]
pub struct PutObjectRequest {
    /// Bucket name.
    pub bucket: String,
    /// Object key.
    pub key: String,
    /// Object body.
    pub body: Bytes,
    /// Content type.
    pub content_type: Option<String>,
    /// Base64 MD5 of the body, sent as `Content-MD5`.
    pub content_md5: String,
}

impl PutObjectRequest {
    /// Create a new put request.
    pub fn new(
        bucket: impl Into<String>,
        key: impl Into<String>,
        body: impl Into<Bytes>,
        content_md5: impl Into<String>,
    ) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
            body: body.into(),
            content_type: None,
            content_md5: content_md5.into(),
        }
    }

    /// Set the content type.
    pub fn with_content_type(mut self, content_type: Option<String>) -> Self {
        self.content_type = content_type;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_uploads_request_builder() {
        let request = ListMultipartUploadsRequest::new("bucket")
            .with_prefix("logs/")
            .with_delimiter("/")
            .with_max_uploads(100)
            .with_markers(Some("logs/a".into()), Some("u-1".into()));

        assert_eq!(request.prefix.as_deref(), Some("logs/"));
        assert_eq!(request.delimiter.as_deref(), Some("/"));
        assert_eq!(request.max_uploads, Some(100));
        assert_eq!(request.key_marker.as_deref(), Some("logs/a"));
        assert_eq!(request.upload_id_marker.as_deref(), Some("u-1"));
    }

    #[test]
    fn test_list_parts_request_builder() {
        let request = ListPartsRequest::new("bucket", "key", "u-1")
            .with_max_parts(1000)
            .with_part_number_marker(42);

        assert_eq!(request.max_parts, Some(1000));
        assert_eq!(request.part_number_marker, Some(42));
    }
}
