//! Response types for the multipart API.

use super::common::*;

/// Response from a single-part put.
#[derive(Debug, Clone, Default)]
pub struct PutObjectOutput {
    /// ETag of the stored object.
    pub e_tag: Option<String>,
    /// Version ID if versioning is enabled.
    pub version_id: Option<String>,
    /// AWS request ID.
    pub request_id: Option<String>,
}

/// Response from complete multipart upload.
#[derive(Debug, Clone, Default)]
pub struct CompleteMultipartUploadOutput {
    /// Bucket name.
    pub bucket: Option<String>,
    /// Object key.
    pub key: Option<String>,
    /// Final object ETag.
    pub e_tag: Option<String>,
    /// Object location URL.
    pub location: Option<String>,
    /// Version ID.
    pub version_id: Option<String>,
    /// AWS request ID.
    pub request_id: Option<String>,
}

/// One page of a part listing.
#[derive(Debug, Clone, Default)]
pub struct ListPartsOutput {
    /// Bucket name.
    pub bucket: Option<String>,
    /// Object key.
    pub key: Option<String>,
    /// Upload ID.
    pub upload_id: Option<String>,
    /// Part number marker the page started after.
    pub part_number_marker: Option<u32>,
    /// Cursor for the next page.
    pub next_part_number_marker: Option<u32>,
    /// Page size.
    pub max_parts: Option<u32>,
    /// More pages follow.
    pub is_truncated: bool,
    /// Parts in ascending number order.
    pub parts: Vec<Part>,
    /// AWS request ID.
    pub request_id: Option<String>,
}

/// One page of the in-progress upload listing.
#[derive(Debug, Clone, Default)]
pub struct ListMultipartUploadsOutput {
    /// Bucket name.
    pub bucket: Option<String>,
    /// Prefix filter.
    pub prefix: Option<String>,
    /// Delimiter.
    pub delimiter: Option<String>,
    /// Key marker.
    pub key_marker: Option<String>,
    /// Upload ID marker.
    pub upload_id_marker: Option<String>,
    /// Next key marker for pagination.
    pub next_key_marker: Option<String>,
    /// Next upload ID marker for pagination.
    pub next_upload_id_marker: Option<String>,
    /// Maximum uploads.
    pub max_uploads: Option<u32>,
    /// More pages follow.
    pub is_truncated: bool,
    /// Uploads on this page.
    pub uploads: Vec<MultipartUpload>,
    /// Common prefixes when a delimiter was given.
    pub common_prefixes: Vec<String>,
    /// AWS request ID.
    pub request_id: Option<String>,
}
