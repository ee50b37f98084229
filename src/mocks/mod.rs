//! Mock implementations for testing.
//!
//! [`MockTransport`] and [`MockSigner`] drive the HTTP service layer with
//! canned responses; [`InMemoryMultipartApi`] stands in for the whole
//! object store when testing the upload engine.

mod credentials;
mod server;
mod signer;
mod transport;

pub use credentials::MockCredentialsProvider;
pub use server::{InMemoryMultipartApi, Operation};
pub use signer::{MockSigner, SignRequest};
pub use transport::{MockResponse, MockTransport};

use std::fmt::Write;

/// XML bodies shaped like real S3 responses.
pub struct TestFixtures;

impl TestFixtures {
    /// An `<Error>` document.
    pub fn error_xml(code: &str, message: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<Error>
    <Code>{}</Code>
    <Message>{}</Message>
    <RequestId>test-request-id</RequestId>
</Error>"#,
            code, message
        )
    }

    /// Response to `POST ?uploads`.
    pub fn initiate_multipart_xml() -> &'static str {
        r#"<?xml version="1.0" encoding="UTF-8"?>
<InitiateMultipartUploadResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
    <Bucket>test-bucket</Bucket>
    <Key>test-key.bin</Key>
    <UploadId>upload-id-12345</UploadId>
</InitiateMultipartUploadResult>"#
    }

    /// Response to a successful completion of a three-part upload.
    pub fn complete_multipart_xml() -> &'static str {
        r#"<?xml version="1.0" encoding="UTF-8"?>
<CompleteMultipartUploadResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
    <Location>https://test-bucket.s3.amazonaws.com/test-key.bin</Location>
    <Bucket>test-bucket</Bucket>
    <Key>test-key.bin</Key>
    <ETag>"combined-etag-3"</ETag>
</CompleteMultipartUploadResult>"#
    }

    /// One `ListPartsResult` page of `(part number, etag, size)` entries.
    pub fn list_parts_xml(parts: &[(u32, &str, u64)], next_marker: Option<u32>, truncated: bool) -> String {
        let mut xml = String::from(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<ListPartsResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
    <Bucket>test-bucket</Bucket>
    <Key>test-key.bin</Key>
    <UploadId>upload-id-12345</UploadId>
    <MaxParts>1000</MaxParts>
"#,
        );
        if let Some(marker) = next_marker {
            let _ = writeln!(xml, "    <NextPartNumberMarker>{}</NextPartNumberMarker>", marker);
        }
        let _ = writeln!(xml, "    <IsTruncated>{}</IsTruncated>", truncated);
        for (number, e_tag, size) in parts {
            let _ = writeln!(
                xml,
                "    <Part><PartNumber>{}</PartNumber><LastModified>2024-01-15T10:30:00.000Z</LastModified><ETag>{}</ETag><Size>{}</Size></Part>",
                number,
                e_tag.replace('"', "&quot;"),
                size
            );
        }
        xml.push_str("</ListPartsResult>");
        xml
    }

    /// One `ListMultipartUploadsResult` page of `(key, upload id)` entries.
    ///
    /// `next` is the `(NextKeyMarker, NextUploadIdMarker)` pair.
    pub fn list_multipart_uploads_xml(
        uploads: &[(&str, &str)],
        next: Option<(&str, &str)>,
        truncated: bool,
    ) -> String {
        let mut xml = String::from(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<ListMultipartUploadsResult xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
    <Bucket>test-bucket</Bucket>
    <MaxUploads>1000</MaxUploads>
"#,
        );
        if let Some((key_marker, upload_id_marker)) = next {
            let _ = writeln!(xml, "    <NextKeyMarker>{}</NextKeyMarker>", key_marker);
            let _ = writeln!(xml, "    <NextUploadIdMarker>{}</NextUploadIdMarker>", upload_id_marker);
        }
        let _ = writeln!(xml, "    <IsTruncated>{}</IsTruncated>", truncated);
        for (key, upload_id) in uploads {
            let _ = writeln!(
                xml,
                "    <Upload><Key>{}</Key><UploadId>{}</UploadId><Initiated>2024-01-15T10:30:00.000Z</Initiated></Upload>",
                key, upload_id
            );
        }
        xml.push_str("</ListMultipartUploadsResult>");
        xml
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml;

    #[test]
    fn test_list_fixtures_parse() {
        let parts = xml::parse_list_parts(&TestFixtures::list_parts_xml(&[(1, "\"a\"", 3)], None, false)).unwrap();
        assert_eq!(parts.parts[0].e_tag, "\"a\"");
        assert!(!parts.is_truncated);

        let uploads = xml::parse_list_multipart_uploads(&TestFixtures::list_multipart_uploads_xml(
            &[("k", "u-1")],
            Some(("k", "u-1")),
            true,
        ))
        .unwrap();
        assert_eq!(uploads.uploads[0].upload_id, "u-1");
        assert_eq!(uploads.next_upload_id_marker.as_deref(), Some("u-1"));
    }
}
