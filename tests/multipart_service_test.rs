//! Integration tests for the HTTP multipart API and the engine running on it.

use bytes::Bytes;
use s3_multipart::config::S3Config;
use s3_multipart::mocks::{MockResponse, MockSigner, MockTransport, TestFixtures};
use s3_multipart::services::{MultipartApi, S3MultipartApi};
use s3_multipart::transfer::{PartDigest, PartSizePolicy};
use s3_multipart::types::*;
use s3_multipart::{
    AccessError, Cleanup, MultipartError, PutObjectInput, S3Error, ServerError, UploadMode, Uploader,
};
use std::sync::Arc;

fn create_api(transport: Arc<MockTransport>) -> Arc<S3MultipartApi> {
    let config = S3Config::builder()
        .region("us-east-1")
        .endpoint("http://localhost:9000")
        .unwrap()
        .path_style(true)
        .build()
        .unwrap();
    Arc::new(S3MultipartApi::new(
        Arc::new(config),
        transport,
        Arc::new(MockSigner::new()),
    ))
}

fn small_policy() -> PartSizePolicy {
    PartSizePolicy {
        max_part_count: 10_000,
        min_part_size: 4,
        max_part_size: 1024,
    }
}

#[tokio::test]
async fn test_complete_sends_ordered_xml() {
    let transport = Arc::new(MockTransport::with_responses(vec![
        MockResponse::ok_with_body(TestFixtures::complete_multipart_xml())
            .with_header("x-amz-request-id", "req-7")
            .with_header("x-amz-version-id", "v-3"),
    ]));
    let api = create_api(transport.clone());

    let parts = vec![
        CompletedPart { part_number: 1, e_tag: "\"etag-1\"".to_string() },
        CompletedPart { part_number: 2, e_tag: "\"etag-2\"".to_string() },
    ];
    let output = api
        .complete_multipart_upload("test-bucket", "test-key.bin", "upload-id-12345", &parts)
        .await
        .unwrap();

    assert_eq!(output.e_tag.as_deref(), Some("\"combined-etag-3\""));
    assert_eq!(
        output.location.as_deref(),
        Some("https://test-bucket.s3.amazonaws.com/test-key.bin")
    );
    assert_eq!(output.version_id.as_deref(), Some("v-3"));
    assert_eq!(output.request_id.as_deref(), Some("req-7"));

    let request = transport.last_request().unwrap();
    assert_eq!(request.method, "POST");
    assert_eq!(
        request.url,
        "http://localhost:9000/test-bucket/test-key.bin?uploadId=upload-id-12345"
    );
    let body = String::from_utf8(request.body.unwrap().to_vec()).unwrap();
    let first = body.find("<PartNumber>1</PartNumber>").unwrap();
    let second = body.find("<PartNumber>2</PartNumber>").unwrap();
    assert!(first < second);
    assert!(body.contains("<ETag>&quot;etag-1&quot;</ETag>"));
}

#[tokio::test]
async fn test_abort_sends_delete() {
    let transport = Arc::new(MockTransport::with_responses(vec![MockResponse::ok_empty()]));
    let api = create_api(transport.clone());

    api.abort_multipart_upload("test-bucket", "dir/key", "u+1")
        .await
        .unwrap();

    let request = transport.last_request().unwrap();
    assert_eq!(request.method, "DELETE");
    assert_eq!(request.url, "http://localhost:9000/test-bucket/dir/key?uploadId=u%2B1");
}

#[tokio::test]
async fn test_list_parts_query_and_parse() {
    let transport = Arc::new(MockTransport::with_responses(vec![MockResponse::ok_with_body(
        TestFixtures::list_parts_xml(&[(3, "\"etag-3\"", 5_242_880), (4, "\"etag-4\"", 1024)], Some(4), true),
    )]));
    let api = create_api(transport.clone());

    let output = api
        .list_parts(
            ListPartsRequest::new("test-bucket", "test-key.bin", "upload-id-12345")
                .with_max_parts(2)
                .with_part_number_marker(2),
        )
        .await
        .unwrap();

    assert!(output.is_truncated);
    assert_eq!(output.next_part_number_marker, Some(4));
    assert_eq!(output.parts.len(), 2);
    assert_eq!(output.parts[0], Part {
        part_number: 3,
        e_tag: "\"etag-3\"".to_string(),
        size: 5_242_880,
        last_modified: Some("2024-01-15T10:30:00.000Z".to_string()),
    });

    let request = transport.last_request().unwrap();
    assert_eq!(request.method, "GET");
    assert_eq!(
        request.url,
        "http://localhost:9000/test-bucket/test-key.bin?uploadId=upload-id-12345&max-parts=2&part-number-marker=2"
    );
}

#[tokio::test]
async fn test_list_uploads_with_markers() {
    let transport = Arc::new(MockTransport::with_responses(vec![MockResponse::ok_with_body(
        TestFixtures::list_multipart_uploads_xml(&[("b.bin", "u-2")], Some(("b.bin", "u-2")), true),
    )]));
    let api = create_api(transport.clone());

    let output = api
        .list_multipart_uploads(
            ListMultipartUploadsRequest::new("test-bucket")
                .with_delimiter("/")
                .with_max_uploads(1)
                .with_markers(Some("a.bin".to_string()), Some("u-1".to_string())),
        )
        .await
        .unwrap();

    assert!(output.is_truncated);
    assert_eq!(output.uploads[0].key, "b.bin");
    assert_eq!(output.next_key_marker.as_deref(), Some("b.bin"));

    let request = transport.last_request().unwrap();
    assert_eq!(
        request.url,
        "http://localhost:9000/test-bucket?uploads&delimiter=%2F&key-marker=a.bin&max-uploads=1&upload-id-marker=u-1"
    );
}

#[tokio::test]
async fn test_server_errors_are_typed() {
    let transport = Arc::new(MockTransport::with_responses(vec![
        MockResponse::error(403, TestFixtures::error_xml("AccessDenied", "Access Denied")),
        MockResponse::error(503, ""),
    ]));
    let api = create_api(transport.clone());

    let denied = api
        .initiate_multipart_upload("test-bucket", "key", None)
        .await
        .unwrap_err();
    assert!(matches!(denied, S3Error::Access(AccessError::AccessDenied { .. })));
    assert_eq!(denied.request_id(), Some("test-request-id"));
    assert!(denied.is_protocol_error());

    let unavailable = api
        .abort_multipart_upload("test-bucket", "key", "u-1")
        .await
        .unwrap_err();
    assert!(matches!(
        unavailable,
        S3Error::Server(ServerError::ServiceUnavailable { .. })
    ));
    assert!(unavailable.is_retryable());
}

#[tokio::test]
async fn test_uploader_over_http() {
    let transport = Arc::new(MockTransport::with_responses(vec![
        MockResponse::ok_with_body(TestFixtures::list_multipart_uploads_xml(&[], None, false)),
        MockResponse::ok_with_body(TestFixtures::initiate_multipart_xml()),
        MockResponse::ok().with_header("ETag", "\"etag-1\""),
        MockResponse::ok().with_header("ETag", "\"etag-2\""),
        MockResponse::ok().with_header("ETag", "\"etag-3\""),
        MockResponse::ok_with_body(TestFixtures::complete_multipart_xml()),
    ]));
    let uploader = Uploader::new(create_api(transport.clone())).with_policy(small_policy());

    let outcome = uploader
        .put_object(
            PutObjectInput::new("test-bucket", "test-key.bin", 10),
            &b"0123456789"[..],
        )
        .await
        .unwrap();

    assert_eq!(outcome.mode, UploadMode::Multipart);
    assert_eq!(outcome.upload_id.as_deref(), Some("upload-id-12345"));
    assert_eq!(outcome.e_tag.as_deref(), Some("\"combined-etag-3\""));

    let requests = transport.requests();
    let methods: Vec<&str> = requests.iter().map(|r| r.method.as_str()).collect();
    assert_eq!(methods, vec!["GET", "POST", "PUT", "PUT", "PUT", "POST"]);

    let first_part = &requests[2];
    assert!(first_part.url.ends_with("?partNumber=1&uploadId=upload-id-12345"));
    assert_eq!(first_part.body, Some(Bytes::from_static(b"0123")));
    assert_eq!(
        first_part.headers.get("content-md5"),
        Some(&PartDigest::compute(b"0123").base64)
    );
    assert_eq!(requests[4].body, Some(Bytes::from_static(b"89")));

    let complete_body = String::from_utf8(requests[5].body.clone().unwrap().to_vec()).unwrap();
    assert!(complete_body.contains("<PartNumber>3</PartNumber><ETag>&quot;etag-3&quot;</ETag>"));
}

#[tokio::test]
async fn test_uploader_resumes_over_http() {
    let md5_of_first = PartDigest::compute(b"0123").hex;
    let stored_etag = format!("\"{}\"", md5_of_first);
    let transport = Arc::new(MockTransport::with_responses(vec![
        MockResponse::ok_with_body(TestFixtures::list_multipart_uploads_xml(
            &[("test-key.bin", "upload-id-12345")],
            None,
            false,
        )),
        MockResponse::ok_with_body(TestFixtures::list_parts_xml(&[(1, &stored_etag, 4)], Some(1), false)),
        MockResponse::ok().with_header("ETag", "\"etag-2\""),
        MockResponse::ok().with_header("ETag", "\"etag-3\""),
        MockResponse::ok_with_body(TestFixtures::complete_multipart_xml()),
    ]));
    let uploader = Uploader::new(create_api(transport.clone())).with_policy(small_policy());

    let outcome = uploader
        .put_object(
            PutObjectInput::new("test-bucket", "test-key.bin", 10),
            &b"0123456789"[..],
        )
        .await
        .unwrap();

    assert_eq!(outcome.mode, UploadMode::Resumed);
    assert_eq!(outcome.parts_skipped, 1);
    assert_eq!(outcome.parts_uploaded, 2);

    let requests = transport.requests();
    assert_eq!(requests.len(), 5);
    assert!(requests[2].url.contains("partNumber=2"));
    let complete_body = String::from_utf8(requests[4].body.clone().unwrap().to_vec()).unwrap();
    assert!(complete_body.contains(&format!(
        "<PartNumber>1</PartNumber><ETag>&quot;{}&quot;</ETag>",
        md5_of_first
    )));
}

#[tokio::test]
async fn test_part_failure_over_http_is_wrapped() {
    let transport = Arc::new(MockTransport::with_responses(vec![
        MockResponse::ok_with_body(TestFixtures::list_multipart_uploads_xml(&[], None, false)),
        MockResponse::ok_with_body(TestFixtures::initiate_multipart_xml()),
        MockResponse::error(404, TestFixtures::error_xml("NoSuchUpload", "gone")),
    ]));
    let uploader = Uploader::new(create_api(transport.clone())).with_policy(small_policy());

    let err = uploader
        .put_object(
            PutObjectInput::new("test-bucket", "test-key.bin", 10),
            &b"0123456789"[..],
        )
        .await
        .unwrap_err();

    match err {
        S3Error::Multipart(MultipartError::PartUploadFailed {
            part_number, source, ..
        }) => {
            assert_eq!(part_number, 1);
            assert!(matches!(
                *source,
                S3Error::Multipart(MultipartError::UploadNotFound { ref upload_id, .. })
                    if upload_id == "upload-id-12345"
            ));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(transport.request_count(), 3);
}

#[tokio::test]
async fn test_cleanup_over_http() {
    let transport = Arc::new(MockTransport::with_responses(vec![
        MockResponse::ok_with_body(TestFixtures::list_multipart_uploads_xml(
            &[("a.bin", "u-1"), ("b.bin", "u-2")],
            None,
            false,
        )),
        MockResponse::ok_empty(),
        MockResponse::error(403, TestFixtures::error_xml("AccessDenied", "no")),
    ]));
    let cleanup = Cleanup::new(create_api(transport.clone()));

    let report = cleanup.abort_all("test-bucket", None).await;

    assert_eq!(report.attempted(), 2);
    assert_eq!(report.aborted(), 1);
    let requests = transport.requests();
    assert!(requests[1].url.ends_with("/test-bucket/a.bin?uploadId=u-1"));
    assert!(requests[2].url.ends_with("/test-bucket/b.bin?uploadId=u-2"));
}
