//! Integration tests for bulk abort and incomplete-upload listing.

use futures::TryStreamExt;
use s3_multipart::mocks::{InMemoryMultipartApi, Operation};
use s3_multipart::{Cleanup, IncompleteUpload, MultipartError, S3Error};
use std::sync::Arc;

const BUCKET: &str = "test-bucket";

fn setup(page_size: u32) -> (Arc<InMemoryMultipartApi>, Cleanup) {
    let server = Arc::new(InMemoryMultipartApi::new());
    let cleanup = Cleanup::new(server.clone()).with_list_page_size(page_size);
    (server, cleanup)
}

#[tokio::test]
async fn test_abort_all_continues_past_failures() {
    let (server, cleanup) = setup(2);
    let first = server.seed_upload(BUCKET, "a.bin");
    let second = server.seed_upload(BUCKET, "b.bin");
    let third = server.seed_upload(BUCKET, "c.bin");
    server.fail_on(Operation::Abort(second.upload_id.clone()));

    let report = cleanup.abort_all(BUCKET, None).await;

    assert_eq!(report.attempted(), 3);
    assert_eq!(report.aborted(), 2);
    assert!(!report.is_success());
    let failed: Vec<&str> = report.failures().map(|o| o.session.upload_id.as_str()).collect();
    assert_eq!(failed, vec![second.upload_id.as_str()]);

    assert_eq!(server.call_count("abort"), 3);
    let remaining = server.in_progress(BUCKET);
    assert_eq!(remaining, vec![second.clone()]);
    assert!(!remaining.contains(&first));
    assert!(!remaining.contains(&third));

    match report.into_result().unwrap_err() {
        S3Error::Multipart(MultipartError::PartialAbort {
            bucket,
            attempted,
            failed,
        }) => {
            assert_eq!(bucket, BUCKET);
            assert_eq!(attempted, 3);
            assert_eq!(failed.len(), 1);
            assert_eq!(failed[0].key, "b.bin");
            assert_eq!(failed[0].upload_id, second.upload_id);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_abort_all_respects_prefix() {
    let (server, cleanup) = setup(1000);
    server.seed_upload(BUCKET, "logs/2024/a");
    server.seed_upload(BUCKET, "logs/2024/b");
    let kept = server.seed_upload(BUCKET, "data/c");

    let report = cleanup.abort_all(BUCKET, Some("logs/")).await;

    assert_eq!(report.into_result().unwrap(), 2);
    assert_eq!(server.in_progress(BUCKET), vec![kept]);
}

#[tokio::test]
async fn test_abort_all_empty_bucket() {
    let (server, cleanup) = setup(1000);

    let report = cleanup.abort_all(BUCKET, None).await;

    assert_eq!(report.attempted(), 0);
    assert!(report.is_success());
    assert_eq!(server.call_count("abort"), 0);
}

#[tokio::test]
async fn test_listing_failure_ends_scan() {
    let (server, cleanup) = setup(1000);
    server.seed_upload(BUCKET, "a.bin");
    server.fail_on(Operation::ListUploads);

    let report = cleanup.abort_all(BUCKET, None).await;

    assert_eq!(report.attempted(), 0);
    assert!(!report.is_complete());
    assert!(report.listing_error.as_ref().unwrap().is_protocol_error());
    assert_eq!(server.call_count("abort"), 0);
    assert!(report.into_result().is_err());
}

#[tokio::test]
async fn test_listing_failure_mid_scan_keeps_outcomes() {
    let (server, cleanup) = setup(1);
    let first = server.seed_upload(BUCKET, "a.bin");
    let second = server.seed_upload(BUCKET, "b.bin");
    let third = server.seed_upload(BUCKET, "c.bin");
    server.fail_after(Operation::ListUploads, 1);

    let report = cleanup.abort_all(BUCKET, None).await;

    assert_eq!(report.attempted(), 1);
    assert_eq!(report.aborted(), 1);
    assert_eq!(report.outcomes[0].session, first);
    assert!(report.listing_error.is_some());
    assert!(!report.is_success());
    assert_eq!(server.call_count("list_multipart_uploads"), 2);
    assert_eq!(server.in_progress(BUCKET), vec![second, third]);

    let err = report.into_result().unwrap_err();
    assert!(err.to_string().contains("injected failure"));
}

#[tokio::test]
async fn test_abort_object_matches_exact_key() {
    let (server, cleanup) = setup(1000);
    let target = server.seed_upload(BUCKET, "dir/file");
    let longer = server.seed_upload(BUCKET, "dir/file.old");

    let report = cleanup.abort_object(BUCKET, "dir/file").await;

    assert_eq!(report.attempted(), 1);
    assert_eq!(report.outcomes[0].session, target);
    assert_eq!(server.in_progress(BUCKET), vec![longer]);
}

#[tokio::test]
async fn test_incomplete_uploads_recursive_with_sizes() {
    let (server, cleanup) = setup(1);
    let first = server.seed_upload(BUCKET, "logs/a/one");
    server.seed_part(&first, 1, vec![0u8; 7]);
    server.seed_part(&first, 2, vec![0u8; 5]);
    let second = server.seed_upload(BUCKET, "logs/two");

    let uploads: Vec<IncompleteUpload> = cleanup
        .list_incomplete_uploads(BUCKET, Some("logs/"), true)
        .try_collect()
        .await
        .unwrap();

    assert_eq!(uploads.len(), 2);
    assert_eq!(uploads[0].key, "logs/a/one");
    assert_eq!(uploads[0].upload_id.as_deref(), Some(first.upload_id.as_str()));
    assert_eq!(uploads[0].size, 12);
    assert!(uploads[0].initiated.is_some());
    assert_eq!(uploads[1].key, "logs/two");
    assert_eq!(uploads[1].upload_id.as_deref(), Some(second.upload_id.as_str()));
    assert_eq!(uploads[1].size, 0);
}

#[tokio::test]
async fn test_incomplete_uploads_rolls_up_directories() {
    let (server, cleanup) = setup(1000);
    server.seed_upload(BUCKET, "logs/a/one");
    server.seed_upload(BUCKET, "logs/a/two");
    let direct = server.seed_upload(BUCKET, "logs/top");

    let uploads: Vec<IncompleteUpload> = cleanup
        .list_incomplete_uploads(BUCKET, Some("logs/"), false)
        .try_collect()
        .await
        .unwrap();

    // Uploads come before the common prefixes of the same page.
    assert_eq!(uploads.len(), 2);
    assert_eq!(uploads[0].key, "logs/top");
    assert_eq!(uploads[0].upload_id, Some(direct.upload_id));
    assert_eq!(uploads[1].key, "logs/a/");
    assert!(uploads[1].is_prefix());
    assert_eq!(uploads[1].size, 0);
}

#[tokio::test]
async fn test_incomplete_listing_surfaces_part_listing_errors() {
    let (server, cleanup) = setup(1000);
    server.seed_upload(BUCKET, "a.bin");
    server.fail_on(Operation::ListParts);

    let result: Result<Vec<IncompleteUpload>, S3Error> = cleanup
        .list_incomplete_uploads(BUCKET, None, true)
        .try_collect()
        .await;

    assert!(result.is_err());
}
