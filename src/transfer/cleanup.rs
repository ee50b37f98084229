//! Bulk abort of abandoned multipart uploads.

use super::listing::{list_parts, list_upload_entries, ListingStream, UploadEntry};
use crate::config::{S3Config, MAX_LIST_PAGE_SIZE};
use crate::error::{AbortFailure, MultipartError, S3Error};
use crate::services::MultipartApi;
use crate::types::*;
use futures::{StreamExt, TryStreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of aborting one session.
#[derive(Debug)]
pub struct AbortOutcome {
    /// The session the abort was issued for.
    pub session: UploadSession,
    /// Why the abort failed, if it did.
    pub error: Option<S3Error>,
}

impl AbortOutcome {
    /// True if the session was aborted.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Every abort attempted by one cleanup scan, in listing order.
#[derive(Debug)]
pub struct AbortReport {
    /// Bucket that was scanned.
    pub bucket: String,
    /// One entry per session found.
    pub outcomes: Vec<AbortOutcome>,
    /// Set when listing the uploads failed and the scan stopped early.
    /// Sessions past that point were neither listed nor aborted.
    pub listing_error: Option<S3Error>,
}

impl AbortReport {
    /// Number of aborts attempted.
    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    /// Number of sessions aborted.
    pub fn aborted(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    /// The outcomes that failed.
    pub fn failures(&self) -> impl Iterator<Item = &AbortOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    /// True if the scan ran to the end of the listing.
    pub fn is_complete(&self) -> bool {
        self.listing_error.is_none()
    }

    /// True if the scan completed and every abort succeeded.
    pub fn is_success(&self) -> bool {
        self.is_complete() && self.outcomes.iter().all(AbortOutcome::is_success)
    }

    /// The number of aborted sessions, or an error.
    ///
    /// A listing failure is returned as is. Otherwise failed aborts become
    /// [`MultipartError::PartialAbort`] listing every failure.
    pub fn into_result(mut self) -> Result<usize, S3Error> {
        if let Some(error) = self.listing_error.take() {
            return Err(error);
        }
        if self.is_success() {
            return Ok(self.outcomes.len());
        }

        let attempted = self.outcomes.len();
        let failed = self
            .outcomes
            .into_iter()
            .filter_map(|outcome| {
                outcome.error.map(|e| AbortFailure {
                    key: outcome.session.key,
                    upload_id: outcome.session.upload_id,
                    message: e.to_string(),
                })
            })
            .collect();

        Err(S3Error::Multipart(MultipartError::PartialAbort {
            bucket: self.bucket,
            attempted,
            failed,
        }))
    }
}

/// Finds and aborts in-progress multipart uploads.
#[derive(Clone)]
pub struct Cleanup {
    api: Arc<dyn MultipartApi>,
    list_page_size: u32,
}

impl Cleanup {
    /// Create a cleanup runner.
    pub fn new(api: Arc<dyn MultipartApi>) -> Self {
        Self {
            api,
            list_page_size: MAX_LIST_PAGE_SIZE,
        }
    }

    /// Create a cleanup runner with the listing page size of `config`.
    pub fn from_config(api: Arc<dyn MultipartApi>, config: &S3Config) -> Self {
        Self::new(api).with_list_page_size(config.list_page_size)
    }

    /// Set the listing page size.
    pub fn with_list_page_size(mut self, page_size: u32) -> Self {
        self.list_page_size = page_size.clamp(1, MAX_LIST_PAGE_SIZE);
        self
    }

    /// Abort every in-progress upload in `bucket` whose key starts with
    /// `prefix`, or every upload in the bucket when `prefix` is `None`.
    ///
    /// A failed abort is recorded and the scan moves on. A failure to list
    /// the uploads ends the scan early; it is kept in
    /// [`AbortReport::listing_error`] alongside the outcomes so far.
    pub async fn abort_all(&self, bucket: &str, prefix: Option<&str>) -> AbortReport {
        self.abort_matching(bucket, prefix, |_| true).await
    }

    /// Abort the in-progress uploads for exactly `key`.
    pub async fn abort_object(&self, bucket: &str, key: &str) -> AbortReport {
        self.abort_matching(bucket, Some(key), |upload| upload.key == key)
            .await
    }

    async fn abort_matching<F>(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        matches: F,
    ) -> AbortReport
    where
        F: Fn(&MultipartUpload) -> bool,
    {
        let mut uploads = super::listing::list_in_progress_uploads(
            self.api.clone(),
            bucket,
            prefix.map(String::from),
            self.list_page_size,
        );
        let mut report = AbortReport {
            bucket: bucket.to_string(),
            outcomes: Vec::new(),
            listing_error: None,
        };

        while let Some(upload) = uploads.next().await {
            let upload = match upload {
                Ok(upload) => upload,
                Err(e) => {
                    warn!(bucket = %bucket, error = %e, "Listing uploads failed, abort scan stopped");
                    report.listing_error = Some(e);
                    break;
                }
            };
            if !matches(&upload) {
                continue;
            }

            let session = upload.session(bucket);
            let error = self
                .api
                .abort_multipart_upload(&session.bucket, &session.key, &session.upload_id)
                .await
                .err();
            match &error {
                None => debug!(key = %session.key, upload_id = %session.upload_id, "Aborted upload"),
                Some(e) => warn!(
                    key = %session.key,
                    upload_id = %session.upload_id,
                    error = %e,
                    "Failed to abort upload"
                ),
            }
            report.outcomes.push(AbortOutcome { session, error });
        }

        info!(
            bucket = %bucket,
            attempted = report.attempted(),
            aborted = report.aborted(),
            complete = report.is_complete(),
            "Finished abort scan"
        );
        report
    }

    /// Stream the incomplete uploads under `prefix` with the bytes stored
    /// so far.
    ///
    /// Without `recursive`, listing stops at the next `/` and each common
    /// prefix is reported as an entry with no upload ID and size zero.
    pub fn list_incomplete_uploads(
        &self,
        bucket: &str,
        prefix: Option<&str>,
        recursive: bool,
    ) -> ListingStream<IncompleteUpload> {
        let api = self.api.clone();
        let bucket = bucket.to_string();
        let page_size = self.list_page_size;
        let delimiter = (!recursive).then(|| "/".to_string());
        let mut entries = list_upload_entries(
            api.clone(),
            bucket.clone(),
            prefix.map(String::from),
            delimiter,
            page_size,
        );

        ListingStream::spawn(page_size, move |sender| async move {
            while let Some(entry) = entries.next().await {
                let item = match entry {
                    Ok(UploadEntry::Prefix(prefix)) => Ok(IncompleteUpload {
                        key: prefix,
                        upload_id: None,
                        initiated: None,
                        size: 0,
                    }),
                    Ok(UploadEntry::Upload(upload)) => {
                        let parts = list_parts(api.clone(), upload.session(&bucket), page_size);
                        parts
                            .try_fold(0u64, |total, part| async move { Ok(total + part.size) })
                            .await
                            .map(|size| IncompleteUpload {
                                key: upload.key,
                                upload_id: Some(upload.upload_id),
                                initiated: upload.initiated,
                                size,
                            })
                    }
                    Err(e) => Err(e),
                };

                let failed = item.is_err();
                if sender.send(item).await.is_err() || failed {
                    return;
                }
            }
        })
    }
}

impl std::fmt::Debug for Cleanup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cleanup")
            .field("list_page_size", &self.list_page_size)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(errors: Vec<Option<&str>>) -> AbortReport {
        AbortReport {
            bucket: "bucket".to_string(),
            outcomes: errors
                .into_iter()
                .enumerate()
                .map(|(i, error)| AbortOutcome {
                    session: UploadSession::new("bucket", format!("key-{}", i), format!("u-{}", i)),
                    error: error.map(|message| {
                        S3Error::Response(crate::error::ResponseError::InvalidResponse {
                            message: message.to_string(),
                        })
                    }),
                })
                .collect(),
            listing_error: None,
        }
    }

    fn listing_failure() -> S3Error {
        S3Error::Response(crate::error::ResponseError::InvalidResponse {
            message: "listing failed".to_string(),
        })
    }

    #[test]
    fn test_successful_report() {
        let report = report(vec![None, None]);
        assert!(report.is_success());
        assert_eq!(report.into_result().unwrap(), 2);
    }

    #[test]
    fn test_partial_abort_lists_failures() {
        let report = report(vec![None, Some("boom"), None]);
        assert_eq!(report.attempted(), 3);
        assert_eq!(report.aborted(), 2);

        match report.into_result().unwrap_err() {
            S3Error::Multipart(MultipartError::PartialAbort {
                bucket,
                attempted,
                failed,
            }) => {
                assert_eq!(bucket, "bucket");
                assert_eq!(attempted, 3);
                assert_eq!(failed.len(), 1);
                assert_eq!(failed[0].key, "key-1");
                assert_eq!(failed[0].upload_id, "u-1");
                assert!(failed[0].message.contains("boom"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_listing_error_fails_report() {
        let mut report = report(vec![None]);
        report.listing_error = Some(listing_failure());
        assert!(!report.is_complete());
        assert!(!report.is_success());
        assert_eq!(report.aborted(), 1);

        let err = report.into_result().unwrap_err();
        assert!(err.to_string().contains("listing failed"));
    }

    #[test]
    fn test_listing_error_takes_precedence_over_failed_aborts() {
        let mut report = report(vec![Some("boom")]);
        report.listing_error = Some(listing_failure());

        match report.into_result().unwrap_err() {
            S3Error::Response(_) => {}
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
