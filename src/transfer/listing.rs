//! Paginated listings exposed as streams.
//!
//! Each listing runs on its own task and pushes results into a bounded
//! channel, so the consumer can work on one page while the next is fetched.
//! A failed page fetch is delivered as the final item.

use crate::config::MAX_LIST_PAGE_SIZE;
use crate::error::{ResponseError, S3Error};
use crate::services::MultipartApi;
use crate::types::*;
use futures::Stream;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

/// Results of a listing, in server order.
///
/// Dropping the stream stops the producer task.
pub struct ListingStream<T> {
    receiver: mpsc::Receiver<Result<T, S3Error>>,
    producer: JoinHandle<()>,
}

impl<T: Send + 'static> ListingStream<T> {
    pub(crate) fn spawn<F, Fut>(page_size: u32, produce: F) -> Self
    where
        F: FnOnce(mpsc::Sender<Result<T, S3Error>>) -> Fut,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let capacity = page_size.clamp(1, MAX_LIST_PAGE_SIZE) as usize;
        let (sender, receiver) = mpsc::channel(capacity);
        let producer = tokio::spawn(produce(sender));
        Self { receiver, producer }
    }
}

impl<T> Stream for ListingStream<T> {
    type Item = Result<T, S3Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl<T> Unpin for ListingStream<T> {}

impl<T> Drop for ListingStream<T> {
    fn drop(&mut self) {
        self.producer.abort();
    }
}

impl<T> std::fmt::Debug for ListingStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListingStream").finish_non_exhaustive()
    }
}

/// Parts of one upload.
pub type PartStream = ListingStream<Part>;

/// In-progress uploads of a bucket.
pub type UploadStream = ListingStream<MultipartUpload>;

/// One row of a delimited upload listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadEntry {
    /// An in-progress upload.
    Upload(MultipartUpload),
    /// A common prefix grouping uploads below it.
    Prefix(String),
}

fn stalled_cursor(operation: &str) -> S3Error {
    S3Error::Response(ResponseError::InvalidResponse {
        message: format!("{} reported more results without a next marker", operation),
    })
}

/// Stream every part of `session`, following `NextPartNumberMarker`.
pub fn list_parts(api: Arc<dyn MultipartApi>, session: UploadSession, page_size: u32) -> PartStream {
    let page_size = page_size.clamp(1, MAX_LIST_PAGE_SIZE);

    ListingStream::spawn(page_size, move |sender| async move {
        let mut marker = 0u32;
        loop {
            let request = ListPartsRequest::new(&session.bucket, &session.key, &session.upload_id)
                .with_max_parts(page_size)
                .with_part_number_marker(marker);

            let page = match api.list_parts(request).await {
                Ok(page) => page,
                Err(e) => {
                    let _ = sender.send(Err(e)).await;
                    return;
                }
            };
            debug!(
                upload_id = %session.upload_id,
                marker = marker,
                parts = page.parts.len(),
                truncated = page.is_truncated,
                "Listed parts page"
            );

            for part in page.parts {
                if sender.send(Ok(part)).await.is_err() {
                    trace!("Part listing consumer went away");
                    return;
                }
            }

            if !page.is_truncated {
                return;
            }
            match page.next_part_number_marker {
                Some(next) if next > marker => marker = next,
                _ => {
                    let _ = sender.send(Err(stalled_cursor("ListParts"))).await;
                    return;
                }
            }
        }
    })
}

/// Stream in-progress uploads, and common prefixes when `delimiter` is set.
pub fn list_upload_entries(
    api: Arc<dyn MultipartApi>,
    bucket: impl Into<String>,
    prefix: Option<String>,
    delimiter: Option<String>,
    page_size: u32,
) -> ListingStream<UploadEntry> {
    let bucket = bucket.into();
    let page_size = page_size.clamp(1, MAX_LIST_PAGE_SIZE);

    ListingStream::spawn(page_size, move |sender| async move {
        let mut key_marker: Option<String> = None;
        let mut upload_id_marker: Option<String> = None;
        loop {
            let mut request = ListMultipartUploadsRequest::new(&bucket)
                .with_max_uploads(page_size)
                .with_markers(key_marker.clone(), upload_id_marker.clone());
            if let Some(prefix) = &prefix {
                request = request.with_prefix(prefix.clone());
            }
            if let Some(delimiter) = &delimiter {
                request = request.with_delimiter(delimiter.clone());
            }

            let page = match api.list_multipart_uploads(request).await {
                Ok(page) => page,
                Err(e) => {
                    let _ = sender.send(Err(e)).await;
                    return;
                }
            };
            debug!(
                bucket = %bucket,
                uploads = page.uploads.len(),
                prefixes = page.common_prefixes.len(),
                truncated = page.is_truncated,
                "Listed multipart uploads page"
            );

            let entries = page
                .uploads
                .into_iter()
                .map(UploadEntry::Upload)
                .chain(page.common_prefixes.into_iter().map(UploadEntry::Prefix));
            for entry in entries {
                if sender.send(Ok(entry)).await.is_err() {
                    trace!("Upload listing consumer went away");
                    return;
                }
            }

            if !page.is_truncated {
                return;
            }
            let missing = page.next_key_marker.is_none() && page.next_upload_id_marker.is_none();
            let repeated = page.next_key_marker == key_marker
                && page.next_upload_id_marker == upload_id_marker;
            if missing || repeated {
                let _ = sender.send(Err(stalled_cursor("ListMultipartUploads"))).await;
                return;
            }
            key_marker = page.next_key_marker;
            upload_id_marker = page.next_upload_id_marker;
        }
    })
}

/// Stream every in-progress upload whose key starts with `prefix`.
pub fn list_in_progress_uploads(
    api: Arc<dyn MultipartApi>,
    bucket: impl Into<String>,
    prefix: Option<String>,
    page_size: u32,
) -> UploadStream {
    let mut entries = list_upload_entries(api, bucket, prefix, None, page_size);
    let page_size = page_size.clamp(1, MAX_LIST_PAGE_SIZE);

    ListingStream::spawn(page_size, move |sender| async move {
        use futures::StreamExt;
        while let Some(entry) = entries.next().await {
            let item = match entry {
                Ok(UploadEntry::Upload(upload)) => Ok(upload),
                Ok(UploadEntry::Prefix(_)) => continue,
                Err(e) => Err(e),
            };
            if sender.send(item).await.is_err() {
                return;
            }
        }
    })
}
