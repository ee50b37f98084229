//! The multipart upload engine.
//!
//! Objects below the minimum part size go up with a single request. Larger
//! objects are split by [`Chunker`] into parts sized by [`PartSizePolicy`],
//! uploaded one after another, and assembled with an ordered completion
//! call. An interrupted upload stays on the server and is resumed by the
//! next [`Uploader::put_object`] for the same key, or removed with
//! [`Cleanup::abort_all`].

mod chunker;
mod cleanup;
mod listing;
mod part_size;
mod upload;

pub use chunker::{Chunk, Chunker, PartDigest, SkipSet};
pub use cleanup::{AbortOutcome, AbortReport, Cleanup};
pub use listing::{
    list_in_progress_uploads, list_parts, list_upload_entries, ListingStream, PartStream,
    UploadEntry, UploadStream,
};
pub use part_size::{
    compute_part_size, PartSizePolicy, MAX_PART_COUNT, MAX_PART_SIZE, MIN_PART_SIZE,
};
pub use upload::{PutObjectInput, PutObjectOutcome, UploadMode, Uploader};

use std::sync::Arc;

/// Progress callback for uploads.
pub type ProgressCallback = Arc<dyn Fn(TransferProgress) + Send + Sync>;

/// Transfer progress information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferProgress {
    /// Total bytes to transfer.
    pub total_bytes: u64,
    /// Bytes handled so far, including parts already on the server.
    pub transferred_bytes: u64,
    /// Part just handled (for multipart uploads).
    pub current_part: Option<u32>,
    /// Total parts (for multipart uploads).
    pub total_parts: Option<u32>,
}

impl TransferProgress {
    /// Calculate the progress percentage.
    pub fn percentage(&self) -> f64 {
        if self.total_bytes == 0 {
            100.0
        } else {
            (self.transferred_bytes as f64 / self.total_bytes as f64) * 100.0
        }
    }
}
