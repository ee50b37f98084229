//! Splitting a source stream into numbered, checksummed parts.

use crate::error::{RequestError, S3Error, TransferError};
use crate::types::{etag_md5_hex, Part};
use base64::Engine;
use bytes::Bytes;
use futures::stream::{self, Stream};
use md5::{Digest, Md5};
use std::collections::BTreeMap;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Parts already confirmed by the server, keyed by part number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkipSet {
    parts: BTreeMap<u32, Part>,
}

impl SkipSet {
    /// Create an empty skip set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a confirmed part. A later entry for the same number replaces
    /// the earlier one.
    pub fn insert(&mut self, part: Part) {
        self.parts.insert(part.part_number, part);
    }

    /// The confirmed part with this number, if any.
    pub fn get(&self, part_number: u32) -> Option<&Part> {
        self.parts.get(&part_number)
    }

    /// True if the part number is confirmed.
    pub fn contains(&self, part_number: u32) -> bool {
        self.parts.contains_key(&part_number)
    }

    /// Number of confirmed parts.
    pub fn len(&self) -> usize {
        self.parts.len()
    }

    /// True if nothing is confirmed.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Confirmed parts in ascending part-number order.
    pub fn iter(&self) -> impl Iterator<Item = &Part> {
        self.parts.values()
    }

    /// Total bytes already stored on the server.
    pub fn total_size(&self) -> u64 {
        self.parts.values().map(|p| p.size).sum()
    }
}

impl Extend<Part> for SkipSet {
    fn extend<I: IntoIterator<Item = Part>>(&mut self, iter: I) {
        for part in iter {
            self.insert(part);
        }
    }
}

impl FromIterator<Part> for SkipSet {
    fn from_iter<I: IntoIterator<Item = Part>>(iter: I) -> Self {
        let mut set = SkipSet::new();
        set.extend(iter);
        set
    }
}

/// MD5 of a part body in both wire encodings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartDigest {
    /// Lowercase hex, comparable with plain S3 ETags.
    pub hex: String,
    /// Base64, as sent in `Content-MD5`.
    pub base64: String,
}

impl PartDigest {
    /// Digest `data`.
    pub fn compute(data: &[u8]) -> Self {
        let digest = Md5::digest(data);
        Self {
            hex: hex::encode(digest),
            base64: base64::engine::general_purpose::STANDARD.encode(digest),
        }
    }

    /// True if `e_tag` is a plain MD5 ETag equal to this digest.
    ///
    /// ETags that are not content digests never match.
    pub fn matches_etag(&self, e_tag: &str) -> bool {
        etag_md5_hex(e_tag).is_some_and(|remote| remote == self.hex)
    }
}

/// One part read from the source.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Part number, starting at 1.
    pub part_number: u32,
    /// Part body.
    pub data: Bytes,
    /// MD5 of `data`.
    pub digest: PartDigest,
    /// The server's record of this part when it is in the skip set.
    pub confirmed: Option<Part>,
}

impl Chunk {
    /// Size of the body in bytes.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// True if the server already holds a part with this number.
    pub fn is_skipped(&self) -> bool {
        self.confirmed.is_some()
    }
}

/// Reads exactly `total_size` bytes from a source as a sequence of parts.
///
/// Every part is read and digested, including ones in the skip set, so the
/// source position always matches the part numbering. A source that ends
/// early yields [`TransferError::IncompleteBody`] and nothing after it.
pub struct Chunker<R> {
    source: R,
    total_size: u64,
    part_size: u64,
    skip: SkipSet,
    bucket: String,
    key: String,
    bytes_read: u64,
    next_part: u32,
    finished: bool,
}

impl<R> Chunker<R>
where
    R: AsyncRead + Unpin + Send,
{
    /// Create a chunker over `source`, which must hold `total_size` bytes.
    pub fn new(source: R, total_size: u64, part_size: u64, skip: SkipSet) -> Self {
        Self {
            source,
            total_size,
            part_size: part_size.max(1),
            skip,
            bucket: String::new(),
            key: String::new(),
            bytes_read: 0,
            next_part: 1,
            finished: false,
        }
    }

    /// Name the object being read, for error reports.
    pub fn for_object(mut self, bucket: impl Into<String>, key: impl Into<String>) -> Self {
        self.bucket = bucket.into();
        self.key = key.into();
        self
    }

    /// Bytes consumed from the source so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Read the next part, or `None` once `total_size` bytes are consumed.
    ///
    /// A zero-length source yields one empty part.
    pub async fn next_chunk(&mut self) -> Result<Option<Chunk>, S3Error> {
        if self.finished {
            return Ok(None);
        }

        let remaining = self.total_size - self.bytes_read;
        if remaining == 0 && !(self.total_size == 0 && self.next_part == 1) {
            self.finished = true;
            return Ok(None);
        }

        let want = remaining.min(self.part_size);
        let part_number = self.next_part;
        let data = match self.read_exact_or_short(want).await {
            Ok(data) => data,
            Err(e) => {
                self.finished = true;
                return Err(e);
            }
        };

        let got = data.len() as u64;
        self.bytes_read += got;
        if got < want {
            self.finished = true;
            return Err(S3Error::Transfer(TransferError::IncompleteBody {
                bucket: self.bucket.clone(),
                key: self.key.clone(),
                part_number: Some(part_number),
                expected: self.total_size,
                received: self.bytes_read,
            }));
        }

        self.next_part += 1;
        if self.bytes_read == self.total_size {
            self.finished = true;
        }

        let digest = PartDigest::compute(&data);
        Ok(Some(Chunk {
            part_number,
            data: Bytes::from(data),
            digest,
            confirmed: self.skip.get(part_number).cloned(),
        }))
    }

    /// Fill a buffer of `want` bytes, stopping early only at end of stream.
    async fn read_exact_or_short(&mut self, want: u64) -> Result<Vec<u8>, S3Error> {
        let len = usize::try_from(want).map_err(|_| {
            S3Error::Request(RequestError::EntityTooLarge {
                size: want,
                max_size: usize::MAX as u64,
            })
        })?;
        let mut buffer = vec![0u8; len];
        let mut filled = 0;

        while filled < len {
            match self.source.read(&mut buffer[filled..]).await {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    return Err(S3Error::Transfer(TransferError::StreamInterrupted {
                        bytes_transferred: self.bytes_read + filled as u64,
                        message: e.to_string(),
                    }))
                }
            }
        }

        buffer.truncate(filled);
        Ok(buffer)
    }

    /// Turn the chunker into a stream. An error is the last item.
    pub fn into_stream(self) -> impl Stream<Item = Result<Chunk, S3Error>> + Send
    where
        R: 'static,
    {
        stream::try_unfold(self, |mut chunker| async move {
            Ok(chunker.next_chunk().await?.map(|chunk| (chunk, chunker)))
        })
    }
}
