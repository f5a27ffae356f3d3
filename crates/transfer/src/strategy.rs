//! Transfer strategy selection
//!
//! Pure decision functions, separated from I/O so the single-part versus
//! multipart choice (and its siblings for downloads and copies) can be
//! tested in isolation. The engines consume the returned variants.

/// Minimum part size: 5 MiB (S3 requirement)
pub const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Maximum part size: 5 GiB
pub const MAX_PART_SIZE: u64 = 5 * 1024 * 1024 * 1024;

/// Maximum number of parts per multipart upload (S3 limit)
pub const MAX_PARTS: u64 = 10_000;

/// Maximum keys per bulk-delete call (S3 limit)
pub const DELETE_BATCH_MAX: usize = 1000;

/// A byte range `[start, end)` of an object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

/// Ordered ranges covering an object of known size
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangePlan {
    pub ranges: Vec<ByteRange>,
}

impl RangePlan {
    /// Split `size` bytes into chunks of `chunk_size`, the last chunk
    /// possibly shorter.
    pub fn for_object(size: u64, chunk_size: u64) -> Self {
        let chunk_size = chunk_size.max(1);
        let mut ranges = Vec::with_capacity(size.div_ceil(chunk_size) as usize);
        let mut start = 0;
        while start < size {
            let end = (start + chunk_size).min(size);
            ranges.push(ByteRange { start, end });
            start = end;
        }
        Self { ranges }
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

/// How an upload will be performed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStrategy {
    /// One atomic put
    SinglePut,
    /// Multipart with the effective part size
    Multipart { part_size: u64 },
}

/// Decide the upload strategy for a source of `size` bytes.
///
/// Sizes at or below the threshold use a single put. Above it, the
/// configured part size is clamped to the store's bounds and then grown,
/// never shrunk, until the part count fits under [`MAX_PARTS`].
pub fn plan_upload(size: u64, threshold: u64, part_size: u64) -> UploadStrategy {
    if size <= threshold {
        return UploadStrategy::SinglePut;
    }

    let mut part = part_size.clamp(MIN_PART_SIZE, MAX_PART_SIZE);
    if size.div_ceil(part) > MAX_PARTS {
        part = size.div_ceil(MAX_PARTS).clamp(part, MAX_PART_SIZE);
    }
    UploadStrategy::Multipart { part_size: part }
}

/// How a download will be performed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadStrategy {
    /// One streamed read
    SingleGet,
    /// Concurrent ranged reads following the plan
    Ranged(RangePlan),
}

/// Decide the download strategy for an object of `size` bytes.
pub fn plan_download(size: u64, threshold: u64, range_size: u64) -> DownloadStrategy {
    if size <= threshold {
        DownloadStrategy::SingleGet
    } else {
        DownloadStrategy::Ranged(RangePlan::for_object(size, range_size))
    }
}

/// How a remote-to-remote copy will be performed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyStrategy {
    /// One server-side copy call
    ServerSide,
    /// Download to a staging file, then upload
    TwoPhase,
}

/// Decide the copy strategy for an object of `size` bytes. Objects past
/// the store's single-call copy limit go straight to two-phase.
pub fn plan_copy(size: u64, server_side_limit: u64) -> CopyStrategy {
    if size <= server_side_limit {
        CopyStrategy::ServerSide
    } else {
        CopyStrategy::TwoPhase
    }
}
