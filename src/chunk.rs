//! Chunk planning: partitioning a resource into ranged fetch units.

use crate::constants::{MAX_AUTO_CHUNK_SIZE, MIN_AUTO_CHUNK_SIZE};

/// Number of chunks the auto-selector aims to produce per worker.
const CHUNKS_PER_WORKER: u64 = 2;

/// A contiguous, inclusive byte range within `[0, size)` assigned to a
/// single worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk {
    /// Monotonic position of this chunk within the plan, starting at 0.
    pub index: u64,
    /// First byte of the range.
    pub start: u64,
    /// Last byte of the range, inclusive.
    pub end: u64,
}

/// Partitions `[0, size)` into an ordered sequence of non-overlapping
/// chunks.
///
/// A resource of unknown size or without range support yields a single
/// pseudo-chunk `{0, 0, 0}` that the coordinator serves through the
/// sequential streaming path. A `chunk_size` of 0 auto-selects a size
/// that yields roughly `concurrency * 2` chunks, clamped to
/// `[64 KiB, 64 MiB]`.
#[must_use]
pub fn plan(size: u64, rangeable: bool, chunk_size: u64, concurrency: usize) -> Vec<Chunk> {
    if size == 0 || !rangeable {
        return vec![Chunk {
            index: 0,
            start: 0,
            end: 0,
        }];
    }

    let chunk_size = if chunk_size == 0 {
        auto_chunk_size(size, concurrency)
    } else {
        chunk_size
    };

    let mut chunks = Vec::with_capacity(size.div_ceil(chunk_size) as usize);
    let mut start = 0u64;
    let mut index = 0u64;
    while start < size {
        let end = start.saturating_add(chunk_size - 1).min(size - 1);
        chunks.push(Chunk { index, start, end });
        start = end + 1;
        index += 1;
    }
    chunks
}

fn auto_chunk_size(size: u64, concurrency: usize) -> u64 {
    let workers = concurrency.max(1) as u64;
    (size / (workers * CHUNKS_PER_WORKER)).clamp(MIN_AUTO_CHUNK_SIZE, MAX_AUTO_CHUNK_SIZE)
}
