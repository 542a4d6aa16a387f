//! Chunk partitioner.

use crate::error::{SyncError, SyncResult};

/// A contiguous slice of the source records, handled by one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk<R> {
    /// Position of the chunk in the partition.
    pub index: usize,
    /// Position of the first record in the source sequence.
    pub offset: usize,
    /// The records, in source order.
    pub records: Vec<R>,
}

impl<R> Chunk<R> {
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Split `records` into at most `worker_count` contiguous chunks.
///
/// With `n` records and `k = min(worker_count, n)` chunks, every chunk holds
/// `n / k` records and the last `n % k` chunks hold one more. No chunk is
/// empty; an empty input yields no chunks.
pub fn partition<R>(records: Vec<R>, worker_count: usize) -> SyncResult<Vec<Chunk<R>>> {
    if worker_count == 0 {
        return Err(SyncError::partition("worker count must be at least 1"));
    }

    let total = records.len();
    if total == 0 {
        return Ok(Vec::new());
    }

    let count = worker_count.min(total);
    let base = total / count;
    let first_larger = count - total % count;

    let mut remaining = records.into_iter();
    let mut offset = 0;
    let chunks = (0..count)
        .map(|index| {
            let size = base + usize::from(index >= first_larger);
            let chunk = Chunk {
                index,
                offset,
                records: remaining.by_ref().take(size).collect(),
            };
            offset += size;
            chunk
        })
        .collect();

    Ok(chunks)
}
