//! Chunk planning.
//!
//! With a chunk size `C`, the resource is fetched as strictly sequential range
//! requests `[k*C, min((k+1)*C, T) - 1]`. A request that resumes inside chunk
//! `k` only asks for the rest of that chunk, so chunk boundaries stay aligned
//! however many retries happen. Without a chunk size the whole remaining range
//! is a single open-ended request.

use crate::negotiate::ByteRange;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChunkScheduler {
    chunk_size: Option<u64>,
}

impl ChunkScheduler {
    pub fn new(chunk_size: Option<u64>) -> Self {
        Self {
            chunk_size: chunk_size.filter(|c| *c > 0),
        }
    }

    /// Inclusive end of the request that starts at `offset`, or `None` for an
    /// open-ended request.
    pub fn chunk_end(&self, offset: u64, total: Option<u64>) -> Option<u64> {
        let c = self.chunk_size?;
        let aligned_end = (offset / c).saturating_add(1).saturating_mul(c) - 1;
        Some(match total {
            Some(t) if t > 0 => aligned_end.min(t - 1).max(offset),
            _ => aligned_end,
        })
    }

    /// Range for the next request, or `None` when no header is needed.
    pub fn next_range(&self, offset: u64, total: Option<u64>) -> Option<ByteRange> {
        ByteRange::for_segment(offset, self.chunk_end(offset, total))
    }
}

/// All chunk ranges for a resource of `total` bytes. Returns an empty vec if
/// either argument is 0.
pub fn plan_chunks(total: u64, chunk_size: u64) -> Vec<ByteRange> {
    if total == 0 || chunk_size == 0 {
        return Vec::new();
    }
    let count = total.div_ceil(chunk_size);
    (0..count)
        .map(|k| {
            let start = k * chunk_size;
            ByteRange {
                start,
                end: Some(((k + 1) * chunk_size).min(total) - 1),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_chunks_even() {
        let chunks = plan_chunks(4000, 1000);
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0], ByteRange { start: 0, end: Some(999) });
        assert_eq!(chunks[3], ByteRange { start: 3000, end: Some(3999) });
    }

    #[test]
    fn plan_chunks_remainder() {
        let chunks = plan_chunks(10240, 1000);
        assert_eq!(chunks.len(), 11);
        assert_eq!(chunks[10], ByteRange { start: 10000, end: Some(10239) });
        let covered: u64 = chunks.iter().map(|c| c.len().unwrap()).sum();
        assert_eq!(covered, 10240);
    }

    #[test]
    fn plan_chunks_empty() {
        assert!(plan_chunks(0, 1000).is_empty());
        assert!(plan_chunks(100, 0).is_empty());
    }

    #[test]
    fn unchunked_requests_are_open_ended() {
        let s = ChunkScheduler::new(None);
        assert_eq!(s.chunk_end(0, None), None);
        assert_eq!(s.next_range(0, None), None);
        assert_eq!(
            s.next_range(1024, Some(10240)),
            Some(ByteRange { start: 1024, end: None })
        );
    }

    #[test]
    fn first_chunk_before_total_known() {
        let s = ChunkScheduler::new(Some(1000));
        assert_eq!(
            s.next_range(0, None),
            Some(ByteRange { start: 0, end: Some(999) })
        );
    }

    #[test]
    fn last_chunk_clipped_to_total() {
        let s = ChunkScheduler::new(Some(1000));
        assert_eq!(s.chunk_end(10000, Some(10240)), Some(10239));
    }

    #[test]
    fn resume_inside_chunk_keeps_alignment() {
        let s = ChunkScheduler::new(Some(1000));
        assert_eq!(
            s.next_range(1500, Some(10240)),
            Some(ByteRange { start: 1500, end: Some(1999) })
        );
        assert_eq!(s.chunk_end(2000, None), Some(2999));
    }

    #[test]
    fn zero_chunk_size_means_unchunked() {
        assert_eq!(ChunkScheduler::new(Some(0)).chunk_end(500, None), None);
    }
}
