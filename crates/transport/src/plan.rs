use std::sync::Arc;

use tracing::warn;

use crate::params::{DEFAULT_REPEAT, coerce_seconds};

/// A fixed-offset slice of the source audio with its own repeat count.
///
/// Construction enforces `start >= 0`, `length > 0` and `repeat >= 1`;
/// invalid values are corrected rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Chunk {
    index: u32,
    start: f64,
    length: f64,
    repeat: u32,
}

impl Chunk {
    pub fn new(index: u32, start: f64, length: f64, repeat: u32) -> Self {
        let fixed_start = if start.is_finite() && start >= 0.0 { start } else { 0.0 };
        let fixed_length = coerce_seconds(length, crate::params::DEFAULT_CHUNK_SECONDS);
        if fixed_start != start || fixed_length != length {
            warn!(index, start, length, "corrected invalid chunk bounds");
        }
        Self {
            index: index.max(1),
            start: fixed_start,
            length: fixed_length,
            repeat: repeat.max(DEFAULT_REPEAT),
        }
    }

    /// 1-based display index.
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn end(&self) -> f64 {
        self.start + self.length
    }

    pub fn repeat(&self) -> u32 {
        self.repeat
    }

    pub fn with_repeat(self, repeat: u32) -> Self {
        Self {
            repeat: repeat.max(DEFAULT_REPEAT),
            ..self
        }
    }

    pub fn segment(&self) -> Segment {
        Segment {
            chunk: self.index,
            start: self.start,
            end: self.end(),
        }
    }
}

/// A resolved time range, played once.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    /// Index of the chunk this segment came from.
    pub chunk: u32,
    pub start: f64,
    pub end: f64,
}

impl Segment {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Half-open: the end belongs to the next segment.
    pub fn contains(&self, seconds: f64) -> bool {
        seconds >= self.start && seconds < self.end
    }
}

/// Immutable, ordered sequence of segments for one playback run.
///
/// The sequence is never expanded in memory: segment `i` is resolved from
/// the chunk list and the cumulative repeat counts, so huge repeat counts
/// cost nothing.
#[derive(Debug, Clone)]
pub struct SegmentPlan {
    chunks: Arc<[Chunk]>,
    /// `pass_ends[k]` is the number of segments in one pass up to and
    /// including chunk `k`.
    pass_ends: Arc<[u64]>,
    global_repeat: u32,
}

impl Default for SegmentPlan {
    fn default() -> Self {
        Self::build(&[], DEFAULT_REPEAT)
    }
}

impl SegmentPlan {
    /// Lay `chunks` out in play order.
    ///
    /// The whole chunk list is repeated `global_repeat` times (0 is treated as
    /// 1); within one pass every chunk is emitted `repeat` times back to back
    /// before moving on to the next chunk.
    pub fn build(chunks: &[Chunk], global_repeat: u32) -> Self {
        let pass_ends: Vec<u64> = chunks
            .iter()
            .scan(0u64, |total, chunk| {
                *total += chunk.repeat as u64;
                Some(*total)
            })
            .collect();

        Self {
            chunks: chunks.into(),
            pass_ends: pass_ends.into(),
            global_repeat: global_repeat.max(DEFAULT_REPEAT),
        }
    }

    /// Plan for a single chunk played `chunk.repeat()` times.
    pub fn single(chunk: &Chunk) -> Self {
        Self::build(&[chunk.with_repeat(1)], chunk.repeat)
    }

    fn per_pass(&self) -> u64 {
        self.pass_ends.last().copied().unwrap_or(0)
    }

    /// `global_repeat × Σ repeat`, saturating at `usize::MAX`.
    pub fn len(&self) -> usize {
        let total = self.per_pass().saturating_mul(self.global_repeat as u64);
        usize::try_from(total).unwrap_or(usize::MAX)
    }

    pub fn is_empty(&self) -> bool {
        self.per_pass() == 0
    }

    pub fn get(&self, index: usize) -> Option<Segment> {
        if index >= self.len() {
            return None;
        }
        let within_pass = index as u64 % self.per_pass();
        let chunk = self.pass_ends.partition_point(|&end| end <= within_pass);
        self.chunks.get(chunk).map(Chunk::segment)
    }

    pub fn iter(&self) -> impl Iterator<Item = Segment> + '_ {
        (0..self.len()).map_while(|i| self.get(i))
    }
}

/// Cut a source of `duration` seconds into consecutive chunks of
/// `chunk_seconds`, the last one shortened to fit.
///
/// A non-positive or non-finite `chunk_seconds` falls back to `fallback_seconds`.
/// Every chunk starts with `default_repeat` repetitions (at least 1).
pub fn slice_chunks(
    duration: f64,
    chunk_seconds: f64,
    fallback_seconds: f64,
    default_repeat: u32,
) -> Vec<Chunk> {
    if !(duration.is_finite() && duration > 0.0) {
        return Vec::new();
    }

    let step = coerce_seconds(chunk_seconds, fallback_seconds);
    if step != chunk_seconds {
        warn!(chunk_seconds, step, "invalid chunk length, using fallback");
    }

    // Guard against a sliver chunk produced by float error on exact multiples.
    let count = ((duration / step) - 1e-9).ceil().max(1.0) as u32;
    (0..count)
        .map(|i| {
            let start = i as f64 * step;
            let length = step.min(duration - start);
            Chunk::new(i + 1, start, length, default_repeat)
        })
        .collect()
}
