mod audio;
pub mod params;
mod plan;

pub use audio::AudioArc;
pub use params::{
    DEFAULT_CHUNK_SECONDS, DEFAULT_RATE, DEFAULT_REPEAT, coerce_rate, coerce_repeat, parse_rate,
    parse_repeat,
};
pub use plan::{Chunk, Segment, SegmentPlan, slice_chunks};

/// Requests from the control thread to the audio callback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Seek to `start` seconds and play at `rate`. Acknowledged with
    /// [`Status::Started`] or [`Status::Rejected`] carrying the same token.
    Play { token: u64, start: f64, rate: f64 },
    Stop,
    SetRate(f64),
    /// Move the playhead without changing the play state.
    Seek { seconds: f64 },
}

/// Reports from the audio callback. Every report names the play request it
/// belongs to, so stale reports can be told apart from current ones.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Status {
    Started { token: u64 },
    Rejected { token: u64, reason: &'static str },
    Position { token: u64, seconds: f64 },
    /// The playhead ran off the end of the source.
    Ended { token: u64 },
}
