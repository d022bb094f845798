use serde::{Deserialize, Serialize};

use drill_transport::Segment;

use crate::error::PlaybackError;

/// Engine run state. Exhausting a plan is reported with
/// [`Notification::Finished`] and lands straight back in `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Idle,
    Playing,
    Paused,
}

impl Mode {
    pub fn is_playing(&self) -> bool {
        matches!(self, Mode::Playing)
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Mode::Idle)
    }
}

/// Read-only copy of the engine state for rendering transport controls and
/// "segment K of N".
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSnapshot {
    pub mode: Mode,
    pub cursor: usize,
    pub plan_len: usize,
    pub rate: f64,
    pub chunk_index: Option<u32>,
    pub segment_start: Option<f64>,
    pub segment_end: Option<f64>,
}

impl EngineSnapshot {
    /// 1-based number of the current segment, if a run is in progress.
    pub fn segment_number(&self) -> Option<usize> {
        (!self.mode.is_idle() && self.cursor < self.plan_len).then_some(self.cursor + 1)
    }

    pub fn can_pause(&self) -> bool {
        self.mode == Mode::Playing
    }

    pub fn can_resume(&self) -> bool {
        self.mode == Mode::Paused
    }

    pub fn can_stop(&self) -> bool {
        !self.mode.is_idle()
    }
}

impl std::fmt::Display for EngineSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = match self.mode {
            Mode::Idle => return write!(f, "idle at {:.2}x", self.rate),
            Mode::Playing => "playing",
            Mode::Paused => "paused",
        };
        write!(f, "{mode} segment ")?;
        match self.segment_number() {
            Some(number) => write!(f, "{number} of {}", self.plan_len)?,
            None => write!(f, "- of {}", self.plan_len)?,
        }
        if let (Some(chunk), Some(start), Some(end)) =
            (self.chunk_index, self.segment_start, self.segment_end)
        {
            write!(f, " (chunk {chunk}, {start:.2}s-{end:.2}s)")?;
        }
        write!(f, " at {:.2}x", self.rate)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    StateChanged(EngineSnapshot),
    /// The backend confirmed the segment at plan `index` is audible.
    SegmentStarted { index: usize, segment: Segment },
    Finished,
    Error(PlaybackError),
}
