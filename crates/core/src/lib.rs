mod config;
mod controller;
mod error;
#[cfg(test)]
mod mock;
mod playback;
mod state;

pub use config::{PlayerConfig, ResumePolicy};
pub use controller::EngineController;
pub use error::{ConfigError, PlaybackError};
pub use playback::{EngineSettings, PlaybackEngine};
pub use state::{EngineSnapshot, Mode, Notification};

pub use drill_decode::decode_file;
pub use drill_engine::{AudioBackend, BackendError, BackendEvent, DeviceBackend, StartTicket, WatchId};
pub use drill_transport::{
    AudioArc, Chunk, DEFAULT_CHUNK_SECONDS, Segment, SegmentPlan, coerce_rate, coerce_repeat,
    parse_rate, parse_repeat, slice_chunks,
};
