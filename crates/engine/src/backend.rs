//! The interface the playback engine drives.
//!
//! Completion of a start request and boundary crossings are not delivered
//! through closures. The backend queues [`BackendEvent`]s, each naming the
//! request or watch it resolves, and the engine drains them with
//! [`AudioBackend::poll_event`] on its own scheduling turn.

/// Identifies one `seek_and_play` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StartTicket(pub u64);

/// Identifies one boundary registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WatchId(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    /// Audio for this request is playing.
    Started(StartTicket),
    /// The request will never play.
    StartFailed { ticket: StartTicket, reason: String },
    /// Audio for this already started request died before its boundary.
    Failed { ticket: StartTicket, reason: String },
    /// The playhead reached or passed the watched threshold.
    Boundary(WatchId),
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("no audio source loaded")]
    NoSource,

    #[error("audio command queue is full")]
    QueueFull,

    #[error("output stream error: {0}")]
    Stream(String),
}

pub trait AudioBackend {
    /// Begin playback at `start` seconds. An `Ok` ticket only means the
    /// request was accepted; it resolves later as [`BackendEvent::Started`]
    /// or [`BackendEvent::StartFailed`].
    fn seek_and_play(&mut self, start: f64, rate: f64) -> Result<StartTicket, BackendError>;

    /// Halt audio. Idempotent, and safe while a start is still unresolved.
    fn stop(&mut self);

    fn set_rate(&mut self, rate: f64);

    /// Move the playhead back to the beginning of the source without playing.
    fn rewind(&mut self);

    /// Last reported playhead position in seconds.
    fn position(&self) -> f64;

    /// Watch for the playhead reaching `threshold` seconds. Replaces any
    /// watch registered earlier; the replaced one never fires.
    fn on_boundary(&mut self, threshold: f64) -> WatchId;

    fn clear_boundary(&mut self);

    fn poll_event(&mut self) -> Option<BackendEvent>;
}
