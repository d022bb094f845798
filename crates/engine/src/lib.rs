mod backend;
mod device;
mod stream;

pub use backend::{AudioBackend, BackendError, BackendEvent, StartTicket, WatchId};
pub use device::{DeviceBackend, StatusTracker};
pub use stream::{AudioEngineHandle, Playhead, SharedSource, start};
