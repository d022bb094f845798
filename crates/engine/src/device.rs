use std::collections::VecDeque;

use drill_transport::{AudioArc, Command, Status};
use tracing::{debug, warn};

use crate::backend::{AudioBackend, BackendError, BackendEvent, StartTicket, WatchId};
use crate::stream::{self, AudioEngineHandle};

/// Absorbs float error when a reported position lands a hair short of the
/// threshold it was meant to reach.
const BOUNDARY_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy)]
struct Watch {
    id: WatchId,
    threshold: f64,
}

/// Turns raw audio-thread reports into backend events.
///
/// Reports are only believed when they belong to the play request the
/// tracker considers current; anything tagged with an older token (a
/// position from the previous segment, an acknowledgement for a request that
/// was stopped) is dropped here, before the engine ever sees it.
#[derive(Debug, Default)]
pub struct StatusTracker {
    active: Option<u64>,
    pending: Option<u64>,
    watch: Option<Watch>,
    next_watch: u64,
    position: f64,
    /// The current request already ran off the end of the source.
    exhausted: bool,
}

impl StatusTracker {
    pub fn begin(&mut self, token: u64) {
        self.active = Some(token);
        self.pending = Some(token);
        self.exhausted = false;
    }

    pub fn halt(&mut self) {
        self.active = None;
        self.pending = None;
        self.exhausted = false;
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn arm(&mut self, threshold: f64) -> WatchId {
        self.next_watch += 1;
        let id = WatchId(self.next_watch);
        self.watch = Some(Watch { id, threshold });
        id
    }

    pub fn disarm(&mut self) {
        self.watch = None;
    }

    /// Fire a freshly armed watch whose request has already ended. A short
    /// segment at the tail of the source can end before its watch exists.
    pub fn settle(&mut self, events: &mut VecDeque<BackendEvent>) {
        if self.exhausted {
            if let Some(watch) = self.watch.take() {
                events.push_back(BackendEvent::Boundary(watch.id));
            }
        }
    }

    pub fn observe(&mut self, status: Status, events: &mut VecDeque<BackendEvent>) {
        match status {
            Status::Started { token } => {
                if self.pending == Some(token) {
                    self.pending = None;
                    events.push_back(BackendEvent::Started(StartTicket(token)));
                } else {
                    debug!(token, "ignoring acknowledgement for superseded request");
                }
            }
            Status::Rejected { token, reason } => {
                if self.pending == Some(token) {
                    self.halt();
                    events.push_back(BackendEvent::StartFailed {
                        ticket: StartTicket(token),
                        reason: reason.to_string(),
                    });
                }
            }
            Status::Position { token, seconds } => {
                if self.active != Some(token) {
                    return;
                }
                self.position = seconds;
                let reached = self
                    .watch
                    .is_some_and(|watch| seconds + BOUNDARY_EPSILON >= watch.threshold);
                if reached {
                    if let Some(watch) = self.watch.take() {
                        events.push_back(BackendEvent::Boundary(watch.id));
                    }
                }
            }
            Status::Ended { token } => {
                if self.active != Some(token) {
                    return;
                }
                self.active = None;
                self.exhausted = true;
                // Running out of source counts as reaching any boundary.
                if let Some(watch) = self.watch.take() {
                    events.push_back(BackendEvent::Boundary(watch.id));
                }
            }
        }
    }

    /// The device failed. An unresolved start can no longer succeed, and an
    /// audible request will never reach its boundary.
    pub fn fault(&mut self, reason: String, events: &mut VecDeque<BackendEvent>) {
        let event = match (self.pending, self.active) {
            (Some(token), _) => BackendEvent::StartFailed {
                ticket: StartTicket(token),
                reason,
            },
            (None, Some(token)) => BackendEvent::Failed {
                ticket: StartTicket(token),
                reason,
            },
            (None, None) => {
                debug!(%reason, "device fault while idle");
                return;
            }
        };
        self.halt();
        self.watch = None;
        events.push_back(event);
    }
}

/// [`AudioBackend`] over the default cpal output device.
pub struct DeviceBackend {
    engine: AudioEngineHandle,
    tracker: StatusTracker,
    events: VecDeque<BackendEvent>,
    next_token: u64,
    loaded: bool,
}

impl DeviceBackend {
    pub fn open() -> anyhow::Result<Self> {
        let engine = stream::start()?;
        debug!(
            sample_rate = engine.sample_rate,
            channels = engine.channels,
            "opened output device"
        );
        Ok(Self {
            engine,
            tracker: StatusTracker::default(),
            events: VecDeque::new(),
            next_token: 0,
            loaded: false,
        })
    }

    /// Replace the source audio. Any current playback is abandoned.
    pub fn load(&mut self, audio: &AudioArc) -> anyhow::Result<()> {
        self.stop();
        self.engine.load(audio)?;
        self.loaded = true;
        Ok(())
    }

    pub fn sample_rate(&self) -> u32 {
        self.engine.sample_rate
    }

    fn send(&mut self, command: Command) -> Result<(), BackendError> {
        self.engine
            .commands
            .push(command)
            .map_err(|_| BackendError::QueueFull)
    }

    fn pump(&mut self) {
        while let Ok(status) = self.engine.status.pop() {
            self.tracker.observe(status, &mut self.events);
        }
        while let Ok(fault) = self.engine.faults.pop() {
            self.tracker
                .fault(BackendError::Stream(fault).to_string(), &mut self.events);
        }
        self.engine.collect();
    }
}

impl AudioBackend for DeviceBackend {
    fn seek_and_play(&mut self, start: f64, rate: f64) -> Result<StartTicket, BackendError> {
        if !self.loaded {
            return Err(BackendError::NoSource);
        }
        self.next_token += 1;
        let token = self.next_token;
        self.send(Command::Play { token, start, rate })?;
        self.tracker.begin(token);
        Ok(StartTicket(token))
    }

    fn stop(&mut self) {
        self.tracker.halt();
        if self.send(Command::Stop).is_err() {
            warn!("command queue full, stop request dropped");
        }
    }

    fn set_rate(&mut self, rate: f64) {
        if self.send(Command::SetRate(rate)).is_err() {
            warn!(rate, "command queue full, rate change dropped");
        }
    }

    fn rewind(&mut self) {
        if self.send(Command::Seek { seconds: 0.0 }).is_err() {
            warn!("command queue full, rewind dropped");
        }
    }

    fn position(&self) -> f64 {
        self.tracker.position()
    }

    fn on_boundary(&mut self, threshold: f64) -> WatchId {
        let id = self.tracker.arm(threshold);
        self.tracker.settle(&mut self.events);
        id
    }

    fn clear_boundary(&mut self) {
        self.tracker.disarm();
    }

    fn poll_event(&mut self) -> Option<BackendEvent> {
        if self.events.is_empty() {
            self.pump();
        }
        self.events.pop_front()
    }
}
