//! Scripted backend for driving the engine in tests.

use std::collections::VecDeque;

use drill_engine::{AudioBackend, BackendError, BackendEvent, StartTicket, WatchId};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    SeekAndPlay { start: f64, rate: f64 },
    Stop,
    SetRate(f64),
    Rewind,
    Arm(f64),
    Clear,
}

#[derive(Debug, Default)]
pub struct MockBackend {
    pub calls: Vec<Call>,
    pub position: f64,
    /// Reject the next `seek_and_play` synchronously.
    pub refuse_next: bool,
    next_id: u64,
    last_ticket: Option<StartTicket>,
    watch: Option<WatchId>,
    events: VecDeque<BackendEvent>,
}

impl MockBackend {
    pub fn starts(&self) -> Vec<f64> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::SeekAndPlay { start, .. } => Some(*start),
                _ => None,
            })
            .collect()
    }

    pub fn last_ticket(&self) -> Option<StartTicket> {
        self.last_ticket
    }

    pub fn watch(&self) -> Option<WatchId> {
        self.watch
    }

    /// Acknowledge the most recent start request.
    pub fn ack(&mut self) {
        if let Some(ticket) = self.last_ticket {
            self.events.push_back(BackendEvent::Started(ticket));
        }
    }

    pub fn reject(&mut self, reason: &str) {
        if let Some(ticket) = self.last_ticket {
            self.events.push_back(BackendEvent::StartFailed {
                ticket,
                reason: reason.to_string(),
            });
        }
    }

    /// Fire the active watch, if any.
    pub fn reach_boundary(&mut self) {
        if let Some(id) = self.watch.take() {
            self.events.push_back(BackendEvent::Boundary(id));
        }
    }

    /// Deliver an arbitrary event, stale or not.
    pub fn inject(&mut self, event: BackendEvent) {
        self.events.push_back(event);
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }
}

impl AudioBackend for MockBackend {
    fn seek_and_play(&mut self, start: f64, rate: f64) -> Result<StartTicket, BackendError> {
        self.calls.push(Call::SeekAndPlay { start, rate });
        if std::mem::take(&mut self.refuse_next) {
            return Err(BackendError::NoSource);
        }
        self.next_id += 1;
        let ticket = StartTicket(self.next_id);
        self.last_ticket = Some(ticket);
        Ok(ticket)
    }

    fn stop(&mut self) {
        self.calls.push(Call::Stop);
    }

    fn set_rate(&mut self, rate: f64) {
        self.calls.push(Call::SetRate(rate));
    }

    fn rewind(&mut self) {
        self.calls.push(Call::Rewind);
        self.position = 0.0;
    }

    fn position(&self) -> f64 {
        self.position
    }

    fn on_boundary(&mut self, threshold: f64) -> WatchId {
        self.calls.push(Call::Arm(threshold));
        self.next_id += 1;
        let id = WatchId(self.next_id);
        self.watch = Some(id);
        id
    }

    fn clear_boundary(&mut self) {
        self.calls.push(Call::Clear);
        self.watch = None;
    }

    fn poll_event(&mut self) -> Option<BackendEvent> {
        self.events.pop_front()
    }
}
