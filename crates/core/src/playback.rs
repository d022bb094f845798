//! Segment-by-segment playback state machine.
//!
//! The engine is driven from a single thread: user intents arrive through
//! its methods and backend reports through [`PlaybackEngine::poll`]. Every
//! report is checked against the current mode and against the exact start
//! ticket or boundary watch the engine is waiting on, so late or duplicated
//! reports from a cancelled run can never move the cursor of a live one.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use drill_engine::{AudioBackend, BackendEvent, StartTicket, WatchId};
use drill_transport::{DEFAULT_RATE, SegmentPlan, coerce_rate};
use tracing::{debug, error, warn};

use crate::config::{PlayerConfig, ResumePolicy};
use crate::error::PlaybackError;
use crate::state::{EngineSnapshot, Mode, Notification};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    /// Minimum delay between stopping one segment and starting the next.
    pub advance_gap: Duration,
    pub resume: ResumePolicy,
    pub rewind_on_stop: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        PlayerConfig::default().engine_settings()
    }
}

#[derive(Debug)]
struct EngineState {
    mode: Mode,
    plan: SegmentPlan,
    cursor: usize,
    rate: f64,
}

impl Default for EngineState {
    fn default() -> Self {
        Self {
            mode: Mode::Idle,
            plan: SegmentPlan::default(),
            cursor: 0,
            rate: DEFAULT_RATE,
        }
    }
}

pub struct PlaybackEngine<B> {
    backend: B,
    settings: EngineSettings,
    state: EngineState,
    /// Start request waiting for its acknowledgement.
    pending_start: Option<StartTicket>,
    /// Acknowledged request whose segment is audible right now.
    audible: Option<StartTicket>,
    /// The only boundary registration the engine holds.
    watch: Option<WatchId>,
    /// When the segment at the cursor is due after a boundary.
    next_start_at: Option<Instant>,
    /// Playhead captured by `pause` while a segment was audible.
    paused_at: Option<f64>,
    notifications: VecDeque<Notification>,
}

impl<B: AudioBackend> PlaybackEngine<B> {
    pub fn new(backend: B, settings: EngineSettings) -> Self {
        Self {
            backend,
            settings,
            state: EngineState::default(),
            pending_start: None,
            audible: None,
            watch: None,
            next_start_at: None,
            paused_at: None,
            notifications: VecDeque::new(),
        }
    }

    /// Replace whatever is running with `plan` and start its first segment.
    pub fn start(&mut self, plan: SegmentPlan) {
        if plan.is_empty() {
            debug!("empty plan, nothing to play");
            if !self.state.mode.is_idle() {
                self.reset();
                self.notify_state();
            }
            return;
        }

        // Tear down the previous run before anything of the new one reaches
        // the backend.
        self.reset();

        debug!(segments = plan.len(), "starting plan");
        self.state.plan = plan;
        self.state.cursor = 0;
        self.state.mode = Mode::Playing;
        self.backend.set_rate(self.state.rate);
        self.notify_state();
        self.play_current_segment();
    }

    pub fn pause(&mut self) {
        if !self.state.mode.is_playing() {
            debug!(mode = ?self.state.mode, "pause ignored");
            return;
        }

        let audible = self.pending_start.is_none() && self.next_start_at.is_none();
        self.paused_at = audible.then(|| self.backend.position());

        self.disarm_boundary();
        self.pending_start = None;
        self.audible = None;
        self.next_start_at = None;
        self.backend.stop();
        self.state.mode = Mode::Paused;
        self.notify_state();
    }

    /// Resume the segment at the cursor. The cursor never moves here.
    pub fn resume(&mut self) {
        if self.state.mode != Mode::Paused {
            debug!(mode = ?self.state.mode, "resume ignored");
            return;
        }

        let offset = match self.settings.resume {
            ResumePolicy::RestartSegment => None,
            ResumePolicy::Continue => self.paused_at,
        };
        self.paused_at = None;
        self.state.mode = Mode::Playing;
        self.notify_state();
        self.play_from(offset);
    }

    pub fn stop(&mut self) {
        let was_idle = self.state.mode.is_idle();
        self.reset();
        if !was_idle {
            self.notify_state();
        }
    }

    pub fn set_rate(&mut self, rate: f64) {
        let coerced = coerce_rate(rate);
        if coerced != rate {
            warn!(rate, coerced, "invalid playback rate");
        }
        self.state.rate = coerced;
        if self.state.mode.is_playing() {
            self.backend.set_rate(coerced);
        }
        self.notify_state();
    }

    /// Run one scheduling turn: start a segment that has come due, then
    /// handle whatever the backend reported. A boundary handled here never
    /// starts the next segment in the same turn.
    pub fn poll(&mut self, now: Instant) {
        if self.next_start_at.is_some_and(|at| now >= at) {
            self.next_start_at = None;
            self.play_current_segment();
        }

        while let Some(event) = self.backend.poll_event() {
            match event {
                BackendEvent::Started(ticket) => self.on_started(ticket),
                BackendEvent::StartFailed { ticket, reason } => {
                    self.on_start_failed(ticket, reason)
                }
                BackendEvent::Failed { ticket, reason } => {
                    self.on_playback_failed(ticket, reason)
                }
                BackendEvent::Boundary(id) => self.on_segment_boundary(id, now),
            }
        }
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        let segment = if self.state.mode.is_idle() {
            None
        } else {
            self.state.plan.get(self.state.cursor)
        };
        EngineSnapshot {
            mode: self.state.mode,
            cursor: self.state.cursor,
            plan_len: self.state.plan.len(),
            rate: self.state.rate,
            chunk_index: segment.map(|s| s.chunk),
            segment_start: segment.map(|s| s.start),
            segment_end: segment.map(|s| s.end),
        }
    }

    pub fn mode(&self) -> Mode {
        self.state.mode
    }

    pub fn cursor(&self) -> usize {
        self.state.cursor
    }

    pub fn rate(&self) -> f64 {
        self.state.rate
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        self.notifications.drain(..).collect()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    fn play_current_segment(&mut self) {
        self.play_from(None);
    }

    /// Request the segment at the cursor, from `offset` if it falls inside
    /// the segment and from its start otherwise.
    fn play_from(&mut self, offset: Option<f64>) {
        if !self.state.mode.is_playing() {
            debug!(mode = ?self.state.mode, "segment start skipped");
            return;
        }
        let Some(segment) = self.state.plan.get(self.state.cursor) else {
            self.finish();
            return;
        };

        let start = offset
            .filter(|&t| segment.contains(t))
            .unwrap_or(segment.start);
        match self.backend.seek_and_play(start, self.state.rate) {
            Ok(ticket) => {
                debug!(cursor = self.state.cursor, start, end = segment.end, "segment requested");
                self.pending_start = Some(ticket);
            }
            Err(err) => self.abort(PlaybackError::BackendStart {
                index: self.state.cursor,
                start,
                reason: err.to_string(),
            }),
        }
    }

    fn on_started(&mut self, ticket: StartTicket) {
        if !self.state.mode.is_playing() || self.pending_start != Some(ticket) {
            debug!(?ticket, "stale start acknowledgement discarded");
            return;
        }
        self.pending_start = None;
        self.audible = Some(ticket);

        let index = self.state.cursor;
        if let Some(segment) = self.state.plan.get(index) {
            self.arm_boundary(segment.end);
            self.notifications
                .push_back(Notification::SegmentStarted { index, segment });
        }
    }

    fn on_start_failed(&mut self, ticket: StartTicket, reason: String) {
        if self.pending_start != Some(ticket) {
            debug!(?ticket, %reason, "stale start failure discarded");
            return;
        }
        let start = self
            .state
            .plan
            .get(self.state.cursor)
            .map_or(0.0, |s| s.start);
        self.abort(PlaybackError::BackendStart {
            index: self.state.cursor,
            start,
            reason,
        });
    }

    fn on_playback_failed(&mut self, ticket: StartTicket, reason: String) {
        if !self.state.mode.is_playing() || self.audible != Some(ticket) {
            debug!(?ticket, %reason, "stale playback failure discarded");
            return;
        }
        self.abort(PlaybackError::PlaybackLost {
            index: self.state.cursor,
            reason,
        });
    }

    fn on_segment_boundary(&mut self, id: WatchId, now: Instant) {
        if !self.state.mode.is_playing() || self.watch != Some(id) {
            debug!(?id, "stale boundary discarded");
            return;
        }
        // One-shot: the backend has already dropped this watch.
        self.watch = None;
        self.audible = None;
        self.backend.stop();
        self.state.cursor += 1;
        self.next_start_at = Some(now + self.settings.advance_gap);
        self.notify_state();
    }

    fn abort(&mut self, err: PlaybackError) {
        error!(%err, "playback aborted");
        self.reset();
        self.notifications.push_back(Notification::Error(err));
        self.notify_state();
    }

    fn finish(&mut self) {
        debug!(segments = self.state.plan.len(), "plan finished");
        self.reset();
        self.notifications.push_back(Notification::Finished);
        self.notify_state();
    }

    /// Cancel everything in flight and return to `Idle` with no plan.
    fn reset(&mut self) {
        self.disarm_boundary();
        self.pending_start = None;
        self.audible = None;
        self.next_start_at = None;
        self.paused_at = None;
        self.backend.stop();
        if self.settings.rewind_on_stop {
            self.backend.rewind();
        }
        self.state.plan = SegmentPlan::default();
        self.state.cursor = 0;
        self.state.mode = Mode::Idle;
    }

    fn arm_boundary(&mut self, threshold: f64) {
        // The backend drops any earlier registration on its own.
        self.watch = Some(self.backend.on_boundary(threshold));
    }

    fn disarm_boundary(&mut self) {
        if self.watch.take().is_some() {
            self.backend.clear_boundary();
        }
    }

    fn notify_state(&mut self) {
        let snapshot = self.snapshot();
        self.notifications
            .push_back(Notification::StateChanged(snapshot));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{Call, MockBackend};
    use drill_transport::Chunk;

    const GAP: Duration = Duration::from_millis(50);

    fn engine_with(settings: EngineSettings) -> PlaybackEngine<MockBackend> {
        PlaybackEngine::new(MockBackend::default(), settings)
    }

    fn engine() -> PlaybackEngine<MockBackend> {
        engine_with(EngineSettings::default())
    }

    /// Three distinct chunks, one repetition each.
    fn distinct_plan() -> SegmentPlan {
        let chunks = [
            Chunk::new(1, 0.0, 5.0, 1),
            Chunk::new(2, 5.0, 5.0, 1),
            Chunk::new(3, 10.0, 5.0, 1),
        ];
        SegmentPlan::build(&chunks, 1)
    }

    fn repeating_plan() -> SegmentPlan {
        let chunks = [Chunk::new(1, 0.0, 5.0, 2), Chunk::new(2, 5.0, 5.0, 1)];
        SegmentPlan::build(&chunks, 1)
    }

    /// Let the segment at the cursor start and reach its end, then wait out
    /// the gap so the next one is requested.
    fn complete_segment(engine: &mut PlaybackEngine<MockBackend>, now: &mut Instant) {
        engine.backend_mut().ack();
        engine.poll(*now);
        engine.backend_mut().reach_boundary();
        engine.poll(*now);
        *now += GAP;
        engine.poll(*now);
    }

    fn started_indices(notifications: &[Notification]) -> Vec<usize> {
        notifications
            .iter()
            .filter_map(|n| match n {
                Notification::SegmentStarted { index, .. } => Some(*index),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_plays_each_segment_once_in_order() {
        let mut engine = engine();
        let mut now = Instant::now();

        engine.start(repeating_plan());
        for _ in 0..3 {
            complete_segment(&mut engine, &mut now);
        }

        assert_eq!(engine.backend().starts(), vec![0.0, 0.0, 5.0]);
        assert_eq!(engine.mode(), Mode::Idle);
        let notifications = engine.drain_notifications();
        assert_eq!(started_indices(&notifications), vec![0, 1, 2]);
        assert!(notifications.contains(&Notification::Finished));
    }

    #[test]
    fn test_boundary_armed_at_segment_end_after_acknowledgement() {
        let mut engine = engine();
        engine.start(distinct_plan());
        assert_eq!(engine.backend().watch(), None);

        engine.backend_mut().ack();
        engine.poll(Instant::now());

        assert!(engine.backend().calls.contains(&Call::Arm(5.0)));
        assert!(engine.backend().watch().is_some());
    }

    #[test]
    fn test_duplicate_boundary_advances_once() {
        let mut engine = engine();
        let mut now = Instant::now();
        engine.start(distinct_plan());
        engine.backend_mut().ack();
        engine.poll(now);

        let watch = engine.backend().watch().unwrap();
        engine.backend_mut().inject(BackendEvent::Boundary(watch));
        engine.backend_mut().inject(BackendEvent::Boundary(watch));
        engine.poll(now);
        assert_eq!(engine.cursor(), 1);

        // and once more after the next segment is already running
        now += GAP;
        engine.poll(now);
        engine.backend_mut().ack();
        engine.backend_mut().inject(BackendEvent::Boundary(watch));
        engine.poll(now);

        assert_eq!(engine.cursor(), 1);
        assert_eq!(engine.backend().starts(), vec![0.0, 5.0]);
    }

    #[test]
    fn test_next_segment_waits_for_gap() {
        let mut engine = engine();
        let now = Instant::now();
        engine.start(distinct_plan());
        engine.backend_mut().ack();
        engine.poll(now);
        engine.backend_mut().reach_boundary();
        engine.poll(now);

        assert_eq!(engine.backend().calls.last(), Some(&Call::Stop));

        engine.poll(now + Duration::from_millis(10));
        assert_eq!(engine.backend().starts().len(), 1);

        engine.poll(now + GAP);
        assert_eq!(engine.backend().starts(), vec![0.0, 5.0]);
    }

    #[test]
    fn test_next_segment_never_starts_in_boundary_turn() {
        let mut engine = engine_with(EngineSettings {
            advance_gap: Duration::ZERO,
            ..EngineSettings::default()
        });
        let now = Instant::now();
        engine.start(distinct_plan());
        engine.backend_mut().ack();
        engine.backend_mut().inject(BackendEvent::Started(StartTicket(999)));
        engine.poll(now);
        engine.backend_mut().reach_boundary();
        engine.poll(now);
        assert_eq!(engine.backend().starts().len(), 1);

        engine.poll(now);
        assert_eq!(engine.backend().starts().len(), 2);
    }

    #[test]
    fn test_stop_at_any_cursor_silences_old_callbacks() {
        for stop_at in 0..3 {
            let mut engine = engine();
            let mut now = Instant::now();
            engine.start(distinct_plan());
            for _ in 0..stop_at {
                complete_segment(&mut engine, &mut now);
            }
            engine.backend_mut().ack();
            engine.poll(now);
            let watch = engine.backend().watch().unwrap();
            let ticket = engine.backend().last_ticket().unwrap();

            engine.stop();
            assert_eq!(engine.mode(), Mode::Idle);
            assert_eq!(engine.cursor(), 0);
            assert_eq!(engine.snapshot().plan_len, 0);

            let starts_before = engine.backend().starts().len();
            engine.backend_mut().inject(BackendEvent::Started(ticket));
            engine.backend_mut().inject(BackendEvent::Boundary(watch));
            engine.poll(now);
            engine.poll(now + Duration::from_secs(10));

            assert_eq!(engine.backend().starts().len(), starts_before);
            assert_eq!(engine.cursor(), 0);
            assert_eq!(engine.mode(), Mode::Idle);
        }
    }

    #[test]
    fn test_stop_during_gap_cancels_pending_start() {
        let mut engine = engine();
        let now = Instant::now();
        engine.start(distinct_plan());
        engine.backend_mut().ack();
        engine.poll(now);
        engine.backend_mut().reach_boundary();
        engine.poll(now);

        engine.stop();
        engine.poll(now + GAP * 4);

        assert_eq!(engine.backend().starts(), vec![0.0]);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut engine = engine();
        engine.stop();
        engine.stop();

        assert_eq!(engine.mode(), Mode::Idle);
        assert!(engine.drain_notifications().is_empty());
        assert!(!engine.backend().calls.contains(&Call::Rewind));
    }

    #[test]
    fn test_rewind_on_stop_when_configured() {
        let mut engine = engine_with(EngineSettings {
            rewind_on_stop: true,
            ..EngineSettings::default()
        });
        engine.start(distinct_plan());
        engine.backend_mut().clear_calls();

        engine.stop();

        assert_eq!(engine.backend().calls, vec![Call::Stop, Call::Rewind]);
    }

    #[test]
    fn test_pause_then_resume_replays_same_segment() {
        let mut engine = engine();
        let mut now = Instant::now();
        engine.start(distinct_plan());
        complete_segment(&mut engine, &mut now);
        engine.backend_mut().ack();
        engine.poll(now);
        engine.backend_mut().position = 7.5;

        engine.pause();
        assert_eq!(engine.mode(), Mode::Paused);
        assert_eq!(engine.cursor(), 1);
        assert_eq!(engine.backend().watch(), None);

        engine.resume();
        assert_eq!(engine.mode(), Mode::Playing);
        assert_eq!(engine.backend().starts(), vec![0.0, 5.0, 5.0]);

        complete_segment(&mut engine, &mut now);
        assert_eq!(engine.backend().starts(), vec![0.0, 5.0, 5.0, 10.0]);
    }

    #[test]
    fn test_continue_policy_resumes_from_playhead() {
        let mut engine = engine_with(EngineSettings {
            resume: ResumePolicy::Continue,
            ..EngineSettings::default()
        });
        let now = Instant::now();
        engine.start(distinct_plan());
        engine.backend_mut().ack();
        engine.poll(now);
        engine.backend_mut().position = 2.5;

        engine.pause();
        engine.resume();
        engine.backend_mut().ack();
        engine.poll(now);

        assert_eq!(engine.backend().starts(), vec![0.0, 2.5]);
        assert_eq!(engine.backend().calls.last(), Some(&Call::Arm(5.0)));
    }

    #[test]
    fn test_continue_policy_restarts_when_playhead_outside_segment() {
        let mut engine = engine_with(EngineSettings {
            resume: ResumePolicy::Continue,
            ..EngineSettings::default()
        });
        engine.start(distinct_plan());
        engine.backend_mut().ack();
        engine.poll(Instant::now());
        engine.backend_mut().position = 6.0;

        engine.pause();
        engine.resume();

        assert_eq!(engine.backend().starts(), vec![0.0, 0.0]);
    }

    #[test]
    fn test_pause_before_acknowledgement_discards_late_start() {
        let mut engine = engine();
        let now = Instant::now();
        engine.start(distinct_plan());

        engine.pause();
        engine.backend_mut().ack();
        engine.poll(now);

        assert_eq!(engine.mode(), Mode::Paused);
        assert_eq!(engine.backend().watch(), None);
        assert!(started_indices(&engine.drain_notifications()).is_empty());

        engine.resume();
        assert_eq!(engine.backend().starts(), vec![0.0, 0.0]);
    }

    #[test]
    fn test_pause_during_gap_resumes_next_segment() {
        let mut engine = engine();
        let now = Instant::now();
        engine.start(distinct_plan());
        engine.backend_mut().ack();
        engine.poll(now);
        engine.backend_mut().reach_boundary();
        engine.poll(now);

        engine.pause();
        engine.poll(now + GAP * 2);
        assert_eq!(engine.backend().starts(), vec![0.0]);

        engine.resume();
        assert_eq!(engine.backend().starts(), vec![0.0, 5.0]);
        assert_eq!(engine.cursor(), 1);
    }

    #[test]
    fn test_pause_and_resume_outside_their_states_are_ignored() {
        let mut engine = engine();
        engine.pause();
        engine.resume();
        assert_eq!(engine.mode(), Mode::Idle);
        assert!(engine.backend().calls.is_empty());

        engine.start(distinct_plan());
        engine.resume();
        assert_eq!(engine.backend().starts().len(), 1);
    }

    #[test]
    fn test_new_plan_stops_previous_before_starting() {
        let mut engine = engine();
        let mut now = Instant::now();
        engine.start(distinct_plan());
        complete_segment(&mut engine, &mut now);
        engine.backend_mut().ack();
        engine.poll(now);
        let old_watch = engine.backend().watch().unwrap();
        let old_ticket = engine.backend().last_ticket().unwrap();
        engine.backend_mut().clear_calls();

        let next = SegmentPlan::build(&[Chunk::new(7, 30.0, 2.0, 1)], 2);
        engine.start(next);

        let calls = &engine.backend().calls;
        let stop = calls.iter().position(|c| *c == Call::Stop).unwrap();
        let play = calls
            .iter()
            .position(|c| matches!(c, Call::SeekAndPlay { .. }))
            .unwrap();
        assert!(stop < play);

        engine.backend_mut().inject(BackendEvent::Boundary(old_watch));
        engine.backend_mut().inject(BackendEvent::Started(old_ticket));
        engine.poll(now);
        engine.poll(now + GAP);

        assert_eq!(engine.cursor(), 0);
        assert_eq!(engine.backend().starts(), vec![30.0]);
        assert_eq!(engine.snapshot().plan_len, 2);
        assert_eq!(engine.snapshot().chunk_index, Some(7));
    }

    #[test]
    fn test_empty_plan_never_touches_backend() {
        let mut engine = engine();
        engine.start(SegmentPlan::default());

        assert_eq!(engine.mode(), Mode::Idle);
        assert!(engine.backend().calls.is_empty());
    }

    #[test]
    fn test_empty_plan_cancels_running_plan() {
        let mut engine = engine();
        engine.start(distinct_plan());
        engine.backend_mut().clear_calls();

        engine.start(SegmentPlan::build(&[], 3));

        assert_eq!(engine.mode(), Mode::Idle);
        assert_eq!(engine.backend().calls, vec![Call::Stop]);
    }

    #[test]
    fn test_refused_start_reports_error_and_stops() {
        let mut engine = engine();
        engine.backend_mut().refuse_next = true;

        engine.start(distinct_plan());

        assert_eq!(engine.mode(), Mode::Idle);
        let notifications = engine.drain_notifications();
        assert!(notifications.iter().any(|n| matches!(
            n,
            Notification::Error(PlaybackError::BackendStart { index: 0, .. })
        )));
    }

    #[test]
    fn test_async_start_failure_reports_error_and_stops() {
        let mut engine = engine();
        let mut now = Instant::now();
        engine.start(distinct_plan());
        complete_segment(&mut engine, &mut now);

        engine.backend_mut().reject("device busy");
        engine.poll(now);

        assert_eq!(engine.mode(), Mode::Idle);
        let error = engine
            .drain_notifications()
            .into_iter()
            .find_map(|n| match n {
                Notification::Error(err) => Some(err),
                _ => None,
            })
            .unwrap();
        assert_eq!(
            error,
            PlaybackError::BackendStart {
                index: 1,
                start: 5.0,
                reason: "device busy".to_string(),
            }
        );
        assert!(error.to_string().contains("device busy"));

        // the user can start again right away
        engine.start(distinct_plan());
        assert_eq!(engine.mode(), Mode::Playing);
    }

    #[test]
    fn test_failure_while_audible_reports_error_and_stops() {
        let mut engine = engine();
        let mut now = Instant::now();
        engine.start(distinct_plan());
        complete_segment(&mut engine, &mut now);
        engine.backend_mut().ack();
        engine.poll(now);
        let ticket = engine.backend().last_ticket().unwrap();

        engine.backend_mut().inject(BackendEvent::Failed {
            ticket,
            reason: "device unplugged".into(),
        });
        engine.poll(now);

        assert_eq!(engine.mode(), Mode::Idle);
        assert_eq!(engine.backend().watch(), None);
        let notifications = engine.drain_notifications();
        assert!(notifications.contains(&Notification::Error(
            PlaybackError::PlaybackLost {
                index: 1,
                reason: "device unplugged".into(),
            }
        )));
    }

    #[test]
    fn test_failure_of_finished_segment_is_ignored() {
        let mut engine = engine();
        let now = Instant::now();
        engine.start(distinct_plan());
        engine.backend_mut().ack();
        engine.poll(now);
        let first = engine.backend().last_ticket().unwrap();
        engine.backend_mut().reach_boundary();
        engine.poll(now);

        engine.backend_mut().inject(BackendEvent::Failed {
            ticket: first,
            reason: "late".into(),
        });
        engine.poll(now);
        assert_eq!(engine.mode(), Mode::Playing);

        engine.pause();
        engine.backend_mut().inject(BackendEvent::Failed {
            ticket: first,
            reason: "late".into(),
        });
        engine.poll(now + GAP);
        assert_eq!(engine.mode(), Mode::Paused);
    }

    #[test]
    fn test_stale_failure_is_ignored() {
        let mut engine = engine();
        engine.start(distinct_plan());
        let old = engine.backend().last_ticket().unwrap();
        engine.start(distinct_plan());

        engine.backend_mut().inject(BackendEvent::StartFailed {
            ticket: old,
            reason: "late".into(),
        });
        engine.poll(Instant::now());

        assert_eq!(engine.mode(), Mode::Playing);
    }

    #[test]
    fn test_rate_is_cached_while_idle() {
        let mut engine = engine();
        engine.set_rate(1.5);
        assert!(engine.backend().calls.is_empty());

        engine.start(distinct_plan());
        assert_eq!(
            engine.backend().calls,
            vec![
                Call::Stop,
                Call::SetRate(1.5),
                Call::SeekAndPlay {
                    start: 0.0,
                    rate: 1.5
                },
            ]
        );
    }

    #[test]
    fn test_rate_changed_while_paused_applies_on_resume() {
        let mut engine = engine();
        engine.start(distinct_plan());
        engine.backend_mut().ack();
        engine.poll(Instant::now());
        engine.pause();
        engine.backend_mut().clear_calls();

        engine.set_rate(0.5);
        assert!(engine.backend().calls.is_empty());

        engine.resume();
        assert_eq!(
            engine.backend().calls,
            vec![Call::SeekAndPlay {
                start: 0.0,
                rate: 0.5
            }]
        );
        assert_eq!(engine.snapshot().rate, 0.5);
    }

    #[test]
    fn test_rate_applies_immediately_while_playing() {
        let mut engine = engine();
        engine.start(distinct_plan());
        engine.backend_mut().clear_calls();

        engine.set_rate(0.75);
        engine.set_rate(f64::NAN);

        assert_eq!(
            engine.backend().calls,
            vec![Call::SetRate(0.75), Call::SetRate(1.0)]
        );
        assert_eq!(engine.rate(), 1.0);
    }

    #[test]
    fn test_snapshot_tracks_current_segment() {
        let mut engine = engine();
        let mut now = Instant::now();
        engine.start(repeating_plan());
        complete_segment(&mut engine, &mut now);
        complete_segment(&mut engine, &mut now);

        let snapshot = engine.snapshot();
        assert_eq!(snapshot.mode, Mode::Playing);
        assert_eq!(snapshot.segment_number(), Some(3));
        assert_eq!(snapshot.plan_len, 3);
        assert_eq!(snapshot.chunk_index, Some(2));
        assert_eq!(snapshot.segment_start, Some(5.0));
        assert_eq!(snapshot.segment_end, Some(10.0));
    }
}
