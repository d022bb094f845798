use std::path::Path;
use std::time::Instant;

use drill_engine::{AudioBackend, DeviceBackend};
use drill_transport::{AudioArc, Chunk, SegmentPlan};
use tracing::{debug, info};

use crate::config::PlayerConfig;
use crate::playback::PlaybackEngine;
use crate::state::{EngineSnapshot, Mode, Notification};

/// Public entry point for UI collaborators. Every intent is forwarded to the
/// engine; all playback state lives there.
pub struct EngineController<B> {
    engine: PlaybackEngine<B>,
}

impl<B: AudioBackend> EngineController<B> {
    pub fn new(backend: B, config: &PlayerConfig) -> Self {
        let mut engine = PlaybackEngine::new(backend, config.engine_settings());
        engine.set_rate(config.default_rate);
        // The initial rate is not a transition anyone needs to hear about.
        engine.drain_notifications();
        Self { engine }
    }

    /// Play one chunk `chunk.repeat()` times.
    pub fn play_chunk(&mut self, chunk: &Chunk) {
        debug!(chunk = chunk.index(), repeat = chunk.repeat(), "play chunk");
        self.engine.start(SegmentPlan::single(chunk));
    }

    /// Play the chunk at position `index` of `chunks`. Returns false and
    /// leaves playback untouched when there is no such chunk.
    pub fn play_chunk_at(&mut self, chunks: &[Chunk], index: usize) -> bool {
        match chunks.get(index) {
            Some(chunk) => {
                self.play_chunk(chunk);
                true
            }
            None => {
                debug!(index, available = chunks.len(), "no chunk at index");
                false
            }
        }
    }

    pub fn play_all(&mut self, chunks: &[Chunk], global_repeat: u32) {
        debug!(chunks = chunks.len(), global_repeat, "play all");
        self.engine.start(SegmentPlan::build(chunks, global_repeat));
    }

    pub fn pause(&mut self) {
        self.engine.pause();
    }

    pub fn resume(&mut self) {
        self.engine.resume();
    }

    /// Pause when playing, resume when paused, otherwise nothing.
    pub fn toggle_pause(&mut self) {
        match self.engine.mode() {
            Mode::Playing => self.engine.pause(),
            Mode::Paused => self.engine.resume(),
            Mode::Idle => {}
        }
    }

    pub fn stop(&mut self) {
        self.engine.stop();
    }

    pub fn set_rate(&mut self, rate: f64) {
        self.engine.set_rate(rate);
    }

    /// One turn of the cooperative loop.
    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    pub fn tick_at(&mut self, now: Instant) {
        self.engine.poll(now);
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        self.engine.snapshot()
    }

    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        self.engine.drain_notifications()
    }

    pub fn backend(&self) -> &B {
        self.engine.backend()
    }

    pub fn backend_mut(&mut self) -> &mut B {
        self.engine.backend_mut()
    }
}

impl EngineController<DeviceBackend> {
    /// Open the default output device and load `audio` into it.
    pub fn with_device(audio: &AudioArc, config: &PlayerConfig) -> anyhow::Result<Self> {
        let mut backend = DeviceBackend::open()?;
        backend.load(audio)?;
        info!(
            duration = audio.duration_secs(),
            sample_rate = backend.sample_rate(),
            "source loaded"
        );
        Ok(Self::new(backend, config))
    }

    /// Decode `path` and open it on the default output device.
    pub fn from_file(path: &Path, config: &PlayerConfig) -> anyhow::Result<(Self, AudioArc)> {
        let audio = drill_decode::decode_file(path)?;
        let controller = Self::with_device(&audio, config)?;
        Ok((controller, audio))
    }

    /// Replace the source on the running stream. Any playback is stopped
    /// first so no segment of the old source can continue.
    pub fn load(&mut self, audio: &AudioArc) -> anyhow::Result<()> {
        self.engine.stop();
        self.engine.backend_mut().load(audio)
    }
}
