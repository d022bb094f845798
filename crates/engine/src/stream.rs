use basedrop::{Collector, Handle, Shared};
use cpal::{
    FromSample, SizedSample,
    traits::{DeviceTrait, HostTrait, StreamTrait},
};
use drill_transport::{AudioArc, Command, Status};
use tracing::error;

pub type SharedSource = Shared<AudioArc>;

/// Status slots kept free for acknowledgements; position reports are dropped
/// rather than crowd them out.
const RESERVED_STATUS_SLOTS: usize = 8;

/// Audio-thread playback state. Positions are in source frames at the device
/// sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct Playhead {
    playing: bool,
    token: u64,
    frame: f64,
    rate: f64,
}

impl Default for Playhead {
    fn default() -> Self {
        Self {
            playing: false,
            token: 0,
            frame: 0.0,
            rate: 1.0,
        }
    }
}

impl Playhead {
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn token(&self) -> u64 {
        self.token
    }

    pub fn seconds(&self, sample_rate: u32) -> f64 {
        self.frame / sample_rate as f64
    }

    /// Forget the position; used when the source is swapped out.
    pub fn reset(&mut self) {
        self.playing = false;
        self.frame = 0.0;
    }

    pub fn apply(&mut self, command: Command, source: Option<&AudioArc>) -> Option<Status> {
        match command {
            Command::Play { token, start, rate } => {
                let Some(source) = source else {
                    return Some(Status::Rejected {
                        token,
                        reason: "no audio source loaded",
                    });
                };
                let frame = start * source.sample_rate() as f64;
                if !(frame.is_finite() && frame >= 0.0 && frame < source.frames() as f64) {
                    return Some(Status::Rejected {
                        token,
                        reason: "start position is outside the source",
                    });
                }
                self.playing = true;
                self.token = token;
                self.frame = frame;
                if rate.is_finite() && rate > 0.0 {
                    self.rate = rate;
                }
                Some(Status::Started { token })
            }
            Command::Stop => {
                self.playing = false;
                None
            }
            Command::SetRate(rate) => {
                if rate.is_finite() && rate > 0.0 {
                    self.rate = rate;
                }
                None
            }
            Command::Seek { seconds } => {
                if let Some(source) = source {
                    let frame = seconds * source.sample_rate() as f64;
                    self.frame = if frame.is_finite() {
                        frame.clamp(0.0, source.frames() as f64)
                    } else {
                        0.0
                    };
                }
                None
            }
        }
    }

    /// Linearly interpolated sample at the current position.
    pub fn sample(&self, source: &AudioArc, channel: usize) -> f32 {
        let index = self.frame as usize;
        let frac = (self.frame - index as f64) as f32;
        let a = source.sample(index, channel);
        let b = source.sample(index + 1, channel);
        a + (b - a) * frac
    }

    /// Step one output frame. Returns `false` once the source is exhausted,
    /// at which point playback has stopped.
    pub fn advance(&mut self, total_frames: usize) -> bool {
        self.frame += self.rate;
        if self.frame >= total_frames as f64 {
            self.frame = total_frames as f64;
            self.playing = false;
            return false;
        }
        true
    }
}

pub struct AudioEngineHandle {
    pub commands: rtrb::Producer<Command>,
    pub status: rtrb::Consumer<Status>,
    pub sources: rtrb::Producer<SharedSource>,
    pub faults: rtrb::Consumer<String>,
    pub collector: Collector,
    pub handle: Handle,
    pub sample_rate: u32,
    pub channels: u16,
    _stream: cpal::Stream,
}

impl AudioEngineHandle {
    /// Resample `audio` to the device rate and hand it to the audio thread.
    /// Whatever was playing stops.
    pub fn load(&mut self, audio: &AudioArc) -> anyhow::Result<()> {
        let audio = audio.resample(self.sample_rate)?;
        self.sources
            .push(Shared::new(&self.handle, audio))
            .map_err(|_| anyhow::anyhow!("source queue is full"))?;
        Ok(())
    }

    /// Free sources the audio thread has let go of.
    pub fn collect(&mut self) {
        self.collector.collect();
    }
}

pub fn start() -> anyhow::Result<AudioEngineHandle> {
    let collector = Collector::new();
    let handle = collector.handle();

    let (command_tx, command_rx) = rtrb::RingBuffer::<Command>::new(64);
    let (status_tx, status_rx) = rtrb::RingBuffer::<Status>::new(256);
    let (sources_tx, sources_rx) = rtrb::RingBuffer::<SharedSource>::new(4);
    let (fault_tx, fault_rx) = rtrb::RingBuffer::<String>::new(16);

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| anyhow::anyhow!("no output device found"))?;

    let config = device.default_output_config()?;
    let sample_rate = config.sample_rate().0;
    let channels = config.channels();

    let stream = match config.sample_format() {
        cpal::SampleFormat::F32 => build_stream::<f32>(
            &device,
            &config.into(),
            command_rx,
            sources_rx,
            status_tx,
            fault_tx,
        )?,
        sample_format => anyhow::bail!("unsupported sample format '{sample_format}'"),
    };

    stream.play()?;

    Ok(AudioEngineHandle {
        commands: command_tx,
        status: status_rx,
        sources: sources_tx,
        faults: fault_rx,
        collector,
        handle,
        sample_rate,
        channels,
        _stream: stream,
    })
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut command_rx: rtrb::Consumer<Command>,
    mut sources_rx: rtrb::Consumer<SharedSource>,
    mut status_tx: rtrb::Producer<Status>,
    mut fault_tx: rtrb::Producer<String>,
) -> anyhow::Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let output_channels = config.channels as usize;
    let sample_rate = config.sample_rate.0;

    let mut playhead = Playhead::default();
    let mut current_source: Option<SharedSource> = None;

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            // The replaced source is handed to the collector, not freed here.
            while let Ok(source) = sources_rx.pop() {
                current_source = Some(source);
                playhead.reset();
            }

            while let Ok(command) = command_rx.pop() {
                if let Some(status) = playhead.apply(command, current_source.as_deref()) {
                    let _ = status_tx.push(status);
                }
            }

            let was_playing = playhead.is_playing();
            let mut ended = false;

            for frame in data.chunks_mut(output_channels) {
                match current_source.as_deref() {
                    Some(source) if playhead.is_playing() => {
                        for (ch, sample) in frame.iter_mut().enumerate() {
                            *sample = T::from_sample(playhead.sample(source, ch));
                        }
                        if !playhead.advance(source.frames()) {
                            ended = true;
                        }
                    }
                    _ => {
                        for sample in frame.iter_mut() {
                            *sample = T::from_sample(0.0);
                        }
                    }
                }
            }

            if was_playing && status_tx.slots() > RESERVED_STATUS_SLOTS {
                let _ = status_tx.push(Status::Position {
                    token: playhead.token(),
                    seconds: playhead.seconds(sample_rate),
                });
            }
            if ended {
                let _ = status_tx.push(Status::Ended {
                    token: playhead.token(),
                });
            }
        },
        move |err| {
            error!(%err, "output stream error");
            let _ = fault_tx.push(err.to_string());
        },
        None,
    )?;

    Ok(stream)
}
