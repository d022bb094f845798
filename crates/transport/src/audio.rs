use std::sync::Arc;

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

/// Decoded, immutable source audio shared between the control side and the
/// output callback.
///
/// Samples live in an `Arc<[f32]>`, so cloning only bumps a refcount. The
/// playback engine never mutates a source; loading a new file produces a new
/// `AudioArc`.
///
/// ```
/// use drill_transport::AudioArc;
///
/// let audio = AudioArc::new(vec![0.0, 0.5, 1.0, 0.5], 44100, 2);
/// assert_eq!(audio.frames(), 2);
/// assert_eq!(audio.clone().samples()[2], 1.0);
/// ```
#[derive(Clone)]
pub struct AudioArc {
    /// Interleaved samples, e.g. [L, R, L, R, ...] for stereo.
    samples: Arc<[f32]>,
    sample_rate: u32,
    channels: u16,
}

impl AudioArc {
    /// # Panics
    ///
    /// Panics if `channels` is 0 or `samples.len()` is not a multiple of `channels`.
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        assert!(channels > 0, "channels must be greater than 0");
        assert_eq!(
            samples.len() % channels as usize,
            0,
            "samples.len() must be divisible by channels"
        );
        Self {
            samples: Arc::from(samples),
            sample_rate,
            channels,
        }
    }

    #[inline]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of frames (samples per channel).
    #[inline]
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Sample at `frame` for output channel `channel`. Output channels beyond
    /// the source's channel count wrap around, so mono sources fill stereo
    /// outputs. Out-of-range frames read as silence.
    #[inline]
    pub fn sample(&self, frame: usize, channel: usize) -> f32 {
        let channels = self.channels as usize;
        self.samples
            .get(frame * channels + channel % channels)
            .copied()
            .unwrap_or(0.0)
    }

    /// Resample to `target_sample_rate`, returning a cheap clone when the rate
    /// already matches.
    pub fn resample(&self, target_sample_rate: u32) -> anyhow::Result<Self> {
        if self.sample_rate == target_sample_rate || self.is_empty() {
            return Ok(Self {
                samples: self.samples.clone(),
                sample_rate: if self.is_empty() {
                    target_sample_rate
                } else {
                    self.sample_rate
                },
                channels: self.channels,
            });
        }

        let channels = self.channels as usize;
        let input_frames = self.frames();
        let ratio = target_sample_rate as f64 / self.sample_rate as f64;

        // rubato works on planar buffers
        let mut planar = vec![Vec::with_capacity(input_frames); channels];
        for frame in self.samples.chunks_exact(channels) {
            for (ch, sample) in frame.iter().enumerate() {
                planar[ch].push(*sample);
            }
        }

        let params = SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        };
        let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, input_frames, channels)?;
        let output = resampler.process(&planar, None)?;

        let output_frames = output.first().map_or(0, Vec::len);
        let mut interleaved = Vec::with_capacity(output_frames * channels);
        for frame in 0..output_frames {
            for channel in &output {
                interleaved.push(channel[frame]);
            }
        }

        Ok(Self::new(interleaved, target_sample_rate, self.channels))
    }
}

impl std::fmt::Debug for AudioArc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioArc")
            .field("frames", &self.frames())
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .field("duration_secs", &self.duration_secs())
            .finish()
    }
}
