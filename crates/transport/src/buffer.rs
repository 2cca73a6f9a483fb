use std::sync::Arc;

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

/// Largest channel count a buffer may carry.
pub const MAX_CHANNELS: usize = 2;

/// Shared, immutable decoded audio.
///
/// `SampleBuffer` stores one contiguous slice per channel behind a single
/// `Arc`, so cloning only bumps a reference count and every holder sees the
/// same samples. Buffers are produced fresh by the decoder or the offline
/// renderer and are never mutated afterwards.
///
/// # Memory Layout
///
/// ```text
/// SampleBuffer
/// ├─ channels: Arc<[Box<[f32]>]> ──> Heap: [ [f32; frames], [f32; frames] ]
/// └─ sample_rate: u32
/// ```
///
/// # Examples
///
/// ```
/// use echo_transport::SampleBuffer;
///
/// let left = vec![0.0, 0.5, 1.0];
/// let right = vec![1.0, 0.5, 0.0];
/// let audio = SampleBuffer::new(vec![left, right], 44100);
///
/// let shared = audio.clone();
/// assert_eq!(audio.frames(), 3);
/// assert_eq!(shared.channel(1)[0], 1.0);
/// ```
#[derive(Clone)]
pub struct SampleBuffer {
    /// Per-channel sample data, all of equal length.
    channels: Arc<[Box<[f32]>]>,
    /// Sample rate in Hz (e.g., 44100, 48000)
    sample_rate: u32,
}

impl SampleBuffer {
    /// Create a buffer from per-channel sample vectors.
    ///
    /// # Panics
    ///
    /// Panics if there are no channels, more than two, or if the channels
    /// differ in length.
    pub fn new(channels: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        assert!(!channels.is_empty(), "channels must be greater than 0");
        assert!(
            channels.len() <= MAX_CHANNELS,
            "at most {MAX_CHANNELS} channels are supported"
        );
        let frames = channels[0].len();
        assert!(
            channels.iter().all(|c| c.len() == frames),
            "all channels must have the same length"
        );
        Self {
            channels: channels.into_iter().map(Vec::into_boxed_slice).collect(),
            sample_rate,
        }
    }

    /// Create a buffer from interleaved samples (`[L, R, L, R, ...]` for stereo).
    ///
    /// # Panics
    ///
    /// Panics if `channels` is 0 or above two, or if `samples.len()` is not
    /// divisible by `channels`.
    pub fn from_interleaved(samples: &[f32], sample_rate: u32, channels: u16) -> Self {
        assert!(channels > 0, "channels must be greater than 0");
        assert_eq!(
            samples.len() % channels as usize,
            0,
            "samples.len() must be divisible by channels"
        );
        let count = channels as usize;
        let planar = (0..count)
            .map(|ch| samples.iter().skip(ch).step_by(count).copied().collect())
            .collect();
        Self::new(planar, sample_rate)
    }

    /// A buffer of `frames` zeros.
    pub fn silent(channels: u16, frames: usize, sample_rate: u32) -> Self {
        Self::new(vec![vec![0.0; frames]; channels as usize], sample_rate)
    }

    /// Samples of one channel.
    ///
    /// # Panics
    ///
    /// Panics if `channel` is >= `self.num_channels()`.
    #[inline]
    pub fn channel(&self, channel: usize) -> &[f32] {
        assert!(channel < self.channels.len(), "channel index out of bounds");
        &self.channels[channel]
    }

    /// Get the sample rate in Hz.
    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn num_channels(&self) -> u16 {
        self.channels.len() as u16
    }

    /// Number of frames (samples per channel).
    #[inline]
    pub fn frames(&self) -> usize {
        self.channels[0].len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }

    /// Get the duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Sample at `frame` on `channel`, or silence past the end.
    #[inline]
    pub fn sample(&self, channel: usize, frame: usize) -> f32 {
        self.channels[channel].get(frame).copied().unwrap_or(0.0)
    }

    /// Interleave all channels frame by frame.
    pub fn interleaved(&self) -> Vec<f32> {
        let channels = self.channels.len();
        let mut out = Vec::with_capacity(self.frames() * channels);
        for frame in 0..self.frames() {
            for ch in 0..channels {
                out.push(self.channels[ch][frame]);
            }
        }
        out
    }

    /// True when both buffers point at the same sample storage.
    pub fn shares_storage_with(&self, other: &SampleBuffer) -> bool {
        Arc::ptr_eq(&self.channels, &other.channels)
    }

    /// Resample this audio to a target sample rate.
    ///
    /// If the audio is already at the target rate, returns a clone (cheap refcount bump).
    /// Otherwise, performs high-quality sinc interpolation resampling.
    ///
    /// # Errors
    ///
    /// Returns an error if resampling fails (e.g., invalid parameters).
    ///
    /// # Examples
    ///
    /// ```
    /// use echo_transport::SampleBuffer;
    ///
    /// let audio = SampleBuffer::silent(1, 44100, 44100);
    /// let resampled = audio.resample(48000).unwrap();
    /// assert_eq!(resampled.sample_rate(), 48000);
    /// ```
    pub fn resample(&self, target_sample_rate: u32) -> anyhow::Result<Self> {
        if self.sample_rate == target_sample_rate {
            return Ok(self.clone());
        }
        if self.is_empty() {
            return Ok(Self::silent(self.num_channels(), 0, target_sample_rate));
        }

        let input_frames = self.frames();
        let resample_ratio = target_sample_rate as f64 / self.sample_rate as f64;

        let params = SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        };

        let mut resampler = SincFixedIn::<f32>::new(
            resample_ratio,
            2.0,
            params,
            input_frames,
            self.channels.len(),
        )?;

        let output_channels = resampler.process(&self.channels[..], None)?;

        Ok(Self::new(output_channels, target_sample_rate))
    }
}

impl std::fmt::Debug for SampleBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleBuffer")
            .field("frames", &self.frames())
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels.len())
            .field("duration_secs", &self.duration_secs())
            .finish()
    }
}
