use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Reverb impulse responses are stereo.
pub const IMPULSE_CHANNELS: usize = 2;

const GAIN_CALIBRATION: f64 = 0.00125;
const GAIN_CALIBRATION_SAMPLE_RATE: f64 = 44100.0;
const MIN_POWER: f64 = 0.000125;

/// Envelope gain at time `t` for a tail of `decay` seconds after `pre_delay`.
///
/// Silent until the pre-delay, then an exponential approach toward zero with
/// time constant `ln(decay + 1) / ln(200)`. At 90% of the decay the curve is
/// held and ramped linearly down to zero at `pre_delay + decay`.
pub fn envelope(t: f64, decay: f64, pre_delay: f64) -> f64 {
    if t < pre_delay {
        return 0.0;
    }
    let time_constant = (decay + 1.0).ln() / 200f64.ln();
    let approach = |elapsed: f64| (-elapsed / time_constant).exp();

    let hold_at = decay * 0.9;
    let elapsed = t - pre_delay;
    if elapsed < hold_at {
        approach(elapsed)
    } else if elapsed < decay {
        let held = approach(hold_at);
        let ramp = decay - hold_at;
        held * (1.0 - (elapsed - hold_at) / ramp)
    } else {
        0.0
    }
}

/// Stereo decaying white noise lasting `decay + pre_delay` seconds.
///
/// The result is scaled the way a normalizing convolver scales its response,
/// so perceived loudness stays comparable across decay lengths.
pub fn generate(decay: f64, pre_delay: f64, sample_rate: u32, seed: u64) -> Vec<Vec<f32>> {
    let sr = sample_rate as f64;
    let frames = ((decay + pre_delay) * sr).ceil().max(1.0) as usize;
    let mut rng = StdRng::seed_from_u64(seed);

    let mut channels = vec![Vec::with_capacity(frames); IMPULSE_CHANNELS];
    for frame in 0..frames {
        let gain = envelope(frame as f64 / sr, decay, pre_delay);
        for channel in channels.iter_mut() {
            let noise: f64 = rng.random_range(-1.0..1.0);
            channel.push((noise * gain) as f32);
        }
    }

    let scale = normalization_scale(&channels, sample_rate);
    for channel in channels.iter_mut() {
        for sample in channel.iter_mut() {
            *sample = (*sample as f64 * scale) as f32;
        }
    }
    channels
}

/// Scale factor applied to a response before convolution.
pub fn normalization_scale(channels: &[Vec<f32>], sample_rate: u32) -> f64 {
    let len = channels.first().map_or(0, Vec::len);
    let count = (channels.len() * len) as f64;

    let sum: f64 = channels
        .iter()
        .flat_map(|c| c.iter())
        .map(|&s| (s as f64) * (s as f64))
        .sum();
    let mut power = (sum / count).sqrt();
    if !power.is_finite() || power < MIN_POWER {
        power = MIN_POWER;
    }

    (1.0 / power) * GAIN_CALIBRATION * (GAIN_CALIBRATION_SAMPLE_RATE / sample_rate as f64)
}

/// Number of leading all-zero frames across every channel.
pub fn leading_silence(channels: &[Vec<f32>]) -> usize {
    let len = channels.first().map_or(0, Vec::len);
    (0..len)
        .find(|&i| channels.iter().any(|c| c[i] != 0.0))
        .unwrap_or(len)
}
