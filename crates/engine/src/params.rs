use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Center frequency of the bass boost.
pub const BASS_FREQUENCY_HZ: f64 = 80.0;
pub const BASS_Q: f64 = 3.0;
/// Silence before the reverb tail begins.
pub const REVERB_PRE_DELAY_SECS: f64 = 0.01;

pub const VOLUME_RANGE: RangeInclusive<f64> = 0.0..=150.0;
pub const PLAYBACK_RATE_RANGE: RangeInclusive<f64> = 0.5..=1.5;
pub const REVERB_DECAY_RANGE: RangeInclusive<f64> = 0.01..=10.0;
pub const BASS_BOOST_RANGE: RangeInclusive<f64> = -24.0..=24.0;
pub const AMBIENCE_VOLUME_RANGE: RangeInclusive<f64> = 0.0..=100.0;
pub const MIX_LEVEL_RANGE: RangeInclusive<f64> = 0.0..=1.0;

/// User-facing effect settings, snapshotted for offline renders.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EffectParameters {
    /// Master volume in percent, 100 = unity.
    pub volume: f64,
    pub playback_rate: f64,
    /// Reverb tail length in seconds.
    pub reverb_decay: f64,
    /// Peaking gain in dB at [`BASS_FREQUENCY_HZ`].
    pub bass_boost: f64,
    pub reverb_pre_delay: f64,
    pub dry_level: f64,
    pub wet_level: f64,
}

impl Default for EffectParameters {
    fn default() -> Self {
        Self {
            volume: 100.0,
            playback_rate: 1.25,
            reverb_decay: 0.01,
            bass_boost: 0.0,
            reverb_pre_delay: REVERB_PRE_DELAY_SECS,
            dry_level: 1.0,
            wet_level: 1.0,
        }
    }
}

impl EffectParameters {
    #[inline]
    pub fn master_gain(&self) -> f32 {
        (self.volume / 100.0) as f32
    }

    /// Apply `policy` to every user-controlled field.
    pub fn sanitized(self, policy: ParameterPolicy) -> Self {
        Self {
            volume: policy.apply("volume", self.volume, VOLUME_RANGE),
            playback_rate: policy.apply("playback_rate", self.playback_rate, PLAYBACK_RATE_RANGE),
            reverb_decay: policy.apply("reverb_decay", self.reverb_decay, REVERB_DECAY_RANGE),
            bass_boost: policy.apply("bass_boost", self.bass_boost, BASS_BOOST_RANGE),
            dry_level: policy.apply("dry_level", self.dry_level, MIX_LEVEL_RANGE),
            wet_level: policy.apply("wet_level", self.wet_level, MIX_LEVEL_RANGE),
            ..self
        }
    }
}

/// What to do with a parameter outside its documented range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterPolicy {
    #[default]
    Clamp,
    PassThrough,
}

impl ParameterPolicy {
    pub fn apply(self, name: &'static str, value: f64, range: RangeInclusive<f64>) -> f64 {
        if range.contains(&value) {
            return value;
        }
        match self {
            ParameterPolicy::PassThrough if value.is_finite() => value,
            _ => {
                let clamped = if value.is_nan() {
                    *range.start()
                } else {
                    value.clamp(*range.start(), *range.end())
                };
                warn!(parameter = name, value, clamped, "parameter out of range");
                clamped
            }
        }
    }
}
