use tracing::debug;

use crate::GraphError;
use crate::dsp::convolver::{Convolver, block_size_for};
use crate::dsp::impulse;

/// A convolution reverb with its impulse response already generated.
pub struct ReverbUnit {
    decay: f64,
    pre_delay: f64,
    convolver: Convolver,
}

impl ReverbUnit {
    /// Generate the impulse response and prepare the convolver. CPU-bound;
    /// see [`ReverbUnit::generate_async`] for the control-plane entry point.
    pub fn generate(decay: f64, pre_delay: f64, sample_rate: u32, channels: usize, seed: u64) -> Self {
        let response = impulse::generate(decay, pre_delay, sample_rate, seed);
        let frames = response.first().map_or(0, Vec::len);
        let block = block_size_for(frames, sample_rate);
        let convolver = Convolver::new(&response, channels, block);
        debug!(
            decay,
            frames,
            block,
            latency = convolver.latency(),
            "impulse response generated"
        );
        Self {
            decay,
            pre_delay,
            convolver,
        }
    }

    /// Generate on the blocking pool.
    pub async fn generate_async(
        decay: f64,
        pre_delay: f64,
        sample_rate: u32,
        channels: usize,
        seed: u64,
    ) -> Result<Self, GraphError> {
        let unit = tokio::task::spawn_blocking(move || {
            Self::generate(decay, pre_delay, sample_rate, channels, seed)
        })
        .await?;
        Ok(unit)
    }

    #[inline]
    pub fn process_frame(&mut self, input: &[f32], output: &mut [f32]) {
        self.convolver.process_frame(input, output);
    }

    pub fn decay(&self) -> f64 {
        self.decay
    }

    pub fn pre_delay(&self) -> f64 {
        self.pre_delay
    }

    pub fn latency(&self) -> usize {
        self.convolver.latency()
    }
}
