use std::time::Instant;

use basedrop::{Collector, Owned, Shared};
use echo_engine::{
    AmbienceSnapshot, EffectParameters, GraphCommand, GraphConfig, GraphProcessor, ReverbUnit,
};
use echo_transport::SampleBuffer;
use tracing::{info, warn};

/// Frames processed per graph call, matching a typical device callback.
pub const RENDER_BLOCK_FRAMES: usize = 128;

/// Fixed impulse-response seed so identical jobs render identically.
pub const RENDER_SEED: u64 = 0x0ec0_57d1;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("no source loaded")]
    NoSource,
    #[error("invalid playback rate {0}")]
    InvalidRate(f64),
    #[error("failed to resample ambience layer: {0}")]
    Resample(String),
    #[error("render task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Everything needed to bounce the current session to one buffer.
#[derive(Debug, Clone)]
pub struct RenderJob {
    pub source: Option<SampleBuffer>,
    pub params: EffectParameters,
    pub ambience: Vec<AmbienceSnapshot>,
    pub seed: u64,
    /// Render without the bass stage at all.
    pub bypass_bass: bool,
}

impl RenderJob {
    pub fn new(
        source: Option<SampleBuffer>,
        params: EffectParameters,
        ambience: Vec<AmbienceSnapshot>,
    ) -> Self {
        Self {
            source,
            params,
            ambience,
            seed: RENDER_SEED,
            bypass_bass: false,
        }
    }

    /// Output length in frames: `duration / rate` at the source rate.
    pub fn output_frames(&self) -> Option<usize> {
        let source = self.source.as_ref()?;
        let seconds = source.duration_secs() / self.params.playback_rate;
        Some((seconds * source.sample_rate() as f64).ceil() as usize)
    }
}

/// Run the graph faster than real time over the whole job.
///
/// The output has the source's channel count and sample rate; ambience
/// layers are resampled to match. All sources start at 0.
pub fn render_offline(job: &RenderJob) -> Result<SampleBuffer, RenderError> {
    let Some(source) = job.source.as_ref() else {
        warn!("render requested with no source");
        return Err(RenderError::NoSource);
    };
    let rate = job.params.playback_rate;
    if !rate.is_finite() || rate <= 0.0 {
        return Err(RenderError::InvalidRate(rate));
    }

    let sample_rate = source.sample_rate();
    let channels = source.num_channels();
    let frames = job.output_frames().unwrap_or(0);
    let started = Instant::now();
    info!(
        frames,
        sample_rate,
        channels,
        rate,
        layers = job.ambience.len(),
        "rendering"
    );

    let mut collector = Collector::new();
    let handle = collector.handle();

    let config = GraphConfig::new(sample_rate, channels);
    let mut processor = GraphProcessor::new(config, &job.params);
    if job.bypass_bass {
        processor = processor.without_bass();
    }

    let reverb = ReverbUnit::generate(
        job.params.reverb_decay,
        job.params.reverb_pre_delay,
        sample_rate,
        channels as usize,
        job.seed,
    );
    processor.apply(GraphCommand::SpliceReverb(Owned::new(&handle, reverb)));

    for layer in &job.ambience {
        let buffer = layer
            .buffer
            .resample(sample_rate)
            .map_err(|e| RenderError::Resample(e.to_string()))?;
        let index = layer.kind.index();
        processor.apply(GraphCommand::SetLayerBuffer {
            layer: index,
            buffer: Shared::new(&handle, buffer),
        });
        processor.set_layer_gain_immediate(index, layer.gain);
        processor.apply(GraphCommand::StartLayer(index));
    }

    processor.apply(GraphCommand::AttachSource {
        buffer: Shared::new(&handle, source.clone()),
        start_offset: 0.0,
    });

    let width = channels as usize;
    let mut output = vec![0.0f32; frames * width];
    for block in output.chunks_mut(RENDER_BLOCK_FRAMES * width) {
        processor.process(block);
    }

    drop(processor);
    collector.collect();

    info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        "render finished"
    );
    Ok(SampleBuffer::from_interleaved(&output, sample_rate, channels))
}

/// [`render_offline`] on the blocking pool.
pub async fn render(job: RenderJob) -> Result<SampleBuffer, RenderError> {
    tokio::task::spawn_blocking(move || render_offline(&job)).await?
}
