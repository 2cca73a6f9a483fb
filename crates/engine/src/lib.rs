//! The effect graph: source playback, bass filter, convolution reverb,
//! gain staging and ambience layers, hosted on a cpal output stream or
//! driven offline.

pub mod ambience;
pub mod dsp;
mod graph;
mod handle;
mod output;
pub mod params;
mod reverb;
mod voice;

pub use ambience::{AmbienceKind, AmbienceManager, AmbienceSnapshot, ToggleOutcome};
pub use graph::{GraphCommand, GraphConfig, GraphProcessor, Status};
pub use handle::EffectGraph;
pub use output::{AudioOutput, OutputDevice};
pub use params::{EffectParameters, ParameterPolicy};
pub use reverb::ReverbUnit;
pub use voice::SourceVoice;

#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("no output device found")]
    NoDevice,
    #[error("unsupported sample format '{0}'")]
    UnsupportedSampleFormat(cpal::SampleFormat),
    #[error("failed to query output config: {0}")]
    DeviceConfig(#[from] cpal::DefaultStreamConfigError),
    #[error("failed to build output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),
    #[error("failed to start output stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
