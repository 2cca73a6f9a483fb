use cpal::{
    FromSample, SizedSample,
    traits::{DeviceTrait, HostTrait, StreamTrait},
};
use tracing::{error, info};

use crate::GraphError;
use crate::graph::{GraphConfig, GraphProcessor};

/// The default output device and its preferred stream configuration.
pub struct OutputDevice {
    device: cpal::Device,
    config: cpal::SupportedStreamConfig,
}

impl OutputDevice {
    pub fn open_default() -> Result<Self, GraphError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(GraphError::NoDevice)?;
        let config = device.default_output_config()?;
        Ok(Self { device, config })
    }

    /// The graph shape to build for this device (at most stereo).
    pub fn graph_config(&self) -> GraphConfig {
        GraphConfig::new(self.config.sample_rate().0, self.config.channels())
    }

    /// Hand the processor to the audio callback and start the stream.
    pub fn start(self, processor: GraphProcessor) -> Result<AudioOutput, GraphError> {
        let stream = match self.config.sample_format() {
            cpal::SampleFormat::F32 => build_stream::<f32>(&self.device, &self.config.into(), processor)?,
            cpal::SampleFormat::I16 => build_stream::<i16>(&self.device, &self.config.into(), processor)?,
            sample_format => return Err(GraphError::UnsupportedSampleFormat(sample_format)),
        };

        stream.play()?;
        info!("audio output started");

        Ok(AudioOutput { _stream: stream })
    }
}

/// Keeps the output stream alive.
pub struct AudioOutput {
    _stream: cpal::Stream,
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut processor: GraphProcessor,
) -> Result<cpal::Stream, GraphError>
where
    T: SizedSample + FromSample<f32>,
{
    let device_channels = config.channels as usize;
    let graph_channels = processor.config().channels as usize;
    // sized for a generous callback; grows only if the host asks for more
    let mut scratch = vec![0.0f32; 8192 * graph_channels];

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            let frames = data.len() / device_channels;
            let needed = frames * graph_channels;
            if scratch.len() < needed {
                scratch.resize(needed, 0.0);
            }
            let mixed = &mut scratch[..needed];
            processor.process(mixed);

            for (frame, source) in data
                .chunks_mut(device_channels)
                .zip(mixed.chunks(graph_channels))
            {
                for (ch, sample) in frame.iter_mut().enumerate() {
                    let value = source.get(ch).copied().unwrap_or(0.0);
                    *sample = T::from_sample(value);
                }
            }
        },
        |err| error!("stream error: {err}"),
        None,
    )?;

    Ok(stream)
}
