use std::path::Path;

use echo_transport::SampleBuffer;
use tracing::debug;

use crate::EncodeError;

pub const WAV_HEADER_LEN: usize = 44;

const FORMAT_PCM: u16 = 1;
const FORMAT_IEEE_FLOAT: u16 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WavFormat {
    /// 16-bit integer PCM.
    #[default]
    Pcm16,
    Float32,
}

impl WavFormat {
    fn tag(self) -> u16 {
        match self {
            WavFormat::Pcm16 => FORMAT_PCM,
            WavFormat::Float32 => FORMAT_IEEE_FLOAT,
        }
    }

    fn bytes_per_sample(self) -> u16 {
        match self {
            WavFormat::Pcm16 => 2,
            WavFormat::Float32 => 4,
        }
    }
}

/// Scale a sample to 16 bits: clamp to [-1, 1], then 32768 below zero and
/// 32767 at or above it.
#[inline]
pub fn to_pcm16(sample: f32) -> i16 {
    let s = sample.clamp(-1.0, 1.0);
    let scaled = if s < 0.0 { s * 32768.0 } else { s * 32767.0 };
    scaled.round() as i16
}

/// Size of the data chunk. The RIFF size field (`36 + data`) must fit in
/// 32 bits too.
fn data_len(frames: usize, block_align: u16) -> Result<u32, EncodeError> {
    frames
        .checked_mul(block_align as usize)
        .and_then(|len| u32::try_from(len).ok())
        .filter(|&len| len <= u32::MAX - 36)
        .ok_or(EncodeError::TooLong { frames })
}

/// A complete RIFF/WAVE file: 44-byte header followed by interleaved
/// little-endian samples.
pub fn encode_wav(buffer: &SampleBuffer, format: WavFormat) -> Result<Vec<u8>, EncodeError> {
    let channels = buffer.num_channels();
    let sample_rate = buffer.sample_rate();
    let bytes_per_sample = format.bytes_per_sample();
    let block_align = channels * bytes_per_sample;
    let byte_rate = sample_rate * block_align as u32;
    let data_len = data_len(buffer.frames(), block_align)?;

    let mut out = Vec::with_capacity(WAV_HEADER_LEN + data_len as usize);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&format.tag().to_le_bytes());
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&(bytes_per_sample * 8).to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());

    for frame in 0..buffer.frames() {
        for ch in 0..channels as usize {
            let sample = buffer.channel(ch)[frame];
            match format {
                WavFormat::Pcm16 => out.extend_from_slice(&to_pcm16(sample).to_le_bytes()),
                WavFormat::Float32 => out.extend_from_slice(&sample.to_le_bytes()),
            }
        }
    }

    debug!(bytes = out.len(), ?format, "encoded wav");
    Ok(out)
}

pub fn write_wav(buffer: &SampleBuffer, path: &Path, format: WavFormat) -> Result<(), EncodeError> {
    std::fs::write(path, encode_wav(buffer, format)?)?;
    Ok(())
}
