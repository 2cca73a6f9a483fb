use echo_transport::SampleBuffer;
use mp3lame_encoder::{
    Bitrate, Builder, DualPcm, FlushNoGap, MonoPcm, Quality, max_required_buffer_size,
};
use tracing::debug;

use crate::EncodeError;

/// Samples per MP3 granule.
pub const GRANULE_SAMPLES: usize = 576;
/// Samples per chunk handed to the encoder (two granules).
pub const MP3_FRAME_SAMPLES: usize = 2 * GRANULE_SAMPLES;
pub const DEFAULT_BITRATE_KBPS: u32 = 192;
/// Upper bound on what a LAME flush can emit.
const FLUSH_BUFFER_BYTES: usize = 7200;

/// A constant-bitrate frame encoder.
pub trait FrameEncoder {
    /// Encode up to [`MP3_FRAME_SAMPLES`] samples per channel, appending any
    /// produced bytes to `out`.
    fn encode_frame(
        &mut self,
        left: &[i16],
        right: Option<&[i16]>,
        out: &mut Vec<u8>,
    ) -> Result<(), EncodeError>;

    /// Emit whatever the encoder still buffers.
    fn flush(&mut self, out: &mut Vec<u8>) -> Result<(), EncodeError>;
}

/// Scale a float sample to the 16-bit range, saturating.
#[inline]
pub fn to_i16(sample: f32) -> i16 {
    (sample * 32767.0).clamp(-32768.0, 32767.0) as i16
}

/// Feed `buffer` to `encoder` one frame at a time, then flush.
pub fn encode_frames<E: FrameEncoder>(
    encoder: &mut E,
    buffer: &SampleBuffer,
) -> Result<Vec<u8>, EncodeError> {
    let stereo = buffer.num_channels() > 1;
    let mut out = Vec::new();
    let mut left = Vec::with_capacity(MP3_FRAME_SAMPLES);
    let mut right = Vec::with_capacity(MP3_FRAME_SAMPLES);

    for start in (0..buffer.frames()).step_by(MP3_FRAME_SAMPLES) {
        let end = (start + MP3_FRAME_SAMPLES).min(buffer.frames());

        left.clear();
        left.extend(buffer.channel(0)[start..end].iter().copied().map(to_i16));
        if stereo {
            right.clear();
            right.extend(buffer.channel(1)[start..end].iter().copied().map(to_i16));
        }

        encoder.encode_frame(&left, stereo.then_some(right.as_slice()), &mut out)?;
    }

    encoder.flush(&mut out)?;
    Ok(out)
}

fn bitrate(kbps: u32) -> Result<Bitrate, EncodeError> {
    Ok(match kbps {
        96 => Bitrate::Kbps96,
        112 => Bitrate::Kbps112,
        128 => Bitrate::Kbps128,
        160 => Bitrate::Kbps160,
        192 => Bitrate::Kbps192,
        224 => Bitrate::Kbps224,
        256 => Bitrate::Kbps256,
        320 => Bitrate::Kbps320,
        other => return Err(EncodeError::UnsupportedBitrate(other)),
    })
}

/// LAME-backed [`FrameEncoder`].
pub struct LameEncoder {
    inner: mp3lame_encoder::Encoder,
}

impl LameEncoder {
    pub fn new(channels: u16, sample_rate: u32, kbps: u32) -> Result<Self, EncodeError> {
        let brate = bitrate(kbps)?;
        let mut builder =
            Builder::new().ok_or_else(|| EncodeError::Mp3("failed to allocate LAME".into()))?;
        builder
            .set_num_channels(channels.min(2) as u8)
            .map_err(|e| EncodeError::Mp3(format!("channels: {e:?}")))?;
        builder
            .set_sample_rate(sample_rate)
            .map_err(|e| EncodeError::Mp3(format!("sample rate {sample_rate}: {e:?}")))?;
        builder
            .set_brate(brate)
            .map_err(|e| EncodeError::Mp3(format!("bitrate: {e:?}")))?;
        builder
            .set_quality(Quality::Good)
            .map_err(|e| EncodeError::Mp3(format!("quality: {e:?}")))?;
        let inner = builder
            .build()
            .map_err(|e| EncodeError::Mp3(format!("init: {e:?}")))?;
        Ok(Self { inner })
    }
}

impl FrameEncoder for LameEncoder {
    fn encode_frame(
        &mut self,
        left: &[i16],
        right: Option<&[i16]>,
        out: &mut Vec<u8>,
    ) -> Result<(), EncodeError> {
        // LAME only writes into spare capacity
        out.reserve(max_required_buffer_size(left.len()));
        let result = match right {
            Some(right) => self.inner.encode_to_vec(DualPcm { left, right }, out),
            None => self.inner.encode_to_vec(MonoPcm(left), out),
        };
        result
            .map(|_| ())
            .map_err(|e| EncodeError::Mp3(format!("encode: {e:?}")))
    }

    fn flush(&mut self, out: &mut Vec<u8>) -> Result<(), EncodeError> {
        out.reserve(FLUSH_BUFFER_BYTES);
        self.inner
            .flush_to_vec::<FlushNoGap>(out)
            .map(|_| ())
            .map_err(|e| EncodeError::Mp3(format!("flush: {e:?}")))
    }
}

/// Encode `buffer` as constant-bitrate MP3.
pub fn encode_mp3(buffer: &SampleBuffer, kbps: u32) -> Result<Vec<u8>, EncodeError> {
    let mut encoder = LameEncoder::new(buffer.num_channels(), buffer.sample_rate(), kbps)?;
    let bytes = encode_frames(&mut encoder, buffer)?;
    debug!(bytes = bytes.len(), kbps, "encoded mp3");
    Ok(bytes)
}
