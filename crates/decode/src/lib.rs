use std::fs::File;
use std::io::Cursor;
use std::path::Path;

use echo_transport::{MAX_CHANNELS, SampleBuffer};
use symphonia::core::audio::SampleBuffer as PacketBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("failed to read audio: {0}")]
    Io(#[from] std::io::Error),
    #[error("unsupported or malformed audio: {0}")]
    Format(#[from] SymphoniaError),
    #[error("no decodable audio track")]
    NoTrack,
    #[error("audio stream contains no samples")]
    Empty,
}

/// Decode an in-memory encoded file. `extension` is a format hint such as
/// `"mp3"`; the content is probed either way.
pub fn decode_bytes(bytes: Vec<u8>, extension: Option<&str>) -> Result<SampleBuffer, DecodeError> {
    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }
    decode_source(Box::new(Cursor::new(bytes)), hint)
}

pub fn decode_file(path: &Path) -> Result<SampleBuffer, DecodeError> {
    let file = File::open(path)?;
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }
    decode_source(Box::new(file), hint)
}

fn decode_source(source: Box<dyn MediaSource>, hint: Hint) -> Result<SampleBuffer, DecodeError> {
    let mss = MediaSourceStream::new(source, Default::default());

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;

    let mut format = probed.format;

    let track = format.default_track().ok_or(DecodeError::NoTrack)?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(44100);
    let mut channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(2);

    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut samples = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(reason)) => {
                debug!(reason, "skipping corrupt packet");
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        let spec = *decoded.spec();
        sample_rate = spec.rate;
        channels = spec.channels.count();
        let duration = decoded.capacity() as u64;

        let mut packet_buf = PacketBuffer::<f32>::new(duration, spec);
        packet_buf.copy_interleaved_ref(decoded);
        samples.extend_from_slice(packet_buf.samples());
    }

    if samples.is_empty() || channels == 0 {
        return Err(DecodeError::Empty);
    }
    if channels > MAX_CHANNELS {
        warn!(channels, "keeping only the first two channels");
    }

    let planar = deinterleave(&samples, channels);
    let buffer = SampleBuffer::new(planar, sample_rate);
    debug!(
        frames = buffer.frames(),
        sample_rate,
        channels = buffer.num_channels(),
        "decoded audio"
    );
    Ok(buffer)
}

/// Split interleaved samples into at most [`MAX_CHANNELS`] planar channels.
fn deinterleave(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
    let kept = channels.min(MAX_CHANNELS);
    let frames = samples.len() / channels;
    let mut planar = vec![Vec::with_capacity(frames); kept];
    for frame in samples.chunks_exact(channels) {
        for (ch, out) in planar.iter_mut().enumerate() {
            out.push(frame[ch]);
        }
    }
    planar
}
