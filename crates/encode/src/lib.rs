//! Encoders for rendered audio and the download it is delivered as.

mod download;
pub mod mp3;
pub mod wav;

pub use download::{Download, ExportFormat, download_file_name};
pub use mp3::{FrameEncoder, LameEncoder, encode_frames, encode_mp3};
pub use wav::{WavFormat, encode_wav, write_wav};

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("failed to write file: {0}")]
    Io(#[from] std::io::Error),
    #[error("unsupported MP3 bitrate {0} kbps")]
    UnsupportedBitrate(u32),
    #[error("MP3 encoder error: {0}")]
    Mp3(String),
    #[error("{frames} frames do not fit in a WAV file")]
    TooLong { frames: usize },
}
