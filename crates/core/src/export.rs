use echo_encode::{Download, ExportFormat, WavFormat, encode_mp3, encode_wav};
use echo_render::RenderJob;
use tracing::info;

use crate::config::EditorConfig;
use crate::error::SessionError;

/// Render `job` and encode the result as a named download.
pub async fn export(
    job: RenderJob,
    format: ExportFormat,
    original_name: &str,
    config: &EditorConfig,
) -> Result<Download, SessionError> {
    let rendered = echo_render::render(job).await?;
    let kbps = config.mp3_bitrate_kbps;

    let bytes = tokio::task::spawn_blocking(move || match format {
        ExportFormat::Wav => encode_wav(&rendered, WavFormat::Pcm16),
        ExportFormat::Mp3 => encode_mp3(&rendered, kbps),
    })
    .await??;

    let download = Download::new(bytes, original_name, &config.download_suffix, format);
    info!(
        file = %download.file_name,
        bytes = download.bytes.len(),
        "export ready"
    );
    Ok(download)
}
