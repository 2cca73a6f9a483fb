//! Where track and ambience bytes come from.

use std::future::Future;
use std::io::Read;

use serde::Deserialize;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("failed to read '{locator}': {source}")]
    Io {
        locator: String,
        source: std::io::Error,
    },

    /// Non-2xx reply; `message` is the server's `error` field when present.
    #[error("{message} (HTTP {status})")]
    Status { status: u16, message: String },

    #[error("request failed: {0}")]
    Transport(String),

    #[error("no audio URL provided")]
    MissingAudioUrl,

    #[error("fetch task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Resolves a source locator to the raw bytes of an audio file.
pub trait MediaProvider: Send + Sync + 'static {
    fn fetch(&self, locator: &str) -> impl Future<Output = Result<Vec<u8>, FetchError>> + Send;
}

pub fn is_remote(locator: &str) -> bool {
    locator.starts_with("http://") || locator.starts_with("https://")
}

/// Local files.
#[derive(Debug, Clone, Default)]
pub struct FileProvider;

impl MediaProvider for FileProvider {
    async fn fetch(&self, locator: &str) -> Result<Vec<u8>, FetchError> {
        tokio::fs::read(locator).await.map_err(|source| FetchError::Io {
            locator: locator.to_string(),
            source,
        })
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamBody {
    audio_url: Option<String>,
}

/// Posts `{ "url": locator }` to a stream endpoint.
///
/// The reply is either the audio itself or JSON naming an `audioUrl` to
/// fetch instead. Error replies carry a JSON `error` message.
#[derive(Debug, Clone)]
pub struct HttpProvider {
    endpoint: String,
}

impl HttpProvider {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn fetch_blocking(endpoint: &str, locator: &str) -> Result<Vec<u8>, FetchError> {
        let response = ureq::post(endpoint)
            .send_json(serde_json::json!({ "url": locator }))
            .map_err(|e| status_error(e, "Failed to fetch audio stream"))?;

        if response.content_type() == "application/json" {
            let body: StreamBody = response
                .into_json()
                .map_err(|e| FetchError::Transport(e.to_string()))?;
            let url = body.audio_url.ok_or(FetchError::MissingAudioUrl)?;
            debug!(%url, "following fallback audio url");
            return get_bytes(&url);
        }

        read_body(response)
    }
}

impl MediaProvider for HttpProvider {
    async fn fetch(&self, locator: &str) -> Result<Vec<u8>, FetchError> {
        let endpoint = self.endpoint.clone();
        let locator = locator.to_string();
        tokio::task::spawn_blocking(move || Self::fetch_blocking(&endpoint, &locator)).await?
    }
}

/// Plain GET of a URL.
pub fn get_bytes(url: &str) -> Result<Vec<u8>, FetchError> {
    let response = ureq::get(url)
        .call()
        .map_err(|e| status_error(e, "Failed to fetch audio from fallback URL"))?;
    read_body(response)
}

fn read_body(response: ureq::Response) -> Result<Vec<u8>, FetchError> {
    let mut bytes = Vec::new();
    response
        .into_reader()
        .read_to_end(&mut bytes)
        .map_err(|e| FetchError::Transport(e.to_string()))?;
    Ok(bytes)
}

fn status_error(error: ureq::Error, fallback: &str) -> FetchError {
    match error {
        ureq::Error::Status(status, response) => {
            let message = response
                .into_json::<ErrorBody>()
                .ok()
                .and_then(|body| body.error)
                .unwrap_or_else(|| fallback.to_string());
            FetchError::Status { status, message }
        }
        ureq::Error::Transport(transport) => FetchError::Transport(transport.to_string()),
    }
}

/// Local paths from disk; remote locators through the stream endpoint if
/// one is configured, else a direct GET.
#[derive(Debug, Clone, Default)]
pub struct DefaultProvider {
    files: FileProvider,
    http: Option<HttpProvider>,
}

impl DefaultProvider {
    pub fn new(endpoint: Option<String>) -> Self {
        Self {
            files: FileProvider,
            http: endpoint.map(HttpProvider::new),
        }
    }
}

impl MediaProvider for DefaultProvider {
    async fn fetch(&self, locator: &str) -> Result<Vec<u8>, FetchError> {
        if !is_remote(locator) {
            return self.files.fetch(locator).await;
        }
        let result = match &self.http {
            Some(http) => http.fetch(locator).await,
            None => {
                let url = locator.to_string();
                tokio::task::spawn_blocking(move || get_bytes(&url)).await?
            }
        };
        if let Err(e) = &result {
            warn!(locator, "fetch failed: {e}");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_remote_locators() {
        assert!(is_remote("https://example.com/a.mp3"));
        assert!(is_remote("http://localhost/x"));
        assert!(!is_remote("/music/a.mp3"));
        assert!(!is_remote("audio/rain.mp3"));
    }

    #[tokio::test]
    async fn file_provider_reads_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.bin");
        std::fs::write(&path, [1u8, 2, 3]).unwrap();

        let bytes = FileProvider.fetch(path.to_str().unwrap()).await.unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let err = DefaultProvider::new(None)
            .fetch("/nonexistent/song.mp3")
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Io { locator, .. } if locator == "/nonexistent/song.mp3"));
    }

    #[test]
    fn status_message_formats() {
        let err = FetchError::Status {
            status: 400,
            message: "YouTube URL is required".into(),
        };
        assert_eq!(err.to_string(), "YouTube URL is required (HTTP 400)");
    }

    #[test]
    fn parses_stream_bodies() {
        let body: StreamBody =
            serde_json::from_str(r#"{ "audioUrl": "https://cdn/x.mp3", "fallback": true }"#).unwrap();
        assert_eq!(body.audio_url.as_deref(), Some("https://cdn/x.mp3"));

        let body: ErrorBody = serde_json::from_str(r#"{ "other": 1 }"#).unwrap();
        assert!(body.error.is_none());
    }
}
