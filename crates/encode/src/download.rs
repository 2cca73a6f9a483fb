use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Wav,
    Mp3,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Wav => "wav",
            ExportFormat::Mp3 => "mp3",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ExportFormat::Wav => "audio/wav",
            ExportFormat::Mp3 => "audio/mp3",
        }
    }
}

/// An encoded file, ready to hand to whoever saves it.
#[derive(Debug, Clone)]
pub struct Download {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime_type: &'static str,
}

impl Download {
    pub fn new(bytes: Vec<u8>, original_name: &str, suffix: &str, format: ExportFormat) -> Self {
        Self {
            bytes,
            file_name: download_file_name(original_name, suffix, format.extension()),
            mime_type: format.mime_type(),
        }
    }
}

/// `"{stem}-{suffix}.{extension}"`, where the stem drops a trailing
/// `.ext` from the last path segment only.
pub fn download_file_name(original: &str, suffix: &str, extension: &str) -> String {
    let stem = match original.rfind('.') {
        Some(dot) => {
            let ext = &original[dot + 1..];
            if !ext.is_empty() && !ext.contains('/') {
                &original[..dot]
            } else {
                original
            }
        }
        None => original,
    };
    format!("{stem}-{suffix}.{extension}")
}
