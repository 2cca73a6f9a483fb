use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use echo_engine::{AmbienceKind, EffectParameters, ParameterPolicy};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmbienceAssets {
    pub rain: String,
    pub wind: String,
    pub forest: String,
    pub fire: String,
}

impl Default for AmbienceAssets {
    fn default() -> Self {
        Self {
            rain: AmbienceKind::Rain.default_asset().to_string(),
            wind: AmbienceKind::Wind.default_asset().to_string(),
            forest: AmbienceKind::Forest.default_asset().to_string(),
            fire: AmbienceKind::Fire.default_asset().to_string(),
        }
    }
}

impl AmbienceAssets {
    pub fn locator(&self, kind: AmbienceKind) -> &str {
        match kind {
            AmbienceKind::Rain => &self.rain,
            AmbienceKind::Wind => &self.wind,
            AmbienceKind::Forest => &self.forest,
            AmbienceKind::Fire => &self.fire,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Parameters a new session starts with.
    pub effects: EffectParameters,
    pub parameter_policy: ParameterPolicy,
    pub tick_interval_ms: u64,
    pub mp3_bitrate_kbps: u32,
    /// Appended to exported file names.
    pub download_suffix: String,
    /// Stream endpoint for remote locators; plain GET when unset.
    pub media_endpoint: Option<String>,
    pub ambience: AmbienceAssets,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            effects: EffectParameters::default(),
            parameter_policy: ParameterPolicy::default(),
            tick_interval_ms: 100,
            mp3_bitrate_kbps: echo_encode::mp3::DEFAULT_BITRATE_KBPS,
            download_suffix: "EchoStudio".to_string(),
            media_endpoint: None,
            ambience: AmbienceAssets::default(),
        }
    }
}

impl EditorConfig {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("echo-studio").join("config.toml"))
    }

    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        Self::load_from(&path)
    }

    /// Missing or unreadable files yield the defaults.
    pub fn load_from(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                warn!(path = %path.display(), "invalid config, using defaults: {e}");
                Self::default()
            }),
            Err(_) => {
                debug!(path = %path.display(), "no config file, using defaults");
                Self::default()
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(path, contents)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    /// Session start parameters with the policy applied.
    pub fn initial_parameters(&self) -> EffectParameters {
        self.effects.sanitized(self.parameter_policy)
    }
}
