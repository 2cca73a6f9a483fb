mod load;
mod save;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use load::{load_playlist, parse_playlist};
pub use save::save_playlist;

/// A playable entry. `source_locator` is a file path or a URL, opaque to
/// everything but the media provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackDescriptor {
    pub id: String,
    pub source_locator: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub duration_seconds: Option<f64>,
    #[serde(default)]
    pub order_index: u32,
}

impl TrackDescriptor {
    pub fn new(id: impl Into<String>, source_locator: impl Into<String>) -> Self {
        let source_locator = source_locator.into();
        let title = Path::new(&source_locator)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            id: id.into(),
            source_locator,
            title,
            duration_seconds: None,
            order_index: 0,
        }
    }

    pub fn is_remote(&self) -> bool {
        self.source_locator.starts_with("http://") || self.source_locator.starts_with("https://")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub name: String,
    #[serde(default)]
    pub tracks: Vec<TrackDescriptor>,
}

impl Playlist {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tracks: Vec::new(),
        }
    }

    /// Build a playlist from locators in the given order.
    pub fn from_locators<I, S>(name: impl Into<String>, locators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut playlist = Self::new(name);
        for locator in locators {
            playlist.push(locator);
        }
        playlist
    }

    /// Append a track after the current last one.
    pub fn push(&mut self, locator: impl Into<String>) {
        let order_index = self
            .tracks
            .iter()
            .map(|t| t.order_index + 1)
            .max()
            .unwrap_or(0);
        let mut track = TrackDescriptor::new(format!("track-{order_index}"), locator);
        track.order_index = order_index;
        self.tracks.push(track);
    }

    /// Tracks sorted by `order_index`, ties kept in file order.
    pub fn ordered_tracks(&self) -> Vec<TrackDescriptor> {
        let mut tracks = self.tracks.clone();
        tracks.sort_by_key(|t| t.order_index);
        tracks
    }

    /// Rewrite relative local locators against `base`.
    pub fn resolve_against(&mut self, base: &Path) {
        for track in &mut self.tracks {
            if track.is_remote() {
                continue;
            }
            let path = Path::new(&track.source_locator);
            if path.is_relative() {
                track.source_locator = base.join(path).to_string_lossy().into_owned();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Deserialization error: {0}")]
    Deserialize(#[from] rmp_serde::decode::Error),

    #[error("Duplicate track id '{0}'")]
    DuplicateId(String),

    #[error("Playlist file '{0}' has no parent directory")]
    NoParent(PathBuf),
}
