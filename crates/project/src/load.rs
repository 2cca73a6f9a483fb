use crate::{CatalogError, Playlist};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

/// Parse playlist bytes: JSON first, MessagePack as a fallback.
pub fn parse_playlist(bytes: &[u8]) -> Result<Playlist, CatalogError> {
    let playlist: Playlist = match serde_json::from_slice(bytes) {
        Ok(playlist) => playlist,
        Err(_) => rmp_serde::decode::from_slice(bytes)?,
    };

    let mut seen = HashSet::new();
    for track in &playlist.tracks {
        if !seen.insert(track.id.as_str()) {
            return Err(CatalogError::DuplicateId(track.id.clone()));
        }
    }

    Ok(playlist)
}

/// Read a playlist file. Relative local locators are resolved against the
/// file's directory.
pub fn load_playlist(path: &Path) -> Result<Playlist, CatalogError> {
    let bytes = std::fs::read(path)?;
    let mut playlist = parse_playlist(&bytes)?;

    let base = path
        .parent()
        .ok_or_else(|| CatalogError::NoParent(path.to_path_buf()))?;
    playlist.resolve_against(base);

    debug!(name = %playlist.name, tracks = playlist.len(), "loaded playlist");
    Ok(playlist)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TrackDescriptor;
    use tempfile::tempdir;

    #[test]
    fn test_load_playlist_file_not_found() {
        let result = load_playlist(Path::new("/nonexistent/list.json"));
        assert!(matches!(result.unwrap_err(), CatalogError::Io(_)));
    }

    #[test]
    fn test_parse_json_with_defaults() {
        let json = br#"{
            "name": "Evening",
            "tracks": [
                { "id": "1", "source_locator": "https://example.com/a" },
                { "id": "2", "source_locator": "b.mp3", "title": "B", "order_index": 3,
                  "duration_seconds": 181.5 }
            ]
        }"#;
        let playlist = parse_playlist(json).unwrap();

        assert_eq!(playlist.name, "Evening");
        assert_eq!(playlist.tracks[0].title, "");
        assert_eq!(playlist.tracks[0].order_index, 0);
        assert_eq!(playlist.tracks[1].duration_seconds, Some(181.5));
    }

    #[test]
    fn test_parse_msgpack_fallback() {
        let mut playlist = Playlist::new("packed");
        playlist.tracks.push(TrackDescriptor::new("x", "x.wav"));
        let bytes = rmp_serde::encode::to_vec_named(&playlist).unwrap();

        assert_eq!(parse_playlist(&bytes).unwrap(), playlist);
    }

    #[test]
    fn test_parse_garbage_fails() {
        let result = parse_playlist(&[0xc1, 0x00, 0xff]);
        assert!(matches!(result.unwrap_err(), CatalogError::Deserialize(_)));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let json = br#"{ "name": "d", "tracks": [
            { "id": "same", "source_locator": "a" },
            { "id": "same", "source_locator": "b" }
        ] }"#;
        assert!(matches!(
            parse_playlist(json).unwrap_err(),
            CatalogError::DuplicateId(id) if id == "same"
        ));
    }

    #[test]
    fn test_load_resolves_relative_locators() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("list.json");
        std::fs::write(
            &path,
            br#"{ "name": "r", "tracks": [ { "id": "1", "source_locator": "song.mp3" } ] }"#,
        )
        .unwrap();

        let playlist = load_playlist(&path).unwrap();
        assert_eq!(
            Path::new(&playlist.tracks[0].source_locator),
            dir.path().join("song.mp3")
        );
    }
}
