use crate::{CatalogError, Playlist};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

pub fn save_playlist(path: &Path, playlist: &Playlist) -> Result<(), CatalogError> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, playlist)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load_playlist;
    use tempfile::tempdir;

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("set.json");
        let playlist = Playlist::from_locators("set", ["https://a/1", "https://a/2"]);

        save_playlist(&path, &playlist).unwrap();
        let loaded = load_playlist(&path).unwrap();

        assert_eq!(loaded, playlist);
    }

    #[test]
    fn test_saved_file_is_pretty_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("set.json");
        save_playlist(&path, &Playlist::new("empty")).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n  \"name\": \"empty\""));
    }

    #[test]
    fn test_save_into_missing_directory_fails() {
        let result = save_playlist(
            Path::new("/nonexistent/dir/set.json"),
            &Playlist::new("x"),
        );
        assert!(matches!(result.unwrap_err(), CatalogError::Io(_)));
    }
}
