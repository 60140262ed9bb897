//! Airline adapter catalogue loading.
//!
//! The catalogue is a JSON array of [`HttpAirlineSettings`] entries:
//!
//! ```json
//! [{ "airlineCode": "LH", "name": "Lufthansa", "priority": 1,
//!    "baseUrl": "https://api.example.com/lh", "apiKey": "...", "timeoutMs": 5000 }]
//! ```

use std::path::{Path, PathBuf};

use cap_std::{ambient_authority, fs::Dir};
use thiserror::Error;

use flight_sync::outbound::airline::HttpAirlineSettings;

/// Errors raised while reading the catalogue.
#[derive(Debug, Error)]
pub enum CatalogueError {
    /// The file could not be read.
    #[error("failed to read adapter catalogue at {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The file is not a catalogue.
    #[error("invalid adapter catalogue at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Read the adapter catalogue at `path`.
///
/// # Errors
///
/// Returns [`CatalogueError::Read`] when the file cannot be opened and
/// [`CatalogueError::Parse`] when it is not a JSON array of entries.
pub fn load_catalogue(path: &Path) -> Result<Vec<HttpAirlineSettings>, CatalogueError> {
    let read_error = |source| CatalogueError::Read {
        path: path.to_path_buf(),
        source,
    };
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let file_name = path.file_name().ok_or_else(|| {
        read_error(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "catalogue path must be a file",
        ))
    })?;

    let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(read_error)?;
    let payload = dir.read(Path::new(file_name)).map_err(read_error)?;
    serde_json::from_slice(&payload).map_err(|source| CatalogueError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    fn write(dir: &TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("adapters.json");
        let root = Dir::open_ambient_dir(dir.path(), ambient_authority()).expect("open temp dir");
        root.write("adapters.json", contents).expect("write catalogue");
        path
    }

    #[rstest]
    fn entries_pick_up_defaults() {
        let dir = TempDir::new().expect("temp dir");
        let path = write(
            &dir,
            r#"[{ "airlineCode": "LH", "name": "Lufthansa", "baseUrl": "https://lh.example", "apiKey": "k" }]"#,
        );

        let catalogue = load_catalogue(&path).expect("catalogue loads");

        assert_eq!(catalogue.len(), 1);
        assert_eq!(catalogue[0].airline_code, "LH");
        assert_eq!(catalogue[0].priority, 10);
        assert_eq!(catalogue[0].timeout_ms, 5_000);
    }

    #[rstest]
    fn missing_file_is_a_read_error() {
        let dir = TempDir::new().expect("temp dir");

        let error = load_catalogue(&dir.path().join("absent.json")).expect_err("missing file");

        assert!(matches!(error, CatalogueError::Read { .. }));
    }

    #[rstest]
    fn malformed_catalogue_is_a_parse_error() {
        let dir = TempDir::new().expect("temp dir");
        let path = write(&dir, r#"{ "airlineCode": "LH" }"#);

        let error = load_catalogue(&path).expect_err("not an array");

        assert!(matches!(error, CatalogueError::Parse { .. }));
    }
}
