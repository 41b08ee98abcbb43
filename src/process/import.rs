//! Reads streaming-history files out of an export directory or the export zip.

use super::aggregate::{aggregate, MalformedEventError};
use crate::foundation::store::{PlayEvent, StatisticsDocument};
use rayon::prelude::*;
use serde_json::Value;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

/// Only files whose name starts with this are streaming-history logs.
pub const HISTORY_FILE_PREFIX: &str = "StreamingHistory";

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("could not read zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("no {HISTORY_FILE_PREFIX}*.json files found in {0}")]
    NoHistoryFiles(String),

    #[error("{file}: {source}")]
    Malformed {
        file: String,
        #[source]
        source: MalformedEventError,
    },
}

/// Loads every streaming-history file found at `path` and aggregates them.
///
/// `path` may be the extracted export directory or the `.zip` file as
/// downloaded.
pub fn import_export(path: &Path) -> Result<StatisticsDocument, ImportError> {
    let events = read_export(path)?;
    info!(events = events.len(), "Read streaming history");
    Ok(aggregate(events))
}

/// Decodes all play events at `path`, ordered by history file name.
pub fn read_export(path: &Path) -> Result<Vec<PlayEvent>, ImportError> {
    let files = if path.is_dir() {
        read_history_dir(path)?
    } else {
        read_history_zip(path)?
    };

    if files.is_empty() {
        return Err(ImportError::NoHistoryFiles(path.display().to_string()));
    }

    let decoded: Vec<Vec<PlayEvent>> = files
        .par_iter()
        .map(|(name, contents)| decode_history_file(name, contents))
        .collect::<Result<_, _>>()?;

    Ok(decoded.into_iter().flatten().collect())
}

fn is_history_file(file_name: &str) -> bool {
    file_name.starts_with(HISTORY_FILE_PREFIX) && file_name.to_lowercase().ends_with(".json")
}

/// Collects `(file name, contents)` for every history file below `root`,
/// sorted by file name.
fn read_history_dir(root: &Path) -> Result<Vec<(String, Vec<u8>)>, ImportError> {
    let mut files = WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let name = entry.file_name().to_str()?.to_string();
            is_history_file(&name).then(|| (name, entry.into_path()))
        })
        .map(|(name, path)| Ok((name, fs::read(path)?)))
        .collect::<Result<Vec<_>, io::Error>>()?;

    files.sort_by(|a, b| a.0.cmp(&b.0));
    debug!(count = files.len(), root = %root.display(), "Found history files");
    Ok(files)
}

/// Same as [`read_history_dir`], reading entries straight out of the archive.
fn read_history_zip(archive_path: &Path) -> Result<Vec<(String, Vec<u8>)>, ImportError> {
    let mut archive = zip::ZipArchive::new(File::open(archive_path)?)?;
    let mut files = Vec::new();

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if !entry.is_file() {
            continue;
        }
        let Some(name) = entry
            .name()
            .rsplit('/')
            .next()
            .filter(|name| is_history_file(name))
            .map(str::to_string)
        else {
            continue;
        };

        let mut contents = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut contents)?;
        files.push((name, contents));
    }

    files.sort_by(|a, b| a.0.cmp(&b.0));
    debug!(count = files.len(), archive = %archive_path.display(), "Found history files in archive");
    Ok(files)
}

fn decode_history_file(name: &str, contents: &[u8]) -> Result<Vec<PlayEvent>, ImportError> {
    let malformed = |source| ImportError::Malformed {
        file: name.to_string(),
        source,
    };

    let records: Vec<Value> = serde_json::from_slice(contents).map_err(|e| {
        malformed(MalformedEventError {
            position: 0,
            reason: format!("not a JSON array of play events: {e}"),
        })
    })?;

    records
        .iter()
        .enumerate()
        .map(|(position, record)| PlayEvent::from_record(record, position).map_err(malformed))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    const HISTORY_0: &str = r#"[
        {"endTime": "2021-01-01 10:00", "artistName": "A", "trackName": "T1", "msPlayed": 40000},
        {"endTime": "2021-01-01 10:05", "artistName": "B", "trackName": "T3", "msPlayed": "35000"}
    ]"#;
    const HISTORY_1: &str = r#"[
        {"endTime": "2021-02-01 10:00", "artistName": "A", "trackName": "T1", "msPlayed": 40000},
        {"endTime": "2021-02-01 10:05", "artistName": "A", "trackName": "T2", "msPlayed": 5000}
    ]"#;

    fn create_export_dir() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        let data_dir = temp_dir.path().join("MyData");
        fs::create_dir(&data_dir).unwrap();
        fs::write(data_dir.join("StreamingHistory1.json"), HISTORY_1).unwrap();
        fs::write(data_dir.join("StreamingHistory0.json"), HISTORY_0).unwrap();
        fs::write(data_dir.join("Playlist1.json"), "{\"not\": \"history\"}").unwrap();
        temp_dir
    }

    #[test]
    fn test_import_from_directory() {
        let temp_dir = create_export_dir();
        let doc = import_export(temp_dir.path()).unwrap();

        let a = doc.artist("A").unwrap();
        assert_eq!(a.total_listening_ms, 80_000);
        assert_eq!(a.tracks.get("T1").unwrap().listens, 2);
        assert!(a.tracks.get("T2").is_none());
        assert_eq!(doc.artist("B").unwrap().total_listening_ms, 35_000);
    }

    #[test]
    fn test_events_keep_file_name_order() {
        let temp_dir = create_export_dir();
        let events = read_export(temp_dir.path()).unwrap();

        assert_eq!(events.len(), 4);
        assert_eq!(events[0], PlayEvent::new("A", "T1", 40_000));
        assert_eq!(events[1], PlayEvent::new("B", "T3", 35_000));
        assert_eq!(events[3], PlayEvent::new("A", "T2", 5_000));
    }

    #[test]
    fn test_import_from_zip() {
        let temp_dir = TempDir::new().unwrap();
        let zip_path = temp_dir.path().join("my_spotify_data.zip");
        let mut writer = zip::ZipWriter::new(File::create(&zip_path).unwrap());
        let options = SimpleFileOptions::default();

        writer.add_directory("MyData/", options).unwrap();
        writer
            .start_file("MyData/StreamingHistory0.json", options)
            .unwrap();
        writer.write_all(HISTORY_0.as_bytes()).unwrap();
        writer.start_file("MyData/Userdata.json", options).unwrap();
        writer.write_all(b"{}").unwrap();
        writer.finish().unwrap();

        let doc = import_export(&zip_path).unwrap();
        assert_eq!(doc.artists.len(), 2);
        assert_eq!(doc.artist("A").unwrap().total_listening_ms, 40_000);
    }

    #[test]
    fn test_directory_without_history_files() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("Playlist1.json"), "[]").unwrap();

        let err = import_export(temp_dir.path()).unwrap_err();
        assert!(matches!(err, ImportError::NoHistoryFiles(_)));
    }

    #[test]
    fn test_malformed_file_names_the_file() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("StreamingHistory0.json"),
            r#"[{"artistName": "A", "msPlayed": 40000}]"#,
        )
        .unwrap();

        match import_export(temp_dir.path()).unwrap_err() {
            ImportError::Malformed { file, source } => {
                assert_eq!(file, "StreamingHistory0.json");
                assert_eq!(source.position, 0);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_non_array_file_is_malformed() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("StreamingHistory0.json"), "{}").unwrap();

        assert!(matches!(
            import_export(temp_dir.path()).unwrap_err(),
            ImportError::Malformed { .. }
        ));
    }
}
