//! Append-only JSON-line persistence, one file per channel.

use serde_json::Value;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

/// Failure modes of the archive pipeline.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("event is not serializable: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("cannot write to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Owns one append-only handle per channel.
///
/// Files are created lazily on a channel's first event and stay open until
/// the process exits. Every append is one fully serialized JSON line plus a
/// newline terminator, written with a single call, so a line is never
/// half-committed or interleaved with another.
pub struct FileSink {
    destination: PathBuf,
    files: HashMap<String, File>,
}

impl FileSink {
    /// Creates the sink, making sure the destination directory exists
    /// before the first event can arrive.
    pub fn new(destination: impl Into<PathBuf>) -> Result<Self, ArchiveError> {
        let destination = destination.into();
        std::fs::create_dir_all(&destination).map_err(|source| ArchiveError::Io {
            path: destination.clone(),
            source,
        })?;
        Ok(Self {
            destination,
            files: HashMap::new(),
        })
    }

    /// Appends one event to the channel's log file.
    pub fn append(&mut self, channel_name: &str, event: &Value) -> Result<(), ArchiveError> {
        let mut line = serde_json::to_string(event)?;
        line.push('\n');

        let path = self.destination.join(format!("{channel_name}.log"));
        let file = match self.files.entry(channel_name.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                debug!("opening {}", path.display());
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .map_err(|source| ArchiveError::Io {
                        path: path.clone(),
                        source,
                    })?;
                entry.insert(file)
            }
        };

        file.write_all(line.as_bytes())
            .map_err(|source| ArchiveError::Io { path, source })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::Path;

    fn read_lines(path: &Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn creates_the_destination_directory() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("logs/slack");
        FileSink::new(&destination).unwrap();
        assert!(destination.is_dir());
    }

    #[test]
    fn appends_one_line_per_event_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FileSink::new(dir.path()).unwrap();
        for n in 0..5 {
            sink.append("general", &json!({ "n": n })).unwrap();
        }

        let lines = read_lines(&dir.path().join("general.log"));
        assert_eq!(lines.len(), 5);
        for (n, line) in lines.iter().enumerate() {
            let parsed: Value = serde_json::from_str(line).unwrap();
            assert_eq!(parsed, json!({ "n": n }));
        }
    }

    #[test]
    fn channels_never_share_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FileSink::new(dir.path()).unwrap();
        sink.append("general", &json!({"text": "one"})).unwrap();
        sink.append("general", &json!({"text": "two"})).unwrap();
        sink.append("random", &json!({"text": "three"})).unwrap();

        assert_eq!(read_lines(&dir.path().join("general.log")).len(), 2);
        let random = read_lines(&dir.path().join("random.log"));
        assert_eq!(random.len(), 1);
        assert!(random[0].contains("three"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn round_trips_structurally_equivalent_json() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FileSink::new(dir.path()).unwrap();
        let event = json!({
            "type": "message",
            "text": "multi\nline \"quoted\"",
            "thread": {"ts": "17.5", "replies": [1, 2, 3]},
        });
        sink.append("general", &event).unwrap();

        // The embedded newline stays escaped, so the event is one line.
        let lines = read_lines(&dir.path().join("general.log"));
        assert_eq!(lines.len(), 1);
        assert_eq!(serde_json::from_str::<Value>(&lines[0]).unwrap(), event);
    }

    #[test]
    fn existing_files_are_appended_to_not_truncated() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("general.log"), "{\"n\":0}\n").unwrap();
        let mut sink = FileSink::new(dir.path()).unwrap();
        sink.append("general", &json!({ "n": 1 })).unwrap();
        assert_eq!(read_lines(&dir.path().join("general.log")).len(), 2);
    }

    #[test]
    fn unusable_destination_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("not-a-dir");
        std::fs::write(&file, b"x").unwrap();
        assert!(FileSink::new(&file).is_err());
    }
}
