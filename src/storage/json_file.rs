use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};

use super::{decode, encode, SessionStorage, StorageError};
use crate::models::Session;

/// Sessions kept as one JSON document on disk.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where an unreadable document is moved so the next save cannot overwrite it
    pub fn corrupt_path(&self) -> PathBuf {
        self.sibling(".corrupt")
    }

    fn temp_path(&self) -> PathBuf {
        self.sibling(".tmp")
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(suffix);
        self.path.with_file_name(name)
    }
}

impl SessionStorage for JsonFileStorage {
    fn save(&self, sessions: &[Session]) -> Result<(), StorageError> {
        let text = encode(sessions)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        // Write next to the target then rename so a crash never leaves half a file
        let temp = self.temp_path();
        fs::write(&temp, text)?;
        fs::rename(&temp, &self.path)?;

        debug!("Saved {} sessions to {}", sessions.len(), self.path.display());
        Ok(())
    }

    fn load(&self) -> Result<Vec<Session>, StorageError> {
        if !self.path.exists() {
            debug!("No session file at {}", self.path.display());
            return Ok(Vec::new());
        }

        let text = fs::read_to_string(&self.path)?;
        match decode(&text) {
            Ok(sessions) => Ok(sessions),
            Err(e) => {
                let aside = self.corrupt_path();
                match fs::rename(&self.path, &aside) {
                    Ok(()) => warn!(
                        "Moved unreadable session file {} to {}",
                        self.path.display(),
                        aside.display()
                    ),
                    Err(rename_err) => warn!(
                        "Could not move unreadable session file {} aside: {}",
                        self.path.display(),
                        rename_err
                    ),
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::{device, reading};
    use tempfile::TempDir;
    use time::macros::datetime;

    fn sample_sessions() -> Vec<Session> {
        let mut first = Session::start(device(), datetime!(2024-03-01 8:00 +1));
        first.push(reading(datetime!(2024-03-01 8:00:01.250 +1), 18.25));
        first.push(reading(datetime!(2024-03-01 8:00:02 +1), -3.1));
        first.finish(datetime!(2024-03-01 9:30 +1));

        let mut second = Session::start(device(), datetime!(2024-03-02 8:00 UTC));
        second.finish(datetime!(2024-03-02 8:01 UTC));

        vec![first, second]
    }

    #[test]
    fn round_trip_preserves_every_field() {
        let dir = TempDir::new().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("sessions.json"));
        let sessions = sample_sessions();

        storage.save(&sessions).unwrap();
        let loaded = storage.load().unwrap();

        assert_eq!(loaded, sessions);
        assert_eq!(
            loaded[0].readings()[0].timestamp,
            datetime!(2024-03-01 8:00:01.250 +1)
        );
        assert_eq!(loaded[0].data_count(), 2);
    }

    #[test]
    fn missing_file_loads_empty() {
        let dir = TempDir::new().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("absent.json"));
        assert!(storage.load().unwrap().is_empty());
    }

    #[test]
    fn creates_parent_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("deeper").join("sessions.json");
        let storage = JsonFileStorage::new(&path);

        storage.save(&sample_sessions()).unwrap();
        assert!(path.exists());
        assert!(!dir.path().join("nested/deeper/sessions.json.tmp").exists());
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sessions.json");
        fs::write(&path, "]]]").unwrap();

        let storage = JsonFileStorage::new(&path);
        assert!(matches!(storage.load(), Err(StorageError::Corrupt(_))));
    }

    #[test]
    fn corrupt_file_is_kept_aside_from_next_save() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sessions.json");
        let broken = r#"{"chiro-logger-sessions": [{"readings": [null]}]}"#;
        fs::write(&path, broken).unwrap();

        let storage = JsonFileStorage::new(&path);
        assert!(storage.load().is_err());
        assert!(!path.exists());
        assert_eq!(
            storage.corrupt_path(),
            dir.path().join("sessions.json.corrupt")
        );
        assert_eq!(fs::read_to_string(storage.corrupt_path()).unwrap(), broken);

        storage.save(&sample_sessions()).unwrap();
        assert_eq!(storage.load().unwrap(), sample_sessions());
        assert_eq!(fs::read_to_string(storage.corrupt_path()).unwrap(), broken);
    }

    #[test]
    fn unwritable_location_is_reported() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "file, not a directory").unwrap();

        let storage = JsonFileStorage::new(blocker.join("sessions.json"));
        assert!(matches!(storage.save(&[]), Err(StorageError::Io(_))));
    }
}
