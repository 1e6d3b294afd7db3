use std::{fs, io, path::PathBuf};

use super::local::StoreError;
use crate::domain::UndoEntry;

/// Sidecar file carrying the one-step undo slot between invocations.
///
/// Always local, whichever gateway holds the records: the slot belongs to
/// this machine's command history, not to the shared collection.
#[derive(Debug, Clone)]
pub struct UndoFile {
    path: PathBuf,
}

impl UndoFile {
    /// Creates a handle for the given sidecar path.
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Reads the stored entry, if any.
    ///
    /// A missing or unreadable sidecar is an empty slot; malformed content
    /// is reported at warn level and dropped.
    #[must_use]
    pub fn load(&self) -> Option<UndoEntry> {
        let payload = fs::read_to_string(&self.path).ok()?;
        match serde_json::from_str(&payload) {
            Ok(entry) => Some(entry),
            Err(error) => {
                tracing::warn!(
                    "Ignoring malformed undo file {}: {error}",
                    self.path.display()
                );
                None
            }
        }
    }

    /// Writes the sidecar to match the given slot: an entry is stored, an
    /// empty slot removes the file.
    ///
    /// # Errors
    ///
    /// Fails when the sidecar cannot be written or removed.
    pub fn save(&self, entry: Option<&UndoEntry>) -> Result<(), StoreError> {
        let Some(entry) = entry else {
            return match fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
                Err(error) => Err(StoreError::Io(error)),
            };
        };

        let mut payload = serde_json::to_string_pretty(entry)?;
        payload.push('\n');
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, payload)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};
    use tempfile::TempDir;

    use super::UndoFile;
    use crate::domain::{Draft, Request, UndoEntry};

    fn sample() -> Request {
        let draft = Draft {
            student_name: "Alice Smith".to_string(),
            song_title: "Song A".to_string(),
            artist: "Band X".to_string(),
            ..Draft::default()
        };
        Request::create(
            draft,
            NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            Utc.with_ymd_and_hms(2024, 3, 10, 9, 30, 0).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn empty_slot_when_no_sidecar_exists() {
        let dir = TempDir::new().unwrap();
        let file = UndoFile::new(dir.path().join("undo.json"));

        assert!(file.load().is_none());
    }

    #[test]
    fn entry_round_trips() {
        let dir = TempDir::new().unwrap();
        let file = UndoFile::new(dir.path().join("undo.json"));
        let record = sample();

        file.save(Some(&UndoEntry::Reinsert {
            record: record.clone(),
            index: 3,
        }))
        .unwrap();

        match file.load() {
            Some(UndoEntry::Reinsert {
                record: loaded,
                index,
            }) => {
                assert_eq!(loaded, record);
                assert_eq!(index, 3);
            }
            other => panic!("expected a reinsert entry, got {other:?}"),
        }
    }

    #[test]
    fn saving_an_empty_slot_removes_the_sidecar() {
        let dir = TempDir::new().unwrap();
        let file = UndoFile::new(dir.path().join("undo.json"));

        file.save(Some(&UndoEntry::Revert { before: sample() }))
            .unwrap();
        assert!(dir.path().join("undo.json").exists());

        file.save(None).unwrap();
        assert!(!dir.path().join("undo.json").exists());
        assert!(file.load().is_none());

        // Clearing twice is fine.
        file.save(None).unwrap();
    }

    #[test]
    fn malformed_sidecar_is_an_empty_slot() {
        let dir = TempDir::new().unwrap();
        let file = UndoFile::new(dir.path().join("undo.json"));
        std::fs::write(dir.path().join("undo.json"), "not an entry").unwrap();

        assert!(file.load().is_none());
    }
}
