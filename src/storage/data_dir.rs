use std::{
    fs, io,
    path::{Path, PathBuf},
};

/// The per-user directory holding the data file, settings, and undo slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    /// Resolves the data directory: an explicit override wins, otherwise
    /// the platform data directory plus `encore`.
    ///
    /// # Errors
    ///
    /// Fails when the platform reports no data directory and no override
    /// was given.
    pub fn resolve(override_path: Option<PathBuf>) -> Result<Self, NoDataDir> {
        override_path
            .or_else(|| dirs::data_dir().map(|base| base.join("encore")))
            .map(|root| Self { root })
            .ok_or(NoDataDir)
    }

    /// Creates the directory when it does not exist yet.
    ///
    /// # Errors
    ///
    /// Propagates filesystem errors from directory creation.
    pub fn ensure_exists(&self) -> io::Result<()> {
        fs::create_dir_all(&self.root)
    }

    /// The directory itself.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// The request collection document.
    #[must_use]
    pub fn requests_file(&self) -> PathBuf {
        self.root.join("requests.json")
    }

    /// The settings file.
    #[must_use]
    pub fn config_file(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    /// The undo slot sidecar.
    #[must_use]
    pub fn undo_file(&self) -> PathBuf {
        self.root.join("undo.json")
    }
}

/// The platform has no data directory to default to.
#[derive(Debug, thiserror::Error)]
#[error("no data directory is known for this platform; pass --data-dir")]
pub struct NoDataDir;

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::DataDir;

    #[test]
    fn override_is_used_verbatim() {
        let dir = DataDir::resolve(Some(PathBuf::from("/tmp/somewhere"))).unwrap();
        assert_eq!(dir.path(), PathBuf::from("/tmp/somewhere").as_path());
    }

    #[test]
    fn well_known_file_names() {
        let dir = DataDir::resolve(Some(PathBuf::from("/tmp/somewhere"))).unwrap();
        assert_eq!(dir.requests_file(), PathBuf::from("/tmp/somewhere/requests.json"));
        assert_eq!(dir.config_file(), PathBuf::from("/tmp/somewhere/config.toml"));
        assert_eq!(dir.undo_file(), PathBuf::from("/tmp/somewhere/undo.json"));
    }
}
