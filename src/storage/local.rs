//! The single-file JSON store used when no remote backend is configured.
//!
//! The whole collection lives in one versioned document; list order in the
//! document is the display order, newest first.

use std::{fs, io, path::PathBuf};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::Request;

/// Format revision of the data file envelope.
const STORE_VERSION: u32 = 1;

/// A store keeping the request collection in a single JSON document.
#[derive(Debug, Clone)]
pub struct LocalStore {
    path: PathBuf,
}

impl LocalStore {
    /// Creates a store reading and writing the given file.
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Reads the stored collection.
    ///
    /// A missing file is an empty collection, and so is a document that
    /// cannot be parsed or carries an unknown version; both are reported at
    /// warn level and behave like a first run.
    ///
    /// # Errors
    ///
    /// Propagates I/O failures other than the file not existing.
    pub fn load(&self) -> Result<Vec<Request>, StoreError> {
        let payload = match fs::read_to_string(&self.path) {
            Ok(payload) => payload,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(StoreError::Io(error)),
        };

        match serde_json::from_str::<Envelope>(&payload) {
            Ok(envelope) if envelope.version == STORE_VERSION => Ok(envelope.requests),
            Ok(envelope) => {
                tracing::warn!(
                    "Ignoring data file {} with unknown version {}",
                    self.path.display(),
                    envelope.version
                );
                Ok(Vec::new())
            }
            Err(error) => {
                tracing::warn!(
                    "Ignoring malformed data file {}: {error}",
                    self.path.display()
                );
                Ok(Vec::new())
            }
        }
    }

    /// Writes the full collection, replacing the previous document.
    ///
    /// # Errors
    ///
    /// Fails when the document cannot be encoded or written.
    pub fn save(&self, requests: &[Request]) -> Result<(), StoreError> {
        let envelope = EnvelopeRef {
            version: STORE_VERSION,
            requests,
        };
        let mut payload = serde_json::to_string_pretty(&envelope)?;
        payload.push('\n');

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, payload)?;
        Ok(())
    }

    /// Writes a batch: stored copies are replaced in place, the rest are
    /// prepended in batch order.
    ///
    /// # Errors
    ///
    /// Fails when the document cannot be read back or written.
    pub fn upsert(&self, requests: &[Request]) -> Result<(), StoreError> {
        let mut stored = self.load()?;
        let mut merged = Vec::with_capacity(stored.len() + requests.len());

        for request in requests {
            match stored.iter_mut().find(|existing| existing.id == request.id) {
                Some(slot) => *slot = request.clone(),
                None => merged.push(request.clone()),
            }
        }
        merged.extend(stored);

        self.save(&merged)
    }

    /// Removes the record with the given id; unknown ids are a no-op.
    ///
    /// # Errors
    ///
    /// Fails when the document cannot be read back or written.
    pub fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        let mut stored = self.load()?;
        stored.retain(|request| request.id != id);
        self.save(&stored)
    }
}

/// Reading or writing the data file failed.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The file could not be read or written.
    #[error("failed to access the data file")]
    Io(#[from] io::Error),

    /// The collection could not be encoded.
    #[error("failed to encode the data file")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Serialize)]
struct EnvelopeRef<'a> {
    version: u32,
    requests: &'a [Request],
}

#[derive(Debug, Deserialize)]
struct Envelope {
    version: u32,
    requests: Vec<Request>,
}
