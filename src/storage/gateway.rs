//! The seam between commands and whichever backend holds the records.

use uuid::Uuid;

use super::{
    data_dir::DataDir,
    local::{LocalStore, StoreError},
    remote::{RemoteError, RemoteStore},
};
use crate::{config::Config, domain::Request};

/// Durable storage for the request collection.
///
/// Commands talk to storage only through this trait, so the local JSON
/// file and the hosted table are interchangeable.
pub trait Gateway {
    /// Loads every stored record, newest first.
    ///
    /// # Errors
    ///
    /// Fails when the backing store cannot be read.
    fn load(&self) -> Result<Vec<Request>, GatewayError>;

    /// Writes one record, replacing any stored copy with the same id.
    ///
    /// # Errors
    ///
    /// Fails when the write does not reach the backing store.
    fn upsert_one(&self, request: &Request) -> Result<(), GatewayError>;

    /// Writes a batch of records in one shot.
    ///
    /// # Errors
    ///
    /// Fails when the write does not reach the backing store.
    fn upsert_many(&self, requests: &[Request]) -> Result<(), GatewayError>;

    /// Removes the record with the given id; missing ids are a no-op.
    ///
    /// # Errors
    ///
    /// Fails when the write does not reach the backing store.
    fn delete_one(&self, id: Uuid) -> Result<(), GatewayError>;

    /// Replaces the whole stored collection with the given ordered list.
    ///
    /// # Errors
    ///
    /// Fails when the write does not reach the backing store.
    fn replace_all(&self, requests: &[Request]) -> Result<(), GatewayError>;
}

/// A storage failure from whichever backend is active.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The local data file failed.
    #[error("local store failure")]
    Store(#[from] StoreError),

    /// The hosted table call failed.
    #[error("remote store failure")]
    Remote(#[from] RemoteError),
}

/// Opens the active backend: the hosted table when complete remote
/// settings exist, otherwise the local file in the data directory.
#[must_use]
pub fn open(dir: &DataDir, config: &Config) -> Box<dyn Gateway> {
    config.usable_remote().map_or_else(
        || {
            tracing::debug!("Using the local store at {}", dir.requests_file().display());
            Box::new(LocalStore::new(dir.requests_file())) as Box<dyn Gateway>
        },
        |remote| {
            tracing::debug!("Using the remote store at {}", remote.base_url);
            Box::new(RemoteStore::new(remote.clone()))
        },
    )
}

impl Gateway for LocalStore {
    fn load(&self) -> Result<Vec<Request>, GatewayError> {
        Ok(Self::load(self)?)
    }

    fn upsert_one(&self, request: &Request) -> Result<(), GatewayError> {
        Ok(self.upsert(std::slice::from_ref(request))?)
    }

    fn upsert_many(&self, requests: &[Request]) -> Result<(), GatewayError> {
        Ok(self.upsert(requests)?)
    }

    fn delete_one(&self, id: Uuid) -> Result<(), GatewayError> {
        Ok(self.delete(id)?)
    }

    fn replace_all(&self, requests: &[Request]) -> Result<(), GatewayError> {
        Ok(self.save(requests)?)
    }
}

impl Gateway for RemoteStore {
    fn load(&self) -> Result<Vec<Request>, GatewayError> {
        Ok(self.fetch()?)
    }

    fn upsert_one(&self, request: &Request) -> Result<(), GatewayError> {
        Ok(self.upsert(std::slice::from_ref(request))?)
    }

    fn upsert_many(&self, requests: &[Request]) -> Result<(), GatewayError> {
        Ok(self.upsert(requests)?)
    }

    fn delete_one(&self, id: Uuid) -> Result<(), GatewayError> {
        Ok(self.delete(id)?)
    }

    fn replace_all(&self, requests: &[Request]) -> Result<(), GatewayError> {
        // Callers only ever replace with a superset of the stored rows, so
        // a bulk upsert realizes this without a destructive wipe.
        Ok(self.upsert(requests)?)
    }
}
