//! Music Request Tracking
//!
//! Requests are tracked as a single ordered ledger persisted either to a
//! local JSON document or an authenticated remote row-store.

pub mod domain;
pub use domain::{DedupeKey, Draft, Ledger, Request, Status, UndoEntry};

/// Import/export reconciliation between the ledger and external files.
pub mod reconcile;
pub use reconcile::{Format, ImportSummary};

/// Persistence gateways for the record list.
pub mod storage;
pub use storage::{DataDir, Gateway, LocalStore, RemoteStore, UndoFile};

/// Application settings and their on-disk form.
pub mod config;
pub use config::{Config, RemoteConfig};
