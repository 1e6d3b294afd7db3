//! Domain models for music request tracking.
//!
//! This module contains the core domain types: the request record and its
//! lifecycle status, draft validation, deduplication keys, and the ledger
//! that owns the authoritative record list.

/// Request record, lifecycle status, and transitions.
pub mod request;
pub use request::{DeliveryBlocked, Request, Status};

mod draft;
pub use draft::{Draft, DraftError};

/// Normalization and deduplication keys.
pub mod dedupe;
pub use dedupe::DedupeKey;

/// The authoritative in-memory record list and its one-slot undo buffer.
pub mod ledger;
pub use ledger::{EditError, InsertError, Ledger, ResolveError, UndoEntry};
