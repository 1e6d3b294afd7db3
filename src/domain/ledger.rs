use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    dedupe::DedupeKey,
    draft::{Draft, DraftError},
    request::{DeliveryBlocked, Request},
};

/// Inserting a new request failed.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum InsertError {
    /// The draft did not validate.
    #[error(transparent)]
    Draft(#[from] DraftError),
    /// Another record already owns the same dedupe key.
    #[error("duplicate request (same student, song and artist)")]
    Duplicate,
}

/// Changing an existing request failed.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EditError {
    /// No record with this id.
    #[error("no request with id {0}")]
    NotFound(Uuid),
    /// The draft did not validate.
    #[error(transparent)]
    Draft(#[from] DraftError),
    /// The edit would collide with a different record's dedupe key.
    #[error("duplicate request (same student, song and artist)")]
    Duplicate,
    /// The delivery toggle was rejected by the reimbursement gate.
    #[error(transparent)]
    Blocked(#[from] DeliveryBlocked),
}

/// An id prefix did not resolve to exactly one record.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ResolveError {
    /// Nothing matched.
    #[error("no request matches id '{0}'")]
    NotFound(String),
    /// More than one record matched.
    #[error("id '{prefix}' matches {} requests", matches.len())]
    Ambiguous {
        /// The prefix as given.
        prefix: String,
        /// Ids of every matching record.
        matches: Vec<Uuid>,
    },
}

/// The stored inverse of the most recent mutation.
///
/// One slot, replaced by every undoable mutation and cleared by the ones
/// that do not support undo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum UndoEntry {
    /// Inverse of an in-place change: the record as it was before.
    Revert {
        /// The prior snapshot.
        before: Request,
    },
    /// Inverse of a delete: the removed record and where it sat.
    Reinsert {
        /// The removed record, unchanged.
        record: Request,
        /// Its list position before removal.
        index: usize,
    },
}

/// The authoritative in-memory record list.
///
/// Owns the ordered requests (newest first), the dedupe-key index, and the
/// one-slot undo buffer. Every mutation goes through here so the uniqueness
/// invariant and the undo slot stay consistent.
#[derive(Debug, Clone, PartialEq)]
pub struct Ledger {
    requests: Vec<Request>,
    index: HashMap<DedupeKey, Uuid>,
    undo: Option<UndoEntry>,
}

impl Ledger {
    /// Builds a ledger over an already-loaded record list.
    #[must_use]
    pub fn new(requests: Vec<Request>) -> Self {
        let index = requests
            .iter()
            .map(|request| (request.dedupe_key(), request.id))
            .collect();

        Self {
            requests,
            index,
            undo: None,
        }
    }

    /// Seeds the undo slot, typically from the persisted sidecar.
    #[must_use]
    pub fn with_undo(mut self, undo: Option<UndoEntry>) -> Self {
        self.undo = undo;
        self
    }

    /// The records, newest first.
    #[must_use]
    pub fn requests(&self) -> &[Request] {
        &self.requests
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// Whether the ledger holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// The pending undo entry, if any.
    #[must_use]
    pub const fn undo_entry(&self) -> Option<&UndoEntry> {
        self.undo.as_ref()
    }

    /// Looks up a record by exact id.
    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<&Request> {
        self.requests.iter().find(|request| request.id == id)
    }

    /// Resolves a full id or unique id prefix to a record id.
    ///
    /// # Errors
    ///
    /// Returns an error when nothing matches or the prefix is ambiguous.
    pub fn resolve(&self, prefix: &str) -> Result<Uuid, ResolveError> {
        if let Ok(id) = Uuid::parse_str(prefix) {
            return if self.get(id).is_some() {
                Ok(id)
            } else {
                Err(ResolveError::NotFound(prefix.to_string()))
            };
        }

        let needle = prefix.to_lowercase();
        let matches: Vec<Uuid> = self
            .requests
            .iter()
            .filter(|request| request.id.to_string().starts_with(&needle))
            .map(|request| request.id)
            .collect();

        match matches.as_slice() {
            [] => Err(ResolveError::NotFound(prefix.to_string())),
            [only] => Ok(*only),
            _ => Err(ResolveError::Ambiguous {
                prefix: prefix.to_string(),
                matches,
            }),
        }
    }

    /// Creates a request from a draft and prepends it.
    ///
    /// Clears the undo slot: an insert is not undoable.
    ///
    /// # Errors
    ///
    /// Returns an error when the draft does not validate or its dedupe key
    /// collides with an existing record.
    pub fn insert(
        &mut self,
        draft: Draft,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<&Request, InsertError> {
        let request = Request::create(draft, today, now)?;
        let key = request.dedupe_key();
        if self.index.contains_key(&key) {
            return Err(InsertError::Duplicate);
        }

        self.index.insert(key, request.id);
        self.requests.insert(0, request);
        self.undo = None;
        Ok(&self.requests[0])
    }

    /// Flips the delivered flag of one record.
    ///
    /// # Errors
    ///
    /// Returns an error when the id is unknown or the reimbursement gate
    /// blocks the toggle.
    pub fn toggle_delivered(
        &mut self,
        id: Uuid,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<&Request, EditError> {
        let position = self.position(id).ok_or(EditError::NotFound(id))?;
        let before = self.requests[position].clone();
        let next = before.toggle_delivered(today, now)?;

        self.requests[position] = next;
        self.undo = Some(UndoEntry::Revert { before });
        Ok(&self.requests[position])
    }

    /// Flips the reimbursed flag of one record.
    ///
    /// # Errors
    ///
    /// Returns an error when the id is unknown.
    pub fn toggle_reimbursed(
        &mut self,
        id: Uuid,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<&Request, EditError> {
        let position = self.position(id).ok_or(EditError::NotFound(id))?;
        let before = self.requests[position].clone();
        let next = before.toggle_reimbursed(today, now);

        self.requests[position] = next;
        self.undo = Some(UndoEntry::Revert { before });
        Ok(&self.requests[position])
    }

    /// Replaces the editable fields of one record from a draft.
    ///
    /// # Errors
    ///
    /// Returns an error when the id is unknown, the draft does not
    /// validate, or the new dedupe key collides with a different record.
    pub fn edit(
        &mut self,
        id: Uuid,
        draft: Draft,
        now: DateTime<Utc>,
    ) -> Result<&Request, EditError> {
        let position = self.position(id).ok_or(EditError::NotFound(id))?;
        let before = self.requests[position].clone();
        let next = before.apply_edit(draft, now)?;

        let key = next.dedupe_key();
        if self.index.get(&key).is_some_and(|owner| *owner != id) {
            return Err(EditError::Duplicate);
        }

        self.index.remove(&before.dedupe_key());
        self.index.insert(key, id);
        self.requests[position] = next;
        self.undo = Some(UndoEntry::Revert { before });
        Ok(&self.requests[position])
    }

    /// Replaces the notes of one record.
    ///
    /// # Errors
    ///
    /// Returns an error when the id is unknown.
    pub fn set_notes(
        &mut self,
        id: Uuid,
        notes: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<&Request, EditError> {
        let position = self.position(id).ok_or(EditError::NotFound(id))?;
        let before = self.requests[position].clone();
        let next = before.with_notes(notes, now);

        self.requests[position] = next;
        self.undo = Some(UndoEntry::Revert { before });
        Ok(&self.requests[position])
    }

    /// Removes one record, recording its reinsertion as the undo entry.
    ///
    /// # Errors
    ///
    /// Returns an error when the id is unknown.
    pub fn remove(&mut self, id: Uuid) -> Result<Request, EditError> {
        let position = self.position(id).ok_or(EditError::NotFound(id))?;
        let removed = self.requests.remove(position);
        self.index.remove(&removed.dedupe_key());

        self.undo = Some(UndoEntry::Reinsert {
            record: removed.clone(),
            index: position,
        });
        Ok(removed)
    }

    /// Prepends an accepted import batch, keeping batch order.
    ///
    /// The batch is trusted to be already deduplicated against this ledger.
    /// Clears the undo slot: an import is not undoable.
    pub fn prepend_imported(&mut self, accepted: Vec<Request>) {
        for request in &accepted {
            self.index.insert(request.dedupe_key(), request.id);
        }

        let mut merged = accepted;
        merged.extend(self.requests.drain(..));
        self.requests = merged;
        self.undo = None;
    }

    /// Applies and consumes the undo slot.
    ///
    /// A revert restores the prior snapshot with a fresh `updated_at`; a
    /// reinsert puts the removed record back at its old position (clamped),
    /// unchanged. Returns the restored record, or `None` when the slot is
    /// empty.
    pub fn apply_undo(&mut self, now: DateTime<Utc>) -> Option<Request> {
        let entry = self.undo.take()?;

        let restored = match entry {
            UndoEntry::Revert { before } => {
                let mut restored = before;
                restored.updated_at = now;
                match self.position(restored.id) {
                    Some(position) => {
                        let current_key = self.requests[position].dedupe_key();
                        self.index.remove(&current_key);
                        self.requests[position] = restored.clone();
                    }
                    // the record has gone missing underneath us; put the
                    // snapshot back at the front
                    None => self.requests.insert(0, restored.clone()),
                }
                self.index.insert(restored.dedupe_key(), restored.id);
                restored
            }
            UndoEntry::Reinsert { record, index } => {
                let at = index.min(self.requests.len());
                self.requests.insert(at, record.clone());
                self.index.insert(record.dedupe_key(), record.id);
                record
            }
        };

        Some(restored)
    }

    fn position(&self, id: Uuid) -> Option<usize> {
        self.requests.iter().position(|request| request.id == id)
    }
}
