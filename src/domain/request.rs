use chrono::{DateTime, NaiveDate, Utc};
use non_empty_string::NonEmptyString;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
    dedupe::DedupeKey,
    draft::{Draft, DraftError},
};

/// The lifecycle state of a request.
///
/// The three states are ranked for export ordering: pending sorts before
/// delivered, delivered before archived. The archive date lives inside the
/// `Archived` variant, so an archived record without a date (or a dated
/// record that is not archived) cannot be constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Not yet delivered. Reimbursement may still have happened.
    Pending {
        /// Whether the cost has already been reimbursed.
        reimbursed: bool,
    },
    /// Delivered but not reimbursed.
    Delivered,
    /// Delivered and reimbursed.
    Archived {
        /// The day the record entered the archived state.
        since: NaiveDate,
    },
}

impl Status {
    /// Reconstructs a status from the serialized boolean pair.
    ///
    /// An archived row missing its date is backfilled with `fallback`; an
    /// archive date on a non-archived row is dropped.
    pub(crate) fn from_flags(
        delivered: bool,
        reimbursed: bool,
        archived_date: Option<NaiveDate>,
        fallback: NaiveDate,
    ) -> Self {
        match (delivered, reimbursed) {
            (true, true) => Self::Archived {
                since: archived_date.unwrap_or(fallback),
            },
            (true, false) => Self::Delivered,
            (false, reimbursed) => Self::Pending { reimbursed },
        }
    }

    /// Whether the request has been delivered.
    #[must_use]
    pub const fn delivered(self) -> bool {
        matches!(self, Self::Delivered | Self::Archived { .. })
    }

    /// Whether the request has been reimbursed.
    #[must_use]
    pub const fn reimbursed(self) -> bool {
        match self {
            Self::Pending { reimbursed } => reimbursed,
            Self::Delivered => false,
            Self::Archived { .. } => true,
        }
    }

    /// The archive date, present exactly when the status is `Archived`.
    #[must_use]
    pub const fn archived_date(self) -> Option<NaiveDate> {
        match self {
            Self::Archived { since } => Some(since),
            _ => None,
        }
    }

    /// Export sort rank: pending < delivered < archived.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Pending { .. } => 0,
            Self::Delivered => 1,
            Self::Archived { .. } => 2,
        }
    }

    /// Human-readable state name.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending { .. } => "Pending",
            Self::Delivered => "Delivered",
            Self::Archived { .. } => "Archived",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A delivery toggle was rejected by the reimbursement gate.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("reimburse first before marking delivered")]
pub struct DeliveryBlocked;

/// One tracked music request.
///
/// The status field is private so that every archived record carries its
/// archive date and every status change flows through a transition method.
/// All transitions are pure: they return a new snapshot with `updated_at`
/// bumped and leave the original untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredRequest", into = "StoredRequest")]
pub struct Request {
    /// Unique identifier, immutable after creation.
    pub id: Uuid,
    /// Student the request is for.
    pub student_name: NonEmptyString,
    /// Requested song title.
    pub song_title: NonEmptyString,
    /// Performing or composing artist.
    pub artist: NonEmptyString,
    /// The day the request was made.
    pub date_requested: NaiveDate,
    /// Optional fulfilment deadline.
    pub due_date: Option<NaiveDate>,
    /// Optional link to the score.
    pub score_link: Option<String>,
    /// Optional cost amount, never negative.
    pub cost: Option<f64>,
    /// Whether delivery requires reimbursement first.
    pub only_deliverable_if_reimbursed: bool,
    /// Optional free-text notes.
    pub notes: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Time of the last field change.
    pub updated_at: DateTime<Utc>,
    status: Status,
}

impl Request {
    /// Creates a new pending request from a draft.
    ///
    /// `date_requested` defaults to `today` when the draft leaves it unset.
    ///
    /// # Errors
    ///
    /// Returns an error if student, song, or artist is blank after
    /// trimming, or if the cost is negative.
    pub fn create(draft: Draft, today: NaiveDate, now: DateTime<Utc>) -> Result<Self, DraftError> {
        let (student_name, song_title, artist) = validated_names(&draft)?;
        let cost = checked_cost(draft.cost)?;

        Ok(Self {
            id: Uuid::new_v4(),
            student_name,
            song_title,
            artist,
            date_requested: draft.date_requested.unwrap_or(today),
            due_date: draft.due_date,
            score_link: clean_optional(draft.score_link),
            cost,
            only_deliverable_if_reimbursed: draft.only_deliverable_if_reimbursed,
            notes: clean_optional(draft.notes),
            created_at: now,
            updated_at: now,
            status: Status::Pending { reimbursed: false },
        })
    }

    /// Builds an accepted import row as a fresh record.
    ///
    /// The id and both timestamps are newly assigned; source identifiers are
    /// never reused. A delivered and reimbursed row without an archive date
    /// is backfilled with `today`.
    pub(crate) fn from_import(row: ImportedRow, today: NaiveDate, now: DateTime<Utc>) -> Self {
        let status = Status::from_flags(
            row.delivered,
            row.reimbursed,
            row.archived_date,
            today,
        );

        Self {
            id: Uuid::new_v4(),
            student_name: row.student_name,
            song_title: row.song_title,
            artist: row.artist,
            date_requested: row.date_requested.unwrap_or(today),
            due_date: row.due_date,
            score_link: row.score_link,
            cost: row.cost,
            only_deliverable_if_reimbursed: row.only_deliverable_if_reimbursed,
            notes: row.notes,
            created_at: now,
            updated_at: now,
            status,
        }
    }

    /// The current lifecycle status.
    #[must_use]
    pub const fn status(&self) -> Status {
        self.status
    }

    /// Whether the request has been delivered.
    #[must_use]
    pub const fn delivered(&self) -> bool {
        self.status.delivered()
    }

    /// Whether the request has been reimbursed.
    #[must_use]
    pub const fn reimbursed(&self) -> bool {
        self.status.reimbursed()
    }

    /// The archive date, present exactly when the record is archived.
    #[must_use]
    pub const fn archived_date(&self) -> Option<NaiveDate> {
        self.status.archived_date()
    }

    /// The uniqueness key for duplicate detection.
    #[must_use]
    pub fn dedupe_key(&self) -> DedupeKey {
        DedupeKey::new(
            self.student_name.as_str(),
            self.song_title.as_str(),
            self.artist.as_str(),
        )
    }

    /// Flips the delivered flag.
    ///
    /// Entering the archived state stamps `today` as the archive date;
    /// leaving it discards the date.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryBlocked`] when the record is gated
    /// (`only_deliverable_if_reimbursed`), not reimbursed, and not yet
    /// delivered.
    pub fn toggle_delivered(
        &self,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Self, DeliveryBlocked> {
        let status = match self.status {
            Status::Pending { reimbursed } => {
                if self.only_deliverable_if_reimbursed && !reimbursed {
                    return Err(DeliveryBlocked);
                }
                if reimbursed {
                    Status::Archived { since: today }
                } else {
                    Status::Delivered
                }
            }
            Status::Delivered => Status::Pending { reimbursed: false },
            Status::Archived { .. } => Status::Pending { reimbursed: true },
        };

        Ok(Self {
            status,
            updated_at: now,
            ..self.clone()
        })
    }

    /// Flips the reimbursed flag.
    ///
    /// Un-reimbursing a gated, delivered record forces it back to pending.
    /// The archive date follows the same stamp/discard rule as
    /// [`Self::toggle_delivered`].
    #[must_use]
    pub fn toggle_reimbursed(&self, today: NaiveDate, now: DateTime<Utc>) -> Self {
        let status = match self.status {
            Status::Pending { reimbursed } => Status::Pending {
                reimbursed: !reimbursed,
            },
            Status::Delivered => Status::Archived { since: today },
            Status::Archived { .. } => {
                if self.only_deliverable_if_reimbursed {
                    Status::Pending { reimbursed: false }
                } else {
                    Status::Delivered
                }
            }
        };

        Self {
            status,
            updated_at: now,
            ..self.clone()
        }
    }

    /// Replaces the editable fields from a draft.
    ///
    /// The id, lifecycle status, and creation time are preserved. Duplicate
    /// checking against other records is the ledger's responsibility.
    ///
    /// # Errors
    ///
    /// Returns an error if student, song, or artist is blank after
    /// trimming, or if the cost is negative.
    pub fn apply_edit(&self, draft: Draft, now: DateTime<Utc>) -> Result<Self, DraftError> {
        let (student_name, song_title, artist) = validated_names(&draft)?;
        let cost = checked_cost(draft.cost)?;

        Ok(Self {
            id: self.id,
            student_name,
            song_title,
            artist,
            date_requested: draft.date_requested.unwrap_or(self.date_requested),
            due_date: draft.due_date,
            score_link: clean_optional(draft.score_link),
            cost,
            only_deliverable_if_reimbursed: draft.only_deliverable_if_reimbursed,
            notes: clean_optional(draft.notes),
            created_at: self.created_at,
            updated_at: now,
            status: self.status,
        })
    }

    /// Replaces the notes. Trimmed; empty becomes absent.
    #[must_use]
    pub fn with_notes(&self, notes: Option<&str>, now: DateTime<Utc>) -> Self {
        Self {
            notes: clean_optional(notes.map(str::to_string)),
            updated_at: now,
            ..self.clone()
        }
    }

    /// A draft prefilled with this record's editable fields.
    #[must_use]
    pub fn to_draft(&self) -> Draft {
        Draft {
            student_name: self.student_name.to_string(),
            song_title: self.song_title.to_string(),
            artist: self.artist.to_string(),
            date_requested: Some(self.date_requested),
            due_date: self.due_date,
            score_link: self.score_link.clone(),
            cost: self.cost,
            only_deliverable_if_reimbursed: self.only_deliverable_if_reimbursed,
            notes: self.notes.clone(),
        }
    }
}

/// The field set of an accepted import row, already coerced and validated.
pub(crate) struct ImportedRow {
    pub student_name: NonEmptyString,
    pub song_title: NonEmptyString,
    pub artist: NonEmptyString,
    pub date_requested: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub archived_date: Option<NaiveDate>,
    pub score_link: Option<String>,
    pub cost: Option<f64>,
    pub only_deliverable_if_reimbursed: bool,
    pub delivered: bool,
    pub reimbursed: bool,
    pub notes: Option<String>,
}

fn validated_names(
    draft: &Draft,
) -> Result<(NonEmptyString, NonEmptyString, NonEmptyString), DraftError> {
    let student = NonEmptyString::new(draft.student_name.trim().to_string());
    let song = NonEmptyString::new(draft.song_title.trim().to_string());
    let artist = NonEmptyString::new(draft.artist.trim().to_string());

    match (student, song, artist) {
        (Ok(student), Ok(song), Ok(artist)) => Ok((student, song, artist)),
        _ => Err(DraftError::MissingRequired),
    }
}

const fn checked_cost(cost: Option<f64>) -> Result<Option<f64>, DraftError> {
    match cost {
        Some(value) if value < 0.0 => Err(DraftError::NegativeCost),
        other => Ok(other),
    }
}

fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// The flat serialized form of a request.
///
/// Carries `delivered`/`reimbursed`/`archivedDate` as independent fields
/// for compatibility with the export envelope and the remote row shape;
/// the tagged status is reconstructed on the way in.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StoredRequest {
    pub id: Uuid,
    pub student_name: NonEmptyString,
    pub song_title: NonEmptyString,
    pub artist: NonEmptyString,
    pub date_requested: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
    #[serde(default)]
    pub only_deliverable_if_reimbursed: bool,
    #[serde(default)]
    pub delivered: bool,
    #[serde(default)]
    pub reimbursed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<StoredRequest> for Request {
    fn from(stored: StoredRequest) -> Self {
        let status = Status::from_flags(
            stored.delivered,
            stored.reimbursed,
            stored.archived_date,
            stored.date_requested,
        );

        Self {
            id: stored.id,
            student_name: stored.student_name,
            song_title: stored.song_title,
            artist: stored.artist,
            date_requested: stored.date_requested,
            due_date: stored.due_date,
            score_link: stored.score_link,
            cost: stored.cost,
            only_deliverable_if_reimbursed: stored.only_deliverable_if_reimbursed,
            notes: stored.notes,
            created_at: stored.created_at,
            updated_at: stored.updated_at,
            status,
        }
    }
}

impl From<Request> for StoredRequest {
    fn from(request: Request) -> Self {
        let delivered = request.delivered();
        let reimbursed = request.reimbursed();
        let archived_date = request.archived_date();

        Self {
            id: request.id,
            student_name: request.student_name,
            song_title: request.song_title,
            artist: request.artist,
            date_requested: request.date_requested,
            due_date: request.due_date,
            archived_date,
            score_link: request.score_link,
            cost: request.cost,
            only_deliverable_if_reimbursed: request.only_deliverable_if_reimbursed,
            notes: request.notes,
            created_at: request.created_at,
            updated_at: request.updated_at,
            delivered,
            reimbursed,
        }
    }
}
