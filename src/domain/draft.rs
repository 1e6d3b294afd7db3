use chrono::NaiveDate;

use super::dedupe::DedupeKey;

/// The editable fields of a request, prior to validation.
///
/// A draft carries what the user typed; [`crate::Request::create`] and
/// [`crate::Request::apply_edit`] validate it. Lifecycle flags are not part
/// of a draft: a new request always starts pending, and editing never
/// touches delivery or reimbursement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Draft {
    /// Student the request is for.
    pub student_name: String,
    /// Requested song title.
    pub song_title: String,
    /// Performing or composing artist.
    pub artist: String,
    /// Date the request was made; defaults to today when absent.
    pub date_requested: Option<NaiveDate>,
    /// Optional fulfilment deadline.
    pub due_date: Option<NaiveDate>,
    /// Optional link to the score.
    pub score_link: Option<String>,
    /// Optional cost amount.
    pub cost: Option<f64>,
    /// Whether delivery requires reimbursement first.
    pub only_deliverable_if_reimbursed: bool,
    /// Optional free-text notes.
    pub notes: Option<String>,
}

impl Draft {
    /// Returns the dedupe key this draft would occupy.
    #[must_use]
    pub fn dedupe_key(&self) -> DedupeKey {
        DedupeKey::new(&self.student_name, &self.song_title, &self.artist)
    }
}

/// Validation failures for a draft.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DraftError {
    /// One of the three required display strings is blank.
    #[error("student, song and artist are required")]
    MissingRequired,

    /// The cost amount is negative.
    #[error("cost cannot be negative")]
    NegativeCost,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedupe_key_uses_normalized_parts() {
        let draft = Draft {
            student_name: "  Alice   Smith ".to_string(),
            song_title: "Song A".to_string(),
            artist: "Band X".to_string(),
            ..Draft::default()
        };
        assert_eq!(draft.dedupe_key().as_str(), "alice smith|song a|band x");
    }
}
