use std::{cmp::Ordering, collections::HashSet, fmt, path::Path, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use non_empty_string::NonEmptyString;
use serde_json::{Map, Value};

use crate::domain::{
    DedupeKey, Request,
    request::ImportedRow,
};

mod coerce;
mod json;
mod table;

/// External file format for import and export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Comma-separated values with the fixed eleven-column header.
    Csv,
    /// The versioned JSON export envelope (import also takes a bare array).
    Json,
}

impl Format {
    /// Picks the format from a file name: `.json` (case-insensitive) is
    /// JSON, anything else is tabular.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        let is_json = path
            .extension()
            .is_some_and(|extension| extension.eq_ignore_ascii_case("json"));
        if is_json { Self::Json } else { Self::Csv }
    }

    /// The file extension for this format.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }

    /// The default dated export file name.
    #[must_use]
    pub fn default_file_name(self, date: NaiveDate) -> String {
        format!("music-requests-{date}.{}", self.extension())
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown format '{other}' (expected csv or json)")),
        }
    }
}

/// Accounting for one import run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Rows accepted as new records.
    pub added: usize,
    /// Rows skipped because their dedupe key was already taken.
    pub skipped_duplicates: usize,
    /// Rows skipped for missing required fields, and non-object rows.
    pub skipped_invalid: usize,
}

impl fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Imported {} • Skipped {} dupes • Skipped {} invalid",
            self.added, self.skipped_duplicates, self.skipped_invalid
        )
    }
}

/// Reconciles an external payload against the existing records.
///
/// Returns the accepted batch (payload order, ready to prepend) and the
/// summary. Duplicates are detected against a running key set seeded from
/// `existing`, so a key can be accepted at most once per run. A malformed
/// payload yields an empty batch and an all-zero summary.
#[must_use]
pub fn import(
    format: Format,
    payload: &str,
    existing: &[Request],
    today: NaiveDate,
    now: DateTime<Utc>,
) -> (Vec<Request>, ImportSummary) {
    let items = match format {
        Format::Csv => table::rows(payload),
        Format::Json => json::rows(payload),
    };
    let Some(items) = items else {
        return (Vec::new(), ImportSummary::default());
    };

    let mut seen: HashSet<DedupeKey> = existing.iter().map(Request::dedupe_key).collect();
    let mut summary = ImportSummary::default();
    let mut accepted = Vec::new();

    for item in items {
        let Some(row) = item.as_object() else {
            summary.skipped_invalid += 1;
            continue;
        };
        let Some(parsed) = parse_row(row) else {
            summary.skipped_invalid += 1;
            continue;
        };

        let key = DedupeKey::new(
            parsed.student_name.as_str(),
            parsed.song_title.as_str(),
            parsed.artist.as_str(),
        );
        if !seen.insert(key) {
            summary.skipped_duplicates += 1;
            continue;
        }

        accepted.push(Request::from_import(parsed, today, now));
        summary.added += 1;
    }

    (accepted, summary)
}

/// Renders the records as an export payload, in export order.
///
/// # Errors
///
/// Returns an error when JSON serialization fails.
pub fn export(
    format: Format,
    requests: &[Request],
    exported_at: DateTime<Utc>,
) -> Result<String, serde_json::Error> {
    let sorted = sorted_for_export(requests);

    match format {
        Format::Csv => Ok(table::write(&sorted)),
        Format::Json => json::write(&sorted, exported_at),
    }
}

fn sorted_for_export(requests: &[Request]) -> Vec<&Request> {
    let mut sorted: Vec<&Request> = requests.iter().collect();
    sorted.sort_by(|a, b| export_order(a, b));
    sorted
}

// Pending before delivered before archived; archived by archive date
// descending; then date requested descending; then student name ascending.
fn export_order(a: &Request, b: &Request) -> Ordering {
    let by_rank = a.status().rank().cmp(&b.status().rank());
    if by_rank != Ordering::Equal {
        return by_rank;
    }

    if let (Some(a_since), Some(b_since)) = (a.archived_date(), b.archived_date()) {
        let by_archived = b_since.cmp(&a_since);
        if by_archived != Ordering::Equal {
            return by_archived;
        }
    }

    b.date_requested
        .cmp(&a.date_requested)
        .then_with(|| a.student_name.as_str().cmp(b.student_name.as_str()))
}

fn parse_row(row: &Map<String, Value>) -> Option<ImportedRow> {
    let student_name = required(row, &["studentName", "Student Name"])?;
    let song_title = required(row, &["songTitle", "Song Title"])?;
    let artist = required(row, &["artist", "Artist"])?;

    Some(ImportedRow {
        student_name,
        song_title,
        artist,
        date_requested: find(row, &["dateRequested", "Date Requested"], coerce::date),
        due_date: find(row, &["dueDate", "Due Date"], coerce::date),
        archived_date: find(row, &["archivedDate", "Archived Date"], coerce::date),
        score_link: find(row, &["scoreLink", "Score Link"], coerce::optional_text),
        cost: find(row, &["cost", "Cost"], coerce::amount),
        only_deliverable_if_reimbursed: find(
            row,
            &["onlyDeliverableIfReimbursed"],
            coerce::yes_no,
        )
        .unwrap_or(false),
        delivered: find(row, &["delivered", "Delivered"], coerce::yes_no).unwrap_or(false),
        reimbursed: find(row, &["reimbursed", "Reimbursed"], coerce::yes_no).unwrap_or(false),
        notes: find(row, &["notes", "Notes"], coerce::optional_text),
    })
}

fn required(row: &Map<String, Value>, candidates: &[&str]) -> Option<NonEmptyString> {
    find(row, candidates, coerce::required_text).and_then(|text| NonEmptyString::new(text).ok())
}

/// Probes each candidate key in turn, exact key first and then a
/// case-insensitive scan, keeping the first value the coercion accepts.
fn find<T>(
    row: &Map<String, Value>,
    candidates: &[&str],
    coercion: impl Fn(&Value) -> Option<T>,
) -> Option<T> {
    candidates
        .iter()
        .find_map(|candidate| lookup(row, candidate).and_then(&coercion))
}

fn lookup<'a>(row: &'a Map<String, Value>, candidate: &str) -> Option<&'a Value> {
    if let Some(value) = row.get(candidate) {
        return Some(value);
    }

    let needle = candidate.trim().to_lowercase();
    row.iter()
        .find(|(key, _)| key.trim().to_lowercase() == needle)
        .map(|(_, value)| value)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use test_case::test_case;

    use super::*;
    use crate::domain::Draft;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 9, 30, 0).unwrap()
    }

    fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    fn request(student: &str, song: &str, requested: NaiveDate) -> Request {
        let draft = Draft {
            student_name: student.to_string(),
            song_title: song.to_string(),
            artist: "Band X".to_string(),
            date_requested: Some(requested),
            ..Draft::default()
        };
        Request::create(draft, today(), now()).unwrap()
    }

    fn archived(student: &str, song: &str, requested: NaiveDate, since: NaiveDate) -> Request {
        request(student, song, requested)
            .toggle_reimbursed(since, now())
            .toggle_delivered(since, now())
            .unwrap()
    }

    #[test]
    fn csv_import_coerces_and_counts() {
        let payload = "\
Student Name,Song Title,Artist,Date Requested,Archived Date,Score Link,Cost,Delivered,Reimbursed,Due Date,Notes
Alice  Smith,Song A,Band X,45292,,,12.50,No,No,,
,Song B,Band Y,2024-02-01,,,,Yes,No,,
ALICE   smith,song a,band x,2024-02-02,,,,No,No,,
Bob Jones,Song C,Band Z,bad date,,link.example,abc,yes,1,2024-04-01,rush order
";

        let (accepted, summary) = import(Format::Csv, payload, &[], today(), now());

        assert_eq!(
            summary,
            ImportSummary {
                added: 2,
                skipped_duplicates: 1,
                skipped_invalid: 1,
            }
        );
        assert_eq!(accepted.len(), 2);

        let alice = &accepted[0];
        assert_eq!(alice.student_name.as_str(), "Alice Smith");
        assert_eq!(alice.date_requested, ymd(2024, 1, 1));
        assert_eq!(alice.cost, Some(12.5));
        assert!(!alice.delivered());

        let bob = &accepted[1];
        // unparseable date falls back to the import day
        assert_eq!(bob.date_requested, today());
        assert_eq!(bob.cost, None);
        assert!(bob.delivered());
        assert!(bob.reimbursed());
        assert_eq!(bob.due_date, Some(ymd(2024, 4, 1)));
        assert_eq!(bob.notes, Some("rush order".to_string()));
    }

    #[test]
    fn import_skips_duplicates_of_existing_records() {
        let existing = vec![request("Alice Smith", "Song A", ymd(2024, 1, 1))];
        let payload = r#"[{"studentName":"alice   SMITH","songTitle":"song a","artist":"band x"}]"#;

        let (accepted, summary) = import(Format::Json, payload, &existing, today(), now());

        assert!(accepted.is_empty());
        assert_eq!(summary.skipped_duplicates, 1);
    }

    #[test]
    fn json_import_reads_spreadsheet_style_keys() {
        let payload = r#"[{
            "Student Name": "Cara Lee",
            "Song Title": "Song C",
            "Artist": "Band Z",
            "Date Requested": "2024-02-10",
            "Delivered": "Yes",
            "Reimbursed": "No"
        }]"#;

        let (accepted, summary) = import(Format::Json, payload, &[], today(), now());

        assert_eq!(summary.added, 1);
        assert_eq!(accepted[0].student_name.as_str(), "Cara Lee");
        assert_eq!(accepted[0].date_requested, ymd(2024, 2, 10));
        assert!(accepted[0].delivered());
    }

    #[test]
    fn import_backfills_missing_archive_date() {
        let payload = r#"[{
            "studentName": "Dana Fox",
            "songTitle": "Song D",
            "artist": "Band Q",
            "dateRequested": "2024-01-15",
            "delivered": true,
            "reimbursed": true
        }]"#;

        let (accepted, _) = import(Format::Json, payload, &[], today(), now());

        assert_eq!(accepted[0].archived_date(), Some(today()));
    }

    #[test]
    fn import_assigns_fresh_identities() {
        let payload = r#"[{
            "id": "12b3f5c5-b1a8-4aa8-a882-20ff1c2aab53",
            "studentName": "Eve Ng",
            "songTitle": "Song E",
            "artist": "Band R",
            "createdAt": "2020-01-01T00:00:00Z",
            "onlyDeliverableIfReimbursed": true
        }]"#;

        let (accepted, _) = import(Format::Json, payload, &[], today(), now());
        let record = &accepted[0];

        assert_ne!(
            record.id.to_string(),
            "12b3f5c5-b1a8-4aa8-a882-20ff1c2aab53"
        );
        assert_eq!(record.created_at, now());
        assert!(record.only_deliverable_if_reimbursed);
    }

    #[test]
    fn malformed_payloads_are_no_ops() {
        for payload in ["not json", "42", r#"{"version":1}"#, ""] {
            let (accepted, summary) = import(Format::Json, payload, &[], today(), now());
            assert!(accepted.is_empty(), "payload {payload:?}");
            assert_eq!(summary, ImportSummary::default(), "payload {payload:?}");
        }

        let (accepted, summary) = import(Format::Csv, "", &[], today(), now());
        assert!(accepted.is_empty());
        assert_eq!(summary, ImportSummary::default());
    }

    #[test]
    fn export_sorts_states_then_dates_then_names() {
        let requests = vec![
            archived("Gia Holt", "Song G", ymd(2024, 1, 3), ymd(2024, 2, 1)),
            request("Bob Jones", "Song B", ymd(2024, 1, 2)),
            archived("Hana Ito", "Song H", ymd(2024, 1, 4), ymd(2024, 2, 20)),
            request("Alice Smith", "Song A", ymd(2024, 1, 2)),
            request("Cara Lee", "Song C", ymd(2024, 1, 9)),
            request("Finn Ray", "Song F", ymd(2024, 1, 5))
                .toggle_delivered(today(), now())
                .unwrap(),
        ];

        let sorted = sorted_for_export(&requests);
        let students: Vec<&str> = sorted
            .iter()
            .map(|request| request.student_name.as_str())
            .collect();

        assert_eq!(
            students,
            [
                // pending, newest first, ties by name
                "Cara Lee",
                "Alice Smith",
                "Bob Jones",
                // delivered
                "Finn Ray",
                // archived, most recently archived first
                "Hana Ito",
                "Gia Holt",
            ]
        );
    }

    #[test]
    fn json_export_wraps_records_in_the_envelope() {
        let requests = vec![request("Alice Smith", "Song A", ymd(2024, 1, 2))];
        let payload = export(Format::Json, &requests, now()).unwrap();

        let parsed: Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(parsed["version"], 1);
        assert_eq!(parsed["exportedAt"], "2024-03-10T09:30:00Z");
        assert_eq!(parsed["requests"][0]["studentName"], "Alice Smith");
        assert_eq!(parsed["requests"][0]["delivered"], false);
    }

    #[test]
    fn csv_export_uses_yes_no_and_iso_dates() {
        let requests = vec![archived(
            "Alice Smith",
            "Song, The",
            ymd(2024, 1, 2),
            ymd(2024, 2, 1),
        )];
        let payload = export(Format::Csv, &requests, now()).unwrap();
        let mut lines = payload.lines();

        assert_eq!(
            lines.next().unwrap(),
            "Student Name,Song Title,Artist,Date Requested,Archived Date,Score Link,Cost,Delivered,Reimbursed,Due Date,Notes"
        );
        assert_eq!(
            lines.next().unwrap(),
            "Alice Smith,\"Song, The\",Band X,2024-01-02,2024-02-01,,,Yes,Yes,,"
        );
    }

    #[test]
    fn exported_csv_imports_back_losslessly_enough() {
        let requests = vec![
            archived("Alice Smith", "Song A", ymd(2024, 1, 2), ymd(2024, 2, 1)),
            request("Bob Jones", "Song B", ymd(2024, 1, 5)),
        ];
        let payload = export(Format::Csv, &requests, now()).unwrap();

        let (accepted, summary) = import(Format::Csv, &payload, &[], today(), now());

        assert_eq!(summary.added, 2);
        let alice = accepted
            .iter()
            .find(|request| request.student_name.as_str() == "Alice Smith")
            .unwrap();
        assert_eq!(alice.archived_date(), Some(ymd(2024, 2, 1)));
        assert!(alice.delivered());
    }

    #[test_case("backup.JSON", Format::Json)]
    #[test_case("export.json", Format::Json)]
    #[test_case("data.csv", Format::Csv)]
    #[test_case("notes.txt", Format::Csv)]
    #[test_case("plain", Format::Csv)]
    fn format_detection(name: &str, expected: Format) {
        assert_eq!(Format::from_path(Path::new(name)), expected);
    }

    #[test]
    fn default_file_names_are_dated() {
        assert_eq!(
            Format::Csv.default_file_name(today()),
            "music-requests-2024-03-10.csv"
        );
        assert_eq!(
            Format::Json.default_file_name(today()),
            "music-requests-2024-03-10.json"
        );
    }

    #[test]
    fn summary_renders_the_import_notice() {
        let summary = ImportSummary {
            added: 3,
            skipped_duplicates: 2,
            skipped_invalid: 1,
        };
        assert_eq!(
            summary.to_string(),
            "Imported 3 • Skipped 2 dupes • Skipped 1 invalid"
        );
    }
}
