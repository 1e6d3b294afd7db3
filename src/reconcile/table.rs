use serde_json::{Map, Value};

use crate::domain::Request;

/// The fixed export column set, in order.
pub(super) const HEADERS: [&str; 11] = [
    "Student Name",
    "Song Title",
    "Artist",
    "Date Requested",
    "Archived Date",
    "Score Link",
    "Cost",
    "Delivered",
    "Reimbursed",
    "Due Date",
    "Notes",
];

/// Parses a CSV payload into import rows keyed by header cell.
///
/// Returns `None` for an empty payload (the tabular analogue of a workbook
/// without a sheet). Missing cells become empty strings; blank lines are
/// skipped.
pub(super) fn rows(payload: &str) -> Option<Vec<Value>> {
    let payload = payload.strip_prefix('\u{feff}').unwrap_or(payload);
    let mut records = parse_records(payload)
        .into_iter()
        .filter(|record| record.iter().any(|field| !field.is_empty()));

    let header = records.next()?;

    let rows = records
        .map(|record| {
            let mut row = Map::new();
            for (i, name) in header.iter().enumerate() {
                let value = record.get(i).cloned().unwrap_or_default();
                row.insert(name.clone(), Value::String(value));
            }
            Value::Object(row)
        })
        .collect();

    Some(rows)
}

/// Renders records as a CSV document with the fixed header line.
pub(super) fn write(requests: &[&Request]) -> String {
    let mut lines = Vec::with_capacity(requests.len() + 1);
    lines.push(
        HEADERS
            .iter()
            .map(|header| escape(header))
            .collect::<Vec<_>>()
            .join(","),
    );

    for request in requests {
        let fields = [
            request.student_name.to_string(),
            request.song_title.to_string(),
            request.artist.to_string(),
            request.date_requested.to_string(),
            request
                .archived_date()
                .map_or_else(String::new, |date| date.to_string()),
            request.score_link.clone().unwrap_or_default(),
            request
                .cost
                .map_or_else(String::new, |cost| cost.to_string()),
            yes_no(request.delivered()).to_string(),
            yes_no(request.reimbursed()).to_string(),
            request
                .due_date
                .map_or_else(String::new, |date| date.to_string()),
            request.notes.clone().unwrap_or_default(),
        ];

        lines.push(
            fields
                .iter()
                .map(|field| escape(field))
                .collect::<Vec<_>>()
                .join(","),
        );
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

const fn yes_no(value: bool) -> &'static str {
    if value { "Yes" } else { "No" }
}

fn escape(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') || value.contains('\r') {
        let escaped = value.replace('"', "\"\"");
        format!("\"{escaped}\"")
    } else {
        value.to_string()
    }
}

fn parse_records(input: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
            continue;
        }

        match c {
            '"' => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' | '\n' => {
                if c == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                }
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            _ => field.push(c),
        }
    }

    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_quoted_fields_with_commas_and_newlines() {
        let records = parse_records("a,\"b, c\",\"line\nbreak\"\r\nd,\"says \"\"hi\"\"\",f\n");

        assert_eq!(
            records,
            vec![
                vec!["a", "b, c", "line\nbreak"],
                vec!["d", "says \"hi\"", "f"],
            ]
        );
    }

    #[test]
    fn escape_round_trips_awkward_fields() {
        let awkward = ["plain", "with, comma", "with \"quotes\"", "multi\nline"];
        let line = awkward
            .iter()
            .map(|field| escape(field))
            .collect::<Vec<_>>()
            .join(",");

        let records = parse_records(&line);
        assert_eq!(records, vec![awkward.to_vec()]);
    }

    #[test]
    fn rows_keys_cells_by_header() {
        let payload = "Student Name,Song Title,Artist\nAlice,Song A,Band X\nBob,Song B\n";
        let rows = rows(payload).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["Student Name"], "Alice");
        assert_eq!(rows[0]["Artist"], "Band X");
        // short records pad with empty cells
        assert_eq!(rows[1]["Artist"], "");
    }

    #[test]
    fn rows_skips_blank_lines_and_strips_bom() {
        let payload = "\u{feff}Student Name,Artist\n\nAlice,Band X\n,,\n";
        let rows = rows(payload).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["Student Name"], "Alice");
    }

    #[test]
    fn empty_payload_is_none() {
        assert!(rows("").is_none());
        assert!(rows("\n\n").is_none());
    }

    #[test]
    fn header_only_payload_yields_no_rows() {
        let parsed = rows("Student Name,Song Title,Artist\n").unwrap();
        assert!(parsed.is_empty());
    }
}
