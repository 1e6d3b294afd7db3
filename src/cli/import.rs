use std::{path::PathBuf, str::FromStr};

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use encore::{Format, reconcile, storage::GatewayError};
use tracing::instrument;

use super::{Workspace, report_sync, today};

#[derive(Debug, Parser)]
#[command(about = "Import requests from a CSV or JSON file")]
pub struct Import {
    /// The file to read
    file: PathBuf,

    /// Source format (defaults to the file extension)
    #[arg(long, value_name = "FORMAT", value_parser = Format::from_str)]
    format: Option<Format>,
}

impl Import {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, data_dir: Option<PathBuf>) -> anyhow::Result<()> {
        let ws = Workspace::open(data_dir)?;
        let mut ledger = ws.ledger()?;

        let payload = std::fs::read_to_string(&self.file)
            .with_context(|| format!("failed to read {}", self.file.display()))?;
        let format = self.format.unwrap_or_else(|| Format::from_path(&self.file));

        let (accepted, summary) =
            reconcile::import(format, &payload, ledger.requests(), today(), Utc::now());

        let count = accepted.len();
        if count > 0 {
            ledger.prepend_imported(accepted);
            let outcome = ws
                .store
                .upsert_many(&ledger.requests()[..count])
                .and_then(|()| {
                    ws.undo
                        .save(ledger.undo_entry())
                        .map_err(GatewayError::from)
                });
            report_sync(outcome);
        }

        println!("{summary}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use encore::LocalStore;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn importing_a_table_persists_the_accepted_rows() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("requests.csv");
        fs::write(
            &source,
            "Student Name,Song Title,Artist\n\
             Alice Smith,Song A,Band X\n\
             Alice Smith,Song A,Band X\n\
             ,Song B,Band Y\n",
        )
        .unwrap();

        Import {
            file: source,
            format: None,
        }
        .run(Some(temp.path().to_path_buf()))
        .unwrap();

        let stored = LocalStore::new(temp.path().join("requests.json"))
            .load()
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].student_name.as_str(), "Alice Smith");
    }

    #[test]
    fn an_explicit_format_beats_the_file_extension() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("export.csv");
        fs::write(
            &source,
            r#"[{"studentName": "Bob Jones", "songTitle": "Song B", "artist": "Band Y"}]"#,
        )
        .unwrap();

        Import {
            file: source,
            format: Some(Format::Json),
        }
        .run(Some(temp.path().to_path_buf()))
        .unwrap();

        let stored = LocalStore::new(temp.path().join("requests.json"))
            .load()
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].student_name.as_str(), "Bob Jones");
    }
}
