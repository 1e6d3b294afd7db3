use std::{path::PathBuf, str::FromStr};

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use encore::{Format, reconcile};
use tracing::instrument;

use super::{Workspace, terminal::Colorize, today};

#[derive(Debug, Parser)]
#[command(about = "Export requests to a CSV or JSON file")]
pub struct Export {
    /// Destination file (defaults to a dated name in the working directory)
    file: Option<PathBuf>,

    /// Output format (defaults to the file extension, or csv)
    #[arg(long, value_name = "FORMAT", value_parser = Format::from_str)]
    format: Option<Format>,
}

impl Export {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, data_dir: Option<PathBuf>) -> anyhow::Result<()> {
        let ws = Workspace::open(data_dir)?;
        let ledger = ws.ledger()?;

        let format = self
            .format
            .unwrap_or_else(|| self.file.as_deref().map_or(Format::Csv, Format::from_path));
        let file = self
            .file
            .unwrap_or_else(|| PathBuf::from(format.default_file_name(today())));

        let payload = reconcile::export(format, ledger.requests(), Utc::now())
            .context("failed to encode the export")?;
        std::fs::write(&file, payload)
            .with_context(|| format!("failed to write {}", file.display()))?;

        println!(
            "{}",
            format!("✅ Exported {} request(s) to {}", ledger.len(), file.display()).success()
        );
        Ok(())
    }
}
