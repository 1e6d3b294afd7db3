use std::path::PathBuf;

use chrono::Datelike;
use clap::{Parser, ValueEnum};
use encore::{Request, Status};
use tracing::instrument;

use super::{Workspace, short, terminal};

/// Command arguments for `enc list`.
#[derive(Debug, Parser)]
#[command(about = "List requests with filters")]
pub struct List {
    /// Only requests made in this year.
    #[arg(long)]
    year: Option<i32>,

    /// Only requests made in this month (1-12).
    #[arg(long, requires = "year", value_parser = clap::value_parser!(u32).range(1..=12))]
    month: Option<u32>,

    /// Only requests whose student, song, or artist contains this text.
    #[arg(long, value_name = "TEXT")]
    search: Option<String>,

    /// Only requests in this lifecycle state.
    #[arg(long, value_enum, value_name = "STATE")]
    status: Option<StateFilter>,

    /// Include archived requests, whatever the settings say.
    #[arg(long, overrides_with = "no_archived")]
    archived: bool,

    /// Hide archived requests, whatever the settings say.
    #[arg(long, overrides_with = "archived")]
    no_archived: bool,

    /// Output format (table, json).
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    output: OutputFormat,

    /// Suppress headers and format rows for scripting.
    #[arg(long)]
    quiet: bool,
}

/// Lifecycle states a listing can be narrowed to.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum StateFilter {
    Pending,
    Delivered,
    Archived,
}

impl StateFilter {
    fn matches(self, status: Status) -> bool {
        matches!(
            (self, status),
            (Self::Pending, Status::Pending { .. })
                | (Self::Delivered, Status::Delivered)
                | (Self::Archived, Status::Archived { .. })
        )
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    #[default]
    Table,
    Json,
}

impl List {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, data_dir: Option<PathBuf>) -> anyhow::Result<()> {
        let ws = Workspace::open(data_dir)?;
        let ledger = ws.ledger()?;

        let include_archived = self.include_archived(ws.config.show_archived);
        let rows: Vec<&Request> = ledger
            .requests()
            .iter()
            .filter(|request| self.keeps(request, include_archived))
            .collect();

        if self.quiet {
            for request in &rows {
                println!(
                    "{}\t{}\t{}\t{}\t{}\t{}",
                    request.id,
                    request.student_name.as_str(),
                    request.song_title.as_str(),
                    request.artist.as_str(),
                    request.date_requested,
                    request.status().label()
                );
            }
            return Ok(());
        }

        match self.output {
            OutputFormat::Json => render_json(&rows)?,
            OutputFormat::Table => render_table(&rows, ledger.is_empty()),
        }
        Ok(())
    }

    fn include_archived(&self, configured: bool) -> bool {
        if self.archived {
            true
        } else if self.no_archived {
            false
        } else {
            // Filtering for the archived state implies wanting to see it.
            configured || self.status == Some(StateFilter::Archived)
        }
    }

    fn keeps(&self, request: &Request, include_archived: bool) -> bool {
        if !include_archived && matches!(request.status(), Status::Archived { .. }) {
            return false;
        }
        if let Some(year) = self.year {
            if request.date_requested.year() != year {
                return false;
            }
        }
        if let Some(month) = self.month {
            if request.date_requested.month() != month {
                return false;
            }
        }
        if let Some(state) = self.status {
            if !state.matches(request.status()) {
                return false;
            }
        }
        if let Some(search) = &self.search {
            let needle = search.to_lowercase();
            let found = [
                request.student_name.as_str(),
                request.song_title.as_str(),
                request.artist.as_str(),
            ]
            .iter()
            .any(|field| field.to_lowercase().contains(&needle));
            if !found {
                return false;
            }
        }
        true
    }
}

const HEADERS: [&str; 7] = ["Id", "Student", "Song", "Artist", "Requested", "Due", "Status"];

fn render_table(rows: &[&Request], collection_is_empty: bool) {
    if rows.is_empty() {
        if collection_is_empty {
            println!("No requests found yet. Create one with 'enc add'.");
        } else {
            println!("No requests match the filters.");
        }
        return;
    }

    let clip = if terminal::is_narrow() { 24 } else { 40 };
    let data: Vec<[String; 7]> = rows.iter().map(|request| cells(request, clip)).collect();

    let widths: Vec<usize> = HEADERS
        .iter()
        .enumerate()
        .map(|(column, header)| {
            data.iter()
                .map(|row| row[column].chars().count())
                .max()
                .unwrap_or(0)
                .max(header.len())
        })
        .collect();

    for (header, &width) in HEADERS.iter().zip(&widths) {
        print!("{header:<width$}  ");
    }
    println!();
    for &width in &widths {
        print!("{:-<width$}  ", "");
    }
    println!();

    for row in &data {
        for (cell, &width) in row.iter().zip(&widths) {
            print!("{cell:<width$}  ");
        }
        println!();
    }
}

fn cells(request: &Request, clip: usize) -> [String; 7] {
    [
        short(request.id),
        clipped(request.student_name.as_str(), clip),
        clipped(request.song_title.as_str(), clip),
        clipped(request.artist.as_str(), clip),
        request.date_requested.to_string(),
        request
            .due_date
            .map_or_else(String::new, |due| due.to_string()),
        state_cell(request.status()),
    ]
}

fn state_cell(status: Status) -> String {
    match status {
        Status::Pending { reimbursed: true } => "Pending (reimbursed)".to_string(),
        Status::Pending { reimbursed: false } => "Pending".to_string(),
        Status::Delivered => "Delivered".to_string(),
        Status::Archived { since } => format!("Archived {since}"),
    }
}

fn clipped(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }

    let kept: String = text.chars().take(limit.saturating_sub(1)).collect();
    format!("{kept}…")
}

fn render_json(rows: &[&Request]) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(std::io::stdout(), rows)?;
    println!();
    Ok(())
}
