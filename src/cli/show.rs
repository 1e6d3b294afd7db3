use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use encore::{Request, Status};
use tracing::instrument;

use super::{Workspace, resolve, terminal::Colorize};

#[derive(Debug, Parser)]
#[command(about = "Display every field of one request")]
pub struct Show {
    /// Request id, or a unique prefix of one
    id: String,

    /// Output format
    #[arg(long, value_name = "FORMAT", default_value = "pretty")]
    output: OutputFormat,
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Pretty,
    Json,
}

impl Show {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, data_dir: Option<PathBuf>) -> anyhow::Result<()> {
        let ws = Workspace::open(data_dir)?;
        let ledger = ws.ledger()?;

        let id = resolve(&ledger, &self.id)?;
        let request = ledger
            .get(id)
            .with_context(|| format!("no request with id {id}"))?;

        match self.output {
            OutputFormat::Pretty => output_pretty(request),
            OutputFormat::Json => {
                serde_json::to_writer_pretty(std::io::stdout(), request)?;
                println!();
            }
        }
        Ok(())
    }
}

fn output_pretty(request: &Request) {
    println!("# {}", request.id);
    println!(
        "'{}' by {} for {}",
        request.song_title.as_str(),
        request.artist.as_str(),
        request.student_name.as_str()
    );
    println!();

    println!("{}", "Status".dim());
    println!("  State:      {}", state_line(request.status()));
    println!("  Requested:  {}", request.date_requested);
    if let Some(due) = request.due_date {
        println!("  Due:        {due}");
    }
    if request.only_deliverable_if_reimbursed {
        println!("  Gated:      delivery waits for reimbursement");
    }

    if request.cost.is_some() || request.score_link.is_some() {
        println!();
        println!("{}", "Details".dim());
        if let Some(cost) = request.cost {
            println!("  Cost:       {cost:.2}");
        }
        if let Some(link) = &request.score_link {
            println!("  Score:      {link}");
        }
    }

    if let Some(notes) = &request.notes {
        println!();
        println!("{}", "Notes".dim());
        for line in notes.lines() {
            println!("  {line}");
        }
    }

    println!();
    println!("{}", "Metadata".dim());
    println!(
        "  Created:    {}",
        request.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!(
        "  Updated:    {}",
        request.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
}

fn state_line(status: Status) -> String {
    match status {
        Status::Pending { reimbursed: false } => "Pending".to_string(),
        Status::Pending { reimbursed: true } => "Pending (already reimbursed)".to_string(),
        Status::Delivered => "Delivered (awaiting reimbursement)".to_string(),
        Status::Archived { since } => format!("Archived since {since}"),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use encore::Draft;

    use super::*;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).unwrap()
    }

    #[test]
    fn state_lines_spell_out_the_lifecycle() {
        let draft = Draft {
            student_name: "Alice Smith".to_string(),
            song_title: "Song A".to_string(),
            artist: "Band X".to_string(),
            ..Draft::default()
        };
        let pending = Request::create(draft, date(2024, 1, 2), Utc::now()).unwrap();
        assert_eq!(state_line(pending.status()), "Pending");

        let delivered = pending.toggle_delivered(date(2024, 1, 3), Utc::now()).unwrap();
        assert_eq!(
            state_line(delivered.status()),
            "Delivered (awaiting reimbursement)"
        );

        let archived = delivered.toggle_reimbursed(date(2024, 1, 4), Utc::now());
        assert_eq!(state_line(archived.status()), "Archived since 2024-01-04");
    }
}
