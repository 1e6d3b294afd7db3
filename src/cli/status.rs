use std::path::PathBuf;

use clap::Parser;
use encore::{Ledger, Status as Lifecycle};
use tracing::instrument;

use super::{Workspace, terminal::Colorize};

#[derive(Debug, Parser, Default)]
#[command(about = "Show request counts and the total awaiting reimbursement")]
pub struct Status {
    /// Output format (table, json)
    #[arg(long, value_name = "FORMAT", default_value = "table")]
    output: OutputFormat,

    /// Suppress headers and format for scripting
    #[arg(long)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Table,
    Json,
}

impl Status {
    #[instrument(level = "debug", skip(self))]
    pub fn run(self, data_dir: Option<PathBuf>) -> anyhow::Result<()> {
        let ws = Workspace::open(data_dir)?;
        let ledger = ws.ledger()?;
        let report = Report::tally(&ledger);

        if report.total == 0 {
            println!("No requests found yet. Create one with 'enc add'.");
            return Ok(());
        }

        match self.output {
            OutputFormat::Json => report.output_json()?,
            OutputFormat::Table => {
                if self.quiet {
                    report.output_quiet();
                } else {
                    report.output_table();
                }
            }
        }

        Ok(())
    }
}

#[derive(Debug, Default)]
struct Report {
    pending: usize,
    delivered: usize,
    archived: usize,
    total: usize,
    awaiting: f64,
}

impl Report {
    fn tally(ledger: &Ledger) -> Self {
        let mut report = Self::default();

        for request in ledger.requests() {
            report.total += 1;
            match request.status() {
                Lifecycle::Pending { .. } => report.pending += 1,
                Lifecycle::Delivered => report.delivered += 1,
                Lifecycle::Archived { .. } => report.archived += 1,
            }
            if !request.reimbursed() {
                report.awaiting += request.cost.unwrap_or(0.0);
            }
        }

        report
    }

    fn output_json(&self) -> anyhow::Result<()> {
        use serde_json::json;

        let output = json!({
            "pending": self.pending,
            "delivered": self.delivered,
            "archived": self.archived,
            "total": self.total,
            "awaitingReimbursement": self.awaiting,
        });

        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    }

    fn output_quiet(&self) {
        println!(
            "total={} pending={} delivered={} archived={} awaiting={:.2}",
            self.total, self.pending, self.delivered, self.archived, self.awaiting
        );
    }

    fn output_table(&self) {
        println!("Request counts");
        println!("{}", "──────────────".dim());
        println!("{:<10} Count", "State");
        println!("{:<10} {}", "Pending", self.pending);
        println!("{:<10} {}", "Delivered", self.delivered);
        println!("{:<10} {}", "Archived", self.archived);
        println!("Total      {}", self.total);

        println!();

        if self.awaiting > 0.0 {
            println!(
                "Awaiting reimbursement: {} ⚠️",
                format!("{:.2}", self.awaiting).warning()
            );
        } else {
            println!("Awaiting reimbursement: {} ✅", "0.00".success());
        }
    }
}
