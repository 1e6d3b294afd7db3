use std::{io::BufRead, path::PathBuf, process};

mod export;
mod import;
mod list;
mod show;
mod status;
mod terminal;

use anyhow::Context;
use chrono::{Local, NaiveDate, Utc};
use clap::ArgAction;
use encore::{
    Config, DataDir, Draft, Gateway, Ledger, Request, UndoEntry, UndoFile,
    domain::{EditError, InsertError, ResolveError},
    storage::{self, GatewayError},
};
use export::Export;
use import::Import;
use list::List;
use show::Show;
use status::Status;
use terminal::Colorize;
use tracing::instrument;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Debug, clap::Parser)]
#[command(version, about)]
pub struct Cli {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Directory holding the data files (defaults to the platform data directory)
    #[arg(long, value_name = "DIR", global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

impl Cli {
    /// Runs the selected subcommand, defaulting to `status`.
    ///
    /// # Errors
    ///
    /// Returns an error when the command fails.
    pub fn run(self) -> anyhow::Result<()> {
        setup_logging(self.verbose);

        self.command
            .unwrap_or_else(|| Command::Status(Status::default()))
            .run(self.data_dir)
    }
}

fn setup_logging(verbosity: u8) {
    let level = match verbosity {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_names(false)
        .with_line_number(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

#[derive(Debug, clap::Subcommand)]
enum Command {
    /// Summarize the collection (the default when no command is given)
    Status(Status),
    /// Create the data directory and a default settings file
    Init,
    /// Add a new request
    Add(Add),
    /// List requests, newest first
    List(List),
    /// Show every field of one request
    Show(Show),
    /// Toggle whether a request has been delivered
    Deliver(Deliver),
    /// Toggle whether a request has been reimbursed
    Reimburse(Reimburse),
    /// Change the fields of an existing request
    Edit(Edit),
    /// Set or clear the notes of a request
    Notes(Notes),
    /// Delete a request
    Delete(Delete),
    /// Revert the most recent change
    Undo,
    /// Import requests from a CSV or JSON file
    Import(Import),
    /// Export requests to a CSV or JSON file
    Export(Export),
    /// Inspect or change the settings
    Config(ConfigArgs),
}

impl Command {
    fn run(self, data_dir: Option<PathBuf>) -> anyhow::Result<()> {
        match self {
            Self::Status(command) => command.run(data_dir),
            Self::Init => init(data_dir),
            Self::Add(command) => command.run(data_dir),
            Self::List(command) => command.run(data_dir),
            Self::Show(command) => command.run(data_dir),
            Self::Deliver(command) => command.run(data_dir),
            Self::Reimburse(command) => command.run(data_dir),
            Self::Edit(command) => command.run(data_dir),
            Self::Notes(command) => command.run(data_dir),
            Self::Delete(command) => command.run(data_dir),
            Self::Undo => undo(data_dir),
            Self::Import(command) => command.run(data_dir),
            Self::Export(command) => command.run(data_dir),
            Self::Config(command) => command.run(data_dir),
        }
    }
}

/// The opened data directory's settings and stores.
struct Workspace {
    config: Config,
    store: Box<dyn Gateway>,
    undo: UndoFile,
}

impl Workspace {
    fn open(data_dir: Option<PathBuf>) -> anyhow::Result<Self> {
        let dir = DataDir::resolve(data_dir)?;
        let config = Config::load_or_default(&dir.config_file());
        let store = storage::open(&dir, &config);
        let undo = UndoFile::new(dir.undo_file());

        Ok(Self {
            config,
            store,
            undo,
        })
    }

    fn ledger(&self) -> anyhow::Result<Ledger> {
        let requests = self
            .store
            .load()
            .context("failed to load the request collection")?;
        Ok(Ledger::new(requests).with_undo(self.undo.load()))
    }

    /// Writes one changed record and the undo slot, warning on failure.
    fn persist_change(&self, ledger: &Ledger, record: &Request) {
        let outcome = self.store.upsert_one(record).and_then(|()| {
            self.undo
                .save(ledger.undo_entry())
                .map_err(GatewayError::from)
        });
        report_sync(outcome);
    }

    /// Removes one record and writes the undo slot, warning on failure.
    fn persist_removal(&self, ledger: &Ledger, id: Uuid) {
        let outcome = self.store.delete_one(id).and_then(|()| {
            self.undo
                .save(ledger.undo_entry())
                .map_err(GatewayError::from)
        });
        report_sync(outcome);
    }
}

/// Reports a failed durable write without failing the command.
///
/// The in-memory change already happened and its outcome has been decided,
/// so the command still exits cleanly.
fn report_sync(outcome: Result<(), GatewayError>) {
    if let Err(error) = outcome {
        let error = anyhow::Error::new(error);
        eprintln!(
            "{}",
            format!("Sync failed. Please try again. ({error:#})").warning()
        );
    }
}

/// Prints a rejection notice and exits with the rejected status code.
fn reject(message: &str) -> ! {
    eprintln!("{}", message.warning());
    process::exit(2);
}

fn resolve(ledger: &Ledger, prefix: &str) -> anyhow::Result<Uuid> {
    match ledger.resolve(prefix) {
        Ok(id) => Ok(id),
        Err(ResolveError::Ambiguous { prefix, matches }) => {
            eprintln!("Id '{prefix}' is ambiguous between:");
            for id in matches {
                eprintln!("  {id}");
            }
            process::exit(1);
        }
        Err(error) => Err(error.into()),
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn short(id: Uuid) -> String {
    id.to_string()[..8].to_string()
}

/// Add a new request.
#[derive(Debug, clap::Parser)]
struct Add {
    /// Student the request is for
    student: String,

    /// Requested song title
    song: String,

    /// Performing or composing artist
    artist: String,

    /// Date the request was made, YYYY-MM-DD (defaults to today)
    #[arg(long, value_name = "DATE")]
    requested: Option<NaiveDate>,

    /// Fulfilment deadline, YYYY-MM-DD
    #[arg(long, value_name = "DATE")]
    due: Option<NaiveDate>,

    /// Link to the score
    #[arg(long, value_name = "URL")]
    score_link: Option<String>,

    /// Cost of the score
    #[arg(long)]
    cost: Option<f64>,

    /// Hold delivery until the cost has been reimbursed
    #[arg(long)]
    gated: bool,

    /// Free-text notes
    #[arg(long)]
    notes: Option<String>,
}

impl Add {
    #[instrument]
    fn run(self, data_dir: Option<PathBuf>) -> anyhow::Result<()> {
        let ws = Workspace::open(data_dir)?;
        let mut ledger = ws.ledger()?;

        let draft = Draft {
            student_name: self.student,
            song_title: self.song,
            artist: self.artist,
            date_requested: self.requested,
            due_date: self.due,
            score_link: self.score_link,
            cost: self.cost,
            only_deliverable_if_reimbursed: self.gated,
            notes: self.notes,
        };

        let created = match ledger.insert(draft, today(), Utc::now()) {
            Ok(created) => created.clone(),
            Err(InsertError::Duplicate) => {
                reject("Skipped: duplicate request (same Student + Song + Artist)")
            }
            Err(InsertError::Draft(error)) => reject(&error.to_string()),
        };

        ws.persist_change(&ledger, &created);
        println!(
            "{}",
            format!(
                "✅ Added '{}' for {} ({})",
                created.song_title.as_str(),
                created.student_name.as_str(),
                short(created.id)
            )
            .success()
        );
        Ok(())
    }
}

/// Toggle whether a request has been delivered.
#[derive(Debug, clap::Parser)]
struct Deliver {
    /// Request id, or a unique prefix of one
    id: String,
}

impl Deliver {
    #[instrument]
    fn run(self, data_dir: Option<PathBuf>) -> anyhow::Result<()> {
        let ws = Workspace::open(data_dir)?;
        let mut ledger = ws.ledger()?;
        let id = resolve(&ledger, &self.id)?;

        let updated = match ledger.toggle_delivered(id, today(), Utc::now()) {
            Ok(updated) => updated.clone(),
            Err(EditError::Blocked(_)) => reject("Reimburse first before marking delivered."),
            Err(error) => return Err(error.into()),
        };

        ws.persist_change(&ledger, &updated);
        let message = if updated.delivered() {
            "Marked delivered".success()
        } else {
            "Marked pending".info()
        };
        println!("{message}");
        Ok(())
    }
}

/// Toggle whether a request has been reimbursed.
#[derive(Debug, clap::Parser)]
struct Reimburse {
    /// Request id, or a unique prefix of one
    id: String,
}

impl Reimburse {
    #[instrument]
    fn run(self, data_dir: Option<PathBuf>) -> anyhow::Result<()> {
        let ws = Workspace::open(data_dir)?;
        let mut ledger = ws.ledger()?;
        let id = resolve(&ledger, &self.id)?;

        let was_delivered = ledger.get(id).is_some_and(Request::delivered);
        let updated = ledger.toggle_reimbursed(id, today(), Utc::now())?.clone();

        ws.persist_change(&ledger, &updated);
        let message = if updated.reimbursed() {
            "Marked reimbursed".success()
        } else if was_delivered && !updated.delivered() {
            "Marked unreimbursed and pending".info()
        } else {
            "Marked unreimbursed".info()
        };
        println!("{message}");
        Ok(())
    }
}

/// Change the fields of an existing request.
#[derive(Debug, clap::Parser)]
struct Edit {
    /// Request id, or a unique prefix of one
    id: String,

    /// New student name
    #[arg(long)]
    student: Option<String>,

    /// New song title
    #[arg(long)]
    song: Option<String>,

    /// New artist
    #[arg(long)]
    artist: Option<String>,

    /// New request date, YYYY-MM-DD
    #[arg(long, value_name = "DATE")]
    requested: Option<NaiveDate>,

    /// New fulfilment deadline, YYYY-MM-DD
    #[arg(long, value_name = "DATE", conflicts_with = "clear_due")]
    due: Option<NaiveDate>,

    /// Remove the deadline
    #[arg(long)]
    clear_due: bool,

    /// New score link
    #[arg(long, value_name = "URL", conflicts_with = "clear_score_link")]
    score_link: Option<String>,

    /// Remove the score link
    #[arg(long)]
    clear_score_link: bool,

    /// New cost
    #[arg(long, conflicts_with = "clear_cost")]
    cost: Option<f64>,

    /// Remove the cost
    #[arg(long)]
    clear_cost: bool,

    /// Whether delivery waits for reimbursement
    #[arg(long, value_name = "BOOL")]
    gated: Option<bool>,
}

impl Edit {
    #[instrument]
    fn run(self, data_dir: Option<PathBuf>) -> anyhow::Result<()> {
        let ws = Workspace::open(data_dir)?;
        let mut ledger = ws.ledger()?;
        let id = resolve(&ledger, &self.id)?;

        let mut draft = ledger
            .get(id)
            .with_context(|| format!("no request with id {id}"))?
            .to_draft();
        if let Some(student) = self.student {
            draft.student_name = student;
        }
        if let Some(song) = self.song {
            draft.song_title = song;
        }
        if let Some(artist) = self.artist {
            draft.artist = artist;
        }
        if let Some(requested) = self.requested {
            draft.date_requested = Some(requested);
        }
        if self.clear_due {
            draft.due_date = None;
        } else if let Some(due) = self.due {
            draft.due_date = Some(due);
        }
        if self.clear_score_link {
            draft.score_link = None;
        } else if let Some(link) = self.score_link {
            draft.score_link = Some(link);
        }
        if self.clear_cost {
            draft.cost = None;
        } else if let Some(cost) = self.cost {
            draft.cost = Some(cost);
        }
        if let Some(gated) = self.gated {
            draft.only_deliverable_if_reimbursed = gated;
        }

        let updated = match ledger.edit(id, draft, Utc::now()) {
            Ok(updated) => updated.clone(),
            Err(EditError::Duplicate) => {
                reject("Skipped: duplicate request (same Student + Song + Artist)")
            }
            Err(EditError::Draft(error)) => reject(&error.to_string()),
            Err(error) => return Err(error.into()),
        };

        ws.persist_change(&ledger, &updated);
        println!(
            "{}",
            format!(
                "✅ Updated '{}' for {}",
                updated.song_title.as_str(),
                updated.student_name.as_str()
            )
            .success()
        );
        Ok(())
    }
}

/// Set or clear the notes of a request.
#[derive(Debug, clap::Parser)]
struct Notes {
    /// Request id, or a unique prefix of one
    id: String,

    /// The new notes (omit to clear them)
    text: Option<String>,
}

impl Notes {
    #[instrument]
    fn run(self, data_dir: Option<PathBuf>) -> anyhow::Result<()> {
        let ws = Workspace::open(data_dir)?;
        let mut ledger = ws.ledger()?;
        let id = resolve(&ledger, &self.id)?;

        let updated = ledger
            .set_notes(id, self.text.as_deref(), Utc::now())?
            .clone();

        ws.persist_change(&ledger, &updated);
        let message = if updated.notes.is_some() {
            "✅ Notes updated"
        } else {
            "✅ Notes cleared"
        };
        println!("{}", message.success());
        Ok(())
    }
}

/// Delete a request.
#[derive(Debug, clap::Parser)]
struct Delete {
    /// Request id, or a unique prefix of one
    id: String,

    /// Skip the confirmation prompt
    #[arg(long)]
    yes: bool,
}

impl Delete {
    #[instrument]
    fn run(self, data_dir: Option<PathBuf>) -> anyhow::Result<()> {
        let ws = Workspace::open(data_dir)?;
        let mut ledger = ws.ledger()?;
        let id = resolve(&ledger, &self.id)?;

        if !self.yes {
            if let Some(request) = ledger.get(id) {
                println!(
                    "Will delete '{}' for {} ({})",
                    request.song_title.as_str(),
                    request.student_name.as_str(),
                    short(id)
                );
            }
            eprint!("\nProceed? (y/N) ");
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line)?;
            if !line.trim().eq_ignore_ascii_case("y") {
                println!("Cancelled");
                process::exit(130);
            }
        }

        ledger.remove(id)?;
        ws.persist_removal(&ledger, id);
        println!("{}", "Request deleted".success());
        println!("{}", "Undo with 'enc undo'.".dim());
        Ok(())
    }
}

#[instrument]
fn init(data_dir: Option<PathBuf>) -> anyhow::Result<()> {
    let dir = DataDir::resolve(data_dir)?;
    let config_file = dir.config_file();
    if config_file.exists() {
        anyhow::bail!("Already initialized (found {})", config_file.display());
    }

    dir.ensure_exists()
        .with_context(|| format!("failed to create {}", dir.path().display()))?;
    Config::default().save(&config_file)?;

    println!("Initialized request tracker in {}", dir.path().display());
    println!("  Created: config.toml");
    println!();
    println!("Next steps:");
    println!("  enc add \"Student Name\" \"Song Title\" \"Artist\"");
    println!("  enc import existing-export.csv");
    Ok(())
}

#[instrument]
fn undo(data_dir: Option<PathBuf>) -> anyhow::Result<()> {
    let ws = Workspace::open(data_dir)?;
    let mut ledger = ws.ledger()?;

    let reinserting = matches!(ledger.undo_entry(), Some(UndoEntry::Reinsert { .. }));
    let Some(restored) = ledger.apply_undo(Utc::now()) else {
        println!("Nothing to undo.");
        return Ok(());
    };

    // A reinsert changes list positions, so the whole ordered collection is
    // rewritten; a revert only touches the one record.
    let written = if reinserting {
        ws.store.replace_all(ledger.requests())
    } else {
        ws.store.upsert_one(&restored)
    };
    report_sync(written.and_then(|()| {
        ws.undo
            .save(ledger.undo_entry())
            .map_err(GatewayError::from)
    }));

    let verb = if reinserting { "Restored" } else { "Reverted" };
    println!(
        "{}",
        format!(
            "✅ {verb} '{}' for {}",
            restored.song_title.as_str(),
            restored.student_name.as_str()
        )
        .success()
    );
    Ok(())
}

/// Inspect or change the settings.
#[derive(Debug, clap::Parser)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommand,
}

#[derive(Debug, clap::Subcommand)]
enum ConfigCommand {
    /// Print the active settings
    Show,
    /// Change one setting
    Set {
        /// Setting name (show_archived, remote.base_url, remote.api_key, remote.user_id)
        key: String,

        /// New value
        value: String,
    },
}

impl ConfigArgs {
    #[instrument]
    fn run(self, data_dir: Option<PathBuf>) -> anyhow::Result<()> {
        let dir = DataDir::resolve(data_dir)?;
        let mut config = Config::load_or_default(&dir.config_file());

        match self.command {
            ConfigCommand::Show => {
                println!("Configuration:");
                println!("  show_archived: {}", config.show_archived);
                match &config.remote {
                    None => println!("  remote: (not configured)"),
                    Some(remote) => {
                        println!("  remote.base_url: {}", or_unset(&remote.base_url));
                        let api_key = if remote.api_key.trim().is_empty() {
                            "(not set)"
                        } else {
                            "(set)"
                        };
                        println!("  remote.api_key: {api_key}");
                        println!("  remote.user_id: {}", or_unset(&remote.user_id));
                    }
                }
            }
            ConfigCommand::Set { key, value } => {
                config.set(&key, &value)?;
                dir.ensure_exists()
                    .with_context(|| format!("failed to create {}", dir.path().display()))?;
                config.save(&dir.config_file())?;
                println!("{}", format!("✅ Set {key}").success());
            }
        }
        Ok(())
    }
}

fn or_unset(value: &str) -> &str {
    if value.trim().is_empty() {
        "(not set)"
    } else {
        value
    }
}
