use std::path::PathBuf;

use anyhow::Result;
use bulletin_common::Config;
use bulletin_diff::ValidationPolicy;
use bulletin_store::StoreFile;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use bulletin_cli::commands::{self, SchemaKind};

#[derive(Parser)]
#[command(name = "bulletin", about = "Parish bulletin event catalog")]
struct Cli {
    /// Store document (overrides BULLETIN_STORE_PATH)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download new bulletins for every source (or the named ones)
    Scrape {
        #[arg(long = "source")]
        sources: Vec<String>,
        /// Processing date, YYYY-MM-DD (defaults to today)
        #[arg(long)]
        today: Option<NaiveDate>,
    },
    /// Extract candidate events from recorded bulletins into the staged file
    Process {
        /// Output file (overrides BULLETIN_STAGED_PATH)
        #[arg(long)]
        staged: Option<PathBuf>,
    },
    /// Check a proposed diff against the store without changing anything
    Validate {
        #[arg(long)]
        diff: PathBuf,
    },
    /// Validate a proposed diff and apply it to the store
    Enact {
        #[arg(long)]
        diff: PathBuf,
        /// Processing date for expiry, YYYY-MM-DD (defaults to today)
        #[arg(long)]
        today: Option<NaiveDate>,
        /// Print the summary without writing the store
        #[arg(long)]
        dry_run: bool,
    },
    /// Load the store, verify its invariants and print a summary
    Check,
    /// Print the JSON Schema handed to upstream collaborators
    Schema {
        #[arg(value_enum)]
        kind: SchemaKind,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("bulletin=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    config.log_redacted();

    let store_file = StoreFile::new(cli.store.unwrap_or_else(|| config.store_path.clone()));
    let policy = ValidationPolicy {
        allow_cancel_in_update: config.allow_cancel_in_update,
    };
    let local_today = || chrono::Local::now().date_naive();

    match cli.command {
        Command::Scrape { sources, today } => {
            let sources = commands::select_sources(&sources)?;
            let stats =
                commands::scrape(&config, &store_file, &sources, today.unwrap_or_else(local_today))
                    .await?;
            println!("{stats}");
        }
        Command::Process { staged } => {
            let staged = staged.unwrap_or_else(|| config.staged_path.clone());
            let stats = commands::process(&config, &store_file, &staged).await?;
            println!("{stats}");
        }
        Command::Validate { diff } => {
            let (_, validated) = commands::validate(&store_file, &diff, policy)?;
            println!(
                "Diff OK: {} add, {} cancel, {} update, {} remove",
                validated.additions().len(),
                validated.cancellations().len(),
                validated.updates().len(),
                validated.removals().len()
            );
        }
        Command::Enact {
            diff,
            today,
            dry_run,
        } => {
            let summary = commands::enact(
                &store_file,
                &diff,
                policy,
                today.unwrap_or_else(local_today),
                dry_run,
            )?;
            println!("{summary}");
        }
        Command::Check => {
            println!("{}", commands::check(&store_file)?);
        }
        Command::Schema { kind } => {
            println!("{}", commands::schema(kind)?);
        }
    }

    Ok(())
}
