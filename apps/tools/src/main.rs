use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use server_api::evaluator::evaluate_raw;
use storage::{HistoryStore, Storage};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "calc-tools", about = "Operator utilities for the calculator history")]
struct Cli {
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://./data/history.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate one operation without recording it.
    Eval {
        operation: String,
        #[arg(allow_hyphen_values = true)]
        a: String,
        #[arg(allow_hyphen_values = true)]
        b: String,
    },
    /// Print the stored history as JSON lines, oldest first.
    History {
        #[arg(long)]
        limit: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Eval { operation, a, b } => {
            let evaluation = evaluate_raw(&operation, Some(a.as_str()), Some(b.as_str()))?;
            println!("{}", evaluation.result);
        }
        Command::History { limit } => {
            let storage = Storage::new(&cli.database_url)
                .await
                .with_context(|| format!("failed to open '{}'", cli.database_url))?;
            let records = match limit {
                Some(limit) => storage.recent(limit).await?,
                None => storage.list().await?,
            };
            debug!(count = records.len(), "history loaded");

            let mut out = io::stdout().lock();
            for record in records {
                serde_json::to_writer(&mut out, &record)?;
                writeln!(out)?;
            }
        }
    }

    Ok(())
}
