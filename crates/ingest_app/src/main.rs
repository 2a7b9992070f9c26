//! `ingest` - stage spreadsheets, submit them as ingestion jobs and follow
//! the jobs to completion.

mod commands;
mod config;
mod ledger;
mod watch;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use ingest_logging::{ingest_error, LogDestination};
use log::LevelFilter;

use crate::config::{IngestConfig, Overrides};

#[derive(Parser)]
#[command(name = "ingest")]
#[command(about = "Bulk-load surveillance spreadsheets into the dashboard backend", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./ingest.ron when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Base URL of the ingestion API
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Milliseconds between status requests
    #[arg(long, global = true)]
    interval_ms: Option<u64>,

    /// Column every accepted sheet must contain (repeatable)
    #[arg(long = "require", value_name = "COLUMN", global = true)]
    required_columns: Vec<String>,

    /// Also write the log to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Keep log output off the terminal (a --log-file still receives it)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the sheets of a document that pass the column contract
    Inspect {
        file: PathBuf,
    },
    /// Submit one sheet of a document and follow the resulting job
    Submit {
        file: PathBuf,
        /// Sheet to submit (defaults to the first accepted sheet)
        #[arg(long)]
        sheet: Option<String>,
        /// Print the job id and exit without watching
        #[arg(long)]
        detach: bool,
    },
    /// Follow an existing job until it finishes
    Watch {
        job_id: String,
    },
    /// Ask the server to cancel a job
    Cancel {
        job_id: String,
    },
    /// List jobs submitted from this directory
    History,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli);

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            ingest_error!("{:#}", err);
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let working_dir = std::env::current_dir().context("cannot determine working directory")?;
    let mut config = IngestConfig::load(cli.config.as_deref(), &working_dir)?;
    config.apply(Overrides {
        base_url: cli.base_url,
        interval_ms: cli.interval_ms,
        required_columns: cli.required_columns,
    });

    match cli.command {
        Command::Inspect { file } => commands::inspect(&config, &file),
        Command::Submit {
            file,
            sheet,
            detach,
        } => commands::submit_file(&config, &file, sheet.as_deref(), detach).await,
        Command::Watch { job_id } => commands::watch(&config, &job_id).await,
        Command::Cancel { job_id } => commands::cancel(&config, &job_id).await,
        Command::History => commands::history(&config),
    }
}

fn init_logging(cli: &Cli) {
    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    if let Some(destination) = log_destination(cli.log_file.as_deref(), cli.quiet) {
        ingest_logging::initialize(destination, level);
    }
}

/// `None` when logging is switched off entirely.
fn log_destination(log_file: Option<&Path>, quiet: bool) -> Option<LogDestination> {
    match (log_file, quiet) {
        (Some(path), true) => Some(LogDestination::File(path.to_path_buf())),
        (Some(path), false) => Some(LogDestination::Both(path.to_path_buf())),
        (None, true) => None,
        (None, false) => Some(LogDestination::Terminal),
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};

    use ingest_logging::LogDestination;

    use super::log_destination;

    #[test]
    fn quiet_flag_keeps_logs_off_the_terminal() {
        let file = Path::new("ingest.log");
        assert_eq!(
            log_destination(Some(file), true),
            Some(LogDestination::File(PathBuf::from("ingest.log")))
        );
        assert_eq!(
            log_destination(Some(file), false),
            Some(LogDestination::Both(PathBuf::from("ingest.log")))
        );
        assert_eq!(log_destination(None, false), Some(LogDestination::Terminal));
        assert_eq!(log_destination(None, true), None);
    }
}
