//! One function per `ingest` subcommand. Each returns the process exit code.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context};
use ingest_core::{JobStatus, StagingSession, StopReason, TrackerView};
use ingest_engine::{stage, submit, HttpJobApi, JobApi, JobTracker, SourceDocument};
use ingest_logging::ingest_warn;

use crate::config::IngestConfig;
use crate::ledger::{Ledger, LedgerEntry};
use crate::watch::{watch_job, WatchOutcome};

/// Exit code for a job that ended failed or cancelled.
const EXIT_JOB_UNSUCCESSFUL: u8 = 2;
/// Exit code after the user abandoned a watch with a second Ctrl-C.
const EXIT_INTERRUPTED: u8 = 130;

pub fn inspect(config: &IngestConfig, file: &Path) -> anyhow::Result<ExitCode> {
    let (_, session) = stage_file(config, file)?;
    print_session(&session);
    Ok(match session.validation_error() {
        Some(_) => ExitCode::FAILURE,
        None => ExitCode::SUCCESS,
    })
}

pub async fn submit_file(
    config: &IngestConfig,
    file: &Path,
    sheet: Option<&str>,
    detach: bool,
) -> anyhow::Result<ExitCode> {
    let (document, mut session) = stage_file(config, file)?;
    if let Some(message) = session.validation_error() {
        bail!("{message}");
    }
    if let Some(sheet) = sheet {
        if !session.select(sheet) {
            bail!(
                "sheet {sheet:?} is not available; choose one of: {}",
                session.table_names().join(", ")
            );
        }
    }
    let table = session
        .selected_table()
        .context("no sheet selected for submission")?;

    let api = http_api(config)?;
    let job_id = submit(api.as_ref(), &document, table)
        .await
        .map_err(|err| anyhow::anyhow!(err.message()))
        .with_context(|| format!("submission of {} / {} failed", document.name, table.name))?;
    println!("Submitted {} / {} as job {job_id}", document.name, table.name);

    let mut ledger = Ledger::load(&config.ledger_path);
    ledger.record(LedgerEntry::submitted_now(
        job_id.clone(),
        document.name.clone(),
        table.name.clone(),
    ));
    save_ledger(&ledger);

    if detach {
        return Ok(ExitCode::SUCCESS);
    }
    track(config, api, &job_id).await
}

pub async fn watch(config: &IngestConfig, job_id: &str) -> anyhow::Result<ExitCode> {
    let api = http_api(config)?;
    track(config, api, job_id).await
}

pub async fn cancel(config: &IngestConfig, job_id: &str) -> anyhow::Result<ExitCode> {
    let api = http_api(config)?;
    api.cancel_job(job_id)
        .await
        .with_context(|| format!("cannot cancel job {job_id}"))?;
    println!("Cancellation requested for job {job_id}");
    Ok(ExitCode::SUCCESS)
}

pub fn history(config: &IngestConfig) -> anyhow::Result<ExitCode> {
    let ledger = Ledger::load(&config.ledger_path);
    if ledger.entries().is_empty() {
        println!("No jobs recorded in {}", ledger.path().display());
        return Ok(ExitCode::SUCCESS);
    }
    for entry in ledger.entries() {
        println!(
            "{}  {:<12} {:<24} {} / {}",
            entry.submitted_at.format("%Y-%m-%d %H:%M:%S"),
            entry.last_status.as_deref().unwrap_or("unknown"),
            entry.job_id,
            entry.source_file,
            entry.sheet
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn stage_file(
    config: &IngestConfig,
    file: &Path,
) -> anyhow::Result<(SourceDocument, StagingSession)> {
    let document = SourceDocument::from_path(file)
        .with_context(|| format!("cannot read {}", file.display()))?;
    let session = stage(&document, &config.staging_settings())?;
    Ok((document, session))
}

fn http_api(config: &IngestConfig) -> anyhow::Result<Arc<dyn JobApi>> {
    let api = HttpJobApi::new(config.api_settings()).context("invalid API settings")?;
    Ok(Arc::new(api))
}

async fn track(
    config: &IngestConfig,
    api: Arc<dyn JobApi>,
    job_id: &str,
) -> anyhow::Result<ExitCode> {
    let tracker = JobTracker::spawn(api, config.poll_settings());
    let view = match watch_job(&tracker, job_id).await? {
        WatchOutcome::Stopped(view) => view,
        WatchOutcome::Abandoned => return Ok(ExitCode::from(EXIT_INTERRUPTED)),
    };

    if let Some(job) = &view.latest_job {
        let mut ledger = Ledger::load(&config.ledger_path);
        if ledger.update_status(job_id, job.status) {
            save_ledger(&ledger);
        }
    }
    report(&view, job_id)
}

fn report(view: &TrackerView, job_id: &str) -> anyhow::Result<ExitCode> {
    match &view.stop_reason {
        Some(StopReason::Terminal(JobStatus::Completed)) => {
            let job = view.latest_job.as_ref();
            if let Some(duration) = job.and_then(|job| job.duration_seconds) {
                println!("Job {job_id} completed in {duration:.1}s");
            } else {
                println!("Job {job_id} completed");
            }
            if let Some(result) = job.and_then(|job| job.result_payload.as_deref()) {
                println!("{result}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Some(StopReason::Terminal(status)) => {
            let reason = view
                .latest_job
                .as_ref()
                .and_then(|job| job.error_message.as_deref())
                .unwrap_or("no reason given");
            eprintln!("Job {job_id} {status}: {reason}");
            Ok(ExitCode::from(EXIT_JOB_UNSUCCESSFUL))
        }
        Some(StopReason::TransportError) => {
            let message = view
                .last_transport_error
                .as_deref()
                .unwrap_or("unknown error");
            bail!("lost contact with job {job_id}: {message}")
        }
        Some(StopReason::PollLimitReached) => {
            bail!(
                "job {job_id} did not finish within {} status requests",
                view.polls_issued
            )
        }
        None => bail!("stopped watching job {job_id} without a final status"),
    }
}

fn print_session(session: &StagingSession) {
    println!(
        "{}: {} of {} sheet(s) usable",
        session.document_name(),
        session.tables().len(),
        session.scanned()
    );
    for table in session.tables() {
        let marker = if session.selected_table_name() == Some(table.name.as_str()) {
            '*'
        } else {
            ' '
        };
        println!(
            "{marker} {} ({} rows, previewing {})",
            table.name,
            table.total_row_count.saturating_sub(1),
            table.preview_data_rows().len()
        );
        println!("    columns: {}", table.columns.join(", "));
    }
    for rejected in session.rejected() {
        println!(
            "  {} skipped, missing: {}",
            rejected.name,
            rejected.validation.missing_columns.join(", ")
        );
    }
    if let Some(message) = session.validation_error() {
        eprintln!("{message}");
    }
}

fn save_ledger(ledger: &Ledger) {
    if let Err(err) = ledger.save() {
        ingest_warn!("Job ledger not updated: {:#}", err);
    }
}
