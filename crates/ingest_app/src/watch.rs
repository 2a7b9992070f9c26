use anyhow::Context;
use ingest_core::{Job, TrackerView};
use ingest_engine::JobTracker;
use ingest_logging::ingest_info;

pub enum WatchOutcome {
    /// Polling stopped on its own; the final view says why.
    Stopped(TrackerView),
    /// The user interrupted twice and the tracker was reset.
    Abandoned,
}

/// Track `job_id` until polling stops, printing a line per progress change.
///
/// The first Ctrl-C asks the server to cancel the job, if it has reported an
/// active status, and keeps watching so the cancellation is observed; the
/// second one resets the tracker.
pub async fn watch_job(tracker: &JobTracker, job_id: &str) -> anyhow::Result<WatchOutcome> {
    tracker.start_polling(job_id);
    tracker.flush().await;

    let mut views = tracker.subscribe();
    let mut interrupts = 0u32;
    let mut last_line = String::new();
    loop {
        let view = views.borrow_and_update().clone();
        if let Some(job) = &view.latest_job {
            let line = progress_line(job);
            if line != last_line {
                println!("{line}");
                last_line = line;
            }
        }
        if !view.is_polling {
            return Ok(WatchOutcome::Stopped(view));
        }

        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    return Ok(WatchOutcome::Stopped(tracker.view()));
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("cannot listen for Ctrl-C")?;
                interrupts += 1;
                match on_interrupt(interrupts, &tracker.view()) {
                    Interrupt::Cancel => {
                        eprintln!(
                            "Requesting cancellation of job {job_id}; press Ctrl-C again to stop watching."
                        );
                        tracker.cancel_job();
                    }
                    Interrupt::NothingToCancel => {
                        eprintln!(
                            "Job {job_id} has no cancellable status yet; press Ctrl-C again to stop watching."
                        );
                    }
                    Interrupt::Stop => {
                        ingest_info!("Stopped watching job {}", job_id);
                        tracker.reset();
                        tracker.flush().await;
                        return Ok(WatchOutcome::Abandoned);
                    }
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupt {
    Cancel,
    NothingToCancel,
    Stop,
}

/// The first interrupt cancels when the server can still act on it.
fn on_interrupt(count: u32, view: &TrackerView) -> Interrupt {
    if count > 1 {
        return Interrupt::Stop;
    }
    let cancellable = !view.cancel_pending
        && view
            .latest_job
            .as_ref()
            .is_some_and(|job| job.status.is_active());
    if cancellable {
        Interrupt::Cancel
    } else {
        Interrupt::NothingToCancel
    }
}

pub fn progress_line(job: &Job) -> String {
    let mut line = format!("[{}] {:>5.1}%", job.status, job.progress_percentage);
    if job.total_steps > 0 {
        line.push_str(&format!(" ({}/{})", job.completed_steps, job.total_steps));
    }
    if let Some(step) = &job.current_step {
        line.push(' ');
        line.push_str(step);
    }
    line
}
