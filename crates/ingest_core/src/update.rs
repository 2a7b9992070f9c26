use ingest_logging::{ingest_debug, ingest_info, ingest_trace, ingest_warn};

use crate::{Effect, Generation, Job, Msg, TrackerState};

/// Pure update function: applies a message to state and returns any effects.
///
/// At most one polling loop is live per state value: a loop is identified by
/// its generation, and every message carrying an older generation is dropped.
pub fn update(mut state: TrackerState, msg: Msg) -> (TrackerState, Vec<Effect>) {
    let effects = match msg {
        Msg::StartPolling { job_id } => {
            if state.is_polling_job(&job_id) {
                ingest_debug!("Already polling job {}", job_id);
                return (state, Vec::new());
            }
            let mut effects = Vec::with_capacity(2);
            if state.is_polling() {
                ingest_info!(
                    "Superseding job {:?} with {}",
                    state.active_job_id(),
                    job_id
                );
                effects.push(Effect::TearDown {
                    generation: state.generation(),
                });
            }
            let generation = state.begin_polling(job_id.clone());
            ingest_info!("Polling job {} (generation {})", job_id, generation);
            effects.push(Effect::FetchStatus { job_id, generation });
            effects
        }
        Msg::CancelRequested => {
            if !state.can_cancel() {
                ingest_debug!("Cancel ignored: no active, non-terminal job");
                return (state, Vec::new());
            }
            let Some(job_id) = state.active_job_id().map(ToOwned::to_owned) else {
                return (state, Vec::new());
            };
            state.mark_cancel_issued();
            ingest_info!("Requesting cancellation of job {}", job_id);
            vec![Effect::RequestCancel {
                job_id,
                generation: state.generation(),
            }]
        }
        Msg::Reset => {
            let effects = vec![Effect::TearDown {
                generation: state.generation(),
            }];
            state.clear();
            effects
        }
        Msg::Tick { generation } => on_tick(&mut state, generation),
        Msg::StatusFetched { generation, result } => {
            on_status_fetched(&mut state, generation, result)
        }
        Msg::CancelFinished {
            job_id,
            generation,
            result,
        } => {
            if generation != state.generation() || state.active_job_id() != Some(job_id.as_str())
            {
                ingest_debug!(
                    "Dropping cancel result for job {} (generation {})",
                    job_id,
                    generation
                );
                return (state, Vec::new());
            }
            if let Err(message) = &result {
                ingest_warn!("Cancel request for job {} failed: {}", job_id, message);
            }
            state.apply_cancel_result(result);
            Vec::new()
        }
        Msg::NoOp => Vec::new(),
    };

    (state, effects)
}

fn on_tick(state: &mut TrackerState, generation: Generation) -> Vec<Effect> {
    if !state.is_current_loop(generation) || state.fetch_in_flight() {
        ingest_trace!("Dropping tick for generation {}", generation);
        return Vec::new();
    }
    let Some(job_id) = state.active_job_id().map(ToOwned::to_owned) else {
        return Vec::new();
    };
    if state.poll_limit_reached() {
        ingest_warn!("Giving up on job {} after poll limit", job_id);
        state.stop_at_poll_limit();
        return vec![Effect::TearDown { generation }];
    }
    state.mark_fetch_issued();
    vec![Effect::FetchStatus { job_id, generation }]
}

fn on_status_fetched(
    state: &mut TrackerState,
    generation: Generation,
    result: Result<Job, String>,
) -> Vec<Effect> {
    if !state.is_current_loop(generation) || !state.fetch_in_flight() {
        ingest_debug!("Discarding stale status response (generation {})", generation);
        return Vec::new();
    }
    match result {
        Ok(job) => {
            ingest_debug!(
                "Job {} is {} ({:.0}%)",
                job.id,
                job.status,
                job.progress_percentage
            );
            let status = job.status;
            if state.apply_fetched(job) {
                ingest_info!("Job reached terminal status {}", status);
                vec![Effect::TearDown { generation }]
            } else {
                vec![Effect::ScheduleTick {
                    generation,
                    delay: state.settings().interval,
                }]
            }
        }
        Err(message) => {
            ingest_warn!("Lost contact with job: {}", message);
            state.apply_transport_error(message);
            vec![Effect::TearDown { generation }]
        }
    }
}
