use std::time::Duration;

use crate::view_model::{StopReason, TrackerView};
use crate::{Job, JobId};

/// Identity of one polling loop. Responses carrying an older value are stale.
pub type Generation = u64;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    /// Stop after this many status requests without a terminal status.
    pub max_polls: Option<u32>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_polls: None,
        }
    }
}

/// Client-owned tracker state. Mutated only through [`crate::update`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrackerState {
    settings: PollSettings,
    active_job_id: Option<JobId>,
    latest_job: Option<Job>,
    is_polling: bool,
    last_transport_error: Option<String>,
    stop_reason: Option<StopReason>,
    generation: Generation,
    fetch_in_flight: bool,
    cancel_in_flight: bool,
    polls_issued: u32,
    dirty: bool,
}

impl TrackerState {
    pub fn new(settings: PollSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn view(&self) -> TrackerView {
        TrackerView {
            active_job_id: self.active_job_id.clone(),
            latest_job: self.latest_job.clone(),
            is_polling: self.is_polling,
            last_transport_error: self.last_transport_error.clone(),
            stop_reason: self.stop_reason,
            cancel_pending: self.cancel_in_flight,
            polls_issued: self.polls_issued,
        }
    }

    pub fn settings(&self) -> &PollSettings {
        &self.settings
    }

    pub fn active_job_id(&self) -> Option<&str> {
        self.active_job_id.as_deref()
    }

    pub fn latest_job(&self) -> Option<&Job> {
        self.latest_job.as_ref()
    }

    pub fn is_polling(&self) -> bool {
        self.is_polling
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn fetch_in_flight(&self) -> bool {
        self.fetch_in_flight
    }

    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn is_polling_job(&self, job_id: &str) -> bool {
        self.is_polling && self.active_job_id.as_deref() == Some(job_id)
    }

    /// Opens a new polling loop for `job_id` and returns its generation.
    /// The first status request is considered issued.
    pub(crate) fn begin_polling(&mut self, job_id: JobId) -> Generation {
        if self.active_job_id.as_deref() != Some(job_id.as_str()) {
            self.latest_job = None;
        }
        // A cancel issued by an earlier loop reports under an old generation.
        self.cancel_in_flight = false;
        self.active_job_id = Some(job_id);
        self.generation += 1;
        self.is_polling = true;
        self.last_transport_error = None;
        self.stop_reason = None;
        self.fetch_in_flight = true;
        self.polls_issued = 1;
        self.dirty = true;
        self.generation
    }

    pub(crate) fn is_current_loop(&self, generation: Generation) -> bool {
        self.is_polling && generation == self.generation
    }

    pub(crate) fn poll_limit_reached(&self) -> bool {
        self.settings
            .max_polls
            .is_some_and(|max| self.polls_issued >= max)
    }

    pub(crate) fn mark_fetch_issued(&mut self) {
        self.fetch_in_flight = true;
        self.polls_issued += 1;
    }

    /// Applies a fetched projection. Returns true if the job is terminal.
    pub(crate) fn apply_fetched(&mut self, job: Job) -> bool {
        self.fetch_in_flight = false;
        let terminal = job.is_terminal();
        if terminal {
            self.is_polling = false;
            self.stop_reason = Some(StopReason::Terminal(job.status));
            self.cancel_in_flight = false;
        }
        self.latest_job = Some(job);
        self.dirty = true;
        terminal
    }

    pub(crate) fn apply_transport_error(&mut self, message: String) {
        self.fetch_in_flight = false;
        self.is_polling = false;
        self.stop_reason = Some(StopReason::TransportError);
        self.last_transport_error = Some(message);
        self.dirty = true;
    }

    pub(crate) fn stop_at_poll_limit(&mut self) {
        self.is_polling = false;
        self.stop_reason = Some(StopReason::PollLimitReached);
        self.dirty = true;
    }

    pub(crate) fn can_cancel(&self) -> bool {
        self.active_job_id.is_some()
            && !self.cancel_in_flight
            && self
                .latest_job
                .as_ref()
                .is_some_and(|job| job.status.is_active())
    }

    pub(crate) fn mark_cancel_issued(&mut self) {
        self.cancel_in_flight = true;
        self.dirty = true;
    }

    pub(crate) fn apply_cancel_result(&mut self, result: Result<(), String>) {
        self.cancel_in_flight = false;
        if let Err(message) = result {
            self.last_transport_error = Some(message);
        }
        self.dirty = true;
    }

    /// Forgets the active job. Bumps the generation so any in-flight
    /// response is discarded on arrival.
    pub(crate) fn clear(&mut self) {
        self.active_job_id = None;
        self.latest_job = None;
        self.is_polling = false;
        self.last_transport_error = None;
        self.stop_reason = None;
        self.generation += 1;
        self.fetch_in_flight = false;
        self.cancel_in_flight = false;
        self.polls_issued = 0;
        self.dirty = true;
    }
}
