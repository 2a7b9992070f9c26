use crate::{Job, JobId, JobStatus};

/// Why the tracker last left the polling state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Terminal(JobStatus),
    TransportError,
    PollLimitReached,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TrackerView {
    pub active_job_id: Option<JobId>,
    pub latest_job: Option<Job>,
    pub is_polling: bool,
    pub last_transport_error: Option<String>,
    pub stop_reason: Option<StopReason>,
    pub cancel_pending: bool,
    pub polls_issued: u32,
}

impl TrackerView {
    pub fn latest_status(&self) -> Option<JobStatus> {
        self.latest_job.as_ref().map(|job| job.status)
    }
}
