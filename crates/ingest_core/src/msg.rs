use crate::{Generation, Job, JobId};

#[derive(Debug, Clone, PartialEq)]
pub enum Msg {
    /// Caller asked to track a job. Supersedes a different job being polled.
    StartPolling { job_id: JobId },
    /// Caller asked the server to cancel the active job.
    CancelRequested,
    /// Caller asked to forget the active job and stop polling.
    Reset,
    /// Poll interval elapsed for a polling loop.
    Tick { generation: Generation },
    /// A status request resolved. `Err` carries a transport failure.
    StatusFetched {
        generation: Generation,
        result: Result<Job, String>,
    },
    /// A cancellation request resolved. `generation` is the loop it was issued in.
    CancelFinished {
        job_id: JobId,
        generation: Generation,
        result: Result<(), String>,
    },
    /// Fallback for placeholder wiring.
    NoOp,
}
