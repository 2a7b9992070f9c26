use std::time::Duration;

use crate::{Generation, JobId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Issue one status request; report back as `Msg::StatusFetched`.
    FetchStatus {
        job_id: JobId,
        generation: Generation,
    },
    /// Deliver `Msg::Tick` after `delay` unless the loop is torn down first.
    ScheduleTick {
        generation: Generation,
        delay: Duration,
    },
    /// Issue one cancellation request; report back as `Msg::CancelFinished`.
    RequestCancel {
        job_id: JobId,
        generation: Generation,
    },
    /// Release the timer owned by the polling loop of `generation`.
    TearDown { generation: Generation },
}
