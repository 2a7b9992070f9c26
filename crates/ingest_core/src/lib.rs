//! Ingest core: staging data model and the pure job-tracker state machine.
mod effect;
mod job;
mod msg;
mod staging;
mod state;
mod update;
mod view_model;

pub use effect::Effect;
pub use job::{Job, JobId, JobStatus};
pub use msg::Msg;
pub use staging::{
    CellValue, DecodedSheet, RejectedTable, RequiredColumns, StagedTable, StagingSession,
    ValidationResult, DEFAULT_PREVIEW_ROWS,
};
pub use state::{Generation, PollSettings, TrackerState, DEFAULT_POLL_INTERVAL};
pub use update::update;
pub use view_model::{StopReason, TrackerView};
