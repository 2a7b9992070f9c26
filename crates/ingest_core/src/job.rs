use std::fmt;

/// Opaque server-assigned job identifier.
pub type JobId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Completed, Failed and Cancelled never transition again.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::InProgress => "in_progress",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client-side projection of a server job, replaced wholesale on every fetch.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    pub progress_percentage: f64,
    pub completed_steps: u64,
    pub total_steps: u64,
    pub current_step: Option<String>,
    /// Present once the job is terminal.
    pub duration_seconds: Option<f64>,
    /// Compact JSON of the job result; present only when completed.
    pub result_payload: Option<String>,
    pub error_message: Option<String>,
}

impl Job {
    pub fn new(id: impl Into<JobId>, status: JobStatus) -> Self {
        Self {
            id: id.into(),
            status,
            progress_percentage: 0.0,
            completed_steps: 0,
            total_steps: 0,
            current_step: None,
            duration_seconds: None,
            result_payload: None,
            error_message: None,
        }
    }

    pub fn with_progress(mut self, progress_percentage: f64) -> Self {
        self.progress_percentage = progress_percentage;
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}
