use std::time::Duration;

use ingest_core::{Job, JobId, JobStatus};
use ingest_logging::{ingest_debug, ingest_trace};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use url::Url;

use crate::{FailureKind, SubmissionError, SubmissionPayload, TransportError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiSettings {
    /// Base URL of the ingestion API, e.g. `https://host/api/`.
    pub base_url: String,
    /// Jobs collection, relative to `base_url`.
    pub jobs_path: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000/api/".to_string(),
            jobs_path: "jobs/".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// The three endpoints of the backend job queue.
#[async_trait::async_trait]
pub trait JobApi: Send + Sync {
    async fn create_job(&self, payload: SubmissionPayload) -> Result<JobId, SubmissionError>;

    async fn fetch_status(&self, job_id: &str) -> Result<Job, TransportError>;

    /// Idempotent on the server side.
    async fn cancel_job(&self, job_id: &str) -> Result<(), TransportError>;
}

#[derive(Debug, Clone)]
pub struct HttpJobApi {
    client: reqwest::Client,
    jobs_url: Url,
}

impl HttpJobApi {
    pub fn new(settings: ApiSettings) -> Result<Self, TransportError> {
        let jobs_url = parse_jobs_url(&settings)?;
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| TransportError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self { client, jobs_url })
    }

    pub fn jobs_url(&self) -> &Url {
        &self.jobs_url
    }

    /// `{jobs}/{job_id}/` or `{jobs}/{job_id}/{action}/`.
    fn job_url(&self, job_id: &str, action: Option<&str>) -> Result<Url, TransportError> {
        let mut url = self.jobs_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|()| {
                TransportError::new(FailureKind::InvalidUrl, "base url cannot hold a path")
            })?;
            segments.pop_if_empty().push(job_id);
            if let Some(action) = action {
                segments.push(action);
            }
            segments.push("");
        }
        Ok(url)
    }
}

#[async_trait::async_trait]
impl JobApi for HttpJobApi {
    async fn create_job(&self, payload: SubmissionPayload) -> Result<JobId, SubmissionError> {
        let attachment = Part::bytes(payload.csv)
            .file_name(payload.attachment_name)
            .mime_str("text/csv")
            .map_err(|err| SubmissionError::Serialize(err.to_string()))?;
        let form = Form::new()
            .part("file", attachment)
            .text("original_filename", payload.original_filename)
            .text("sheet_name", payload.sheet_name);

        let response = self
            .client
            .post(self.jobs_url.clone())
            .multipart(form)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(map_reqwest_error)?;
        if !status.is_success() {
            return Err(SubmissionError::Rejected {
                status: status.as_u16(),
                message: error_message(&body).unwrap_or_else(|| status.to_string()),
            });
        }

        let created: CreatedJob = serde_json::from_slice(&body)
            .map_err(|err| SubmissionError::InvalidResponse(err.to_string()))?;
        Ok(created.job_id)
    }

    async fn fetch_status(&self, job_id: &str) -> Result<Job, TransportError> {
        let url = self.job_url(job_id, None)?;
        ingest_trace!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(map_reqwest_error)?;
        if !status.is_success() {
            return Err(TransportError::new(
                FailureKind::HttpStatus(status.as_u16()),
                error_message(&body).unwrap_or_else(|| status.to_string()),
            ));
        }

        let projection: JobStatusResponse = serde_json::from_slice(&body)
            .map_err(|err| TransportError::new(FailureKind::Decode, err.to_string()))?;
        Ok(projection.into_job(job_id))
    }

    async fn cancel_job(&self, job_id: &str) -> Result<(), TransportError> {
        let url = self.job_url(job_id, Some("cancel"))?;
        ingest_debug!("POST {}", url);
        let response = self
            .client
            .post(url)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await.unwrap_or_default();
            return Err(TransportError::new(
                FailureKind::HttpStatus(status.as_u16()),
                error_message(&body).unwrap_or_else(|| status.to_string()),
            ));
        }
        Ok(())
    }
}

fn parse_jobs_url(settings: &ApiSettings) -> Result<Url, TransportError> {
    let mut base = settings.base_url.clone();
    if !base.ends_with('/') {
        base.push('/');
    }
    Url::parse(&base)
        .and_then(|base| base.join(&settings.jobs_path))
        .map_err(|err| TransportError::new(FailureKind::InvalidUrl, err.to_string()))
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        return TransportError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_decode() {
        return TransportError::new(FailureKind::Decode, err.to_string());
    }
    TransportError::new(FailureKind::Network, err.to_string())
}

/// Pull a human-readable message out of an error body.
///
/// Understands `{"error": {"message": ..}}` plus the flatter `{"error": ..}`,
/// `{"detail": ..}` and `{"message": ..}` shapes.
fn error_message(body: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(body).ok()?;
    let message = value
        .pointer("/error/message")
        .or_else(|| value.get("error"))
        .or_else(|| value.get("detail"))
        .or_else(|| value.get("message"))?;
    message.as_str().map(ToOwned::to_owned)
}

#[derive(Debug, Deserialize)]
struct CreatedJob {
    job_id: JobId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum WireStatus {
    #[serde(alias = "queued")]
    Pending,
    #[serde(alias = "processing", alias = "running")]
    InProgress,
    #[serde(alias = "succeeded", alias = "success")]
    Completed,
    #[serde(alias = "error")]
    Failed,
    #[serde(alias = "canceled")]
    Cancelled,
}

impl From<WireStatus> for JobStatus {
    fn from(status: WireStatus) -> Self {
        match status {
            WireStatus::Pending => JobStatus::Pending,
            WireStatus::InProgress => JobStatus::InProgress,
            WireStatus::Completed => JobStatus::Completed,
            WireStatus::Failed => JobStatus::Failed,
            WireStatus::Cancelled => JobStatus::Cancelled,
        }
    }
}

#[derive(Debug, Deserialize)]
struct JobStatusResponse {
    #[serde(default, alias = "job_id")]
    id: Option<String>,
    status: WireStatus,
    #[serde(default)]
    progress_percentage: Option<f64>,
    #[serde(default)]
    completed_steps: Option<u64>,
    #[serde(default)]
    total_steps: Option<u64>,
    #[serde(default, alias = "current_step_label")]
    current_step: Option<String>,
    #[serde(default)]
    duration_seconds: Option<f64>,
    #[serde(default)]
    result_data: Option<serde_json::Value>,
    #[serde(default)]
    error_message: Option<String>,
}

impl JobStatusResponse {
    fn into_job(self, requested_id: &str) -> Job {
        let status = JobStatus::from(self.status);
        let result_payload = match (status, self.result_data) {
            (JobStatus::Completed, Some(data)) if !data.is_null() => Some(data.to_string()),
            _ => None,
        };
        Job {
            id: self.id.unwrap_or_else(|| requested_id.to_string()),
            status,
            progress_percentage: self.progress_percentage.unwrap_or(0.0),
            completed_steps: self.completed_steps.unwrap_or(0),
            total_steps: self.total_steps.unwrap_or(0),
            current_step: self.current_step,
            duration_seconds: self.duration_seconds.filter(|_| status.is_terminal()),
            result_payload,
            error_message: self.error_message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{error_message, ApiSettings, HttpJobApi};

    #[test]
    fn job_urls_keep_trailing_slash() {
        let api = HttpJobApi::new(ApiSettings {
            base_url: "http://localhost:9000/api".to_string(),
            ..ApiSettings::default()
        })
        .unwrap();

        assert_eq!(api.jobs_url().as_str(), "http://localhost:9000/api/jobs/");
        assert_eq!(
            api.job_url("abc 1", None).unwrap().as_str(),
            "http://localhost:9000/api/jobs/abc%201/"
        );
        assert_eq!(
            api.job_url("abc", Some("cancel")).unwrap().as_str(),
            "http://localhost:9000/api/jobs/abc/cancel/"
        );
    }

    #[test]
    fn error_message_shapes() {
        assert_eq!(
            error_message(br#"{"error":{"message":"bad sheet"}}"#).as_deref(),
            Some("bad sheet")
        );
        assert_eq!(
            error_message(br#"{"detail":"not found"}"#).as_deref(),
            Some("not found")
        );
        assert_eq!(error_message(b"<html>oops</html>"), None);
    }
}
