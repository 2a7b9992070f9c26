//! Ingest engine: document decoding, job API client and the tracker actor.
mod api;
mod decode;
mod stage;
mod submit;
mod tracker;
mod types;

pub use api::{ApiSettings, HttpJobApi, JobApi};
pub use decode::{decode_document, decode_text, DecodeError};
pub use stage::{extract_sheet, stage, StageError, StagingSettings};
pub use submit::{build_payload, submit, SubmissionError, SubmissionPayload};
pub use tracker::JobTracker;
pub use types::{DocumentFormat, FailureKind, SourceDocument, TransportError};
