use ingest_core::{CellValue, DecodedSheet, JobId, StagedTable};
use ingest_logging::{ingest_info, ingest_warn};

use crate::{extract_sheet, JobApi, SourceDocument, StageError, TransportError};

#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    /// The server answered with a non-success status.
    #[error("{message}")]
    Rejected { status: u16, message: String },
    #[error("submission failed: {0}")]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Extract(#[from] StageError),
    #[error("sheet {name:?} not found in {document}")]
    UnknownTable { document: String, name: String },
    #[error("cannot serialize sheet: {0}")]
    Serialize(String),
    #[error("unexpected submission response: {0}")]
    InvalidResponse(String),
}

impl SubmissionError {
    /// Message suitable for showing to the user as-is.
    pub fn message(&self) -> String {
        match self {
            SubmissionError::Rejected { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// One sub-table serialized for the job-creating endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionPayload {
    pub original_filename: String,
    pub sheet_name: String,
    /// File name given to the binary attachment.
    pub attachment_name: String,
    pub csv: Vec<u8>,
    /// Data rows written, header excluded.
    pub row_count: usize,
}

/// Re-extract the whole of `sheet_name` from `document` and serialize it as
/// comma-separated text. Cells are trimmed and blank rows are dropped.
pub fn build_payload(
    document: &SourceDocument,
    sheet_name: &str,
) -> Result<SubmissionPayload, SubmissionError> {
    let sheet =
        extract_sheet(document, sheet_name)?.ok_or_else(|| SubmissionError::UnknownTable {
            document: document.name.clone(),
            name: sheet_name.to_string(),
        })?;
    let (csv, row_count) = serialize_sheet(&sheet)?;

    Ok(SubmissionPayload {
        original_filename: document.name.clone(),
        sheet_name: sheet_name.to_string(),
        attachment_name: format!("{}_{}.csv", document.stem(), sheet_name),
        csv,
        row_count,
    })
}

fn serialize_sheet(sheet: &DecodedSheet) -> Result<(Vec<u8>, usize), SubmissionError> {
    let columns = sheet.columns();
    let width = columns.len();
    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
    writer
        .write_record(&columns)
        .map_err(|err| SubmissionError::Serialize(err.to_string()))?;

    let mut row_count = 0;
    for row in sheet.rows.iter().skip(1) {
        if row.iter().all(CellValue::is_blank) {
            continue;
        }
        let record: Vec<String> = (0..width)
            .map(|idx| {
                row.get(idx)
                    .map(|cell| cell.to_string().trim().to_string())
                    .unwrap_or_default()
            })
            .collect();
        writer
            .write_record(&record)
            .map_err(|err| SubmissionError::Serialize(err.to_string()))?;
        row_count += 1;
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| SubmissionError::Serialize(err.to_string()))?;
    Ok((bytes, row_count))
}

/// Submit one staged table as a new server job. Issues exactly one request.
pub async fn submit(
    api: &dyn JobApi,
    document: &SourceDocument,
    table: &StagedTable,
) -> Result<JobId, SubmissionError> {
    let payload = build_payload(document, &table.name)?;
    ingest_info!(
        "Submitting {} / {}: {} rows, {} bytes",
        payload.original_filename,
        payload.sheet_name,
        payload.row_count,
        payload.csv.len()
    );
    match api.create_job(payload).await {
        Ok(job_id) => {
            ingest_info!("Server accepted submission as job {}", job_id);
            Ok(job_id)
        }
        Err(err) => {
            ingest_warn!("Submission of {} failed: {}", table.name, err);
            Err(err)
        }
    }
}
