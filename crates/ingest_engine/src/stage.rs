use ingest_core::{DecodedSheet, RequiredColumns, StagingSession, DEFAULT_PREVIEW_ROWS};
use ingest_logging::{ingest_info, ingest_warn};

use crate::{decode_document, DecodeError, SourceDocument};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingSettings {
    /// Rows kept per sub-table, header row included.
    pub preview_rows: usize,
    pub required_columns: RequiredColumns,
}

impl Default for StagingSettings {
    fn default() -> Self {
        Self {
            preview_rows: DEFAULT_PREVIEW_ROWS,
            required_columns: RequiredColumns::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StageError {
    #[error("cannot read {document} as tabular data: {source}")]
    Parse {
        document: String,
        #[source]
        source: DecodeError,
    },
}

/// Decode `document` and keep the sub-tables that satisfy the column contract.
///
/// A document where nothing matches is not an error: the returned session is
/// empty and carries a validation message instead.
pub fn stage(
    document: &SourceDocument,
    settings: &StagingSettings,
) -> Result<StagingSession, StageError> {
    let sheets = decode(document)?;
    let session = StagingSession::from_sheets(
        document.name.clone(),
        sheets,
        &settings.required_columns,
        settings.preview_rows.max(1),
    );
    if let Some(message) = session.validation_error() {
        ingest_warn!("{}", message);
    }
    Ok(session)
}

/// Re-decode `document` and return the full sub-table named `sheet_name`.
pub fn extract_sheet(
    document: &SourceDocument,
    sheet_name: &str,
) -> Result<Option<DecodedSheet>, StageError> {
    let sheet = decode(document)?
        .into_iter()
        .find(|sheet| sheet.name == sheet_name);
    Ok(sheet)
}

fn decode(document: &SourceDocument) -> Result<Vec<DecodedSheet>, StageError> {
    decode_document(document).map_err(|source| {
        ingest_info!("Rejected {}: {}", document.name, source);
        StageError::Parse {
            document: document.name.clone(),
            source,
        }
    })
}
