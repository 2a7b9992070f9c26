//! Staged tabular data and the required-column contract.
//!
//! A source document decodes into an ordered list of [`DecodedSheet`]s. Each
//! sheet is narrowed to a preview window, checked against [`RequiredColumns`]
//! and only the passing sheets are kept in the [`StagingSession`].

use std::fmt;

use ingest_logging::{ingest_debug, ingest_info, ingest_warn};

/// Rows materialized per sub-table, header row included.
pub const DEFAULT_PREVIEW_ROWS: usize = 100;

/// One scalar cell of a decoded sub-table.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl CellValue {
    /// True for empty cells and text cells holding only whitespace.
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(text) => text.trim().is_empty(),
            CellValue::Int(_) | CellValue::Float(_) | CellValue::Bool(_) => false,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(text) => f.write_str(text),
            CellValue::Int(value) => write!(f, "{value}"),
            // Spreadsheets store whole numbers as floats; print them without ".0".
            CellValue::Float(value) if value.fract() == 0.0 && value.abs() < 1e15 => {
                write!(f, "{}", *value as i64)
            }
            CellValue::Float(value) => write!(f, "{value}"),
            CellValue::Bool(value) => write!(f, "{value}"),
        }
    }
}

/// A fully decoded sub-table, as produced by a document decoder.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DecodedSheet {
    pub name: String,
    pub rows: Vec<Vec<CellValue>>,
}

impl DecodedSheet {
    pub fn new(name: impl Into<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }

    /// Width of the widest row.
    pub fn width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Column names derived from the first row, padded to the sheet width.
    pub fn columns(&self) -> Vec<String> {
        let header = self.rows.first().map(Vec::as_slice).unwrap_or(&[]);
        (0..self.width())
            .map(|idx| {
                let name = header
                    .get(idx)
                    .map(|cell| cell.to_string().trim().to_string())
                    .unwrap_or_default();
                if name.is_empty() {
                    format!("Column {}", idx + 1)
                } else {
                    name
                }
            })
            .collect()
    }
}

/// A named sub-table narrowed to its preview window.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedTable {
    pub name: String,
    /// Preview rows, header row first. Every row is exactly `columns.len()` wide.
    pub rows: Vec<Vec<CellValue>>,
    /// Row count of the full sub-table, header row included.
    pub total_row_count: usize,
    pub columns: Vec<String>,
}

impl StagedTable {
    pub fn from_sheet(sheet: &DecodedSheet, preview_rows: usize) -> Self {
        let columns = sheet.columns();
        let width = columns.len();
        let rows = sheet
            .rows
            .iter()
            .take(preview_rows)
            .map(|row| {
                let mut row = row.clone();
                row.resize(width, CellValue::Empty);
                row
            })
            .collect();

        Self {
            name: sheet.name.clone(),
            rows,
            total_row_count: sheet.rows.len(),
            columns,
        }
    }

    /// Data rows in the preview, i.e. without the header row.
    pub fn preview_data_rows(&self) -> &[Vec<CellValue>] {
        self.rows.get(1..).unwrap_or(&[])
    }
}

/// Outcome of checking one sub-table against the column contract.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationResult {
    /// Required columns absent from the sub-table, in contract order.
    pub missing_columns: Vec<String>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.missing_columns.is_empty()
    }
}

/// Ordered set of column names every accepted sub-table must contain.
///
/// Matching is exact; an empty contract accepts every sub-table.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RequiredColumns {
    names: Vec<String>,
}

impl RequiredColumns {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for name in names {
            let name = name.into();
            if !unique.contains(&name) {
                unique.push(name);
            }
        }
        Self { names: unique }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn validate(&self, columns: &[String]) -> ValidationResult {
        let missing_columns = self
            .names
            .iter()
            .filter(|required| !columns.contains(required))
            .cloned()
            .collect();
        ValidationResult { missing_columns }
    }
}

/// A sub-table that failed the column contract. Only the diagnostics survive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedTable {
    pub name: String,
    pub validation: ValidationResult,
}

/// The validated subset of one source document.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StagingSession {
    document_name: String,
    tables: Vec<StagedTable>,
    selected: Option<String>,
    validation_error: Option<String>,
    rejected: Vec<RejectedTable>,
    scanned: usize,
}

impl StagingSession {
    /// Builds a session from decoded sub-tables, keeping only those that pass
    /// `contract`. Order of appearance in the document is preserved.
    pub fn from_sheets(
        document_name: impl Into<String>,
        sheets: Vec<DecodedSheet>,
        contract: &RequiredColumns,
        preview_rows: usize,
    ) -> Self {
        let document_name = document_name.into();
        let scanned = sheets.len();
        let mut tables: Vec<StagedTable> = Vec::new();
        let mut rejected: Vec<RejectedTable> = Vec::new();

        // First occurrence of a name wins, accepted or not.
        for sheet in &sheets {
            if tables.iter().any(|table| table.name == sheet.name)
                || rejected.iter().any(|table| table.name == sheet.name)
            {
                ingest_warn!(
                    "Skipping duplicate sheet name {:?} in {}",
                    sheet.name,
                    document_name
                );
                continue;
            }
            let table = StagedTable::from_sheet(sheet, preview_rows);
            let validation = contract.validate(&table.columns);
            if validation.is_valid() {
                ingest_debug!(
                    "Sheet {:?} accepted: {} columns, {} rows",
                    table.name,
                    table.columns.len(),
                    table.total_row_count
                );
                tables.push(table);
            } else {
                ingest_debug!(
                    "Sheet {:?} rejected, missing {:?}",
                    table.name,
                    validation.missing_columns
                );
                rejected.push(RejectedTable {
                    name: table.name,
                    validation,
                });
            }
        }

        let selected = tables.first().map(|table| table.name.clone());
        let validation_error = if tables.is_empty() {
            Some(describe_no_match(&document_name, scanned, contract))
        } else {
            None
        };

        ingest_info!(
            "Staged {}: {} of {} sheet(s) accepted",
            document_name,
            tables.len(),
            scanned
        );

        Self {
            document_name,
            tables,
            selected,
            validation_error,
            rejected,
            scanned,
        }
    }

    pub fn document_name(&self) -> &str {
        &self.document_name
    }

    pub fn tables(&self) -> &[StagedTable] {
        &self.tables
    }

    pub fn table(&self, name: &str) -> Option<&StagedTable> {
        self.tables.iter().find(|table| table.name == name)
    }

    pub fn table_names(&self) -> Vec<&str> {
        self.tables.iter().map(|table| table.name.as_str()).collect()
    }

    pub fn selected_table_name(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn selected_table(&self) -> Option<&StagedTable> {
        self.selected.as_deref().and_then(|name| self.table(name))
    }

    /// Selects a retained table. Returns `false` and keeps the current
    /// selection if `name` is not part of the validated set.
    pub fn select(&mut self, name: &str) -> bool {
        if self.table(name).is_some() {
            self.selected = Some(name.to_string());
            true
        } else {
            false
        }
    }

    /// Set only when no sub-table passed validation.
    pub fn validation_error(&self) -> Option<&str> {
        self.validation_error.as_deref()
    }

    pub fn rejected(&self) -> &[RejectedTable] {
        &self.rejected
    }

    pub fn scanned(&self) -> usize {
        self.scanned
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Discards all staged tables and diagnostics.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

fn describe_no_match(document_name: &str, scanned: usize, contract: &RequiredColumns) -> String {
    if scanned == 0 {
        return format!("Scanned 0 sheets in {document_name}; the document contains no sheets");
    }
    let plural = if scanned == 1 { "" } else { "s" };
    format!(
        "Scanned {scanned} sheet{plural} in {document_name}; none contain all required columns ({})",
        contract.names().join(", ")
    )
}
