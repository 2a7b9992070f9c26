use std::io::Cursor;
use std::panic::{self, AssertUnwindSafe};

use calamine::{Data, Reader};
use chardetng::EncodingDetector;
use encoding_rs::Encoding;
use ingest_core::{CellValue, DecodedSheet};
use ingest_logging::ingest_debug;

use crate::{DocumentFormat, SourceDocument};

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("failed to decode text with {encoding}")]
    Text { encoding: String },
    #[error("malformed delimited text: {0}")]
    Delimited(String),
    #[error("unreadable workbook: {0}")]
    Workbook(String),
    #[error("decoder aborted: {0}")]
    Aborted(String),
}

/// Decode raw bytes into UTF-8 using: BOM -> chardetng fallback.
pub fn decode_text(bytes: &[u8]) -> Result<String, DecodeError> {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return decode_with(bytes, encoding);
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let encoding = detector.guess(None, true);
    decode_with(bytes, encoding)
}

fn decode_with(bytes: &[u8], encoding: &'static Encoding) -> Result<String, DecodeError> {
    // `decode` strips a matching BOM.
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(DecodeError::Text {
            encoding: encoding.name().to_string(),
        });
    }
    Ok(text.into_owned())
}

/// Decode a document into its named sub-tables, in document order.
pub fn decode_document(document: &SourceDocument) -> Result<Vec<DecodedSheet>, DecodeError> {
    let sheets = match document.format() {
        DocumentFormat::Delimited(delimiter) => {
            let text = decode_text(&document.bytes)?;
            vec![decode_delimited(document.stem(), &text, delimiter)?]
        }
        // calamine can panic on truncated archives.
        DocumentFormat::Workbook => {
            panic::catch_unwind(AssertUnwindSafe(|| decode_workbook(&document.bytes)))
                .map_err(|payload| DecodeError::Aborted(panic_message(payload.as_ref())))??
        }
    };
    ingest_debug!("Decoded {} into {} sheet(s)", document.name, sheets.len());
    Ok(sheets)
}

fn decode_delimited(name: &str, text: &str, delimiter: u8) -> Result<DecodedSheet, DecodeError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|err| DecodeError::Delimited(err.to_string()))?;
        rows.push(
            record
                .iter()
                .map(|field| {
                    if field.is_empty() {
                        CellValue::Empty
                    } else {
                        CellValue::Text(field.to_string())
                    }
                })
                .collect(),
        );
    }
    Ok(DecodedSheet::new(name, rows))
}

fn decode_workbook(bytes: &[u8]) -> Result<Vec<DecodedSheet>, DecodeError> {
    let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
        .map_err(|err| DecodeError::Workbook(err.to_string()))?;

    let mut sheets = Vec::new();
    for name in workbook.sheet_names() {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|err| DecodeError::Workbook(format!("sheet {name:?}: {err}")))?;
        let rows = range
            .rows()
            .map(|row| row.iter().map(cell_value).collect())
            .collect();
        sheets.push(DecodedSheet::new(name, rows));
    }
    Ok(sheets)
}

fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(text) => CellValue::Text(text.clone()),
        Data::Int(value) => CellValue::Int(*value),
        Data::Float(value) => CellValue::Float(*value),
        Data::Bool(value) => CellValue::Bool(*value),
        Data::DateTime(value) => match value.as_datetime() {
            Some(datetime) => CellValue::Text(datetime.to_string()),
            None => CellValue::Float(value.as_f64()),
        },
        Data::DateTimeIso(text) | Data::DurationIso(text) => CellValue::Text(text.clone()),
        Data::Error(err) => CellValue::Text(err.to_string()),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic while decoding".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::decode_text;

    #[test]
    fn utf8_bom_is_stripped() {
        let bytes = b"\xEF\xBB\xBFdistrict,cases\n";
        assert_eq!(decode_text(bytes).unwrap(), "district,cases\n");
    }

    #[test]
    fn utf16_bom_is_honoured() {
        let bytes = [0xFF, 0xFE, b'a', 0x00, b',', 0x00, b'b', 0x00];
        assert_eq!(decode_text(&bytes).unwrap(), "a,b");
    }
}
