//! Staging and re-extraction of a two-sheet `.xlsx` workbook.
//!
//! `fixtures/surveillance.xlsx` holds sheet "A" (district, week, cases,
//! reported; 12 data rows, the first `cases` value is 12.5 and `reported` is
//! date-formatted from 2024-01-01) and sheet "B" (district, week, deaths; one
//! `#N/A` error cell).

use ingest_core::{CellValue, RequiredColumns};
use ingest_engine::{
    build_payload, decode_document, extract_sheet, stage, SourceDocument, StagingSettings,
};
use pretty_assertions::assert_eq;

const WORKBOOK: &[u8] = include_bytes!("fixtures/surveillance.xlsx");

fn workbook() -> SourceDocument {
    SourceDocument::new("surveillance.xlsx", WORKBOOK)
}

fn settings() -> StagingSettings {
    StagingSettings {
        preview_rows: 5,
        required_columns: RequiredColumns::new(["district", "week", "cases"]),
    }
}

#[test]
fn sheets_decode_in_document_order() {
    ingest_logging::initialize_for_tests();
    let sheets = decode_document(&workbook()).expect("decoded");

    let names: Vec<&str> = sheets.iter().map(|sheet| sheet.name.as_str()).collect();
    assert_eq!(names, vec!["A", "B"]);
    assert_eq!(sheets[0].rows.len(), 13);
    assert_eq!(sheets[1].columns(), vec!["district", "week", "deaths"]);
}

#[test]
fn workbook_cells_map_to_cell_values() {
    let sheets = decode_document(&workbook()).expect("decoded");
    let first_row = &sheets[0].rows[1];

    assert_eq!(first_row[0], CellValue::Text("North".to_string()));
    assert_eq!(first_row[1].to_string(), "1");
    assert_eq!(first_row[2], CellValue::Float(12.5));
    assert!(first_row[3].to_string().starts_with("2024-01-01"));
    assert_eq!(sheets[1].rows[1][2], CellValue::Text("#N/A".to_string()));
}

#[test]
fn only_sheet_with_required_columns_is_staged() {
    let session = stage(&workbook(), &settings()).expect("staged");

    assert_eq!(session.table_names(), vec!["A"]);
    assert_eq!(session.selected_table_name(), Some("A"));
    assert_eq!(session.validation_error(), None);
    assert_eq!(session.scanned(), 2);
    assert_eq!(session.rejected()[0].name, "B");
    assert_eq!(
        session.rejected()[0].validation.missing_columns,
        vec!["cases".to_string()]
    );

    let table = session.selected_table().expect("table");
    assert_eq!(table.rows.len(), 5);
    assert_eq!(table.total_row_count, 13);
}

#[test]
fn payload_carries_every_row_of_the_named_sheet() {
    let document = workbook();
    let session = stage(&document, &settings()).expect("staged");
    let preview_data_rows = session
        .selected_table()
        .expect("table")
        .preview_data_rows()
        .len();

    let payload = build_payload(&document, "A").expect("payload");
    assert_eq!(payload.attachment_name, "surveillance_A.csv");
    assert_eq!(payload.row_count, 12);
    assert!(payload.row_count > preview_data_rows);

    let csv = String::from_utf8(payload.csv).expect("utf-8");
    let mut lines = csv.lines();
    assert_eq!(lines.next(), Some("district,week,cases,reported"));
    assert!(lines.next().is_some_and(|line| line.starts_with("North,1,12.5,2024-01-01")));
    assert_eq!(csv.lines().count(), 13);
}

#[test]
fn extract_sheet_finds_later_sheet_by_name() {
    let sheet = extract_sheet(&workbook(), "B")
        .expect("decoded")
        .expect("sheet B");
    assert_eq!(sheet.rows.len(), 3);

    assert_eq!(extract_sheet(&workbook(), "C").expect("decoded"), None);
}
