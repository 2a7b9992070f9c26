use ingest_core::{CellValue, RequiredColumns};
use ingest_engine::{
    build_payload, stage, SourceDocument, StageError, StagingSettings, SubmissionError,
};
use pretty_assertions::assert_eq;

fn settings(required: &[&str]) -> StagingSettings {
    StagingSettings {
        preview_rows: 3,
        required_columns: RequiredColumns::new(required.iter().copied()),
    }
}

const CASES_CSV: &str = "district,week,cases\n\
North,1,12\n\
South,1,7\n\
,,\n\
East,2,  3  \n\
West,2,5\n";

#[test]
fn csv_document_stages_as_single_table_named_after_file() {
    ingest_logging::initialize_for_tests();
    let document = SourceDocument::new("weekly_cases.csv", CASES_CSV);
    let session = stage(&document, &settings(&["district", "cases"])).expect("staged");

    assert_eq!(session.table_names(), vec!["weekly_cases"]);
    assert_eq!(session.selected_table_name(), Some("weekly_cases"));
    let table = session.selected_table().expect("table");
    assert_eq!(table.columns, vec!["district", "week", "cases"]);
    assert_eq!(table.rows.len(), 3);
    assert_eq!(table.total_row_count, 6);
    assert_eq!(table.rows[1][0], CellValue::Text("North".to_string()));
}

#[test]
fn tsv_document_uses_tab_delimiter() {
    let document = SourceDocument::new("cases.tsv", "district\tcases\nNorth\t4\n");
    let session = stage(&document, &settings(&["district", "cases"])).expect("staged");

    assert_eq!(
        session.selected_table().map(|table| table.columns.clone()),
        Some(vec!["district".to_string(), "cases".to_string()])
    );
}

#[test]
fn document_without_required_columns_reports_validation_error() {
    let document = SourceDocument::new("weekly_cases.csv", CASES_CSV);
    let session = stage(&document, &settings(&["district", "deaths"])).expect("staged");

    assert!(session.is_empty());
    assert_eq!(session.selected_table_name(), None);
    let message = session.validation_error().expect("validation error");
    assert!(message.contains("Scanned 1 sheet"));
    assert_eq!(
        session.rejected()[0].validation.missing_columns,
        vec!["deaths".to_string()]
    );
}

#[test]
fn garbled_workbook_is_parse_error() {
    let document = SourceDocument::new("cases.xlsx", b"PK\x03\x04 definitely not a zip".to_vec());
    let err = stage(&document, &StagingSettings::default()).unwrap_err();

    let StageError::Parse { document, .. } = err;
    assert_eq!(document, "cases.xlsx");
}

#[test]
fn undecodable_text_is_parse_error() {
    // A UTF-8 BOM followed by invalid UTF-8.
    let document = SourceDocument::new("cases.csv", b"\xEF\xBB\xBFa,b\n\xFF\xFE\xFD\n".to_vec());
    assert!(stage(&document, &StagingSettings::default()).is_err());
}

#[test]
fn payload_rederives_full_table_beyond_preview() {
    let document = SourceDocument::new("weekly_cases.csv", CASES_CSV);
    let session = stage(&document, &settings(&["district"])).expect("staged");
    let table = session.selected_table().expect("table");
    assert_eq!(table.rows.len(), 3);

    let payload = build_payload(&document, &table.name).expect("payload");
    assert_eq!(payload.original_filename, "weekly_cases.csv");
    assert_eq!(payload.sheet_name, "weekly_cases");
    assert_eq!(payload.attachment_name, "weekly_cases_weekly_cases.csv");
    assert_eq!(payload.row_count, 4);
    assert_eq!(
        String::from_utf8(payload.csv).unwrap(),
        "district,week,cases\nNorth,1,12\nSouth,1,7\nEast,2,3\nWest,2,5\n"
    );
}

#[test]
fn payload_for_unknown_sheet_fails() {
    let document = SourceDocument::new("weekly_cases.csv", CASES_CSV);
    let err = build_payload(&document, "Sheet9").unwrap_err();
    assert!(matches!(err, SubmissionError::UnknownTable { .. }));
}
