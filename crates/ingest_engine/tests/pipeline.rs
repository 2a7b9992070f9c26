//! Stage, submit and track against a mock backend.

use std::sync::Arc;
use std::time::Duration;

use ingest_core::{JobStatus, PollSettings, RequiredColumns, StopReason};
use ingest_engine::{
    stage, submit, ApiSettings, HttpJobApi, JobApi, JobTracker, SourceDocument, StagingSettings,
};
use pretty_assertions::assert_eq;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn api_for(server: &MockServer) -> Arc<dyn JobApi> {
    let api = HttpJobApi::new(ApiSettings {
        base_url: format!("{}/api/", server.uri()),
        ..ApiSettings::default()
    })
    .expect("api client");
    Arc::new(api)
}

fn fast_polling() -> PollSettings {
    PollSettings {
        interval: Duration::from_millis(50),
        max_polls: None,
    }
}

fn staged_document() -> SourceDocument {
    SourceDocument::new(
        "surveillance.csv",
        "district,week,cases\nNorth,1,12\nSouth,1,7\n",
    )
}

#[tokio::test]
async fn submitted_job_is_tracked_to_completion() {
    ingest_logging::initialize_for_tests();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/jobs/"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "job_id": "abc123"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/jobs/abc123/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "abc123",
            "status": "pending",
            "progress_percentage": 0
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/jobs/abc123/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": "abc123",
            "status": "completed",
            "progress_percentage": 100,
            "completed_steps": 3,
            "total_steps": 3,
            "duration_seconds": 1.5,
            "result_data": { "rows_inserted": 2 }
        })))
        .mount(&server)
        .await;

    let document = staged_document();
    let settings = StagingSettings {
        required_columns: RequiredColumns::new(["district", "cases"]),
        ..StagingSettings::default()
    };
    let session = stage(&document, &settings).expect("staged");
    let table = session.selected_table().expect("selected table");

    let api = api_for(&server);
    let job_id = submit(api.as_ref(), &document, table).await.expect("job id");
    assert_eq!(job_id, "abc123");

    let tracker = JobTracker::spawn(api, fast_polling());
    tracker.start_polling(job_id);
    let view = tokio::time::timeout(Duration::from_secs(5), tracker.wait_for_idle())
        .await
        .expect("tracker settles");

    assert!(!view.is_polling);
    assert_eq!(view.latest_status(), Some(JobStatus::Completed));
    assert_eq!(
        view.stop_reason,
        Some(StopReason::Terminal(JobStatus::Completed))
    );
    assert_eq!(view.polls_issued, 2);
    let job = view.latest_job.expect("latest job");
    assert_eq!(job.result_payload.as_deref(), Some(r#"{"rows_inserted":2}"#));
}

#[tokio::test]
async fn failing_status_endpoint_stops_polling() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/jobs/abc123/"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let tracker = JobTracker::spawn(api_for(&server), fast_polling());
    tracker.start_polling("abc123");
    let view = tokio::time::timeout(Duration::from_secs(5), tracker.wait_for_idle())
        .await
        .expect("tracker settles");
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(!view.is_polling);
    assert_eq!(view.latest_job, None);
    assert_eq!(view.stop_reason, Some(StopReason::TransportError));
    assert!(view.last_transport_error.is_some());
}

#[tokio::test]
async fn rejected_submission_creates_no_job() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/jobs/"))
        .respond_with(ResponseTemplate::new(422).set_body_json(serde_json::json!({
            "detail": "Column 'cases' must be numeric"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let document = staged_document();
    let session = stage(&document, &StagingSettings::default()).expect("staged");
    let table = session.selected_table().expect("selected table");

    let err = submit(api_for(&server).as_ref(), &document, table)
        .await
        .unwrap_err();
    assert_eq!(err.message(), "Column 'cases' must be numeric");
}
