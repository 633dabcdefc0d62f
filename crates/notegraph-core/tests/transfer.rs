use std::sync::Arc;
use std::time::Duration;

use notegraph_config::{ClientConfig, PollPolicy};
use notegraph_core::{ErrorClass, NoteClient, NoteError, OperationStatus};
use notegraph_telemetry::Metrics;
use notegraph_test_support::fixtures;
use notegraph_test_support::mocks::{MockTransport, RecordingSleeper};
use reqwest::Method;

const COPY_PAGE: &str = "/onenote/pages/p-1/copyToSection";
const OPERATION: &str = "/onenote/operations/op-1";
const SOURCE_PAGE: &str = "/onenote/pages/p-1";

struct Harness {
    client: NoteClient,
    transport: Arc<MockTransport>,
    sleeper: Arc<RecordingSleeper>,
    metrics: Metrics,
}

fn harness_with(poll: PollPolicy) -> anyhow::Result<Harness> {
    let config = ClientConfig {
        poll,
        ..ClientConfig::default()
    };
    let transport = Arc::new(MockTransport::new());
    let sleeper = Arc::new(RecordingSleeper::new());
    let metrics = Metrics::new()?;
    let client = NoteClient::with_transport(
        &config,
        transport.clone(),
        sleeper.clone(),
        metrics.clone(),
    )?;
    Ok(Harness {
        client,
        transport,
        sleeper,
        metrics,
    })
}

fn harness() -> anyhow::Result<Harness> {
    harness_with(PollPolicy::default())
}

#[tokio::test]
async fn copy_treats_unavailable_as_running_until_completed() -> anyhow::Result<()> {
    let h = harness()?;
    h.transport
        .enqueue(Method::POST, COPY_PAGE, fixtures::copy_accepted("op-1"));
    h.transport.enqueue_all(
        Method::GET,
        OPERATION,
        [
            fixtures::unavailable(),
            fixtures::operation("op-1", "Running"),
            fixtures::operation_completed("op-1", &fixtures::page_location("1-new!9")),
        ],
    );

    let new_id = h.client.copy_page("p-1", "s-1").await?;

    assert_eq!(new_id, "1-new!9");
    assert_eq!(h.transport.count(&Method::GET, OPERATION), 3);
    assert_eq!(h.sleeper.pauses().len(), 2);
    assert_eq!(h.metrics.snapshot().operation_polls_total, 3);

    let submit = &h.transport.calls()[0];
    assert_eq!(submit.header("content-type"), Some("application/json"));
    assert_eq!(submit.body_text(), "{\"id\":\"s-1\"}");
    Ok(())
}

#[tokio::test]
async fn failed_operation_stops_polling_immediately() -> anyhow::Result<()> {
    let h = harness()?;
    h.transport
        .enqueue(Method::POST, COPY_PAGE, fixtures::copy_accepted("op-1"));
    h.transport.enqueue_all(
        Method::GET,
        OPERATION,
        [
            fixtures::operation_failed("op-1", "section is read-only"),
            fixtures::operation("op-1", "Running"),
        ],
    );

    let err = h
        .client
        .copy_page("p-1", "s-1")
        .await
        .expect_err("failed operation must surface");

    assert_eq!(err.class(), ErrorClass::Remote);
    assert!(matches!(
        err,
        NoteError::OperationFailed { ref detail, .. } if detail.as_deref() == Some("section is read-only")
    ));
    assert_eq!(h.transport.count(&Method::GET, OPERATION), 1);
    assert!(h.sleeper.pauses().is_empty());
    Ok(())
}

#[tokio::test]
async fn thirty_running_statuses_time_out_with_growing_jitter() -> anyhow::Result<()> {
    let h = harness()?;
    h.transport
        .enqueue(Method::POST, COPY_PAGE, fixtures::copy_accepted("op-1"));
    h.transport.enqueue_all(
        Method::GET,
        OPERATION,
        (0..31).map(|_| fixtures::operation("op-1", "Running")),
    );

    let err = h
        .client
        .copy_page("p-1", "s-1")
        .await
        .expect_err("budget must run out");

    assert_eq!(err.class(), ErrorClass::Timeout);
    assert!(matches!(
        err,
        NoteError::PollTimeout {
            attempts: 30,
            unavailable: 0,
            ..
        }
    ));
    assert_eq!(h.transport.count(&Method::GET, OPERATION), 30);

    let pauses = h.sleeper.pauses();
    assert_eq!(pauses.len(), 29);
    for (attempt, pause) in (0_u64..).zip(&pauses) {
        assert!(*pause >= Duration::from_secs(1), "{attempt}: {pause:?}");
        assert!(*pause <= Duration::from_secs(2 + attempt), "{attempt}: {pause:?}");
    }
    Ok(())
}

#[tokio::test]
async fn unavailable_responses_consume_the_same_budget() -> anyhow::Result<()> {
    let h = harness_with(PollPolicy::immediate(3))?;
    h.transport
        .enqueue(Method::POST, COPY_PAGE, fixtures::copy_accepted("op-1"));
    h.transport.enqueue_all(
        Method::GET,
        OPERATION,
        [
            fixtures::unavailable(),
            fixtures::unavailable(),
            fixtures::unavailable(),
        ],
    );

    let err = h
        .client
        .copy_page("p-1", "s-1")
        .await
        .expect_err("budget must run out");

    assert!(matches!(
        err,
        NoteError::PollTimeout {
            attempts: 3,
            unavailable: 3,
            ..
        }
    ));
    assert_eq!(h.sleeper.pauses(), vec![Duration::ZERO, Duration::ZERO]);
    Ok(())
}

#[tokio::test]
async fn submit_requires_accepted_status() -> anyhow::Result<()> {
    let h = harness()?;
    h.transport.enqueue(
        Method::POST,
        COPY_PAGE,
        notegraph_core::ApiResponse::new(200, "{\"status\":\"completed\",\"id\":\"op-1\"}"),
    );

    let err = h
        .client
        .copy_page("p-1", "s-1")
        .await
        .expect_err("only 202 is accepted");

    assert!(matches!(err, NoteError::Remote { status: 200, .. }));
    assert_eq!(h.transport.call_count(), 1);
    assert_eq!(h.metrics.snapshot().operation_polls_total, 0);
    Ok(())
}

#[tokio::test]
async fn submit_without_operation_id_is_malformed() -> anyhow::Result<()> {
    let h = harness()?;
    h.transport.enqueue(
        Method::POST,
        COPY_PAGE,
        notegraph_core::ApiResponse::new(202, "{\"status\":\"notStarted\"}"),
    );

    let err = h
        .client
        .copy_page("p-1", "s-1")
        .await
        .expect_err("missing id");

    assert!(matches!(err, NoteError::MalformedResponse { .. }));
    assert_eq!(h.transport.call_count(), 1);
    Ok(())
}

#[tokio::test]
async fn completed_without_location_is_malformed() -> anyhow::Result<()> {
    let h = harness()?;
    h.transport
        .enqueue(Method::POST, COPY_PAGE, fixtures::copy_accepted("op-1"));
    h.transport
        .enqueue(Method::GET, OPERATION, fixtures::operation("op-1", "Completed"));

    let err = h
        .client
        .copy_page("p-1", "s-1")
        .await
        .expect_err("completed without location");

    assert!(matches!(err, NoteError::MalformedResponse { .. }));
    Ok(())
}

#[tokio::test]
async fn invalid_identifiers_make_no_calls() -> anyhow::Result<()> {
    let h = harness()?;

    let err = h
        .client
        .copy_page("p-1/../x", "s-1")
        .await
        .expect_err("slash is invalid");
    assert_eq!(err.class(), ErrorClass::Validation);
    let err = h
        .client
        .copy_page("p-1", "")
        .await
        .expect_err("empty section");
    assert_eq!(err.class(), ErrorClass::Validation);

    assert_eq!(h.transport.call_count(), 0);
    Ok(())
}

#[tokio::test]
async fn move_deletes_source_after_copy() -> anyhow::Result<()> {
    let h = harness()?;
    h.transport
        .enqueue(Method::POST, COPY_PAGE, fixtures::copy_accepted("op-1"));
    h.transport.enqueue(
        Method::GET,
        OPERATION,
        fixtures::operation_completed("op-1", &fixtures::page_location("p-2")),
    );
    h.transport
        .enqueue(Method::DELETE, SOURCE_PAGE, fixtures::no_content());

    let outcome = h.client.move_page("p-1", "s-1").await?;

    assert_eq!(outcome.page_id, "p-2");
    assert!(outcome.source_deleted);
    assert_eq!(outcome.warning, None);
    assert_eq!(h.transport.count(&Method::DELETE, SOURCE_PAGE), 1);
    Ok(())
}

#[tokio::test]
async fn move_reports_partial_success_when_delete_fails() -> anyhow::Result<()> {
    let h = harness()?;
    h.transport
        .enqueue(Method::POST, COPY_PAGE, fixtures::copy_accepted("op-1"));
    h.transport.enqueue(
        Method::GET,
        OPERATION,
        fixtures::operation_completed("op-1", &fixtures::page_location("p-2")),
    );
    h.transport.enqueue(
        Method::DELETE,
        SOURCE_PAGE,
        notegraph_core::ApiResponse::new(403, "forbidden"),
    );

    let outcome = h.client.move_page("p-1", "s-1").await?;

    assert_eq!(outcome.page_id, "p-2");
    assert!(outcome.is_partial());
    let warning = outcome.warning.unwrap_or_default();
    assert!(warning.contains("p-1"), "{warning}");
    assert!(warning.contains("403"), "{warning}");
    Ok(())
}

#[tokio::test]
async fn move_skips_delete_when_copy_fails() -> anyhow::Result<()> {
    let h = harness()?;
    h.transport
        .enqueue(Method::POST, COPY_PAGE, fixtures::copy_accepted("op-1"));
    h.transport.enqueue(
        Method::GET,
        OPERATION,
        fixtures::operation_failed("op-1", "quota exceeded"),
    );

    let result = h.client.move_page("p-1", "s-1").await;

    assert!(result.is_err());
    assert_eq!(h.transport.count(&Method::DELETE, SOURCE_PAGE), 0);
    Ok(())
}

#[tokio::test]
async fn copy_section_sends_rename_and_resolves_section_location() -> anyhow::Result<()> {
    let h = harness()?;
    h.transport.enqueue(
        Method::POST,
        "/onenote/sections/s-1/copyToNotebook",
        fixtures::copy_accepted("op-1"),
    );
    h.transport.enqueue(
        Method::GET,
        OPERATION,
        fixtures::operation_completed("op-1", &fixtures::section_location("s-9")),
    );

    let new_id = h
        .client
        .copy_section("s-1", "nb-1", Some("Archive"))
        .await?;

    assert_eq!(new_id, "s-9");
    let body: serde_json::Value = serde_json::from_str(&h.transport.calls()[0].body_text())?;
    assert_eq!(body, serde_json::json!({"id": "nb-1", "renameAs": "Archive"}));
    Ok(())
}

#[tokio::test]
async fn operation_status_reports_unavailable_as_running_with_note() -> anyhow::Result<()> {
    let h = harness()?;
    h.transport.enqueue_all(
        Method::GET,
        OPERATION,
        [
            fixtures::unavailable(),
            notegraph_core::ApiResponse::new(500, "boom"),
        ],
    );

    let operation = h.client.operation_status("op-1").await?;
    assert_eq!(operation.status, OperationStatus::Running);
    assert!(operation.note.is_some());

    let err = h
        .client
        .operation_status("op-1")
        .await
        .expect_err("500 is a hard error");
    assert!(matches!(err, NoteError::Remote { status: 500, .. }));
    Ok(())
}
