#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use cmdflow_core::cmdflow_core_types::schema::{
    EVENT_END, EVENT_END_ERROR, EVENT_START, FIELD_COMMAND, FIELD_CONTEXT_ID, FIELD_DURATION_MS,
    FIELD_ERR_CODE, FIELD_ERR_KIND, FIELD_PHASE, PHASE_AFTER_SESSION_FLUSH, PHASE_CLOSED,
    PHASE_CLOSE_SESSIONS, PHASE_CLOSING, PHASE_FLUSH,
};
use cmdflow_core::logging_facility::init_test_capture;
use cmdflow_core::logging_facility::test_capture::TestCaptureLayer;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Layer;
use cmdflow_core::{Command, ExError, ResourceContext, Result};
use common::{executor, Journal};

struct PublishRevision;

impl Command<u32> for PublishRevision {
    fn execute(&self, _ctx: &ResourceContext) -> Result<u32> {
        Ok(7)
    }
}

struct RejectRevision;

impl Command<u32> for RejectRevision {
    fn execute(&self, _ctx: &ResourceContext) -> Result<u32> {
        Err(ExError::illegal_argument("revision is frozen"))
    }
}

fn events_for_command(
    capture: &cmdflow_core::logging_facility::TestCapture,
    command: &str,
) -> Vec<cmdflow_core::logging_facility::CapturedEvent> {
    capture
        .events_for("execute_command")
        .into_iter()
        .filter(|e| e.field(FIELD_COMMAND) == Some(command))
        .collect()
}

#[test]
fn test_logs_start_and_end_of_successful_command() {
    let capture = init_test_capture();
    let journal = Journal::new();

    let value: u32 = executor(&journal, None).execute(&PublishRevision).unwrap();
    assert_eq!(value, 7);

    let events = events_for_command(&capture, "PublishRevision");
    let kinds: Vec<_> = events.iter().filter_map(|e| e.event.clone()).collect();
    assert_eq!(kinds, vec![EVENT_START, EVENT_END]);
    assert!(events[1].field(FIELD_DURATION_MS).is_some());
    assert_eq!(events[0].field("propagation"), Some("REQUIRED"));
}

#[test]
fn test_logs_error_without_altering_it() {
    let capture = init_test_capture();
    let journal = Journal::new();

    let err = executor(&journal, None)
        .execute::<u32, _>(&RejectRevision)
        .unwrap_err();
    assert_eq!(err.message(), "revision is frozen");

    let events = events_for_command(&capture, "RejectRevision");
    let error_event = events
        .iter()
        .find(|e| e.event.as_deref() == Some(EVENT_END_ERROR))
        .expect("error event captured");
    assert_eq!(error_event.field(FIELD_ERR_CODE), Some("ERR_ILLEGAL_ARGUMENT"));
    assert_eq!(error_event.field(FIELD_ERR_KIND), Some("IllegalArgument"));
    assert_eq!(error_event.level, tracing::Level::WARN);
}

#[test]
fn test_silent_when_debug_disabled() {
    let (layer, capture) = TestCaptureLayer::new();
    let subscriber = tracing_subscriber::registry().with(layer.with_filter(LevelFilter::INFO));
    let journal = Journal::new();

    let value: u32 = tracing::subscriber::with_default(subscriber, || {
        executor(&journal, None).execute(&PublishRevision).unwrap()
    });

    assert_eq!(value, 7);
    assert!(capture.events_for("execute_command").is_empty());
}

#[test]
fn test_close_protocol_transitions_carry_context_and_phase() {
    let capture = init_test_capture();
    let journal = Journal::new();

    let context_id = executor(&journal, None)
        .execute(&|ctx: &ResourceContext| -> Result<String> { Ok(ctx.id().to_string()) })
        .unwrap();

    let phases: Vec<String> = capture
        .events()
        .into_iter()
        .filter(|e| e.field(FIELD_CONTEXT_ID) == Some(context_id.as_str()))
        .filter_map(|e| e.field(FIELD_PHASE).map(str::to_string))
        .collect();
    assert_eq!(
        phases,
        vec![
            PHASE_CLOSING,
            PHASE_FLUSH,
            PHASE_AFTER_SESSION_FLUSH,
            PHASE_CLOSE_SESSIONS,
            PHASE_CLOSED,
        ]
    );
}
