//! # Pipeline Scenarios
//!
//! End-to-end runs against a scripted printer: ordering, per-ticket
//! failures, device faults, retries, cancellation and resume.

mod common;

use std::time::Duration;

use boleta::layout::NoFooter;
use boleta::printer::{DeviceError, HardwareFault};
use boleta::render::HeightPolicy;
use boleta::{
    BufferGauge, CancelToken, FailureReason, Pipeline, PrintStatus, ProgressEvent, RunConfig,
    TicketRecord, print_tickets, spawn_run,
};
use common::{MockSink, test_config, ticket, tickets};
use pretty_assertions::assert_eq;

fn statuses(summary: &boleta::RunSummary) -> Vec<PrintStatus> {
    summary.outcomes.iter().map(|o| o.status.clone()).collect()
}

fn ids(summary: &boleta::RunSummary) -> Vec<&str> {
    summary.outcomes.iter().map(|o| o.ticket_id.as_str()).collect()
}

#[test]
fn three_valid_tickets_print_in_order_with_one_live_buffer() {
    let gauge = BufferGauge::new();
    let sink = MockSink::new().watch(&gauge);
    let mut pipeline = Pipeline::new(&test_config(), sink.clone())
        .unwrap()
        .with_gauge(gauge.clone());

    let summary = pipeline.run(&tickets(&["1", "2", "3"]));

    assert_eq!(statuses(&summary), vec![PrintStatus::Printed; 3]);
    assert_eq!(ids(&summary), vec!["1", "2", "3"]);
    assert_eq!(sink.log().submissions, vec!["1", "2", "3"]);
    assert_eq!(sink.log().live_buffers, vec![1, 1, 1]);
    assert_eq!(gauge.peak(), 1);
    assert_eq!(gauge.live(), 0);
    assert_eq!(gauge.allocated(), 3);
    assert!(!summary.is_halted());
}

#[test]
fn invalid_record_fails_alone() {
    let mut records = tickets(&["1", "2", "3"]);
    records[1].qr_payload.clear();

    let sink = MockSink::new();
    let summary = print_tickets(&records, &test_config(), sink.clone()).unwrap();

    assert!(summary.outcomes[0].is_printed());
    assert!(matches!(
        summary.outcomes[1].failure(),
        Some(FailureReason::InvalidRecord(_))
    ));
    assert!(summary.outcomes[2].is_printed());
    assert_eq!(sink.log().submissions, vec!["1", "3"]);
    assert_eq!(summary.headline(), "2 printed, 1 failed, 0 skipped");
}

#[test]
fn paper_out_halts_run_without_retry() {
    let sink = MockSink::new().fail("2", DeviceError::Hardware(HardwareFault::PaperOut));
    let summary = print_tickets(&tickets(&["1", "2", "3"]), &test_config(), sink.clone()).unwrap();

    assert_eq!(
        statuses(&summary),
        vec![
            PrintStatus::Printed,
            PrintStatus::Failed(FailureReason::Hardware(HardwareFault::PaperOut)),
            PrintStatus::Skipped,
        ]
    );
    assert_eq!(sink.log().attempts_for("2"), 1);
    assert_eq!(sink.log().attempts_for("3"), 0);
    let halt = summary.halt.as_ref().unwrap();
    assert_eq!(halt.ticket_id, "2");
    assert!(summary.to_string().contains("paper-out"));
}

#[test]
fn timeout_is_retried_once() {
    let sink = MockSink::new().fail("1", DeviceError::Timeout(Duration::from_millis(10)));
    let summary = print_tickets(&tickets(&["1"]), &test_config(), sink.clone()).unwrap();

    assert!(summary.outcomes[0].is_printed());
    assert_eq!(summary.outcomes[0].attempts, 2);
    assert_eq!(sink.log().attempts_for("1"), 2);
}

#[test]
fn timeout_beyond_budget_fails_ticket_and_continues() {
    let timeout = || DeviceError::Timeout(Duration::from_millis(10));
    let sink = MockSink::new().fail("1", timeout()).fail("1", timeout());
    let summary = print_tickets(&tickets(&["1", "2"]), &test_config(), sink.clone()).unwrap();

    assert_eq!(summary.outcomes[0].failure(), Some(&FailureReason::Timeout));
    assert!(summary.outcomes[1].is_printed());
    assert!(!summary.is_halted());
    assert_eq!(sink.log().attempts_for("1"), 2);
}

#[test]
fn larger_retry_budget() {
    let timeout = || DeviceError::Timeout(Duration::from_millis(10));
    let sink = MockSink::new()
        .fail("1", timeout())
        .fail("1", timeout())
        .fail("1", timeout());
    let mut config = test_config();
    config.dispatch.retry_budget = 3;

    let summary = print_tickets(&tickets(&["1"]), &config, sink.clone()).unwrap();
    assert!(summary.outcomes[0].is_printed());
    assert_eq!(sink.log().attempts_for("1"), 4);
}

#[test]
fn hardware_fault_with_continue_policy() {
    let sink = MockSink::new().fail("1", DeviceError::Hardware(HardwareFault::CoverOpen));
    let config = RunConfig::from_toml(
        r#"
[dispatch]
inter_print_delay_ms = 0
on_hardware_error = "continue"
"#,
    )
    .unwrap();

    let summary = print_tickets(&tickets(&["1", "2"]), &config, sink).unwrap();
    assert_eq!(summary.headline(), "1 printed, 1 failed, 0 skipped");
    assert!(!summary.is_halted());
}

#[test]
fn line_item_limit_is_inclusive() {
    let mut config = test_config();
    config.composer.max_line_items = 5;

    let at_limit = (0..5).fold(TicketRecord::new("at", "qr"), |r, i| {
        r.item(format!("item {}", i), "1.00")
    });
    let over_limit = at_limit.clone().item("one more", "1.00");
    let over_limit = TicketRecord {
        id: "over".into(),
        ..over_limit
    };

    let summary = print_tickets(&[at_limit, over_limit], &config, MockSink::new()).unwrap();
    assert!(summary.outcomes[0].is_printed());
    assert!(matches!(
        summary.outcomes[1].failure(),
        Some(FailureReason::InvalidRecord(_))
    ));
}

#[test]
fn canvas_overflow_fails_ticket_only() {
    let mut config = test_config();
    config.canvas.height_policy = HeightPolicy::Fixed(200);

    let sink = MockSink::new();
    let summary = print_tickets(&tickets(&["1", "2"]), &config, sink.clone()).unwrap();

    for outcome in &summary.outcomes {
        assert!(matches!(
            outcome.failure(),
            Some(FailureReason::CanvasOverflow(_))
        ));
    }
    assert!(sink.log().submissions.is_empty());
    assert!(!summary.is_halted());
}

#[test]
fn oversized_margins_are_rejected_or_overflow() {
    let mut config = test_config();
    config.canvas.margin_top = u32::MAX - 10;
    assert!(Pipeline::new(&config, MockSink::new()).is_err());

    config.canvas.margin_top = 3990;
    let sink = MockSink::new();
    let summary = Pipeline::new(&config, sink.clone())
        .unwrap()
        .run(&[TicketRecord::new("1", "p"), ticket("2")]);

    assert_eq!(summary.headline(), "0 printed, 2 failed, 0 skipped");
    assert!(matches!(
        summary.outcomes[0].failure(),
        Some(FailureReason::CanvasOverflow(_))
    ));
    assert!(sink.log().submissions.is_empty());
}

#[test]
fn long_line_item_value_is_printed_in_full() {
    let record = TicketRecord::new("long", "qr").item("", "7".repeat(60));
    let short = TicketRecord::new("short", "qr").item("", "7");

    let sink = MockSink::new();
    let summary = print_tickets(&[record, short], &test_config(), sink.clone()).unwrap();

    assert_eq!(summary.printed(), 2);
    let heights = sink.log().heights.clone();
    assert_eq!(heights[0], heights[1] + 24);
}

#[test]
fn oversized_qr_payload_fails_ticket_only() {
    let records = vec![
        TicketRecord::new("big", "x".repeat(8000)),
        ticket("ok"),
    ];
    let summary = print_tickets(&records, &test_config(), MockSink::new()).unwrap();

    assert!(matches!(
        summary.outcomes[0].failure(),
        Some(FailureReason::QrEncoding(_))
    ));
    assert!(summary.outcomes[1].is_printed());
}

#[test]
fn cancellation_waits_for_ticket_in_flight() {
    let cancel = CancelToken::new();
    let sink = MockSink::new().cancel_during_first(&cancel);
    let mut pipeline = Pipeline::new(&test_config(), sink.clone())
        .unwrap()
        .with_cancel(cancel);

    let summary = pipeline.run(&tickets(&["1", "2", "3"]));

    assert!(summary.cancelled);
    assert_eq!(
        statuses(&summary),
        vec![PrintStatus::Printed, PrintStatus::Skipped, PrintStatus::Skipped]
    );
    assert_eq!(sink.log().submissions, vec!["1"]);
}

#[test]
fn resume_after_operator_fix() {
    let records = tickets(&["1", "2", "3", "4"]);
    let sink = MockSink::new().fail("2", DeviceError::Hardware(HardwareFault::PaperOut));
    let mut pipeline = Pipeline::new(&test_config(), sink.clone()).unwrap();

    let first = pipeline.run(&records);
    assert_eq!(first.headline(), "1 printed, 1 failed, 2 skipped");

    sink.repair();
    let second = pipeline.resume(&records, &first);

    assert_eq!(ids(&second), vec!["2", "3", "4"]);
    assert_eq!(second.printed(), 3);
    assert_ne!(first.run_id, second.run_id);
    assert_eq!(sink.log().submissions, vec!["1", "2", "2", "3", "4"]);
}

#[test]
fn resume_does_not_reprint_invalid_records() {
    let mut records = tickets(&["1", "2", "3"]);
    records[0].qr_payload.clear();
    let sink = MockSink::new().fail("2", DeviceError::Io("device vanished".into()));
    let mut pipeline = Pipeline::new(&test_config(), sink.clone()).unwrap();

    let first = pipeline.run(&records);
    assert!(first.is_halted());

    sink.repair();
    let second = pipeline.resume(&records, &first);
    assert_eq!(ids(&second), vec!["2", "3"]);
}

#[test]
fn default_footer_every_second_ticket() {
    let config = RunConfig::from_toml(
        r#"
[dispatch]
inter_print_delay_ms = 0

[footers]
default = ["Thanks for coming!"]
every = 2
"#,
    )
    .unwrap();
    let records = tickets(&["1", "2", "3", "4"]);

    let with_footer = MockSink::new();
    Pipeline::new(&config, with_footer.clone())
        .unwrap()
        .run(&records);
    let heights = with_footer.log().heights.clone();
    assert_eq!(heights[0], heights[2]);
    assert_eq!(heights[1], heights[3]);
    assert!(heights[1] > heights[0]);

    let without = MockSink::new();
    Pipeline::new(&config, without.clone())
        .unwrap()
        .with_footers(NoFooter)
        .run(&records);
    assert!(without.log().heights.iter().all(|&h| h == heights[0]));
}

#[tokio::test]
async fn background_run_reports_halt() {
    let sink = MockSink::new().fail("b", DeviceError::Hardware(HardwareFault::PaperOut));
    let pipeline = Pipeline::new(&test_config(), sink).unwrap();

    let mut handle = spawn_run(pipeline, tickets(&["a", "b", "c"]));
    let mut halted = None;
    let mut finished = 0;
    while let Some(event) = handle.next_event().await {
        match event {
            ProgressEvent::Halted(halt) => halted = Some(halt.ticket_id),
            ProgressEvent::TicketFinished(_) => finished += 1,
            _ => {}
        }
    }
    let summary = handle.join().await.unwrap();

    assert_eq!(halted.as_deref(), Some("b"));
    assert_eq!(finished, 3);
    assert_eq!(summary.skipped(), 1);
}

#[tokio::test]
async fn background_run_cancel() {
    let cancel = CancelToken::new();
    let sink = MockSink::new().cancel_during_first(&cancel);
    let pipeline = Pipeline::new(&test_config(), sink)
        .unwrap()
        .with_cancel(cancel);

    let handle = spawn_run(pipeline, tickets(&["a", "b"]));
    let summary = handle.join().await.unwrap();
    assert!(summary.cancelled);
    assert_eq!(summary.headline(), "1 printed, 0 failed, 1 skipped");
}
