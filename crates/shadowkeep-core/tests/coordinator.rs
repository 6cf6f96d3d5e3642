// crates/shadowkeep-core/tests/coordinator.rs
// ============================================================================
// Module: Scan Coordinator Tests
// Description: Request validation, defaults, naming, and local dispatch.
// Purpose: Ensure runs start only for valid, allowed requests.
// Dependencies: shadowkeep-core, async-trait, serde_json, tokio
// ============================================================================

//! ## Overview
//! Validates the coordinator error codes, default resolution, execution and
//! task naming, an end-to-end run through the tokio dispatcher, and how long
//! the dispatcher keeps run handles nobody took.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod common;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;
use shadowkeep_core::CoordinatorError;
use shadowkeep_core::CoordinatorInput;
use shadowkeep_core::CoordinatorPolicy;
use shadowkeep_core::DEFAULT_RETAINED_RUNS;
use shadowkeep_core::DispatchError;
use shadowkeep_core::DispatchReceipt;
use shadowkeep_core::InMemoryShadowStore;
use shadowkeep_core::MemoryEventSink;
use shadowkeep_core::ResourceName;
use shadowkeep_core::RunDefaults;
use shadowkeep_core::RunPlan;
use shadowkeep_core::ScanCoordinator;
use shadowkeep_core::SegmentDispatcher;
use shadowkeep_core::TokioSegmentDispatcher;
use shadowkeep_core::WorkerStatus;
use time::OffsetDateTime;

use crate::common::article_data;
use crate::common::articles_config;
use crate::common::seed_bare;
use crate::common::worker;

/// Dispatcher that records plans instead of running them.
#[derive(Default)]
struct RecordingDispatcher {
    plans: Mutex<Vec<RunPlan>>,
    fail: bool,
}

#[async_trait]
impl SegmentDispatcher for RecordingDispatcher {
    async fn dispatch(&self, plan: RunPlan) -> Result<DispatchReceipt, DispatchError> {
        if self.fail {
            return Err(DispatchError::Failed("state machine unavailable".to_string()));
        }
        let receipt = DispatchReceipt {
            execution_id: format!("exec:{}", plan.execution_name),
            dispatched: plan.tasks.len(),
        };
        self.plans.lock().unwrap().push(plan);
        Ok(receipt)
    }
}

fn policy() -> CoordinatorPolicy {
    CoordinatorPolicy::new(
        BTreeSet::from([ResourceName::new("articles"), ResourceName::new("tasks")]),
        RunDefaults::default(),
    )
}

fn fixed_clock() -> OffsetDateTime {
    OffsetDateTime::from_unix_timestamp(1_732_627_200).unwrap()
}

fn coordinator(
    dispatcher: Arc<RecordingDispatcher>,
) -> (ScanCoordinator, Arc<MemoryEventSink>) {
    let events = Arc::new(MemoryEventSink::new());
    let coordinator =
        ScanCoordinator::new(policy(), dispatcher, events.clone()).with_clock(fixed_clock);
    (coordinator, events)
}

#[tokio::test]
async fn defaults_apply_and_tasks_cover_every_segment() {
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let (coordinator, events) = coordinator(dispatcher.clone());

    let output = coordinator.start_json(&json!({ "resource": "articles" })).await.unwrap();

    let plans = dispatcher.plans.lock().unwrap();
    let plan = &plans[0];
    assert_eq!(plan.total_segments, 8);
    assert!(plan.dry_run);
    assert_eq!(plan.page_limit, 100);
    assert_eq!(plan.tasks.len(), 8);
    assert!(plan.execution_name.starts_with("articles-1732627200000-"));
    let suffix = plan.execution_name.rsplit('-').next().unwrap();
    assert_eq!(suffix.len(), 6);
    assert!(suffix.chars().all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit()));
    for (index, task) in plan.tasks.iter().enumerate() {
        assert_eq!(task.name, format!("{}-seg{index}", plan.execution_name));
        assert_eq!(task.input.segment as usize, index);
        assert_eq!(task.input.total_segments, 8);
        assert_eq!(task.input.run_id, plan.run_id);
    }
    assert_eq!(output.execution_id, format!("exec:{}", plan.execution_name));
    assert_eq!(output.started_at, "2024-11-26T13:20:00Z");
    assert_eq!(events.event_names(), vec!["coordinator_started".to_string()]);
}

#[tokio::test]
async fn explicit_values_override_defaults() {
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let (coordinator, _) = coordinator(dispatcher.clone());
    coordinator
        .start(&CoordinatorInput {
            resource: "tasks".to_string(),
            segments: Some(3),
            dry_run: Some(false),
            page_limit: Some(7),
        })
        .await
        .unwrap();
    let plans = dispatcher.plans.lock().unwrap();
    assert_eq!(plans[0].total_segments, 3);
    assert!(!plans[0].dry_run);
    assert_eq!(plans[0].page_limit, 7);
}

#[tokio::test]
async fn invalid_requests_map_to_stable_codes() {
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let (coordinator, events) = coordinator(dispatcher.clone());
    let cases = [
        (json!({}), "INVALID_INPUT"),
        (json!({ "resource": "" }), "INVALID_INPUT"),
        (json!({ "resource": 42 }), "INVALID_INPUT"),
        (json!({ "resource": "articles", "segments": 0 }), "INVALID_INPUT"),
        (json!({ "resource": "articles", "segments": 2.5 }), "INVALID_INPUT"),
        (json!({ "resource": "articles", "segments": -1 }), "INVALID_INPUT"),
        (json!({ "resource": "articles", "segments": 1_000_001 }), "INVALID_INPUT"),
        (json!({ "resource": "articles", "dryRun": "yes" }), "INVALID_INPUT"),
        (json!({ "resource": "articles", "pageLimit": 0 }), "INVALID_INPUT"),
        (json!({ "resource": "users" }), "RESOURCE_NOT_ALLOWED"),
    ];
    for (request, code) in &cases {
        let err = coordinator.start_json(request).await.unwrap_err();
        assert_eq!(err.code(), *code, "request {request}");
    }
    assert!(dispatcher.plans.lock().unwrap().is_empty());
    assert!(events.event_names().iter().all(|name| name == "coordinator_rejected"));
    assert_eq!(events.event_names().len(), cases.len());
}

#[tokio::test]
async fn empty_allow_list_is_a_config_error() {
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let coordinator = ScanCoordinator::new(
        CoordinatorPolicy::default(),
        dispatcher,
        Arc::new(MemoryEventSink::new()),
    );
    let err = coordinator.start_json(&json!({ "resource": "articles" })).await.unwrap_err();
    assert!(matches!(err, CoordinatorError::Config(_)));
    assert_eq!(err.code(), "CONFIG_ERROR");
}

#[tokio::test]
async fn dispatch_failures_surface_as_sfn_error() {
    let dispatcher = Arc::new(RecordingDispatcher {
        plans: Mutex::new(Vec::new()),
        fail: true,
    });
    let (coordinator, _) = coordinator(dispatcher);
    let err = coordinator.start_json(&json!({ "resource": "articles" })).await.unwrap_err();
    assert_eq!(err.code(), "SFN_ERROR");
}

#[tokio::test]
async fn every_run_gets_a_fresh_run_id() {
    let dispatcher = Arc::new(RecordingDispatcher::default());
    let (coordinator, _) = coordinator(dispatcher.clone());
    coordinator.start_json(&json!({ "resource": "articles" })).await.unwrap();
    coordinator.start_json(&json!({ "resource": "articles" })).await.unwrap();
    let plans = dispatcher.plans.lock().unwrap();
    assert_ne!(plans[0].run_id, plans[1].run_id);
}

#[tokio::test]
async fn tokio_dispatcher_runs_and_aggregates_segments() {
    let store = InMemoryShadowStore::new();
    for index in 0..40 {
        seed_bare(&store, &format!("r{index}"), article_data("T", index));
    }
    let (segment_worker, _) = worker(&store, articles_config());
    let dispatcher = Arc::new(TokioSegmentDispatcher::new(segment_worker));
    let coordinator = ScanCoordinator::new(
        policy(),
        dispatcher.clone(),
        Arc::new(MemoryEventSink::new()),
    );

    let output = coordinator
        .start_json(&json!({ "resource": "articles", "segments": 4, "dryRun": false }))
        .await
        .unwrap();
    let summary = dispatcher.take_run(&output.execution_id).unwrap().join().await;

    assert_eq!(summary.segments.len(), 4);
    assert_eq!(summary.failed_segments, 0);
    assert_eq!(summary.totals.scanned, 40);
    assert_eq!(summary.totals.repaired, 40);
    assert!(summary.segments.iter().all(|segment| {
        segment.output.as_ref().is_some_and(|output| output.status == WorkerStatus::Done)
    }));
    assert!(dispatcher.take_run(&output.execution_id).is_none());
}

fn tokio_coordinator(retention: usize) -> (ScanCoordinator, Arc<TokioSegmentDispatcher>) {
    let store = InMemoryShadowStore::new();
    seed_bare(&store, "r1", article_data("T", 1));
    let (segment_worker, _) = worker(&store, articles_config());
    let dispatcher =
        Arc::new(TokioSegmentDispatcher::new(segment_worker).with_retention(retention));
    let coordinator =
        ScanCoordinator::new(policy(), dispatcher.clone(), Arc::new(MemoryEventSink::new()));
    (coordinator, dispatcher)
}

async fn wait_until_finished(dispatcher: &TokioSegmentDispatcher, execution_id: &str) {
    for _ in 0..1_000 {
        if dispatcher.run_finished(execution_id) == Some(true) {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("run {execution_id} did not finish");
}

#[tokio::test]
async fn finished_untaken_runs_are_evicted_at_retention_limit() {
    let (coordinator, dispatcher) = tokio_coordinator(1);
    let request = json!({ "resource": "articles", "segments": 2, "dryRun": true });

    let first = coordinator.start_json(&request).await.unwrap();
    wait_until_finished(&dispatcher, &first.execution_id).await;
    let second = coordinator.start_json(&request).await.unwrap();

    assert_eq!(dispatcher.registered_runs(), 1);
    assert!(dispatcher.take_run(&first.execution_id).is_none());
    let summary = dispatcher.take_run(&second.execution_id).unwrap().join().await;
    assert_eq!(summary.failed_segments, 0);
    assert_eq!(dispatcher.registered_runs(), 0);
}

#[tokio::test]
async fn running_runs_survive_the_retention_limit() {
    let (coordinator, dispatcher) = tokio_coordinator(1);
    let request = json!({ "resource": "articles", "segments": 2, "dryRun": true });

    let first = coordinator.start_json(&request).await.unwrap();
    let second = coordinator.start_json(&request).await.unwrap();

    assert_eq!(dispatcher.run_finished(&first.execution_id), Some(false));
    assert_eq!(dispatcher.registered_runs(), 2);
    let first = dispatcher.take_run(&first.execution_id).unwrap().join().await;
    let second = dispatcher.take_run(&second.execution_id).unwrap().join().await;
    assert_eq!(first.totals.scanned + second.totals.scanned, 2);
}

#[tokio::test]
async fn runs_below_the_retention_limit_stay_until_taken() {
    let (coordinator, dispatcher) = tokio_coordinator(DEFAULT_RETAINED_RUNS);
    let request = json!({ "resource": "articles", "segments": 1, "dryRun": true });

    let first = coordinator.start_json(&request).await.unwrap();
    wait_until_finished(&dispatcher, &first.execution_id).await;
    let second = coordinator.start_json(&request).await.unwrap();

    assert_eq!(dispatcher.registered_runs(), 2);
    assert!(dispatcher.take_run(&first.execution_id).unwrap().is_finished());
    assert!(dispatcher.take_run(&second.execution_id).is_some());
}
