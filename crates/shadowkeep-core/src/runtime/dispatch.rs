// crates/shadowkeep-core/src/runtime/dispatch.rs
// ============================================================================
// Module: Local Segment Dispatcher
// Description: Runs every segment of a plan as a tokio task in this process.
// Purpose: Provide an in-process orchestration layer with run aggregation.
// Dependencies: async-trait, crate::{interfaces, runtime::worker}, serde, tokio
// ============================================================================

//! ## Overview
//! [`TokioSegmentDispatcher`] spawns one task per segment on the current tokio
//! runtime and keeps a [`RunHandle`] per execution. Segments share nothing
//! mutable; a failed segment never affects its siblings. Callers retrieve the
//! handle with [`TokioSegmentDispatcher::take_run`] and join it into a
//! [`RunSummary`].
//!
//! Handles stay registered until taken. Once the registry holds the retention
//! limit, the next dispatch evicts every finished handle nobody took; handles
//! with a running segment are never evicted.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::core::identifiers::ResourceName;
use crate::core::identifiers::RunId;
use crate::interfaces::DispatchError;
use crate::interfaces::DispatchReceipt;
use crate::interfaces::RunPlan;
use crate::interfaces::SegmentDispatcher;
use crate::runtime::worker::SegmentCounters;
use crate::runtime::worker::SegmentWorker;
use crate::runtime::worker::WorkerError;
use crate::runtime::worker::WorkerOutput;
use crate::runtime::worker::WorkerStatus;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default number of registered runs before finished ones are evicted.
pub const DEFAULT_RETAINED_RUNS: usize = 64;

// ============================================================================
// SECTION: Run Handles
// ============================================================================

/// Spawned segment task.
struct SegmentJob {
    /// Task name.
    name: String,
    /// Segment index.
    segment: u32,
    /// Worker task.
    handle: JoinHandle<Result<WorkerOutput, WorkerError>>,
}

/// Outcome of one segment within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentReport {
    /// Task name.
    pub name: String,
    /// Segment index.
    pub segment: u32,
    /// Worker output when the segment completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<WorkerOutput>,
    /// Fatal segment error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregated outcome of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    /// Execution identifier.
    pub execution_id: String,
    /// Shared run identifier.
    pub run_id: RunId,
    /// Maintained resource.
    pub resource: ResourceName,
    /// Counters summed over completed segments.
    pub totals: SegmentCounters,
    /// Segments that stopped at the page limit.
    pub limit_reached: usize,
    /// Segments that ended in a fatal error.
    pub failed_segments: usize,
    /// Per-segment reports in segment order.
    pub segments: Vec<SegmentReport>,
}

/// Handle to the tasks of one dispatched run.
pub struct RunHandle {
    /// Execution identifier.
    execution_id: String,
    /// Shared run identifier.
    run_id: RunId,
    /// Maintained resource.
    resource: ResourceName,
    /// Spawned segment tasks.
    jobs: Vec<SegmentJob>,
}

impl RunHandle {
    /// Returns the execution identifier.
    #[must_use]
    pub fn execution_id(&self) -> &str {
        &self.execution_id
    }

    /// Returns true once every segment task has finished.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.jobs.iter().all(|job| job.handle.is_finished())
    }

    /// Waits for every segment and aggregates their outputs.
    pub async fn join(self) -> RunSummary {
        let mut totals = SegmentCounters::default();
        let mut limit_reached = 0;
        let mut failed_segments = 0;
        let mut segments = Vec::with_capacity(self.jobs.len());
        for job in self.jobs {
            let (output, error) = match job.handle.await {
                Ok(Ok(output)) => {
                    totals.absorb(&output.counters);
                    if output.status == WorkerStatus::LimitReached {
                        limit_reached += 1;
                    }
                    (Some(output), None)
                }
                Ok(Err(err)) => {
                    failed_segments += 1;
                    (None, Some(format!("{}: {err}", err.code())))
                }
                Err(err) => {
                    failed_segments += 1;
                    (None, Some(format!("segment task aborted: {err}")))
                }
            };
            segments.push(SegmentReport {
                name: job.name,
                segment: job.segment,
                output,
                error,
            });
        }
        RunSummary {
            execution_id: self.execution_id,
            run_id: self.run_id,
            resource: self.resource,
            totals,
            limit_reached,
            failed_segments,
            segments,
        }
    }
}

// ============================================================================
// SECTION: Dispatcher
// ============================================================================

/// Dispatcher that runs segment workers as tokio tasks.
pub struct TokioSegmentDispatcher {
    /// Worker shared by every segment.
    worker: SegmentWorker,
    /// Handles of runs not yet taken.
    runs: Mutex<HashMap<String, RunHandle>>,
    /// Registry size at which finished handles are evicted.
    retention: usize,
}

impl TokioSegmentDispatcher {
    /// Creates a dispatcher around a worker.
    #[must_use]
    pub fn new(worker: SegmentWorker) -> Self {
        Self {
            worker,
            runs: Mutex::new(HashMap::new()),
            retention: DEFAULT_RETAINED_RUNS,
        }
    }

    /// Overrides the registry size at which finished handles are evicted.
    #[must_use]
    pub const fn with_retention(mut self, retention: usize) -> Self {
        self.retention = retention;
        self
    }

    /// Removes and returns the handle of a dispatched run.
    ///
    /// Returns `None` for unknown runs, runs already taken, and finished runs
    /// evicted by a later dispatch.
    #[must_use]
    pub fn take_run(&self, execution_id: &str) -> Option<RunHandle> {
        self.runs.lock().ok().and_then(|mut runs| runs.remove(execution_id))
    }

    /// Reports whether a registered run has finished.
    #[must_use]
    pub fn run_finished(&self, execution_id: &str) -> Option<bool> {
        self.runs.lock().ok().and_then(|runs| runs.get(execution_id).map(RunHandle::is_finished))
    }

    /// Returns the number of registered runs.
    #[must_use]
    pub fn registered_runs(&self) -> usize {
        self.runs.lock().map(|runs| runs.len()).unwrap_or_default()
    }
}

#[async_trait]
impl SegmentDispatcher for TokioSegmentDispatcher {
    async fn dispatch(&self, plan: RunPlan) -> Result<DispatchReceipt, DispatchError> {
        if plan.tasks.is_empty() {
            return Err(DispatchError::Rejected("run plan has no segment tasks".to_string()));
        }
        let mut runs = self
            .runs
            .lock()
            .map_err(|_| DispatchError::Failed("run registry lock poisoned".to_string()))?;
        if runs.contains_key(&plan.execution_name) {
            return Err(DispatchError::Rejected(format!(
                "execution {} already exists",
                plan.execution_name
            )));
        }
        if runs.len() >= self.retention {
            runs.retain(|_, run| !run.is_finished());
        }
        let jobs: Vec<SegmentJob> = plan
            .tasks
            .into_iter()
            .map(|task| {
                let worker = self.worker.clone();
                let segment = task.input.segment;
                let input = task.input;
                SegmentJob {
                    name: task.name,
                    segment,
                    handle: tokio::spawn(async move { worker.run(&input).await }),
                }
            })
            .collect();
        let dispatched = jobs.len();
        let execution_id = plan.execution_name;
        runs.insert(
            execution_id.clone(),
            RunHandle {
                execution_id: execution_id.clone(),
                run_id: plan.run_id,
                resource: plan.resource,
                jobs,
            },
        );
        Ok(DispatchReceipt {
            execution_id,
            dispatched,
        })
    }
}
