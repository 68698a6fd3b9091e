// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Flow Engine
//!
//! Executes a [`Flow`] tree and drives every stage through its lifecycle
//! hooks.
//!
//! # Execution rules
//!
//! - Every stage of the tree is recorded `QUEUED` before anything runs.
//! - `Sequential` children run in order and stop at the first failure;
//!   `Parallel` children run concurrently and are all awaited.
//! - `FailFast`: the first failure sets a cooperative stop flag, checked
//!   before each stage starts. Running stages are never interrupted. Once the
//!   tree settles, finished cancellable stages are compensated in reverse
//!   completion order; a failed compensation is recorded
//!   `CANCELLATION_FAILED` and the remaining ones still run. A stage that
//!   executed but whose `FINISHED` record could not be stored is reported
//!   `FAILED` and still compensated.
//! - `IgnoreErrors`: independent branches keep running, nothing is
//!   compensated.

use futures::future::{join_all, BoxFuture, FutureExt};
use metrics::histogram;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use crate::application::stage_lifecycle::StageLifecycle;
use crate::domain::flow::{ExecutionStrategy, Flow, FlowExecutionReport, FlowId, FlowNode, FlowStage, FlowStatus};
use crate::domain::repository::{RepositoryError, StageExecutionRepository};
use crate::domain::stage::{StageError, StageExecutionRecord, StageStatus};

pub struct FlowEngine {
    lifecycle: StageLifecycle,
}

/// Mutable state of one flow execution
struct FlowRun {
    flow_id: FlowId,
    strategy: ExecutionStrategy,
    stopped: AtomicBool,
    failed: AtomicBool,
    records: Mutex<HashMap<String, StageExecutionRecord>>,
    completed: Mutex<Vec<Arc<dyn FlowStage>>>,
}

impl FlowRun {
    fn record(&self, stage_id: &str) -> StageExecutionRecord {
        self.records
            .lock()
            .get(stage_id)
            .cloned()
            .unwrap_or_else(|| StageExecutionRecord::queued(self.flow_id, stage_id))
    }

    fn store(&self, record: StageExecutionRecord) {
        self.records.lock().insert(record.stage_name.clone(), record);
    }

    fn fail(&self) {
        self.failed.store(true, Ordering::SeqCst);
        if self.strategy == ExecutionStrategy::FailFast {
            self.stopped.store(true, Ordering::SeqCst);
        }
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    fn has_failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }
}

impl FlowEngine {
    pub fn new(repository: Arc<dyn StageExecutionRepository>) -> Self {
        Self {
            lifecycle: StageLifecycle::new(repository),
        }
    }

    /// Run `flow` to completion.
    ///
    /// Fails only when the flow cannot be set up (duplicate stage ids or the
    /// initial `QUEUED` records cannot be stored); stage failures are part of
    /// the returned report.
    pub async fn execute(&self, flow: &Flow) -> Result<FlowExecutionReport, RepositoryError> {
        let started = Instant::now();
        let stage_ids = flow.root.stage_ids();

        let mut seen = HashSet::new();
        if let Some(duplicate) = stage_ids.iter().find(|id| !seen.insert(id.as_str())) {
            return Err(RepositoryError::Conflict(format!(
                "Duplicate stage id in flow {}: {}",
                flow.id, duplicate
            )));
        }

        info!(flow_id = %flow.id, strategy = %flow.strategy, stages = stage_ids.len(), "Starting flow");

        let run = FlowRun {
            flow_id: flow.id,
            strategy: flow.strategy,
            stopped: AtomicBool::new(false),
            failed: AtomicBool::new(false),
            records: Mutex::new(HashMap::new()),
            completed: Mutex::new(Vec::new()),
        };

        for stage_id in &stage_ids {
            let record = self.lifecycle.on_queued(flow.id, stage_id).await?;
            run.store(record);
        }

        self.run_node(&flow.root, &run).await;

        let status = if !run.has_failed() {
            FlowStatus::Finished
        } else if flow.strategy == ExecutionStrategy::IgnoreErrors {
            FlowStatus::Failed
        } else if self.compensate(&run).await {
            FlowStatus::Cancelled
        } else {
            FlowStatus::CancellationFailed
        };

        let elapsed = started.elapsed();
        histogram!("entitlement_flow_duration_seconds", "status" => status.as_str()).record(elapsed.as_secs_f64());

        let records = run.records.into_inner();
        let stages = stage_ids
            .iter()
            .filter_map(|id| records.get(id).cloned())
            .collect();
        let report = FlowExecutionReport {
            flow_id: flow.id,
            status,
            stages,
        };

        match status {
            FlowStatus::Finished => info!(flow_id = %flow.id, duration_ms = elapsed.as_millis() as u64, "Flow finished"),
            FlowStatus::CancellationFailed => error!(
                flow_id = %flow.id,
                summary = %report.summary(),
                "Flow compensation failed, manual intervention required"
            ),
            _ => warn!(flow_id = %flow.id, summary = %report.summary(), "Flow did not finish"),
        }

        Ok(report)
    }

    fn run_node<'a>(&'a self, node: &'a FlowNode, run: &'a FlowRun) -> BoxFuture<'a, bool> {
        async move {
            match node {
                FlowNode::Stage(stage) => self.run_stage(stage, run).await,
                FlowNode::Sequential(children) => {
                    for child in children {
                        if !self.run_node(child, run).await {
                            return false;
                        }
                    }
                    true
                }
                FlowNode::Parallel(children) => {
                    let results = join_all(children.iter().map(|child| self.run_node(child, run))).await;
                    results.into_iter().all(|ok| ok)
                }
            }
        }
        .boxed()
    }

    async fn run_stage(&self, stage: &Arc<dyn FlowStage>, run: &FlowRun) -> bool {
        if run.is_stopped() {
            debug!(flow_id = %run.flow_id, stage = stage.id(), "Flow stopped, stage not started");
            return false;
        }

        let mut record = run.record(stage.id());
        let started = self.lifecycle.on_start(&mut record).await;
        if let Err(err) = persisted(&mut record, StageStatus::InProgress, None, started) {
            record.transition(StageStatus::Failed, Some(&err));
            run.store(record);
            run.fail();
            return false;
        }
        run.store(record.clone());

        debug!(flow_id = %run.flow_id, stage = stage.id(), "Executing stage");
        let ok = match stage.execute().await {
            Ok(()) => {
                // The effect is applied from here on, stored or not
                run.completed.lock().push(stage.clone());
                match self.lifecycle.on_success(&mut record).await {
                    Ok(()) => true,
                    Err(err) => {
                        let err = StageError::from(err);
                        error!(
                            flow_id = %run.flow_id,
                            stage = stage.id(),
                            error = %err.message,
                            "Stage executed but FINISHED could not be stored"
                        );
                        let result = self.lifecycle.on_error(&mut record, &err).await;
                        let _ = persisted(&mut record, StageStatus::Failed, Some(&err), result);
                        false
                    }
                }
            }
            Err(err) => {
                warn!(
                    flow_id = %run.flow_id,
                    stage = stage.id(),
                    error_type = %err.error_type,
                    error = %err.message,
                    "Stage failed"
                );
                let result = self.lifecycle.on_error(&mut record, &err).await;
                let _ = persisted(&mut record, StageStatus::Failed, Some(&err), result);
                false
            }
        };

        run.store(record);
        if !ok {
            run.fail();
        }
        ok
    }

    /// Compensate finished stages newest first; `false` if any cancel failed
    async fn compensate(&self, run: &FlowRun) -> bool {
        let completed: Vec<Arc<dyn FlowStage>> = run.completed.lock().drain(..).collect();
        let mut all_cancelled = true;

        for stage in completed.iter().rev() {
            if !stage.is_cancellable() {
                debug!(flow_id = %run.flow_id, stage = stage.id(), "Stage is forward-only, left as is");
                continue;
            }

            let mut record = run.record(stage.id());
            // A stage whose FINISHED save failed keeps its FAILED record
            let tracked = record.status == StageStatus::Finished;
            match stage.cancel().await {
                Ok(()) => {
                    info!(flow_id = %run.flow_id, stage = stage.id(), "Stage compensated");
                    if tracked {
                        let result = self.lifecycle.on_cancel(&mut record).await;
                        let _ = persisted(&mut record, StageStatus::Cancelled, None, result);
                    }
                }
                Err(err) => {
                    all_cancelled = false;
                    error!(
                        flow_id = %run.flow_id,
                        stage = stage.id(),
                        error_type = %err.error_type,
                        error = %err.message,
                        "Stage compensation failed"
                    );
                    if tracked {
                        let result = self.lifecycle.on_cancel_error(&mut record, &err).await;
                        let _ = persisted(&mut record, StageStatus::CancellationFailed, Some(&err), result);
                    }
                }
            }
            run.store(record);
        }

        all_cancelled
    }
}

/// Keeps the in-memory record on `status` even when storing it failed, so the
/// report reflects what actually happened.
fn persisted(
    record: &mut StageExecutionRecord,
    status: StageStatus,
    error: Option<&StageError>,
    result: Result<(), RepositoryError>,
) -> Result<(), StageError> {
    match result {
        Ok(()) => Ok(()),
        Err(err) => {
            error!(
                flow_id = %record.flow_id,
                stage = %record.stage_name,
                status = %status,
                error = %err,
                "Failed to persist stage status"
            );
            if record.status.can_transition_to(status) {
                record.transition(status, error);
            }
            Err(err.into())
        }
    }
}
