// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Flow engine behavior: lifecycle records, failure propagation and
//! compensation under both execution strategies.

use async_trait::async_trait;
use entitlement_core::application::flow_engine::FlowEngine;
use entitlement_core::domain::flow::{BoundStage, ExecutionStrategy, Flow, FlowId, FlowNode, FlowStatus};
use entitlement_core::domain::repository::{RepositoryError, StageExecutionRepository};
use entitlement_core::domain::stage::{Stage, StageError, StageExecutionRecord, StageStatus};
use entitlement_core::infrastructure::repositories::InMemoryStageExecutionRepository;
use parking_lot::Mutex;
use std::sync::Arc;

type Journal = Arc<Mutex<Vec<String>>>;

/// Stage that logs its calls and fails on demand
struct Step {
    name: &'static str,
    journal: Journal,
    fails: bool,
    cancellable: bool,
    cancel_fails: bool,
}

impl Step {
    fn ok(name: &'static str, journal: &Journal) -> Self {
        Self {
            name,
            journal: journal.clone(),
            fails: false,
            cancellable: true,
            cancel_fails: false,
        }
    }

    fn failing(name: &'static str, journal: &Journal) -> Self {
        Self {
            fails: true,
            ..Self::ok(name, journal)
        }
    }

    fn forward_only(mut self) -> Self {
        self.cancellable = false;
        self
    }

    fn cancel_failing(mut self) -> Self {
        self.cancel_fails = true;
        self
    }

    fn node(self) -> FlowNode {
        let name = self.name;
        let stage: Arc<dyn Stage<()>> = Arc::new(self);
        BoundStage::new(name, stage, Arc::new(())).into_node()
    }
}

#[async_trait]
impl Stage<()> for Step {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn execute(&self, _context: &()) -> Result<(), StageError> {
        self.journal.lock().push(format!("execute {}", self.name));
        if self.fails {
            return Err(StageError::new("IntegrationError", format!("{} unavailable", self.name)));
        }
        Ok(())
    }

    fn is_cancellable(&self) -> bool {
        self.cancellable
    }

    async fn cancel(&self, _context: &()) -> Result<(), StageError> {
        self.journal.lock().push(format!("cancel {}", self.name));
        if self.cancel_fails {
            return Err(StageError::new("IntegrationError", "compensation rejected"));
        }
        Ok(())
    }
}

/// Store that refuses to record one stage as FINISHED
struct RejectingFinishStore {
    inner: InMemoryStageExecutionRepository,
    stage: &'static str,
}

#[async_trait]
impl StageExecutionRepository for RejectingFinishStore {
    async fn save(&self, record: &StageExecutionRecord) -> Result<(), RepositoryError> {
        if record.stage_name == self.stage && record.status == StageStatus::Finished {
            return Err(RepositoryError::Database("connection reset".to_string()));
        }
        self.inner.save(record).await
    }

    async fn find(&self, flow_id: FlowId, stage_name: &str) -> Result<Option<StageExecutionRecord>, RepositoryError> {
        self.inner.find(flow_id, stage_name).await
    }

    async fn find_by_flow(&self, flow_id: FlowId) -> Result<Vec<StageExecutionRecord>, RepositoryError> {
        self.inner.find_by_flow(flow_id).await
    }
}

fn engine() -> (FlowEngine, Arc<InMemoryStageExecutionRepository>) {
    let repository = Arc::new(InMemoryStageExecutionRepository::new());
    (FlowEngine::new(repository.clone()), repository)
}

#[tokio::test]
async fn test_fail_fast_compensates_finished_stage() {
    let journal = Journal::default();
    let (engine, repository) = engine();
    let flow = Flow::new(
        FlowId::new(),
        ExecutionStrategy::FailFast,
        FlowNode::Sequential(vec![Step::ok("S1", &journal).node(), Step::failing("S2", &journal).node()]),
    );

    let report = engine.execute(&flow).await.unwrap();

    assert_eq!(report.status, FlowStatus::Cancelled);
    assert_eq!(report.stage("S1").unwrap().status, StageStatus::Cancelled);
    let failed = report.stage("S2").unwrap();
    assert_eq!(failed.status, StageStatus::Failed);
    assert_eq!(failed.error_type.as_deref(), Some("IntegrationError"));
    assert_eq!(failed.error_message.as_deref(), Some("S2 unavailable"));
    assert_eq!(*journal.lock(), vec!["execute S1", "execute S2", "cancel S1"]);

    let stored = repository.find(flow.id, "S1").await.unwrap().unwrap();
    assert_eq!(stored.status, StageStatus::Cancelled);
}

#[tokio::test]
async fn test_failed_compensation_is_reported_and_others_still_run() {
    let journal = Journal::default();
    let (engine, _) = engine();
    let flow = Flow::new(
        FlowId::new(),
        ExecutionStrategy::FailFast,
        FlowNode::Sequential(vec![
            Step::ok("A", &journal).node(),
            Step::ok("B", &journal).cancel_failing().node(),
            Step::failing("C", &journal).node(),
        ]),
    );

    let report = engine.execute(&flow).await.unwrap();

    assert_eq!(report.status, FlowStatus::CancellationFailed);
    assert_eq!(report.stage("A").unwrap().status, StageStatus::Cancelled);
    let b = report.stage("B").unwrap();
    assert_eq!(b.status, StageStatus::CancellationFailed);
    assert_eq!(b.error_message.as_deref(), Some("compensation rejected"));
    assert_eq!(
        *journal.lock(),
        vec!["execute A", "execute B", "execute C", "cancel B", "cancel A"]
    );
    assert!(report.summary().contains("manual intervention required"));
}

#[tokio::test]
async fn test_forward_only_stages_are_left_finished() {
    let journal = Journal::default();
    let (engine, _) = engine();
    let flow = Flow::new(
        FlowId::new(),
        ExecutionStrategy::FailFast,
        FlowNode::Sequential(vec![
            Step::ok("install", &journal).forward_only().node(),
            Step::failing("entitle", &journal).node(),
        ]),
    );

    let report = engine.execute(&flow).await.unwrap();

    assert_eq!(report.status, FlowStatus::Cancelled);
    assert_eq!(report.stage("install").unwrap().status, StageStatus::Finished);
    assert!(!journal.lock().iter().any(|entry| entry.starts_with("cancel")));
}

#[tokio::test]
async fn test_stages_after_a_stop_stay_queued() {
    let journal = Journal::default();
    let (engine, repository) = engine();
    let flow = Flow::new(
        FlowId::new(),
        ExecutionStrategy::FailFast,
        FlowNode::Sequential(vec![
            Step::failing("first", &journal).node(),
            FlowNode::Parallel(vec![Step::ok("second", &journal).node(), Step::ok("third", &journal).node()]),
        ]),
    );

    let report = engine.execute(&flow).await.unwrap();

    assert_eq!(report.stages.len(), 3);
    assert_eq!(report.stages_with_status(StageStatus::Queued).count(), 2);
    assert_eq!(*journal.lock(), vec!["execute first"]);

    let stored = repository.find_by_flow(flow.id).await.unwrap();
    assert_eq!(stored.len(), 3);
    assert!(stored
        .iter()
        .filter(|r| r.stage_name != "first")
        .all(|r| r.status == StageStatus::Queued));
}

#[tokio::test]
async fn test_ignore_errors_keeps_independent_branches_running() {
    let journal = Journal::default();
    let (engine, _) = engine();
    let flow = Flow::new(
        FlowId::new(),
        ExecutionStrategy::IgnoreErrors,
        FlowNode::Sequential(vec![
            FlowNode::Parallel(vec![
                FlowNode::Sequential(vec![Step::failing("a1", &journal).node(), Step::ok("a2", &journal).node()]),
                FlowNode::Sequential(vec![Step::ok("b1", &journal).node(), Step::ok("b2", &journal).node()]),
            ]),
        ]),
    );

    let report = engine.execute(&flow).await.unwrap();

    assert_eq!(report.status, FlowStatus::Failed);
    assert_eq!(report.stage("a1").unwrap().status, StageStatus::Failed);
    assert_eq!(report.stage("a2").unwrap().status, StageStatus::Queued);
    assert_eq!(report.stage("b1").unwrap().status, StageStatus::Finished);
    assert_eq!(report.stage("b2").unwrap().status, StageStatus::Finished);
    assert!(!journal.lock().iter().any(|entry| entry.starts_with("cancel")));
}

#[tokio::test]
async fn test_successful_flow_finishes_every_stage() {
    let journal = Journal::default();
    let (engine, _) = engine();
    let flow = Flow::new(
        FlowId::new(),
        ExecutionStrategy::FailFast,
        FlowNode::Sequential(vec![
            Step::ok("one", &journal).node(),
            FlowNode::Parallel(vec![Step::ok("two", &journal).node(), Step::ok("three", &journal).node()]),
        ]),
    );

    let report = engine.execute(&flow).await.unwrap();

    assert_eq!(report.status, FlowStatus::Finished);
    assert!(report.failed_stage().is_none());
    assert_eq!(
        report.stages.iter().map(|r| r.stage_name.as_str()).collect::<Vec<_>>(),
        vec!["one", "two", "three"]
    );
    assert_eq!(report.stages_with_status(StageStatus::Finished).count(), 3);
}

#[tokio::test]
async fn test_duplicate_stage_ids_are_rejected() {
    let journal = Journal::default();
    let (engine, repository) = engine();
    let flow = Flow::new(
        FlowId::new(),
        ExecutionStrategy::FailFast,
        FlowNode::Sequential(vec![Step::ok("same", &journal).node(), Step::ok("same", &journal).node()]),
    );

    let err = engine.execute(&flow).await.unwrap_err();

    assert!(matches!(err, RepositoryError::Conflict(_)));
    assert!(journal.lock().is_empty());
    assert!(repository.find_by_flow(flow.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_stage_whose_finish_cannot_be_stored_is_compensated() {
    let journal = Journal::default();
    let repository = Arc::new(RejectingFinishStore {
        inner: InMemoryStageExecutionRepository::new(),
        stage: "s1",
    });
    let engine = FlowEngine::new(repository.clone());
    let flow = Flow::new(FlowId::new(), ExecutionStrategy::FailFast, Step::ok("s1", &journal).node());

    let report = engine.execute(&flow).await.unwrap();

    assert_eq!(report.status, FlowStatus::Cancelled);
    assert_eq!(*journal.lock(), vec!["execute s1", "cancel s1"]);
    let failed = report.failed_stage().unwrap();
    assert_eq!(failed.stage_name, "s1");
    assert_eq!(failed.error_type.as_deref(), Some("RepositoryError"));

    let stored = repository.find(flow.id, "s1").await.unwrap().unwrap();
    assert_eq!(stored.status, StageStatus::Failed);
}

#[tokio::test]
async fn test_unstored_finish_stops_later_stages_and_compensates_earlier_ones() {
    let journal = Journal::default();
    let repository = Arc::new(RejectingFinishStore {
        inner: InMemoryStageExecutionRepository::new(),
        stage: "b",
    });
    let engine = FlowEngine::new(repository);
    let flow = Flow::new(
        FlowId::new(),
        ExecutionStrategy::FailFast,
        FlowNode::Sequential(vec![
            Step::ok("a", &journal).node(),
            Step::ok("b", &journal).node(),
            Step::ok("c", &journal).node(),
        ]),
    );

    let report = engine.execute(&flow).await.unwrap();

    assert_eq!(report.status, FlowStatus::Cancelled);
    assert_eq!(*journal.lock(), vec!["execute a", "execute b", "cancel b", "cancel a"]);
    assert_eq!(report.stage("a").unwrap().status, StageStatus::Cancelled);
    assert_eq!(report.stage("b").unwrap().status, StageStatus::Failed);
    assert_eq!(report.stage("c").unwrap().status, StageStatus::Queued);
}

#[tokio::test]
async fn test_ignore_errors_reports_every_failure() {
    let journal = Journal::default();
    let (engine, _) = engine();
    let flow = Flow::new(
        FlowId::new(),
        ExecutionStrategy::IgnoreErrors,
        FlowNode::Parallel(vec![
            Step::failing("early", &journal).node(),
            FlowNode::Sequential(vec![Step::ok("setup", &journal).node(), Step::failing("late", &journal).node()]),
        ]),
    );

    let report = engine.execute(&flow).await.unwrap();

    assert_eq!(report.status, FlowStatus::Failed);
    assert_eq!(
        report.failed_stages().map(|s| s.stage_name.as_str()).collect::<Vec<_>>(),
        vec!["early", "late"]
    );
    assert_eq!(report.failed_stage().unwrap().stage_name, "late");
    let summary = report.summary();
    assert!(summary.contains("stage late failed"));
    assert!(summary.contains("also failed: early"));
}
