// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Flow Model
//!
//! A flow is a tree of stages: `Sequential` nodes run their children one after
//! another, `Parallel` nodes run them concurrently. Leaves are stages already
//! bound to their typed context, so the tree itself is context-agnostic.
//!
//! The tree is executed by `crate::application::flow_engine::FlowEngine`,
//! which produces a [`FlowExecutionReport`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::entitlement::TenantId;
use crate::domain::stage::{Stage, StageError, StageExecutionRecord, StageStatus};
use crate::domain::transition::TransitionType;
use crate::domain::version::ApplicationId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FlowId(pub Uuid);

impl FlowId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for FlowId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for FlowId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the engine does when a stage fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExecutionStrategy {
    /// Stop scheduling new stages and compensate finished ones
    #[default]
    FailFast,
    /// Let independent branches run to completion, no compensation
    IgnoreErrors,
}

impl std::str::FromStr for ExecutionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fail-fast" => Ok(ExecutionStrategy::FailFast),
            "ignore-errors" => Ok(ExecutionStrategy::IgnoreErrors),
            other => Err(format!("Unknown execution strategy: {}", other)),
        }
    }
}

impl std::fmt::Display for ExecutionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionStrategy::FailFast => f.write_str("fail-fast"),
            ExecutionStrategy::IgnoreErrors => f.write_str("ignore-errors"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowStatus {
    Finished,
    Failed,
    Cancelled,
    /// At least one compensation failed; needs an operator
    CancellationFailed,
}

impl FlowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowStatus::Finished => "FINISHED",
            FlowStatus::Failed => "FAILED",
            FlowStatus::Cancelled => "CANCELLED",
            FlowStatus::CancellationFailed => "CANCELLATION_FAILED",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FlowStatus::Finished)
    }
}

impl std::fmt::Display for FlowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a flow with the final record of every stage in it, in the
/// order the stages appear in the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowExecutionReport {
    pub flow_id: FlowId,
    pub status: FlowStatus,
    pub stages: Vec<StageExecutionRecord>,
}

impl FlowExecutionReport {
    /// The failure closest to where the flow stopped: the most recently
    /// updated `FAILED` record, later in the tree on ties.
    pub fn failed_stage(&self) -> Option<&StageExecutionRecord> {
        self.failed_stages().max_by_key(|s| s.updated_at)
    }

    /// Every `FAILED` record in tree order; more than one under `IgnoreErrors`
    pub fn failed_stages(&self) -> impl Iterator<Item = &StageExecutionRecord> {
        self.stages_with_status(StageStatus::Failed)
    }

    pub fn stage(&self, name: &str) -> Option<&StageExecutionRecord> {
        self.stages.iter().find(|s| s.stage_name == name)
    }

    pub fn stages_with_status(&self, status: StageStatus) -> impl Iterator<Item = &StageExecutionRecord> {
        self.stages.iter().filter(move |s| s.status == status)
    }

    pub fn summary(&self) -> String {
        let mut summary = format!("Flow {} {}", self.flow_id, self.status);
        if let Some(failed) = self.failed_stage() {
            summary.push_str(&format!(
                ": stage {} failed with {}: {}",
                failed.stage_name,
                failed.error_type.as_deref().unwrap_or("UnknownError"),
                failed.error_message.as_deref().unwrap_or(""),
            ));
            let others: Vec<&str> = self
                .failed_stages()
                .filter(|s| s.stage_name != failed.stage_name)
                .map(|s| s.stage_name.as_str())
                .collect();
            if !others.is_empty() {
                summary.push_str(&format!("; also failed: {}", others.join(", ")));
            }
        }
        let cancellation_failures: Vec<&str> = self
            .stages_with_status(StageStatus::CancellationFailed)
            .map(|s| s.stage_name.as_str())
            .collect();
        if !cancellation_failures.is_empty() {
            summary.push_str(&format!(
                "; compensation failed for {} (manual intervention required)",
                cancellation_failures.join(", ")
            ));
        }
        summary
    }
}

/// A stage bound to its context, as stored in the flow tree
#[async_trait]
pub trait FlowStage: Send + Sync {
    /// Unique within the flow; the key of the stage execution record
    fn id(&self) -> &str;

    async fn execute(&self) -> Result<(), StageError>;

    fn is_cancellable(&self) -> bool;

    async fn cancel(&self) -> Result<(), StageError>;
}

pub struct BoundStage<C> {
    id: String,
    stage: Arc<dyn Stage<C>>,
    context: Arc<C>,
}

impl<C: Send + Sync + 'static> BoundStage<C> {
    pub fn new(id: impl Into<String>, stage: Arc<dyn Stage<C>>, context: Arc<C>) -> Self {
        Self {
            id: id.into(),
            stage,
            context,
        }
    }

    pub fn into_node(self) -> FlowNode {
        FlowNode::Stage(Arc::new(self))
    }
}

#[async_trait]
impl<C: Send + Sync + 'static> FlowStage for BoundStage<C> {
    fn id(&self) -> &str {
        &self.id
    }

    async fn execute(&self) -> Result<(), StageError> {
        self.stage.execute(&self.context).await
    }

    fn is_cancellable(&self) -> bool {
        self.stage.is_cancellable()
    }

    async fn cancel(&self) -> Result<(), StageError> {
        self.stage.cancel(&self.context).await
    }
}

#[derive(Clone)]
pub enum FlowNode {
    Stage(Arc<dyn FlowStage>),
    Sequential(Vec<FlowNode>),
    Parallel(Vec<FlowNode>),
}

impl FlowNode {
    /// Stage ids in tree order
    pub fn stage_ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        self.collect_ids(&mut ids);
        ids
    }

    fn collect_ids(&self, ids: &mut Vec<String>) {
        match self {
            FlowNode::Stage(stage) => ids.push(stage.id().to_string()),
            FlowNode::Sequential(children) | FlowNode::Parallel(children) => {
                for child in children {
                    child.collect_ids(ids);
                }
            }
        }
    }
}

impl std::fmt::Debug for FlowNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlowNode::Stage(stage) => write!(f, "Stage({})", stage.id()),
            FlowNode::Sequential(children) => f.debug_tuple("Sequential").field(children).finish(),
            FlowNode::Parallel(children) => f.debug_tuple("Parallel").field(children).finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Flow {
    pub id: FlowId,
    pub strategy: ExecutionStrategy,
    pub root: FlowNode,
}

impl Flow {
    pub fn new(id: FlowId, strategy: ExecutionStrategy, root: FlowNode) -> Self {
        Self { id, strategy, root }
    }
}

/// Status of one application's branch within a flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationFlow {
    pub flow_id: FlowId,
    pub tenant_id: TenantId,
    pub application_id: ApplicationId,
    pub transition_type: TransitionType,
    pub status: StageStatus,
    pub updated_at: DateTime<Utc>,
}

impl ApplicationFlow {
    pub fn new(
        flow_id: FlowId,
        tenant_id: TenantId,
        application_id: ApplicationId,
        transition_type: TransitionType,
        status: StageStatus,
    ) -> Self {
        Self {
            flow_id,
            tenant_id,
            application_id,
            transition_type,
            status,
            updated_at: Utc::now(),
        }
    }
}
