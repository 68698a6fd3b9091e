// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Stage lifecycle hooks.
//!
//! Each hook moves a [`StageExecutionRecord`] one step through the stage
//! state machine and persists it before returning. Illegal transitions are
//! rejected without touching the store.

use metrics::counter;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::domain::flow::FlowId;
use crate::domain::repository::{RepositoryError, StageExecutionRepository};
use crate::domain::stage::{StageError, StageExecutionRecord, StageStatus};

pub struct StageLifecycle {
    repository: Arc<dyn StageExecutionRepository>,
}

impl StageLifecycle {
    pub fn new(repository: Arc<dyn StageExecutionRepository>) -> Self {
        Self { repository }
    }

    /// Create the `QUEUED` record of a stage that is part of a flow
    pub async fn on_queued(&self, flow_id: FlowId, stage_name: &str) -> Result<StageExecutionRecord, RepositoryError> {
        let record = StageExecutionRecord::queued(flow_id, stage_name);
        self.repository.save(&record).await?;
        counter!("entitlement_stage_transitions_total", "status" => StageStatus::Queued.as_str()).increment(1);
        Ok(record)
    }

    pub async fn on_start(&self, record: &mut StageExecutionRecord) -> Result<(), RepositoryError> {
        self.transition(record, StageStatus::InProgress, None).await
    }

    pub async fn on_success(&self, record: &mut StageExecutionRecord) -> Result<(), RepositoryError> {
        self.transition(record, StageStatus::Finished, None).await
    }

    pub async fn on_error(&self, record: &mut StageExecutionRecord, error: &StageError) -> Result<(), RepositoryError> {
        self.transition(record, StageStatus::Failed, Some(error)).await
    }

    pub async fn on_cancel(&self, record: &mut StageExecutionRecord) -> Result<(), RepositoryError> {
        self.transition(record, StageStatus::Cancelled, None).await
    }

    /// Terminal: a failed compensation is left for an operator
    pub async fn on_cancel_error(
        &self,
        record: &mut StageExecutionRecord,
        error: &StageError,
    ) -> Result<(), RepositoryError> {
        self.transition(record, StageStatus::CancellationFailed, Some(error)).await
    }

    async fn transition(
        &self,
        record: &mut StageExecutionRecord,
        status: StageStatus,
        error: Option<&StageError>,
    ) -> Result<(), RepositoryError> {
        if !record.status.can_transition_to(status) {
            warn!(
                flow_id = %record.flow_id,
                stage = %record.stage_name,
                from = %record.status,
                to = %status,
                "Rejected illegal stage transition"
            );
            return Err(RepositoryError::Conflict(format!(
                "Stage {} cannot move from {} to {}",
                record.stage_name, record.status, status
            )));
        }

        let mut updated = record.clone();
        updated.transition(status, error);
        self.repository.save(&updated).await?;
        *record = updated;

        counter!("entitlement_stage_transitions_total", "status" => status.as_str()).increment(1);
        debug!(flow_id = %record.flow_id, stage = %record.stage_name, status = %status, "Stage status updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::repositories::InMemoryStageExecutionRepository;

    #[tokio::test]
    async fn test_hooks_persist_each_step() {
        let repository = Arc::new(InMemoryStageExecutionRepository::new());
        let lifecycle = StageLifecycle::new(repository.clone());
        let flow_id = FlowId::new();

        let mut record = lifecycle.on_queued(flow_id, "s1").await.unwrap();
        lifecycle.on_start(&mut record).await.unwrap();
        assert_eq!(
            repository.find(flow_id, "s1").await.unwrap().unwrap().status,
            StageStatus::InProgress
        );

        lifecycle.on_success(&mut record).await.unwrap();
        lifecycle.on_cancel(&mut record).await.unwrap();
        let stored = repository.find(flow_id, "s1").await.unwrap().unwrap();
        assert_eq!(stored.status, StageStatus::Cancelled);
        assert_eq!(stored.error_type, None);
    }

    #[tokio::test]
    async fn test_failure_details_are_stored() {
        let repository = Arc::new(InMemoryStageExecutionRepository::new());
        let lifecycle = StageLifecycle::new(repository.clone());
        let flow_id = FlowId::new();

        let mut record = lifecycle.on_queued(flow_id, "s2").await.unwrap();
        lifecycle.on_start(&mut record).await.unwrap();
        lifecycle
            .on_error(&mut record, &StageError::new("IntegrationError", "module returned 500"))
            .await
            .unwrap();

        let stored = repository.find(flow_id, "s2").await.unwrap().unwrap();
        assert_eq!(stored.status, StageStatus::Failed);
        assert_eq!(stored.error_type.as_deref(), Some("IntegrationError"));
        assert_eq!(stored.error_message.as_deref(), Some("module returned 500"));
    }

    #[tokio::test]
    async fn test_illegal_transition_is_rejected_and_not_stored() {
        let repository = Arc::new(InMemoryStageExecutionRepository::new());
        let lifecycle = StageLifecycle::new(repository.clone());
        let flow_id = FlowId::new();

        let mut record = lifecycle.on_queued(flow_id, "s3").await.unwrap();
        let err = lifecycle.on_cancel(&mut record).await.unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
        assert_eq!(record.status, StageStatus::Queued);
        assert_eq!(
            repository.find(flow_id, "s3").await.unwrap().unwrap().status,
            StageStatus::Queued
        );
    }
}
