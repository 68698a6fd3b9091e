// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::application::context::ApplicationContext;
use crate::domain::flow::ApplicationFlow;
use crate::domain::repository::ApplicationFlowRepository;
use crate::domain::stage::{Stage, StageError, StageStatus};

/// Invoked with the stored record after every status update
pub type StatusCallback = Arc<dyn Fn(&ApplicationFlow) + Send + Sync>;

/// Writes the status of an application branch.
///
/// One type covers every status: `target` is written on execute, and
/// `cancel_status`, when set, makes the stage compensable and is written on
/// cancel.
pub struct ApplicationFlowStatusStage {
    name: &'static str,
    repository: Arc<dyn ApplicationFlowRepository>,
    target: StageStatus,
    cancel_status: Option<StageStatus>,
    callback: Option<StatusCallback>,
}

impl ApplicationFlowStatusStage {
    pub fn new(
        name: &'static str,
        repository: Arc<dyn ApplicationFlowRepository>,
        target: StageStatus,
        cancel_status: Option<StageStatus>,
    ) -> Self {
        Self {
            name,
            repository,
            target,
            cancel_status,
            callback: None,
        }
    }

    /// First stage of a branch: `IN_PROGRESS`, `CANCELLED` on compensation
    pub fn started(repository: Arc<dyn ApplicationFlowRepository>) -> Self {
        Self::new(
            "ApplicationFlowStarted",
            repository,
            StageStatus::InProgress,
            Some(StageStatus::Cancelled),
        )
    }

    /// Last stage of a branch: `FINISHED`
    pub fn finished(repository: Arc<dyn ApplicationFlowRepository>) -> Self {
        Self::new("ApplicationFlowFinished", repository, StageStatus::Finished, None)
    }

    pub fn with_callback(mut self, callback: StatusCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    async fn write(&self, context: &ApplicationContext, status: StageStatus) -> Result<(), StageError> {
        let flow = ApplicationFlow::new(
            context.request.flow_id,
            context.request.tenant.id,
            context.application_id().clone(),
            context.transition_type,
            status,
        );
        self.repository.save(&flow).await?;
        debug!(
            flow_id = %flow.flow_id,
            application = %flow.application_id,
            status = %status,
            "Application flow status updated"
        );
        if let Some(callback) = &self.callback {
            callback(&flow);
        }
        Ok(())
    }
}

#[async_trait]
impl Stage<ApplicationContext> for ApplicationFlowStatusStage {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn execute(&self, context: &ApplicationContext) -> Result<(), StageError> {
        self.write(context, self.target).await
    }

    fn is_cancellable(&self) -> bool {
        self.cancel_status.is_some()
    }

    async fn cancel(&self, context: &ApplicationContext) -> Result<(), StageError> {
        match self.cancel_status {
            Some(status) => self.write(context, status).await,
            None => Err(StageError::new(
                "NotCancellable",
                format!("Stage {} has no compensating action", self.name),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::stages::fixtures;
    use crate::domain::transition::TransitionType;
    use crate::infrastructure::repositories::InMemoryApplicationFlowRepository;
    use parking_lot::Mutex;

    #[tokio::test]
    async fn test_started_stage_writes_and_compensates() {
        let repository = Arc::new(InMemoryApplicationFlowRepository::new());
        let context = fixtures::application(
            fixtures::request(false),
            fixtures::descriptor("app-1.0.0", &[]),
            TransitionType::Entitle,
            None,
        );
        let stage = ApplicationFlowStatusStage::started(repository.clone());

        stage.execute(&context).await.unwrap();
        let stored = repository
            .find(context.request.flow_id, context.application_id())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, StageStatus::InProgress);
        assert_eq!(stored.transition_type, TransitionType::Entitle);

        assert!(stage.is_cancellable());
        stage.cancel(&context).await.unwrap();
        let stored = repository
            .find(context.request.flow_id, context.application_id())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, StageStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_finished_stage_is_forward_only_and_runs_callback() {
        let repository = Arc::new(InMemoryApplicationFlowRepository::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let stage = ApplicationFlowStatusStage::finished(repository)
            .with_callback(Arc::new(move |flow: &ApplicationFlow| sink.lock().push(flow.status)));
        let context = fixtures::application(
            fixtures::request(false),
            fixtures::descriptor("app-1.0.0", &[]),
            TransitionType::Revoke,
            None,
        );

        stage.execute(&context).await.unwrap();
        assert_eq!(*seen.lock(), vec![StageStatus::Finished]);
        assert!(!stage.is_cancellable());
        assert!(stage.cancel(&context).await.is_err());
    }
}
