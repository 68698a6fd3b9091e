// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Entitlement store stages. Each one compensates by applying the inverse
//! store operation.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::application::context::ApplicationContext;
use crate::domain::entitlement::Entitlement;
use crate::domain::repository::EntitlementRepository;
use crate::domain::stage::{Stage, StageError};

pub struct EntitlementCreator {
    repository: Arc<dyn EntitlementRepository>,
}

impl EntitlementCreator {
    pub fn new(repository: Arc<dyn EntitlementRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl Stage<ApplicationContext> for EntitlementCreator {
    fn name(&self) -> &'static str {
        "EntitlementCreator"
    }

    async fn execute(&self, context: &ApplicationContext) -> Result<(), StageError> {
        let entitlement = context.entitlement();
        self.repository.save(&entitlement).await?;
        info!(tenant = %context.tenant().name, application = %entitlement.application_id, "Entitlement created");
        Ok(())
    }

    fn is_cancellable(&self) -> bool {
        true
    }

    async fn cancel(&self, context: &ApplicationContext) -> Result<(), StageError> {
        self.repository
            .delete(context.request.tenant.id, context.application_id())
            .await?;
        Ok(())
    }
}

pub struct EntitlementUpgrader {
    repository: Arc<dyn EntitlementRepository>,
}

impl EntitlementUpgrader {
    pub fn new(repository: Arc<dyn EntitlementRepository>) -> Self {
        Self { repository }
    }

    fn pair(context: &ApplicationContext) -> Result<(Entitlement, Entitlement), StageError> {
        let previous = context.previous_entitlement().ok_or_else(|| {
            StageError::new(
                "ValidationError",
                format!("Upgrade of {} has no previous application", context.application_id()),
            )
        })?;
        Ok((previous, context.entitlement()))
    }
}

#[async_trait]
impl Stage<ApplicationContext> for EntitlementUpgrader {
    fn name(&self) -> &'static str {
        "EntitlementUpgrader"
    }

    async fn execute(&self, context: &ApplicationContext) -> Result<(), StageError> {
        let (previous, next) = Self::pair(context)?;
        self.repository.replace(&previous, &next).await?;
        info!(
            tenant = %context.tenant().name,
            from = %previous.application_id,
            to = %next.application_id,
            "Entitlement upgraded"
        );
        Ok(())
    }

    fn is_cancellable(&self) -> bool {
        true
    }

    async fn cancel(&self, context: &ApplicationContext) -> Result<(), StageError> {
        let (previous, next) = Self::pair(context)?;
        self.repository.replace(&next, &previous).await?;
        Ok(())
    }
}

pub struct EntitlementRemover {
    repository: Arc<dyn EntitlementRepository>,
}

impl EntitlementRemover {
    pub fn new(repository: Arc<dyn EntitlementRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl Stage<ApplicationContext> for EntitlementRemover {
    fn name(&self) -> &'static str {
        "EntitlementRemover"
    }

    async fn execute(&self, context: &ApplicationContext) -> Result<(), StageError> {
        self.repository
            .delete(context.request.tenant.id, context.application_id())
            .await?;
        info!(tenant = %context.tenant().name, application = %context.application_id(), "Entitlement removed");
        Ok(())
    }

    fn is_cancellable(&self) -> bool {
        true
    }

    async fn cancel(&self, context: &ApplicationContext) -> Result<(), StageError> {
        self.repository.save(&context.entitlement()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::stages::fixtures;
    use crate::domain::transition::TransitionType;
    use crate::domain::version::ApplicationId;
    use crate::infrastructure::repositories::InMemoryEntitlementRepository;

    async fn entitled(repository: &InMemoryEntitlementRepository, context: &ApplicationContext) -> Vec<String> {
        repository
            .find_by_tenant(context.request.tenant.id)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.application_id.to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_creator_and_its_compensation() {
        let repository = Arc::new(InMemoryEntitlementRepository::new());
        let context = fixtures::application(
            fixtures::request(false),
            fixtures::descriptor("app-1.0.0", &[]),
            TransitionType::Entitle,
            None,
        );
        let stage = EntitlementCreator::new(repository.clone());

        stage.execute(&context).await.unwrap();
        assert_eq!(entitled(&repository, &context).await, vec!["app-1.0.0"]);

        stage.cancel(&context).await.unwrap();
        assert!(entitled(&repository, &context).await.is_empty());
    }

    #[tokio::test]
    async fn test_upgrader_swaps_versions_both_ways() {
        let repository = Arc::new(InMemoryEntitlementRepository::new());
        let context = fixtures::application(
            fixtures::request(false),
            fixtures::descriptor("app-2.0.0", &[]),
            TransitionType::Upgrade,
            Some(fixtures::descriptor("app-1.0.0", &[])),
        );
        repository
            .save(&Entitlement::new(context.request.tenant.id, ApplicationId::parse("app-1.0.0").unwrap()))
            .await
            .unwrap();
        let stage = EntitlementUpgrader::new(repository.clone());

        stage.execute(&context).await.unwrap();
        assert_eq!(entitled(&repository, &context).await, vec!["app-2.0.0"]);

        stage.cancel(&context).await.unwrap();
        assert_eq!(entitled(&repository, &context).await, vec!["app-1.0.0"]);
    }

    #[tokio::test]
    async fn test_upgrader_requires_previous_descriptor() {
        let repository = Arc::new(InMemoryEntitlementRepository::new());
        let context = fixtures::application(
            fixtures::request(false),
            fixtures::descriptor("app-2.0.0", &[]),
            TransitionType::Upgrade,
            None,
        );
        let err = EntitlementUpgrader::new(repository).execute(&context).await.unwrap_err();
        assert_eq!(err.error_type, "ValidationError");
    }

    #[tokio::test]
    async fn test_remover_of_missing_entitlement_fails() {
        let repository = Arc::new(InMemoryEntitlementRepository::new());
        let context = fixtures::application(
            fixtures::request(false),
            fixtures::descriptor("app-1.0.0", &[]),
            TransitionType::Revoke,
            None,
        );
        let err = EntitlementRemover::new(repository).execute(&context).await.unwrap_err();
        assert_eq!(err.error_type, "RepositoryError");
    }
}
