// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use crate::application::context::ApplicationContext;
use crate::domain::application::ApplicationDescriptor;
use crate::domain::events::{module_events, upgrade_events, EntitlementEventType, EventPublisher, ModuleEntitlementEvent};
use crate::domain::stage::{Stage, StageError};
use crate::domain::transition::TransitionType;

/// Publishes one event per affected module.
///
/// Compensation publishes the inverse change: an entitle is answered with a
/// revoke, an upgrade with an upgrade back to the previous modules. The
/// compensation of a revoke publishes nothing.
pub struct ChangeNotifier {
    publisher: Arc<dyn EventPublisher>,
    topic: String,
}

impl ChangeNotifier {
    pub fn new(publisher: Arc<dyn EventPublisher>, topic: impl Into<String>) -> Self {
        Self {
            publisher,
            topic: topic.into(),
        }
    }

    async fn publish_all(&self, context: &ApplicationContext, events: Vec<ModuleEntitlementEvent>) -> Result<(), StageError> {
        let key = &context.tenant().name;
        for event in &events {
            self.publisher.publish(&self.topic, key, event).await?;
        }
        info!(
            tenant = %key,
            application = %context.application_id(),
            events = events.len(),
            "Published module entitlement events"
        );
        Ok(())
    }

    fn previous(context: &ApplicationContext) -> Result<&ApplicationDescriptor, StageError> {
        context.previous.as_deref().ok_or_else(|| {
            StageError::new(
                "ValidationError",
                format!("Upgrade of {} has no previous application", context.application_id()),
            )
        })
    }
}

#[async_trait]
impl Stage<ApplicationContext> for ChangeNotifier {
    fn name(&self) -> &'static str {
        "ChangeNotifier"
    }

    async fn execute(&self, context: &ApplicationContext) -> Result<(), StageError> {
        let tenant = context.tenant();
        let events = match context.transition_type {
            TransitionType::Entitle => module_events(EntitlementEventType::Entitle, tenant, &context.descriptor),
            TransitionType::Upgrade => upgrade_events(tenant, Self::previous(context)?, &context.descriptor),
            TransitionType::Revoke => module_events(EntitlementEventType::Revoke, tenant, &context.descriptor),
        };
        self.publish_all(context, events).await
    }

    fn is_cancellable(&self) -> bool {
        true
    }

    async fn cancel(&self, context: &ApplicationContext) -> Result<(), StageError> {
        let tenant = context.tenant();
        let events = match context.transition_type {
            TransitionType::Entitle => module_events(EntitlementEventType::Revoke, tenant, &context.descriptor),
            TransitionType::Upgrade => upgrade_events(tenant, &context.descriptor, Self::previous(context)?),
            TransitionType::Revoke => {
                debug!(application = %context.application_id(), "Revoke notification is not compensated");
                return Ok(());
            }
        };
        self.publish_all(context, events).await
    }
}
