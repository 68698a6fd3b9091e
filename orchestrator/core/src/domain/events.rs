// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::application::ApplicationDescriptor;
use crate::domain::entitlement::{Tenant, TenantId};
use crate::domain::errors::IntegrationError;
use crate::domain::version::ModuleId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntitlementEventType {
    Entitle,
    Upgrade,
    Revoke,
}

/// Per-module change notification, keyed by tenant name on the bus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleEntitlementEvent {
    #[serde(rename = "type")]
    pub event_type: EntitlementEventType,
    pub module_id: ModuleId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_module_id: Option<ModuleId>,
    pub tenant_id: TenantId,
    pub tenant_name: String,
    pub occurred_at: DateTime<Utc>,
}

impl ModuleEntitlementEvent {
    pub fn new(event_type: EntitlementEventType, tenant: &Tenant, module_id: ModuleId) -> Self {
        Self {
            event_type,
            module_id,
            previous_module_id: None,
            tenant_id: tenant.id,
            tenant_name: tenant.name.clone(),
            occurred_at: Utc::now(),
        }
    }

    pub fn with_previous(mut self, previous: ModuleId) -> Self {
        self.previous_module_id = Some(previous);
        self
    }
}

/// One event per module of `descriptor`
pub fn module_events(
    event_type: EntitlementEventType,
    tenant: &Tenant,
    descriptor: &ApplicationDescriptor,
) -> Vec<ModuleEntitlementEvent> {
    descriptor
        .all_modules()
        .map(|module| ModuleEntitlementEvent::new(event_type, tenant, module.id.clone()))
        .collect()
}

/// Events moving a tenant from `from` to `to`, matching modules by name:
/// modules on both sides are upgraded, modules only in `to` are entitled,
/// modules only in `from` are revoked.
pub fn upgrade_events(
    tenant: &Tenant,
    from: &ApplicationDescriptor,
    to: &ApplicationDescriptor,
) -> Vec<ModuleEntitlementEvent> {
    let mut events = Vec::new();
    for module in to.all_modules() {
        let event = match from.find_module_by_name(module.id.name()) {
            Some(previous) if previous.id == module.id => continue,
            Some(previous) => ModuleEntitlementEvent::new(EntitlementEventType::Upgrade, tenant, module.id.clone())
                .with_previous(previous.id.clone()),
            None => ModuleEntitlementEvent::new(EntitlementEventType::Entitle, tenant, module.id.clone()),
        };
        events.push(event);
    }
    for module in from.all_modules() {
        if to.find_module_by_name(module.id.name()).is_none() {
            events.push(ModuleEntitlementEvent::new(
                EntitlementEventType::Revoke,
                tenant,
                module.id.clone(),
            ));
        }
    }
    events
}

/// Outbound port for change notifications.
///
/// `publish` returns once the event is acknowledged or fails after the
/// configured send timeout.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, topic: &str, key: &str, event: &ModuleEntitlementEvent) -> Result<(), IntegrationError>;
}
