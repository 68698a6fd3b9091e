// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::version::ApplicationId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TenantId(pub Uuid);

impl TenantId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for TenantId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TenantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tenant as returned by the tenant directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: TenantId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Durable record that an application is active for a tenant.
///
/// At most one entitlement exists per `(tenant, application name)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entitlement {
    pub tenant_id: TenantId,
    pub application_id: ApplicationId,
}

impl Entitlement {
    pub fn new(tenant_id: TenantId, application_id: ApplicationId) -> Self {
        Self {
            tenant_id,
            application_id,
        }
    }

    pub fn application_name(&self) -> &str {
        self.application_id.name()
    }
}
