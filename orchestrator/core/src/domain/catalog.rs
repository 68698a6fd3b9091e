// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Ports for the external collaborators: the application catalog, the tenant
//! directory and the per-module tenant endpoint. HTTP adapters live in
//! `crate::infrastructure`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::application::{ApplicationDescriptor, Dependency};
use crate::domain::entitlement::{Tenant, TenantId};
use crate::domain::errors::IntegrationError;
use crate::domain::version::{ApplicationId, ModuleId};

/// Module id to the base URL the module is reachable at
pub type ModuleDiscovery = BTreeMap<ModuleId, String>;

#[async_trait]
pub trait ApplicationCatalog: Send + Sync {
    /// Batch lookup by id; unknown ids are absent from the result
    async fn get_application_descriptors(
        &self,
        ids: &[ApplicationId],
    ) -> Result<Vec<ApplicationDescriptor>, IntegrationError>;

    /// Newest registered application satisfying each dependency's range
    async fn find_latest_satisfying(
        &self,
        dependencies: &[Dependency],
    ) -> Result<Vec<ApplicationDescriptor>, IntegrationError>;

    async fn get_module_discovery(&self, application_id: &ApplicationId) -> Result<ModuleDiscovery, IntegrationError>;
}

#[async_trait]
pub trait TenantDirectory: Send + Sync {
    async fn find_tenant(&self, tenant_id: TenantId) -> Result<Tenant, IntegrationError>;
}

/// Body of `POST {location}/_/tenant`.
///
/// Install sets only `module_to`, upgrade sets both, uninstall sets only
/// `module_from` (optionally with `purge`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleTenantOperation {
    #[serde(skip)]
    pub tenant_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module_to: Option<ModuleId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module_from: Option<ModuleId>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub purge: bool,
}

impl ModuleTenantOperation {
    pub fn install(tenant_name: impl Into<String>, module: ModuleId, previous: Option<ModuleId>) -> Self {
        Self {
            tenant_name: tenant_name.into(),
            module_to: Some(module),
            module_from: previous,
            purge: false,
        }
    }

    pub fn uninstall(tenant_name: impl Into<String>, module: ModuleId, purge: bool) -> Self {
        Self {
            tenant_name: tenant_name.into(),
            module_to: None,
            module_from: Some(module),
            purge,
        }
    }
}

#[async_trait]
pub trait ModuleTenantApi: Send + Sync {
    async fn apply(&self, location: &str, operation: &ModuleTenantOperation) -> Result<(), IntegrationError>;
}
