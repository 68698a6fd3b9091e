// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository Implementations
//!
//! Infrastructure implementations of the repository traits defined in
//! `crate::domain::repository`.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Persist and retrieve entitlements and flow status
//! - **Pattern:** Repository (DDD), Adapter (Hexagonal Architecture)
//!
//! # Available Implementations
//!
//! ## PostgreSQL Repositories
//!
//! - **PostgresEntitlementRepository** - `entitlements` table
//! - **PostgresStageExecutionRepository** - `stage_executions` table
//! - **PostgresApplicationFlowRepository** - `application_flows` table
//!
//! ## In-Memory Repositories
//!
//! Lock-protected maps for development and tests. They enforce the same
//! one-version-per-application rule as the `entitlements` unique index.

pub mod postgres_application_flow;
pub mod postgres_entitlement;
pub mod postgres_stage_execution;

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::domain::entitlement::{Entitlement, TenantId};
use crate::domain::flow::{ApplicationFlow, FlowId};
use crate::domain::repository::{
    ApplicationFlowRepository, EntitlementRepository, RepositoryError, StageExecutionRepository,
};
use crate::domain::stage::StageExecutionRecord;
use crate::domain::version::ApplicationId;

type EntitlementKey = (TenantId, String);

#[derive(Clone, Default)]
pub struct InMemoryEntitlementRepository {
    entitlements: Arc<RwLock<BTreeMap<EntitlementKey, Entitlement>>>,
}

impl InMemoryEntitlementRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(entitlement: &Entitlement) -> EntitlementKey {
        (entitlement.tenant_id, entitlement.application_name().to_string())
    }
}

fn conflict(existing: &Entitlement) -> RepositoryError {
    RepositoryError::Conflict(format!(
        "tenant {} is already entitled to {}",
        existing.tenant_id, existing.application_id
    ))
}

#[async_trait]
impl EntitlementRepository for InMemoryEntitlementRepository {
    async fn save(&self, entitlement: &Entitlement) -> Result<(), RepositoryError> {
        let mut entitlements = self.entitlements.write();
        match entitlements.get(&Self::key(entitlement)) {
            Some(existing) if existing == entitlement => Ok(()),
            Some(existing) => Err(conflict(existing)),
            None => {
                entitlements.insert(Self::key(entitlement), entitlement.clone());
                Ok(())
            }
        }
    }

    async fn replace(&self, from: &Entitlement, to: &Entitlement) -> Result<(), RepositoryError> {
        let mut entitlements = self.entitlements.write();
        match entitlements.get(&Self::key(from)) {
            Some(existing) if existing == from => {}
            _ => {
                return Err(RepositoryError::NotFound(format!(
                    "entitlement {} for tenant {}",
                    from.application_id, from.tenant_id
                )))
            }
        }
        if Self::key(from) != Self::key(to) {
            if let Some(existing) = entitlements.get(&Self::key(to)) {
                return Err(conflict(existing));
            }
        }
        entitlements.remove(&Self::key(from));
        entitlements.insert(Self::key(to), to.clone());
        Ok(())
    }

    async fn find_by_tenant(&self, tenant_id: TenantId) -> Result<Vec<Entitlement>, RepositoryError> {
        let entitlements = self.entitlements.read();
        Ok(entitlements
            .values()
            .filter(|e| e.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn find_by_application_names(
        &self,
        tenant_id: TenantId,
        names: &[String],
    ) -> Result<Vec<Entitlement>, RepositoryError> {
        let entitlements = self.entitlements.read();
        Ok(names
            .iter()
            .filter_map(|name| entitlements.get(&(tenant_id, name.clone())).cloned())
            .collect())
    }

    async fn delete(&self, tenant_id: TenantId, application_id: &ApplicationId) -> Result<(), RepositoryError> {
        let mut entitlements = self.entitlements.write();
        let key = (tenant_id, application_id.name().to_string());
        match entitlements.get(&key) {
            Some(existing) if &existing.application_id == application_id => {
                entitlements.remove(&key);
                Ok(())
            }
            _ => Err(RepositoryError::NotFound(format!(
                "entitlement {} for tenant {}",
                application_id, tenant_id
            ))),
        }
    }
}

#[derive(Clone, Default)]
pub struct InMemoryStageExecutionRepository {
    records: Arc<RwLock<BTreeMap<(FlowId, String), StageExecutionRecord>>>,
}

impl InMemoryStageExecutionRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StageExecutionRepository for InMemoryStageExecutionRepository {
    async fn save(&self, record: &StageExecutionRecord) -> Result<(), RepositoryError> {
        self.records
            .write()
            .insert((record.flow_id, record.stage_name.clone()), record.clone());
        Ok(())
    }

    async fn find(&self, flow_id: FlowId, stage_name: &str) -> Result<Option<StageExecutionRecord>, RepositoryError> {
        Ok(self.records.read().get(&(flow_id, stage_name.to_string())).cloned())
    }

    async fn find_by_flow(&self, flow_id: FlowId) -> Result<Vec<StageExecutionRecord>, RepositoryError> {
        Ok(self
            .records
            .read()
            .values()
            .filter(|r| r.flow_id == flow_id)
            .cloned()
            .collect())
    }
}

#[derive(Clone, Default)]
pub struct InMemoryApplicationFlowRepository {
    flows: Arc<RwLock<BTreeMap<(FlowId, ApplicationId), ApplicationFlow>>>,
}

impl InMemoryApplicationFlowRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ApplicationFlowRepository for InMemoryApplicationFlowRepository {
    async fn save(&self, flow: &ApplicationFlow) -> Result<(), RepositoryError> {
        self.flows
            .write()
            .insert((flow.flow_id, flow.application_id.clone()), flow.clone());
        Ok(())
    }

    async fn find(
        &self,
        flow_id: FlowId,
        application_id: &ApplicationId,
    ) -> Result<Option<ApplicationFlow>, RepositoryError> {
        Ok(self.flows.read().get(&(flow_id, application_id.clone())).cloned())
    }

    async fn find_by_flow(&self, flow_id: FlowId) -> Result<Vec<ApplicationFlow>, RepositoryError> {
        Ok(self
            .flows
            .read()
            .values()
            .filter(|f| f.flow_id == flow_id)
            .cloned()
            .collect())
    }
}
