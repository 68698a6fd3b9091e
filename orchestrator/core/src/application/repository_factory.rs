// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Repository Factory - Application Layer
//!
//! Creates concrete repository implementations based on the storage backend
//! configuration. The domain layer only defines the repository traits; the
//! infrastructure layer provides the implementations.

use std::sync::Arc;
use sqlx::PgPool;

use crate::domain::repository::{
    ApplicationFlowRepository, EntitlementRepository, StageExecutionRepository, StorageBackend,
};
use crate::infrastructure::repositories::postgres_application_flow::PostgresApplicationFlowRepository;
use crate::infrastructure::repositories::postgres_entitlement::PostgresEntitlementRepository;
use crate::infrastructure::repositories::postgres_stage_execution::PostgresStageExecutionRepository;
use crate::infrastructure::repositories::{
    InMemoryApplicationFlowRepository, InMemoryEntitlementRepository, InMemoryStageExecutionRepository,
};

/// Repositories shared by one orchestrator instance
#[derive(Clone)]
pub struct Repositories {
    pub entitlements: Arc<dyn EntitlementRepository>,
    pub stage_executions: Arc<dyn StageExecutionRepository>,
    pub application_flows: Arc<dyn ApplicationFlowRepository>,
}

impl Repositories {
    /// Build every repository for `backend`; `pool` is required for PostgreSQL
    pub fn create(backend: &StorageBackend, pool: Option<PgPool>) -> anyhow::Result<Self> {
        match (backend, pool) {
            (StorageBackend::InMemory, _) => Ok(Self {
                entitlements: Arc::new(InMemoryEntitlementRepository::new()),
                stage_executions: Arc::new(InMemoryStageExecutionRepository::new()),
                application_flows: Arc::new(InMemoryApplicationFlowRepository::new()),
            }),
            (StorageBackend::PostgreSQL(_), Some(pool)) => Ok(Self {
                entitlements: create_entitlement_repository(backend, pool.clone()),
                stage_executions: create_stage_execution_repository(backend, pool.clone()),
                application_flows: create_application_flow_repository(backend, pool),
            }),
            (StorageBackend::PostgreSQL(_), None) => {
                anyhow::bail!("PostgreSQL storage backend configured without a connection pool")
            }
        }
    }
}

/// Creates an EntitlementRepository implementation based on the configured backend
pub fn create_entitlement_repository(backend: &StorageBackend, pool: PgPool) -> Arc<dyn EntitlementRepository> {
    match backend {
        StorageBackend::InMemory => Arc::new(InMemoryEntitlementRepository::new()),
        StorageBackend::PostgreSQL(_) => Arc::new(PostgresEntitlementRepository::new(pool)),
    }
}

/// Creates a StageExecutionRepository implementation based on the configured backend
pub fn create_stage_execution_repository(
    backend: &StorageBackend,
    pool: PgPool,
) -> Arc<dyn StageExecutionRepository> {
    match backend {
        StorageBackend::InMemory => Arc::new(InMemoryStageExecutionRepository::new()),
        StorageBackend::PostgreSQL(_) => Arc::new(PostgresStageExecutionRepository::new(pool)),
    }
}

/// Creates an ApplicationFlowRepository implementation based on the configured backend
pub fn create_application_flow_repository(
    backend: &StorageBackend,
    pool: PgPool,
) -> Arc<dyn ApplicationFlowRepository> {
    match backend {
        StorageBackend::InMemory => Arc::new(InMemoryApplicationFlowRepository::new()),
        StorageBackend::PostgreSQL(_) => Arc::new(PostgresApplicationFlowRepository::new(pool)),
    }
}
