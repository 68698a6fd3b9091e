// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Repository Interfaces
//!
//! Persistence contracts, defined in the domain layer and implemented in
//! `crate::infrastructure::repositories`.
//!
//! | Trait | Record | Implementations |
//! |-------|--------|----------------|
//! | `EntitlementRepository` | `Entitlement` | `InMemoryEntitlementRepository`, `PostgresEntitlementRepository` |
//! | `StageExecutionRepository` | `StageExecutionRecord` | `InMemoryStageExecutionRepository`, `PostgresStageExecutionRepository` |
//! | `ApplicationFlowRepository` | `ApplicationFlow` | `InMemoryApplicationFlowRepository`, `PostgresApplicationFlowRepository` |
//!
//! ## Storage Backend Abstraction
//!
//! The backend is selected at startup from configuration
//! (`entitlement-config.yaml`): in-memory for development and tests,
//! PostgreSQL when `spec.database` is set.

use async_trait::async_trait;

use crate::domain::entitlement::{Entitlement, TenantId};
use crate::domain::flow::{ApplicationFlow, FlowId};
use crate::domain::stage::StageExecutionRecord;
use crate::domain::version::ApplicationId;

/// Storage backend enum for pluggable persistence
#[derive(Debug, Clone)]
pub enum StorageBackend {
    InMemory,
    PostgreSQL(PostgresConfig),
}

#[derive(Debug, Clone)]
pub struct PostgresConfig {
    pub connection_string: String,
    pub max_connections: u32,
}

/// Entitlement store.
///
/// At most one entitlement exists per `(tenant, application name)`; `save`
/// fails with [`RepositoryError::Conflict`] when another version of the same
/// application is already entitled.
#[async_trait]
pub trait EntitlementRepository: Send + Sync {
    /// Insert an entitlement; saving an identical one again is a no-op
    async fn save(&self, entitlement: &Entitlement) -> Result<(), RepositoryError>;

    /// Swap `from` for `to` atomically
    async fn replace(&self, from: &Entitlement, to: &Entitlement) -> Result<(), RepositoryError>;

    async fn find_by_tenant(&self, tenant_id: TenantId) -> Result<Vec<Entitlement>, RepositoryError>;

    async fn find_by_application_names(
        &self,
        tenant_id: TenantId,
        names: &[String],
    ) -> Result<Vec<Entitlement>, RepositoryError>;

    /// Delete a single entitlement, `NotFound` if it does not exist
    async fn delete(&self, tenant_id: TenantId, application_id: &ApplicationId) -> Result<(), RepositoryError>;
}

/// Durable per-stage status, keyed by `(flow_id, stage_name)`
#[async_trait]
pub trait StageExecutionRepository: Send + Sync {
    /// Create or update
    async fn save(&self, record: &StageExecutionRecord) -> Result<(), RepositoryError>;

    async fn find(&self, flow_id: FlowId, stage_name: &str) -> Result<Option<StageExecutionRecord>, RepositoryError>;

    async fn find_by_flow(&self, flow_id: FlowId) -> Result<Vec<StageExecutionRecord>, RepositoryError>;
}

/// Per-application branch status, keyed by `(flow_id, application_id)`
#[async_trait]
pub trait ApplicationFlowRepository: Send + Sync {
    /// Create or update
    async fn save(&self, flow: &ApplicationFlow) -> Result<(), RepositoryError>;

    async fn find(
        &self,
        flow_id: FlowId,
        application_id: &ApplicationId,
    ) -> Result<Option<ApplicationFlow>, RepositoryError>;

    async fn find_by_flow(&self, flow_id: FlowId) -> Result<Vec<ApplicationFlow>, RepositoryError>;
}

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RepositoryError::NotFound("Row not found".to_string()),
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                RepositoryError::Conflict(db.message().to_string())
            }
            _ => RepositoryError::Database(err.to_string()),
        }
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}
