// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Application Flow Repository
//!
//! Per-application branch status in the `application_flows` table.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;

use crate::domain::entitlement::TenantId;
use crate::domain::flow::{ApplicationFlow, FlowId};
use crate::domain::repository::{ApplicationFlowRepository, RepositoryError};
use crate::domain::stage::StageStatus;
use crate::domain::transition::TransitionType;
use crate::domain::version::ApplicationId;

pub struct PostgresApplicationFlowRepository {
    pool: PgPool,
}

impl PostgresApplicationFlowRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn transition_type(raw: &str) -> Result<TransitionType, RepositoryError> {
    match raw {
        "ENTITLE" => Ok(TransitionType::Entitle),
        "UPGRADE" => Ok(TransitionType::Upgrade),
        "REVOKE" => Ok(TransitionType::Revoke),
        other => Err(RepositoryError::Serialization(format!("Unknown transition type: {}", other))),
    }
}

fn flow_from_row(row: &PgRow) -> Result<ApplicationFlow, RepositoryError> {
    let flow_id: uuid::Uuid = row.try_get("flow_id")?;
    let tenant_id: uuid::Uuid = row.try_get("tenant_id")?;
    let application_id: String = row.try_get("application_id")?;
    let kind: String = row.try_get("transition_type")?;
    let status: String = row.try_get("status")?;

    Ok(ApplicationFlow {
        flow_id: FlowId::from_uuid(flow_id),
        tenant_id: TenantId::from_uuid(tenant_id),
        application_id: ApplicationId::parse(application_id)
            .map_err(|e| RepositoryError::Serialization(format!("Invalid application id: {}", e)))?,
        transition_type: transition_type(&kind)?,
        status: status.parse::<StageStatus>().map_err(RepositoryError::Serialization)?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl ApplicationFlowRepository for PostgresApplicationFlowRepository {
    async fn save(&self, flow: &ApplicationFlow) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO application_flows (flow_id, application_id, tenant_id, transition_type, status, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (flow_id, application_id) DO UPDATE SET
                status = EXCLUDED.status,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(flow.flow_id.0)
        .bind(flow.application_id.as_str())
        .bind(flow.tenant_id.0)
        .bind(flow.transition_type.as_str())
        .bind(flow.status.as_str())
        .bind(flow.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find(
        &self,
        flow_id: FlowId,
        application_id: &ApplicationId,
    ) -> Result<Option<ApplicationFlow>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT flow_id, application_id, tenant_id, transition_type, status, updated_at
            FROM application_flows
            WHERE flow_id = $1 AND application_id = $2
            "#,
        )
        .bind(flow_id.0)
        .bind(application_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(flow_from_row).transpose()
    }

    async fn find_by_flow(&self, flow_id: FlowId) -> Result<Vec<ApplicationFlow>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT flow_id, application_id, tenant_id, transition_type, status, updated_at
            FROM application_flows
            WHERE flow_id = $1
            ORDER BY application_id
            "#,
        )
        .bind(flow_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(flow_from_row).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_type_matches_stored_names() {
        for kind in [TransitionType::Entitle, TransitionType::Upgrade, TransitionType::Revoke] {
            assert_eq!(transition_type(kind.as_str()).unwrap(), kind);
        }
        assert!(transition_type("PURGE").is_err());
    }
}
