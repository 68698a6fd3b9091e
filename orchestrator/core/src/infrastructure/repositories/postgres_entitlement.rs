// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Entitlement Repository
//!
//! `EntitlementRepository` backed by the `entitlements` table. The unique
//! index on `(tenant_id, application_name)` enforces one entitled version
//! per application; its violations surface as `RepositoryError::Conflict`.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;

use crate::domain::entitlement::{Entitlement, TenantId};
use crate::domain::repository::{EntitlementRepository, RepositoryError};
use crate::domain::version::ApplicationId;

pub struct PostgresEntitlementRepository {
    pool: PgPool,
}

impl PostgresEntitlementRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn entitlement_from_row(row: &PgRow) -> Result<Entitlement, RepositoryError> {
    let tenant_id: uuid::Uuid = row.try_get("tenant_id")?;
    let application_id: String = row.try_get("application_id")?;
    let application_id = ApplicationId::parse(application_id)
        .map_err(|e| RepositoryError::Serialization(format!("Invalid application id: {}", e)))?;
    Ok(Entitlement::new(TenantId::from_uuid(tenant_id), application_id))
}

#[async_trait]
impl EntitlementRepository for PostgresEntitlementRepository {
    async fn save(&self, entitlement: &Entitlement) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            INSERT INTO entitlements (tenant_id, application_id, application_name, created_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (tenant_id, application_id) DO NOTHING
            "#,
        )
        .bind(entitlement.tenant_id.0)
        .bind(entitlement.application_id.as_str())
        .bind(entitlement.application_name())
        .execute(&self.pool)
        .await?;

        tracing::debug!(
            tenant_id = %entitlement.tenant_id,
            application = %entitlement.application_id,
            inserted = result.rows_affected(),
            "Saved entitlement"
        );
        Ok(())
    }

    async fn replace(&self, from: &Entitlement, to: &Entitlement) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let deleted = sqlx::query("DELETE FROM entitlements WHERE tenant_id = $1 AND application_id = $2")
            .bind(from.tenant_id.0)
            .bind(from.application_id.as_str())
            .execute(&mut *tx)
            .await?;
        if deleted.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!(
                "entitlement {} for tenant {}",
                from.application_id, from.tenant_id
            )));
        }

        sqlx::query(
            r#"
            INSERT INTO entitlements (tenant_id, application_id, application_name, created_at)
            VALUES ($1, $2, $3, NOW())
            "#,
        )
        .bind(to.tenant_id.0)
        .bind(to.application_id.as_str())
        .bind(to.application_name())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn find_by_tenant(&self, tenant_id: TenantId) -> Result<Vec<Entitlement>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT tenant_id, application_id FROM entitlements WHERE tenant_id = $1 ORDER BY application_name",
        )
        .bind(tenant_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(entitlement_from_row).collect()
    }

    async fn find_by_application_names(
        &self,
        tenant_id: TenantId,
        names: &[String],
    ) -> Result<Vec<Entitlement>, RepositoryError> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query(
            r#"
            SELECT tenant_id, application_id FROM entitlements
            WHERE tenant_id = $1 AND application_name = ANY($2)
            ORDER BY application_name
            "#,
        )
        .bind(tenant_id.0)
        .bind(names)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(entitlement_from_row).collect()
    }

    async fn delete(&self, tenant_id: TenantId, application_id: &ApplicationId) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM entitlements WHERE tenant_id = $1 AND application_id = $2")
            .bind(tenant_id.0)
            .bind(application_id.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(format!(
                "entitlement {} for tenant {}",
                application_id, tenant_id
            )));
        }
        Ok(())
    }
}
