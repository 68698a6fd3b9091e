// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Stage Execution Repository
//!
//! Durable per-stage status in the `stage_executions` table, keyed by
//! `(flow_id, stage_name)`.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;

use crate::domain::flow::FlowId;
use crate::domain::repository::{RepositoryError, StageExecutionRepository};
use crate::domain::stage::{StageExecutionRecord, StageStatus};

pub struct PostgresStageExecutionRepository {
    pool: PgPool,
}

impl PostgresStageExecutionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn record_from_row(row: &PgRow) -> Result<StageExecutionRecord, RepositoryError> {
    let flow_id: uuid::Uuid = row.try_get("flow_id")?;
    let status: String = row.try_get("status")?;
    let status: StageStatus = status.parse().map_err(RepositoryError::Serialization)?;

    Ok(StageExecutionRecord {
        flow_id: FlowId::from_uuid(flow_id),
        stage_name: row.try_get("stage_name")?,
        status,
        error_type: row.try_get("error_type")?,
        error_message: row.try_get("error_message")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl StageExecutionRepository for PostgresStageExecutionRepository {
    async fn save(&self, record: &StageExecutionRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO stage_executions (flow_id, stage_name, status, error_type, error_message, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (flow_id, stage_name) DO UPDATE SET
                status = EXCLUDED.status,
                error_type = EXCLUDED.error_type,
                error_message = EXCLUDED.error_message,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(record.flow_id.0)
        .bind(&record.stage_name)
        .bind(record.status.as_str())
        .bind(&record.error_type)
        .bind(&record.error_message)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find(&self, flow_id: FlowId, stage_name: &str) -> Result<Option<StageExecutionRecord>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT flow_id, stage_name, status, error_type, error_message, updated_at
            FROM stage_executions
            WHERE flow_id = $1 AND stage_name = $2
            "#,
        )
        .bind(flow_id.0)
        .bind(stage_name)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn find_by_flow(&self, flow_id: FlowId) -> Result<Vec<StageExecutionRecord>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT flow_id, stage_name, status, error_type, error_message, updated_at
            FROM stage_executions
            WHERE flow_id = $1
            ORDER BY updated_at, stage_name
            "#,
        )
        .bind(flow_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }
}
