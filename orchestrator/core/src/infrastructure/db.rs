// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # PostgreSQL Connection Pool
//!
//! Wraps `sqlx::postgres::PgPool` in a thin `Database` newtype injected into
//! the PostgreSQL repositories. Only needed when `spec.database` is set in
//! `entitlement-config.yaml`; the schema is applied by `entctl update`.

use anyhow::{Context, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::domain::repository::PostgresConfig;

#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub async fn new(connection_string: &str) -> Result<Self> {
        Self::connect(&PostgresConfig {
            connection_string: connection_string.to_string(),
            max_connections: 5,
        })
        .await
    }

    pub async fn connect(config: &PostgresConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.connection_string)
            .await
            .context("Failed to connect to PostgreSQL")?;

        tracing::info!(max_connections = config.max_connections, "Connected to PostgreSQL");
        Ok(Self { pool })
    }

    pub fn get_pool(&self) -> &PgPool {
        &self.pool
    }
}
