// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Database Update Command
//!
//! `entctl update` applies the migrations under `cli/migrations` so the
//! entitlement, stage execution and application flow tables match this
//! version.
//!
//! # Usage
//!
//! ```bash
//! # Apply all pending migrations
//! entctl update
//!
//! # Preview migrations without applying
//! entctl update --dry-run
//! ```
//!
//! # Environment
//!
//! Uses `spec.database.url`, or `ENTITLEMENT_DATABASE_URL` when set.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use sqlx::postgres::PgPoolOptions;
use std::path::PathBuf;

use entitlement_core::domain::config::OrchestratorConfigManifest;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

#[derive(Args)]
pub struct UpdateCommand {
    /// Perform a dry run without applying changes
    #[arg(long)]
    dry_run: bool,
}

pub async fn execute(cmd: UpdateCommand, config_path: Option<PathBuf>) -> Result<()> {
    println!("{}", "Entitlement database update".bold().green());

    let config = OrchestratorConfigManifest::load_or_default(config_path).context("Failed to load configuration")?;
    let database = config
        .spec
        .database
        .context("No database configured. Set spec.database.url or ENTITLEMENT_DATABASE_URL.")?;

    println!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&database.url)
        .await
        .context("Failed to connect to database")?;

    // The tracking table does not exist before the first run
    let applied_count = sqlx::query("SELECT version FROM _sqlx_migrations")
        .fetch_all(&pool)
        .await
        .map(|rows| rows.len())
        .unwrap_or(0);

    let total_migrations = MIGRATOR.iter().count();

    println!(
        "Migration status: {} applied, {} total available.",
        applied_count, total_migrations
    );

    if applied_count < total_migrations {
        if cmd.dry_run {
            println!("Pending migrations found (Dry Run):");
            for migration in MIGRATOR.iter().skip(applied_count) {
                println!(" - {} {}", migration.version, migration.description);
            }
            println!("Skipping application due to --dry-run");
            return Ok(());
        }

        println!("Applying pending migrations...");
        MIGRATOR.run(&pool).await.context("Failed to apply migrations")?;
        println!("{}", "✓ Database updated successfully.".green());
    } else {
        println!("{}", "✓ Database is up to date.".green());
    }

    Ok(())
}
