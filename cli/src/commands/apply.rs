// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Apply Command
//!
//! `entctl apply` moves a tenant to a desired set of applications. It wires
//! the HTTP adapters, the repositories selected by `spec.database` and the
//! in-process event bus into the apply-desired-state use case and prints the
//! flow report.
//!
//! # Usage
//!
//! ```bash
//! # Entitle or upgrade to exactly these applications, revoking the rest
//! entctl apply --tenant 6f1c... --application users-1.1.0,notes-1.0.0
//!
//! # Revoke everything and ask modules to drop tenant data
//! entctl apply --tenant 6f1c... --purge
//! ```

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use entitlement_core::application::{
    ApplyDesiredStateUseCase, DesiredStateRequest, FlowCollaborators, FlowEngine, FlowFactory, Repositories,
    StandardApplyDesiredStateUseCase,
};
use entitlement_core::domain::catalog::{ApplicationCatalog, ModuleTenantApi, TenantDirectory};
use entitlement_core::domain::config::OrchestratorConfigManifest;
use entitlement_core::domain::entitlement::TenantId;
use entitlement_core::domain::flow::ExecutionStrategy;
use entitlement_core::domain::repository::StorageBackend;
use entitlement_core::domain::stage::StageStatus;
use entitlement_core::infrastructure::db::Database;
use entitlement_core::infrastructure::{
    EventBus, EventReceiver, HttpApplicationCatalog, HttpModuleTenantApi, HttpTenantDirectory,
};

use super::{parse_application_ids, plan::print_plan, report_error};

#[derive(Args)]
pub struct ApplyCommand {
    /// Tenant to change
    #[arg(short, long, value_name = "UUID")]
    tenant: Uuid,

    /// Every application the tenant should have afterwards (repeatable or comma separated)
    #[arg(short, long = "application", value_name = "ID")]
    applications: Vec<String>,

    /// Ask modules to drop tenant data on revoke (default: spec.flow.purge_on_revoke)
    #[arg(long)]
    purge: bool,

    /// fail-fast or ignore-errors (default: spec.flow.default_strategy)
    #[arg(long, value_name = "STRATEGY")]
    strategy: Option<ExecutionStrategy>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

pub async fn execute(cmd: ApplyCommand, config_path: Option<PathBuf>) -> Result<()> {
    let config = OrchestratorConfigManifest::load_or_default(config_path).context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;

    let backend = config.storage_backend();
    let pool = match &backend {
        StorageBackend::PostgreSQL(postgres) => Some(Database::connect(postgres).await?.get_pool().clone()),
        StorageBackend::InMemory => {
            warn!("No database configured, entitlements are kept in memory for this run only");
            None
        }
    };
    let repositories = Repositories::create(&backend, pool)?;

    let catalog: Arc<dyn ApplicationCatalog> = Arc::new(HttpApplicationCatalog::new(&config.spec.catalog)?);
    let tenants: Arc<dyn TenantDirectory> = Arc::new(HttpTenantDirectory::new(&config.spec.tenant_directory)?);
    let module_api: Arc<dyn ModuleTenantApi> = Arc::new(HttpModuleTenantApi::new(&config.spec.modules)?);
    let event_bus = Arc::new(EventBus::from_config(&config.spec.event_bus));
    let mut events = event_bus.subscribe_topic(config.spec.event_bus.topic.clone());

    let flow_factory = Arc::new(FlowFactory::new(
        FlowCollaborators {
            catalog: catalog.clone(),
            entitlements: repositories.entitlements.clone(),
            application_flows: repositories.application_flows.clone(),
            module_api,
            publisher: event_bus.clone(),
        },
        config.spec.event_bus.topic.clone(),
        config.spec.flow.default_strategy,
        None,
    ));
    let flow_engine = Arc::new(FlowEngine::new(repositories.stage_executions.clone()));

    let use_case = StandardApplyDesiredStateUseCase::new(
        tenants,
        catalog,
        repositories.entitlements.clone(),
        repositories.application_flows.clone(),
        flow_factory,
        flow_engine,
        config.spec.flow.purge_on_revoke,
    );

    let request = DesiredStateRequest {
        tenant_id: TenantId::from_uuid(cmd.tenant),
        applications: parse_application_ids(&cmd.applications)?,
        purge: cmd.purge.then_some(true),
        strategy: cmd.strategy,
    };
    info!(tenant_id = %request.tenant_id, applications = request.applications.len(), "Applying desired state");

    let result = use_case.apply_desired_state(request).await.map_err(report_error)?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    print_plan(&result.plan);
    if let Some(report) = &result.report {
        println!();
        println!("{}", "Stages:".bold());
        for stage in &report.stages {
            let padded = format!("{:<20}", stage.status.as_str());
            let status = match stage.status {
                StageStatus::Finished => padded.green(),
                StageStatus::Failed | StageStatus::CancellationFailed => padded.red(),
                _ => padded.yellow(),
            };
            println!("  {} {}", status, stage.stage_name);
        }
        println!();
        print_events(&mut events);
        println!("{}", format!("✓ {}", report.summary()).green());
    }
    Ok(())
}

/// Drain the events published during the run
fn print_events(events: &mut EventReceiver) {
    let mut published = Vec::new();
    while let Ok(message) = events.try_recv() {
        published.push(message);
    }
    println!("{} ({})", "Published events:".bold(), published.len());
    for message in published {
        let event = message.event;
        match event.previous_module_id {
            Some(previous) => println!("  {:?} {} → {}", event.event_type, previous, event.module_id),
            None => println!("  {:?} {}", event.event_type, event.module_id),
        }
    }
}
