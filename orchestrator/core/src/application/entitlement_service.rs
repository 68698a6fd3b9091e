// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Apply Desired State Use Case
//!
//! Application service moving a tenant from its current entitlements to a
//! requested set of applications.
//!
//! # DDD Pattern: Application Service
//!
//! - **Layer:** Application
//! - **Responsibility:** Orchestrate planning, validation and execution of an entitlement change
//! - **Collaborators:**
//!   - Domain: StateTransitionPlanner, StateTransitionValidator, InterfaceIntegrityValidator
//!   - Infrastructure: TenantDirectory, ApplicationCatalog, EntitlementRepository, ApplicationFlowRepository
//!   - Application: ApplicationDescriptorTreeLoader, FlowFactory, FlowEngine

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, warn};

use crate::application::context::RequestContext;
use crate::application::descriptor_tree_loader::ApplicationDescriptorTreeLoader;
use crate::application::flow_engine::FlowEngine;
use crate::application::flow_factory::{FlowDescriptors, FlowFactory};
use crate::domain::application::ApplicationDescriptor;
use crate::domain::catalog::{ApplicationCatalog, TenantDirectory};
use crate::domain::entitlement::TenantId;
use crate::domain::errors::{EntitlementError, Violations};
use crate::domain::flow::{ExecutionStrategy, FlowExecutionReport, FlowId};
use crate::domain::interface_integrity::InterfaceIntegrityValidator;
use crate::domain::repository::{ApplicationFlowRepository, EntitlementRepository};
use crate::domain::stage::StageStatus;
use crate::domain::transition::{
    ApplicationStateTransitionPlan, StateTransitionPlanner, StateTransitionValidator,
};
use crate::domain::version::ApplicationId;

/// Desired state of one tenant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DesiredStateRequest {
    pub tenant_id: TenantId,

    /// Every application the tenant should have afterwards
    pub applications: Vec<ApplicationId>,

    /// Overrides `spec.flow.purge_on_revoke`
    #[serde(default)]
    pub purge: Option<bool>,

    /// Overrides `spec.flow.default_strategy`
    #[serde(default)]
    pub strategy: Option<ExecutionStrategy>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DesiredStateResult {
    pub flow_id: FlowId,
    pub plan: ApplicationStateTransitionPlan,
    /// Absent when the tenant already is in the desired state
    pub report: Option<FlowExecutionReport>,
}

/// Apply Desired State Use Case
#[async_trait]
pub trait ApplyDesiredStateUseCase: Send + Sync {
    /// Move the tenant to `request.applications`
    ///
    /// # Errors
    ///
    /// - `Validation`: invalid transition, unsatisfied dependency or interface
    /// - `Integration`: tenant directory or catalog unavailable
    /// - `Execution`: the flow failed; carries the status of every stage
    async fn apply_desired_state(&self, request: DesiredStateRequest) -> Result<DesiredStateResult, EntitlementError>;
}

/// Standard implementation of ApplyDesiredStateUseCase
pub struct StandardApplyDesiredStateUseCase {
    tenant_directory: Arc<dyn TenantDirectory>,
    catalog: Arc<dyn ApplicationCatalog>,
    entitlements: Arc<dyn EntitlementRepository>,
    application_flows: Arc<dyn ApplicationFlowRepository>,
    loader: ApplicationDescriptorTreeLoader,
    flow_factory: Arc<FlowFactory>,
    flow_engine: Arc<FlowEngine>,
    purge_on_revoke: bool,
}

impl StandardApplyDesiredStateUseCase {
    pub fn new(
        tenant_directory: Arc<dyn TenantDirectory>,
        catalog: Arc<dyn ApplicationCatalog>,
        entitlements: Arc<dyn EntitlementRepository>,
        application_flows: Arc<dyn ApplicationFlowRepository>,
        flow_factory: Arc<FlowFactory>,
        flow_engine: Arc<FlowEngine>,
        purge_on_revoke: bool,
    ) -> Self {
        Self {
            loader: ApplicationDescriptorTreeLoader::new(catalog.clone(), entitlements.clone()),
            tenant_directory,
            catalog,
            entitlements,
            application_flows,
            flow_factory,
            flow_engine,
            purge_on_revoke,
        }
    }

    /// Batch-fetch descriptors by id, failing if any is unknown to the catalog
    async fn fetch_exact(&self, ids: &[ApplicationId]) -> Result<Vec<ApplicationDescriptor>, EntitlementError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let descriptors = self.catalog.get_application_descriptors(ids).await?;
        let mut missing = Violations::new("Application descriptors not found");
        for id in ids {
            if !descriptors.iter().any(|d| &d.id == id) {
                missing.add(id.to_string(), "not found in catalog");
            }
        }
        missing.into_result()?;
        Ok(descriptors)
    }

    /// Mark branches that never reached a final status as failed
    async fn close_application_flows(&self, flow_id: FlowId) -> Result<(), EntitlementError> {
        for mut application_flow in self.application_flows.find_by_flow(flow_id).await? {
            if application_flow.status == StageStatus::InProgress {
                application_flow.status = StageStatus::Failed;
                application_flow.updated_at = chrono::Utc::now();
                self.application_flows.save(&application_flow).await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ApplyDesiredStateUseCase for StandardApplyDesiredStateUseCase {
    async fn apply_desired_state(&self, request: DesiredStateRequest) -> Result<DesiredStateResult, EntitlementError> {
        let flow_id = FlowId::new();

        // Step 1: Resolve tenant and current entitlements
        let tenant = self.tenant_directory.find_tenant(request.tenant_id).await?;
        let current = self.entitlements.find_by_tenant(tenant.id).await?;
        let entitled: Vec<ApplicationId> = current.iter().map(|e| e.application_id.clone()).collect();

        // Step 2: Plan and validate the transition against the stored state
        let plan = StateTransitionPlanner::plan(&request.applications, &entitled)?;
        StateTransitionValidator::validate(&plan, &current)?;
        info!(
            flow_id = %flow_id,
            tenant = %tenant.name,
            entitle = plan.entitle().application_ids.len(),
            upgrade = plan.upgrade().application_ids.len(),
            revoke = plan.revoke().application_ids.len(),
            "Planned entitlement transition"
        );

        if plan.is_empty() {
            info!(flow_id = %flow_id, tenant = %tenant.name, "Tenant already in desired state");
            return Ok(DesiredStateResult {
                flow_id,
                plan,
                report: None,
            });
        }

        // Step 3: Load descriptors of the targets and their dependencies
        let targets: Vec<ApplicationId> = plan
            .entitle()
            .application_ids
            .iter()
            .chain(plan.upgrade().application_ids.iter())
            .cloned()
            .collect();
        let tree = self.loader.load(tenant.id, &targets).await?;
        let target_set: BTreeSet<&ApplicationId> = targets.iter().collect();

        let mut unentitled = Violations::new("Application dependencies are neither entitled nor requested");
        for descriptor in tree.descriptors().filter(|d| !target_set.contains(&d.id)) {
            unentitled.add(descriptor.name.clone(), format!("resolved to {}", descriptor.id));
        }
        unentitled.into_result()?;

        let revoked_ids = &plan.revoke().application_ids;
        let mut revoked_dependencies = Violations::new("Dependency is revoked by the same request");
        for id in tree.entitled_dependencies.values().filter(|id| revoked_ids.contains(*id)) {
            revoked_dependencies.add(id.to_string(), "still required");
        }
        revoked_dependencies.into_result()?;

        // Step 4: Fetch descriptors the tree does not cover
        let entitled_dependency_ids: Vec<ApplicationId> = tree.entitled_dependencies.values().cloned().collect();
        let previous_ids: Vec<ApplicationId> = plan
            .upgrade()
            .application_ids
            .iter()
            .filter_map(|id| plan.upgraded_from(id).cloned())
            .collect();
        let revoked_ids: Vec<ApplicationId> = revoked_ids.iter().cloned().collect();

        let entitled_dependencies = self.fetch_exact(&entitled_dependency_ids).await?;
        let previous = self.fetch_exact(&previous_ids).await?;
        let revoked = self.fetch_exact(&revoked_ids).await?;

        // Step 5: Every required interface must be provided
        let validated: Vec<&ApplicationDescriptor> = tree.descriptors().collect();
        let available: Vec<&ApplicationDescriptor> = tree.descriptors().chain(entitled_dependencies.iter()).collect();
        InterfaceIntegrityValidator::validate(&validated, &available)?;

        // Step 6: Build and run the flow
        let request_context = Arc::new(RequestContext {
            flow_id,
            tenant: tenant.clone(),
            purge: request.purge.unwrap_or(self.purge_on_revoke),
            plan: plan.clone(),
        });
        let descriptors = FlowDescriptors {
            targets: tree.descriptors().cloned().collect(),
            previous,
            revoked,
        };
        let mut flow = self.flow_factory.create(request_context, &descriptors).await?;
        if let Some(strategy) = request.strategy {
            flow.strategy = strategy;
        }

        let report = self.flow_engine.execute(&flow).await?;

        // Step 7: Report
        if !report.status.is_success() {
            self.close_application_flows(flow_id).await?;
            warn!(flow_id = %flow_id, tenant = %tenant.name, status = %report.status, "Entitlement flow failed");
            return Err(EntitlementError::Execution(Box::new(report)));
        }

        info!(flow_id = %flow_id, tenant = %tenant.name, "Entitlement flow finished");
        Ok(DesiredStateResult {
            flow_id,
            plan,
            report: Some(report),
        })
    }
}
