// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Flow Factory
//!
//! Turns a transition plan into a flow tree:
//!
//! ```text
//! Sequential
//! ├── entitle bucket   Sequential[ Parallel[app branch, ..] per application level ]
//! ├── upgrade bucket   (same)
//! └── revoke bucket    (application levels reversed)
//! ```
//!
//! An application branch is sequential. Its module stages follow the
//! installation levels of the module sequencer, each level a `Parallel` node:
//!
//! | Transition | Branch |
//! |------------|--------|
//! | entitle | started, install levels, `EntitlementCreator`, `ChangeNotifier`, finished |
//! | upgrade | started, install levels of changed modules, removal levels of dropped modules, `EntitlementUpgrader`, `ChangeNotifier`, finished |
//! | revoke | started, `EntitlementRemover`, `ChangeNotifier`, removal levels, finished |

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

use crate::application::context::{ApplicationContext, ModuleContext, RequestContext};
use crate::application::stages::{
    ApplicationFlowStatusStage, ChangeNotifier, EntitlementCreator, EntitlementRemover, EntitlementUpgrader,
    ModuleInstaller, ModuleUninstaller, StatusCallback,
};
use crate::domain::application::{ApplicationDescriptor, ModuleDescriptor};
use crate::domain::catalog::{ApplicationCatalog, ModuleDiscovery, ModuleTenantApi};
use crate::domain::dependency_resolver::ApplicationDependencyResolver;
use crate::domain::errors::{EntitlementError, ValidationError, Violations};
use crate::domain::events::EventPublisher;
use crate::domain::flow::{BoundStage, ExecutionStrategy, Flow, FlowNode};
use crate::domain::module_sequencer::{Direction, ModuleInstallationSequencer, ModuleLevels};
use crate::domain::repository::{ApplicationFlowRepository, EntitlementRepository};
use crate::domain::stage::Stage;
use crate::domain::transition::TransitionType;
use crate::domain::version::{ApplicationId, ModuleId};

/// Descriptors a flow is built from
#[derive(Debug, Clone, Default)]
pub struct FlowDescriptors {
    /// Entitle and upgrade targets, plus the dependencies loaded for them
    pub targets: Vec<ApplicationDescriptor>,
    /// Currently entitled versions replaced by upgrades
    pub previous: Vec<ApplicationDescriptor>,
    pub revoked: Vec<ApplicationDescriptor>,
}

/// Collaborators the stages of a flow talk to
pub struct FlowCollaborators {
    pub catalog: Arc<dyn ApplicationCatalog>,
    pub entitlements: Arc<dyn EntitlementRepository>,
    pub application_flows: Arc<dyn ApplicationFlowRepository>,
    pub module_api: Arc<dyn ModuleTenantApi>,
    pub publisher: Arc<dyn EventPublisher>,
}

pub struct FlowFactory {
    catalog: Arc<dyn ApplicationCatalog>,
    strategy: ExecutionStrategy,
    started: Arc<dyn Stage<ApplicationContext>>,
    finished: Arc<dyn Stage<ApplicationContext>>,
    installer: Arc<dyn Stage<ModuleContext>>,
    uninstaller: Arc<dyn Stage<ModuleContext>>,
    creator: Arc<dyn Stage<ApplicationContext>>,
    upgrader: Arc<dyn Stage<ApplicationContext>>,
    remover: Arc<dyn Stage<ApplicationContext>>,
    notifier: Arc<dyn Stage<ApplicationContext>>,
}

impl FlowFactory {
    pub fn new(
        collaborators: FlowCollaborators,
        topic: impl Into<String>,
        strategy: ExecutionStrategy,
        status_callback: Option<StatusCallback>,
    ) -> Self {
        let mut started = ApplicationFlowStatusStage::started(collaborators.application_flows.clone());
        let mut finished = ApplicationFlowStatusStage::finished(collaborators.application_flows);
        if let Some(callback) = status_callback {
            started = started.with_callback(callback.clone());
            finished = finished.with_callback(callback);
        }

        Self {
            catalog: collaborators.catalog,
            strategy,
            started: Arc::new(started),
            finished: Arc::new(finished),
            installer: Arc::new(ModuleInstaller::new(collaborators.module_api.clone())),
            uninstaller: Arc::new(ModuleUninstaller::new(collaborators.module_api)),
            creator: Arc::new(EntitlementCreator::new(collaborators.entitlements.clone())),
            upgrader: Arc::new(EntitlementUpgrader::new(collaborators.entitlements.clone())),
            remover: Arc::new(EntitlementRemover::new(collaborators.entitlements)),
            notifier: Arc::new(ChangeNotifier::new(collaborators.publisher, topic)),
        }
    }

    pub async fn create(
        &self,
        request: Arc<RequestContext>,
        descriptors: &FlowDescriptors,
    ) -> Result<Flow, EntitlementError> {
        let targets = index(&descriptors.targets);
        let revoked = index(&descriptors.revoked);
        let previous: HashMap<&str, &ApplicationDescriptor> =
            descriptors.previous.iter().map(|d| (d.name.as_str(), d)).collect();

        let mut buckets = Vec::new();
        for transition_type in [TransitionType::Entitle, TransitionType::Upgrade, TransitionType::Revoke] {
            let ids = &request.plan.bucket(transition_type).application_ids;
            if ids.is_empty() {
                continue;
            }

            let universe = if transition_type == TransitionType::Revoke {
                &descriptors.revoked
            } else {
                &descriptors.targets
            };
            let lookup = if transition_type == TransitionType::Revoke { &revoked } else { &targets };
            let selected = select(ids.iter(), lookup)?;

            let mut levels = ApplicationDependencyResolver::new(universe.iter()).sequence(&selected)?;
            if transition_type == TransitionType::Revoke {
                levels.reverse();
            }

            let mut level_nodes = Vec::new();
            for level in levels {
                let mut branches = Vec::new();
                for id in level {
                    let descriptor = lookup.get(&id).copied().ok_or_else(|| {
                        ValidationError::new("Application descriptor not loaded")
                            .with_parameter(id.to_string(), "descriptor missing")
                    })?;
                    let previous_descriptor = match transition_type {
                        TransitionType::Upgrade => Some(previous.get(id.name()).copied().ok_or_else(|| {
                            ValidationError::new("Previous application descriptor not loaded")
                                .with_parameter(id.to_string(), "upgrade source missing")
                        })?),
                        _ => None,
                    };
                    let context = Arc::new(ApplicationContext {
                        request: request.clone(),
                        descriptor: Arc::new(descriptor.clone()),
                        transition_type,
                        previous: previous_descriptor.map(|d| Arc::new(d.clone())),
                    });
                    branches.push(self.application_branch(context).await?);
                }
                level_nodes.push(FlowNode::Parallel(branches));
            }
            buckets.push(FlowNode::Sequential(level_nodes));
        }

        let flow = Flow::new(request.flow_id, self.strategy, FlowNode::Sequential(buckets));
        debug!(flow_id = %flow.id, stages = flow.root.stage_ids().len(), "Flow created");
        Ok(flow)
    }

    async fn application_branch(&self, context: Arc<ApplicationContext>) -> Result<FlowNode, EntitlementError> {
        let mut nodes = vec![self.application_stage(&self.started, &context)];

        match context.transition_type {
            TransitionType::Entitle => {
                let discovery = self.catalog.get_module_discovery(context.application_id()).await?;
                let levels = ModuleInstallationSequencer::sequence(&context.descriptor, Direction::Install)?;
                nodes.extend(self.module_levels(&context, levels, Direction::Install, &discovery, |_| None)?);
                nodes.push(self.application_stage(&self.creator, &context));
                nodes.push(self.application_stage(&self.notifier, &context));
            }
            TransitionType::Upgrade => {
                let previous = context.previous.clone().ok_or_else(|| {
                    ValidationError::new("Previous application descriptor not loaded")
                        .with_parameter(context.application_id().to_string(), "upgrade source missing")
                })?;
                let discovery = self.catalog.get_module_discovery(context.application_id()).await?;

                // Changed or added modules, in installation order of the new version
                let levels = ModuleInstallationSequencer::sequence(&context.descriptor, Direction::Install)?;
                let changed: ModuleLevels = levels
                    .into_iter()
                    .map(|level| {
                        level
                            .into_iter()
                            .filter(|id| previous.find_module(id).is_none())
                            .collect::<Vec<_>>()
                    })
                    .filter(|level| !level.is_empty())
                    .collect();
                nodes.extend(self.module_levels(&context, changed, Direction::Install, &discovery, |id| {
                    previous.find_module_by_name(id.name()).map(|m| m.id.clone())
                })?);

                // Modules the new version no longer ships
                let dropped: Vec<&ModuleDescriptor> = previous
                    .all_modules()
                    .filter(|m| context.descriptor.find_module_by_name(m.id.name()).is_none())
                    .collect();
                if !dropped.is_empty() {
                    let previous_discovery = self.catalog.get_module_discovery(&previous.id).await?;
                    let levels = ModuleInstallationSequencer::sequence_modules(&dropped, Direction::Remove)?;
                    nodes.extend(self.module_levels(&context, levels, Direction::Remove, &previous_discovery, |_| None)?);
                }

                nodes.push(self.application_stage(&self.upgrader, &context));
                nodes.push(self.application_stage(&self.notifier, &context));
            }
            TransitionType::Revoke => {
                let discovery = self.catalog.get_module_discovery(context.application_id()).await?;
                nodes.push(self.application_stage(&self.remover, &context));
                nodes.push(self.application_stage(&self.notifier, &context));
                let levels = ModuleInstallationSequencer::sequence(&context.descriptor, Direction::Remove)?;
                nodes.extend(self.module_levels(&context, levels, Direction::Remove, &discovery, |_| None)?);
            }
        }

        nodes.push(self.application_stage(&self.finished, &context));
        Ok(FlowNode::Sequential(nodes))
    }

    fn application_stage(&self, stage: &Arc<dyn Stage<ApplicationContext>>, context: &Arc<ApplicationContext>) -> FlowNode {
        BoundStage::new(
            format!("{}/{}", context.application_id(), stage.name()),
            stage.clone(),
            context.clone(),
        )
        .into_node()
    }

    fn module_levels(
        &self,
        context: &Arc<ApplicationContext>,
        levels: ModuleLevels,
        direction: Direction,
        discovery: &ModuleDiscovery,
        previous_of: impl Fn(&ModuleId) -> Option<ModuleId>,
    ) -> Result<Vec<FlowNode>, ValidationError> {
        let stage = match direction {
            Direction::Install => &self.installer,
            Direction::Remove => &self.uninstaller,
        };

        let mut missing = Violations::new("Module discovery not found");
        let mut nodes = Vec::new();
        for level in levels {
            let mut branch = Vec::new();
            for module_id in level {
                let Some(location) = discovery.get(&module_id) else {
                    missing.add(module_id.to_string(), context.application_id().to_string());
                    continue;
                };
                let module_context = Arc::new(ModuleContext {
                    application: context.clone(),
                    previous_module_id: previous_of(&module_id),
                    location: location.clone(),
                    module_id,
                });
                branch.push(
                    BoundStage::new(
                        format!("{}/{}/{}", context.application_id(), stage.name(), module_context.module_id),
                        stage.clone(),
                        module_context,
                    )
                    .into_node(),
                );
            }
            nodes.push(FlowNode::Parallel(branch));
        }
        missing.into_result()?;
        Ok(nodes)
    }
}

fn index(descriptors: &[ApplicationDescriptor]) -> BTreeMap<&ApplicationId, &ApplicationDescriptor> {
    descriptors.iter().map(|d| (&d.id, d)).collect()
}

fn select<'a, 'b>(
    ids: impl Iterator<Item = &'b ApplicationId>,
    lookup: &BTreeMap<&ApplicationId, &'a ApplicationDescriptor>,
) -> Result<Vec<&'a ApplicationDescriptor>, ValidationError> {
    let mut missing = Violations::new("Application descriptor not loaded");
    let mut selected = Vec::new();
    for id in ids {
        match lookup.get(id) {
            Some(descriptor) => selected.push(*descriptor),
            None => missing.add(id.to_string(), "descriptor missing"),
        }
    }
    missing.into_result()?;
    Ok(selected)
}
