// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Application Descriptor Tree Loader
//!
//! Loads the descriptors of the requested applications and of every
//! application they depend on, transitively. Each round collects the
//! dependencies of the descriptors loaded in the previous round:
//!
//! 1. a dependency whose name is already loaded must accept the loaded
//!    version, otherwise the request fails;
//! 2. the remaining names are looked up in the tenant's entitlements with a
//!    single query; an entitled version must accept the range and resolves
//!    the dependency without a catalog call;
//! 3. what is still unresolved is fetched from the catalog and expanded in
//!    the next round.
//!
//! Rounds stop once nothing new is fetched. Every fetched name is added to
//! the accumulator, so the loop terminates without a visited stack; circular
//! application dependencies are reported by the interface validator.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::application::{ApplicationDescriptor, Dependency};
use crate::domain::catalog::ApplicationCatalog;
use crate::domain::entitlement::TenantId;
use crate::domain::errors::{EntitlementError, ValidationError, Violations};
use crate::domain::repository::EntitlementRepository;
use crate::domain::version::{satisfies, ApplicationId};

/// Deduplicated closure of the descriptors a request needs
#[derive(Debug, Clone, Default)]
pub struct ApplicationDescriptorTree {
    /// Requested applications and fetched dependencies, by name
    pub descriptors: BTreeMap<String, ApplicationDescriptor>,
    /// Dependencies satisfied by applications the tenant already has
    pub entitled_dependencies: BTreeMap<String, ApplicationId>,
}

impl ApplicationDescriptorTree {
    pub fn get(&self, id: &ApplicationId) -> Option<&ApplicationDescriptor> {
        self.descriptors.get(id.name()).filter(|d| &d.id == id)
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &ApplicationDescriptor> {
        self.descriptors.values()
    }
}

pub struct ApplicationDescriptorTreeLoader {
    catalog: Arc<dyn ApplicationCatalog>,
    entitlements: Arc<dyn EntitlementRepository>,
}

impl ApplicationDescriptorTreeLoader {
    pub fn new(catalog: Arc<dyn ApplicationCatalog>, entitlements: Arc<dyn EntitlementRepository>) -> Self {
        Self { catalog, entitlements }
    }

    pub async fn load(
        &self,
        tenant_id: TenantId,
        requested: &[ApplicationId],
    ) -> Result<ApplicationDescriptorTree, EntitlementError> {
        let mut tree = ApplicationDescriptorTree::default();
        if requested.is_empty() {
            return Ok(tree);
        }

        let fetched = self.catalog.get_application_descriptors(requested).await?;
        let missing: Vec<&ApplicationId> = requested
            .iter()
            .filter(|id| !fetched.iter().any(|d| &d.id == *id))
            .collect();
        if !missing.is_empty() {
            let mut err = ValidationError::new("Application descriptors not found");
            for id in missing {
                err = err.with_parameter(id.to_string(), "not found in catalog");
            }
            return Err(err.into());
        }

        let mut pending: Vec<String> = Vec::new();
        for descriptor in fetched {
            pending.push(descriptor.name.clone());
            tree.descriptors.insert(descriptor.name.clone(), descriptor);
        }

        let mut round = 0;
        while !pending.is_empty() {
            round += 1;
            let unresolved = self.unresolved_dependencies(&tree, &pending)?;
            if unresolved.is_empty() {
                break;
            }
            debug!(round, unresolved = unresolved.len(), "Resolving application dependencies");

            let unresolved = self.resolve_from_entitlements(tenant_id, &mut tree, unresolved).await?;
            pending = self.fetch_from_catalog(&mut tree, unresolved).await?;
        }

        info!(
            requested = requested.len(),
            loaded = tree.descriptors.len(),
            entitled_dependencies = tree.entitled_dependencies.len(),
            "Loaded application descriptor tree"
        );
        Ok(tree)
    }

    /// Dependencies of the `pending` descriptors not yet satisfied, grouped by name
    fn unresolved_dependencies(
        &self,
        tree: &ApplicationDescriptorTree,
        pending: &[String],
    ) -> Result<BTreeMap<String, Vec<Dependency>>, EntitlementError> {
        let mut unresolved: BTreeMap<String, Vec<Dependency>> = BTreeMap::new();
        for name in pending {
            let Some(descriptor) = tree.descriptors.get(name) else {
                continue;
            };
            for dependency in &descriptor.dependencies {
                if let Some(selected) = tree.descriptors.get(&dependency.name) {
                    check_version(dependency, &selected.id)?;
                } else if let Some(entitled) = tree.entitled_dependencies.get(&dependency.name) {
                    check_version(dependency, entitled)?;
                } else {
                    unresolved
                        .entry(dependency.name.clone())
                        .or_default()
                        .push(dependency.clone());
                }
            }
        }
        Ok(unresolved)
    }

    async fn resolve_from_entitlements(
        &self,
        tenant_id: TenantId,
        tree: &mut ApplicationDescriptorTree,
        mut unresolved: BTreeMap<String, Vec<Dependency>>,
    ) -> Result<BTreeMap<String, Vec<Dependency>>, EntitlementError> {
        let names: Vec<String> = unresolved.keys().cloned().collect();
        let entitled = self.entitlements.find_by_application_names(tenant_id, &names).await?;

        for entitlement in entitled {
            let Some(dependencies) = unresolved.remove(entitlement.application_name()) else {
                continue;
            };
            for dependency in &dependencies {
                check_version(dependency, &entitlement.application_id)?;
            }
            debug!(application = %entitlement.application_id, "Dependency satisfied by existing entitlement");
            tree.entitled_dependencies
                .insert(entitlement.application_name().to_string(), entitlement.application_id);
        }
        Ok(unresolved)
    }

    /// Fetch the newest matching descriptors; returns the names to expand next
    async fn fetch_from_catalog(
        &self,
        tree: &mut ApplicationDescriptorTree,
        unresolved: BTreeMap<String, Vec<Dependency>>,
    ) -> Result<Vec<String>, EntitlementError> {
        if unresolved.is_empty() {
            return Ok(Vec::new());
        }

        let query: Vec<Dependency> = unresolved
            .values()
            .filter_map(|dependencies| dependencies.first().cloned())
            .collect();
        let fetched = self.catalog.find_latest_satisfying(&query).await?;

        let mut found = BTreeSet::new();
        let mut pending = Vec::new();
        for descriptor in fetched {
            let Some(dependencies) = unresolved.get(&descriptor.name) else {
                continue;
            };
            for dependency in dependencies {
                check_version(dependency, &descriptor.id)?;
            }
            debug!(application = %descriptor.id, "Dependency fetched from catalog");
            found.insert(descriptor.name.clone());
            pending.push(descriptor.name.clone());
            tree.descriptors.insert(descriptor.name.clone(), descriptor);
        }

        let mut missing = Violations::new("Application dependencies not found");
        for (name, dependencies) in &unresolved {
            if !found.contains(name) {
                for dependency in dependencies {
                    missing.add(dependency.name.clone(), dependency.version.clone());
                }
            }
        }
        missing.into_result()?;

        Ok(pending)
    }
}

fn check_version(dependency: &Dependency, selected: &ApplicationId) -> Result<(), EntitlementError> {
    if satisfies(selected.version(), &dependency.version)? {
        return Ok(());
    }
    Err(ValidationError::new("Application version does not satisfy dependency")
        .with_parameter("dependency", dependency.to_string())
        .with_parameter("application", selected.to_string())
        .into())
}
