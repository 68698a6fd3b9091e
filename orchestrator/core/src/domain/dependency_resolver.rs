// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Application Dependency Resolver
//!
//! Transitive dependency closure over an in-memory set of application
//! descriptors. Resolution is a stack-based DFS: an application already on the
//! stack means a circular dependency, reported with the whole chain
//! (`a <- b <- c <- a`). Results are memoized by application name.

use std::collections::{BTreeSet, HashMap};
use tracing::debug;

use crate::domain::application::ApplicationDescriptor;
use crate::domain::errors::ValidationError;
use crate::domain::version::ApplicationId;

pub struct ApplicationDependencyResolver<'a> {
    descriptors: HashMap<&'a str, &'a ApplicationDescriptor>,
    cache: HashMap<String, BTreeSet<ApplicationId>>,
}

impl<'a> ApplicationDependencyResolver<'a> {
    pub fn new(descriptors: impl IntoIterator<Item = &'a ApplicationDescriptor>) -> Self {
        Self {
            descriptors: descriptors
                .into_iter()
                .map(|descriptor| (descriptor.name.as_str(), descriptor))
                .collect(),
            cache: HashMap::new(),
        }
    }

    pub fn descriptor(&self, id: &ApplicationId) -> Option<&'a ApplicationDescriptor> {
        self.descriptors
            .get(id.name())
            .copied()
            .filter(|descriptor| &descriptor.id == id)
    }

    /// All applications `application` depends on, directly or transitively
    pub fn resolve_all(
        &mut self,
        application: &ApplicationDescriptor,
    ) -> Result<BTreeSet<ApplicationId>, ValidationError> {
        self.resolve(application, &mut Vec::new())
    }

    pub fn resolve(
        &mut self,
        application: &ApplicationDescriptor,
        visited: &mut Vec<String>,
    ) -> Result<BTreeSet<ApplicationId>, ValidationError> {
        if visited.iter().any(|name| name == &application.name) {
            let chain = visited
                .iter()
                .map(String::as_str)
                .chain(std::iter::once(application.name.as_str()))
                .collect::<Vec<_>>()
                .join(" <- ");
            return Err(ValidationError::new("Circular application dependency detected")
                .with_parameter("cause", chain));
        }

        if application.dependencies.is_empty() {
            return Ok(BTreeSet::new());
        }

        if let Some(cached) = self.cache.get(&application.name) {
            return Ok(cached.clone());
        }

        visited.push(application.name.clone());
        let mut resolved = BTreeSet::new();
        for dependency in &application.dependencies {
            let Some(descriptor) = self.descriptors.get(dependency.name.as_str()).copied() else {
                debug!(
                    application = %application.id,
                    dependency = %dependency,
                    "Dependency descriptor not loaded, skipping"
                );
                continue;
            };
            resolved.insert(descriptor.id.clone());
            resolved.extend(self.resolve(descriptor, visited)?);
        }
        visited.pop();

        self.cache.insert(application.name.clone(), resolved.clone());
        Ok(resolved)
    }

    /// Level `applications` so that each one comes after every application of
    /// the same set it transitively depends on. Levels are sorted by id.
    pub fn sequence(
        &mut self,
        applications: &[&ApplicationDescriptor],
    ) -> Result<Vec<Vec<ApplicationId>>, ValidationError> {
        let members: BTreeSet<&ApplicationId> = applications.iter().map(|a| &a.id).collect();
        let mut depth: HashMap<ApplicationId, usize> = HashMap::new();

        for application in applications {
            let dependencies = self.resolve_all(application)?;
            let in_set = dependencies.iter().filter(|id| members.contains(id)).count();
            depth.insert(application.id.clone(), in_set);
        }

        // Depth by number of in-set transitive dependencies is a valid layering:
        // a dependency has strictly fewer of them than its dependent.
        let mut by_depth: Vec<(usize, ApplicationId)> = depth.into_iter().map(|(id, d)| (d, id)).collect();
        by_depth.sort();

        let mut levels: Vec<Vec<ApplicationId>> = Vec::new();
        let mut current_depth = None;
        for (d, id) in by_depth {
            if current_depth != Some(d) {
                levels.push(Vec::new());
                current_depth = Some(d);
            }
            if let Some(level) = levels.last_mut() {
                level.push(id);
            }
        }
        Ok(levels)
    }
}
