// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Interface compatibility validation across applications.
//!
//! Every interface a module requires must be provided, in a compatible
//! version, by a module of the same application or of an application it
//! transitively depends on. Unresolved interfaces are accumulated; a circular
//! application dependency fails immediately.

use std::collections::HashMap;

use crate::domain::application::{ApplicationDescriptor, InterfaceDescriptor};
use crate::domain::dependency_resolver::ApplicationDependencyResolver;
use crate::domain::errors::{ValidationError, Violations};
use crate::domain::version::is_interface_compatible;

pub struct InterfaceIntegrityValidator;

impl InterfaceIntegrityValidator {
    /// Validate `targets` using `available` (targets included) as the universe
    /// of descriptors dependencies may resolve to.
    pub fn validate(
        targets: &[&ApplicationDescriptor],
        available: &[&ApplicationDescriptor],
    ) -> Result<(), ValidationError> {
        let mut resolver = ApplicationDependencyResolver::new(available.iter().copied());
        let mut violations = Violations::new("Missing interfaces found for the applications");

        for application in targets {
            let dependency_ids = resolver.resolve_all(application)?;
            let providers: Vec<&ApplicationDescriptor> = std::iter::once(*application)
                .chain(dependency_ids.iter().filter_map(|id| resolver.descriptor(id)))
                .collect();
            let provided = provided_interfaces(&providers);

            for module in application.all_modules() {
                for required in &module.requires {
                    let satisfied = provided.get(required.id.as_str()).is_some_and(|candidates| {
                        candidates
                            .iter()
                            .any(|candidate| is_interface_compatible(&candidate.version, &required.version))
                    });
                    if !satisfied {
                        violations.add(
                            application.id.to_string(),
                            format!("{} {} (required by {})", required.id, required.version, module.id),
                        );
                    }
                }
            }
        }

        violations.into_result()
    }
}

fn provided_interfaces<'a>(applications: &[&'a ApplicationDescriptor]) -> HashMap<&'a str, Vec<&'a InterfaceDescriptor>> {
    let mut provided: HashMap<&'a str, Vec<&'a InterfaceDescriptor>> = HashMap::new();
    for application in applications {
        for module in application.all_modules() {
            for interface in module.provides.iter().filter(|i| !i.is_system()) {
                provided.entry(interface.id.as_str()).or_default().push(interface);
            }
        }
    }
    provided
}
