// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `entctl dependencies` - interface validation and application levelling
//! over a set of descriptor files, without talking to the catalog.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;

use entitlement_core::domain::application::ApplicationDescriptor;
use entitlement_core::domain::dependency_resolver::ApplicationDependencyResolver;
use entitlement_core::domain::errors::ValidationError;
use entitlement_core::domain::interface_integrity::InterfaceIntegrityValidator;
use entitlement_core::domain::version::ApplicationId;

use super::{load_all_descriptors, print_validation_error};

#[derive(Args)]
pub struct DependenciesCommand {
    /// Application descriptor files (YAML or JSON)
    #[arg(value_name = "FILE", required = true)]
    files: Vec<PathBuf>,

    /// Print the levels in revoke order (dependents first)
    #[arg(long)]
    revoke: bool,

    /// Skip the interface compatibility check
    #[arg(long)]
    skip_interfaces: bool,
}

pub fn execute(cmd: DependenciesCommand) -> Result<()> {
    let descriptors = load_all_descriptors(&cmd.files)?;

    let levels = analyze(&descriptors, !cmd.skip_interfaces, cmd.revoke).map_err(|err| {
        print_validation_error(&err);
        anyhow::Error::new(err)
    })?;

    if !cmd.skip_interfaces {
        println!("{}", "✓ All required interfaces are provided".green());
    }
    println!("{}", "Application levels:".bold());
    for (index, level) in levels.iter().enumerate() {
        let ids = level.iter().map(ApplicationId::as_str).collect::<Vec<_>>().join(", ");
        println!("  {} {}", format!("[{}]", index + 1).dimmed(), ids);
    }
    Ok(())
}

fn analyze(
    descriptors: &[ApplicationDescriptor],
    check_interfaces: bool,
    revoke: bool,
) -> Result<Vec<Vec<ApplicationId>>, ValidationError> {
    let all: Vec<&ApplicationDescriptor> = descriptors.iter().collect();
    if check_interfaces {
        InterfaceIntegrityValidator::validate(&all, &all)?;
    }

    let mut resolver = ApplicationDependencyResolver::new(all.iter().copied());
    let mut levels = resolver.sequence(&all)?;
    if revoke {
        levels.reverse();
    }
    Ok(levels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use entitlement_core::domain::application::{Dependency, InterfaceDescriptor, InterfaceReference, ModuleDescriptor};
    use entitlement_core::domain::version::ModuleId;

    fn descriptor(id: &str, dependencies: &[(&str, &str)], provides: &[&str], requires: &[&str]) -> ApplicationDescriptor {
        let id = ApplicationId::parse(id).unwrap();
        let mut module = ModuleDescriptor::new(ModuleId::parse(format!("mod-{}", id.as_str())).unwrap());
        module.provides = provides.iter().map(|i| InterfaceDescriptor::new(*i, "1.0")).collect();
        module.requires = requires.iter().map(|i| InterfaceReference::new(*i, "1.0")).collect();

        let mut descriptor = ApplicationDescriptor::new(id);
        descriptor.dependencies = dependencies.iter().map(|(n, v)| Dependency::new(*n, *v)).collect();
        descriptor.module_descriptors = vec![module];
        descriptor
    }

    #[test]
    fn test_levels_follow_dependencies() {
        let descriptors = vec![
            descriptor("notes-1.0.0", &[("users", "^1.0.0")], &["notes"], &["users"]),
            descriptor("users-1.0.0", &[], &["users"], &[]),
        ];

        let levels = analyze(&descriptors, true, false).unwrap();
        assert_eq!(levels[0][0].as_str(), "users-1.0.0");
        assert_eq!(levels[1][0].as_str(), "notes-1.0.0");

        let reversed = analyze(&descriptors, true, true).unwrap();
        assert_eq!(reversed[0][0].as_str(), "notes-1.0.0");
    }

    #[test]
    fn test_missing_interface_is_reported() {
        let descriptors = vec![descriptor("notes-1.0.0", &[], &["notes"], &["users"])];

        let err = analyze(&descriptors, true, false).unwrap_err();
        assert_eq!(err.message, "Missing interfaces found for the applications");
        assert!(analyze(&descriptors, false, false).is_ok());
    }
}
