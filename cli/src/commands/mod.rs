// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the entitlement orchestrator CLI

pub mod apply;
pub mod config;
pub mod dependencies;
pub mod plan;
pub mod sequence;
pub mod update;

pub use self::apply::ApplyCommand;
pub use self::config::ConfigCommand;
pub use self::dependencies::DependenciesCommand;
pub use self::plan::PlanCommand;
pub use self::sequence::SequenceCommand;
pub use self::update::UpdateCommand;

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Deserialize;
use std::path::Path;

use entitlement_core::domain::application::ApplicationDescriptor;
use entitlement_core::domain::errors::{EntitlementError, ValidationError};
use entitlement_core::domain::version::ApplicationId;

/// A descriptor file holds one descriptor or a list of them, as YAML or JSON
#[derive(Deserialize)]
#[serde(untagged)]
enum DescriptorFile {
    Many(Vec<ApplicationDescriptor>),
    One(Box<ApplicationDescriptor>),
}

pub fn load_descriptors(path: &Path) -> Result<Vec<ApplicationDescriptor>> {
    let content = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let file: DescriptorFile = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse application descriptors in {}", path.display()))?;
    Ok(match file {
        DescriptorFile::Many(descriptors) => descriptors,
        DescriptorFile::One(descriptor) => vec![*descriptor],
    })
}

pub fn load_all_descriptors(paths: &[impl AsRef<Path>]) -> Result<Vec<ApplicationDescriptor>> {
    let mut descriptors = Vec::new();
    for path in paths {
        descriptors.extend(load_descriptors(path.as_ref())?);
    }
    Ok(descriptors)
}

/// Parse comma separated or repeated application ids
pub fn parse_application_ids(raw: &[String]) -> Result<Vec<ApplicationId>> {
    raw.iter()
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| ApplicationId::parse(value).with_context(|| format!("Invalid application id: {}", value)))
        .collect()
}

pub fn print_validation_error(err: &ValidationError) {
    eprintln!("{} {}", "✗".red(), err.message.red().bold());
    for parameter in &err.parameters {
        eprintln!("    {}: {}", parameter.key.bold(), parameter.value);
    }
}

/// Print an entitlement error with its details and turn it into an exit error
pub fn report_error(err: EntitlementError) -> anyhow::Error {
    match &err {
        EntitlementError::Validation(validation) => print_validation_error(validation),
        EntitlementError::Execution(report) => {
            eprintln!("{} {}", "✗".red(), report.summary().red());
            for stage in &report.stages {
                eprintln!("    {:<20} {}", stage.status.as_str(), stage.stage_name);
            }
        }
        other => eprintln!("{} {}", "✗".red(), other.to_string().red()),
    }
    anyhow::Error::new(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_single_descriptor_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let single = dir.path().join("users.yaml");
        std::fs::write(
            &single,
            "id: users-1.0.0\nname: users\nversion: 1.0.0\nmoduleDescriptors:\n  - id: mod-users-1.0.0\n",
        )
        .unwrap();

        let list = dir.path().join("all.json");
        let mut file = std::fs::File::create(&list).unwrap();
        write!(
            file,
            r#"[{{"id":"notes-2.0.0","name":"notes","version":"2.0.0","dependencies":[{{"name":"users","version":"^1.0.0"}}]}}]"#
        )
        .unwrap();

        let descriptors = load_all_descriptors(&[single, list]).unwrap();
        assert_eq!(descriptors.len(), 2);
        assert_eq!(descriptors[0].module_descriptors[0].id.as_str(), "mod-users-1.0.0");
        assert_eq!(descriptors[1].dependencies[0].name, "users");
    }

    #[test]
    fn test_invalid_descriptor_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.yaml");
        std::fs::write(&path, "id: not-a-valid-id\n").unwrap();
        assert!(load_descriptors(&path).is_err());
    }

    #[test]
    fn test_parse_application_ids() {
        let ids = parse_application_ids(&["users-1.0.0, notes-2.0.0".to_string(), "ui-1.1.0".to_string()]).unwrap();
        let ids: Vec<&str> = ids.iter().map(ApplicationId::as_str).collect();
        assert_eq!(ids, vec!["users-1.0.0", "notes-2.0.0", "ui-1.1.0"]);

        assert!(parse_application_ids(&["users".to_string()]).is_err());
    }
}
