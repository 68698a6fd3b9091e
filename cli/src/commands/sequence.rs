// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `entctl sequence` - module installation order of application descriptors

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

use entitlement_core::domain::application::ApplicationDescriptor;
use entitlement_core::domain::module_sequencer::{Direction, ModuleInstallationSequencer, ModuleLevels};
use entitlement_core::domain::version::ApplicationId;

use super::load_descriptors;

#[derive(Clone, Copy, ValueEnum)]
enum DirectionArg {
    Install,
    Remove,
}

impl From<DirectionArg> for Direction {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Install => Direction::Install,
            DirectionArg::Remove => Direction::Remove,
        }
    }
}

#[derive(Args)]
pub struct SequenceCommand {
    /// Application descriptor file (YAML or JSON, one descriptor or a list)
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// Only sequence this application
    #[arg(short, long, value_name = "ID")]
    application: Option<String>,

    #[arg(short, long, value_enum, default_value = "install")]
    direction: DirectionArg,

    /// Print the levels as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct SequencedApplication {
    application_id: ApplicationId,
    levels: ModuleLevels,
}

pub fn execute(cmd: SequenceCommand) -> Result<()> {
    let descriptors = load_descriptors(&cmd.file)?;
    let selected = select(&descriptors, cmd.application.as_deref())?;
    let direction = Direction::from(cmd.direction);

    let mut sequenced = Vec::new();
    for descriptor in selected {
        let levels = ModuleInstallationSequencer::sequence(descriptor, direction)
            .with_context(|| format!("Failed to sequence modules of {}", descriptor.id))?;
        sequenced.push(SequencedApplication {
            application_id: descriptor.id.clone(),
            levels,
        });
    }

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&sequenced)?);
        return Ok(());
    }

    for application in &sequenced {
        println!("{}", application.application_id.to_string().bold());
        for (index, level) in application.levels.iter().enumerate() {
            let modules = level.iter().map(|m| m.as_str()).collect::<Vec<_>>().join(", ");
            println!("  {} {}", format!("[{}]", index + 1).dimmed(), modules);
        }
    }
    Ok(())
}

fn select<'a>(descriptors: &'a [ApplicationDescriptor], application: Option<&str>) -> Result<Vec<&'a ApplicationDescriptor>> {
    let Some(id) = application else {
        return Ok(descriptors.iter().collect());
    };
    let descriptor = descriptors
        .iter()
        .find(|d| d.id.as_str() == id)
        .with_context(|| format!("Application {} is not in the descriptor file", id))?;
    Ok(vec![descriptor])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_by_id() {
        let descriptors = vec![
            ApplicationDescriptor::new(ApplicationId::parse("users-1.0.0").unwrap()),
            ApplicationDescriptor::new(ApplicationId::parse("notes-1.0.0").unwrap()),
        ];

        assert_eq!(select(&descriptors, None).unwrap().len(), 2);
        let selected = select(&descriptors, Some("notes-1.0.0")).unwrap();
        assert_eq!(selected[0].name, "notes");
        assert!(select(&descriptors, Some("notes-2.0.0")).is_err());
    }
}
