// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::{Path, PathBuf};

use entitlement_core::domain::config::{EndpointConfig, OrchestratorConfigManifest};

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./entitlement-config.yaml)
        #[arg(short, long, default_value = "./entitlement-config.yaml")]
        output: PathBuf,

        /// Include examples and comments
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths),
        ConfigCommand::Validate { file } => validate(file.or(config_override)),
        ConfigCommand::Generate { output, examples } => generate(&output, examples),
    }
}

fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config =
        OrchestratorConfigManifest::load_or_default(config_override.clone()).context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. ENTITLEMENT_CONFIG_PATH: {}",
            std::env::var("ENTITLEMENT_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./entitlement-config.yaml");
        println!("  4. ~/.entitlement/config.yaml");
        println!("  5. /etc/entitlement/config.yaml");
        println!();
    }

    println!("{}", "Current configuration:".bold());
    println!("  Name: {}", config.metadata.name);
    println!();

    println!("{}", "Endpoints:".bold());
    print_endpoint("Catalog", &config.spec.catalog);
    print_endpoint("Tenant directory", &config.spec.tenant_directory);
    println!(
        "  Modules: connect {}, read {}",
        humanize(config.spec.modules.connect_timeout),
        humanize(config.spec.modules.read_timeout)
    );
    println!();

    println!("{}", "Event bus:".bold());
    println!("  Topic: {}", config.spec.event_bus.topic);
    println!("  Send timeout: {}", humanize(config.spec.event_bus.send_timeout));
    println!("  Capacity: {}", config.spec.event_bus.capacity);
    println!();

    println!("{}", "Flow:".bold());
    println!("  Default strategy: {}", config.spec.flow.default_strategy);
    println!("  Purge on revoke: {}", config.spec.flow.purge_on_revoke);
    println!();

    println!("{}", "Storage:".bold());
    match &config.spec.database {
        Some(database) => println!(
            "  PostgreSQL ({} connections, url {})",
            database.max_connections,
            "set".green()
        ),
        None => println!("  In memory {}", "(not persisted)".dimmed()),
    }
    println!();

    Ok(())
}

fn print_endpoint(label: &str, endpoint: &EndpointConfig) {
    println!(
        "  {}: {} (connect {}, read {})",
        label,
        endpoint.url,
        humanize(endpoint.connect_timeout),
        humanize(endpoint.read_timeout)
    );
}

fn humanize(duration: std::time::Duration) -> String {
    format!("{:?}", duration)
}

fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = OrchestratorConfigManifest::load_or_default(config_path).context("Failed to load configuration")?;

    config.validate().context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

fn sample(with_examples: bool) -> &'static str {
    if with_examples {
        include_str!("../../templates/entitlement-config-with-examples.yaml")
    } else {
        include_str!("../../templates/entitlement-config-minimal.yaml")
    }
}

fn generate(output: &Path, with_examples: bool) -> Result<()> {
    std::fs::write(output, sample(with_examples))
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!("{}", format!("✓ Configuration generated: {}", output.display()).green());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_templates_are_valid_manifests() {
        for with_examples in [false, true] {
            let manifest = OrchestratorConfigManifest::from_yaml_str(sample(with_examples)).unwrap();
            manifest.validate().unwrap();
        }

        let full = OrchestratorConfigManifest::from_yaml_str(sample(true)).unwrap();
        assert_eq!(full.spec.modules.read_timeout, Duration::from_secs(300));
        assert!(full.spec.database.is_none());
    }

    #[test]
    fn test_generate_then_validate() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("entitlement-config.yaml");

        generate(&output, false).unwrap();
        assert!(validate(Some(output)).is_ok());
    }

    #[test]
    fn test_validate_rejects_wrong_kind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("node.yaml");
        std::fs::write(&path, sample(false).replace("OrchestratorConfig", "NodeConfig")).unwrap();

        assert!(validate(Some(path)).is_err());
    }
}
