// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Entitlement Orchestrator CLI
//!
//! The `entctl` binary moves tenants between application entitlement states.
//!
//! ## Commands
//!
//! - `entctl apply` - Move a tenant to a desired set of applications
//! - `entctl plan` - Show the entitle / upgrade / revoke buckets of a change
//! - `entctl sequence` - Show the module installation order of an application
//! - `entctl dependencies` - Validate and level a set of application descriptors
//! - `entctl config show|validate|generate` - Configuration management
//! - `entctl update` - Apply database migrations

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use entitlement_core::domain::config::{LoggingConfig, OrchestratorConfigManifest};
use entitlement_orchestrator::commands::{
    self, ApplyCommand, ConfigCommand, DependenciesCommand, PlanCommand, SequenceCommand, UpdateCommand,
};

/// Tenant entitlement orchestrator
#[derive(Parser)]
#[command(name = "entctl")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "ENTITLEMENT_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); defaults to spec.logging.level
    #[arg(long, global = true, env = "ENTITLEMENT_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Move a tenant to a desired set of applications
    #[command(name = "apply")]
    Apply {
        #[command(flatten)]
        command: ApplyCommand,
    },

    /// Plan a state transition without executing it
    #[command(name = "plan")]
    Plan {
        #[command(flatten)]
        command: PlanCommand,
    },

    /// Module installation order of an application descriptor
    #[command(name = "sequence")]
    Sequence {
        #[command(flatten)]
        command: SequenceCommand,
    },

    /// Validate interfaces and level application descriptors by dependency
    #[command(name = "dependencies")]
    Dependencies {
        #[command(flatten)]
        command: DependenciesCommand,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Update the entitlement database
    #[command(name = "update")]
    Update {
        #[command(flatten)]
        command: UpdateCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // A broken config file is reported by the command that loads it
    let logging = OrchestratorConfigManifest::load_or_default(cli.config.clone())
        .map(|config| config.spec.logging)
        .unwrap_or_default();
    init_logging(cli.log_level.as_deref().unwrap_or(&logging.level), &logging)?;

    match cli.command {
        Some(Commands::Apply { command }) => commands::apply::execute(command, cli.config).await,
        Some(Commands::Plan { command }) => commands::plan::execute(command),
        Some(Commands::Sequence { command }) => commands::sequence::execute(command),
        Some(Commands::Dependencies { command }) => commands::dependencies::execute(command),
        Some(Commands::Config { command }) => commands::config::handle_command(command, cli.config).await,
        Some(Commands::Update { command }) => commands::update::execute(command, cli.config).await,
        None => {
            // No command provided - show help
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str, logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.compact().init();
    }

    Ok(())
}
