// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `entctl plan` - offline state transition planning

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use entitlement_core::domain::entitlement::{Entitlement, TenantId};
use entitlement_core::domain::errors::ValidationError;
use entitlement_core::domain::transition::{
    ApplicationStateTransitionPlan, StateTransitionPlanner, StateTransitionValidator, TransitionType,
};
use entitlement_core::domain::version::ApplicationId;

use super::{parse_application_ids, print_validation_error};

#[derive(Args)]
pub struct PlanCommand {
    /// Applications the tenant should have (repeatable or comma separated)
    #[arg(short, long = "requested", value_name = "ID")]
    requested: Vec<String>,

    /// Applications the tenant has today (repeatable or comma separated)
    #[arg(short, long = "entitled", value_name = "ID")]
    entitled: Vec<String>,

    /// Print the plan as JSON
    #[arg(long)]
    json: bool,
}

pub fn execute(cmd: PlanCommand) -> Result<()> {
    let requested = parse_application_ids(&cmd.requested)?;
    let entitled = parse_application_ids(&cmd.entitled)?;

    let plan = build_plan(&requested, &entitled).map_err(|err| {
        print_validation_error(&err);
        anyhow::Error::new(err)
    })?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        print_plan(&plan);
    }
    Ok(())
}

fn build_plan(
    requested: &[ApplicationId],
    entitled: &[ApplicationId],
) -> Result<ApplicationStateTransitionPlan, ValidationError> {
    let plan = StateTransitionPlanner::plan(requested, entitled)?;

    // The validator only looks at application ids, the tenant is a placeholder
    let tenant_id = TenantId::default();
    let current: Vec<Entitlement> = entitled
        .iter()
        .map(|id| Entitlement::new(tenant_id, id.clone()))
        .collect();
    StateTransitionValidator::validate(&plan, &current)?;
    Ok(plan)
}

pub fn print_plan(plan: &ApplicationStateTransitionPlan) {
    if plan.is_empty() {
        println!("{}", "✓ Nothing to do, the tenant is in the desired state.".green());
        return;
    }

    for bucket in plan.buckets() {
        if bucket.is_empty() {
            continue;
        }
        let title = match bucket.transition_type {
            TransitionType::Entitle => bucket.transition_type.as_str().green(),
            TransitionType::Upgrade => bucket.transition_type.as_str().cyan(),
            TransitionType::Revoke => bucket.transition_type.as_str().yellow(),
        };
        println!("{}", title.bold());
        for id in &bucket.application_ids {
            match plan.upgraded_from(id).filter(|_| bucket.transition_type == TransitionType::Upgrade) {
                Some(previous) => println!("  {} → {}", previous, id),
                None => println!("  {}", id),
            }
        }
    }
}
