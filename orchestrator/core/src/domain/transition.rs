// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! State Transition Planning
//!
//! Diffs a tenant's entitled applications against the requested set. Both
//! sides are reduced to `name -> id` maps, so every application name falls
//! into at most one of the three buckets:
//!
//! | Bucket | Condition |
//! |--------|-----------|
//! | entitle | requested, not entitled |
//! | upgrade | on both sides with a different id |
//! | revoke | entitled, not requested |

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::cmp::Ordering;

use crate::domain::entitlement::Entitlement;
use crate::domain::errors::{ValidationError, Violations};
use crate::domain::version::{compare_versions, ApplicationId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransitionType {
    Entitle,
    Upgrade,
    Revoke,
}

impl TransitionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionType::Entitle => "ENTITLE",
            TransitionType::Upgrade => "UPGRADE",
            TransitionType::Revoke => "REVOKE",
        }
    }
}

impl std::fmt::Display for TransitionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationStateTransitionBucket {
    pub transition_type: TransitionType,
    pub application_ids: BTreeSet<ApplicationId>,
}

impl ApplicationStateTransitionBucket {
    fn new(transition_type: TransitionType) -> Self {
        Self {
            transition_type,
            application_ids: BTreeSet::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.application_ids.is_empty()
    }
}

/// Exactly three buckets, pairwise disjoint by application name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationStateTransitionPlan {
    entitle: ApplicationStateTransitionBucket,
    upgrade: ApplicationStateTransitionBucket,
    revoke: ApplicationStateTransitionBucket,

    /// Entitled id each upgrade replaces, keyed by application name
    upgraded_from: BTreeMap<String, ApplicationId>,
}

impl ApplicationStateTransitionPlan {
    pub fn entitle(&self) -> &ApplicationStateTransitionBucket {
        &self.entitle
    }

    pub fn upgrade(&self) -> &ApplicationStateTransitionBucket {
        &self.upgrade
    }

    pub fn revoke(&self) -> &ApplicationStateTransitionBucket {
        &self.revoke
    }

    pub fn buckets(&self) -> [&ApplicationStateTransitionBucket; 3] {
        [&self.entitle, &self.upgrade, &self.revoke]
    }

    pub fn bucket(&self, transition_type: TransitionType) -> &ApplicationStateTransitionBucket {
        match transition_type {
            TransitionType::Entitle => &self.entitle,
            TransitionType::Upgrade => &self.upgrade,
            TransitionType::Revoke => &self.revoke,
        }
    }

    /// Currently entitled id replaced by an upgrade target
    pub fn upgraded_from(&self, target: &ApplicationId) -> Option<&ApplicationId> {
        self.upgraded_from.get(target.name())
    }

    pub fn is_empty(&self) -> bool {
        self.buckets().iter().all(|bucket| bucket.is_empty())
    }
}

pub struct StateTransitionPlanner;

impl StateTransitionPlanner {
    pub fn plan(
        requested: &[ApplicationId],
        entitled: &[ApplicationId],
    ) -> Result<ApplicationStateTransitionPlan, ValidationError> {
        let mut violations = Violations::new("Application names must be unique");
        let requested = by_name(requested, "requested", &mut violations);
        let entitled = by_name(entitled, "entitled", &mut violations);
        violations.into_result()?;

        let mut plan = ApplicationStateTransitionPlan {
            entitle: ApplicationStateTransitionBucket::new(TransitionType::Entitle),
            upgrade: ApplicationStateTransitionBucket::new(TransitionType::Upgrade),
            revoke: ApplicationStateTransitionBucket::new(TransitionType::Revoke),
            upgraded_from: BTreeMap::new(),
        };

        for (name, id) in &requested {
            match entitled.get(name) {
                None => {
                    plan.entitle.application_ids.insert((*id).clone());
                }
                Some(current) if current != id => {
                    plan.upgrade.application_ids.insert((*id).clone());
                    plan.upgraded_from.insert(name.to_string(), (*current).clone());
                }
                Some(_) => {}
            }
        }

        for (name, id) in &entitled {
            if !requested.contains_key(name) {
                plan.revoke.application_ids.insert((*id).clone());
            }
        }

        Ok(plan)
    }
}

fn by_name<'a>(
    ids: &'a [ApplicationId],
    side: &str,
    violations: &mut Violations,
) -> BTreeMap<&'a str, &'a ApplicationId> {
    let mut map = BTreeMap::new();
    for id in ids {
        if let Some(existing) = map.insert(id.name(), id) {
            if existing != id {
                violations.add(side, format!("{} conflicts with {}", id, existing));
            }
        }
    }
    map
}

/// Checks a plan against the tenant's stored entitlements, accumulating
/// every violation across all buckets.
pub struct StateTransitionValidator;

impl StateTransitionValidator {
    pub fn validate(
        plan: &ApplicationStateTransitionPlan,
        current: &[Entitlement],
    ) -> Result<(), ValidationError> {
        let entitled: BTreeMap<&str, &ApplicationId> = current
            .iter()
            .map(|entitlement| (entitlement.application_name(), &entitlement.application_id))
            .collect();
        let mut violations = Violations::new("Invalid application state transition");

        for id in &plan.entitle.application_ids {
            if let Some(existing) = entitled.get(id.name()) {
                violations.add(id.to_string(), format!("already entitled as {}", existing));
            }
        }

        for id in &plan.upgrade.application_ids {
            let Some(previous) = plan.upgraded_from(id) else {
                violations.add(id.to_string(), "upgrade source is unknown");
                continue;
            };
            if entitled.get(id.name()) != Some(&previous) {
                violations.add(id.to_string(), format!("{} is not entitled", previous));
                continue;
            }
            match compare_versions(id.version(), previous.version()) {
                Ok(Ordering::Greater) => {}
                Ok(_) => violations.add(
                    id.to_string(),
                    format!("upgrade must target a newer version than {}", previous),
                ),
                Err(err) => violations.add(id.to_string(), err.to_string()),
            }
        }

        for id in &plan.revoke.application_ids {
            if entitled.get(id.name()) != Some(&id) {
                violations.add(id.to_string(), "application is not entitled");
            }
        }

        violations.into_result()
    }
}
