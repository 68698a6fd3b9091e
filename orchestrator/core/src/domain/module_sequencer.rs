// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Module Installation Sequencer
//!
//! Turns the modules of one application into an ordered list of levels. All
//! modules of a level may be installed (or removed) in parallel; levels are
//! processed strictly in order.
//!
//! # Algorithm
//!
//! ```text
//! index modules 0..n, map provided (non-system) interface id -> providers
//! edge i -> j  when i requires an interface j provides (i != j)
//!
//! level 0   = modules without edges
//! repeat until every module is placed:
//!     level = unplaced modules whose dependencies are all placed
//!           + closed cycles (strongly connected groups of unplaced modules
//!             whose unplaced dependencies are the group itself)
//!     empty level -> SequencingError::NoProgress
//!
//! remove direction: reverse the level order
//! ```
//!
//! The graph is index based (`Vec<Vec<usize>>`); module descriptors are only
//! borrowed to read ids and interfaces.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;
use tracing::debug;

use crate::domain::application::{ApplicationDescriptor, ModuleDescriptor};
use crate::domain::version::ModuleId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Install,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SequencingError {
    #[error("Module installation order cannot be resolved, unplaced modules: {}", format_ids(.unplaced))]
    NoProgress { unplaced: Vec<ModuleId> },
}

fn format_ids(ids: &[ModuleId]) -> String {
    ids.iter().map(ModuleId::as_str).collect::<Vec<_>>().join(", ")
}

/// Ordered installation batches; each inner list is sorted by module id
pub type ModuleLevels = Vec<Vec<ModuleId>>;

pub struct ModuleInstallationSequencer;

impl ModuleInstallationSequencer {
    /// Sequence backend and UI modules of an application together
    pub fn sequence(
        descriptor: &ApplicationDescriptor,
        direction: Direction,
    ) -> Result<ModuleLevels, SequencingError> {
        let modules: Vec<&ModuleDescriptor> = descriptor.all_modules().collect();
        let levels = Self::sequence_modules(&modules, direction)?;
        debug!(
            application_id = %descriptor.id,
            ?direction,
            levels = levels.len(),
            "Sequenced module installation"
        );
        Ok(levels)
    }

    pub fn sequence_modules(
        modules: &[&ModuleDescriptor],
        direction: Direction,
    ) -> Result<ModuleLevels, SequencingError> {
        let graph = ModuleGraph::build(modules);
        let mut levels: ModuleLevels = graph
            .levels()?
            .into_iter()
            .map(|level| {
                let mut ids: Vec<ModuleId> = level.into_iter().map(|i| modules[i].id.clone()).collect();
                ids.sort();
                ids
            })
            .collect();

        if direction == Direction::Remove {
            levels.reverse();
        }
        Ok(levels)
    }
}

struct ModuleGraph<'a> {
    modules: &'a [&'a ModuleDescriptor],
    /// `dependencies[i]` = indices of modules providing something `i` requires
    dependencies: Vec<Vec<usize>>,
}

impl<'a> ModuleGraph<'a> {
    fn build(modules: &'a [&'a ModuleDescriptor]) -> Self {
        let mut interfaces_by_module: HashMap<&str, Vec<usize>> = HashMap::new();
        for (index, module) in modules.iter().enumerate() {
            for provided in module.provides.iter().filter(|p| !p.is_system()) {
                interfaces_by_module.entry(provided.id.as_str()).or_default().push(index);
            }
        }

        // Unknown interfaces produce no edge; they are validated upstream.
        let dependencies = modules
            .iter()
            .enumerate()
            .map(|(index, module)| {
                module
                    .requires
                    .iter()
                    .filter_map(|required| interfaces_by_module.get(required.id.as_str()))
                    .flatten()
                    .copied()
                    .filter(|&provider| provider != index)
                    .collect::<BTreeSet<usize>>()
                    .into_iter()
                    .collect()
            })
            .collect();

        Self { modules, dependencies }
    }

    fn len(&self) -> usize {
        self.modules.len()
    }

    fn levels(&self) -> Result<Vec<Vec<usize>>, SequencingError> {
        let mut placed = vec![false; self.len()];
        let mut remaining = self.len();
        let mut levels = Vec::new();

        let independent: Vec<usize> = (0..self.len())
            .filter(|&i| self.dependencies[i].is_empty())
            .collect();
        if !independent.is_empty() {
            for &i in &independent {
                placed[i] = true;
            }
            remaining -= independent.len();
            levels.push(independent);
        }

        while remaining > 0 {
            let mut level: BTreeSet<usize> = (0..self.len())
                .filter(|&i| !placed[i] && self.dependencies[i].iter().all(|&j| placed[j]))
                .collect();

            for cycle in self.closed_cycles(&placed) {
                debug!(
                    modules = %format_ids(&cycle.iter().map(|&i| self.modules[i].id.clone()).collect::<Vec<_>>()),
                    "Placing closed module cycle into a single level"
                );
                level.extend(cycle);
            }

            if level.is_empty() {
                let unplaced = (0..self.len())
                    .filter(|&i| !placed[i])
                    .map(|i| self.modules[i].id.clone())
                    .collect();
                return Err(SequencingError::NoProgress { unplaced });
            }

            for &i in &level {
                placed[i] = true;
            }
            remaining -= level.len();
            levels.push(level.into_iter().collect());
        }

        Ok(levels)
    }

    /// Indices reachable from `start` through unplaced modules. `start` is
    /// only included when it lies on a cycle.
    fn reachable_from(&self, start: usize, placed: &[bool]) -> BTreeSet<usize> {
        let mut visited = BTreeSet::new();
        let mut stack: Vec<usize> = vec![start];
        while let Some(current) = stack.pop() {
            for &next in &self.dependencies[current] {
                if !placed[next] && visited.insert(next) {
                    stack.push(next);
                }
            }
        }
        visited
    }

    /// Cycles among unplaced modules, overlapping ones unioned, keeping only
    /// those whose combined unplaced dependencies equal their membership.
    fn closed_cycles(&self, placed: &[bool]) -> Vec<BTreeSet<usize>> {
        let unplaced: Vec<usize> = (0..self.len()).filter(|&i| !placed[i]).collect();
        let reachable: HashMap<usize, BTreeSet<usize>> = unplaced
            .iter()
            .map(|&i| (i, self.reachable_from(i, placed)))
            .collect();

        let mut cycles: Vec<BTreeSet<usize>> = Vec::new();
        for &start in &unplaced {
            let from_start = &reachable[&start];
            if !from_start.contains(&start) {
                continue;
            }
            let cycle: BTreeSet<usize> = from_start
                .iter()
                .copied()
                .filter(|other| reachable[other].contains(&start))
                .collect();
            cycles.push(cycle);
        }

        merge_overlapping(cycles)
            .into_iter()
            .filter(|cycle| {
                let outgoing: BTreeSet<usize> = cycle
                    .iter()
                    .flat_map(|&member| self.dependencies[member].iter().copied())
                    .filter(|&dependency| !placed[dependency])
                    .collect();
                &outgoing == cycle
            })
            .collect()
    }
}

/// Pairwise union of overlapping sets until no two sets intersect
fn merge_overlapping(mut sets: Vec<BTreeSet<usize>>) -> Vec<BTreeSet<usize>> {
    loop {
        let mut merged = false;
        'search: for i in 0..sets.len() {
            for j in (i + 1)..sets.len() {
                if !sets[i].is_disjoint(&sets[j]) {
                    let other = sets.swap_remove(j);
                    sets[i].extend(other);
                    merged = true;
                    break 'search;
                }
            }
        }
        if !merged {
            return sets;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::application::{InterfaceDescriptor, InterfaceReference};
    use crate::domain::version::ApplicationId;

    fn module(id: &str, requires: &[&str], provides: &[&str]) -> ModuleDescriptor {
        ModuleDescriptor {
            id: ModuleId::parse(id).unwrap(),
            description: None,
            requires: requires.iter().map(|i| InterfaceReference::new(*i, "1.0")).collect(),
            provides: provides.iter().map(|i| InterfaceDescriptor::new(*i, "1.0")).collect(),
        }
    }

    fn application(modules: Vec<ModuleDescriptor>) -> ApplicationDescriptor {
        let mut descriptor = ApplicationDescriptor::new(ApplicationId::parse("app1-1.0.0").unwrap());
        descriptor.module_descriptors = modules;
        descriptor
    }

    fn ids(levels: &ModuleLevels) -> Vec<Vec<&str>> {
        levels
            .iter()
            .map(|level| level.iter().map(ModuleId::as_str).collect())
            .collect()
    }

    fn level_of(levels: &ModuleLevels, id: &str) -> usize {
        levels
            .iter()
            .position(|level| level.iter().any(|m| m.as_str() == id))
            .unwrap()
    }

    #[test]
    fn test_empty_application_has_no_levels() {
        let levels = ModuleInstallationSequencer::sequence(&application(vec![]), Direction::Install).unwrap();
        assert!(levels.is_empty());
    }

    #[test]
    fn test_modules_without_requirements_share_one_level() {
        let app = application(vec![
            module("m3-1.0.0", &[], &["m3-int"]),
            module("m1-1.0.0", &[], &["m1-int"]),
            module("m2-1.0.0", &[], &[]),
        ]);
        let levels = ModuleInstallationSequencer::sequence(&app, Direction::Install).unwrap();
        assert_eq!(ids(&levels), vec![vec!["m1-1.0.0", "m2-1.0.0", "m3-1.0.0"]]);
    }

    #[test]
    fn test_simple_dependency_order() {
        let app = application(vec![
            module("m2-1.0.0", &["m1-int"], &["m2-int"]),
            module("m1-1.0.0", &[], &["m1-int"]),
        ]);
        let levels = ModuleInstallationSequencer::sequence(&app, Direction::Install).unwrap();
        assert_eq!(ids(&levels), vec![vec!["m1-1.0.0"], vec!["m2-1.0.0"]]);
    }

    #[test]
    fn test_provider_is_always_on_an_earlier_level() {
        let app = application(vec![
            module("a-1.0.0", &["b-int", "c-int"], &["a-int"]),
            module("b-1.0.0", &["c-int"], &["b-int"]),
            module("c-1.0.0", &[], &["c-int"]),
            module("d-1.0.0", &["a-int"], &[]),
        ]);
        let levels = ModuleInstallationSequencer::sequence(&app, Direction::Install).unwrap();
        assert!(level_of(&levels, "c-1.0.0") < level_of(&levels, "b-1.0.0"));
        assert!(level_of(&levels, "b-1.0.0") < level_of(&levels, "a-1.0.0"));
        assert!(level_of(&levels, "a-1.0.0") < level_of(&levels, "d-1.0.0"));
    }

    #[test]
    fn test_closed_cycle_lands_in_one_level() {
        let app = application(vec![
            module("a-1.0.0", &["b-int"], &["a-int"]),
            module("b-1.0.0", &["a-int"], &["b-int"]),
        ]);
        let levels = ModuleInstallationSequencer::sequence(&app, Direction::Install).unwrap();
        assert_eq!(ids(&levels), vec![vec!["a-1.0.0", "b-1.0.0"]]);
    }

    #[test]
    fn test_cycle_waits_for_its_external_dependency() {
        let app = application(vec![
            module("a-1.0.0", &["b-int", "base-int"], &["a-int"]),
            module("b-1.0.0", &["a-int"], &["b-int"]),
            module("base-1.0.0", &[], &["base-int"]),
            module("ui-1.0.0", &["a-int"], &[]),
        ]);
        let levels = ModuleInstallationSequencer::sequence(&app, Direction::Install).unwrap();
        assert_eq!(
            ids(&levels),
            vec![vec!["base-1.0.0"], vec!["a-1.0.0", "b-1.0.0"], vec!["ui-1.0.0"]]
        );
    }

    #[test]
    fn test_overlapping_cycles_are_merged() {
        // a <-> b and b <-> c share b; all three must land together
        let app = application(vec![
            module("a-1.0.0", &["b-int"], &["a-int"]),
            module("b-1.0.0", &["a-int", "c-int"], &["b-int"]),
            module("c-1.0.0", &["b-int"], &["c-int"]),
        ]);
        let levels = ModuleInstallationSequencer::sequence(&app, Direction::Install).unwrap();
        assert_eq!(ids(&levels), vec![vec!["a-1.0.0", "b-1.0.0", "c-1.0.0"]]);
    }

    #[test]
    fn test_self_provided_interface_is_not_a_dependency() {
        let app = application(vec![module("m1-1.0.0", &["m1-int"], &["m1-int"])]);
        let levels = ModuleInstallationSequencer::sequence(&app, Direction::Install).unwrap();
        assert_eq!(ids(&levels), vec![vec!["m1-1.0.0"]]);
    }

    #[test]
    fn test_system_interfaces_and_unknown_requirements_produce_no_edges() {
        let mut provider = module("m1-1.0.0", &[], &[]);
        provider.provides.push(InterfaceDescriptor::system("_tenant", "2.0"));
        let consumer = module("m2-1.0.0", &["_tenant", "external-int"], &[]);

        let levels = ModuleInstallationSequencer::sequence(&application(vec![provider, consumer]), Direction::Install)
            .unwrap();
        assert_eq!(ids(&levels), vec![vec!["m1-1.0.0", "m2-1.0.0"]]);
    }

    #[test]
    fn test_ui_modules_are_sequenced_with_backend_modules() {
        let mut app = application(vec![module("mod-users-1.0.0", &[], &["users"])]);
        app.ui_module_descriptors = vec![module("ui-users-1.0.0", &["users"], &[])];
        let levels = ModuleInstallationSequencer::sequence(&app, Direction::Install).unwrap();
        assert_eq!(ids(&levels), vec![vec!["mod-users-1.0.0"], vec!["ui-users-1.0.0"]]);
    }

    #[test]
    fn test_remove_direction_reverses_install_order() {
        let app = application(vec![
            module("a-1.0.0", &["b-int"], &["a-int"]),
            module("b-1.0.0", &["c-int"], &["b-int"]),
            module("c-1.0.0", &[], &["c-int"]),
            module("d-1.0.0", &[], &[]),
        ]);
        let mut install = ModuleInstallationSequencer::sequence(&app, Direction::Install).unwrap();
        let remove = ModuleInstallationSequencer::sequence(&app, Direction::Remove).unwrap();
        install.reverse();
        assert_eq!(install, remove);
        assert_eq!(ids(&remove).last().unwrap(), &vec!["c-1.0.0", "d-1.0.0"]);
    }

    #[test]
    fn test_merge_overlapping_sets() {
        let sets = vec![
            BTreeSet::from([1, 2]),
            BTreeSet::from([5, 6]),
            BTreeSet::from([2, 3]),
            BTreeSet::from([3, 4]),
        ];
        let mut merged = merge_overlapping(sets);
        merged.sort();
        assert_eq!(merged, vec![BTreeSet::from([1, 2, 3, 4]), BTreeSet::from([5, 6])]);
    }
}
