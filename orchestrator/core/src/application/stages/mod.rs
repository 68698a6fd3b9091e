// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Concrete stages.
//!
//! | Stage | Context | Compensable |
//! |-------|---------|-------------|
//! | `ModuleInstaller` | `ModuleContext` | no |
//! | `ModuleUninstaller` | `ModuleContext` | no |
//! | `EntitlementCreator` | `ApplicationContext` | yes |
//! | `EntitlementUpgrader` | `ApplicationContext` | yes |
//! | `EntitlementRemover` | `ApplicationContext` | yes |
//! | `ChangeNotifier` | `ApplicationContext` | yes |
//! | `ApplicationFlowStatusStage` | `ApplicationContext` | when built with a cancel status |

pub mod entitlement;
pub mod module;
pub mod notification;
pub mod status;

pub use entitlement::{EntitlementCreator, EntitlementRemover, EntitlementUpgrader};
pub use module::{ModuleInstaller, ModuleUninstaller};
pub use notification::ChangeNotifier;
pub use status::{ApplicationFlowStatusStage, StatusCallback};

#[cfg(test)]
pub(crate) mod fixtures;
