// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Application Descriptor Domain Model
//!
//! Declarative manifests loaded from the application catalog. Descriptors are
//! loaded once per request and never mutated afterwards.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Identity, dependencies and interface contracts of applications and modules

use serde::{Deserialize, Serialize};

use crate::domain::version::{ApplicationId, ModuleId};

/// A versioned interface a module requires from another module
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InterfaceReference {
    pub id: String,

    /// Single version or space-separated alternatives (`"1.0 2.0"`)
    pub version: String,
}

impl InterfaceReference {
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
        }
    }
}

/// A versioned interface a module provides
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceDescriptor {
    pub id: String,
    pub version: String,

    /// `system` interfaces never produce dependency edges
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interface_type: Option<String>,
}

impl InterfaceDescriptor {
    pub fn new(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            interface_type: None,
        }
    }

    pub fn system(id: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            interface_type: Some("system".to_string()),
            ..Self::new(id, version)
        }
    }

    pub fn is_system(&self) -> bool {
        self.interface_type
            .as_deref()
            .is_some_and(|kind| kind.eq_ignore_ascii_case("system"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleDescriptor {
    pub id: ModuleId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub requires: Vec<InterfaceReference>,

    #[serde(default)]
    pub provides: Vec<InterfaceDescriptor>,
}

impl ModuleDescriptor {
    pub fn new(id: ModuleId) -> Self {
        Self {
            id,
            description: None,
            requires: Vec::new(),
            provides: Vec::new(),
        }
    }
}

/// Constraint on another application: a name and a version range, not a concrete id
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    pub version: String,
}

impl Dependency {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl std::fmt::Display for Dependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.version)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationDescriptor {
    pub id: ApplicationId,
    pub name: String,
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub dependencies: Vec<Dependency>,

    #[serde(default)]
    pub module_descriptors: Vec<ModuleDescriptor>,

    #[serde(default)]
    pub ui_module_descriptors: Vec<ModuleDescriptor>,
}

impl ApplicationDescriptor {
    /// Create an empty descriptor whose name and version come from the id
    pub fn new(id: ApplicationId) -> Self {
        Self {
            name: id.name().to_string(),
            version: id.version().to_string(),
            id,
            description: None,
            dependencies: Vec::new(),
            module_descriptors: Vec::new(),
            ui_module_descriptors: Vec::new(),
        }
    }

    /// Backend and UI modules, backend first
    pub fn all_modules(&self) -> impl Iterator<Item = &ModuleDescriptor> {
        self.module_descriptors
            .iter()
            .chain(self.ui_module_descriptors.iter())
    }

    pub fn find_module(&self, id: &ModuleId) -> Option<&ModuleDescriptor> {
        self.all_modules().find(|module| &module.id == id)
    }

    /// Find a module by name regardless of version
    pub fn find_module_by_name(&self, name: &str) -> Option<&ModuleDescriptor> {
        self.all_modules().find(|module| module.id.name() == name)
    }
}
