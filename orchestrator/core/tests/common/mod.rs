// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Hand-written collaborator fakes shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;

use entitlement_core::domain::application::{
    ApplicationDescriptor, Dependency, InterfaceDescriptor, InterfaceReference, ModuleDescriptor,
};
use entitlement_core::domain::catalog::{
    ApplicationCatalog, ModuleDiscovery, ModuleTenantApi, ModuleTenantOperation, TenantDirectory,
};
use entitlement_core::domain::entitlement::{Tenant, TenantId};
use entitlement_core::domain::errors::IntegrationError;
use entitlement_core::domain::version::{compare_versions, satisfies, ApplicationId, ModuleId};

/// Application descriptor with one module per `(module, requires, provides)` entry
pub fn application(
    id: &str,
    dependencies: &[(&str, &str)],
    modules: &[(&str, &[&str], &[&str])],
) -> ApplicationDescriptor {
    let mut descriptor = ApplicationDescriptor::new(ApplicationId::parse(id).unwrap());
    descriptor.dependencies = dependencies
        .iter()
        .map(|(name, range)| Dependency::new(*name, *range))
        .collect();
    descriptor.module_descriptors = modules
        .iter()
        .map(|(module, requires, provides)| {
            let mut descriptor = ModuleDescriptor::new(ModuleId::parse(*module).unwrap());
            descriptor.requires = requires.iter().map(|i| InterfaceReference::new(*i, "1.0")).collect();
            descriptor.provides = provides.iter().map(|i| InterfaceDescriptor::new(*i, "1.0")).collect();
            descriptor
        })
        .collect();
    descriptor
}

#[derive(Default)]
pub struct FakeCatalog {
    descriptors: Mutex<Vec<ApplicationDescriptor>>,
    /// Module ids without a discovery entry
    undiscoverable: Mutex<HashSet<String>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeCatalog {
    pub fn with(descriptors: Vec<ApplicationDescriptor>) -> Self {
        let catalog = Self::default();
        *catalog.descriptors.lock() = descriptors;
        catalog
    }

    pub fn hide_module(&self, module: &str) {
        self.undiscoverable.lock().insert(module.to_string());
    }
}

#[async_trait]
impl ApplicationCatalog for FakeCatalog {
    async fn get_application_descriptors(
        &self,
        ids: &[ApplicationId],
    ) -> Result<Vec<ApplicationDescriptor>, IntegrationError> {
        self.calls.lock().push(format!(
            "get {}",
            ids.iter().map(ApplicationId::as_str).collect::<Vec<_>>().join(",")
        ));
        Ok(self
            .descriptors
            .lock()
            .iter()
            .filter(|d| ids.contains(&d.id))
            .cloned()
            .collect())
    }

    async fn find_latest_satisfying(
        &self,
        dependencies: &[Dependency],
    ) -> Result<Vec<ApplicationDescriptor>, IntegrationError> {
        self.calls.lock().push(format!(
            "latest {}",
            dependencies.iter().map(|d| d.name.as_str()).collect::<Vec<_>>().join(",")
        ));
        let descriptors = self.descriptors.lock();
        let mut found = Vec::new();
        for dependency in dependencies {
            let latest = descriptors
                .iter()
                .filter(|d| d.name == dependency.name && satisfies(&d.version, &dependency.version).unwrap_or(false))
                .max_by(|a, b| compare_versions(&a.version, &b.version).unwrap_or(std::cmp::Ordering::Equal));
            if let Some(descriptor) = latest {
                found.push(descriptor.clone());
            }
        }
        Ok(found)
    }

    async fn get_module_discovery(&self, application_id: &ApplicationId) -> Result<ModuleDiscovery, IntegrationError> {
        let descriptors = self.descriptors.lock();
        let hidden = self.undiscoverable.lock();
        let descriptor = descriptors
            .iter()
            .find(|d| &d.id == application_id)
            .ok_or_else(|| IntegrationError::new(format!("Unknown application {}", application_id)))?;
        Ok(descriptor
            .all_modules()
            .filter(|m| !hidden.contains(m.id.as_str()))
            .map(|m| (m.id.clone(), format!("http://{}:8081", m.id.name())))
            .collect())
    }
}

pub struct FakeTenantDirectory {
    pub tenant: Tenant,
}

impl FakeTenantDirectory {
    pub fn new(name: &str) -> Self {
        Self {
            tenant: Tenant {
                id: TenantId::new(),
                name: name.to_string(),
                description: None,
            },
        }
    }
}

#[async_trait]
impl TenantDirectory for FakeTenantDirectory {
    async fn find_tenant(&self, tenant_id: TenantId) -> Result<Tenant, IntegrationError> {
        if tenant_id == self.tenant.id {
            Ok(self.tenant.clone())
        } else {
            Err(IntegrationError::new(format!("Tenant not found: {}", tenant_id)))
        }
    }
}

/// Records module operations; operations on `failing` modules are rejected
#[derive(Default)]
pub struct RecordingModuleApi {
    pub operations: Mutex<Vec<(String, ModuleTenantOperation)>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingModuleApi {
    pub fn fail_on(&self, module: &str) {
        self.failing.lock().insert(module.to_string());
    }

    /// `install <module>` / `upgrade <from> -> <to>` / `uninstall <module>`
    pub fn rendered(&self) -> Vec<String> {
        self.operations
            .lock()
            .iter()
            .map(|(_, op)| match (&op.module_from, &op.module_to) {
                (None, Some(to)) => format!("install {}", to),
                (Some(from), Some(to)) => format!("upgrade {} -> {}", from, to),
                (Some(from), None) => format!("uninstall {}", from),
                (None, None) => "noop".to_string(),
            })
            .collect()
    }
}

#[async_trait]
impl ModuleTenantApi for RecordingModuleApi {
    async fn apply(&self, location: &str, operation: &ModuleTenantOperation) -> Result<(), IntegrationError> {
        let target = operation
            .module_to
            .as_ref()
            .or(operation.module_from.as_ref())
            .map(|m| m.to_string())
            .unwrap_or_default();
        if self.failing.lock().contains(&target) {
            return Err(IntegrationError::new(format!("{} rejected tenant operation", target)));
        }
        self.operations.lock().push((location.to_string(), operation.clone()));
        Ok(())
    }
}
