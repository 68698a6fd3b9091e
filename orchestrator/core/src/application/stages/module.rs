// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Module tenant operations. Both stages are forward-only: a module that
//! already ran its tenant migration is not rolled back.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::application::context::ModuleContext;
use crate::domain::catalog::{ModuleTenantApi, ModuleTenantOperation};
use crate::domain::stage::{Stage, StageError};

pub struct ModuleInstaller {
    api: Arc<dyn ModuleTenantApi>,
}

impl ModuleInstaller {
    pub fn new(api: Arc<dyn ModuleTenantApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Stage<ModuleContext> for ModuleInstaller {
    fn name(&self) -> &'static str {
        "ModuleInstaller"
    }

    async fn execute(&self, context: &ModuleContext) -> Result<(), StageError> {
        let operation = ModuleTenantOperation::install(
            context.tenant().name.clone(),
            context.module_id.clone(),
            context.previous_module_id.clone(),
        );
        info!(
            tenant = %context.tenant().name,
            module = %context.module_id,
            previous = ?context.previous_module_id.as_ref().map(|m| m.as_str()),
            "Enabling module for tenant"
        );
        self.api.apply(&context.location, &operation).await?;
        Ok(())
    }
}

pub struct ModuleUninstaller {
    api: Arc<dyn ModuleTenantApi>,
}

impl ModuleUninstaller {
    pub fn new(api: Arc<dyn ModuleTenantApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Stage<ModuleContext> for ModuleUninstaller {
    fn name(&self) -> &'static str {
        "ModuleUninstaller"
    }

    async fn execute(&self, context: &ModuleContext) -> Result<(), StageError> {
        let purge = context.application.request.purge;
        let operation = ModuleTenantOperation::uninstall(context.tenant().name.clone(), context.module_id.clone(), purge);
        info!(tenant = %context.tenant().name, module = %context.module_id, purge, "Disabling module for tenant");
        self.api.apply(&context.location, &operation).await?;
        Ok(())
    }
}
