// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Module tenant endpoint client (`POST {location}/_/tenant`)

use async_trait::async_trait;
use reqwest::Client;
use tracing::info;

use crate::domain::catalog::{ModuleTenantApi, ModuleTenantOperation};
use crate::domain::config::ModuleClientConfig;
use crate::domain::errors::IntegrationError;
use crate::infrastructure::http::{build_client, check_status, join, send_error};

/// Header naming the tenant a module operation applies to
pub const TENANT_HEADER: &str = "x-tenant";

pub struct HttpModuleTenantApi {
    client: Client,
}

impl HttpModuleTenantApi {
    pub fn new(config: &ModuleClientConfig) -> Result<Self, IntegrationError> {
        Ok(Self {
            client: build_client(config.connect_timeout, config.read_timeout)?,
        })
    }
}

#[async_trait]
impl ModuleTenantApi for HttpModuleTenantApi {
    async fn apply(&self, location: &str, operation: &ModuleTenantOperation) -> Result<(), IntegrationError> {
        let target = operation
            .module_to
            .as_ref()
            .or(operation.module_from.as_ref())
            .map(|m| m.to_string())
            .unwrap_or_default();
        let action = format!("Tenant operation on {} for {}", target, operation.tenant_name);

        let response = self
            .client
            .post(join(location, "_/tenant"))
            .header(TENANT_HEADER, &operation.tenant_name)
            .json(operation)
            .send()
            .await
            .map_err(|e| send_error(&action, e))?;
        check_status(response, &action).await?;

        info!(
            tenant = %operation.tenant_name,
            module_to = ?operation.module_to,
            module_from = ?operation.module_from,
            purge = operation.purge,
            "Module tenant operation applied"
        );
        Ok(())
    }
}
