// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Tenant directory client (`GET /tenants/{id}`)

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use crate::domain::catalog::TenantDirectory;
use crate::domain::config::EndpointConfig;
use crate::domain::entitlement::{Tenant, TenantId};
use crate::domain::errors::IntegrationError;
use crate::infrastructure::http::{build_client, check_status, join, send_error};

pub struct HttpTenantDirectory {
    base_url: String,
    client: Client,
}

impl HttpTenantDirectory {
    pub fn new(config: &EndpointConfig) -> Result<Self, IntegrationError> {
        Ok(Self {
            base_url: config.url.clone(),
            client: build_client(config.connect_timeout, config.read_timeout)?,
        })
    }
}

#[async_trait]
impl TenantDirectory for HttpTenantDirectory {
    async fn find_tenant(&self, tenant_id: TenantId) -> Result<Tenant, IntegrationError> {
        let action = format!("Fetch tenant {}", tenant_id);
        let response = self
            .client
            .get(join(&self.base_url, &format!("tenants/{}", tenant_id)))
            .send()
            .await
            .map_err(|e| send_error(&action, e))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(IntegrationError::new(format!("Tenant not found: {}", tenant_id)));
        }
        check_status(response, &action)
            .await?
            .json::<Tenant>()
            .await
            .map_err(|e| IntegrationError::with_source(format!("{}: invalid response", action), e))
    }
}
