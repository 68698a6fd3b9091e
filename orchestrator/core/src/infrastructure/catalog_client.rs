// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Application Catalog Client
//!
//! HTTP adapter for the `ApplicationCatalog` port.
//!
//! | Operation | Request |
//! |-----------|---------|
//! | `get_application_descriptors` | `GET /applications?ids=a,b` |
//! | `find_latest_satisfying` | `POST /applications/latest` with every dependency of a round |
//! | `get_module_discovery` | `GET /applications/{id}/discovery` |

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::application::{ApplicationDescriptor, Dependency};
use crate::domain::catalog::{ApplicationCatalog, ModuleDiscovery};
use crate::domain::config::EndpointConfig;
use crate::domain::errors::IntegrationError;
use crate::domain::version::{ApplicationId, ModuleId};
use crate::infrastructure::http::{build_client, check_status, join, send_error};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApplicationDescriptors {
    #[serde(default)]
    application_descriptors: Vec<ApplicationDescriptor>,
}

#[derive(Debug, Serialize)]
struct LatestQuery<'a> {
    dependencies: &'a [Dependency],
}

#[derive(Debug, Deserialize)]
struct DiscoveryEntry {
    id: ModuleId,
    location: String,
}

#[derive(Debug, Deserialize)]
struct Discovery {
    #[serde(default)]
    discovery: Vec<DiscoveryEntry>,
}

pub struct HttpApplicationCatalog {
    base_url: String,
    client: Client,
}

impl HttpApplicationCatalog {
    pub fn new(config: &EndpointConfig) -> Result<Self, IntegrationError> {
        Ok(Self {
            base_url: config.url.clone(),
            client: build_client(config.connect_timeout, config.read_timeout)?,
        })
    }
}

#[async_trait]
impl ApplicationCatalog for HttpApplicationCatalog {
    async fn get_application_descriptors(
        &self,
        ids: &[ApplicationId],
    ) -> Result<Vec<ApplicationDescriptor>, IntegrationError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let joined = ids.iter().map(ApplicationId::as_str).collect::<Vec<_>>().join(",");
        let action = "Fetch application descriptors";
        let response = self
            .client
            .get(join(&self.base_url, "applications"))
            .query(&[("ids", joined.as_str())])
            .send()
            .await
            .map_err(|e| send_error(action, e))?;

        let body: ApplicationDescriptors = check_status(response, action)
            .await?
            .json()
            .await
            .map_err(|e| IntegrationError::with_source(format!("{}: invalid response", action), e))?;

        debug!(requested = ids.len(), found = body.application_descriptors.len(), "Fetched application descriptors");
        Ok(body.application_descriptors)
    }

    async fn find_latest_satisfying(
        &self,
        dependencies: &[Dependency],
    ) -> Result<Vec<ApplicationDescriptor>, IntegrationError> {
        if dependencies.is_empty() {
            return Ok(Vec::new());
        }
        let action = "Find latest satisfying applications";
        let response = self
            .client
            .post(join(&self.base_url, "applications/latest"))
            .json(&LatestQuery { dependencies })
            .send()
            .await
            .map_err(|e| send_error(action, e))?;

        // Dependencies nothing in the catalog satisfies are left out of the answer
        let body: ApplicationDescriptors = check_status(response, action)
            .await?
            .json()
            .await
            .map_err(|e| IntegrationError::with_source(format!("{}: invalid response", action), e))?;

        debug!(
            requested = dependencies.len(),
            found = body.application_descriptors.len(),
            "Resolved latest satisfying applications"
        );
        Ok(body.application_descriptors)
    }

    async fn get_module_discovery(&self, application_id: &ApplicationId) -> Result<ModuleDiscovery, IntegrationError> {
        let action = format!("Fetch module discovery of {}", application_id);
        let response = self
            .client
            .get(join(&self.base_url, &format!("applications/{}/discovery", application_id)))
            .send()
            .await
            .map_err(|e| send_error(&action, e))?;

        let body: Discovery = check_status(response, &action)
            .await?
            .json()
            .await
            .map_err(|e| IntegrationError::with_source(format!("{}: invalid response", action), e))?;

        Ok(body.discovery.into_iter().map(|entry| (entry.id, entry.location)).collect())
    }
}
