// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Shared `reqwest` plumbing for the collaborator clients: client
//! construction with explicit timeouts and status-to-error mapping.
//! Nothing here retries.

use reqwest::{Client, Response, StatusCode};
use std::time::Duration;

use crate::domain::errors::IntegrationError;

pub fn build_client(connect_timeout: Duration, read_timeout: Duration) -> Result<Client, IntegrationError> {
    Client::builder()
        .connect_timeout(connect_timeout)
        .read_timeout(read_timeout)
        .build()
        .map_err(|e| IntegrationError::with_source("Failed to build HTTP client", e))
}

/// Join a base URL and a path without doubling the slash
pub fn join(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Pass 2xx responses through; anything else becomes an `IntegrationError`
/// carrying the status and body
pub async fn check_status(response: Response, action: &str) -> Result<Response, IntegrationError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(IntegrationError::new(format_failure(action, status, &body)))
}

fn format_failure(action: &str, status: StatusCode, body: &str) -> String {
    if body.trim().is_empty() {
        format!("{} failed with status {}", action, status)
    } else {
        format!("{} failed with status {}: {}", action, status, body.trim())
    }
}

pub fn send_error(action: &str, err: reqwest::Error) -> IntegrationError {
    let kind = if err.is_timeout() {
        "timed out"
    } else if err.is_connect() {
        "could not connect"
    } else {
        "failed"
    };
    IntegrationError::with_source(format!("{} {}", action, kind), err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_normalizes_slashes() {
        assert_eq!(join("http://catalog:8081/", "/applications"), "http://catalog:8081/applications");
        assert_eq!(join("http://catalog:8081", "applications"), "http://catalog:8081/applications");
    }

    #[test]
    fn test_failure_message_includes_body() {
        assert_eq!(
            format_failure("Install mod-a-1.0.0", StatusCode::BAD_REQUEST, " bad tenant \n"),
            "Install mod-a-1.0.0 failed with status 400 Bad Request: bad tenant"
        );
        assert_eq!(
            format_failure("Fetch tenant", StatusCode::BAD_GATEWAY, ""),
            "Fetch tenant failed with status 502 Bad Gateway"
        );
    }
}
