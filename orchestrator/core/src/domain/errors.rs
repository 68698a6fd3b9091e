// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Error Taxonomy
//!
//! | Error | Raised by | Behavior |
//! |-------|-----------|----------|
//! | `ValidationError` | planner, validators, resolvers, tree loader | carries `(key, value)` parameters; accumulating validators report every violation at once |
//! | `IntegrationError` | catalog, tenant directory, module endpoints, event bus | single typed wrapper around the cause, never retried here |
//! | `SequencingError` | module installation sequencer | dependency graph that cannot be levelled |
//! | `EntitlementError::Execution` | entitlement service | failed flow with the status of every stage that ran |

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::flow::FlowExecutionReport;
use crate::domain::module_sequencer::SequencingError;
use crate::domain::repository::RepositoryError;
use crate::domain::version::VersionError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub key: String,
    pub value: String,
}

impl Parameter {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
    pub parameters: Vec<Parameter>,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            parameters: Vec::new(),
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.push(Parameter::new(key, value));
        self
    }

    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|p| p.key == key)
            .map(|p| p.value.as_str())
    }
}

impl From<VersionError> for ValidationError {
    fn from(err: VersionError) -> Self {
        ValidationError::new("Invalid version").with_parameter("cause", err.to_string())
    }
}

/// Collects violations from checks that are independent of each other and
/// fails once with all of them.
#[derive(Debug)]
pub struct Violations {
    message: String,
    parameters: Vec<Parameter>,
}

impl Violations {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            parameters: Vec::new(),
        }
    }

    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.parameters.push(Parameter::new(key, value));
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn into_result(self) -> Result<(), ValidationError> {
        if self.parameters.is_empty() {
            return Ok(());
        }
        Err(ValidationError {
            message: self.message,
            parameters: self.parameters,
        })
    }
}

/// Failure talking to an external collaborator
#[derive(Debug, Error)]
#[error("{message}")]
pub struct IntegrationError {
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl IntegrationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

#[derive(Debug, Error)]
pub enum EntitlementError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Integration(#[from] IntegrationError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Sequencing(#[from] SequencingError),

    #[error("{}", .0.summary())]
    Execution(Box<FlowExecutionReport>),
}

impl From<VersionError> for EntitlementError {
    fn from(err: VersionError) -> Self {
        EntitlementError::Validation(err.into())
    }
}
