// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Stage Lifecycle Contract
//!
//! A stage is one orchestration step with an `execute` effect and, optionally,
//! a compensating `cancel`. Every invocation is tracked by a
//! [`StageExecutionRecord`] moving through:
//!
//! ```text
//! QUEUED -> IN_PROGRESS -> FINISHED -> CANCELLED
//!                       |           -> CANCELLATION_FAILED
//!                       -> FAILED
//! ```
//!
//! `FAILED` and `CANCELLATION_FAILED` are terminal and never retried.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::errors::{IntegrationError, ValidationError};
use crate::domain::flow::FlowId;
use crate::domain::repository::RepositoryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StageStatus {
    Queued,
    InProgress,
    Finished,
    Failed,
    Cancelled,
    CancellationFailed,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageStatus::Queued => "QUEUED",
            StageStatus::InProgress => "IN_PROGRESS",
            StageStatus::Finished => "FINISHED",
            StageStatus::Failed => "FAILED",
            StageStatus::Cancelled => "CANCELLED",
            StageStatus::CancellationFailed => "CANCELLATION_FAILED",
        }
    }

    pub fn can_transition_to(&self, next: StageStatus) -> bool {
        use StageStatus::*;
        matches!(
            (self, next),
            (Queued, InProgress)
                | (InProgress, Finished)
                | (InProgress, Failed)
                | (Finished, Cancelled)
                | (Finished, CancellationFailed)
        )
    }

    /// No further transition is possible
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            StageStatus::Failed | StageStatus::Cancelled | StageStatus::CancellationFailed
        )
    }
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StageStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "QUEUED" => Ok(StageStatus::Queued),
            "IN_PROGRESS" => Ok(StageStatus::InProgress),
            "FINISHED" => Ok(StageStatus::Finished),
            "FAILED" => Ok(StageStatus::Failed),
            "CANCELLED" => Ok(StageStatus::Cancelled),
            "CANCELLATION_FAILED" => Ok(StageStatus::CancellationFailed),
            other => Err(format!("Unknown stage status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageExecutionRecord {
    pub flow_id: FlowId,
    pub stage_name: String,
    pub status: StageStatus,
    pub error_type: Option<String>,
    pub error_message: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl StageExecutionRecord {
    pub fn queued(flow_id: FlowId, stage_name: impl Into<String>) -> Self {
        Self {
            flow_id,
            stage_name: stage_name.into(),
            status: StageStatus::Queued,
            error_type: None,
            error_message: None,
            updated_at: Utc::now(),
        }
    }

    /// Moves to `status`, keeping the error fields only for failure states
    pub fn transition(&mut self, status: StageStatus, error: Option<&StageError>) {
        self.status = status;
        self.error_type = error.map(|e| e.error_type.clone());
        self.error_message = error.map(|e| e.message.clone());
        self.updated_at = Utc::now();
    }
}

/// Failure of a stage `execute` or `cancel`, reduced to a type tag and a message
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{error_type}: {message}")]
pub struct StageError {
    pub error_type: String,
    pub message: String,
}

impl StageError {
    pub fn new(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            message: message.into(),
        }
    }
}

impl From<IntegrationError> for StageError {
    fn from(err: IntegrationError) -> Self {
        let message = match std::error::Error::source(&err) {
            Some(source) => format!("{}: {}", err.message, source),
            None => err.message,
        };
        StageError::new("IntegrationError", message)
    }
}

impl From<RepositoryError> for StageError {
    fn from(err: RepositoryError) -> Self {
        StageError::new("RepositoryError", err.to_string())
    }
}

impl From<ValidationError> for StageError {
    fn from(err: ValidationError) -> Self {
        let mut message = err.message;
        for parameter in &err.parameters {
            message.push_str(&format!("; {}: {}", parameter.key, parameter.value));
        }
        StageError::new("ValidationError", message)
    }
}

/// One orchestration step over a typed context `C`.
///
/// Stages receive their context explicitly; nothing is shared through ambient
/// state. A stage that can reverse its effect overrides both
/// [`Stage::is_cancellable`] and [`Stage::cancel`].
#[async_trait]
pub trait Stage<C: Send + Sync>: Send + Sync {
    fn name(&self) -> &'static str;

    async fn execute(&self, context: &C) -> Result<(), StageError>;

    fn is_cancellable(&self) -> bool {
        false
    }

    async fn cancel(&self, _context: &C) -> Result<(), StageError> {
        Err(StageError::new(
            "NotCancellable",
            format!("Stage {} has no compensating action", self.name()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::IntegrationError;

    #[test]
    fn test_lifecycle_transitions() {
        use StageStatus::*;
        assert!(Queued.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(Finished));
        assert!(InProgress.can_transition_to(Failed));
        assert!(Finished.can_transition_to(Cancelled));
        assert!(Finished.can_transition_to(CancellationFailed));

        assert!(!Queued.can_transition_to(Finished));
        assert!(!Failed.can_transition_to(Cancelled));
        assert!(!CancellationFailed.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(InProgress));
    }

    #[test]
    fn test_final_states() {
        assert!(StageStatus::Failed.is_final());
        assert!(StageStatus::CancellationFailed.is_final());
        assert!(!StageStatus::Finished.is_final());
        assert!(!StageStatus::InProgress.is_final());
    }

    #[test]
    fn test_status_round_trips_through_its_name() {
        for status in [
            StageStatus::Queued,
            StageStatus::InProgress,
            StageStatus::Finished,
            StageStatus::Failed,
            StageStatus::Cancelled,
            StageStatus::CancellationFailed,
        ] {
            assert_eq!(status.as_str().parse::<StageStatus>(), Ok(status));
        }
        assert!("DONE".parse::<StageStatus>().is_err());
    }

    #[test]
    fn test_record_keeps_failure_details() {
        let mut record = StageExecutionRecord::queued(FlowId::new(), "app-1.0.0/EntitlementCreator");
        record.transition(StageStatus::InProgress, None);
        record.transition(StageStatus::Failed, Some(&StageError::new("RepositoryError", "boom")));
        assert_eq!(record.error_type.as_deref(), Some("RepositoryError"));
        assert_eq!(record.error_message.as_deref(), Some("boom"));
    }

    #[test]
    fn test_integration_error_message_includes_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused");
        let err: StageError = IntegrationError::with_source("Failed to call module", io).into();
        assert_eq!(err.error_type, "IntegrationError");
        assert_eq!(err.message, "Failed to call module: connection refused");
    }

    #[test]
    fn test_validation_error_parameters_are_flattened() {
        let err: StageError = ValidationError::new("Module discovery not found")
            .with_parameter("mod-a-1.0.0", "no location")
            .into();
        assert_eq!(err.message, "Module discovery not found; mod-a-1.0.0: no location");
    }
}
