// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-step execution results.

use crate::error::StepError;
use crate::status::StepStatus;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Opaque output map a handler returns for a step.
pub type StepOutput = serde_json::Map<String, serde_json::Value>;

/// Result of one step of an execution.
///
/// `step_results` on the execution state holds exactly one of these per
/// playbook step; only the latest attempt is visible here. The persistence
/// sink's per-transition rows carry the full audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub step_id: String,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StepError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at_ms: Option<u64>,
    /// Handler invocations consumed so far (1 on first attempt)
    #[serde(default)]
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "StepOutput::is_empty")]
    pub output: StepOutput,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot_path: Option<PathBuf>,
}

impl StepResult {
    /// A fresh pending result for the given step.
    pub fn pending(step_id: impl Into<String>) -> Self {
        Self {
            step_id: step_id.into(),
            status: StepStatus::Pending,
            error: None,
            started_at_ms: None,
            completed_at_ms: None,
            attempts: 0,
            output: StepOutput::new(),
            screenshot_path: None,
        }
    }

    /// Restore the pristine pending state, discarding any prior attempt.
    ///
    /// Used when skip-back revisits a step: the prior result is preserved
    /// until the step begins executing again, then reset through here.
    pub fn reset(&mut self) {
        *self = StepResult::pending(std::mem::take(&mut self.step_id));
    }
}

#[cfg(test)]
#[path = "step_tests.rs"]
mod tests;
