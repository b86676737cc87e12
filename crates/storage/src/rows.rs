// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted row shapes.

use pilot_core::{ExecutionId, ExecutionSnapshot, ExecutionStatus, StepResult, StepStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One row per execution; columns mirror the execution state minus
/// transient control signals and per-step detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRow {
    pub execution_id: ExecutionId,
    pub playbook_name: String,
    pub playbook_path: String,
    pub status: ExecutionStatus,
    pub current_step_index: usize,
    pub total_steps: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub debug_mode: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

impl From<&ExecutionSnapshot> for ExecutionRow {
    fn from(snapshot: &ExecutionSnapshot) -> Self {
        Self {
            execution_id: snapshot.execution_id.clone(),
            playbook_name: snapshot.playbook_name.clone(),
            playbook_path: snapshot.playbook_path.clone(),
            status: snapshot.status,
            current_step_index: snapshot.current_step_index,
            total_steps: snapshot.total_steps,
            error: snapshot.error.clone(),
            debug_mode: snapshot.debug_mode,
            started_at_ms: snapshot.started_at_ms,
            completed_at_ms: snapshot.completed_at_ms,
            metadata: snapshot.metadata.clone(),
        }
    }
}

impl ExecutionRow {
    /// Rebuild a snapshot from this row plus reconstructed step results.
    pub fn to_snapshot(&self, step_results: Vec<StepResult>) -> ExecutionSnapshot {
        ExecutionSnapshot {
            execution_id: self.execution_id.clone(),
            playbook_name: self.playbook_name.clone(),
            playbook_path: self.playbook_path.clone(),
            status: self.status,
            current_step_index: self.current_step_index,
            total_steps: self.total_steps,
            step_results,
            error: self.error.clone(),
            debug_mode: self.debug_mode,
            started_at_ms: self.started_at_ms,
            completed_at_ms: self.completed_at_ms,
            metadata: self.metadata.clone(),
        }
    }
}

/// One row per step state transition, keyed by the parent execution.
///
/// The sequence of rows for a (execution, step) pair is the audit trail a
/// re-executed step leaves behind; queries that want only the latest
/// attempt take the last row per step id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRow {
    pub execution_id: ExecutionId,
    pub step_id: String,
    pub status: StepStatus,
    pub result: StepResult,
    pub recorded_at_ms: u64,
}

#[cfg(test)]
#[path = "rows_tests.rs"]
mod tests;
