// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Mutable per-run state.
//!
//! Only the engine's run loop mutates this; observers take read snapshots.
//! Snapshots are built under the same lock as the mutation they reflect,
//! so every emitted update is consistent with the state at that moment.

use parking_lot::Mutex;
use pilot_core::{ExecutionId, ExecutionSnapshot, ExecutionStatus, StepOutput, StepResult};
use pilot_playbook::Playbook;
use serde_json::Value;
use std::collections::HashMap;

pub(crate) struct StateInner {
    pub execution_id: ExecutionId,
    pub playbook_name: String,
    pub playbook_path: String,
    pub status: ExecutionStatus,
    pub current_step_index: usize,
    pub step_results: Vec<StepResult>,
    pub parameters: HashMap<String, Value>,
    pub error: Option<String>,
    pub debug_mode: bool,
    pub started_at_ms: Option<u64>,
    pub completed_at_ms: Option<u64>,
    pub metadata: HashMap<String, String>,
}

impl StateInner {
    fn snapshot(&self) -> ExecutionSnapshot {
        ExecutionSnapshot {
            execution_id: self.execution_id.clone(),
            playbook_name: self.playbook_name.clone(),
            playbook_path: self.playbook_path.clone(),
            status: self.status,
            current_step_index: self.current_step_index,
            total_steps: self.step_results.len(),
            step_results: self.step_results.clone(),
            error: self.error.clone(),
            debug_mode: self.debug_mode,
            started_at_ms: self.started_at_ms,
            completed_at_ms: self.completed_at_ms,
            metadata: self.metadata.clone(),
        }
    }
}

/// State of one execution, shared between the engine and observers.
pub struct RunState {
    inner: Mutex<StateInner>,
}

impl RunState {
    pub fn new(
        execution_id: ExecutionId,
        playbook: &Playbook,
        playbook_path: impl Into<String>,
        debug_mode: bool,
        metadata: HashMap<String, String>,
    ) -> Self {
        let step_results = playbook
            .steps
            .iter()
            .map(|s| StepResult::pending(s.id.clone()))
            .collect();
        Self {
            inner: Mutex::new(StateInner {
                execution_id,
                playbook_name: playbook.name.clone(),
                playbook_path: playbook_path.into(),
                status: ExecutionStatus::Pending,
                current_step_index: 0,
                step_results,
                parameters: HashMap::new(),
                error: None,
                debug_mode,
                started_at_ms: None,
                completed_at_ms: None,
                metadata,
            }),
        }
    }

    /// Apply a mutation and return the snapshot it produced, atomically.
    pub(crate) fn update(&self, f: impl FnOnce(&mut StateInner)) -> ExecutionSnapshot {
        let mut inner = self.inner.lock();
        f(&mut inner);
        inner.snapshot()
    }

    /// Mutate one step result (and the cursor) in one critical section.
    pub(crate) fn update_step(
        &self,
        index: usize,
        f: impl FnOnce(&mut StepResult),
    ) -> ExecutionSnapshot {
        self.update(|inner| {
            if let Some(result) = inner.step_results.get_mut(index) {
                f(result);
            }
        })
    }

    pub(crate) fn read<R>(&self, f: impl FnOnce(&StateInner) -> R) -> R {
        f(&self.inner.lock())
    }

    pub fn snapshot(&self) -> ExecutionSnapshot {
        self.inner.lock().snapshot()
    }

    pub fn status(&self) -> ExecutionStatus {
        self.inner.lock().status
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    pub fn completed_at_ms(&self) -> Option<u64> {
        self.inner.lock().completed_at_ms
    }

    pub fn execution_id(&self) -> ExecutionId {
        self.inner.lock().execution_id.clone()
    }

    /// Step result clone for one index.
    pub fn step_result(&self, index: usize) -> Option<StepResult> {
        self.inner.lock().step_results.get(index).cloned()
    }

    /// Output table of successfully completed steps, for `step.<id>.<key>`
    /// references.
    pub fn step_outputs(&self) -> HashMap<String, StepOutput> {
        self.inner
            .lock()
            .step_results
            .iter()
            .filter(|r| r.status == pilot_core::StepStatus::Success)
            .map(|r| (r.step_id.clone(), r.output.clone()))
            .collect()
    }

    pub fn parameters(&self) -> HashMap<String, Value> {
        self.inner.lock().parameters.clone()
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
