// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Broadcast event types.
//!
//! Serializes with `{"type": "event:name", ...fields}` format.

use crate::id::ExecutionId;
use crate::status::ExecutionStatus;
use crate::step::StepResult;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Point-in-time view of an execution, safe to hand to observers.
///
/// Snapshots are taken under the run mutex so every emitted update is
/// consistent with the state at the moment of emission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSnapshot {
    pub execution_id: ExecutionId,
    pub playbook_name: String,
    pub playbook_path: String,
    pub status: ExecutionStatus,
    pub current_step_index: usize,
    pub total_steps: usize,
    pub step_results: Vec<StepResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub debug_mode: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at_ms: Option<u64>,
    /// Small key/value metadata: `parent_execution_id`, `nesting_depth`, …
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

/// One live browser frame, base64 JPEG, rate-limited at the source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenshotFrame {
    pub execution_id: ExecutionId,
    pub jpeg_base64: String,
    pub timestamp_ms: u64,
}

/// Events fanned out to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    #[serde(rename = "execution:update")]
    ExecutionUpdate(ExecutionSnapshot),

    #[serde(rename = "screenshot:frame")]
    ScreenshotFrame(ScreenshotFrame),
}

impl Event {
    /// The execution this event belongs to.
    pub fn execution_id(&self) -> &ExecutionId {
        match self {
            Event::ExecutionUpdate(snapshot) => &snapshot.execution_id,
            Event::ScreenshotFrame(frame) => &frame.execution_id,
        }
    }

    pub fn is_terminal_update(&self) -> bool {
        matches!(self, Event::ExecutionUpdate(s) if s.status.is_terminal())
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
