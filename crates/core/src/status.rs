// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution and step status vocabulary.

use serde::{Deserialize, Serialize};

/// Status of a playbook execution.
///
/// Transitions are confined to: pending → running ↔ paused, and any
/// non-terminal state → {completed, failed, cancelled}.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Created, prior to step 0
    Pending,
    /// Currently executing or about to execute a step
    Running,
    /// Loop blocked on the pause condition
    Paused,
    /// All steps terminal, no abort
    Completed,
    /// A step aborted, or an unhandled engine error
    Failed,
    /// User or watchdog cancelled
    Cancelled,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Cancelled
        )
    }
}

crate::simple_display! {
    ExecutionStatus {
        Pending => "pending",
        Running => "running",
        Paused => "paused",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

/// Status of a single step within an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Success,
    Failed,
    Skipped,
}

impl StepStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepStatus::Success | StepStatus::Failed | StepStatus::Skipped
        )
    }
}

crate::simple_display! {
    StepStatus {
        Pending => "pending",
        Running => "running",
        Success => "success",
        Failed => "failed",
        Skipped => "skipped",
    }
}

/// Control signal kinds deliverable to a live execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlKind {
    Pause,
    Resume,
    Skip,
    SkipBack,
    Cancel,
    DebugOn,
    DebugOff,
}

crate::simple_display! {
    ControlKind {
        Pause => "pause",
        Resume => "resume",
        Skip => "skip",
        SkipBack => "skip_back",
        Cancel => "cancel",
        DebugOn => "debug_on",
        DebugOff => "debug_off",
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
