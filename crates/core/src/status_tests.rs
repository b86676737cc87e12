// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    pending = { ExecutionStatus::Pending, false },
    running = { ExecutionStatus::Running, false },
    paused = { ExecutionStatus::Paused, false },
    completed = { ExecutionStatus::Completed, true },
    failed = { ExecutionStatus::Failed, true },
    cancelled = { ExecutionStatus::Cancelled, true },
)]
fn execution_terminality(status: ExecutionStatus, terminal: bool) {
    assert_eq!(status.is_terminal(), terminal);
}

#[parameterized(
    pending = { StepStatus::Pending, false },
    running = { StepStatus::Running, false },
    success = { StepStatus::Success, true },
    failed = { StepStatus::Failed, true },
    skipped = { StepStatus::Skipped, true },
)]
fn step_terminality(status: StepStatus, terminal: bool) {
    assert_eq!(status.is_terminal(), terminal);
}

#[test]
fn execution_status_serializes_snake_case() {
    assert_eq!(
        serde_json::to_string(&ExecutionStatus::Cancelled).unwrap(),
        "\"cancelled\""
    );
    let back: ExecutionStatus = serde_json::from_str("\"paused\"").unwrap();
    assert_eq!(back, ExecutionStatus::Paused);
}

#[test]
fn display_matches_wire_form() {
    assert_eq!(ExecutionStatus::Running.to_string(), "running");
    assert_eq!(StepStatus::Success.to_string(), "success");
    assert_eq!(ControlKind::SkipBack.to_string(), "skip_back");
}

#[test]
fn control_kind_round_trips() {
    for kind in [
        ControlKind::Pause,
        ControlKind::Resume,
        ControlKind::Skip,
        ControlKind::SkipBack,
        ControlKind::Cancel,
        ControlKind::DebugOn,
        ControlKind::DebugOff,
    ] {
        let json = serde_json::to_string(&kind).unwrap();
        let back: ControlKind = serde_json::from_str(&json).unwrap();
        assert_eq!(back, kind);
    }
}
