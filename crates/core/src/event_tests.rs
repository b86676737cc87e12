// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn snapshot() -> ExecutionSnapshot {
    ExecutionSnapshot {
        execution_id: ExecutionId::from_string("exe-1"),
        playbook_name: "demo".into(),
        playbook_path: "demo.yaml".into(),
        status: ExecutionStatus::Running,
        current_step_index: 0,
        total_steps: 2,
        step_results: vec![StepResult::pending("a"), StepResult::pending("b")],
        error: None,
        debug_mode: false,
        started_at_ms: Some(1000),
        completed_at_ms: None,
        metadata: HashMap::new(),
    }
}

#[test]
fn update_serializes_with_type_tag() {
    let json = serde_json::to_value(Event::ExecutionUpdate(snapshot())).unwrap();
    assert_eq!(json["type"], "execution:update");
    assert_eq!(json["execution_id"], "exe-1");
    assert_eq!(json["status"], "running");
}

#[test]
fn screenshot_serializes_with_type_tag() {
    let event = Event::ScreenshotFrame(ScreenshotFrame {
        execution_id: ExecutionId::from_string("exe-2"),
        jpeg_base64: "aGVsbG8=".into(),
        timestamp_ms: 99,
    });
    let json = serde_json::to_value(&event).unwrap();
    assert_eq!(json["type"], "screenshot:frame");
    assert_eq!(json["jpeg_base64"], "aGVsbG8=");
}

#[test]
fn round_trip() {
    let event = Event::ExecutionUpdate(snapshot());
    let json = serde_json::to_string(&event).unwrap();
    let back: Event = serde_json::from_str(&json).unwrap();
    assert_eq!(back, event);
}

#[test]
fn execution_id_accessor_covers_both_variants() {
    let update = Event::ExecutionUpdate(snapshot());
    assert_eq!(update.execution_id().as_str(), "exe-1");
    let frame = Event::ScreenshotFrame(ScreenshotFrame {
        execution_id: ExecutionId::from_string("exe-2"),
        jpeg_base64: String::new(),
        timestamp_ms: 0,
    });
    assert_eq!(frame.execution_id().as_str(), "exe-2");
}

#[test]
fn terminal_update_predicate() {
    let mut s = snapshot();
    assert!(!Event::ExecutionUpdate(s.clone()).is_terminal_update());
    s.status = ExecutionStatus::Completed;
    assert!(Event::ExecutionUpdate(s).is_terminal_update());
}
