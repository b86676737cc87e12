// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use pilot_core::{ExecutionId, ExecutionStatus};

fn snapshot() -> ExecutionSnapshot {
    ExecutionSnapshot {
        execution_id: ExecutionId::from_string("exe-9"),
        playbook_name: "demo".into(),
        playbook_path: "demo.yaml".into(),
        status: ExecutionStatus::Running,
        current_step_index: 1,
        total_steps: 3,
        step_results: vec![],
        error: None,
        debug_mode: false,
        started_at_ms: Some(5),
        completed_at_ms: None,
        metadata: Default::default(),
    }
}

#[test]
fn server_messages_tag_types() {
    let json = serde_json::to_value(ServerMessage::Keepalive).unwrap();
    assert_eq!(json["type"], "keepalive");

    let json = serde_json::to_value(ServerMessage::Pong).unwrap();
    assert_eq!(json["type"], "pong");

    let json = serde_json::to_value(ServerMessage::ExecutionUpdate(snapshot())).unwrap();
    assert_eq!(json["type"], "execution:update");
    assert_eq!(json["execution_id"], "exe-9");
}

#[test]
fn event_converts_to_server_message() {
    let message = ServerMessage::from(Event::ExecutionUpdate(snapshot()));
    assert!(matches!(message, ServerMessage::ExecutionUpdate(s) if s.execution_id == "exe-9"));

    let frame = ScreenshotFrame {
        execution_id: ExecutionId::from_string("exe-9"),
        jpeg_base64: "aQ==".into(),
        timestamp_ms: 1,
    };
    let message = ServerMessage::from(Event::ScreenshotFrame(frame));
    assert!(matches!(message, ServerMessage::ScreenshotFrame(_)));
}

#[test]
fn client_ping_round_trips() {
    let json = serde_json::to_string(&ClientMessage::Ping).unwrap();
    assert_eq!(json, r#"{"type":"ping"}"#);
    let back: ClientMessage = serde_json::from_str(&json).unwrap();
    assert_eq!(back, ClientMessage::Ping);
}

#[test]
fn liveness_constants_are_consistent() {
    assert!(LIVENESS_TIMEOUT > EXPECTED_PING_INTERVAL);
}
