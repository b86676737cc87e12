// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::error::ErrorKind;

#[test]
fn pending_result_is_empty() {
    let result = StepResult::pending("login");
    assert_eq!(result.step_id, "login");
    assert_eq!(result.status, StepStatus::Pending);
    assert!(result.output.is_empty());
    assert_eq!(result.attempts, 0);
}

#[test]
fn reset_clears_everything_but_the_id() {
    let mut result = StepResult::pending("fetch");
    result.status = StepStatus::Failed;
    result.error = Some(StepError::new(ErrorKind::Handler, "boom"));
    result.started_at_ms = Some(10);
    result.completed_at_ms = Some(20);
    result.attempts = 3;
    result
        .output
        .insert("code".into(), serde_json::Value::from(500));

    result.reset();

    assert_eq!(result, StepResult::pending("fetch"));
}

#[test]
fn serde_omits_empty_fields() {
    let json = serde_json::to_value(StepResult::pending("a")).unwrap();
    let obj = json.as_object().unwrap();
    assert!(!obj.contains_key("error"));
    assert!(!obj.contains_key("output"));
    assert!(!obj.contains_key("screenshot_path"));
}
