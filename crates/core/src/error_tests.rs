// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn step_error_display_includes_kind() {
    let err = StepError::new(ErrorKind::Handler, "selector not found");
    assert_eq!(err.to_string(), "handler: selector not found");
}

#[test]
fn timeout_constructor_formats_seconds() {
    let err = StepError::timeout(30);
    assert_eq!(err.kind, ErrorKind::Timeout);
    assert_eq!(err.message, "step timed out after 30s");
}

#[test]
fn cancelled_predicate() {
    assert!(StepError::cancelled().is_cancelled());
    assert!(!StepError::new(ErrorKind::Internal, "boom").is_cancelled());
}

#[test]
fn kind_serializes_snake_case() {
    assert_eq!(
        serde_json::to_string(&ErrorKind::CircularDependency).unwrap(),
        "\"circular_dependency\""
    );
}
