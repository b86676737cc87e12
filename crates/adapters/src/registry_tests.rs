// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::handler::testing::RecordingHandler;
use std::sync::Arc;

#[test]
fn builtins_cover_expected_tags() {
    let registry = HandlerRegistry::with_builtins();
    for tag in [
        "utility.log",
        "utility.wait",
        "utility.set_variable",
        "gateway.login",
        "gateway.read_tag",
        "gateway.write_tag",
        "browser.navigate",
        "browser.click",
        "browser.fill",
        "browser.screenshot",
    ] {
        assert!(registry.contains(tag), "missing builtin {tag}");
    }
}

#[test]
fn register_and_get() {
    let mut registry = HandlerRegistry::new();
    registry
        .register(Arc::new(RecordingHandler::new("custom.step")))
        .unwrap();
    assert!(registry.get("custom.step").is_some());
    assert!(registry.get("absent.step").is_none());
}

#[test]
fn duplicate_registration_rejected() {
    let mut registry = HandlerRegistry::new();
    registry
        .register(Arc::new(RecordingHandler::new("dup.step")))
        .unwrap();
    let err = registry
        .register(Arc::new(RecordingHandler::new("dup.step")))
        .unwrap_err();
    assert!(matches!(err, RegistryError::Duplicate(tag) if tag == "dup.step"));
}

#[test]
fn step_types_sorted() {
    let mut registry = HandlerRegistry::new();
    registry
        .register(Arc::new(RecordingHandler::new("b.two")))
        .unwrap();
    registry
        .register(Arc::new(RecordingHandler::new("a.one")))
        .unwrap();
    assert_eq!(registry.step_types(), ["a.one", "b.two"]);
}
