// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::collections::HashSet;

#[test]
fn new_ids_carry_prefix() {
    let id = ExecutionId::new();
    assert!(id.as_str().starts_with("exe-"));
    let sub = SubscriberId::new();
    assert!(sub.as_str().starts_with("sub-"));
}

#[test]
fn new_ids_are_unique() {
    let ids: HashSet<ExecutionId> = (0..1000).map(|_| ExecutionId::new()).collect();
    assert_eq!(ids.len(), 1000);
}

#[test]
fn suffix_strips_prefix() {
    let id = ExecutionId::from_string("exe-abc123");
    assert_eq!(id.suffix(), "abc123");
}

#[test]
fn suffix_tolerates_missing_prefix() {
    let id = ExecutionId::from_string("bare");
    assert_eq!(id.suffix(), "bare");
}

#[test]
fn short_truncates() {
    let id = ExecutionId::from_string("exe-abcdefgh");
    assert_eq!(id.short(4), "abcd");
    assert_eq!(id.short(100), "abcdefgh");
}

#[test]
fn serde_is_transparent() {
    let id = ExecutionId::from_string("exe-xyz");
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, "\"exe-xyz\"");
    let back: ExecutionId = serde_json::from_str(&json).unwrap();
    assert_eq!(back, id);
}

#[test]
fn compares_with_str() {
    let id = ExecutionId::from_string("exe-a");
    assert_eq!(id, "exe-a");
    assert_eq!(&id, &"exe-a");
}

#[test]
fn usable_as_map_key_via_borrow() {
    let mut map = HashSet::new();
    map.insert(ExecutionId::from_string("exe-a"));
    assert!(map.contains("exe-a"));
}
