// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn cred() -> Credential {
    Credential::new("gw", "admin", "hunter2").gateway_url("http://gateway:8088")
}

#[test]
fn field_access() {
    let c = cred();
    assert_eq!(c.field("username"), Some("admin".into()));
    assert_eq!(c.field("password"), Some("hunter2".into()));
    assert_eq!(c.field("gateway_url"), Some("http://gateway:8088".into()));
    assert_eq!(c.field("nope"), None);
}

#[test]
fn to_value_is_full_record() {
    let v = cred().to_value();
    assert_eq!(v["name"], "gw");
    assert_eq!(v["password"], "hunter2");
}

#[test]
fn redactor_scrubs_registered_secrets() {
    let redactor = Redactor::new();
    redactor.add_credential(&cred());
    assert_eq!(
        redactor.redact("login failed for admin with hunter2"),
        "login failed for admin with ***"
    );
}

#[test]
fn redactor_ignores_empty_secret() {
    let redactor = Redactor::new();
    redactor.add("");
    assert_eq!(redactor.redact("text"), "text");
}

#[test]
fn redactor_clones_share_state() {
    let redactor = Redactor::new();
    let clone = redactor.clone();
    redactor.add("s3cret");
    assert_eq!(clone.redact("a s3cret b"), "a *** b");
}

#[test]
fn redactor_handles_repeated_occurrences() {
    let redactor = Redactor::new();
    redactor.add("pw");
    assert_eq!(redactor.redact("pw and pw"), "*** and ***");
}
