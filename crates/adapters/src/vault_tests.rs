// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use pilot_core::{Credential, Redactor};

#[test]
fn with_credentials_indexes_by_name() {
    let vault = CredentialVault::with_credentials([
        Credential::new("gw", "admin", "pw1"),
        Credential::new("scada", "op", "pw2"),
    ]);
    assert_eq!(vault.get("gw").unwrap().username, "admin");
    assert!(vault.contains("scada"));
    assert!(!vault.contains("absent"));
}

#[test]
fn snapshot_is_stable_across_mutation() {
    let vault = CredentialVault::with_credentials([Credential::new("gw", "admin", "pw")]);
    let snapshot = vault.snapshot();
    vault.upsert(Credential::new("new", "u", "p"));
    // The old snapshot does not see the write; a fresh one does
    assert!(!snapshot.contains_key("new"));
    assert!(vault.snapshot().contains_key("new"));
}

#[test]
fn upsert_replaces() {
    let vault = CredentialVault::new();
    vault.upsert(Credential::new("gw", "admin", "old"));
    vault.upsert(Credential::new("gw", "admin", "new"));
    assert_eq!(vault.get("gw").unwrap().password, "new");
}

#[test]
fn remove_reports_existence() {
    let vault = CredentialVault::with_credentials([Credential::new("gw", "a", "p")]);
    assert!(vault.remove("gw"));
    assert!(!vault.remove("gw"));
    assert!(vault.get("gw").is_none());
}

#[test]
fn register_secrets_feeds_redactor() {
    let vault = CredentialVault::with_credentials([Credential::new("gw", "admin", "s3cret")]);
    let redactor = Redactor::new();
    vault.register_secrets(&redactor);
    assert_eq!(redactor.redact("pw=s3cret"), "pw=***");
}
