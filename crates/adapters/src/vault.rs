// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide credential vault.
//!
//! Read-through cache with copy-on-write semantics: reads grab an `Arc`
//! snapshot of the whole map without holding a lock across use; mutations
//! rebuild the map under a write lock and never block readers for long.

use parking_lot::RwLock;
use pilot_core::credential::CredentialMap;
use pilot_core::{Credential, Redactor};
use std::sync::Arc;

/// Shared credential store.
#[derive(Clone, Default)]
pub struct CredentialVault {
    inner: Arc<RwLock<Arc<CredentialMap>>>,
}

impl CredentialVault {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(credentials: impl IntoIterator<Item = Credential>) -> Self {
        let map: CredentialMap = credentials
            .into_iter()
            .map(|c| (c.name.clone(), c))
            .collect();
        Self {
            inner: Arc::new(RwLock::new(Arc::new(map))),
        }
    }

    /// Cheap read snapshot; the map behind the `Arc` never mutates.
    pub fn snapshot(&self) -> Arc<CredentialMap> {
        Arc::clone(&self.inner.read())
    }

    pub fn get(&self, name: &str) -> Option<Credential> {
        self.inner.read().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.read().contains_key(name)
    }

    /// Insert or replace a credential (copy-on-write).
    pub fn upsert(&self, credential: Credential) {
        let mut guard = self.inner.write();
        let mut map = (**guard).clone();
        map.insert(credential.name.clone(), credential);
        *guard = Arc::new(map);
    }

    /// Remove a credential (copy-on-write). Returns whether it existed.
    pub fn remove(&self, name: &str) -> bool {
        let mut guard = self.inner.write();
        if !guard.contains_key(name) {
            return false;
        }
        let mut map = (**guard).clone();
        map.remove(name);
        *guard = Arc::new(map);
        true
    }

    /// Register every stored secret with a redactor.
    pub fn register_secrets(&self, redactor: &Redactor) {
        for credential in self.inner.read().values() {
            redactor.add_credential(credential);
        }
    }
}

#[cfg(test)]
#[path = "vault_tests.rs"]
mod tests;
