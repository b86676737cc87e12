// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Credential records and secret redaction.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// A named credential from the vault.
///
/// The record is opaque to the resolver: templates may splice the whole
/// record or a subfield, but the stringified form of any secret field must
/// come out of logs and events as `***`. Register secrets with a
/// [`Redactor`] before the resolved value leaves the resolver's custody.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub name: String,
    pub username: String,
    pub password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_url: Option<String>,
}

impl Credential {
    pub fn new(
        name: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            username: username.into(),
            password: password.into(),
            gateway_url: None,
        }
    }

    crate::setters! {
        option {
            gateway_url: String,
        }
    }

    /// The record as a JSON object, for whole-record template splices.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "username": self.username,
            "password": self.password,
            "gateway_url": self.gateway_url,
        })
    }

    /// Subfield access for `credential.<name>.<field>` references.
    pub fn field(&self, field: &str) -> Option<serde_json::Value> {
        match field {
            "name" => Some(serde_json::Value::from(self.name.clone())),
            "username" => Some(serde_json::Value::from(self.username.clone())),
            "password" => Some(serde_json::Value::from(self.password.clone())),
            "gateway_url" => self
                .gateway_url
                .clone()
                .map(serde_json::Value::from),
            _ => None,
        }
    }

    /// Values that must never appear verbatim in logs or events.
    pub fn secret_values(&self) -> Vec<String> {
        vec![self.password.clone()]
    }
}

/// Accumulates secret strings and scrubs them out of user-visible text.
///
/// Shared between the resolver (which registers secrets as it splices them)
/// and the engine (which scrubs error messages and log lines). Cloning
/// shares the underlying set.
#[derive(Clone, Default)]
pub struct Redactor {
    secrets: Arc<Mutex<Vec<String>>>,
}

/// Replacement for redacted secrets.
pub const REDACTED: &str = "***";

impl Redactor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a secret value. Empty strings are ignored.
    pub fn add(&self, secret: impl Into<String>) {
        let secret = secret.into();
        if secret.is_empty() {
            return;
        }
        let mut secrets = self.secrets.lock();
        if !secrets.iter().any(|s| *s == secret) {
            secrets.push(secret);
        }
    }

    /// Register every secret field of a credential.
    pub fn add_credential(&self, credential: &Credential) {
        for secret in credential.secret_values() {
            self.add(secret);
        }
    }

    /// Scrub all registered secrets out of `text`.
    pub fn redact(&self, text: &str) -> String {
        let secrets = self.secrets.lock();
        let mut out = text.to_string();
        for secret in secrets.iter() {
            if out.contains(secret.as_str()) {
                out = out.replace(secret.as_str(), REDACTED);
            }
        }
        out
    }
}

impl std::fmt::Debug for Redactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Redactor({} secrets)", self.secrets.lock().len())
    }
}

/// A read-only credential map snapshot, as handed out by the vault.
pub type CredentialMap = HashMap<String, Credential>;

#[cfg(test)]
#[path = "credential_tests.rs"]
mod tests;
