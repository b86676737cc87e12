// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Template reference resolution.
//!
//! Step inputs may contain `{{ … }}` placeholders referencing run
//! parameters, vault credentials, run variables, or completed step outputs.
//! Resolution is structural: scalars, sequences, and mappings are walked
//! recursively. A placeholder occupying an entire string keeps the
//! substitution's native type; embedded placeholders are stringified and
//! spliced. `{{{{ }}}}` escapes to a literal `{{ }}`.

use pilot_core::credential::CredentialMap;
use pilot_core::{ErrorKind, Redactor, StepError, StepOutput};
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::LazyLock;
use thiserror::Error;

/// Placeholder pattern: `{{ namespace.name… }}`
// Allow expect here as the regex is compile-time verified to be valid
#[allow(clippy::expect_used)]
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z0-9_-]+)*)\s*\}\}")
        .expect("constant regex pattern is valid")
});

/// Whole-string form of [`PLACEHOLDER`], for native-type preservation
#[allow(clippy::expect_used)]
static WHOLE_PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\{\{\s*([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z0-9_-]+)*)\s*\}\}$")
        .expect("constant regex pattern is valid")
});

// Private-use sentinels standing in for escaped braces during scanning
const OPEN_SENTINEL: &str = "\u{e000}";
const CLOSE_SENTINEL: &str = "\u{e001}";

/// Errors from reference resolution.
///
/// All of these surface on the step as [`ErrorKind::Reference`] and are
/// subject to the step's `on_failure` policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("undefined reference: {0}")]
    Undefined(String),

    #[error("step {0} has not completed")]
    StepNotCompleted(String),

    #[error("unknown credential: {0}")]
    UnknownCredential(String),
}

impl ResolveError {
    pub fn to_step_error(&self) -> StepError {
        StepError::new(ErrorKind::Reference, self.to_string())
    }
}

/// Read-only view of everything a reference may point at.
///
/// The redactor is shared with the engine: secrets spliced during
/// resolution are registered so downstream log lines and events can be
/// scrubbed.
pub struct ResolveContext<'a> {
    pub parameters: &'a HashMap<String, Value>,
    pub variables: &'a HashMap<String, Value>,
    pub credentials: &'a CredentialMap,
    pub step_outputs: &'a HashMap<String, StepOutput>,
    pub redactor: &'a Redactor,
}

/// Resolve every placeholder in `value`, recursively.
pub fn resolve(value: &Value, ctx: &ResolveContext<'_>) -> Result<Value, ResolveError> {
    match value {
        Value::String(s) => resolve_string(s, ctx),
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(resolve(item, ctx)?);
            }
            Ok(Value::Array(out))
        }
        Value::Object(map) => Ok(Value::Object(resolve_map(map, ctx)?)),
        _ => Ok(value.clone()),
    }
}

/// Resolve a string-keyed mapping (the shape of step parameters).
pub fn resolve_map(
    map: &serde_json::Map<String, Value>,
    ctx: &ResolveContext<'_>,
) -> Result<serde_json::Map<String, Value>, ResolveError> {
    let mut out = serde_json::Map::with_capacity(map.len());
    for (key, value) in map {
        out.insert(key.clone(), resolve(value, ctx)?);
    }
    Ok(out)
}

fn resolve_string(input: &str, ctx: &ResolveContext<'_>) -> Result<Value, ResolveError> {
    if !input.contains("{{") {
        return Ok(Value::String(input.to_string()));
    }

    let masked = input
        .replace("{{{{", OPEN_SENTINEL)
        .replace("}}}}", CLOSE_SENTINEL);

    // A placeholder occupying the entire string keeps its native type
    if let Some(caps) = WHOLE_PLACEHOLDER.captures(&masked) {
        if let Some(reference) = caps.get(1) {
            return lookup(reference.as_str(), ctx);
        }
    }

    let mut out = String::with_capacity(masked.len());
    let mut last = 0;
    for caps in PLACEHOLDER.captures_iter(&masked) {
        let (Some(whole), Some(reference)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        out.push_str(&masked[last..whole.start()]);
        let value = lookup(reference.as_str(), ctx)?;
        out.push_str(&stringify(&value));
        last = whole.end();
    }
    out.push_str(&masked[last..]);

    Ok(Value::String(
        out.replace(OPEN_SENTINEL, "{{").replace(CLOSE_SENTINEL, "}}"),
    ))
}

fn lookup(reference: &str, ctx: &ResolveContext<'_>) -> Result<Value, ResolveError> {
    let Some((namespace, rest)) = reference.split_once('.') else {
        return Err(ResolveError::Undefined(reference.to_string()));
    };
    match namespace {
        "parameter" => ctx
            .parameters
            .get(rest)
            .cloned()
            .ok_or_else(|| ResolveError::Undefined(reference.to_string())),
        "variable" => ctx
            .variables
            .get(rest)
            .cloned()
            .ok_or_else(|| ResolveError::Undefined(reference.to_string())),
        "credential" => {
            let (name, field) = match rest.split_once('.') {
                Some((name, field)) => (name, Some(field)),
                None => (rest, None),
            };
            let credential = ctx
                .credentials
                .get(name)
                .ok_or_else(|| ResolveError::UnknownCredential(name.to_string()))?;
            ctx.redactor.add_credential(credential);
            match field {
                None => Ok(credential.to_value()),
                Some(field) => credential
                    .field(field)
                    .ok_or_else(|| ResolveError::Undefined(reference.to_string())),
            }
        }
        "step" => {
            let Some((step_id, key)) = rest.split_once('.') else {
                return Err(ResolveError::Undefined(reference.to_string()));
            };
            let output = ctx
                .step_outputs
                .get(step_id)
                .ok_or_else(|| ResolveError::StepNotCompleted(step_id.to_string()))?;
            output
                .get(key)
                .cloned()
                .ok_or_else(|| ResolveError::Undefined(reference.to_string()))
        }
        _ => Err(ResolveError::Undefined(reference.to_string())),
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}

#[cfg(test)]
#[path = "template_tests.rs"]
mod tests;
