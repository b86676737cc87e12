// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Playbook document model.
//!
//! A playbook is immutable during a run: declared parameters, an ordered
//! sequence of typed steps, and optional metadata (the `verified` flag
//! gates use as a nested step).

use crate::parser::PlaybookError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A parsed playbook document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playbook {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,
    #[serde(default)]
    pub steps: Vec<Step>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
}

impl Playbook {
    /// Whether metadata marks this playbook as invocable from another
    /// playbook (`playbook.run`).
    pub fn is_verified(&self) -> bool {
        self.metadata
            .get("verified")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn step_index(&self, step_id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.id == step_id)
    }
}

/// Declared parameter types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterType {
    String,
    Integer,
    Float,
    Boolean,
    File,
    Credential,
    List,
    Dict,
}

pilot_core::simple_display! {
    ParameterType {
        String => "string",
        Integer => "integer",
        Float => "float",
        Boolean => "boolean",
        File => "file",
        Credential => "credential",
        List => "list",
        Dict => "dict",
    }
}

/// One declared playbook parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParameterType,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ParameterSpec {
    /// Check and coerce a user-supplied value against the declared type.
    ///
    /// Scalar types accept their string renderings (form-posted values
    /// arrive as strings); list/dict accept only their native shapes.
    pub fn coerce(&self, value: Value) -> Result<Value, PlaybookError> {
        let mismatch = |actual: &Value| PlaybookError::ParameterType {
            name: self.name.clone(),
            expected: self.param_type,
            actual: type_name(actual).to_string(),
        };
        match self.param_type {
            ParameterType::String | ParameterType::File | ParameterType::Credential => {
                match value {
                    Value::String(_) => Ok(value),
                    Value::Number(n) => Ok(Value::String(n.to_string())),
                    Value::Bool(b) => Ok(Value::String(b.to_string())),
                    other => Err(mismatch(&other)),
                }
            }
            ParameterType::Integer => match &value {
                Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value),
                Value::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(Value::from)
                    .map_err(|_| mismatch(&value)),
                other => Err(mismatch(other)),
            },
            ParameterType::Float => match &value {
                Value::Number(_) => Ok(value),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(Value::from)
                    .map_err(|_| mismatch(&value)),
                other => Err(mismatch(other)),
            },
            ParameterType::Boolean => match &value {
                Value::Bool(_) => Ok(value),
                Value::String(s) => match s.trim() {
                    "true" | "True" | "1" => Ok(Value::Bool(true)),
                    "false" | "False" | "0" => Ok(Value::Bool(false)),
                    _ => Err(mismatch(&value)),
                },
                other => Err(mismatch(other)),
            },
            ParameterType::List => match value {
                Value::Array(_) => Ok(value),
                other => Err(mismatch(&other)),
            },
            ParameterType::Dict => match value {
                Value::Object(_) => Ok(value),
                other => Err(mismatch(&other)),
            },
        }
    }
}

/// Policy applied when a step exhausts its retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnFailure {
    /// Terminate the run as failed
    #[default]
    Abort,
    /// Record the failure and proceed to the next step
    Continue,
    /// Mark the step skipped and proceed
    Skip,
}

pilot_core::simple_display! {
    OnFailure {
        Abort => "abort",
        Continue => "continue",
        Skip => "skip",
    }
}

fn default_retry_delay() -> u64 {
    1
}

/// One step of a playbook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    #[serde(rename = "name", default)]
    pub display_name: String,
    /// Dotted handler tag, e.g. `gateway.login`, `browser.navigate`
    #[serde(rename = "type")]
    pub step_type: String,
    #[serde(default)]
    pub parameters: serde_json::Map<String, Value>,
    /// Explicit timeout override; step-kind default otherwise
    #[serde(default, rename = "timeout", skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default = "default_retry_delay", rename = "retry_delay")]
    pub retry_delay_seconds: u64,
    #[serde(default)]
    pub on_failure: OnFailure,
}

impl Step {
    /// Effective timeout: explicit override or the step-kind default.
    pub fn effective_timeout_seconds(&self) -> u64 {
        self.timeout_seconds
            .unwrap_or_else(|| default_timeout_seconds(&self.step_type))
    }
}

/// Step-kind default timeouts, in seconds.
///
/// Browser automation waits on page loads; gateway calls are bounded REST
/// round-trips; nested playbooks get the longest budget.
pub fn default_timeout_seconds(step_type: &str) -> u64 {
    if step_type == "playbook.run" {
        600
    } else if step_type.starts_with("browser.") {
        300
    } else if step_type.starts_with("ai.") {
        120
    } else if step_type.starts_with("gateway.") || step_type.starts_with("designer.") {
        60
    } else {
        30
    }
}

/// Merge user parameters over declared defaults, verifying the required set
/// and coercing each value to its declared type.
pub fn merge_parameters(
    specs: &[ParameterSpec],
    user: &HashMap<String, Value>,
) -> Result<HashMap<String, Value>, PlaybookError> {
    let mut merged = HashMap::with_capacity(specs.len());
    for spec in specs {
        match user.get(&spec.name) {
            Some(value) => {
                merged.insert(spec.name.clone(), spec.coerce(value.clone())?);
            }
            None => match &spec.default {
                Some(default) => {
                    merged.insert(spec.name.clone(), spec.coerce(default.clone())?);
                }
                None if spec.required => {
                    return Err(PlaybookError::MissingParameter(spec.name.clone()));
                }
                None => {}
            },
        }
    }
    // Undeclared extras pass through untouched; nested invocations hand the
    // child more than it declares and the extras are ignored there.
    for (name, value) in user {
        merged.entry(name.clone()).or_insert_with(|| value.clone());
    }
    Ok(merged)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
