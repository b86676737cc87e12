// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Playbook loading and structural validation.

use crate::model::{ParameterType, Playbook};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

/// Errors from loading or validating a playbook document.
#[derive(Debug, Error)]
pub enum PlaybookError {
    #[error("failed to read playbook {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse playbook {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },

    #[error("duplicate step id: {0}")]
    DuplicateStepId(String),

    #[error("step at index {0} has an empty id")]
    EmptyStepId(usize),

    #[error("duplicate parameter: {0}")]
    DuplicateParameter(String),

    #[error("missing required parameter: {0}")]
    MissingParameter(String),

    #[error("parameter {name}: expected {expected}, got {actual}")]
    ParameterType {
        name: String,
        expected: ParameterType,
        actual: String,
    },
}

/// Load and validate a playbook from disk.
pub fn load_playbook(path: &Path) -> Result<Playbook, PlaybookError> {
    let display = path.display().to_string();
    let text = std::fs::read_to_string(path).map_err(|source| PlaybookError::Io {
        path: display.clone(),
        source,
    })?;
    parse_playbook(&text, &display)
}

/// Parse and validate a playbook from YAML text.
///
/// `origin` names the source for error messages (a path, or `<inline>`).
pub fn parse_playbook(text: &str, origin: &str) -> Result<Playbook, PlaybookError> {
    let playbook: Playbook =
        serde_yaml::from_str(text).map_err(|source| PlaybookError::Parse {
            path: origin.to_string(),
            source,
        })?;
    validate(&playbook)?;
    tracing::debug!(
        playbook = %playbook.name,
        steps = playbook.steps.len(),
        parameters = playbook.parameters.len(),
        "parsed playbook"
    );
    Ok(playbook)
}

fn validate(playbook: &Playbook) -> Result<(), PlaybookError> {
    let mut step_ids = HashSet::new();
    for (index, step) in playbook.steps.iter().enumerate() {
        if step.id.is_empty() {
            return Err(PlaybookError::EmptyStepId(index));
        }
        if !step_ids.insert(step.id.as_str()) {
            return Err(PlaybookError::DuplicateStepId(step.id.clone()));
        }
    }
    let mut param_names = HashSet::new();
    for spec in &playbook.parameters {
        if !param_names.insert(spec.name.as_str()) {
            return Err(PlaybookError::DuplicateParameter(spec.name.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
