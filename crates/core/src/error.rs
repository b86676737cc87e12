// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy shared across the runtime.
//!
//! Kinds, not types: every failure a step can surface is classified into one
//! of these kinds so retry/on_failure policy and the UI can act uniformly.

use serde::{Deserialize, Serialize};

/// Classification of a runtime failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Playbook parse failure, missing required parameter, unknown step type.
    /// Detected pre-flight; the run never reaches `running`.
    Validation,
    /// Undefined `{{ … }}` expansion at execution time
    Reference,
    /// Step exceeded its timeout
    Timeout,
    /// Raised by a handler (HTTP non-2xx, selector miss, …)
    Handler,
    /// Cooperative cancellation
    Cancelled,
    /// Nested playbook target not marked verified
    Verification,
    /// Nested playbook exceeded the maximum nesting depth
    NestingDepth,
    /// Nested playbook target already in the parent chain
    CircularDependency,
    /// Unexpected fault in the engine/executor/manager
    Internal,
}

crate::simple_display! {
    ErrorKind {
        Validation => "validation",
        Reference => "reference",
        Timeout => "timeout",
        Handler => "handler",
        Cancelled => "cancelled",
        Verification => "verification",
        NestingDepth => "nesting_depth",
        CircularDependency => "circular_dependency",
        Internal => "internal",
    }
}

/// An error recorded on a step result: kind plus a user-visible message.
///
/// Messages must already be redacted; nothing downstream re-inspects them
/// for secrets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepError {
    pub kind: ErrorKind,
    pub message: String,
}

impl StepError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(seconds: u64) -> Self {
        Self::new(ErrorKind::Timeout, format!("step timed out after {seconds}s"))
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "execution cancelled")
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == ErrorKind::Cancelled
    }
}

impl std::fmt::Display for StepError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for StepError {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
