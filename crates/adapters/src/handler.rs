// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The step handler contract.
//!
//! A handler serves exactly one dotted step-type tag and performs one unit
//! of work against a target system. Handlers must honor cancellation
//! promptly at I/O boundaries and must not retry internally — retry is the
//! step executor's responsibility.

use crate::browser::BrowserError;
use crate::context::StepContext;
use crate::designer::DesignerError;
use crate::gateway::GatewayError;
use async_trait::async_trait;
use pilot_core::{ErrorKind, StepOutput};
use serde_json::Value;
use thiserror::Error;

/// Resolved step parameters, as handed to a handler.
pub type StepParams = serde_json::Map<String, Value>;

/// Errors a handler may surface.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{0}")]
    Message(String),

    #[error("missing parameter: {0}")]
    MissingParameter(String),

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("browser error: {0}")]
    Browser(#[from] BrowserError),

    #[error("designer error: {0}")]
    Designer(#[from] DesignerError),

    #[error("playbook not verified: {0}")]
    Verification(String),

    #[error("nesting depth exceeded: {0}")]
    NestingDepth(String),

    #[error("circular playbook invocation: {0}")]
    CircularDependency(String),

    #[error("cancelled")]
    Cancelled,
}

impl HandlerError {
    /// Classify into the runtime error taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            HandlerError::Verification(_) => ErrorKind::Verification,
            HandlerError::NestingDepth(_) => ErrorKind::NestingDepth,
            HandlerError::CircularDependency(_) => ErrorKind::CircularDependency,
            HandlerError::Cancelled => ErrorKind::Cancelled,
            _ => ErrorKind::Handler,
        }
    }
}

/// A typed step handler.
#[async_trait]
pub trait StepHandler: Send + Sync {
    /// Dotted step-type tag this handler serves, e.g. `gateway.login`
    fn step_type(&self) -> &str;

    /// Execute one resolved step.
    ///
    /// The returned output map is merged into the run's step-output table
    /// keyed by the step's id.
    async fn execute(
        &self,
        params: &StepParams,
        ctx: &StepContext,
    ) -> Result<StepOutput, HandlerError>;
}

/// Fetch a required string parameter.
pub fn required_str<'a>(params: &'a StepParams, name: &str) -> Result<&'a str, HandlerError> {
    params
        .get(name)
        .ok_or_else(|| HandlerError::MissingParameter(name.to_string()))?
        .as_str()
        .ok_or_else(|| HandlerError::InvalidParameter {
            name: name.to_string(),
            reason: "expected a string".to_string(),
        })
}

/// Fetch an optional unsigned-integer parameter.
pub fn optional_u64(params: &StepParams, name: &str) -> Result<Option<u64>, HandlerError> {
    match params.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value
            .as_u64()
            .map(Some)
            .ok_or_else(|| HandlerError::InvalidParameter {
                name: name.to_string(),
                reason: "expected a non-negative integer".to_string(),
            }),
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod testing {
    //! Scriptable handlers for exercising the executor and engine.

    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Records every invocation; succeeds with a fixed output.
    pub struct RecordingHandler {
        step_type: String,
        output: StepOutput,
        pub calls: Arc<Mutex<Vec<StepParams>>>,
    }

    impl RecordingHandler {
        pub fn new(step_type: impl Into<String>) -> Self {
            Self {
                step_type: step_type.into(),
                output: StepOutput::new(),
                calls: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn with_output(mut self, key: &str, value: Value) -> Self {
            self.output.insert(key.to_string(), value);
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().len()
        }
    }

    #[async_trait]
    impl StepHandler for RecordingHandler {
        fn step_type(&self) -> &str {
            &self.step_type
        }

        async fn execute(
            &self,
            params: &StepParams,
            _ctx: &StepContext,
        ) -> Result<StepOutput, HandlerError> {
            self.calls.lock().push(params.clone());
            Ok(self.output.clone())
        }
    }

    /// Fails the first `failures` invocations, then succeeds.
    pub struct FlakyHandler {
        step_type: String,
        failures: u32,
        pub attempts: Arc<AtomicU32>,
    }

    impl FlakyHandler {
        pub fn new(step_type: impl Into<String>, failures: u32) -> Self {
            Self {
                step_type: step_type.into(),
                failures,
                attempts: Arc::new(AtomicU32::new(0)),
            }
        }
    }

    #[async_trait]
    impl StepHandler for FlakyHandler {
        fn step_type(&self) -> &str {
            &self.step_type
        }

        async fn execute(
            &self,
            _params: &StepParams,
            _ctx: &StepContext,
        ) -> Result<StepOutput, HandlerError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.failures {
                return Err(HandlerError::Message(format!(
                    "induced failure on attempt {}",
                    attempt + 1
                )));
            }
            let mut output = StepOutput::new();
            output.insert("attempt".to_string(), Value::from(attempt + 1));
            Ok(output)
        }
    }

    /// Sleeps for a configurable duration, honoring cancellation.
    pub struct SleepyHandler {
        step_type: String,
        duration: Duration,
    }

    impl SleepyHandler {
        pub fn new(step_type: impl Into<String>, duration: Duration) -> Self {
            Self {
                step_type: step_type.into(),
                duration,
            }
        }
    }

    #[async_trait]
    impl StepHandler for SleepyHandler {
        fn step_type(&self) -> &str {
            &self.step_type
        }

        async fn execute(
            &self,
            _params: &StepParams,
            ctx: &StepContext,
        ) -> Result<StepOutput, HandlerError> {
            tokio::select! {
                _ = tokio::time::sleep(self.duration) => Ok(StepOutput::new()),
                _ = ctx.cancel_token().cancelled() => Err(HandlerError::Cancelled),
            }
        }
    }
}

#[cfg(test)]
#[path = "handler_tests.rs"]
mod tests;
