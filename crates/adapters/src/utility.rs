// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Utility step handlers.
//!
//! Reference implementations of the handler contract; no external targets.

use crate::context::StepContext;
use crate::handler::{required_str, HandlerError, StepHandler, StepParams};
use async_trait::async_trait;
use pilot_core::StepOutput;
use serde_json::Value;
use std::time::Duration;

/// `utility.log` — echo a message into the step output.
pub struct LogHandler;

#[async_trait]
impl StepHandler for LogHandler {
    fn step_type(&self) -> &str {
        "utility.log"
    }

    async fn execute(
        &self,
        params: &StepParams,
        ctx: &StepContext,
    ) -> Result<StepOutput, HandlerError> {
        let message = required_str(params, "message")?;
        let redacted = ctx.redactor().redact(message);
        tracing::info!(execution_id = %ctx.execution_id(), step = %ctx.step_id(), "{redacted}");
        let mut output = StepOutput::new();
        output.insert("message".to_string(), Value::from(message));
        Ok(output)
    }
}

/// `utility.wait` — cancellable sleep.
pub struct WaitHandler;

#[async_trait]
impl StepHandler for WaitHandler {
    fn step_type(&self) -> &str {
        "utility.wait"
    }

    async fn execute(
        &self,
        params: &StepParams,
        ctx: &StepContext,
    ) -> Result<StepOutput, HandlerError> {
        let seconds = params
            .get("seconds")
            .and_then(Value::as_f64)
            .ok_or_else(|| HandlerError::MissingParameter("seconds".to_string()))?;
        if !(0.0..=86_400.0).contains(&seconds) {
            return Err(HandlerError::InvalidParameter {
                name: "seconds".to_string(),
                reason: "expected 0..=86400".to_string(),
            });
        }
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs_f64(seconds)) => {}
            _ = ctx.cancel_token().cancelled() => return Err(HandlerError::Cancelled),
        }
        let mut output = StepOutput::new();
        output.insert("waited_seconds".to_string(), Value::from(seconds));
        Ok(output)
    }
}

/// `utility.set_variable` — write into the run's variable map.
pub struct SetVariableHandler;

#[async_trait]
impl StepHandler for SetVariableHandler {
    fn step_type(&self) -> &str {
        "utility.set_variable"
    }

    async fn execute(
        &self,
        params: &StepParams,
        ctx: &StepContext,
    ) -> Result<StepOutput, HandlerError> {
        let name = required_str(params, "name")?;
        let value = params
            .get("value")
            .cloned()
            .ok_or_else(|| HandlerError::MissingParameter("value".to_string()))?;
        ctx.variables().set(name, value.clone());
        let mut output = StepOutput::new();
        output.insert("name".to_string(), Value::from(name));
        output.insert("value".to_string(), value);
        Ok(output)
    }
}

#[cfg(test)]
#[path = "utility_tests.rs"]
mod tests;
