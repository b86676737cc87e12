// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! AI helper contract and the `ai.*` handlers.

use crate::context::StepContext;
use crate::handler::{required_str, HandlerError, StepHandler, StepParams};
use async_trait::async_trait;
use pilot_core::StepOutput;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Errors from the AI provider.
#[derive(Debug, Error)]
pub enum AiError {
    #[error("provider request failed: {0}")]
    Request(String),

    #[error("response was empty")]
    EmptyResponse,
}

/// A completion provider.
#[async_trait]
pub trait AiProvider: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, AiError>;
}

/// `ai.ask` — one prompt, one answer into the step output.
pub struct AiAskHandler {
    provider: Arc<dyn AiProvider>,
}

impl AiAskHandler {
    pub fn new(provider: Arc<dyn AiProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl StepHandler for AiAskHandler {
    fn step_type(&self) -> &str {
        "ai.ask"
    }

    async fn execute(
        &self,
        params: &StepParams,
        ctx: &StepContext,
    ) -> Result<StepOutput, HandlerError> {
        let prompt = required_str(params, "prompt")?;
        let answer = tokio::select! {
            result = self.provider.complete(prompt) => result.map_err(|e| HandlerError::Message(e.to_string()))?,
            _ = ctx.cancel_token().cancelled() => return Err(HandlerError::Cancelled),
        };
        tracing::debug!(
            execution_id = %ctx.execution_id(),
            step = %ctx.step_id(),
            chars = answer.len(),
            "ai completion received"
        );
        let mut output = StepOutput::new();
        output.insert("prompt".to_string(), Value::from(prompt));
        output.insert("answer".to_string(), Value::from(answer));
        Ok(output)
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    //! Canned-response provider for tests.

    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    pub struct FakeAiProvider {
        pub prompts: Mutex<Vec<String>>,
        reply: String,
    }

    impl FakeAiProvider {
        pub fn replying(reply: impl Into<String>) -> Arc<Self> {
            Arc::new(Self {
                prompts: Mutex::new(Vec::new()),
                reply: reply.into(),
            })
        }
    }

    #[async_trait]
    impl AiProvider for FakeAiProvider {
        async fn complete(&self, prompt: &str) -> Result<String, AiError> {
            self.prompts.lock().push(prompt.to_string());
            if self.reply.is_empty() {
                return Err(AiError::EmptyResponse);
            }
            Ok(self.reply.clone())
        }
    }
}

#[cfg(test)]
#[path = "ai_tests.rs"]
mod tests;
