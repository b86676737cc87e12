// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Step executor.
//!
//! Runs one resolved step: invokes its handler bounded by the step
//! timeout, retries per policy with a cancellable delay, and watches the
//! run's control signals so cancel and skip interrupt an in-flight
//! attempt. Pause never interrupts a running step.

use crate::signal::{ControlSignals, SkipKind};
use pilot_adapters::{ScreenshotTx, SharedResources, StepContext, StepHandler, StepParams, VariableStore};
use pilot_core::{ExecutionId, Redactor, StepError, StepOutput};
use pilot_playbook::Step;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Terminal outcome of one step execution (all retries included).
#[derive(Debug)]
pub enum StepOutcome {
    Success(StepOutput),
    /// Retries exhausted; error recorded on the step, policy decides next.
    Failed(StepError),
    /// The run was cancelled while this step was in flight.
    Cancelled,
    /// A skip signal interrupted or pre-empted the attempt.
    Skipped(SkipKind),
}

/// The per-run ingredients from which a per-attempt [`StepContext`] is
/// assembled. Attempts get their own child cancellation token so a timed
/// out attempt can be cancelled without poisoning the retry.
pub(crate) struct ContextSeed {
    pub execution_id: ExecutionId,
    pub parameters: Arc<HashMap<String, Value>>,
    pub variables: VariableStore,
    pub resources: Arc<SharedResources>,
    pub screenshots: Option<ScreenshotTx>,
    pub screenshot_dir: Option<PathBuf>,
    pub redactor: Redactor,
    pub metadata: Arc<HashMap<String, String>>,
    pub run_token: CancellationToken,
}

impl ContextSeed {
    fn step_context(&self, step_id: &str, attempt_token: CancellationToken) -> StepContext {
        StepContext::new(
            self.execution_id.clone(),
            step_id,
            Arc::clone(&self.parameters),
            self.variables.clone(),
            attempt_token,
            Arc::clone(&self.resources),
            self.screenshots.clone(),
            self.screenshot_dir.clone(),
            self.redactor.clone(),
        )
        .with_metadata(Arc::clone(&self.metadata))
    }
}

enum AttemptOutcome {
    Success(StepOutput),
    Error(StepError),
    RunCancelled,
    Skip(SkipKind),
}

pub(crate) struct StepExecutor {
    cancel_grace: Duration,
    redactor: Redactor,
}

impl StepExecutor {
    pub fn new(cancel_grace: Duration, redactor: Redactor) -> Self {
        Self {
            cancel_grace,
            redactor,
        }
    }

    /// Drive one step to a terminal outcome.
    ///
    /// `on_attempt` fires before every handler invocation (attempt numbers
    /// start at 1) so the engine can surface retry progress.
    pub async fn execute(
        &self,
        step: &Step,
        handler: Arc<dyn StepHandler>,
        params: &StepParams,
        seed: &ContextSeed,
        signals: &ControlSignals,
        mut on_attempt: impl FnMut(u32),
    ) -> (StepOutcome, u32) {
        let timeout = Duration::from_secs(step.effective_timeout_seconds());
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            on_attempt(attempt);
            let outcome = self
                .attempt(step, handler.as_ref(), params, seed, signals, timeout)
                .await;

            match outcome {
                AttemptOutcome::Success(output) => return (StepOutcome::Success(output), attempt),
                AttemptOutcome::RunCancelled => return (StepOutcome::Cancelled, attempt),
                AttemptOutcome::Skip(kind) => return (StepOutcome::Skipped(kind), attempt),
                AttemptOutcome::Error(error) => {
                    if attempt <= step.retry_count {
                        tracing::debug!(
                            step = %step.id,
                            attempt,
                            error = %error,
                            delay_s = step.retry_delay_seconds,
                            "step attempt failed, retrying"
                        );
                        // Retry delay is itself interruptible; cancel wins
                        // over a simultaneous skip.
                        tokio::select! {
                            biased;
                            _ = signals.cancel_token().cancelled() => {
                                return (StepOutcome::Cancelled, attempt);
                            }
                            kind = signals.skip_requested() => {
                                return (StepOutcome::Skipped(kind), attempt);
                            }
                            _ = tokio::time::sleep(Duration::from_secs(step.retry_delay_seconds)) => {}
                        }
                        continue;
                    }
                    return (StepOutcome::Failed(error), attempt);
                }
            }
        }
    }

    async fn attempt(
        &self,
        step: &Step,
        handler: &dyn StepHandler,
        params: &StepParams,
        seed: &ContextSeed,
        signals: &ControlSignals,
        timeout: Duration,
    ) -> AttemptOutcome {
        let token = seed.run_token.child_token();
        let ctx = seed.step_context(&step.id, token.clone());
        let mut invocation = std::pin::pin!(handler.execute(params, &ctx));

        // Biased so the observation order is deterministic: cancel first,
        // then a finished handler, then timeout, then skip.
        tokio::select! {
            biased;
            _ = signals.cancel_token().cancelled() => {
                token.cancel();
                AttemptOutcome::RunCancelled
            }
            result = &mut invocation => match result {
                Ok(output) => AttemptOutcome::Success(output),
                Err(e) if signals.is_cancelled() => {
                    tracing::debug!(step = %step.id, error = %e, "handler ended under cancellation");
                    AttemptOutcome::RunCancelled
                }
                Err(e) => AttemptOutcome::Error(StepError::new(
                    e.kind(),
                    self.redactor.redact(&e.to_string()),
                )),
            },
            _ = tokio::time::sleep(timeout) => {
                // Cancel the in-flight attempt cooperatively, then give it a
                // bounded grace to unwind. Either way the attempt is a timeout.
                token.cancel();
                let _ = tokio::time::timeout(self.cancel_grace, &mut invocation).await;
                AttemptOutcome::Error(StepError::timeout(timeout.as_secs()))
            }
            kind = signals.skip_requested() => {
                token.cancel();
                AttemptOutcome::Skip(kind)
            }
        }
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
