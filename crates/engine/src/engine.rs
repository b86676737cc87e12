// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The per-run engine.
//!
//! Drives one playbook execution to a terminal state: resolves step
//! inputs, dispatches to handlers through the step executor, honors the
//! control signals at every boundary, and guarantees resource teardown on
//! every exit path.

use crate::broadcast::Broadcaster;
use crate::config::EngineConfig;
use crate::executor::{ContextSeed, StepExecutor, StepOutcome};
use crate::signal::{ControlSignals, SkipKind};
use crate::state::RunState;
use parking_lot::Mutex;
use pilot_adapters::{
    BrowserFactory, CredentialVault, GatewayFactory, HandlerRegistry, ScreenshotTx,
    SharedResources, VariableStore,
};
use pilot_core::{
    Clock, ErrorKind, Event, ExecutionId, ExecutionSnapshot, ExecutionStatus, Redactor,
    ScreenshotFrame, StepError, StepResult, StepStatus,
};
use pilot_playbook::{merge_parameters, OnFailure, ParameterType, Playbook, ResolveContext};
use pilot_storage::ExecutionStore;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Message recorded when a run is cancelled without a more specific cause.
const CANCELLED_MESSAGE: &str = "execution cancelled";

/// Shared collaborators an engine needs; cloned per run by the manager.
pub struct EngineDeps<C: Clock> {
    pub registry: Arc<HandlerRegistry>,
    pub vault: CredentialVault,
    pub store: Arc<ExecutionStore>,
    pub broadcaster: Arc<Broadcaster>,
    pub clock: C,
    pub browser_factory: Option<Arc<dyn BrowserFactory>>,
    pub gateway_factory: Option<Arc<dyn GatewayFactory>>,
    pub config: EngineConfig,
}

impl<C: Clock> Clone for EngineDeps<C> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            vault: self.vault.clone(),
            store: Arc::clone(&self.store),
            broadcaster: Arc::clone(&self.broadcaster),
            clock: self.clock.clone(),
            browser_factory: self.browser_factory.clone(),
            gateway_factory: self.gateway_factory.clone(),
            config: self.config.clone(),
        }
    }
}

/// Everything that defines one run.
pub struct RunRequest {
    pub execution_id: ExecutionId,
    pub playbook: Playbook,
    pub playbook_path: String,
    pub parameters: HashMap<String, Value>,
    pub debug_mode: bool,
    pub metadata: HashMap<String, String>,
    /// Externally-owned cancel token (nested runs); fresh otherwise.
    pub cancel: Option<CancellationToken>,
}

/// One live playbook execution.
pub struct Engine<C: Clock> {
    execution_id: ExecutionId,
    playbook: Playbook,
    user_parameters: HashMap<String, Value>,
    state: RunState,
    signals: ControlSignals,
    variables: VariableStore,
    resources: Arc<SharedResources>,
    redactor: Redactor,
    screenshots: ScreenshotTx,
    screenshot_rx: Mutex<Option<mpsc::Receiver<ScreenshotFrame>>>,
    deps: EngineDeps<C>,
}

impl<C: Clock> Engine<C> {
    pub fn new(deps: EngineDeps<C>, request: RunRequest) -> Arc<Self> {
        let signals = match request.cancel {
            Some(token) => ControlSignals::with_cancel_token(token, request.debug_mode),
            None => ControlSignals::new(request.debug_mode),
        };
        let redactor = Redactor::new();
        deps.vault.register_secrets(&redactor);

        let (frame_tx, frame_rx) = mpsc::channel(deps.config.screenshot_buffer);
        let screenshots = ScreenshotTx::new(frame_tx, deps.config.screenshot_min_interval);
        let resources = Arc::new(SharedResources::new(
            deps.browser_factory.clone(),
            deps.gateway_factory.clone(),
            Some(screenshots.clone()),
        ));
        let state = RunState::new(
            request.execution_id.clone(),
            &request.playbook,
            request.playbook_path,
            request.debug_mode,
            request.metadata,
        );

        Arc::new(Self {
            execution_id: request.execution_id,
            playbook: request.playbook,
            user_parameters: request.parameters,
            state,
            signals,
            variables: VariableStore::new(),
            resources,
            redactor,
            screenshots,
            screenshot_rx: Mutex::new(Some(frame_rx)),
            deps,
        })
    }

    pub fn execution_id(&self) -> &ExecutionId {
        &self.execution_id
    }

    pub fn signals(&self) -> &ControlSignals {
        &self.signals
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn snapshot(&self) -> ExecutionSnapshot {
        self.state.snapshot()
    }

    /// Cancel with a specific run error (watchdog timeout). The error is
    /// kept only if the run has not already recorded one.
    pub fn cancel_with_error(&self, message: &str) {
        self.state.update(|s| {
            if s.error.is_none() {
                s.error = Some(message.to_string());
            }
        });
        self.signals.cancel();
    }

    /// Drive the run to a terminal state. Resource teardown and the final
    /// event happen on every path out of here.
    pub async fn run(self: Arc<Self>) {
        let forwarder = self.spawn_frame_forwarder();
        self.run_inner().await;
        self.finalize(forwarder).await;
    }

    // ---- event/persistence plumbing ------------------------------------

    fn emit(&self, snapshot: ExecutionSnapshot) {
        self.deps.broadcaster.publish(&Event::ExecutionUpdate(snapshot));
    }

    fn persist_execution(&self, snapshot: &ExecutionSnapshot) {
        if let Err(e) = self.deps.store.record_execution(snapshot) {
            tracing::warn!(execution_id = %self.execution_id, error = %e, "persist execution failed");
        }
    }

    fn persist_step(&self, result: &StepResult) {
        let at = self.deps.clock.epoch_ms();
        if let Err(e) = self.deps.store.record_step(&self.execution_id, result, at) {
            tracing::warn!(execution_id = %self.execution_id, error = %e, "persist step failed");
        }
    }

    /// Reads frames off the handler-facing channel and fans them out.
    /// Kept separate from the handlers so a saturated broadcaster can
    /// never block a step.
    fn spawn_frame_forwarder(&self) -> Option<(CancellationToken, JoinHandle<()>)> {
        let mut rx = self.screenshot_rx.lock().take()?;
        let stop = CancellationToken::new();
        let broadcaster = Arc::clone(&self.deps.broadcaster);
        let handle = tokio::spawn({
            let stop = stop.clone();
            async move {
                loop {
                    tokio::select! {
                        biased;
                        frame = rx.recv() => match frame {
                            Some(frame) => broadcaster.publish(&Event::ScreenshotFrame(frame)),
                            None => break,
                        },
                        _ = stop.cancelled() => {
                            // Flush frames accepted before the emitter was
                            // disabled, then stop for good.
                            while let Ok(frame) = rx.try_recv() {
                                broadcaster.publish(&Event::ScreenshotFrame(frame));
                            }
                            break;
                        }
                    }
                }
            }
        });
        Some((stop, handle))
    }

    // ---- preflight -----------------------------------------------------

    /// Validate before the run reaches `running`: required parameters,
    /// known step types, resolvable credential references.
    fn preflight(&self) -> Result<(), String> {
        let merged = merge_parameters(&self.playbook.parameters, &self.user_parameters)
            .map_err(|e| e.to_string())?;

        for step in &self.playbook.steps {
            if !self.deps.registry.contains(&step.step_type) {
                return Err(format!("unknown step type: {}", step.step_type));
            }
        }
        for spec in &self.playbook.parameters {
            if spec.param_type != ParameterType::Credential {
                continue;
            }
            if let Some(Value::String(name)) = merged.get(&spec.name) {
                if !self.deps.vault.contains(name) {
                    return Err(format!("unknown credential: {name}"));
                }
            }
        }

        self.state.update(|s| s.parameters = merged);
        Ok(())
    }

    // ---- the run loop --------------------------------------------------

    async fn run_inner(&self) {
        if let Err(message) = self.preflight() {
            tracing::warn!(execution_id = %self.execution_id, %message, "preflight failed");
            self.state.update(|s| {
                s.status = ExecutionStatus::Failed;
                s.error = Some(message);
            });
            return;
        }

        let started = self.state.update(|s| {
            s.status = ExecutionStatus::Running;
            s.started_at_ms = Some(self.deps.clock.epoch_ms());
        });
        self.persist_execution(&started);
        self.emit(started);
        tracing::info!(
            execution_id = %self.execution_id,
            playbook = %self.playbook.name,
            steps = self.playbook.steps.len(),
            "execution started"
        );

        let executor = StepExecutor::new(self.deps.config.cancel_grace, self.redactor.clone());
        let total = self.playbook.steps.len();
        let mut index = 0usize;

        'steps: while index < total {
            // Boundary: observe signals in fixed order.
            loop {
                if self.signals.is_cancelled() {
                    self.mark_cancelled();
                    break 'steps;
                }
                if self.signals.take_skip_back() {
                    index = index.saturating_sub(1);
                    let snapshot = self.state.update(|s| {
                        s.current_step_index = index;
                        if let Some(result) = s.step_results.get_mut(index) {
                            result.reset();
                        }
                    });
                    if let Some(result) = snapshot.step_results.get(index) {
                        self.persist_step(result);
                    }
                    self.emit(snapshot);
                    continue;
                }
                if self.signals.take_skip_forward() {
                    let snapshot = self.state.update(|s| {
                        s.current_step_index = index;
                        if let Some(result) = s.step_results.get_mut(index) {
                            result.status = StepStatus::Skipped;
                            result.completed_at_ms = Some(self.deps.clock.epoch_ms());
                        }
                    });
                    if let Some(result) = snapshot.step_results.get(index) {
                        self.persist_step(result);
                    }
                    self.emit(snapshot);
                    index += 1;
                    continue 'steps;
                }
                if self.signals.is_paused() {
                    if self.state.status() != ExecutionStatus::Paused {
                        let snapshot = self.state.update(|s| s.status = ExecutionStatus::Paused);
                        self.emit(snapshot);
                    }
                    self.wait_while_paused().await;
                    continue;
                }
                if self.state.status() != ExecutionStatus::Running {
                    let snapshot = self.state.update(|s| {
                        s.status = ExecutionStatus::Running;
                        s.debug_mode = self.signals.is_debug();
                    });
                    self.emit(snapshot);
                }
                break;
            }

            let step = &self.playbook.steps[index];

            // Resolve inputs; a reference failure is a step failure subject
            // to on_failure (retrying a bad reference cannot help).
            let resolved = match self.resolve_step_inputs(index) {
                Ok(map) => map,
                Err(error) => {
                    if self.record_step_failure(index, error) {
                        break 'steps;
                    }
                    index += 1;
                    continue 'steps;
                }
            };

            let Some(handler) = self.deps.registry.get(&step.step_type) else {
                // Preflight guarantees registration; reaching here is a fault.
                let error = StepError::new(
                    ErrorKind::Internal,
                    format!("handler vanished for step type {}", step.step_type),
                );
                if self.record_step_failure(index, error) {
                    break 'steps;
                }
                index += 1;
                continue 'steps;
            };

            let snapshot = self.state.update(|s| {
                s.current_step_index = index;
                if let Some(result) = s.step_results.get_mut(index) {
                    result.status = StepStatus::Running;
                    result.started_at_ms = Some(self.deps.clock.epoch_ms());
                    result.completed_at_ms = None;
                    result.error = None;
                    result.attempts = 0;
                }
            });
            if let Some(result) = snapshot.step_results.get(index) {
                self.persist_step(result);
            }
            self.emit(snapshot);

            let seed = self.context_seed();
            let (outcome, _attempts) = executor
                .execute(step, handler, &resolved, &seed, &self.signals, |attempt| {
                    let snapshot = self.state.update_step(index, |r| r.attempts = attempt);
                    if attempt > 1 {
                        if let Some(result) = snapshot.step_results.get(index) {
                            self.persist_step(result);
                        }
                        self.emit(snapshot);
                    }
                })
                .await;

            match outcome {
                StepOutcome::Success(output) => {
                    let now = self.deps.clock.epoch_ms();
                    let snapshot = self.state.update_step(index, |r| {
                        r.status = StepStatus::Success;
                        r.completed_at_ms = Some(now);
                        if let Some(path) = output.get("screenshot_path").and_then(Value::as_str) {
                            r.screenshot_path = Some(PathBuf::from(path));
                        }
                        r.output = output;
                    });
                    if let Some(result) = snapshot.step_results.get(index) {
                        self.persist_step(result);
                    }
                    self.emit(snapshot);
                }
                StepOutcome::Failed(error) => {
                    if self.record_step_failure(index, error) {
                        break 'steps;
                    }
                }
                StepOutcome::Cancelled => {
                    let now = self.deps.clock.epoch_ms();
                    let snapshot = self.state.update_step(index, |r| {
                        r.status = StepStatus::Failed;
                        r.error = Some(StepError::cancelled());
                        r.completed_at_ms = Some(now);
                    });
                    if let Some(result) = snapshot.step_results.get(index) {
                        self.persist_step(result);
                    }
                    self.emit(snapshot);
                    self.mark_cancelled();
                    break 'steps;
                }
                StepOutcome::Skipped(kind) => {
                    let now = self.deps.clock.epoch_ms();
                    let snapshot = self.state.update_step(index, |r| {
                        r.status = StepStatus::Skipped;
                        r.completed_at_ms = Some(now);
                    });
                    if let Some(result) = snapshot.step_results.get(index) {
                        self.persist_step(result);
                    }
                    self.emit(snapshot);
                    if kind == SkipKind::Back {
                        index = index.saturating_sub(1);
                        let snapshot = self.state.update(|s| {
                            s.current_step_index = index;
                            if let Some(result) = s.step_results.get_mut(index) {
                                result.reset();
                            }
                        });
                        if let Some(result) = snapshot.step_results.get(index) {
                            self.persist_step(result);
                        }
                        self.emit(snapshot);
                        continue 'steps;
                    }
                }
            }

            index += 1;

            // Debug mode: hold after every step completion until resumed.
            if self.signals.is_debug() && !self.signals.is_cancelled() {
                self.signals.pause();
                let snapshot = self.state.update(|s| {
                    s.status = ExecutionStatus::Paused;
                    s.debug_mode = true;
                });
                self.emit(snapshot);
                self.wait_while_paused().await;
                if self.signals.is_cancelled() {
                    self.mark_cancelled();
                    break 'steps;
                }
            }
        }
    }

    /// Record a failed step and apply its on_failure policy.
    ///
    /// Returns `true` when the run must abort.
    fn record_step_failure(&self, index: usize, error: StepError) -> bool {
        let Some(step) = self.playbook.steps.get(index) else {
            return true;
        };
        let now = self.deps.clock.epoch_ms();
        let message = error.message.clone();
        let abort = step.on_failure == OnFailure::Abort;
        let status = match step.on_failure {
            OnFailure::Skip => StepStatus::Skipped,
            _ => StepStatus::Failed,
        };
        tracing::warn!(
            execution_id = %self.execution_id,
            step = %step.id,
            policy = %step.on_failure,
            error = %error,
            "step failed"
        );
        let snapshot = self.state.update(|s| {
            s.current_step_index = index;
            if let Some(result) = s.step_results.get_mut(index) {
                result.status = status;
                result.error = Some(error);
                result.completed_at_ms = Some(now);
            }
        });
        if let Some(result) = snapshot.step_results.get(index) {
            self.persist_step(result);
        }
        self.emit(snapshot);
        if abort {
            // The terminal update itself is emitted once, in finalize,
            // after the frame flush.
            self.state.update(|s| {
                s.status = ExecutionStatus::Failed;
                s.error = Some(message);
            });
        }
        abort
    }

    fn mark_cancelled(&self) {
        self.state.update(|s| {
            s.status = ExecutionStatus::Cancelled;
            if s.error.is_none() {
                s.error = Some(CANCELLED_MESSAGE.to_string());
            }
        });
    }

    /// Block until resume or cancel. Skips asserted while paused stay
    /// pending and take effect at the boundary after resume.
    async fn wait_while_paused(&self) {
        loop {
            if self.signals.is_cancelled() || !self.signals.is_paused() {
                return;
            }
            tokio::select! {
                _ = self.signals.changed() => {}
                _ = self.signals.cancel_token().cancelled() => {}
            }
        }
    }

    fn resolve_step_inputs(
        &self,
        index: usize,
    ) -> Result<pilot_adapters::StepParams, StepError> {
        let step = &self.playbook.steps[index];
        let credentials = self.deps.vault.snapshot();
        let parameters = self.state.parameters();
        let variables = self.variables.snapshot();
        let outputs = self.state.step_outputs();
        let ctx = ResolveContext {
            parameters: &parameters,
            variables: &variables,
            credentials: &credentials,
            step_outputs: &outputs,
            redactor: &self.redactor,
        };
        pilot_playbook::resolve_map(&step.parameters, &ctx).map_err(|e| e.to_step_error())
    }

    fn context_seed(&self) -> ContextSeed {
        ContextSeed {
            execution_id: self.execution_id.clone(),
            parameters: Arc::new(self.state.parameters()),
            variables: self.variables.clone(),
            resources: Arc::clone(&self.resources),
            screenshots: Some(self.screenshots.clone()),
            screenshot_dir: Some(self.deps.store.screenshot_dir(&self.execution_id)),
            redactor: self.redactor.clone(),
            metadata: {
                // Handlers (the nested runner in particular) see the run
                // metadata plus this run's own playbook path.
                let (mut metadata, path) =
                    self.state.read(|s| (s.metadata.clone(), s.playbook_path.clone()));
                metadata.insert(crate::nested::META_PLAYBOOK_PATH.to_string(), path);
                Arc::new(metadata)
            },
            run_token: self.signals.cancel_token().clone(),
        }
    }

    /// Tear down on every exit path: no frame may trail the terminal
    /// event, and lazily-created resources must be released.
    async fn finalize(&self, forwarder: Option<(CancellationToken, JoinHandle<()>)>) {
        self.screenshots.disable();
        if let Some((stop, handle)) = forwarder {
            stop.cancel();
            let _ = handle.await;
        }
        self.resources.teardown().await;

        let snapshot = self.state.update(|s| {
            if !s.status.is_terminal() {
                s.status = ExecutionStatus::Completed;
            }
            s.completed_at_ms = Some(self.deps.clock.epoch_ms());
        });
        self.emit(snapshot.clone());
        if let Err(e) = self.deps.store.finalize(&snapshot) {
            tracing::warn!(execution_id = %self.execution_id, error = %e, "finalize persist failed");
        }
        tracing::info!(
            execution_id = %self.execution_id,
            status = %snapshot.status,
            error = snapshot.error.as_deref().unwrap_or(""),
            "execution finished"
        );
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
