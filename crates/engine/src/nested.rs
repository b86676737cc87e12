// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Nested playbook invocation (`playbook.run`).
//!
//! Runs a verified playbook as a single step of its parent. The child
//! engine shares the parent's broadcaster and store, carries its own
//! execution id, and chains its cancellation to the parent step's token.

use crate::broadcast::Broadcaster;
use crate::config::EngineConfig;
use crate::engine::{Engine, EngineDeps, RunRequest};
use async_trait::async_trait;
use pilot_adapters::{
    handler::required_str, BrowserFactory, CredentialVault, GatewayFactory, HandlerRegistry,
    HandlerError, StepContext, StepHandler, StepParams,
};
use pilot_core::{Clock, ExecutionId, ExecutionStatus, StepOutput};
use pilot_storage::ExecutionStore;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock, Weak};

/// Maximum nested invocation depth.
pub const MAX_NESTING_DEPTH: u32 = 3;

pub(crate) const META_PARENT_EXECUTION: &str = "parent_execution_id";
pub(crate) const META_NESTING_DEPTH: &str = "nesting_depth";
pub(crate) const META_PARENT_CHAIN: &str = "parent_chain";
pub(crate) const META_PLAYBOOK_PATH: &str = "playbook_path";

struct NestedDeps<C: Clock> {
    /// Weak to break the registry → handler → registry cycle.
    registry: Weak<HandlerRegistry>,
    vault: CredentialVault,
    store: Arc<ExecutionStore>,
    broadcaster: Arc<Broadcaster>,
    clock: C,
    browser_factory: Option<Arc<dyn BrowserFactory>>,
    gateway_factory: Option<Arc<dyn GatewayFactory>>,
    config: EngineConfig,
}

/// Handler hosting a child engine per invocation.
pub struct PlaybookRunHandler<C: Clock> {
    binding: OnceLock<NestedDeps<C>>,
}

impl<C: Clock> PlaybookRunHandler<C> {
    pub fn new() -> Self {
        Self {
            binding: OnceLock::new(),
        }
    }

    /// Late-bind the finished registry and engine deps (the registry
    /// cannot exist before this handler is registered into it).
    pub fn bind(&self, registry: &Arc<HandlerRegistry>, deps: &EngineDeps<C>) {
        let _ = self.binding.set(NestedDeps {
            registry: Arc::downgrade(registry),
            vault: deps.vault.clone(),
            store: Arc::clone(&deps.store),
            broadcaster: Arc::clone(&deps.broadcaster),
            clock: deps.clock.clone(),
            browser_factory: deps.browser_factory.clone(),
            gateway_factory: deps.gateway_factory.clone(),
            config: deps.config.clone(),
        });
    }

    fn resolve_target(parent_path: &str, target: &str) -> PathBuf {
        let target_path = Path::new(target);
        if target_path.is_absolute() || parent_path.is_empty() {
            return target_path.to_path_buf();
        }
        match Path::new(parent_path).parent() {
            Some(dir) => dir.join(target_path),
            None => target_path.to_path_buf(),
        }
    }
}

impl<C: Clock> Default for PlaybookRunHandler<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<C: Clock> StepHandler for PlaybookRunHandler<C> {
    fn step_type(&self) -> &str {
        "playbook.run"
    }

    async fn execute(
        &self,
        params: &StepParams,
        ctx: &StepContext,
    ) -> Result<StepOutput, HandlerError> {
        let Some(deps) = self.binding.get() else {
            return Err(HandlerError::Message(
                "nested playbook runner is not bound".to_string(),
            ));
        };
        let Some(registry) = deps.registry.upgrade() else {
            return Err(HandlerError::Message(
                "handler registry is gone".to_string(),
            ));
        };

        let target = required_str(params, "playbook")?;
        let parent_path = ctx
            .metadata()
            .get(META_PLAYBOOK_PATH)
            .cloned()
            .unwrap_or_default();
        let path = Self::resolve_target(&parent_path, target);
        let path_display = path.display().to_string();

        let playbook = pilot_playbook::load_playbook(&path)
            .map_err(|e| HandlerError::Message(e.to_string()))?;
        if !playbook.is_verified() {
            return Err(HandlerError::Verification(path_display));
        }

        let depth: u32 = ctx
            .metadata()
            .get(META_NESTING_DEPTH)
            .and_then(|d| d.parse().ok())
            .unwrap_or(0);
        if depth + 1 > MAX_NESTING_DEPTH {
            return Err(HandlerError::NestingDepth(format!(
                "depth {} exceeds the limit of {MAX_NESTING_DEPTH}",
                depth + 1
            )));
        }

        let mut chain: Vec<String> = ctx
            .metadata()
            .get(META_PARENT_CHAIN)
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or_default();
        if !parent_path.is_empty() {
            chain.push(parent_path);
        }
        if chain.contains(&path_display) {
            return Err(HandlerError::CircularDependency(path_display));
        }

        // The parent step's resolved parameters become the child's user
        // parameters; extras are ignored by the child's merge.
        let child_parameters: HashMap<String, Value> = params
            .iter()
            .filter(|(key, _)| key.as_str() != "playbook")
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        let mut metadata = HashMap::new();
        metadata.insert(
            META_PARENT_EXECUTION.to_string(),
            ctx.execution_id().to_string(),
        );
        metadata.insert(META_NESTING_DEPTH.to_string(), (depth + 1).to_string());
        metadata.insert(
            META_PARENT_CHAIN.to_string(),
            serde_json::to_string(&chain).unwrap_or_default(),
        );

        let child_id = ExecutionId::new();
        let engine = Engine::new(
            EngineDeps {
                registry,
                vault: deps.vault.clone(),
                store: Arc::clone(&deps.store),
                broadcaster: Arc::clone(&deps.broadcaster),
                clock: deps.clock.clone(),
                browser_factory: deps.browser_factory.clone(),
                gateway_factory: deps.gateway_factory.clone(),
                config: deps.config.clone(),
            },
            RunRequest {
                execution_id: child_id.clone(),
                playbook,
                playbook_path: path_display,
                parameters: child_parameters,
                // Debug mode is not inherited; the child runs to completion
                debug_mode: false,
                metadata,
                cancel: Some(ctx.cancel_token().child_token()),
            },
        );
        tracing::info!(
            parent = %ctx.execution_id(),
            child = %child_id,
            depth = depth + 1,
            "nested playbook starting"
        );

        // Spawned so finalize still runs if this handler is dropped by a
        // timeout; cancellation reaches the child through the token chain.
        let driver = tokio::spawn(Arc::clone(&engine).run());
        driver
            .await
            .map_err(|e| HandlerError::Message(format!("nested run task failed: {e}")))?;

        let snapshot = engine.snapshot();
        let steps_executed = snapshot
            .step_results
            .iter()
            .filter(|r| r.status.is_terminal())
            .count();
        let completed = snapshot.status == ExecutionStatus::Completed;

        if !completed {
            let reason = snapshot
                .error
                .unwrap_or_else(|| format!("finished {}", snapshot.status));
            return Err(HandlerError::Message(format!(
                "nested playbook {} {}: {}",
                snapshot.playbook_name, snapshot.status, reason
            )));
        }

        let mut output = StepOutput::new();
        output.insert("status".to_string(), Value::from(snapshot.status.to_string()));
        output.insert("steps_executed".to_string(), Value::from(steps_executed));
        output.insert("completed".to_string(), Value::from(completed));
        output.insert("execution_id".to_string(), Value::from(child_id.to_string()));
        Ok(output)
    }
}

#[cfg(test)]
#[path = "nested_tests.rs"]
mod tests;
