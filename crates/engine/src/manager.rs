// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The execution manager.
//!
//! Registry and lifecycle owner for every live engine: starts runs,
//! routes control signals, unions live state with history, reaps
//! completed runs after their TTL, and bounds each run with a watchdog.

use crate::broadcast::{Broadcaster, Delivery};
use crate::config::{EngineConfig, ManagerConfig};
use crate::engine::{Engine, EngineDeps, RunRequest};
use crate::nested::PlaybookRunHandler;
use parking_lot::Mutex;
use pilot_adapters::{
    BrowserFactory, CredentialVault, GatewayFactory, HandlerRegistry, RegistryError, StepHandler,
};
use pilot_core::{
    Clock, ControlKind, Event, ExecutionId, ExecutionSnapshot, ExecutionStatus, SubscriberId,
    SystemClock,
};
use pilot_playbook::PlaybookError;
use pilot_storage::{ExecutionStore, StoreError};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Bound on waiting for driving tasks during shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Errors from manager operations.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("unknown execution: {0}")]
    NotFound(ExecutionId),

    #[error("execution {0} is not terminal")]
    NotTerminal(ExecutionId),

    #[error(transparent)]
    Playbook(#[from] PlaybookError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Options for starting a run.
#[derive(Debug, Clone, Default)]
pub struct StartOptions {
    pub debug_mode: bool,
    pub metadata: HashMap<String, String>,
}

impl StartOptions {
    pilot_core::setters! {
        set {
            debug_mode: bool,
            metadata: HashMap<String, String>,
        }
    }
}

struct RunHandle<C: Clock> {
    engine: Arc<Engine<C>>,
    driver: JoinHandle<()>,
    watchdog: JoinHandle<()>,
}

/// Process-wide owner of all live executions.
pub struct ExecutionManager<C: Clock = SystemClock> {
    live: Mutex<HashMap<ExecutionId, RunHandle<C>>>,
    deps: EngineDeps<C>,
    config: ManagerConfig,
    shutdown: CancellationToken,
}

impl<C: Clock> ExecutionManager<C> {
    /// Compose the manager and its handler registry.
    ///
    /// `extra_handlers` join the built-ins; the nested `playbook.run`
    /// handler is wired here because it needs the finished registry to
    /// instantiate child engines.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: ManagerConfig,
        engine_config: EngineConfig,
        clock: C,
        store: Arc<ExecutionStore>,
        vault: CredentialVault,
        broadcaster: Arc<Broadcaster>,
        browser_factory: Option<Arc<dyn BrowserFactory>>,
        gateway_factory: Option<Arc<dyn GatewayFactory>>,
        extra_handlers: Vec<Arc<dyn StepHandler>>,
    ) -> Result<Arc<Self>, RegistryError> {
        let mut registry = HandlerRegistry::with_builtins();
        for handler in extra_handlers {
            registry.register(handler)?;
        }
        let nested = Arc::new(PlaybookRunHandler::<C>::new());
        registry.register(Arc::clone(&nested) as Arc<dyn StepHandler>)?;
        let registry = Arc::new(registry);

        let deps = EngineDeps {
            registry: Arc::clone(&registry),
            vault,
            store,
            broadcaster,
            clock,
            browser_factory,
            gateway_factory,
            config: engine_config,
        };
        nested.bind(&registry, &deps);

        Ok(Arc::new(Self {
            live: Mutex::new(HashMap::new()),
            deps,
            config,
            shutdown: CancellationToken::new(),
        }))
    }

    /// Spawn the TTL reaper and broadcaster housekeeping.
    pub fn spawn_background(self: &Arc<Self>) {
        let manager = Arc::clone(self);
        tokio::spawn(async move { manager.run_reaper().await });
        let broadcaster = Arc::clone(&self.deps.broadcaster);
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move { broadcaster.run_housekeeping(shutdown).await });
    }

    /// Load a playbook and start driving it. Returns immediately with the
    /// new execution id.
    ///
    /// A playbook that fails to load is still recorded as a failed
    /// execution so history shows the attempt.
    pub fn start(
        self: &Arc<Self>,
        playbook_path: &Path,
        parameters: HashMap<String, Value>,
        options: StartOptions,
    ) -> Result<ExecutionId, ManagerError> {
        let execution_id = ExecutionId::new();
        let playbook = match pilot_playbook::load_playbook(playbook_path) {
            Ok(playbook) => playbook,
            Err(e) => {
                self.record_load_failure(&execution_id, playbook_path, &e);
                return Err(e.into());
            }
        };

        let engine = Engine::new(
            self.deps.clone(),
            RunRequest {
                execution_id: execution_id.clone(),
                playbook,
                playbook_path: playbook_path.display().to_string(),
                parameters,
                debug_mode: options.debug_mode,
                metadata: options.metadata,
                cancel: None,
            },
        );

        let driver = tokio::spawn(Arc::clone(&engine).run());
        let watchdog = self.spawn_watchdog(Arc::clone(&engine));
        self.live.lock().insert(
            execution_id.clone(),
            RunHandle {
                engine,
                driver,
                watchdog,
            },
        );
        tracing::info!(execution_id = %execution_id, path = %playbook_path.display(), "execution registered");
        Ok(execution_id)
    }

    fn spawn_watchdog(&self, engine: Arc<Engine<C>>) -> JoinHandle<()> {
        let limit = self.config.max_run_duration;
        tokio::spawn(async move {
            tokio::time::sleep(limit).await;
            if !engine.state().is_terminal() {
                tracing::warn!(
                    execution_id = %engine.execution_id(),
                    limit_s = limit.as_secs(),
                    "watchdog fired, cancelling run"
                );
                engine.cancel_with_error("execution timeout");
            }
        })
    }

    fn record_load_failure(
        &self,
        execution_id: &ExecutionId,
        playbook_path: &Path,
        error: &PlaybookError,
    ) {
        let name = playbook_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let now = self.deps.clock.epoch_ms();
        let snapshot = ExecutionSnapshot {
            execution_id: execution_id.clone(),
            playbook_name: name,
            playbook_path: playbook_path.display().to_string(),
            status: ExecutionStatus::Failed,
            current_step_index: 0,
            total_steps: 0,
            step_results: Vec::new(),
            error: Some(error.to_string()),
            debug_mode: false,
            started_at_ms: Some(now),
            completed_at_ms: Some(now),
            metadata: HashMap::new(),
        };
        if let Err(e) = self.deps.store.finalize(&snapshot) {
            tracing::warn!(execution_id = %execution_id, error = %e, "failed to record load failure");
        }
    }

    /// O(1) lookup of a live engine.
    pub fn get(&self, execution_id: &ExecutionId) -> Option<Arc<Engine<C>>> {
        self.live
            .lock()
            .get(execution_id)
            .map(|h| Arc::clone(&h.engine))
    }

    /// Deliver a control signal to a live run.
    pub fn signal(
        &self,
        execution_id: &ExecutionId,
        kind: ControlKind,
    ) -> Result<(), ManagerError> {
        let engine = self
            .get(execution_id)
            .ok_or_else(|| ManagerError::NotFound(execution_id.clone()))?;
        tracing::debug!(execution_id = %execution_id, signal = %kind, "control signal");
        engine.signals().apply(kind);
        Ok(())
    }

    /// Union of live snapshots and recorded history, de-duplicated by
    /// execution id (live wins), newest first.
    pub fn list(&self, status: Option<ExecutionStatus>) -> Vec<ExecutionSnapshot> {
        let mut out: Vec<ExecutionSnapshot> = self
            .live
            .lock()
            .values()
            .map(|h| h.engine.snapshot())
            .filter(|s| status.is_none_or(|wanted| s.status == wanted))
            .collect();
        let live_ids: HashSet<ExecutionId> =
            out.iter().map(|s| s.execution_id.clone()).collect();
        for snapshot in self.deps.store.list(status) {
            if !live_ids.contains(&snapshot.execution_id) {
                out.push(snapshot);
            }
        }
        out.sort_by(|a, b| b.started_at_ms.cmp(&a.started_at_ms));
        out
    }

    /// Snapshot of one run: live engine if present, history otherwise.
    pub fn snapshot(&self, execution_id: &ExecutionId) -> Option<ExecutionSnapshot> {
        if let Some(engine) = self.get(execution_id) {
            return Some(engine.snapshot());
        }
        self.deps.store.get(execution_id)
    }

    /// Delete a terminal execution: live handle, history rows, and
    /// screenshot files. Non-terminal runs must be cancelled first.
    pub async fn delete(&self, execution_id: &ExecutionId) -> Result<(), ManagerError> {
        let handle = {
            let mut live = self.live.lock();
            let terminal = live
                .get(execution_id)
                .map(|h| h.engine.state().is_terminal());
            match terminal {
                Some(false) => {
                    return Err(ManagerError::NotTerminal(execution_id.clone()));
                }
                Some(true) => live.remove(execution_id),
                None => None,
            }
        };
        if let Some(handle) = handle {
            handle.watchdog.abort();
            // Let finalize persist before the rows are removed
            let _ = handle.driver.await;
        }
        self.deps.store.delete(execution_id)?;
        tracing::info!(execution_id = %execution_id, "execution deleted");
        Ok(())
    }

    /// Register a subscriber. Late joiners receive a synthesized update
    /// for every currently-active run (never past screenshots).
    pub fn subscribe(&self) -> (SubscriberId, mpsc::Receiver<Delivery>) {
        let (id, rx) = self.deps.broadcaster.subscribe();
        let snapshots: Vec<ExecutionSnapshot> = self
            .live
            .lock()
            .values()
            .filter(|h| !h.engine.state().is_terminal())
            .map(|h| h.engine.snapshot())
            .collect();
        for snapshot in snapshots {
            self.deps
                .broadcaster
                .send_to(&id, Delivery::Event(Event::ExecutionUpdate(snapshot)));
        }
        (id, rx)
    }

    pub fn unsubscribe(&self, id: &SubscriberId) {
        self.deps.broadcaster.unsubscribe(id);
    }

    /// Record an inbound liveness probe from a subscriber connection.
    pub fn subscriber_heartbeat(&self, id: &SubscriberId) {
        self.deps.broadcaster.heartbeat(id);
    }

    pub fn broadcaster(&self) -> &Arc<Broadcaster> {
        &self.deps.broadcaster
    }

    pub fn live_count(&self) -> usize {
        self.live.lock().len()
    }

    /// One reaper pass: drop live entries whose completion timestamp has
    /// aged past the TTL. Never touches a non-terminal run.
    pub fn reap(&self) {
        let now = self.deps.clock.epoch_ms();
        let ttl_ms = self.config.ttl.as_millis() as u64;
        self.live.lock().retain(|id, handle| {
            let state = handle.engine.state();
            if !state.is_terminal() {
                return true;
            }
            match state.completed_at_ms() {
                Some(done) if now.saturating_sub(done) >= ttl_ms => {
                    handle.watchdog.abort();
                    tracing::info!(execution_id = %id, "reaped completed run from live registry");
                    false
                }
                _ => true,
            }
        });
    }

    async fn run_reaper(&self) {
        let mut tick = tokio::time::interval(self.config.reap_interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = tick.tick() => self.reap(),
                _ = self.shutdown.cancelled() => return,
            }
        }
    }

    /// Cancel every live run and wait (bounded) for their driving tasks.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let handles: Vec<RunHandle<C>> = {
            let mut live = self.live.lock();
            live.drain().map(|(_, h)| h).collect()
        };
        for handle in &handles {
            handle.engine.signals().cancel();
        }
        for handle in handles {
            handle.watchdog.abort();
            if tokio::time::timeout(SHUTDOWN_GRACE, handle.driver)
                .await
                .is_err()
            {
                tracing::warn!("driving task did not stop within shutdown grace");
            }
        }
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
