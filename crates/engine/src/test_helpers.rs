// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for engine tests.

use crate::broadcast::{BroadcastConfig, Broadcaster, Delivery};
use crate::config::EngineConfig;
use crate::engine::{Engine, EngineDeps, RunRequest};
use crate::nested::PlaybookRunHandler;
use pilot_adapters::{CredentialVault, HandlerRegistry, StepHandler};
use pilot_core::{Event, ExecutionId, ExecutionSnapshot, ExecutionStatus, FakeClock};
use pilot_storage::ExecutionStore;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

pub(crate) struct Harness {
    pub clock: FakeClock,
    pub store: Arc<ExecutionStore>,
    pub broadcaster: Arc<Broadcaster>,
    pub deps: EngineDeps<FakeClock>,
    _dir: tempfile::TempDir,
    pub dir_path: std::path::PathBuf,
}

impl Harness {
    pub fn new(extra_handlers: Vec<Arc<dyn StepHandler>>) -> Self {
        Self::with_vault(extra_handlers, CredentialVault::new())
    }

    pub fn with_vault(
        extra_handlers: Vec<Arc<dyn StepHandler>>,
        vault: CredentialVault,
    ) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
        let dir = tempfile::tempdir().expect("tempdir");
        let dir_path = dir.path().to_path_buf();
        let store = Arc::new(ExecutionStore::open(dir.path()).expect("store"));
        let broadcaster = Arc::new(Broadcaster::new(BroadcastConfig {
            buffer: 1024,
            ..BroadcastConfig::default()
        }));
        let clock = FakeClock::new();

        let mut registry = HandlerRegistry::with_builtins();
        for handler in extra_handlers {
            registry.register(handler).expect("register");
        }
        let nested = Arc::new(PlaybookRunHandler::<FakeClock>::new());
        registry
            .register(Arc::clone(&nested) as Arc<dyn StepHandler>)
            .expect("register nested");
        let registry = Arc::new(registry);

        let deps = EngineDeps {
            registry: Arc::clone(&registry),
            vault,
            store: Arc::clone(&store),
            broadcaster: Arc::clone(&broadcaster),
            clock: clock.clone(),
            browser_factory: None,
            gateway_factory: None,
            config: EngineConfig::default(),
        };
        nested.bind(&registry, &deps);

        Self {
            clock,
            store,
            broadcaster,
            deps,
            _dir: dir,
            dir_path,
        }
    }

    pub fn engine(&self, yaml: &str, parameters: HashMap<String, Value>, debug: bool) -> Arc<Engine<FakeClock>> {
        let playbook = pilot_playbook::parse_playbook(yaml, "<test>").expect("playbook");
        Engine::new(
            self.deps.clone(),
            RunRequest {
                execution_id: ExecutionId::new(),
                playbook,
                playbook_path: "<test>".to_string(),
                parameters,
                debug_mode: debug,
                metadata: HashMap::new(),
                cancel: None,
            },
        )
    }

    /// Write a playbook file into the harness data dir.
    pub fn write_playbook(&self, name: &str, yaml: &str) -> std::path::PathBuf {
        let path = self.dir_path.join(name);
        std::fs::write(&path, yaml).expect("write playbook");
        path
    }
}

/// Run an engine to completion and return its final snapshot.
pub(crate) async fn drive(engine: &Arc<Engine<FakeClock>>) -> ExecutionSnapshot {
    Arc::clone(engine).run().await;
    engine.snapshot()
}

/// Drain every buffered delivery from a subscriber channel.
pub(crate) fn drain(rx: &mut mpsc::Receiver<Delivery>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(delivery) = rx.try_recv() {
        if let Delivery::Event(event) = delivery {
            events.push(event);
        }
    }
    events
}

/// Project execution updates for one run to the status sequence with
/// consecutive duplicates collapsed.
pub(crate) fn status_projection(events: &[Event], id: &ExecutionId) -> Vec<ExecutionStatus> {
    let mut out: Vec<ExecutionStatus> = Vec::new();
    for event in events {
        if let Event::ExecutionUpdate(snapshot) = event {
            if snapshot.execution_id == *id && out.last() != Some(&snapshot.status) {
                out.push(snapshot.status);
            }
        }
    }
    out
}

/// Poll until the snapshot satisfies the predicate (virtual time
/// friendly). Predicates must test monotonic conditions (a step result
/// becoming terminal, a stamp increasing) so a poll cannot race past a
/// transient state.
pub(crate) async fn wait_snapshot(
    engine: &Arc<Engine<FakeClock>>,
    pred: impl Fn(&ExecutionSnapshot) -> bool,
) -> ExecutionSnapshot {
    for _ in 0..10_000 {
        let snapshot = engine.snapshot();
        if pred(&snapshot) {
            return snapshot;
        }
        tokio::time::sleep(std::time::Duration::from_millis(1)).await;
    }
    panic!("engine never satisfied predicate, at {}", engine.state().status());
}

/// Poll until the engine reports the wanted status.
pub(crate) async fn wait_for_status(engine: &Arc<Engine<FakeClock>>, wanted: ExecutionStatus) {
    wait_snapshot(engine, |s| s.status == wanted).await;
}

/// Resume out of a debug hold and wait for the hold after `step_index`
/// finishes.
pub(crate) async fn resume_until_step_done(
    engine: &Arc<Engine<FakeClock>>,
    step_index: usize,
) -> ExecutionSnapshot {
    engine.signals().resume();
    wait_snapshot(engine, |s| {
        s.status == ExecutionStatus::Paused
            && s.step_results
                .get(step_index)
                .map(|r| r.status.is_terminal())
                .unwrap_or(false)
    })
    .await
}
