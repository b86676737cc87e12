// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run context handed to step handlers.
//!
//! The engine assembles one [`StepContext`] per step invocation: read
//! access to run parameters, a mutator for run variables, a cancellation
//! handle, the lazily-initialized shared resources, and (for browser
//! steps) a non-blocking screenshot emitter.

use crate::browser::{BrowserDriver, BrowserFactory};
use crate::gateway::{GatewayClient, GatewayFactory};
use crate::handler::HandlerError;
use parking_lot::Mutex;
use pilot_core::{ExecutionId, Redactor, ScreenshotFrame};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Shared, mutable run variables.
///
/// Written by `utility.set_variable` (and variable-producing step outputs),
/// read by the template resolver. Cloning shares the underlying map.
#[derive(Clone, Default)]
pub struct VariableStore {
    inner: Arc<Mutex<HashMap<String, Value>>>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, name: impl Into<String>, value: Value) {
        self.inner.lock().insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.inner.lock().get(name).cloned()
    }

    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.inner.lock().clone()
    }
}

/// Non-blocking screenshot emitter, rate-limited at the source.
///
/// Frames beyond the rate limit, frames after the emitter is disabled, and
/// frames the channel cannot take without blocking are all dropped; the
/// engine never waits on a subscriber to accept a frame.
#[derive(Clone)]
pub struct ScreenshotTx {
    tx: mpsc::Sender<ScreenshotFrame>,
    enabled: Arc<AtomicBool>,
    last_sent: Arc<Mutex<Option<Instant>>>,
    min_interval: Duration,
}

impl ScreenshotTx {
    /// Default source rate limit: ≤ 2 frames per second.
    pub const MIN_INTERVAL: Duration = Duration::from_millis(500);

    pub fn new(tx: mpsc::Sender<ScreenshotFrame>, min_interval: Duration) -> Self {
        Self {
            tx,
            enabled: Arc::new(AtomicBool::new(true)),
            last_sent: Arc::new(Mutex::new(None)),
            min_interval,
        }
    }

    /// Offer a frame. Returns `true` if accepted into the channel.
    pub fn offer(&self, frame: ScreenshotFrame) -> bool {
        if !self.enabled.load(Ordering::Acquire) {
            return false;
        }
        let mut last = self.last_sent.lock();
        if let Some(sent) = *last {
            if sent.elapsed() < self.min_interval {
                return false;
            }
        }
        match self.tx.try_send(frame) {
            Ok(()) => {
                *last = Some(Instant::now());
                true
            }
            Err(_) => false,
        }
    }

    /// Permanently stop accepting frames.
    ///
    /// The engine disables the emitter before publishing a run's terminal
    /// event so no frame can trail the completion update.
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
    }
}

/// Lazily-created shared resources for one run.
///
/// At most one browser driver and one gateway client exist per run,
/// created on first use by a handler that requires them and torn down in
/// engine finalize on every exit path. Creation is guarded per resource.
pub struct SharedResources {
    browser_factory: Option<Arc<dyn BrowserFactory>>,
    gateway_factory: Option<Arc<dyn GatewayFactory>>,
    browser: tokio::sync::Mutex<Option<Arc<dyn BrowserDriver>>>,
    gateway: tokio::sync::Mutex<Option<Arc<dyn GatewayClient>>>,
    screenshots: Option<ScreenshotTx>,
}

impl SharedResources {
    pub fn new(
        browser_factory: Option<Arc<dyn BrowserFactory>>,
        gateway_factory: Option<Arc<dyn GatewayFactory>>,
        screenshots: Option<ScreenshotTx>,
    ) -> Self {
        Self {
            browser_factory,
            gateway_factory,
            browser: tokio::sync::Mutex::new(None),
            gateway: tokio::sync::Mutex::new(None),
            screenshots,
        }
    }

    /// The browser driver, created on first use.
    pub async fn browser(&self) -> Result<Arc<dyn BrowserDriver>, HandlerError> {
        let mut slot = self.browser.lock().await;
        if let Some(driver) = slot.as_ref() {
            return Ok(Arc::clone(driver));
        }
        let factory = self
            .browser_factory
            .as_ref()
            .ok_or_else(|| HandlerError::Message("no browser driver configured".to_string()))?;
        let driver = factory.create().await?;
        if let Some(sink) = &self.screenshots {
            driver.attach_screenshot_sink(sink.clone());
        }
        tracing::debug!("browser driver created");
        *slot = Some(Arc::clone(&driver));
        Ok(driver)
    }

    /// The gateway client, created on first use.
    pub async fn gateway(&self) -> Result<Arc<dyn GatewayClient>, HandlerError> {
        let mut slot = self.gateway.lock().await;
        if let Some(client) = slot.as_ref() {
            return Ok(Arc::clone(client));
        }
        let factory = self
            .gateway_factory
            .as_ref()
            .ok_or_else(|| HandlerError::Message("no gateway client configured".to_string()))?;
        let client = factory.create().await?;
        tracing::debug!("gateway client created");
        *slot = Some(Arc::clone(&client));
        Ok(client)
    }

    /// Release everything that was lazily created.
    ///
    /// Idempotent; called from engine finalize on every exit path,
    /// including cancellation.
    pub async fn teardown(&self) {
        if let Some(driver) = self.browser.lock().await.take() {
            driver.close().await;
            tracing::debug!("browser driver closed");
        }
        if let Some(client) = self.gateway.lock().await.take() {
            client.close().await;
            tracing::debug!("gateway client closed");
        }
    }
}

/// Everything a handler may touch while executing one step.
pub struct StepContext {
    execution_id: ExecutionId,
    step_id: String,
    parameters: Arc<HashMap<String, Value>>,
    variables: VariableStore,
    cancel: CancellationToken,
    resources: Arc<SharedResources>,
    screenshots: Option<ScreenshotTx>,
    screenshot_dir: Option<PathBuf>,
    redactor: Redactor,
    metadata: Arc<HashMap<String, String>>,
}

impl StepContext {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        execution_id: ExecutionId,
        step_id: impl Into<String>,
        parameters: Arc<HashMap<String, Value>>,
        variables: VariableStore,
        cancel: CancellationToken,
        resources: Arc<SharedResources>,
        screenshots: Option<ScreenshotTx>,
        screenshot_dir: Option<PathBuf>,
        redactor: Redactor,
    ) -> Self {
        Self {
            execution_id,
            step_id: step_id.into(),
            parameters,
            variables,
            cancel,
            resources,
            screenshots,
            screenshot_dir,
            redactor,
            metadata: Arc::new(HashMap::new()),
        }
    }

    /// Attach execution metadata (`nesting_depth`, `parent_chain`, …).
    pub fn with_metadata(mut self, metadata: Arc<HashMap<String, String>>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Execution metadata snapshot.
    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }

    pub fn execution_id(&self) -> &ExecutionId {
        &self.execution_id
    }

    pub fn step_id(&self) -> &str {
        &self.step_id
    }

    /// Read-only snapshot of the run's resolved parameters.
    pub fn parameters(&self) -> &HashMap<String, Value> {
        &self.parameters
    }

    pub fn variables(&self) -> &VariableStore {
        &self.variables
    }

    /// Handlers must abort at the next I/O boundary once this fires.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn resources(&self) -> &SharedResources {
        &self.resources
    }

    pub fn screenshots(&self) -> Option<&ScreenshotTx> {
        self.screenshots.as_ref()
    }

    /// Directory for this run's screenshot files, when configured.
    pub fn screenshot_dir(&self) -> Option<&PathBuf> {
        self.screenshot_dir.as_ref()
    }

    pub fn redactor(&self) -> &Redactor {
        &self.redactor
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
