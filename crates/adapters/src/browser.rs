// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Browser driver contract and the `browser.*` step handlers.

use crate::context::{ScreenshotTx, StepContext};
use crate::handler::{required_str, HandlerError, StepHandler, StepParams};
use async_trait::async_trait;
use base64::Engine as _;
use pilot_core::{ScreenshotFrame, StepOutput};
use serde_json::Value;
use thiserror::Error;

/// Errors from browser operations.
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("selector not found: {0}")]
    SelectorNotFound(String),

    #[error("capture failed: {0}")]
    Capture(String),
}

/// A headless browser session.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), BrowserError>;

    async fn click(&self, selector: &str) -> Result<(), BrowserError>;

    async fn fill(&self, selector: &str, text: &str) -> Result<(), BrowserError>;

    /// Capture the current page as JPEG bytes.
    async fn screenshot_jpeg(&self) -> Result<Vec<u8>, BrowserError>;

    /// Register the live-frame sink. A driver with its own frame loop
    /// pushes into the sink; the sink enforces the rate limit and never
    /// blocks. Drivers without a frame loop may ignore this.
    fn attach_screenshot_sink(&self, _sink: ScreenshotTx) {}

    /// Release the session. Idempotent.
    async fn close(&self);
}

/// Creates the per-run browser driver on first use.
#[async_trait]
pub trait BrowserFactory: Send + Sync {
    async fn create(&self) -> Result<std::sync::Arc<dyn BrowserDriver>, HandlerError>;
}

/// Capture a frame and offer it to the live stream, best-effort.
async fn emit_frame(ctx: &StepContext, driver: &dyn BrowserDriver) {
    let Some(sink) = ctx.screenshots() else {
        return;
    };
    match driver.screenshot_jpeg().await {
        Ok(bytes) => {
            let frame = ScreenshotFrame {
                execution_id: ctx.execution_id().clone(),
                jpeg_base64: base64::engine::general_purpose::STANDARD.encode(bytes),
                timestamp_ms: now_ms(),
            };
            sink.offer(frame);
        }
        Err(e) => {
            tracing::debug!(execution_id = %ctx.execution_id(), error = %e, "live frame capture failed");
        }
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// `browser.navigate` — open a URL.
pub struct BrowserNavigateHandler;

#[async_trait]
impl StepHandler for BrowserNavigateHandler {
    fn step_type(&self) -> &str {
        "browser.navigate"
    }

    async fn execute(
        &self,
        params: &StepParams,
        ctx: &StepContext,
    ) -> Result<StepOutput, HandlerError> {
        let url = required_str(params, "url")?;
        let driver = ctx.resources().browser().await?;
        driver.navigate(url).await?;
        emit_frame(ctx, driver.as_ref()).await;
        let mut output = StepOutput::new();
        output.insert("url".to_string(), Value::from(url));
        Ok(output)
    }
}

/// `browser.click` — click an element.
pub struct BrowserClickHandler;

#[async_trait]
impl StepHandler for BrowserClickHandler {
    fn step_type(&self) -> &str {
        "browser.click"
    }

    async fn execute(
        &self,
        params: &StepParams,
        ctx: &StepContext,
    ) -> Result<StepOutput, HandlerError> {
        let selector = required_str(params, "selector")?;
        let driver = ctx.resources().browser().await?;
        driver.click(selector).await?;
        emit_frame(ctx, driver.as_ref()).await;
        let mut output = StepOutput::new();
        output.insert("selector".to_string(), Value::from(selector));
        Ok(output)
    }
}

/// `browser.fill` — type into an element.
pub struct BrowserFillHandler;

#[async_trait]
impl StepHandler for BrowserFillHandler {
    fn step_type(&self) -> &str {
        "browser.fill"
    }

    async fn execute(
        &self,
        params: &StepParams,
        ctx: &StepContext,
    ) -> Result<StepOutput, HandlerError> {
        let selector = required_str(params, "selector")?;
        let text = required_str(params, "text")?;
        let driver = ctx.resources().browser().await?;
        driver.fill(selector, text).await?;
        emit_frame(ctx, driver.as_ref()).await;
        let mut output = StepOutput::new();
        output.insert("selector".to_string(), Value::from(selector));
        Ok(output)
    }
}

/// `browser.screenshot` — capture a JPEG to disk and record its path.
pub struct BrowserScreenshotHandler;

#[async_trait]
impl StepHandler for BrowserScreenshotHandler {
    fn step_type(&self) -> &str {
        "browser.screenshot"
    }

    async fn execute(
        &self,
        _params: &StepParams,
        ctx: &StepContext,
    ) -> Result<StepOutput, HandlerError> {
        let driver = ctx.resources().browser().await?;
        let bytes = driver.screenshot_jpeg().await?;

        let mut output = StepOutput::new();
        if let Some(dir) = ctx.screenshot_dir() {
            std::fs::create_dir_all(dir).map_err(|e| HandlerError::Message(e.to_string()))?;
            // <step_id>-<n>.jpg, n increasing per existing captures
            let n = std::fs::read_dir(dir)
                .map(|entries| entries.filter_map(Result::ok).count())
                .unwrap_or(0);
            let path = dir.join(format!("{}-{}.jpg", ctx.step_id(), n));
            std::fs::write(&path, &bytes).map_err(|e| HandlerError::Message(e.to_string()))?;
            output.insert(
                "screenshot_path".to_string(),
                Value::from(path.display().to_string()),
            );
        }
        emit_frame(ctx, driver.as_ref()).await;
        output.insert("bytes".to_string(), Value::from(bytes.len()));
        Ok(output)
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    //! Scriptable browser driver for tests.

    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// Fake browser driver recording actions.
    #[derive(Default)]
    pub struct FakeBrowserDriver {
        pub actions: Mutex<Vec<String>>,
        pub frame: Mutex<Vec<u8>>,
        sink: Mutex<Option<ScreenshotTx>>,
        closed: AtomicBool,
    }

    impl FakeBrowserDriver {
        pub fn new() -> Arc<Self> {
            Arc::new(Self {
                frame: Mutex::new(vec![0xff, 0xd8, 0xff]),
                ..Self::default()
            })
        }

        pub fn closed(&self) -> bool {
            self.closed.load(Ordering::Acquire)
        }

        /// The sink attached by the engine, if any.
        pub fn sink(&self) -> Option<ScreenshotTx> {
            self.sink.lock().clone()
        }
    }

    #[async_trait]
    impl BrowserDriver for FakeBrowserDriver {
        async fn navigate(&self, url: &str) -> Result<(), BrowserError> {
            self.actions.lock().push(format!("navigate {url}"));
            Ok(())
        }

        async fn click(&self, selector: &str) -> Result<(), BrowserError> {
            self.actions.lock().push(format!("click {selector}"));
            Ok(())
        }

        async fn fill(&self, selector: &str, text: &str) -> Result<(), BrowserError> {
            self.actions.lock().push(format!("fill {selector}={text}"));
            Ok(())
        }

        async fn screenshot_jpeg(&self) -> Result<Vec<u8>, BrowserError> {
            Ok(self.frame.lock().clone())
        }

        fn attach_screenshot_sink(&self, sink: ScreenshotTx) {
            *self.sink.lock() = Some(sink);
        }

        async fn close(&self) {
            self.closed.store(true, Ordering::Release);
        }
    }

    /// Factory returning a pre-built fake driver.
    pub struct FakeBrowserFactory {
        driver: Arc<FakeBrowserDriver>,
    }

    impl FakeBrowserFactory {
        pub fn new(driver: Arc<FakeBrowserDriver>) -> Self {
            Self { driver }
        }
    }

    #[async_trait]
    impl BrowserFactory for FakeBrowserFactory {
        async fn create(&self) -> Result<Arc<dyn BrowserDriver>, HandlerError> {
            Ok(Arc::clone(&self.driver) as Arc<dyn BrowserDriver>)
        }
    }
}

#[cfg(test)]
#[path = "browser_tests.rs"]
mod tests;
