// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::fake::*;
use super::*;
use crate::context::{SharedResources, StepContext, VariableStore};
use crate::handler::StepParams;
use pilot_core::{ExecutionId, Redactor};
use serde_json::json;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

fn browser_context(
    driver: Arc<FakeBrowserDriver>,
    screenshots: Option<ScreenshotTx>,
    screenshot_dir: Option<PathBuf>,
) -> StepContext {
    StepContext::new(
        ExecutionId::from_string("exe-br"),
        "capture",
        Arc::new(HashMap::new()),
        VariableStore::new(),
        CancellationToken::new(),
        Arc::new(SharedResources::new(
            Some(Arc::new(FakeBrowserFactory::new(driver))),
            None,
            screenshots.clone(),
        )),
        screenshots,
        screenshot_dir,
        Redactor::new(),
    )
}

#[tokio::test]
async fn navigate_records_action() {
    let driver = FakeBrowserDriver::new();
    let ctx = browser_context(Arc::clone(&driver), None, None);
    let mut params = StepParams::new();
    params.insert("url".to_string(), json!("http://gw/status"));

    BrowserNavigateHandler.execute(&params, &ctx).await.unwrap();
    assert_eq!(driver.actions.lock().as_slice(), ["navigate http://gw/status"]);
}

#[tokio::test]
async fn click_and_fill_record_actions() {
    let driver = FakeBrowserDriver::new();
    let ctx = browser_context(Arc::clone(&driver), None, None);

    let mut params = StepParams::new();
    params.insert("selector".to_string(), json!("#ok"));
    BrowserClickHandler.execute(&params, &ctx).await.unwrap();

    params.insert("text".to_string(), json!("hello"));
    BrowserFillHandler.execute(&params, &ctx).await.unwrap();

    assert_eq!(
        driver.actions.lock().as_slice(),
        ["click #ok", "fill #ok=hello"]
    );
}

#[tokio::test]
async fn actions_emit_live_frames() {
    let driver = FakeBrowserDriver::new();
    let (tx, mut rx) = mpsc::channel(8);
    let sink = ScreenshotTx::new(tx, Duration::ZERO);
    let ctx = browser_context(Arc::clone(&driver), Some(sink), None);

    let mut params = StepParams::new();
    params.insert("url".to_string(), json!("http://x"));
    BrowserNavigateHandler.execute(&params, &ctx).await.unwrap();

    let frame = rx.recv().await.unwrap();
    assert_eq!(frame.execution_id.as_str(), "exe-br");
    assert!(!frame.jpeg_base64.is_empty());
}

#[tokio::test]
async fn screenshot_writes_numbered_file() {
    let dir = tempfile::tempdir().unwrap();
    let driver = FakeBrowserDriver::new();
    let ctx = browser_context(
        Arc::clone(&driver),
        None,
        Some(dir.path().join("exe-br")),
    );

    let output = BrowserScreenshotHandler
        .execute(&StepParams::new(), &ctx)
        .await
        .unwrap();
    let path = output["screenshot_path"].as_str().unwrap();
    assert!(path.ends_with("capture-0.jpg"));
    assert!(std::path::Path::new(path).exists());

    let output = BrowserScreenshotHandler
        .execute(&StepParams::new(), &ctx)
        .await
        .unwrap();
    assert!(output["screenshot_path"].as_str().unwrap().ends_with("capture-1.jpg"));
}

#[tokio::test]
async fn screenshot_without_dir_still_reports_bytes() {
    let driver = FakeBrowserDriver::new();
    let ctx = browser_context(driver, None, None);
    let output = BrowserScreenshotHandler
        .execute(&StepParams::new(), &ctx)
        .await
        .unwrap();
    assert!(output["bytes"].as_u64().unwrap() > 0);
    assert!(!output.contains_key("screenshot_path"));
}
