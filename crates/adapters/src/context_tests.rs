// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::browser::fake::{FakeBrowserDriver, FakeBrowserFactory};
use crate::gateway::fake::{FakeGatewayClient, FakeGatewayFactory};
use pilot_core::{ExecutionId, ScreenshotFrame};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

fn frame(id: &str) -> ScreenshotFrame {
    ScreenshotFrame {
        execution_id: ExecutionId::from_string(id),
        jpeg_base64: "x".into(),
        timestamp_ms: 0,
    }
}

// =============================================================================
// VariableStore
// =============================================================================

#[test]
fn variable_store_set_get() {
    let vars = VariableStore::new();
    vars.set("batch", json!("B-1"));
    assert_eq!(vars.get("batch"), Some(json!("B-1")));
    assert_eq!(vars.get("absent"), None);
}

#[test]
fn variable_store_clones_share_state() {
    let vars = VariableStore::new();
    let clone = vars.clone();
    vars.set("k", json!(1));
    assert_eq!(clone.snapshot().len(), 1);
}

// =============================================================================
// ScreenshotTx
// =============================================================================

#[tokio::test]
async fn screenshot_tx_rate_limits() {
    let (tx, mut rx) = mpsc::channel(16);
    let sink = ScreenshotTx::new(tx, Duration::from_secs(3600));

    assert!(sink.offer(frame("exe-1")));
    // Second frame inside the interval is dropped at the source
    assert!(!sink.offer(frame("exe-1")));

    assert!(rx.recv().await.is_some());
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn screenshot_tx_drops_when_disabled() {
    let (tx, mut rx) = mpsc::channel(16);
    let sink = ScreenshotTx::new(tx, Duration::ZERO);

    sink.disable();
    assert!(!sink.offer(frame("exe-1")));
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn screenshot_tx_drops_on_full_channel() {
    let (tx, _rx) = mpsc::channel(1);
    let sink = ScreenshotTx::new(tx, Duration::ZERO);

    assert!(sink.offer(frame("exe-1")));
    // Channel full: dropped without blocking
    assert!(!sink.offer(frame("exe-1")));
}

// =============================================================================
// SharedResources
// =============================================================================

#[tokio::test]
async fn resources_create_lazily_and_once() {
    let gateway = FakeGatewayClient::new();
    let resources = SharedResources::new(
        None,
        Some(Arc::new(FakeGatewayFactory::new(Arc::clone(&gateway)))),
        None,
    );

    let a = resources.gateway().await.unwrap();
    let b = resources.gateway().await.unwrap();
    assert!(Arc::ptr_eq(&a, &b));
}

#[tokio::test]
async fn resources_teardown_closes_created() {
    let gateway = FakeGatewayClient::new();
    let browser = FakeBrowserDriver::new();
    let resources = SharedResources::new(
        Some(Arc::new(FakeBrowserFactory::new(Arc::clone(&browser)))),
        Some(Arc::new(FakeGatewayFactory::new(Arc::clone(&gateway)))),
        None,
    );

    resources.gateway().await.unwrap();
    resources.browser().await.unwrap();
    resources.teardown().await;

    assert!(gateway.closed());
    assert!(browser.closed());
}

#[tokio::test]
async fn teardown_without_creation_is_noop() {
    let gateway = FakeGatewayClient::new();
    let resources = SharedResources::new(
        None,
        Some(Arc::new(FakeGatewayFactory::new(Arc::clone(&gateway)))),
        None,
    );
    resources.teardown().await;
    assert!(!gateway.closed());
}

#[tokio::test]
async fn missing_factory_is_a_handler_error() {
    let resources = SharedResources::new(None, None, None);
    assert!(resources.gateway().await.is_err());
    assert!(resources.browser().await.is_err());
}

#[tokio::test]
async fn browser_creation_attaches_sink() {
    let browser = FakeBrowserDriver::new();
    let (tx, _rx) = mpsc::channel(4);
    let sink = ScreenshotTx::new(tx, Duration::ZERO);
    let resources = SharedResources::new(
        Some(Arc::new(FakeBrowserFactory::new(Arc::clone(&browser)))),
        None,
        Some(sink),
    );

    resources.browser().await.unwrap();
    assert!(browser.sink().is_some());
}
