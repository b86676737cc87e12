// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! pilot-adapters: step handler contract, registry, and target-system adapters

pub mod ai;
pub mod browser;
pub mod context;
pub mod designer;
pub mod gateway;
pub mod handler;
pub mod registry;
pub mod utility;
pub mod vault;

pub use ai::{AiError, AiProvider};
pub use browser::{BrowserDriver, BrowserError, BrowserFactory};
pub use context::{ScreenshotTx, SharedResources, StepContext, VariableStore};
pub use designer::{DesignerDriver, DesignerError, DesignerLauncher};
pub use gateway::{GatewayClient, GatewayError, GatewayFactory};
pub use handler::{HandlerError, StepHandler, StepParams};
pub use registry::{HandlerRegistry, RegistryError};
pub use vault::CredentialVault;

#[cfg(any(test, feature = "test-support"))]
pub use browser::fake::FakeBrowserDriver;
#[cfg(any(test, feature = "test-support"))]
pub use gateway::fake::FakeGatewayClient;
#[cfg(any(test, feature = "test-support"))]
pub use handler::testing::{FlakyHandler, RecordingHandler, SleepyHandler};
