// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Designer (desktop application) contract and the `designer.*` handlers.
//!
//! Unlike the browser and gateway, a designer session is not a shared
//! lazy resource: each step launches its own session and releases it when
//! the step ends.

use crate::context::StepContext;
use crate::handler::{required_str, HandlerError, StepHandler, StepParams};
use async_trait::async_trait;
use pilot_core::StepOutput;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;

/// Errors from designer automation.
#[derive(Debug, Error)]
pub enum DesignerError {
    #[error("launch failed: {0}")]
    Launch(String),

    #[error("project not found: {0}")]
    ProjectNotFound(String),

    #[error("menu path not found: {0}")]
    MenuNotFound(String),
}

/// One live designer application session.
#[async_trait]
pub trait DesignerDriver: Send + Sync {
    async fn open_project(&self, name: &str) -> Result<(), DesignerError>;

    /// Invoke a menu entry by `/`-separated path, e.g. `File/Save All`.
    async fn invoke_menu(&self, path: &str) -> Result<(), DesignerError>;

    /// Release the session. Idempotent.
    async fn close(&self);
}

/// Launches designer sessions on demand.
#[async_trait]
pub trait DesignerLauncher: Send + Sync {
    async fn launch(&self) -> Result<Arc<dyn DesignerDriver>, HandlerError>;
}

/// Run step work against a session, honoring cancellation and always
/// closing the session before returning.
async fn with_session<T>(
    ctx: &StepContext,
    session: &Arc<dyn DesignerDriver>,
    work: impl std::future::Future<Output = Result<T, HandlerError>>,
) -> Result<T, HandlerError> {
    let result = tokio::select! {
        result = work => result,
        _ = ctx.cancel_token().cancelled() => Err(HandlerError::Cancelled),
    };
    session.close().await;
    result
}

/// `designer.open_project` — launch a session and open a project.
pub struct DesignerOpenProjectHandler {
    launcher: Arc<dyn DesignerLauncher>,
}

impl DesignerOpenProjectHandler {
    pub fn new(launcher: Arc<dyn DesignerLauncher>) -> Self {
        Self { launcher }
    }
}

#[async_trait]
impl StepHandler for DesignerOpenProjectHandler {
    fn step_type(&self) -> &str {
        "designer.open_project"
    }

    async fn execute(
        &self,
        params: &StepParams,
        ctx: &StepContext,
    ) -> Result<StepOutput, HandlerError> {
        let project = required_str(params, "project")?;
        let session = self.launcher.launch().await?;
        let work = async {
            session.open_project(project).await?;
            Ok(())
        };
        with_session(ctx, &session, work).await?;
        let mut output = StepOutput::new();
        output.insert("project".to_string(), Value::from(project));
        output.insert("opened".to_string(), Value::Bool(true));
        Ok(output)
    }
}

/// `designer.invoke_menu` — launch a session, open a project, and run a
/// menu action.
pub struct DesignerInvokeMenuHandler {
    launcher: Arc<dyn DesignerLauncher>,
}

impl DesignerInvokeMenuHandler {
    pub fn new(launcher: Arc<dyn DesignerLauncher>) -> Self {
        Self { launcher }
    }
}

#[async_trait]
impl StepHandler for DesignerInvokeMenuHandler {
    fn step_type(&self) -> &str {
        "designer.invoke_menu"
    }

    async fn execute(
        &self,
        params: &StepParams,
        ctx: &StepContext,
    ) -> Result<StepOutput, HandlerError> {
        let project = required_str(params, "project")?;
        let menu = required_str(params, "menu")?;
        let session = self.launcher.launch().await?;
        let work = async {
            session.open_project(project).await?;
            session.invoke_menu(menu).await?;
            Ok(())
        };
        with_session(ctx, &session, work).await?;
        let mut output = StepOutput::new();
        output.insert("menu".to_string(), Value::from(menu));
        output.insert("invoked".to_string(), Value::Bool(true));
        Ok(output)
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    //! Recording designer for tests.

    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    pub struct FakeDesignerDriver {
        pub actions: Mutex<Vec<String>>,
        closed: AtomicBool,
    }

    impl FakeDesignerDriver {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn closed(&self) -> bool {
            self.closed.load(Ordering::Acquire)
        }
    }

    #[async_trait]
    impl DesignerDriver for FakeDesignerDriver {
        async fn open_project(&self, name: &str) -> Result<(), DesignerError> {
            self.actions.lock().push(format!("open {name}"));
            Ok(())
        }

        async fn invoke_menu(&self, path: &str) -> Result<(), DesignerError> {
            self.actions.lock().push(format!("menu {path}"));
            Ok(())
        }

        async fn close(&self) {
            self.closed.store(true, Ordering::Release);
        }
    }

    /// Launcher handing out the same fake session every time.
    pub struct FakeDesignerLauncher {
        driver: Arc<FakeDesignerDriver>,
    }

    impl FakeDesignerLauncher {
        pub fn new(driver: Arc<FakeDesignerDriver>) -> Self {
            Self { driver }
        }
    }

    #[async_trait]
    impl DesignerLauncher for FakeDesignerLauncher {
        async fn launch(&self) -> Result<Arc<dyn DesignerDriver>, HandlerError> {
            Ok(Arc::clone(&self.driver) as Arc<dyn DesignerDriver>)
        }
    }
}

#[cfg(test)]
#[path = "designer_tests.rs"]
mod tests;
