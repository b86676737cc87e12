// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Gateway client contract and the `gateway.*` step handlers.
//!
//! The concrete REST mechanics live behind [`GatewayClient`]; the runtime
//! only depends on the contract. Handlers fetch the lazily-created client
//! from the step context and delegate.

use crate::context::StepContext;
use crate::handler::{required_str, HandlerError, StepHandler, StepParams};
use async_trait::async_trait;
use pilot_core::{Credential, StepOutput};
use serde_json::Value;
use thiserror::Error;

/// Errors from gateway operations.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("request failed: {0}")]
    Request(String),

    #[error("tag not found: {0}")]
    TagNotFound(String),
}

/// A session against one industrial gateway.
#[async_trait]
pub trait GatewayClient: Send + Sync {
    /// Authenticate the session with the given credential.
    async fn login(&self, credential: &Credential) -> Result<(), GatewayError>;

    /// Read the current values of the given tag paths.
    async fn read_tags(&self, paths: &[String]) -> Result<Vec<Value>, GatewayError>;

    /// Write one value to one tag path.
    async fn write_tag(&self, path: &str, value: &Value) -> Result<(), GatewayError>;

    /// Release the session. Idempotent.
    async fn close(&self);
}

/// Creates the per-run gateway client on first use.
#[async_trait]
pub trait GatewayFactory: Send + Sync {
    async fn create(&self) -> Result<std::sync::Arc<dyn GatewayClient>, HandlerError>;
}

/// `gateway.login` — authenticate the shared gateway session.
pub struct GatewayLoginHandler;

#[async_trait]
impl StepHandler for GatewayLoginHandler {
    fn step_type(&self) -> &str {
        "gateway.login"
    }

    async fn execute(
        &self,
        params: &StepParams,
        ctx: &StepContext,
    ) -> Result<StepOutput, HandlerError> {
        let record = params
            .get("credential")
            .ok_or_else(|| HandlerError::MissingParameter("credential".to_string()))?;
        let credential: Credential =
            serde_json::from_value(record.clone()).map_err(|e| HandlerError::InvalidParameter {
                name: "credential".to_string(),
                reason: e.to_string(),
            })?;
        let client = ctx.resources().gateway().await?;
        client.login(&credential).await?;
        tracing::info!(execution_id = %ctx.execution_id(), user = %credential.username, "gateway login");
        let mut output = StepOutput::new();
        output.insert("logged_in".to_string(), Value::Bool(true));
        output.insert("username".to_string(), Value::from(credential.username));
        Ok(output)
    }
}

/// `gateway.read_tag` — read one or more tag paths.
pub struct GatewayReadTagHandler;

#[async_trait]
impl StepHandler for GatewayReadTagHandler {
    fn step_type(&self) -> &str {
        "gateway.read_tag"
    }

    async fn execute(
        &self,
        params: &StepParams,
        ctx: &StepContext,
    ) -> Result<StepOutput, HandlerError> {
        let paths: Vec<String> = match params.get("paths") {
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| v.as_str().map(str::to_string))
                .collect::<Option<_>>()
                .ok_or_else(|| HandlerError::InvalidParameter {
                    name: "paths".to_string(),
                    reason: "expected a list of strings".to_string(),
                })?,
            _ => vec![required_str(params, "path")?.to_string()],
        };
        let client = ctx.resources().gateway().await?;
        let values = client.read_tags(&paths).await?;
        let mut output = StepOutput::new();
        output.insert("values".to_string(), Value::Array(values));
        output.insert(
            "paths".to_string(),
            Value::Array(paths.into_iter().map(Value::from).collect()),
        );
        Ok(output)
    }
}

/// `gateway.write_tag` — write one tag path.
pub struct GatewayWriteTagHandler;

#[async_trait]
impl StepHandler for GatewayWriteTagHandler {
    fn step_type(&self) -> &str {
        "gateway.write_tag"
    }

    async fn execute(
        &self,
        params: &StepParams,
        ctx: &StepContext,
    ) -> Result<StepOutput, HandlerError> {
        let path = required_str(params, "path")?;
        let value = params
            .get("value")
            .ok_or_else(|| HandlerError::MissingParameter("value".to_string()))?;
        let client = ctx.resources().gateway().await?;
        client.write_tag(path, value).await?;
        let mut output = StepOutput::new();
        output.insert("path".to_string(), Value::from(path));
        output.insert("written".to_string(), Value::Bool(true));
        Ok(output)
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod fake {
    //! In-memory gateway for tests.

    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// Fake gateway client backed by an in-memory tag table.
    #[derive(Default)]
    pub struct FakeGatewayClient {
        pub tags: Mutex<HashMap<String, Value>>,
        pub logins: Mutex<Vec<String>>,
        closed: AtomicBool,
    }

    impl FakeGatewayClient {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn with_tag(self: Arc<Self>, path: &str, value: Value) -> Arc<Self> {
            self.tags.lock().insert(path.to_string(), value);
            self
        }

        pub fn closed(&self) -> bool {
            self.closed.load(Ordering::Acquire)
        }
    }

    #[async_trait]
    impl GatewayClient for FakeGatewayClient {
        async fn login(&self, credential: &Credential) -> Result<(), GatewayError> {
            self.logins.lock().push(credential.username.clone());
            Ok(())
        }

        async fn read_tags(&self, paths: &[String]) -> Result<Vec<Value>, GatewayError> {
            let tags = self.tags.lock();
            paths
                .iter()
                .map(|p| {
                    tags.get(p)
                        .cloned()
                        .ok_or_else(|| GatewayError::TagNotFound(p.clone()))
                })
                .collect()
        }

        async fn write_tag(&self, path: &str, value: &Value) -> Result<(), GatewayError> {
            self.tags.lock().insert(path.to_string(), value.clone());
            Ok(())
        }

        async fn close(&self) {
            self.closed.store(true, Ordering::Release);
        }
    }

    /// Factory returning a pre-built fake client.
    pub struct FakeGatewayFactory {
        client: Arc<FakeGatewayClient>,
    }

    impl FakeGatewayFactory {
        pub fn new(client: Arc<FakeGatewayClient>) -> Self {
            Self { client }
        }
    }

    #[async_trait]
    impl GatewayFactory for FakeGatewayFactory {
        async fn create(&self) -> Result<Arc<dyn GatewayClient>, HandlerError> {
            Ok(Arc::clone(&self.client) as Arc<dyn GatewayClient>)
        }
    }
}

#[cfg(test)]
#[path = "gateway_tests.rs"]
mod tests;
