// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Step handler registry.
//!
//! Handlers register at startup; the registry is immutable once the
//! composition root wraps it in an `Arc` and hands it to the manager.

use crate::browser::{
    BrowserClickHandler, BrowserFillHandler, BrowserNavigateHandler, BrowserScreenshotHandler,
};
use crate::gateway::{GatewayLoginHandler, GatewayReadTagHandler, GatewayWriteTagHandler};
use crate::handler::StepHandler;
use crate::utility::{LogHandler, SetVariableHandler, WaitHandler};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors from registry construction.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("duplicate handler for step type {0}")]
    Duplicate(String),
}

/// Maps step-type tags to handlers.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn StepHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in utility, gateway, and browser
    /// handlers.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for handler in [
            Arc::new(LogHandler) as Arc<dyn StepHandler>,
            Arc::new(WaitHandler),
            Arc::new(SetVariableHandler),
            Arc::new(GatewayLoginHandler),
            Arc::new(GatewayReadTagHandler),
            Arc::new(GatewayWriteTagHandler),
            Arc::new(BrowserNavigateHandler),
            Arc::new(BrowserClickHandler),
            Arc::new(BrowserFillHandler),
            Arc::new(BrowserScreenshotHandler),
        ] {
            // Built-in tags are distinct; a collision is a programming error
            // surfaced by the registry tests.
            let _ = registry.register(handler);
        }
        registry
    }

    /// Register a handler under its own step-type tag.
    pub fn register(&mut self, handler: Arc<dyn StepHandler>) -> Result<(), RegistryError> {
        let tag = handler.step_type().to_string();
        if self.handlers.contains_key(&tag) {
            return Err(RegistryError::Duplicate(tag));
        }
        tracing::debug!(step_type = %tag, "handler registered");
        self.handlers.insert(tag, handler);
        Ok(())
    }

    pub fn get(&self, step_type: &str) -> Option<Arc<dyn StepHandler>> {
        self.handlers.get(step_type).cloned()
    }

    pub fn contains(&self, step_type: &str) -> bool {
        self.handlers.contains_key(step_type)
    }

    /// All registered tags, sorted.
    pub fn step_types(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.handlers.keys().cloned().collect();
        tags.sort();
        tags
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
