// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::fake::*;
use super::*;
use crate::context::{SharedResources, StepContext, VariableStore};
use pilot_core::{ExecutionId, Redactor};
use serde_json::json;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

fn ctx() -> StepContext {
    StepContext::new(
        ExecutionId::from_string("exe-ai"),
        "ask",
        Arc::new(HashMap::new()),
        VariableStore::new(),
        CancellationToken::new(),
        Arc::new(SharedResources::new(None, None, None)),
        None,
        None,
        Redactor::new(),
    )
}

#[tokio::test]
async fn ask_returns_answer_in_output() {
    let provider = FakeAiProvider::replying("42");
    let handler = AiAskHandler::new(Arc::clone(&provider) as Arc<dyn AiProvider>);
    let mut params = StepParams::new();
    params.insert("prompt".to_string(), json!("meaning of life?"));

    let output = handler.execute(&params, &ctx()).await.unwrap();

    assert_eq!(output["answer"], json!("42"));
    assert_eq!(provider.prompts.lock().as_slice(), ["meaning of life?"]);
}

#[tokio::test]
async fn provider_failure_surfaces_as_handler_error() {
    let provider = FakeAiProvider::replying("");
    let handler = AiAskHandler::new(provider);
    let mut params = StepParams::new();
    params.insert("prompt".to_string(), json!("hello"));

    let err = handler.execute(&params, &ctx()).await.unwrap_err();
    assert!(err.to_string().contains("empty"));
}

#[tokio::test]
async fn ask_requires_prompt() {
    let provider = FakeAiProvider::replying("x");
    let handler = AiAskHandler::new(provider);
    assert!(handler.execute(&StepParams::new(), &ctx()).await.is_err());
}
