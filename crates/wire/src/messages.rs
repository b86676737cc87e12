// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subscription message shapes.

use pilot_core::{Event, ExecutionSnapshot, ScreenshotFrame};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How often a healthy client is expected to send [`ClientMessage::Ping`].
pub const EXPECTED_PING_INTERVAL: Duration = Duration::from_secs(60);

/// Silence after which the server side terminates the subscription.
pub const LIVENESS_TIMEOUT: Duration = Duration::from_secs(90);

/// Server → client messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "execution:update")]
    ExecutionUpdate(ExecutionSnapshot),

    #[serde(rename = "screenshot:frame")]
    ScreenshotFrame(ScreenshotFrame),

    /// Sent when no real event has flowed for a while.
    #[serde(rename = "keepalive")]
    Keepalive,

    /// Reply to a client ping.
    #[serde(rename = "pong")]
    Pong,
}

impl From<Event> for ServerMessage {
    fn from(event: Event) -> Self {
        match event {
            Event::ExecutionUpdate(snapshot) => ServerMessage::ExecutionUpdate(snapshot),
            Event::ScreenshotFrame(frame) => ServerMessage::ScreenshotFrame(frame),
        }
    }
}

/// Client → server messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Liveness probe; the server replies [`ServerMessage::Pong`].
    #[serde(rename = "ping")]
    Ping,
}

#[cfg(test)]
#[path = "messages_tests.rs"]
mod tests;
