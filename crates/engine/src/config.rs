// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime tunables.

use std::time::Duration;

/// Per-engine tunables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Cooperative-shutdown grace after a step timeout fires. A handler
    /// that ignores cancellation for longer than this is misbehaving; the
    /// executor reports the timeout regardless.
    pub cancel_grace: Duration,
    /// Bound on buffered live screenshot frames per run.
    pub screenshot_buffer: usize,
    /// Source-side rate limit between live frames.
    pub screenshot_min_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cancel_grace: Duration::from_secs(5),
            screenshot_buffer: 16,
            screenshot_min_interval: Duration::from_millis(500),
        }
    }
}

impl EngineConfig {
    pilot_core::setters! {
        set {
            cancel_grace: Duration,
            screenshot_buffer: usize,
            screenshot_min_interval: Duration,
        }
    }
}

/// Manager-level tunables.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// How long a completed run stays in the live registry.
    pub ttl: Duration,
    /// Watchdog bound on total run duration.
    pub max_run_duration: Duration,
    /// Sweep cadence of the TTL reaper.
    pub reap_interval: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60 * 60),
            max_run_duration: Duration::from_secs(60 * 60),
            reap_interval: Duration::from_secs(60),
        }
    }
}

impl ManagerConfig {
    pilot_core::setters! {
        set {
            ttl: Duration,
            max_run_duration: Duration,
            reap_interval: Duration,
        }
    }
}
