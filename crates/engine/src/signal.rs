// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-run control signals.
//!
//! Pause, cancel, and debug are latched; skip-forward and skip-back are
//! one-shot. The run loop observes signals at its suspension points in a
//! fixed order (cancel → skip-back → skip-forward → pause), which makes
//! the outcome of competing signals deterministic.

use pilot_core::ControlKind;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Which one-shot skip was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipKind {
    Forward,
    Back,
}

/// Signal state for one execution.
pub struct ControlSignals {
    paused: AtomicBool,
    debug: AtomicBool,
    skip_forward: AtomicBool,
    skip_back: AtomicBool,
    cancel: CancellationToken,
    changed: Notify,
}

impl ControlSignals {
    pub fn new(debug: bool) -> Self {
        Self::with_cancel_token(CancellationToken::new(), debug)
    }

    /// Build with an externally-owned cancel token (nested runs chain the
    /// child's cancellation to the parent step's token).
    pub fn with_cancel_token(cancel: CancellationToken, debug: bool) -> Self {
        Self {
            paused: AtomicBool::new(false),
            debug: AtomicBool::new(debug),
            skip_forward: AtomicBool::new(false),
            skip_back: AtomicBool::new(false),
            cancel,
            changed: Notify::new(),
        }
    }

    /// Apply a control request from the outside.
    pub fn apply(&self, kind: ControlKind) {
        match kind {
            ControlKind::Pause => self.pause(),
            ControlKind::Resume => self.resume(),
            ControlKind::Skip => self.skip_forward(),
            ControlKind::SkipBack => self.skip_back(),
            ControlKind::Cancel => self.cancel(),
            ControlKind::DebugOn => self.set_debug(true),
            ControlKind::DebugOff => self.set_debug(false),
        }
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
        self.changed.notify_one();
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        self.changed.notify_one();
    }

    pub fn skip_forward(&self) {
        self.skip_forward.store(true, Ordering::SeqCst);
        self.changed.notify_one();
    }

    pub fn skip_back(&self) {
        self.skip_back.store(true, Ordering::SeqCst);
        self.changed.notify_one();
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
        self.changed.notify_one();
    }

    pub fn set_debug(&self, on: bool) {
        self.debug.store(on, Ordering::SeqCst);
        self.changed.notify_one();
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn is_debug(&self) -> bool {
        self.debug.load(Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Consume a pending skip-forward, if any.
    pub fn take_skip_forward(&self) -> bool {
        self.skip_forward.swap(false, Ordering::SeqCst)
    }

    /// Consume a pending skip-back, if any.
    pub fn take_skip_back(&self) -> bool {
        self.skip_back.swap(false, Ordering::SeqCst)
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Wait until some signal changes. A change that raced this call is
    /// not lost: `Notify` stores one permit.
    pub async fn changed(&self) {
        self.changed.notified().await;
    }

    /// Resolve as soon as a skip is asserted, consuming it. Skip-back wins
    /// over a simultaneously pending skip-forward.
    pub async fn skip_requested(&self) -> SkipKind {
        loop {
            if self.take_skip_back() {
                return SkipKind::Back;
            }
            if self.take_skip_forward() {
                return SkipKind::Forward;
            }
            self.changed().await;
        }
    }
}

#[cfg(test)]
#[path = "signal_tests.rs"]
mod tests;
