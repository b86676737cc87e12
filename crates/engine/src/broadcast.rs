// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event fan-out to subscribers.
//!
//! Delivery is best-effort: each subscriber owns a bounded channel and a
//! full channel drops the event for that subscriber only, never blocking
//! the publisher. Per subscriber, delivery order is publication order.

use parking_lot::{Mutex, RwLock};
use pilot_core::{Event, SubscriberId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// What a subscriber receives.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    Event(Event),
    /// Emitted when a subscriber has seen no real event for a while.
    Keepalive,
}

/// Fan-out tunables.
#[derive(Debug, Clone)]
pub struct BroadcastConfig {
    /// Outbound buffer per subscriber.
    pub buffer: usize,
    /// Idle time before a keepalive is sent.
    pub keepalive_after: Duration,
    /// Silence (no inbound liveness probe) before a subscriber is dropped.
    pub evict_after: Duration,
    /// Housekeeping cadence.
    pub sweep_interval: Duration,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            buffer: 64,
            keepalive_after: Duration::from_secs(30),
            evict_after: Duration::from_secs(90),
            sweep_interval: Duration::from_secs(5),
        }
    }
}

struct SubscriberState {
    tx: mpsc::Sender<Delivery>,
    dropped: AtomicU64,
    last_delivery: Mutex<Instant>,
    last_seen: Mutex<Instant>,
}

impl SubscriberState {
    fn offer(&self, delivery: Delivery) -> bool {
        match self.tx.try_send(delivery) {
            Ok(()) => {
                *self.last_delivery.lock() = Instant::now();
                true
            }
            Err(_) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }
}

/// Multiplexes execution updates and screenshot frames to all subscribers.
pub struct Broadcaster {
    config: BroadcastConfig,
    subscribers: RwLock<HashMap<SubscriberId, SubscriberState>>,
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(BroadcastConfig::default())
    }
}

impl Broadcaster {
    pub fn new(config: BroadcastConfig) -> Self {
        Self {
            config,
            subscribers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a subscriber; the receiver closing is equivalent to
    /// `unsubscribe`.
    pub fn subscribe(&self) -> (SubscriberId, mpsc::Receiver<Delivery>) {
        let id = SubscriberId::new();
        let (tx, rx) = mpsc::channel(self.config.buffer);
        let now = Instant::now();
        self.subscribers.write().insert(
            id.clone(),
            SubscriberState {
                tx,
                dropped: AtomicU64::new(0),
                last_delivery: Mutex::new(now),
                last_seen: Mutex::new(now),
            },
        );
        tracing::debug!(subscriber = %id, "subscribed");
        (id, rx)
    }

    /// Remove a subscriber. Idempotent and safe from any side.
    pub fn unsubscribe(&self, id: &SubscriberId) {
        if self.subscribers.write().remove(id).is_some() {
            tracing::debug!(subscriber = %id, "unsubscribed");
        }
    }

    /// Fan an event out to every subscriber without blocking.
    pub fn publish(&self, event: &Event) {
        let subscribers = self.subscribers.read();
        for (id, state) in subscribers.iter() {
            if !state.offer(Delivery::Event(event.clone())) {
                tracing::debug!(subscriber = %id, "subscriber buffer full, event dropped");
            }
        }
    }

    /// Direct send to one subscriber (late-join snapshots).
    pub fn send_to(&self, id: &SubscriberId, delivery: Delivery) -> bool {
        self.subscribers
            .read()
            .get(id)
            .map(|s| s.offer(delivery))
            .unwrap_or(false)
    }

    /// Record an inbound liveness probe from a subscriber.
    pub fn heartbeat(&self, id: &SubscriberId) {
        if let Some(state) = self.subscribers.read().get(id) {
            *state.last_seen.lock() = Instant::now();
        }
    }

    /// Events dropped for a subscriber so far.
    pub fn dropped_count(&self, id: &SubscriberId) -> Option<u64> {
        self.subscribers
            .read()
            .get(id)
            .map(|s| s.dropped.load(Ordering::Relaxed))
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// One housekeeping pass: keepalives for idle subscribers, eviction of
    /// dead ones.
    pub fn sweep(&self) {
        let now = Instant::now();
        {
            let subscribers = self.subscribers.read();
            for state in subscribers.values() {
                let idle = now.duration_since(*state.last_delivery.lock());
                if idle >= self.config.keepalive_after {
                    state.offer(Delivery::Keepalive);
                }
            }
        }
        let dead: Vec<SubscriberId> = {
            let subscribers = self.subscribers.read();
            subscribers
                .iter()
                .filter(|(_, s)| now.duration_since(*s.last_seen.lock()) >= self.config.evict_after)
                .map(|(id, _)| id.clone())
                .collect()
        };
        if !dead.is_empty() {
            let mut subscribers = self.subscribers.write();
            for id in dead {
                if subscribers.remove(&id).is_some() {
                    tracing::info!(subscriber = %id, "subscriber silent too long, deregistered");
                }
            }
        }
    }

    /// Periodic housekeeping until shutdown.
    pub async fn run_housekeeping(&self, shutdown: CancellationToken) {
        let mut tick = tokio::time::interval(self.config.sweep_interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = tick.tick() => self.sweep(),
                _ = shutdown.cancelled() => return,
            }
        }
    }
}

#[cfg(test)]
#[path = "broadcast_tests.rs"]
mod tests;
