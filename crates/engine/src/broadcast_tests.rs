// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use pilot_core::{ExecutionId, ExecutionSnapshot, ExecutionStatus};

fn update(id: &str, index: usize) -> Event {
    Event::ExecutionUpdate(ExecutionSnapshot {
        execution_id: ExecutionId::from_string(id),
        playbook_name: "demo".into(),
        playbook_path: "demo.yaml".into(),
        status: ExecutionStatus::Running,
        current_step_index: index,
        total_steps: 10,
        step_results: vec![],
        error: None,
        debug_mode: false,
        started_at_ms: Some(1),
        completed_at_ms: None,
        metadata: Default::default(),
    })
}

fn config(buffer: usize) -> BroadcastConfig {
    BroadcastConfig {
        buffer,
        keepalive_after: Duration::from_secs(30),
        evict_after: Duration::from_secs(90),
        sweep_interval: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn delivers_in_publication_order() {
    let broadcaster = Broadcaster::new(config(16));
    let (_id, mut rx) = broadcaster.subscribe();

    for i in 0..5 {
        broadcaster.publish(&update("exe-1", i));
    }

    for i in 0..5 {
        let Some(Delivery::Event(Event::ExecutionUpdate(s))) = rx.recv().await else {
            panic!("expected update");
        };
        assert_eq!(s.current_step_index, i);
    }
}

#[tokio::test]
async fn slow_subscriber_drops_without_affecting_fast_one() {
    let broadcaster = Broadcaster::new(config(2));
    let (fast_id, mut fast_rx) = broadcaster.subscribe();
    let (slow_id, mut slow_rx) = broadcaster.subscribe();

    for i in 0..5 {
        broadcaster.publish(&update("exe-1", i));
        // The fast subscriber drains as it goes; the slow one never does
        let Some(Delivery::Event(Event::ExecutionUpdate(s))) = fast_rx.recv().await else {
            panic!("fast subscriber starved");
        };
        assert_eq!(s.current_step_index, i);
    }

    assert_eq!(broadcaster.dropped_count(&fast_id), Some(0));
    assert_eq!(broadcaster.dropped_count(&slow_id), Some(3));
    // The slow subscriber still has its first two, in order
    for i in 0..2 {
        let Some(Delivery::Event(Event::ExecutionUpdate(s))) = slow_rx.recv().await else {
            panic!("expected buffered update");
        };
        assert_eq!(s.current_step_index, i);
    }
}

#[tokio::test]
async fn unsubscribe_is_idempotent() {
    let broadcaster = Broadcaster::new(config(4));
    let (id, _rx) = broadcaster.subscribe();
    assert_eq!(broadcaster.subscriber_count(), 1);
    broadcaster.unsubscribe(&id);
    broadcaster.unsubscribe(&id);
    assert_eq!(broadcaster.subscriber_count(), 0);
}

#[tokio::test]
async fn send_to_unknown_subscriber_is_false() {
    let broadcaster = Broadcaster::new(config(4));
    assert!(!broadcaster.send_to(&pilot_core::SubscriberId::new(), Delivery::Keepalive));
}

#[tokio::test(start_paused = true)]
async fn idle_subscriber_gets_keepalive() {
    let broadcaster = Broadcaster::new(config(4));
    let (_id, mut rx) = broadcaster.subscribe();

    tokio::time::sleep(Duration::from_secs(31)).await;
    broadcaster.sweep();

    assert_eq!(rx.try_recv().ok(), Some(Delivery::Keepalive));
}

#[tokio::test(start_paused = true)]
async fn recent_delivery_suppresses_keepalive() {
    let broadcaster = Broadcaster::new(config(4));
    let (_id, mut rx) = broadcaster.subscribe();

    tokio::time::sleep(Duration::from_secs(20)).await;
    broadcaster.publish(&update("exe-1", 0));
    tokio::time::sleep(Duration::from_secs(20)).await;
    broadcaster.sweep();

    // Only the real event is in the buffer
    assert!(matches!(rx.try_recv().ok(), Some(Delivery::Event(_))));
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn silent_subscriber_is_evicted() {
    let broadcaster = Broadcaster::new(config(4));
    let (_id, mut rx) = broadcaster.subscribe();

    tokio::time::sleep(Duration::from_secs(91)).await;
    broadcaster.sweep();

    assert_eq!(broadcaster.subscriber_count(), 0);
    // Keepalive may have been offered during the same sweep; the channel
    // still ends because the sender side is gone
    loop {
        match rx.recv().await {
            Some(Delivery::Keepalive) => continue,
            Some(other) => panic!("unexpected delivery: {other:?}"),
            None => break,
        }
    }
}

#[tokio::test(start_paused = true)]
async fn heartbeat_defers_eviction() {
    let broadcaster = Broadcaster::new(config(4));
    let (id, _rx) = broadcaster.subscribe();

    tokio::time::sleep(Duration::from_secs(60)).await;
    broadcaster.heartbeat(&id);
    tokio::time::sleep(Duration::from_secs(60)).await;
    broadcaster.sweep();
    assert_eq!(broadcaster.subscriber_count(), 1);

    tokio::time::sleep(Duration::from_secs(40)).await;
    broadcaster.sweep();
    assert_eq!(broadcaster.subscriber_count(), 0);
}
