// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_helpers::*;
use pilot_core::{Event, ExecutionStatus, StepStatus};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

const CHILD: &str = r#"
name: child
metadata:
  verified: true
parameters:
  - name: greeting
    type: string
    default: hello
steps:
  - id: one
    type: utility.log
    parameters:
      message: "{{ parameter.greeting }}"
  - id: two
    type: utility.log
    parameters:
      message: done
"#;

const CHILD_UNVERIFIED: &str = r#"
name: rogue
steps:
  - id: one
    type: utility.log
    parameters:
      message: hi
"#;

fn parent_yaml(child_file: &str) -> String {
    format!(
        "name: parent\nsteps:\n  - id: sub\n    type: playbook.run\n    parameters:\n      playbook: {child_file}\n"
    )
}

fn parent_engine(harness: &Harness, child_file: &str) -> Arc<crate::engine::Engine<pilot_core::FakeClock>> {
    // The parent lives in the harness dir so relative child paths resolve
    let parent_path = harness.write_playbook("parent.yaml", &parent_yaml(child_file));
    let playbook = pilot_playbook::load_playbook(&parent_path).expect("parent playbook");
    crate::engine::Engine::new(
        harness.deps.clone(),
        crate::engine::RunRequest {
            execution_id: pilot_core::ExecutionId::new(),
            playbook,
            playbook_path: parent_path.display().to_string(),
            parameters: HashMap::new(),
            debug_mode: false,
            metadata: HashMap::new(),
            cancel: None,
        },
    )
}

#[tokio::test]
async fn verified_child_runs_as_single_parent_step() {
    let harness = Harness::new(vec![]);
    harness.write_playbook("child.yaml", CHILD);
    let (_sub, mut rx) = harness.broadcaster.subscribe();
    let engine = parent_engine(&harness, "child.yaml");
    let parent_id = engine.execution_id().clone();

    let snapshot = drive(&engine).await;

    assert_eq!(snapshot.status, ExecutionStatus::Completed);
    let sub = &snapshot.step_results[0];
    assert_eq!(sub.status, StepStatus::Success);
    assert_eq!(sub.output["status"], json!("completed"));
    assert_eq!(sub.output["steps_executed"], json!(2));
    assert_eq!(sub.output["completed"], json!(true));

    // Child events streamed through the shared broadcaster under the
    // child's own execution id
    let events = drain(&mut rx);
    let child_id = sub.output["execution_id"].as_str().unwrap();
    let child_updates = events
        .iter()
        .filter(|e| matches!(e, Event::ExecutionUpdate(s) if s.execution_id == child_id))
        .count();
    assert!(child_updates >= 2, "expected child events, got {child_updates}");
    assert!(events
        .iter()
        .any(|e| matches!(e, Event::ExecutionUpdate(s) if s.execution_id == parent_id)));
}

#[tokio::test]
async fn child_parameters_come_from_parent_step() {
    let harness = Harness::new(vec![]);
    harness.write_playbook("child.yaml", CHILD);
    let parent_path = harness.write_playbook(
        "parent.yaml",
        "name: parent\nsteps:\n  - id: sub\n    type: playbook.run\n    parameters:\n      playbook: child.yaml\n      greeting: howdy\n      ignored_extra: whatever\n",
    );
    let playbook = pilot_playbook::load_playbook(&parent_path).unwrap();
    let engine = crate::engine::Engine::new(
        harness.deps.clone(),
        crate::engine::RunRequest {
            execution_id: pilot_core::ExecutionId::new(),
            playbook,
            playbook_path: parent_path.display().to_string(),
            parameters: HashMap::new(),
            debug_mode: false,
            metadata: HashMap::new(),
            cancel: None,
        },
    );

    let snapshot = drive(&engine).await;
    assert_eq!(snapshot.status, ExecutionStatus::Completed);

    // The child's first step logged the parent-supplied greeting
    let child_id = snapshot.step_results[0].output["execution_id"].as_str().unwrap();
    let child = harness
        .store
        .get(&pilot_core::ExecutionId::from_string(child_id))
        .unwrap();
    assert_eq!(child.step_results[0].output["message"], json!("howdy"));
}

#[tokio::test]
async fn unverified_child_is_rejected() {
    let harness = Harness::new(vec![]);
    harness.write_playbook("rogue.yaml", CHILD_UNVERIFIED);
    let engine = parent_engine(&harness, "rogue.yaml");

    let snapshot = drive(&engine).await;

    assert_eq!(snapshot.status, ExecutionStatus::Failed);
    let error = snapshot.step_results[0].error.as_ref().unwrap();
    assert_eq!(error.kind, pilot_core::ErrorKind::Verification);
}

#[tokio::test]
async fn missing_child_parameter_fails_fast() {
    let harness = Harness::new(vec![]);
    harness.write_playbook(
        "strict.yaml",
        "name: strict\nmetadata:\n  verified: true\nparameters:\n  - name: must\n    type: string\n    required: true\nsteps:\n  - id: one\n    type: utility.log\n    parameters:\n      message: \"{{ parameter.must }}\"\n",
    );
    let engine = parent_engine(&harness, "strict.yaml");

    let snapshot = drive(&engine).await;

    assert_eq!(snapshot.status, ExecutionStatus::Failed);
    let error = snapshot.step_results[0].error.as_ref().unwrap();
    assert!(error.message.contains("must"));
}

#[tokio::test]
async fn self_invocation_is_a_circular_dependency() {
    let harness = Harness::new(vec![]);
    // A verified playbook that runs itself
    harness.write_playbook(
        "loop.yaml",
        "name: loop\nmetadata:\n  verified: true\nsteps:\n  - id: again\n    type: playbook.run\n    parameters:\n      playbook: loop.yaml\n",
    );
    let loop_path = harness.dir_path.join("loop.yaml");
    let playbook = pilot_playbook::load_playbook(&loop_path).unwrap();
    let engine = crate::engine::Engine::new(
        harness.deps.clone(),
        crate::engine::RunRequest {
            execution_id: pilot_core::ExecutionId::new(),
            playbook,
            playbook_path: loop_path.display().to_string(),
            parameters: HashMap::new(),
            debug_mode: false,
            metadata: HashMap::new(),
            cancel: None,
        },
    );

    let snapshot = drive(&engine).await;

    assert_eq!(snapshot.status, ExecutionStatus::Failed);
    let error = snapshot.step_results[0].error.as_ref().unwrap();
    assert_eq!(error.kind, pilot_core::ErrorKind::CircularDependency);
}

#[tokio::test]
async fn nesting_depth_limit_is_enforced() {
    let harness = Harness::new(vec![]);
    // d1 → d2 → d3 → d4: the fourth level breaches MAX_NESTING_DEPTH
    for (name, next) in [("d1.yaml", "d2.yaml"), ("d2.yaml", "d3.yaml"), ("d3.yaml", "d4.yaml")] {
        harness.write_playbook(
            name,
            &format!(
                "name: {name}\nmetadata:\n  verified: true\nsteps:\n  - id: deeper\n    type: playbook.run\n    parameters:\n      playbook: {next}\n"
            ),
        );
    }
    harness.write_playbook(
        "d4.yaml",
        "name: d4\nmetadata:\n  verified: true\nsteps:\n  - id: leaf\n    type: utility.log\n    parameters:\n      message: bottom\n",
    );
    let engine = parent_engine(&harness, "d1.yaml");

    let snapshot = drive(&engine).await;

    // parent(depth 0) → d1(1) → d2(2) → d3(3) → d4 would be 4: rejected
    assert_eq!(snapshot.status, ExecutionStatus::Failed);
    assert!(snapshot.error.as_deref().unwrap().contains("depth"));
}

#[tokio::test(start_paused = true)]
async fn cancelling_the_parent_cancels_the_child() {
    let harness = Harness::new(vec![]);
    harness.write_playbook(
        "napper.yaml",
        "name: napper\nmetadata:\n  verified: true\nsteps:\n  - id: nap\n    type: utility.wait\n    timeout: 7200\n    parameters:\n      seconds: 3600\n",
    );
    let engine = parent_engine(&harness, "napper.yaml");
    let driver = tokio::spawn(Arc::clone(&engine).run());

    tokio::time::sleep(std::time::Duration::from_secs(1)).await;
    engine.signals().cancel();
    driver.await.unwrap();

    let snapshot = engine.snapshot();
    assert_eq!(snapshot.status, ExecutionStatus::Cancelled);

    // The detached child task finishes its own finalize shortly after
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    // The child also landed terminal in the store
    let children: Vec<_> = harness
        .store
        .list(None)
        .into_iter()
        .filter(|s| s.playbook_name == "napper")
        .collect();
    assert_eq!(children.len(), 1);
    assert!(children[0].status.is_terminal());
}
