// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-log execution store.
//!
//! Every mutation appends one JSONL record and updates the in-memory
//! index; `open` replays the log to rebuild the index. All writes go
//! through one mutex, which also serializes writes per execution.

use crate::rows::{ExecutionRow, StepRow};
use parking_lot::Mutex;
use pilot_core::{ExecutionId, ExecutionSnapshot, ExecutionStatus, StepResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use thiserror::Error;

const LOG_FILE: &str = "executions.jsonl";
const SCREENSHOT_DIR: &str = "screenshots";

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("unknown execution: {0}")]
    NotFound(ExecutionId),

    #[error("execution {0} is not terminal")]
    NotTerminal(ExecutionId),
}

/// One record of the append log.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "op")]
enum LogRecord {
    #[serde(rename = "execution:upsert")]
    ExecutionUpsert { row: ExecutionRow },

    #[serde(rename = "step:record")]
    StepRecord { row: StepRow },

    #[serde(rename = "execution:delete")]
    ExecutionDelete { execution_id: ExecutionId },
}

struct StoreInner {
    log: File,
    executions: HashMap<ExecutionId, ExecutionRow>,
    steps: HashMap<ExecutionId, Vec<StepRow>>,
}

impl StoreInner {
    fn apply(&mut self, record: LogRecord) {
        match record {
            LogRecord::ExecutionUpsert { row } => {
                self.executions.insert(row.execution_id.clone(), row);
            }
            LogRecord::StepRecord { row } => {
                self.steps
                    .entry(row.execution_id.clone())
                    .or_default()
                    .push(row);
            }
            LogRecord::ExecutionDelete { execution_id } => {
                self.executions.remove(&execution_id);
                self.steps.remove(&execution_id);
            }
        }
    }

    fn append(&mut self, record: &LogRecord) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        self.log.write_all(line.as_bytes())?;
        Ok(())
    }
}

/// Durable execution history under a data directory.
pub struct ExecutionStore {
    data_dir: PathBuf,
    inner: Mutex<StoreInner>,
}

impl ExecutionStore {
    /// Open (or create) the store, replaying any existing log.
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir)?;
        let log_path = data_dir.join(LOG_FILE);

        let mut inner = StoreInner {
            log: OpenOptions::new().append(true).create(true).open(&log_path)?,
            executions: HashMap::new(),
            steps: HashMap::new(),
        };

        if log_path.exists() {
            let reader = BufReader::new(File::open(&log_path)?);
            for (lineno, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<LogRecord>(&line) {
                    Ok(record) => inner.apply(record),
                    Err(e) => {
                        // A torn tail write is survivable
                        tracing::warn!(line = lineno + 1, error = %e, "skipping corrupt log record");
                    }
                }
            }
        }

        Ok(Self {
            data_dir,
            inner: Mutex::new(inner),
        })
    }

    /// Directory for an execution's screenshot files.
    pub fn screenshot_dir(&self, execution_id: &ExecutionId) -> PathBuf {
        self.data_dir.join(SCREENSHOT_DIR).join(execution_id.as_str())
    }

    /// Upsert the execution row from a snapshot.
    ///
    /// Called at run creation and on status changes; the last call wins.
    pub fn record_execution(&self, snapshot: &ExecutionSnapshot) -> Result<(), StoreError> {
        let record = LogRecord::ExecutionUpsert {
            row: ExecutionRow::from(snapshot),
        };
        let mut inner = self.inner.lock();
        inner.append(&record)?;
        inner.apply(record);
        Ok(())
    }

    /// Record one step state transition.
    ///
    /// Idempotent: re-recording a transition identical to the step's most
    /// recent row (same status, same started_at) is a no-op, so replays do
    /// not duplicate rows while re-executions still append fresh audit
    /// entries.
    pub fn record_step(
        &self,
        execution_id: &ExecutionId,
        result: &StepResult,
        recorded_at_ms: u64,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if let Some(rows) = inner.steps.get(execution_id) {
            if let Some(last) = rows.iter().rev().find(|r| r.step_id == result.step_id) {
                if last.status == result.status && last.result.started_at_ms == result.started_at_ms
                {
                    return Ok(());
                }
            }
        }
        let record = LogRecord::StepRecord {
            row: StepRow {
                execution_id: execution_id.clone(),
                step_id: result.step_id.clone(),
                status: result.status,
                result: result.clone(),
                recorded_at_ms,
            },
        };
        inner.append(&record)?;
        inner.apply(record);
        Ok(())
    }

    /// Record the final state of a run at engine teardown.
    pub fn finalize(&self, snapshot: &ExecutionSnapshot) -> Result<(), StoreError> {
        self.record_execution(snapshot)
    }

    /// Fetch one execution with its latest step results.
    pub fn get(&self, execution_id: &ExecutionId) -> Option<ExecutionSnapshot> {
        let inner = self.inner.lock();
        let row = inner.executions.get(execution_id)?;
        Some(row.to_snapshot(latest_results(inner.steps.get(execution_id))))
    }

    /// All recorded executions, optionally filtered by status, newest first.
    pub fn list(&self, status: Option<ExecutionStatus>) -> Vec<ExecutionSnapshot> {
        let inner = self.inner.lock();
        let mut snapshots: Vec<ExecutionSnapshot> = inner
            .executions
            .values()
            .filter(|row| status.is_none_or(|s| row.status == s))
            .map(|row| row.to_snapshot(latest_results(inner.steps.get(&row.execution_id))))
            .collect();
        snapshots.sort_by(|a, b| b.started_at_ms.cmp(&a.started_at_ms));
        snapshots
    }

    /// Full step audit for an execution, in transition order.
    pub fn step_history(&self, execution_id: &ExecutionId) -> Vec<StepRow> {
        self.inner
            .lock()
            .steps
            .get(execution_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Delete a terminal execution: history rows and screenshot files.
    pub fn delete(&self, execution_id: &ExecutionId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        let row = inner
            .executions
            .get(execution_id)
            .ok_or_else(|| StoreError::NotFound(execution_id.clone()))?;
        if !row.status.is_terminal() {
            return Err(StoreError::NotTerminal(execution_id.clone()));
        }
        let record = LogRecord::ExecutionDelete {
            execution_id: execution_id.clone(),
        };
        inner.append(&record)?;
        inner.apply(record);
        drop(inner);

        let dir = self.screenshot_dir(execution_id);
        if dir.exists() {
            if let Err(e) = std::fs::remove_dir_all(&dir) {
                tracing::warn!(execution_id = %execution_id, error = %e, "failed to remove screenshots");
            }
        }
        Ok(())
    }
}

/// Latest result per step id, preserving first-transition order.
fn latest_results(rows: Option<&Vec<StepRow>>) -> Vec<StepResult> {
    let Some(rows) = rows else {
        return Vec::new();
    };
    let mut order: Vec<&str> = Vec::new();
    let mut latest: HashMap<&str, &StepResult> = HashMap::new();
    for row in rows {
        if !latest.contains_key(row.step_id.as_str()) {
            order.push(row.step_id.as_str());
        }
        latest.insert(row.step_id.as_str(), &row.result);
    }
    order
        .into_iter()
        .filter_map(|id| latest.get(id).copied().cloned())
        .collect()
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
