// src/workitems/mod.rs
//! Work-item queue adapters.
//!
//! A work item is created `Pending` and moves exactly once to `Done` or
//! `Failed`. Terminal states are final; marking an item twice is an error.

pub mod file;
pub mod memory;

pub use file::JsonFileQueue;
pub use memory::MemoryQueue;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Failure classification reported with `mark_failed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExceptionType {
    /// The item's own data is invalid.
    Business,
    /// A downstream system misbehaved.
    Application,
}

impl ExceptionType {
    pub fn as_str(&self) -> &str {
        match self {
            ExceptionType::Business => "BUSINESS",
            ExceptionType::Application => "APPLICATION",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum WorkItemState {
    Pending,
    Done,
    Failed {
        exception: ExceptionType,
        code: String,
        message: String,
    },
}

impl WorkItemState {
    pub fn as_str(&self) -> &str {
        match self {
            WorkItemState::Pending => "pending",
            WorkItemState::Done => "done",
            WorkItemState::Failed { .. } => "failed",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: String,
    pub payload: Value,
    pub state: WorkItemState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Queue contract shared by producer and consumer.
#[async_trait]
pub trait WorkItemQueue: Send {
    /// Append a new pending item and return its id.
    async fn enqueue(&mut self, payload: Value) -> Result<String>;

    /// Next pending item in queue order. Each item is handed out at most once
    /// per queue handle; `None` once the queue is drained.
    async fn next_pending(&mut self) -> Result<Option<WorkItem>>;

    async fn mark_done(&mut self, id: &str) -> Result<()>;

    async fn mark_failed(
        &mut self,
        id: &str,
        exception: ExceptionType,
        code: &str,
        message: &str,
    ) -> Result<()>;
}

/// Item list plus read cursor; the state both adapters share.
#[derive(Debug, Default)]
pub(crate) struct ItemSet {
    items: Vec<WorkItem>,
    cursor: usize,
}

impl ItemSet {
    pub(crate) fn from_items(items: Vec<WorkItem>) -> Self {
        Self { items, cursor: 0 }
    }

    pub(crate) fn items(&self) -> &[WorkItem] {
        &self.items
    }

    /// Swap in a fresher copy of the list. The cursor is kept; items are only
    /// ever appended, so positions before it still refer to the same items.
    pub(crate) fn replace_items(&mut self, items: Vec<WorkItem>) {
        self.items = items;
    }

    pub(crate) fn push(&mut self, payload: Value) -> String {
        let now = Utc::now();
        let id = format!("{}-{:05}", now.timestamp_micros(), self.items.len());
        self.items.push(WorkItem {
            id: id.clone(),
            payload,
            state: WorkItemState::Pending,
            created_at: now,
            updated_at: now,
        });
        id
    }

    pub(crate) fn next_pending(&mut self) -> Option<WorkItem> {
        while self.cursor < self.items.len() {
            let idx = self.cursor;
            self.cursor += 1;
            if self.items[idx].state == WorkItemState::Pending {
                return Some(self.items[idx].clone());
            }
        }
        None
    }

    pub(crate) fn transition(&mut self, id: &str, next: WorkItemState) -> Result<()> {
        let Some(item) = self.items.iter_mut().find(|i| i.id == id) else {
            bail!("unknown work item {}", id);
        };
        if item.state != WorkItemState::Pending {
            bail!(
                "work item {} is already {}; cannot mark it {}",
                id,
                item.state.as_str(),
                next.as_str()
            );
        }
        item.state = next;
        item.updated_at = Utc::now();
        Ok(())
    }
}

pub(crate) fn failed_state(exception: ExceptionType, code: &str, message: &str) -> WorkItemState {
    WorkItemState::Failed {
        exception,
        code: code.to_string(),
        message: message.to_string(),
    }
}
