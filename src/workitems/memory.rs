use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use super::{failed_state, ExceptionType, ItemSet, WorkItem, WorkItemQueue, WorkItemState};

/// Non-durable queue with the same semantics as [`super::JsonFileQueue`].
#[derive(Debug, Default)]
pub struct MemoryQueue {
    set: ItemSet,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with pending items, in order.
    pub fn with_payloads(payloads: impl IntoIterator<Item = Value>) -> Self {
        let mut q = Self::new();
        for p in payloads {
            q.set.push(p);
        }
        q
    }

    pub fn items(&self) -> &[WorkItem] {
        self.set.items()
    }
}

#[async_trait]
impl WorkItemQueue for MemoryQueue {
    async fn enqueue(&mut self, payload: Value) -> Result<String> {
        Ok(self.set.push(payload))
    }

    async fn next_pending(&mut self) -> Result<Option<WorkItem>> {
        Ok(self.set.next_pending())
    }

    async fn mark_done(&mut self, id: &str) -> Result<()> {
        self.set.transition(id, WorkItemState::Done)
    }

    async fn mark_failed(
        &mut self,
        id: &str,
        exception: ExceptionType,
        code: &str,
        message: &str,
    ) -> Result<()> {
        self.set
            .transition(id, failed_state(exception, code, message))
    }
}
