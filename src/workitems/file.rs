use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use super::{failed_state, ExceptionType, ItemSet, WorkItem, WorkItemQueue, WorkItemState};

/// Durable queue kept as a JSON array in a single file.
///
/// Every mutation re-reads the file, applies the change and rewrites the whole
/// file through a `.tmp` sibling and a rename, so readers never see a
/// half-written queue and changes made through another handle are kept.
/// There is no file lock: two processes mutating the same file at the same
/// instant can still lose one write. Run one producer or consumer at a time.
pub struct JsonFileQueue {
    path: PathBuf,
    set: ItemSet,
}

impl JsonFileQueue {
    /// Open the queue at `path`; a missing file is an empty queue.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let items = read_items(&path).await?;
        debug!(path = %path.display(), items = items.len(), "opened work item queue");
        Ok(Self {
            path,
            set: ItemSet::from_items(items),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn items(&self) -> &[WorkItem] {
        self.set.items()
    }

    async fn reload(&mut self) -> Result<()> {
        let items = read_items(&self.path).await?;
        self.set.replace_items(items);
        Ok(())
    }

    async fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let body = serde_json::to_vec_pretty(self.set.items()).context("serializing work items")?;

        let mut tmp_name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "work-items.json".into());
        tmp_name.push(".tmp");
        let tmp = self.path.with_file_name(tmp_name);

        fs::write(&tmp, &body)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("renaming {} to {}", tmp.display(), self.path.display()))?;
        Ok(())
    }
}

async fn read_items(path: &Path) -> Result<Vec<WorkItem>> {
    match fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .with_context(|| format!("parsing work items from {}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(e).with_context(|| format!("reading work items {}", path.display())),
    }
}

#[async_trait]
impl WorkItemQueue for JsonFileQueue {
    async fn enqueue(&mut self, payload: Value) -> Result<String> {
        self.reload().await?;
        let id = self.set.push(payload);
        self.persist().await?;
        Ok(id)
    }

    async fn next_pending(&mut self) -> Result<Option<WorkItem>> {
        Ok(self.set.next_pending())
    }

    async fn mark_done(&mut self, id: &str) -> Result<()> {
        self.reload().await?;
        self.set.transition(id, WorkItemState::Done)?;
        self.persist().await
    }

    async fn mark_failed(
        &mut self,
        id: &str,
        exception: ExceptionType,
        code: &str,
        message: &str,
    ) -> Result<()> {
        self.reload().await?;
        self.set
            .transition(id, failed_state(exception, code, message))?;
        self.persist().await
    }
}
