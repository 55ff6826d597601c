//! In-memory [`DocumentStore`] backend.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};
use tracing::trace;

use super::document::{DocumentStore, DocumentWrite, Node, NodeKey, RootChange};
use super::ProjectId;
use crate::error::StoreResult;

const WATCH_CAPACITY: usize = 64;

type ProjectDocuments = BTreeMap<NodeKey, Node>;

/// Document store that keeps every project in a map behind an `RwLock`.
///
/// Clones share the same underlying data. Root watchers are notified after
/// the write lock is released.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDocumentStore {
    projects: Arc<RwLock<HashMap<ProjectId, ProjectDocuments>>>,
    watchers: Arc<RwLock<HashMap<ProjectId, broadcast::Sender<RootChange>>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents stored for a project (for testing).
    pub async fn document_count(&self, project: &ProjectId) -> usize {
        self.projects
            .read()
            .await
            .get(project)
            .map_or(0, BTreeMap::len)
    }

    async fn notify_root(&self, project: &ProjectId, series: Option<&Node>) {
        let watchers = self.watchers.read().await;
        let Some(sender) = watchers.get(project) else {
            return;
        };

        let (modified_by, modified_at) = match series {
            Some(Node::Series(series)) => (series.last_modified_by.clone(), series.last_modified),
            _ => (None, None),
        };

        // No receivers is fine.
        let _ = sender.send(RootChange {
            project: project.clone(),
            modified_by,
            modified_at,
        });
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, project: &ProjectId, key: &NodeKey) -> StoreResult<Option<Node>> {
        Ok(self
            .projects
            .read()
            .await
            .get(project)
            .and_then(|docs| docs.get(key))
            .cloned())
    }

    async fn put(&self, project: &ProjectId, key: NodeKey, node: Node) -> StoreResult<()> {
        let write = DocumentWrite::new(key, node);
        write.check()?;

        let root = (key == NodeKey::Series).then(|| write.node.clone());
        {
            let mut projects = self.projects.write().await;
            projects
                .entry(project.clone())
                .or_default()
                .insert(write.key, write.node);
        }
        trace!(%project, %key, "document written");

        if root.is_some() {
            self.notify_root(project, root.as_ref()).await;
        }
        Ok(())
    }

    async fn remove(&self, project: &ProjectId, key: &NodeKey) -> StoreResult<()> {
        let removed = {
            let mut projects = self.projects.write().await;
            projects
                .get_mut(project)
                .and_then(|docs| docs.remove(key))
                .is_some()
        };
        trace!(%project, %key, removed, "document removed");

        if removed && *key == NodeKey::Series {
            self.notify_root(project, None).await;
        }
        Ok(())
    }

    async fn children(
        &self,
        project: &ProjectId,
        parent: &NodeKey,
    ) -> StoreResult<Vec<(NodeKey, Node)>> {
        let projects = self.projects.read().await;
        let Some(docs) = projects.get(project) else {
            return Ok(Vec::new());
        };

        Ok(docs
            .iter()
            .filter(|(key, _)| key.parent().as_ref() == Some(parent))
            .map(|(key, node)| (*key, node.clone()))
            .collect())
    }

    async fn apply_batch(&self, project: &ProjectId, writes: Vec<DocumentWrite>) -> StoreResult<()> {
        // Validate everything before touching the map so the batch is all-or-nothing.
        for write in &writes {
            write.check()?;
        }

        let root = writes
            .iter()
            .rev()
            .find(|w| w.key == NodeKey::Series)
            .map(|w| w.node.clone());
        let count = writes.len();
        {
            let mut projects = self.projects.write().await;
            let docs = projects.entry(project.clone()).or_default();
            for write in writes {
                docs.insert(write.key, write.node);
            }
        }
        trace!(%project, count, "batch applied");

        if root.is_some() {
            self.notify_root(project, root.as_ref()).await;
        }
        Ok(())
    }

    async fn watch_root(&self, project: &ProjectId) -> broadcast::Receiver<RootChange> {
        let mut watchers = self.watchers.write().await;
        watchers
            .entry(project.clone())
            .or_insert_with(|| broadcast::channel(WATCH_CAPACITY).0)
            .subscribe()
    }
}
