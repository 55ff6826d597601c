//! Flat document persistence for the narrative tree.
//!
//! The tree is stored as one document per series, book, chapter and beat.
//! Pages and panels are embedded in their beat document. Backends only need
//! per-document atomicity plus one atomic multi-document batch.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::{BeatId, BeatPath, Book, BookId, Chapter, ChapterId, ProjectId, Series, Beat, UserId};
use crate::error::{StoreError, StoreResult};

/// Which level of the tree a document belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Series,
    Book,
    Chapter,
    Beat,
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            NodeKind::Series => "series",
            NodeKind::Book => "book",
            NodeKind::Chapter => "chapter",
            NodeKind::Beat => "beat",
        })
    }
}

/// Address of a document within a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeKey {
    Series,
    Book(BookId),
    Chapter(BookId, ChapterId),
    Beat(BeatPath),
}

impl NodeKey {
    pub fn beat(book: BookId, chapter: ChapterId, beat: BeatId) -> Self {
        NodeKey::Beat(BeatPath::new(book, chapter, beat))
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            NodeKey::Series => NodeKind::Series,
            NodeKey::Book(_) => NodeKind::Book,
            NodeKey::Chapter(..) => NodeKind::Chapter,
            NodeKey::Beat(_) => NodeKind::Beat,
        }
    }

    /// Key of the containing document; `None` for the root.
    pub fn parent(&self) -> Option<NodeKey> {
        match *self {
            NodeKey::Series => None,
            NodeKey::Book(_) => Some(NodeKey::Series),
            NodeKey::Chapter(book, _) => Some(NodeKey::Book(book)),
            NodeKey::Beat(path) => Some(NodeKey::Chapter(path.book, path.chapter)),
        }
    }

    /// Id of the addressed node, as reported in errors.
    pub fn node_id(&self) -> String {
        match self {
            NodeKey::Series => "series".to_string(),
            NodeKey::Book(id) => id.to_string(),
            NodeKey::Chapter(_, id) => id.to_string(),
            NodeKey::Beat(path) => path.beat.to_string(),
        }
    }

    pub fn not_found(&self) -> StoreError {
        StoreError::NotFound {
            kind: self.kind(),
            id: self.node_id(),
        }
    }
}

impl std::fmt::Display for NodeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeKey::Series => f.write_str("series"),
            NodeKey::Book(book) => write!(f, "book/{book}"),
            NodeKey::Chapter(book, chapter) => write!(f, "book/{book}/chapter/{chapter}"),
            NodeKey::Beat(path) => write!(f, "{path}"),
        }
    }
}

/// One stored document. Child collections inside it are always empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Series(Series),
    Book(Book),
    Chapter(Chapter),
    Beat(Beat),
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Series(_) => NodeKind::Series,
            Node::Book(_) => NodeKind::Book,
            Node::Chapter(_) => NodeKind::Chapter,
            Node::Beat(_) => NodeKind::Beat,
        }
    }

    /// Position among siblings: book or chapter number, beat sequence.
    pub fn ordinal(&self) -> u32 {
        match self {
            Node::Series(_) => 0,
            Node::Book(book) => book.number,
            Node::Chapter(chapter) => chapter.number,
            Node::Beat(beat) => beat.sequence,
        }
    }

    pub fn into_series(self) -> Option<Series> {
        match self {
            Node::Series(series) => Some(series),
            _ => None,
        }
    }

    pub fn into_book(self) -> Option<Book> {
        match self {
            Node::Book(book) => Some(book),
            _ => None,
        }
    }

    pub fn into_chapter(self) -> Option<Chapter> {
        match self {
            Node::Chapter(chapter) => Some(chapter),
            _ => None,
        }
    }

    pub fn into_beat(self) -> Option<Beat> {
        match self {
            Node::Beat(beat) => Some(beat),
            _ => None,
        }
    }
}

/// A document write paired with its address.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentWrite {
    pub key: NodeKey,
    pub node: Node,
}

impl DocumentWrite {
    pub fn new(key: NodeKey, node: Node) -> Self {
        Self { key, node }
    }

    /// Reject writes whose payload does not match the addressed level.
    pub fn check(&self) -> StoreResult<()> {
        if self.key.kind() == self.node.kind() {
            Ok(())
        } else {
            Err(StoreError::Backend(format!(
                "cannot store a {} document at {}",
                self.node.kind(),
                self.key
            )))
        }
    }
}

/// Notification that the series root document was written.
#[derive(Debug, Clone, PartialEq)]
pub struct RootChange {
    pub project: ProjectId,
    pub modified_by: Option<UserId>,
    pub modified_at: Option<DateTime<Utc>>,
}

/// Storage seam for the narrative tree.
///
/// Every call is atomic for the single document it addresses;
/// [`DocumentStore::apply_batch`] is atomic for all of its writes. Nothing
/// else is: multi-document sequences performed by callers may interleave
/// with other writers or stop halfway.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, project: &ProjectId, key: &NodeKey) -> StoreResult<Option<Node>>;

    /// Create or replace a document.
    async fn put(&self, project: &ProjectId, key: NodeKey, node: Node) -> StoreResult<()>;

    /// Remove a document. Removing a missing document is not an error, and
    /// children are left untouched.
    async fn remove(&self, project: &ProjectId, key: &NodeKey) -> StoreResult<()>;

    /// Direct children of `parent` in no particular order.
    async fn children(&self, project: &ProjectId, parent: &NodeKey)
        -> StoreResult<Vec<(NodeKey, Node)>>;

    /// Apply every write or none of them.
    async fn apply_batch(&self, project: &ProjectId, writes: Vec<DocumentWrite>) -> StoreResult<()>;

    /// Subscribe to writes of the series root document.
    ///
    /// Only the root is watched; writes to books, chapters and beats do not
    /// notify on their own.
    async fn watch_root(&self, project: &ProjectId) -> broadcast::Receiver<RootChange>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_chain() {
        let book = BookId::new();
        let chapter = ChapterId::new();
        let beat = NodeKey::beat(book, chapter, BeatId::new());

        assert_eq!(beat.parent(), Some(NodeKey::Chapter(book, chapter)));
        assert_eq!(NodeKey::Chapter(book, chapter).parent(), Some(NodeKey::Book(book)));
        assert_eq!(NodeKey::Book(book).parent(), Some(NodeKey::Series));
        assert_eq!(NodeKey::Series.parent(), None);
    }

    #[test]
    fn test_write_kind_check() {
        let ok = DocumentWrite::new(NodeKey::Series, Node::Series(Series::new("Saga")));
        assert!(ok.check().is_ok());

        let bad = DocumentWrite::new(NodeKey::Book(BookId::new()), Node::Beat(Beat::default()));
        assert!(matches!(bad.check(), Err(StoreError::Backend(_))));
    }

    #[test]
    fn test_not_found_reports_kind() {
        let book = BookId::new();
        let err = NodeKey::Book(book).not_found();
        assert_eq!(err.to_string(), format!("book {book} not found"));
    }
}
