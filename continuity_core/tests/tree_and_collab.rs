//! Store behavior across whole operations: cascading deletes (including a
//! backend that fails partway) and edit-lock arbitration between editors.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Duration;
use continuity_core::collab::{EditLockManager, LockStatus, ManualClock};
use continuity_core::error::{CollabError, StoreError, StoreResult};
use continuity_core::tree::{
    BeatDraft, BookDraft, BookId, ChapterDraft, DocumentStore, DocumentWrite, InMemoryDocumentStore,
    NarrativeTree, Node, NodeKey, ProjectId, RootChange, UserId,
};
use tokio::sync::broadcast;

/// Delegates to the in-memory store but fails the N-th `remove`.
#[derive(Debug)]
struct FlakyStore {
    inner: InMemoryDocumentStore,
    removes: AtomicUsize,
    fail_on_remove: usize,
}

impl FlakyStore {
    fn failing_on_remove(n: usize) -> Self {
        Self {
            inner: InMemoryDocumentStore::new(),
            removes: AtomicUsize::new(0),
            fail_on_remove: n,
        }
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn get(&self, project: &ProjectId, key: &NodeKey) -> StoreResult<Option<Node>> {
        self.inner.get(project, key).await
    }

    async fn put(&self, project: &ProjectId, key: NodeKey, node: Node) -> StoreResult<()> {
        self.inner.put(project, key, node).await
    }

    async fn remove(&self, project: &ProjectId, key: &NodeKey) -> StoreResult<()> {
        let n = self.removes.fetch_add(1, Ordering::SeqCst) + 1;
        if n == self.fail_on_remove {
            return Err(StoreError::Backend("connection reset".into()));
        }
        self.inner.remove(project, key).await
    }

    async fn children(
        &self,
        project: &ProjectId,
        parent: &NodeKey,
    ) -> StoreResult<Vec<(NodeKey, Node)>> {
        self.inner.children(project, parent).await
    }

    async fn apply_batch(&self, project: &ProjectId, writes: Vec<DocumentWrite>) -> StoreResult<()> {
        self.inner.apply_batch(project, writes).await
    }

    async fn watch_root(&self, project: &ProjectId) -> broadcast::Receiver<RootChange> {
        self.inner.watch_root(project).await
    }
}

fn project() -> ProjectId {
    ProjectId::from("shattered-realms")
}

fn author() -> UserId {
    UserId::from("author")
}

/// One book; chapter 1 is empty, chapter 2 holds a single beat.
async fn two_chapter_book<S: DocumentStore>(tree: &NarrativeTree<S>) -> BookId {
    tree.get_or_init(&project(), "Shattered Realms", &author())
        .await
        .unwrap();
    let book = tree
        .create_book(&project(), BookDraft::titled("Book One"), &author())
        .await
        .unwrap();
    tree.create_chapter(&project(), book.id, ChapterDraft::titled("Awakening"), &author())
        .await
        .unwrap();
    let second = tree
        .create_chapter(&project(), book.id, ChapterDraft::titled("The Bells"), &author())
        .await
        .unwrap();
    tree.create_beat(
        &project(),
        book.id,
        second.id,
        BeatDraft::titled("First Toll"),
        &author(),
    )
    .await
    .unwrap();
    book.id
}

#[tokio::test]
async fn test_delete_book_removes_all_descendants() {
    let tree = NarrativeTree::new(InMemoryDocumentStore::new());
    let book = two_chapter_book(&tree).await;
    assert_eq!(tree.store().document_count(&project()).await, 5);

    tree.delete_book(&project(), book, &author()).await.unwrap();

    let series = tree.load(&project()).await.unwrap().unwrap();
    assert!(series.books.is_empty());
    // Only the series root is left.
    assert_eq!(tree.store().document_count(&project()).await, 1);
}

#[tokio::test]
async fn test_interrupted_delete_leaves_second_chapter() {
    // Remove #1 is chapter 1; remove #2 (the beat of chapter 2) fails.
    let tree = NarrativeTree::new(FlakyStore::failing_on_remove(2));
    let book = two_chapter_book(&tree).await;

    let err = tree.delete_book(&project(), book, &author()).await.unwrap_err();
    match &err {
        StoreError::PartialCascade { removed, source, .. } => {
            assert_eq!(*removed, 1);
            assert!(matches!(**source, StoreError::Backend(_)));
        }
        other => panic!("expected a partial cascade, got {other:?}"),
    }

    let series = tree.load(&project()).await.unwrap().unwrap();
    let book = series.book(book).expect("book survives the failed delete");
    assert_eq!(book.chapters.len(), 1);
    assert_eq!(book.chapters[0].title, "The Bells");
    assert_eq!(book.chapters[0].beats.len(), 1);
    assert_eq!(book.chapters[0].beats[0].title, "First Toll");
}

#[tokio::test]
async fn test_failed_cascade_still_notifies_watchers() {
    let tree = NarrativeTree::new(FlakyStore::failing_on_remove(1));
    let book = two_chapter_book(&tree).await;
    let mut subscription = tree.subscribe(&project()).await;

    assert!(tree.delete_book(&project(), book, &author()).await.is_err());

    let update = subscription.next().await.unwrap().unwrap();
    assert_eq!(update.modified_by, Some(author()));
    assert!(update.series.is_some());
}

#[tokio::test]
async fn test_lock_mutual_exclusion_and_reclaim() {
    let clock = ManualClock::starting_now();
    let locks = EditLockManager::default().with_clock(Arc::new(clock.clone()));
    let beat = continuity_core::tree::BeatId::new();
    let (ada, ben) = (UserId::from("ada"), UserId::from("ben"));

    locks
        .acquire_lock(&project(), beat, &ada, Some("Ada"))
        .await
        .unwrap();

    clock.advance(Duration::minutes(4) + Duration::seconds(59));
    let err = locks
        .acquire_lock(&project(), beat, &ben, Some("Ben"))
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "This beat is being edited by Ada");
    assert!(matches!(err, CollabError::Conflict { ref holder_id, .. } if *holder_id == ada));

    // Ben cannot release Ada's lock.
    assert!(!locks.release_lock(&project(), beat, &ben).await);

    clock.advance(Duration::seconds(1));
    let lock = locks
        .acquire_lock(&project(), beat, &ben, Some("Ben"))
        .await
        .unwrap();
    assert_eq!(lock.holder_id, ben);
    assert!(locks.lock_status(&project(), beat).await.is_locked());

    assert!(locks.release_lock(&project(), beat, &ben).await);
    assert_eq!(locks.lock_status(&project(), beat).await, LockStatus::Unlocked);
}

#[tokio::test]
async fn test_locks_do_not_block_writes() {
    let tree = NarrativeTree::new(InMemoryDocumentStore::new());
    tree.get_or_init(&project(), "Saga", &author()).await.unwrap();
    let book = tree
        .create_book(&project(), BookDraft::titled("One"), &author())
        .await
        .unwrap();
    let chapter = tree
        .create_chapter(&project(), book.id, ChapterDraft::titled("Opening"), &author())
        .await
        .unwrap();
    let beat = tree
        .create_beat(
            &project(),
            book.id,
            chapter.id,
            BeatDraft::titled("Arrival"),
            &author(),
        )
        .await
        .unwrap();

    let locks = EditLockManager::default();
    locks
        .acquire_lock(&project(), beat.id, &UserId::from("ada"), None)
        .await
        .unwrap();

    // Locks are advisory: another editor can still write the beat.
    let path = continuity_core::tree::BeatPath::new(book.id, chapter.id, beat.id);
    let updated = tree
        .update_beat(
            &project(),
            path,
            continuity_core::tree::BeatUpdate {
                title: Some("Arrival at Dusk".into()),
                ..Default::default()
            },
            &UserId::from("ben"),
        )
        .await
        .unwrap();
    assert_eq!(updated.title, "Arrival at Dusk");
}
