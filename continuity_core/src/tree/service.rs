//! Tree-level operations on top of a [`DocumentStore`].
//!
//! Every mutation is one or more single-document writes followed by a touch
//! of the series root, which is what wakes up [`TreeSubscription`]s.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use story_catalog::{EntityKind, Rename};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::document::{DocumentStore, DocumentWrite, Node, NodeKey, RootChange};
use super::model::*;
use super::{BeatId, BeatPath, BookId, ChapterId, ProjectId, UserId};
use crate::collab::{SharedClock, SystemClock};
use crate::error::{StoreError, StoreResult};

/// The narrative tree of every project held by one document store.
#[derive(Debug)]
pub struct NarrativeTree<S> {
    store: Arc<S>,
    clock: SharedClock,
}

impl<S> Clone for NarrativeTree<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<S: DocumentStore> NarrativeTree<S> {
    pub fn new(store: S) -> Self {
        Self::from_shared(Arc::new(store))
    }

    pub fn from_shared(store: Arc<S>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
        }
    }

    /// Use a different time source for write stamps.
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Read the whole tree, sorted at every level.
    ///
    /// Returns `None` if the project has no series document yet. The read is
    /// not a snapshot: concurrent writes may be partially visible.
    pub async fn load(&self, project: &ProjectId) -> StoreResult<Option<Series>> {
        let Some(mut series) = self.get_series(project).await? else {
            return Ok(None);
        };

        series.books.clear();
        for (book_key, node) in self.store.children(project, &NodeKey::Series).await? {
            let (NodeKey::Book(book_id), Some(mut book)) = (book_key, node.into_book()) else {
                continue;
            };
            book.id = book_id;
            book.chapters.clear();

            for (chapter_key, node) in self.store.children(project, &book_key).await? {
                let (NodeKey::Chapter(_, chapter_id), Some(mut chapter)) =
                    (chapter_key, node.into_chapter())
                else {
                    continue;
                };
                chapter.id = chapter_id;
                chapter.beats = self
                    .store
                    .children(project, &chapter_key)
                    .await?
                    .into_iter()
                    .filter_map(|(key, node)| match (key, node.into_beat()) {
                        (NodeKey::Beat(path), Some(mut beat)) => {
                            beat.id = path.beat;
                            Some(beat)
                        }
                        _ => None,
                    })
                    .collect();
                book.chapters.push(chapter);
            }
            series.books.push(book);
        }

        series.sort();
        Ok(Some(series))
    }

    /// Read the tree, creating an empty series document first if needed.
    pub async fn get_or_init(
        &self,
        project: &ProjectId,
        title: &str,
        user: &UserId,
    ) -> StoreResult<Series> {
        if let Some(series) = self.load(project).await? {
            return Ok(series);
        }

        let title = if title.trim().is_empty() {
            "Untitled Series"
        } else {
            title
        };
        let now = self.now();
        let series = Series {
            created_by: Some(user.clone()),
            last_modified: Some(now),
            last_modified_by: Some(user.clone()),
            ..Series::new(title)
        };
        self.store
            .put(project, NodeKey::Series, Node::Series(series.clone()))
            .await?;
        info!(%project, %user, title, "initialized series");
        Ok(series)
    }

    async fn get_series(&self, project: &ProjectId) -> StoreResult<Option<Series>> {
        Ok(self
            .store
            .get(project, &NodeKey::Series)
            .await?
            .and_then(Node::into_series))
    }

    async fn get_book(&self, project: &ProjectId, book: BookId) -> StoreResult<Book> {
        let key = NodeKey::Book(book);
        self.store
            .get(project, &key)
            .await?
            .and_then(Node::into_book)
            .ok_or_else(|| key.not_found())
    }

    async fn get_chapter(
        &self,
        project: &ProjectId,
        book: BookId,
        chapter: ChapterId,
    ) -> StoreResult<Chapter> {
        let key = NodeKey::Chapter(book, chapter);
        self.store
            .get(project, &key)
            .await?
            .and_then(Node::into_chapter)
            .ok_or_else(|| key.not_found())
    }

    /// Read a single beat document including its pages.
    pub async fn get_beat(&self, project: &ProjectId, path: BeatPath) -> StoreResult<Beat> {
        let key = NodeKey::Beat(path);
        self.store
            .get(project, &key)
            .await?
            .and_then(Node::into_beat)
            .ok_or_else(|| key.not_found())
    }

    async fn next_ordinal(&self, project: &ProjectId, parent: &NodeKey) -> StoreResult<u32> {
        // Not transactional: concurrent creates can pick the same ordinal.
        let siblings = self.store.children(project, parent).await?.len();
        Ok(u32::try_from(siblings).unwrap_or(u32::MAX).saturating_add(1))
    }

    /// Bump the series stamps so root watchers fire. Failures are logged and
    /// swallowed: the write itself already happened.
    async fn touch(&self, project: &ProjectId, user: &UserId) {
        let result = async {
            let mut series = self
                .get_series(project)
                .await?
                .ok_or_else(|| NodeKey::Series.not_found())?;
            series.last_modified = Some(self.now());
            series.last_modified_by = Some(user.clone());
            self.store
                .put(project, NodeKey::Series, Node::Series(series))
                .await
        }
        .await;

        if let Err(error) = result {
            warn!(%project, %user, %error, "failed to touch series root");
        }
    }

    // -----------------------------------------------------------------------
    // Series
    // -----------------------------------------------------------------------

    pub async fn update_series(
        &self,
        project: &ProjectId,
        update: SeriesUpdate,
        user: &UserId,
    ) -> StoreResult<Series> {
        let mut series = self
            .get_series(project)
            .await?
            .ok_or_else(|| NodeKey::Series.not_found())?;
        update.apply(&mut series);
        series.last_modified = Some(self.now());
        series.last_modified_by = Some(user.clone());
        self.store
            .put(project, NodeKey::Series, Node::Series(series.clone()))
            .await?;
        debug!(%project, %user, "updated series");
        Ok(series)
    }

    // -----------------------------------------------------------------------
    // Books
    // -----------------------------------------------------------------------

    pub async fn create_book(
        &self,
        project: &ProjectId,
        draft: BookDraft,
        user: &UserId,
    ) -> StoreResult<Book> {
        let book = self.write_new_book(project, draft, user).await?;
        self.touch(project, user).await;
        Ok(book)
    }

    async fn write_new_book(
        &self,
        project: &ProjectId,
        draft: BookDraft,
        user: &UserId,
    ) -> StoreResult<Book> {
        let number = match draft.number {
            Some(number) => number,
            None => self.next_ordinal(project, &NodeKey::Series).await?,
        };
        let now = self.now();
        let book = Book {
            id: BookId::new(),
            number,
            title: draft.title,
            logline: draft.logline,
            estimated_pages: draft.estimated_pages,
            created_by: Some(user.clone()),
            updated_at: Some(now),
            updated_by: Some(user.clone()),
            chapters: Vec::new(),
        };
        self.store
            .put(project, NodeKey::Book(book.id), Node::Book(book.clone()))
            .await?;
        info!(%project, book = %book.id, number, "created book");
        Ok(book)
    }

    pub async fn update_book(
        &self,
        project: &ProjectId,
        book: BookId,
        update: BookUpdate,
        user: &UserId,
    ) -> StoreResult<Book> {
        let mut doc = self.get_book(project, book).await?;
        update.apply(&mut doc);
        doc.updated_at = Some(self.now());
        doc.updated_by = Some(user.clone());
        self.store
            .put(project, NodeKey::Book(book), Node::Book(doc.clone()))
            .await?;
        debug!(%project, %book, "updated book");
        self.touch(project, user).await;
        Ok(doc)
    }

    /// Delete a book with all of its chapters and beats.
    ///
    /// Descendants are removed one document at a time (beats, then their
    /// chapter), and the book last. On failure the documents already removed
    /// stay removed and [`StoreError::PartialCascade`] reports how many.
    pub async fn delete_book(
        &self,
        project: &ProjectId,
        book: BookId,
        user: &UserId,
    ) -> StoreResult<()> {
        let key = NodeKey::Book(book);
        self.get_book(project, book).await?;

        let mut removed = 0;
        let result = async {
            for chapter_key in self.children_in_order(project, &key).await? {
                self.remove_chapter_documents(project, chapter_key, &mut removed)
                    .await?;
            }
            self.store.remove(project, &key).await
        }
        .await;

        self.finish_cascade(project, key, removed, result, user).await
    }

    // -----------------------------------------------------------------------
    // Chapters
    // -----------------------------------------------------------------------

    pub async fn create_chapter(
        &self,
        project: &ProjectId,
        book: BookId,
        draft: ChapterDraft,
        user: &UserId,
    ) -> StoreResult<Chapter> {
        let (chapter, beats) = self.write_new_chapter(project, book, draft, user).await?;
        if !beats.is_empty() {
            self.save_beats_for_chapter(project, book, chapter.id, beats, user)
                .await?;
        }
        self.touch(project, user).await;
        Ok(chapter)
    }

    async fn write_new_chapter(
        &self,
        project: &ProjectId,
        book: BookId,
        draft: ChapterDraft,
        user: &UserId,
    ) -> StoreResult<(Chapter, Vec<BeatWrite>)> {
        self.get_book(project, book).await?;
        let number = match draft.number {
            Some(number) => number,
            None => self.next_ordinal(project, &NodeKey::Book(book)).await?,
        };
        let now = self.now();
        let chapter = Chapter {
            id: ChapterId::new(),
            number,
            title: draft.title,
            summary: draft.summary,
            pov: draft.pov,
            emotional_arc: draft.emotional_arc,
            estimated_pages: draft.estimated_pages,
            created_by: Some(user.clone()),
            updated_at: Some(now),
            updated_by: Some(user.clone()),
            beats: Vec::new(),
        };
        self.store
            .put(
                project,
                NodeKey::Chapter(book, chapter.id),
                Node::Chapter(chapter.clone()),
            )
            .await?;
        info!(%project, %book, chapter = %chapter.id, number, "created chapter");

        let beats = draft.beats.into_iter().map(NodeWrite::Create).collect();
        Ok((chapter, beats))
    }

    pub async fn update_chapter(
        &self,
        project: &ProjectId,
        book: BookId,
        chapter: ChapterId,
        update: ChapterUpdate,
        user: &UserId,
    ) -> StoreResult<Chapter> {
        let mut doc = self.get_chapter(project, book, chapter).await?;
        update.apply(&mut doc);
        doc.updated_at = Some(self.now());
        doc.updated_by = Some(user.clone());
        self.store
            .put(
                project,
                NodeKey::Chapter(book, chapter),
                Node::Chapter(doc.clone()),
            )
            .await?;
        debug!(%project, %book, %chapter, "updated chapter");
        self.touch(project, user).await;
        Ok(doc)
    }

    /// Delete a chapter and its beats, one document at a time.
    pub async fn delete_chapter(
        &self,
        project: &ProjectId,
        book: BookId,
        chapter: ChapterId,
        user: &UserId,
    ) -> StoreResult<()> {
        let key = NodeKey::Chapter(book, chapter);
        self.get_chapter(project, book, chapter).await?;

        let mut removed = 0;
        let result = self.remove_chapter_documents(project, key, &mut removed).await;
        // The chapter itself was counted; report descendants only.
        let removed = if result.is_ok() { removed - 1 } else { removed };

        self.finish_cascade(project, key, removed, result, user).await
    }

    async fn remove_chapter_documents(
        &self,
        project: &ProjectId,
        chapter_key: NodeKey,
        removed: &mut usize,
    ) -> StoreResult<()> {
        for beat_key in self.children_in_order(project, &chapter_key).await? {
            self.store.remove(project, &beat_key).await?;
            *removed += 1;
        }
        self.store.remove(project, &chapter_key).await?;
        *removed += 1;
        Ok(())
    }

    /// Child keys sorted by ordinal, so cascades run in story order.
    async fn children_in_order(
        &self,
        project: &ProjectId,
        parent: &NodeKey,
    ) -> StoreResult<Vec<NodeKey>> {
        let mut children = self.store.children(project, parent).await?;
        children.sort_by_key(|(_, node)| node.ordinal());
        Ok(children.into_iter().map(|(key, _)| key).collect())
    }

    async fn finish_cascade(
        &self,
        project: &ProjectId,
        node: NodeKey,
        removed: usize,
        result: StoreResult<()>,
        user: &UserId,
    ) -> StoreResult<()> {
        match result {
            Ok(()) => {
                info!(%project, %node, removed, "deleted node with descendants");
                self.touch(project, user).await;
                Ok(())
            }
            Err(error) => {
                warn!(%project, %node, removed, %error, "cascading delete stopped partway");
                // Readers should still see what was removed.
                self.touch(project, user).await;
                Err(StoreError::PartialCascade {
                    node,
                    removed,
                    source: Box::new(error),
                })
            }
        }
    }

    // -----------------------------------------------------------------------
    // Beats
    // -----------------------------------------------------------------------

    pub async fn create_beat(
        &self,
        project: &ProjectId,
        book: BookId,
        chapter: ChapterId,
        draft: BeatDraft,
        user: &UserId,
    ) -> StoreResult<Beat> {
        self.get_chapter(project, book, chapter).await?;
        let parent = NodeKey::Chapter(book, chapter);
        let sequence = match draft.sequence {
            Some(sequence) => sequence,
            None => self.next_ordinal(project, &parent).await?,
        };
        let beat = self.beat_from_draft(draft, sequence, user);
        self.store
            .put(
                project,
                NodeKey::beat(book, chapter, beat.id),
                Node::Beat(beat.clone()),
            )
            .await?;
        info!(%project, %book, %chapter, beat = %beat.id, sequence, "created beat");
        self.touch(project, user).await;
        Ok(beat)
    }

    fn beat_from_draft(&self, draft: BeatDraft, sequence: u32, user: &UserId) -> Beat {
        let now = self.now();
        Beat {
            id: BeatId::new(),
            sequence,
            title: draft.title,
            summary: draft.summary,
            purpose: draft.purpose,
            beat_type: draft.beat_type,
            characters: draft.characters,
            location: draft.location,
            estimated_pages: draft.estimated_pages,
            pages: draft.pages,
            created_by: Some(user.clone()),
            updated_at: Some(now),
            updated_by: Some(user.clone()),
            pages_updated_at: None,
            pages_updated_by: None,
        }
    }

    pub async fn update_beat(
        &self,
        project: &ProjectId,
        path: BeatPath,
        update: BeatUpdate,
        user: &UserId,
    ) -> StoreResult<Beat> {
        let mut beat = self.get_beat(project, path).await?;
        update.apply(&mut beat);
        beat.updated_at = Some(self.now());
        beat.updated_by = Some(user.clone());
        self.put_beat(project, path, &beat).await?;
        debug!(%project, %path, "updated beat");
        self.touch(project, user).await;
        Ok(beat)
    }

    pub async fn delete_beat(
        &self,
        project: &ProjectId,
        path: BeatPath,
        user: &UserId,
    ) -> StoreResult<()> {
        self.get_beat(project, path).await?;
        self.store.remove(project, &NodeKey::Beat(path)).await?;
        info!(%project, %path, "deleted beat");
        self.touch(project, user).await;
        Ok(())
    }

    async fn put_beat(&self, project: &ProjectId, path: BeatPath, beat: &Beat) -> StoreResult<()> {
        self.store
            .put(project, NodeKey::Beat(path), Node::Beat(beat.clone()))
            .await
    }

    // -----------------------------------------------------------------------
    // Pages & panels
    // -----------------------------------------------------------------------

    /// Replace the beat's whole pages array. Last writer wins.
    pub async fn save_pages(
        &self,
        project: &ProjectId,
        path: BeatPath,
        pages: Vec<Page>,
        user: &UserId,
    ) -> StoreResult<Beat> {
        let mut beat = self.get_beat(project, path).await?;
        let now = self.now();
        let count = pages.len();
        beat.pages = pages;
        beat.pages_updated_at = Some(now);
        beat.pages_updated_by = Some(user.clone());
        beat.updated_at = Some(now);
        beat.updated_by = Some(user.clone());
        self.put_beat(project, path, &beat).await?;
        debug!(%project, %path, pages = count, "saved pages");
        self.touch(project, user).await;
        Ok(beat)
    }

    /// Replace the panels (and layout notes) of one page.
    pub async fn save_panels(
        &self,
        project: &ProjectId,
        path: BeatPath,
        page_number: u32,
        panels: Vec<Panel>,
        layout_notes: Option<String>,
        user: &UserId,
    ) -> StoreResult<Beat> {
        self.modify_page(project, path, page_number, user, |page| {
            page.panels = panels;
            if let Some(notes) = layout_notes {
                page.layout_notes = notes;
            }
            Ok(())
        })
        .await
    }

    /// Update one page's metadata, leaving its panels alone.
    pub async fn update_page(
        &self,
        project: &ProjectId,
        path: BeatPath,
        page_number: u32,
        update: PageUpdate,
        user: &UserId,
    ) -> StoreResult<Beat> {
        self.modify_page(project, path, page_number, user, |page| {
            update.apply(page);
            Ok(())
        })
        .await
    }

    pub async fn update_panel(
        &self,
        project: &ProjectId,
        path: BeatPath,
        page_number: u32,
        panel_number: u32,
        update: PanelUpdate,
        user: &UserId,
    ) -> StoreResult<Beat> {
        let now = self.now();
        self.modify_page(project, path, page_number, user, |page| {
            let panel = page
                .panels
                .iter_mut()
                .find(|p| p.panel_number == panel_number)
                .ok_or(StoreError::PanelNotFound {
                    page: page_number,
                    panel: panel_number,
                })?;
            update.apply(panel);
            panel.updated_at = Some(now);
            panel.updated_by = Some(user.clone());
            Ok(())
        })
        .await
    }

    /// Read-modify-write of one page inside a beat document.
    async fn modify_page<F>(
        &self,
        project: &ProjectId,
        path: BeatPath,
        page_number: u32,
        user: &UserId,
        edit: F,
    ) -> StoreResult<Beat>
    where
        F: FnOnce(&mut Page) -> StoreResult<()> + Send,
    {
        let mut beat = self.get_beat(project, path).await?;
        let page = beat
            .pages
            .iter_mut()
            .find(|p| p.page_number == page_number)
            .ok_or(StoreError::PageNotFound {
                beat: path.beat,
                page: page_number,
            })?;
        edit(page)?;

        let now = self.now();
        page.updated_at = Some(now);
        page.updated_by = Some(user.clone());
        beat.updated_at = Some(now);
        beat.updated_by = Some(user.clone());

        self.put_beat(project, path, &beat).await?;
        debug!(%project, %path, page = page_number, "updated page");
        self.touch(project, user).await;
        Ok(beat)
    }

    // -----------------------------------------------------------------------
    // Batch saves
    // -----------------------------------------------------------------------

    /// Create and update several beats of a chapter in one atomic batch.
    ///
    /// Returns the ids of all written beats in input order.
    pub async fn save_beats_for_chapter(
        &self,
        project: &ProjectId,
        book: BookId,
        chapter: ChapterId,
        beats: Vec<BeatWrite>,
        user: &UserId,
    ) -> StoreResult<Vec<BeatId>> {
        self.get_chapter(project, book, chapter).await?;
        let parent = NodeKey::Chapter(book, chapter);
        let mut next_sequence = self.next_ordinal(project, &parent).await?;
        let now = self.now();
        let count = beats.len();

        let mut ids = Vec::with_capacity(count);
        let mut writes = Vec::with_capacity(count);
        for write in beats {
            let beat = match write {
                NodeWrite::Update { id, update } => {
                    let mut beat = self
                        .get_beat(project, BeatPath::new(book, chapter, id))
                        .await?;
                    update.apply(&mut beat);
                    beat.updated_at = Some(now);
                    beat.updated_by = Some(user.clone());
                    beat
                }
                NodeWrite::Create(draft) => {
                    let sequence = match draft.sequence {
                        Some(sequence) => sequence,
                        None => {
                            let sequence = next_sequence;
                            next_sequence = next_sequence.saturating_add(1);
                            sequence
                        }
                    };
                    self.beat_from_draft(draft, sequence, user)
                }
            };
            ids.push(beat.id);
            writes.push(DocumentWrite::new(
                NodeKey::beat(book, chapter, beat.id),
                Node::Beat(beat),
            ));
        }

        self.store.apply_batch(project, writes).await?;
        info!(%project, %book, %chapter, count, "saved beat batch");
        self.touch(project, user).await;
        Ok(ids)
    }

    /// Create and update chapters one by one (not atomic). New chapters
    /// bring their draft beats along.
    pub async fn save_chapters_for_book(
        &self,
        project: &ProjectId,
        book: BookId,
        chapters: Vec<ChapterWrite>,
        user: &UserId,
    ) -> StoreResult<Vec<ChapterId>> {
        let mut ids = Vec::with_capacity(chapters.len());
        for write in chapters {
            let id = match write {
                NodeWrite::Update { id, update } => {
                    self.update_chapter(project, book, id, update, user).await?.id
                }
                NodeWrite::Create(draft) => {
                    self.create_chapter(project, book, draft, user).await?.id
                }
            };
            ids.push(id);
        }
        self.touch(project, user).await;
        Ok(ids)
    }

    /// Create and update books one by one (not atomic). New books bring
    /// their draft chapters along.
    pub async fn save_books_for_series(
        &self,
        project: &ProjectId,
        books: Vec<BookWrite>,
        user: &UserId,
    ) -> StoreResult<Vec<BookId>> {
        let mut ids = Vec::with_capacity(books.len());
        for write in books {
            let id = match write {
                NodeWrite::Update { id, update } => {
                    self.update_book(project, id, update, user).await?.id
                }
                NodeWrite::Create(mut draft) => {
                    let chapters = std::mem::take(&mut draft.chapters);
                    let book = self.write_new_book(project, draft, user).await?;
                    if !chapters.is_empty() {
                        let writes = chapters.into_iter().map(NodeWrite::Create).collect();
                        self.save_chapters_for_book(project, book.id, writes, user)
                            .await?;
                    }
                    book.id
                }
            };
            ids.push(id);
        }
        self.touch(project, user).await;
        Ok(ids)
    }

    // -----------------------------------------------------------------------
    // Renames
    // -----------------------------------------------------------------------

    /// Rewrite name references in every beat after a catalog rename.
    ///
    /// Character renames touch beat and panel character lists, page cast
    /// lists and dialogue speakers; location renames touch beat locations.
    /// Free text is left alone. All affected beats are written in one batch.
    /// Returns the number of beats rewritten.
    pub async fn propagate_rename(
        &self,
        project: &ProjectId,
        rename: &Rename,
        user: &UserId,
    ) -> StoreResult<usize> {
        if !matches!(rename.kind, EntityKind::Character | EntityKind::Location)
            || rename.old_name == rename.new_name
        {
            return Ok(0);
        }
        let Some(series) = self.load(project).await? else {
            return Ok(0);
        };

        let now = self.now();
        let mut writes = Vec::new();
        for book in &series.books {
            for chapter in &book.chapters {
                for beat in &chapter.beats {
                    let mut beat = beat.clone();
                    if rename_in_beat(&mut beat, rename) {
                        beat.updated_at = Some(now);
                        beat.updated_by = Some(user.clone());
                        writes.push(DocumentWrite::new(
                            NodeKey::beat(book.id, chapter.id, beat.id),
                            Node::Beat(beat),
                        ));
                    }
                }
            }
        }

        let count = writes.len();
        if count > 0 {
            self.store.apply_batch(project, writes).await?;
            self.touch(project, user).await;
        }
        info!(
            %project,
            kind = %rename.kind,
            old = %rename.old_name,
            new = %rename.new_name,
            beats = count,
            "propagated rename"
        );
        Ok(count)
    }

    // -----------------------------------------------------------------------
    // Subscriptions
    // -----------------------------------------------------------------------

    /// Watch the project for changes. Each notification re-reads the tree.
    pub async fn subscribe(&self, project: &ProjectId) -> TreeSubscription<S> {
        let receiver = self.store.watch_root(project).await;
        TreeSubscription {
            tree: self.clone(),
            project: project.clone(),
            receiver,
        }
    }
}

fn rename_in_beat(beat: &mut Beat, rename: &Rename) -> bool {
    let old = rename.old_name.as_str();
    let mut changed = false;
    let mut swap = |value: &mut String| {
        if value == old {
            *value = rename.new_name.clone();
            changed = true;
        }
    };

    match rename.kind {
        EntityKind::Character => {
            beat.characters.iter_mut().for_each(&mut swap);
            for page in &mut beat.pages {
                page.characters_on_page.iter_mut().for_each(&mut swap);
                for panel in &mut page.panels {
                    panel.characters.iter_mut().for_each(&mut swap);
                    for line in &mut panel.dialogue {
                        swap(&mut line.speaker);
                    }
                }
            }
        }
        EntityKind::Location => swap(&mut beat.location),
        _ => {}
    }
    changed
}

/// A fresh copy of the tree delivered to a subscriber.
#[derive(Debug, Clone)]
pub struct TreeUpdate {
    pub modified_by: Option<UserId>,
    /// `None` if the series document was removed.
    pub series: Option<Series>,
}

/// Stream of tree snapshots driven by series root writes.
#[derive(Debug)]
pub struct TreeSubscription<S> {
    tree: NarrativeTree<S>,
    project: ProjectId,
    receiver: broadcast::Receiver<RootChange>,
}

impl<S: DocumentStore> TreeSubscription<S> {
    pub fn project(&self) -> &ProjectId {
        &self.project
    }

    /// Wait for the next root write and re-read the whole tree.
    ///
    /// Notifications that pile up while the caller is busy collapse into one
    /// read. Returns `None` once the store stops publishing.
    pub async fn next(&mut self) -> Option<StoreResult<TreeUpdate>> {
        let modified_by = loop {
            match self.receiver.recv().await {
                Ok(change) => break change.modified_by,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(project = %self.project, skipped, "subscriber lagged, reloading");
                    break None;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        };

        // Drain anything queued behind this notification; one read covers it.
        let mut modified_by = modified_by;
        while let Ok(change) = self.receiver.try_recv() {
            modified_by = change.modified_by;
        }

        Some(
            self.tree
                .load(&self.project)
                .await
                .map(|series| TreeUpdate {
                    modified_by,
                    series,
                }),
        )
    }
}
