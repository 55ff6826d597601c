//! Narrative tree node types: series, books, chapters, beats, pages, panels.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{BeatId, BookId, ChapterId, UserId};

/// Root of the narrative tree.
///
/// When read through [`crate::tree::NarrativeTree::load`] the children are
/// populated and sorted; as a stored document `books` is always empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Series {
    pub title: String,
    pub logline: String,
    pub themes: Vec<String>,
    /// Planned number of books.
    pub target_length: u32,
    pub created_by: Option<UserId>,
    /// Bumped by every tree mutation so root watchers fire.
    pub last_modified: Option<DateTime<Utc>>,
    pub last_modified_by: Option<UserId>,
    pub books: Vec<Book>,
}

impl Series {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            target_length: 1,
            ..Default::default()
        }
    }

    /// Strip children, leaving only the root document fields.
    pub fn as_document(&self) -> Series {
        Series {
            books: Vec::new(),
            ..self.clone()
        }
    }

    pub fn book(&self, id: BookId) -> Option<&Book> {
        self.books.iter().find(|b| b.id == id)
    }

    pub fn book_by_number(&self, number: u32) -> Option<&Book> {
        self.books.iter().find(|b| b.number == number)
    }

    /// Locate a beat anywhere in the tree.
    pub fn find_beat(&self, id: BeatId) -> Option<(&Book, &Chapter, &Beat)> {
        self.books.iter().find_map(|book| {
            book.chapters.iter().find_map(|chapter| {
                chapter
                    .beats
                    .iter()
                    .find(|beat| beat.id == id)
                    .map(|beat| (book, chapter, beat))
            })
        })
    }

    /// Total number of stored nodes below the root (books + chapters + beats).
    pub fn node_count(&self) -> usize {
        self.books
            .iter()
            .map(|b| 1 + b.chapters.iter().map(|c| 1 + c.beats.len()).sum::<usize>())
            .sum()
    }

    /// Sibling ordinals that collide.
    ///
    /// Ordinals are assigned as "existing siblings + 1" without any
    /// transaction, so concurrent creations can produce duplicates.
    pub fn ordinal_conflicts(&self) -> Vec<OrdinalConflict> {
        let mut conflicts = Vec::new();

        collect_duplicates(
            self.books.iter().map(|b| b.number),
            |number| OrdinalConflict::Book { number },
            &mut conflicts,
        );

        for book in &self.books {
            collect_duplicates(
                book.chapters.iter().map(|c| c.number),
                |number| OrdinalConflict::Chapter {
                    book: book.number,
                    number,
                },
                &mut conflicts,
            );

            for chapter in &book.chapters {
                collect_duplicates(
                    chapter.beats.iter().map(|b| b.sequence),
                    |sequence| OrdinalConflict::Beat {
                        book: book.number,
                        chapter: chapter.number,
                        sequence,
                    },
                    &mut conflicts,
                );
            }
        }

        conflicts
    }

    /// Sort every level by its ordinal (stable, so ties keep store order).
    pub fn sort(&mut self) {
        self.books.sort_by_key(|b| b.number);
        for book in &mut self.books {
            book.chapters.sort_by_key(|c| c.number);
            for chapter in &mut book.chapters {
                chapter.beats.sort_by_key(|b| b.sequence);
            }
        }
    }
}

fn collect_duplicates(
    ordinals: impl Iterator<Item = u32>,
    make: impl Fn(u32) -> OrdinalConflict,
    out: &mut Vec<OrdinalConflict>,
) {
    let mut seen = std::collections::BTreeMap::<u32, usize>::new();
    for ordinal in ordinals {
        *seen.entry(ordinal).or_default() += 1;
    }
    out.extend(
        seen.into_iter()
            .filter(|(_, count)| *count > 1)
            .map(|(ordinal, _)| make(ordinal)),
    );
}

/// Two or more siblings share an ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrdinalConflict {
    Book { number: u32 },
    Chapter { book: u32, number: u32 },
    Beat { book: u32, chapter: u32, sequence: u32 },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Book {
    pub id: BookId,
    pub number: u32,
    pub title: String,
    pub logline: String,
    pub estimated_pages: u32,
    pub created_by: Option<UserId>,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<UserId>,
    pub chapters: Vec<Chapter>,
}

impl Book {
    pub fn chapter(&self, id: ChapterId) -> Option<&Chapter> {
        self.chapters.iter().find(|c| c.id == id)
    }

    pub fn as_document(&self) -> Book {
        Book {
            chapters: Vec::new(),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Chapter {
    pub id: ChapterId,
    pub number: u32,
    pub title: String,
    pub summary: String,
    pub pov: String,
    pub emotional_arc: String,
    pub estimated_pages: u32,
    pub created_by: Option<UserId>,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<UserId>,
    pub beats: Vec<Beat>,
}

impl Chapter {
    pub fn beat(&self, id: BeatId) -> Option<&Beat> {
        self.beats.iter().find(|b| b.id == id)
    }

    pub fn as_document(&self) -> Chapter {
        Chapter {
            beats: Vec::new(),
            ..self.clone()
        }
    }
}

/// Story function of a beat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BeatType {
    Opening,
    #[default]
    Action,
    Character,
    Worldbuilding,
    Tension,
    Revelation,
    Emotional,
    Transition,
    Resolution,
    Hook,
    /// Produced by generated outlines.
    Crisis,
    /// Produced by generated outlines.
    Climax,
}

impl BeatType {
    /// Beats of these types become entries in the story timeline.
    pub fn is_timeline_event(&self) -> bool {
        matches!(self, BeatType::Revelation | BeatType::Crisis | BeatType::Climax)
    }
}

/// A scene-level unit of story and the smallest independently stored node.
///
/// Pages are embedded and always travel with their beat.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Beat {
    pub id: BeatId,
    pub sequence: u32,
    pub title: String,
    pub summary: String,
    pub purpose: String,
    pub beat_type: BeatType,
    /// Catalog character names.
    pub characters: Vec<String>,
    /// Catalog location name.
    pub location: String,
    pub estimated_pages: u32,
    pub pages: Vec<Page>,
    pub created_by: Option<UserId>,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<UserId>,
    pub pages_updated_at: Option<DateTime<Utc>>,
    pub pages_updated_by: Option<UserId>,
}

impl Beat {
    pub fn page(&self, page_number: u32) -> Option<&Page> {
        self.pages.iter().find(|p| p.page_number == page_number)
    }

    /// Every dialogue line of the beat in page/panel order.
    pub fn dialogue_history(&self) -> Vec<DialogueRecord> {
        self.pages
            .iter()
            .flat_map(|page| {
                page.panels.iter().flat_map(move |panel| {
                    panel.dialogue.iter().map(move |line| DialogueRecord {
                        page: page.page_number,
                        panel: panel.panel_number,
                        speaker: line.speaker.clone(),
                        text: line.text.clone(),
                        kind: line.kind,
                    })
                })
            })
            .collect()
    }

    /// Characters referenced by the beat, first occurrence order, no repeats.
    pub fn distinct_characters(&self) -> Vec<&str> {
        let mut seen = Vec::<&str>::new();
        for name in &self.characters {
            let name = name.as_str();
            if !name.is_empty() && !seen.contains(&name) {
                seen.push(name);
            }
        }
        seen
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Page {
    pub page_number: u32,
    pub visual_focus: String,
    pub pacing: String,
    pub emotional_beat: String,
    pub layout_notes: String,
    pub dialogue_notes: String,
    pub characters_on_page: Vec<String>,
    pub panels: Vec<Panel>,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<UserId>,
}

impl Page {
    pub fn new(page_number: u32) -> Self {
        Self {
            page_number,
            ..Default::default()
        }
    }

    pub fn with_panel(mut self, panel: Panel) -> Self {
        self.panels.push(panel);
        self
    }

    pub fn panel(&self, panel_number: u32) -> Option<&Panel> {
        self.panels.iter().find(|p| p.panel_number == panel_number)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelSize {
    /// Full page.
    Splash,
    /// Half page.
    Large,
    #[default]
    Medium,
    Small,
    Inset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShotType {
    Establishing,
    Wide,
    #[default]
    Medium,
    CloseUp,
    ExtremeCloseUp,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Panel {
    pub panel_number: u32,
    pub size: PanelSize,
    pub shot: ShotType,
    pub visual_description: String,
    pub action: String,
    /// Catalog character names; the first one is treated as the actor.
    pub characters: Vec<String>,
    pub dialogue: Vec<DialogueLine>,
    pub sfx: String,
    pub art_notes: String,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<UserId>,
}

impl Panel {
    pub fn new(panel_number: u32) -> Self {
        Self {
            panel_number,
            ..Default::default()
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = action.into();
        self
    }

    pub fn with_visual(mut self, description: impl Into<String>) -> Self {
        self.visual_description = description.into();
        self
    }

    pub fn with_characters<I, S>(mut self, characters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.characters = characters.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_art_notes(mut self, notes: impl Into<String>) -> Self {
        self.art_notes = notes.into();
        self
    }

    pub fn with_dialogue(mut self, line: DialogueLine) -> Self {
        self.dialogue.push(line);
        self
    }

    /// The character performing the panel's action.
    pub fn actor(&self) -> Option<&str> {
        self.characters
            .first()
            .map(String::as_str)
            .filter(|name| !name.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogueKind {
    #[default]
    Speech,
    Thought,
    Caption,
    Narration,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DialogueLine {
    pub speaker: String,
    pub text: String,
    pub kind: DialogueKind,
    /// Delivery direction, e.g. "whispered".
    pub direction: Option<String>,
}

impl DialogueLine {
    pub fn speech(speaker: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            text: text.into(),
            kind: DialogueKind::Speech,
            direction: None,
        }
    }
}

/// A dialogue line with its page/panel coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogueRecord {
    pub page: u32,
    pub panel: u32,
    pub speaker: String,
    pub text: String,
    pub kind: DialogueKind,
}

// ---------------------------------------------------------------------------
// Write payloads
// ---------------------------------------------------------------------------

/// Payload for creating a book. `number: None` lets the store assign one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BookDraft {
    pub number: Option<u32>,
    pub title: String,
    pub logline: String,
    pub estimated_pages: u32,
    /// Created together with the book by batch saves.
    pub chapters: Vec<ChapterDraft>,
}

impl BookDraft {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BookUpdate {
    pub number: Option<u32>,
    pub title: Option<String>,
    pub logline: Option<String>,
    pub estimated_pages: Option<u32>,
}

impl BookUpdate {
    pub fn apply(self, book: &mut Book) {
        if let Some(number) = self.number {
            book.number = number;
        }
        if let Some(title) = self.title {
            book.title = title;
        }
        if let Some(logline) = self.logline {
            book.logline = logline;
        }
        if let Some(pages) = self.estimated_pages {
            book.estimated_pages = pages;
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChapterDraft {
    pub number: Option<u32>,
    pub title: String,
    pub summary: String,
    pub pov: String,
    pub emotional_arc: String,
    pub estimated_pages: u32,
    /// Created together with the chapter by batch saves.
    pub beats: Vec<BeatDraft>,
}

impl ChapterDraft {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChapterUpdate {
    pub number: Option<u32>,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub pov: Option<String>,
    pub emotional_arc: Option<String>,
    pub estimated_pages: Option<u32>,
}

impl ChapterUpdate {
    pub fn apply(self, chapter: &mut Chapter) {
        if let Some(number) = self.number {
            chapter.number = number;
        }
        if let Some(title) = self.title {
            chapter.title = title;
        }
        if let Some(summary) = self.summary {
            chapter.summary = summary;
        }
        if let Some(pov) = self.pov {
            chapter.pov = pov;
        }
        if let Some(arc) = self.emotional_arc {
            chapter.emotional_arc = arc;
        }
        if let Some(pages) = self.estimated_pages {
            chapter.estimated_pages = pages;
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BeatDraft {
    pub sequence: Option<u32>,
    pub title: String,
    pub summary: String,
    pub purpose: String,
    pub beat_type: BeatType,
    pub characters: Vec<String>,
    pub location: String,
    pub estimated_pages: u32,
    pub pages: Vec<Page>,
}

impl BeatDraft {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn with_characters<I, S>(mut self, characters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.characters = characters.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn with_type(mut self, beat_type: BeatType) -> Self {
        self.beat_type = beat_type;
        self
    }

    pub fn with_pages(mut self, pages: Vec<Page>) -> Self {
        self.pages = pages;
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BeatUpdate {
    pub sequence: Option<u32>,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub purpose: Option<String>,
    pub beat_type: Option<BeatType>,
    pub characters: Option<Vec<String>>,
    pub location: Option<String>,
    pub estimated_pages: Option<u32>,
}

impl BeatUpdate {
    pub fn apply(self, beat: &mut Beat) {
        if let Some(sequence) = self.sequence {
            beat.sequence = sequence;
        }
        if let Some(title) = self.title {
            beat.title = title;
        }
        if let Some(summary) = self.summary {
            beat.summary = summary;
        }
        if let Some(purpose) = self.purpose {
            beat.purpose = purpose;
        }
        if let Some(beat_type) = self.beat_type {
            beat.beat_type = beat_type;
        }
        if let Some(characters) = self.characters {
            beat.characters = characters;
        }
        if let Some(location) = self.location {
            beat.location = location;
        }
        if let Some(pages) = self.estimated_pages {
            beat.estimated_pages = pages;
        }
    }
}

/// Either an existing node to update or a new one to create; used by batch
/// saves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NodeWrite<Id, U, D> {
    Update { id: Id, update: U },
    Create(D),
}

pub type BookWrite = NodeWrite<BookId, BookUpdate, BookDraft>;
pub type ChapterWrite = NodeWrite<ChapterId, ChapterUpdate, ChapterDraft>;
pub type BeatWrite = NodeWrite<BeatId, BeatUpdate, BeatDraft>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SeriesUpdate {
    pub title: Option<String>,
    pub logline: Option<String>,
    pub themes: Option<Vec<String>>,
    pub target_length: Option<u32>,
}

impl SeriesUpdate {
    pub fn apply(self, series: &mut Series) {
        if let Some(title) = self.title {
            series.title = title;
        }
        if let Some(logline) = self.logline {
            series.logline = logline;
        }
        if let Some(themes) = self.themes {
            series.themes = themes;
        }
        if let Some(length) = self.target_length {
            series.target_length = length;
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PageUpdate {
    pub visual_focus: Option<String>,
    pub pacing: Option<String>,
    pub emotional_beat: Option<String>,
    pub layout_notes: Option<String>,
    pub dialogue_notes: Option<String>,
    pub characters_on_page: Option<Vec<String>>,
}

impl PageUpdate {
    pub fn apply(self, page: &mut Page) {
        if let Some(focus) = self.visual_focus {
            page.visual_focus = focus;
        }
        if let Some(pacing) = self.pacing {
            page.pacing = pacing;
        }
        if let Some(beat) = self.emotional_beat {
            page.emotional_beat = beat;
        }
        if let Some(notes) = self.layout_notes {
            page.layout_notes = notes;
        }
        if let Some(notes) = self.dialogue_notes {
            page.dialogue_notes = notes;
        }
        if let Some(characters) = self.characters_on_page {
            page.characters_on_page = characters;
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PanelUpdate {
    pub size: Option<PanelSize>,
    pub shot: Option<ShotType>,
    pub visual_description: Option<String>,
    pub action: Option<String>,
    pub characters: Option<Vec<String>>,
    pub dialogue: Option<Vec<DialogueLine>>,
    pub sfx: Option<String>,
    pub art_notes: Option<String>,
}

impl PanelUpdate {
    pub fn apply(self, panel: &mut Panel) {
        if let Some(size) = self.size {
            panel.size = size;
        }
        if let Some(shot) = self.shot {
            panel.shot = shot;
        }
        if let Some(description) = self.visual_description {
            panel.visual_description = description;
        }
        if let Some(action) = self.action {
            panel.action = action;
        }
        if let Some(characters) = self.characters {
            panel.characters = characters;
        }
        if let Some(dialogue) = self.dialogue {
            panel.dialogue = dialogue;
        }
        if let Some(sfx) = self.sfx {
            panel.sfx = sfx;
        }
        if let Some(notes) = self.art_notes {
            panel.art_notes = notes;
        }
    }
}
