//! Narrative positions and the cursor that bounds an aggregation.

use serde::{Deserialize, Serialize};

/// A point in the story: `(book number, chapter number, beat sequence)`.
///
/// Ordering is lexicographic, which is the order the tree is walked in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StoryPosition {
    pub book: u32,
    pub chapter: u32,
    pub beat: u32,
}

impl StoryPosition {
    pub fn new(book: u32, chapter: u32, beat: u32) -> Self {
        Self {
            book,
            chapter,
            beat,
        }
    }
}

impl std::fmt::Display for StoryPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "B{}.C{}.{}", self.book, self.chapter, self.beat)
    }
}

/// How far into the story an aggregation reads. Inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cursor {
    /// The whole tree.
    #[default]
    Unbounded,
    At(StoryPosition),
}

impl Cursor {
    pub fn at(book: u32, chapter: u32, beat: u32) -> Self {
        Cursor::At(StoryPosition::new(book, chapter, beat))
    }

    /// Books past this number are not visited.
    pub(crate) fn stops_before_book(&self, book: u32) -> bool {
        matches!(self, Cursor::At(pos) if book > pos.book)
    }

    pub(crate) fn stops_before_chapter(&self, book: u32, chapter: u32) -> bool {
        matches!(self, Cursor::At(pos) if book == pos.book && chapter > pos.chapter)
    }

    pub(crate) fn stops_before_beat(&self, book: u32, chapter: u32, beat: u32) -> bool {
        matches!(
            self,
            Cursor::At(pos) if book == pos.book && chapter == pos.chapter && beat > pos.beat
        )
    }

    /// Whether a position falls inside the walked prefix.
    pub fn includes(&self, position: StoryPosition) -> bool {
        match self {
            Cursor::Unbounded => true,
            Cursor::At(pos) => position <= *pos,
        }
    }
}
