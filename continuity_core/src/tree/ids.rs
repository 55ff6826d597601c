//! Identifiers for tree nodes, projects and users.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! node_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new random ID.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

node_id!(
    /// Unique identifier for books.
    BookId
);
node_id!(
    /// Unique identifier for chapters.
    ChapterId
);
node_id!(
    /// Unique identifier for beats, the unit of storage and locking.
    BeatId
);

/// Project (story) identifier. Projects are owned by an external membership
/// service, so the id is opaque here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProjectId(pub String);

impl ProjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProjectId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Acting user identifier, issued by the external auth service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Address of a beat inside the tree.
///
/// Beats live under a chapter under a book, and every store call needs the
/// whole path, mirroring the nested document layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BeatPath {
    pub book: BookId,
    pub chapter: ChapterId,
    pub beat: BeatId,
}

impl BeatPath {
    pub fn new(book: BookId, chapter: ChapterId, beat: BeatId) -> Self {
        Self {
            book,
            chapter,
            beat,
        }
    }
}

impl std::fmt::Display for BeatPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "book/{}/chapter/{}/beat/{}", self.book, self.chapter, self.beat)
    }
}
