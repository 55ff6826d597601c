//! Error types for the tree store, the collaboration layer and configuration.

use chrono::{DateTime, Utc};

use crate::tree::{BeatId, NodeKey, NodeKind, ProjectId, UserId};

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by [`crate::tree::NarrativeTree`] and document backends.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} {id} not found")]
    NotFound { kind: NodeKind, id: String },

    #[error("Page {page} not found in beat {beat}")]
    PageNotFound { beat: BeatId, page: u32 },

    #[error("Panel {panel} not found on page {page}")]
    PanelNotFound { page: u32, panel: u32 },

    /// A cascading delete stopped partway. Documents removed before the
    /// failure stay removed; the rest stay in place.
    #[error("delete of {node} stopped after removing {removed} descendant(s): {source}")]
    PartialCascade {
        node: NodeKey,
        removed: usize,
        #[source]
        source: Box<StoreError>,
    },

    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Errors raised by the edit-lock manager.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CollabError {
    #[error("This beat is being edited by {}", .holder_name.as_deref().unwrap_or("another user"))]
    Conflict {
        holder_id: UserId,
        holder_name: Option<String>,
        acquired_at: DateTime<Utc>,
    },

    #[error("no presence record for user {user_id} in project {project}")]
    NoPresence { project: ProjectId, user_id: UserId },
}

/// Errors raised while loading [`crate::config::EngineConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
