//! The narrative tree: series → books → chapters → beats, with pages and
//! panels embedded in each beat.

mod document;
mod ids;
mod memory;
mod model;
mod service;

pub use document::{DocumentStore, DocumentWrite, Node, NodeKey, NodeKind, RootChange};
pub use ids::{BeatId, BeatPath, BookId, ChapterId, ProjectId, UserId};
pub use memory::InMemoryDocumentStore;
pub use model::*;
pub use service::{NarrativeTree, TreeSubscription, TreeUpdate};
