//! # Continuity Core
//!
//! The narrative continuity engine behind a collaborative story editor.
//! Several people write one series at once; this crate keeps the story tree,
//! coordinates the editors and derives the continuity snapshot that
//! generation prompts are built from.
//!
//! ## Core Components
//!
//! - **tree**: The series → book → chapter → beat tree, with pages and panels
//!   embedded in beats, persisted through a [`tree::DocumentStore`]
//! - **collab**: Presence, advisory per-beat edit locks and clocks
//! - **continuity**: The cursor-bounded aggregator that turns catalog + tree
//!   into a [`continuity::ContinuityState`]
//! - **config**: Engine tunables, loadable from TOML
//!
//! ## Design Philosophy
//!
//! - **Names in the tree**: Beats and panels refer to catalog entities by
//!   display name; renames are propagated explicitly
//! - **Advisory locking**: Locks warn editors; the store never checks them
//! - **Pure aggregation**: Same catalog, tree and cursor, same snapshot

pub mod collab;
pub mod config;
pub mod continuity;
pub mod error;
pub mod tree;

pub use collab::*;
pub use config::EngineConfig;
pub use continuity::*;
pub use error::*;
pub use tree::*;
