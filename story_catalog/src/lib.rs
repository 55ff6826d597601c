//! # Story Catalog
//!
//! The "Story Bible" crate - the named world entities (characters, locations,
//! factions, artifacts, events, world rules) that the narrative tree refers to
//! by display name. This crate holds plain records only; it does not walk the
//! story or derive any state.

pub mod catalog;
pub mod entities;

pub use catalog::*;
pub use entities::*;
