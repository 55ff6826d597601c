//! Entity definitions for the story bible.

macro_rules! impl_catalog_entity {
    ($ty:ty, $kind:expr) => {
        impl $crate::entities::CatalogEntity for $ty {
            const KIND: $crate::entities::EntityKind = $kind;

            fn id(&self) -> $crate::entities::EntityId {
                self.id
            }

            fn name(&self) -> &str {
                &self.name
            }

            fn set_name(&mut self, name: String) {
                self.name = name;
            }
        }
    };
}

mod character;
mod profiles;

pub use character::*;
pub use profiles::*;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for every catalog entity.
///
/// Narrative nodes still reference entities by display name; the id is what
/// survives a rename.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub Uuid);

impl EntityId {
    /// Create a new random entity ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an entity ID from a specific UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Create a nil/empty entity ID (useful for defaults).
    pub fn nil() -> Self {
        Self(Uuid::nil())
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Types of entities in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Character,
    Location,
    Faction,
    Artifact,
    Event,
    WorldRule,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Character => "character",
            EntityKind::Location => "location",
            EntityKind::Faction => "faction",
            EntityKind::Artifact => "artifact",
            EntityKind::Event => "event",
            EntityKind::WorldRule => "world_rule",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Common accessors shared by every catalog record.
pub trait CatalogEntity {
    const KIND: EntityKind;

    fn id(&self) -> EntityId;
    fn name(&self) -> &str;
    fn set_name(&mut self, name: String);
}
