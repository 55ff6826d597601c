//! The entity catalog - a flat snapshot of every named entity in a project.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::entities::{
    Artifact, CatalogEntity, Character, EntityId, EntityKind, Faction, Location, StoryEvent,
    WorldRule,
};

/// Errors raised by catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to parse catalog: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("no entity with id {0}")]
    UnknownEntity(EntityId),

    #[error("a {kind} named '{name}' already exists")]
    DuplicateName { kind: EntityKind, name: String },

    #[error("entity names cannot be empty")]
    EmptyName,
}

/// Result of renaming an entity; feed it to the narrative tree so name
/// references can follow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rename {
    pub id: EntityId,
    pub kind: EntityKind,
    pub old_name: String,
    pub new_name: String,
}

/// All catalog entities of a project, in authoring order.
///
/// Insertion order is preserved so that anything derived from the catalog
/// (for example the backstory timeline) comes out in a stable order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityCatalog {
    pub characters: Vec<Character>,
    pub locations: Vec<Location>,
    pub factions: Vec<Faction>,
    pub artifacts: Vec<Artifact>,
    pub events: Vec<StoryEvent>,
    pub world_rules: Vec<WorldRule>,
}

impl EntityCatalog {
    /// Create a new empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a catalog from TOML (`[[characters]]`, `[[artifacts]]`, ...).
    pub fn from_toml_str(source: &str) -> Result<Self, CatalogError> {
        Ok(toml::from_str(source)?)
    }

    pub fn add_character(&mut self, character: Character) -> EntityId {
        let id = character.id;
        self.characters.push(character);
        id
    }

    pub fn add_location(&mut self, location: Location) -> EntityId {
        let id = location.id;
        self.locations.push(location);
        id
    }

    pub fn add_faction(&mut self, faction: Faction) -> EntityId {
        let id = faction.id;
        self.factions.push(faction);
        id
    }

    pub fn add_artifact(&mut self, artifact: Artifact) -> EntityId {
        let id = artifact.id;
        self.artifacts.push(artifact);
        id
    }

    pub fn add_event(&mut self, event: StoryEvent) -> EntityId {
        let id = event.id;
        self.events.push(event);
        id
    }

    pub fn add_world_rule(&mut self, rule: WorldRule) -> EntityId {
        let id = rule.id;
        self.world_rules.push(rule);
        id
    }

    /// Get a character by display name (exact match).
    pub fn character(&self, name: &str) -> Option<&Character> {
        self.characters.iter().find(|c| c.name == name)
    }

    /// Get a location by display name (exact match).
    pub fn location(&self, name: &str) -> Option<&Location> {
        self.locations.iter().find(|l| l.name == name)
    }

    /// Get an artifact by display name (exact match).
    pub fn artifact(&self, name: &str) -> Option<&Artifact> {
        self.artifacts.iter().find(|a| a.name == name)
    }

    /// Resolve an id to its kind and current display name.
    pub fn lookup(&self, id: EntityId) -> Option<(EntityKind, &str)> {
        fn find<T: CatalogEntity>(items: &[T], id: EntityId) -> Option<(EntityKind, &str)> {
            items
                .iter()
                .find(|e| e.id() == id)
                .map(|e| (T::KIND, e.name()))
        }

        find(&self.characters, id)
            .or_else(|| find(&self.locations, id))
            .or_else(|| find(&self.factions, id))
            .or_else(|| find(&self.artifacts, id))
            .or_else(|| find(&self.events, id))
            .or_else(|| find(&self.world_rules, id))
    }

    /// Total number of entities across all kinds.
    pub fn len(&self) -> usize {
        self.characters.len()
            + self.locations.len()
            + self.factions.len()
            + self.artifacts.len()
            + self.events.len()
            + self.world_rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rename an entity and rewrite every name reference held inside the
    /// catalog (relationship targets, holders, participants, restrictions).
    ///
    /// References held by the narrative tree are not touched here; pass the
    /// returned [`Rename`] on to the tree.
    pub fn rename(&mut self, id: EntityId, new_name: &str) -> Result<Rename, CatalogError> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(CatalogError::EmptyName);
        }

        let (kind, old_name) = self
            .lookup(id)
            .map(|(kind, name)| (kind, name.to_string()))
            .ok_or(CatalogError::UnknownEntity(id))?;

        if old_name == new_name {
            return Ok(Rename {
                id,
                kind,
                old_name,
                new_name: new_name.to_string(),
            });
        }

        if self.name_taken(kind, new_name) {
            return Err(CatalogError::DuplicateName {
                kind,
                name: new_name.to_string(),
            });
        }

        fn set<T: CatalogEntity>(items: &mut [T], id: EntityId, name: &str) {
            if let Some(entity) = items.iter_mut().find(|e| e.id() == id) {
                entity.set_name(name.to_string());
            }
        }

        match kind {
            EntityKind::Character => set(&mut self.characters, id, new_name),
            EntityKind::Location => set(&mut self.locations, id, new_name),
            EntityKind::Faction => set(&mut self.factions, id, new_name),
            EntityKind::Artifact => set(&mut self.artifacts, id, new_name),
            EntityKind::Event => set(&mut self.events, id, new_name),
            EntityKind::WorldRule => set(&mut self.world_rules, id, new_name),
        }

        self.rewrite_references(kind, &old_name, new_name);

        info!(%id, %kind, old = %old_name, new = %new_name, "renamed catalog entity");

        Ok(Rename {
            id,
            kind,
            old_name,
            new_name: new_name.to_string(),
        })
    }

    fn name_taken(&self, kind: EntityKind, name: &str) -> bool {
        fn taken<T: CatalogEntity>(items: &[T], name: &str) -> bool {
            items.iter().any(|e| e.name() == name)
        }

        match kind {
            EntityKind::Character => taken(&self.characters, name),
            EntityKind::Location => taken(&self.locations, name),
            EntityKind::Faction => taken(&self.factions, name),
            EntityKind::Artifact => taken(&self.artifacts, name),
            EntityKind::Event => taken(&self.events, name),
            EntityKind::WorldRule => taken(&self.world_rules, name),
        }
    }

    fn rewrite_references(&mut self, kind: EntityKind, old: &str, new: &str) {
        let swap = |value: &mut String| {
            if value == old {
                *value = new.to_string();
            }
        };

        // Relationship targets can point at any kind of entity.
        for character in &mut self.characters {
            for rel in &mut character.relationships {
                swap(&mut rel.target);
            }
        }

        match kind {
            EntityKind::Character => {
                for artifact in &mut self.artifacts {
                    if let Some(holder) = artifact.current_holder.as_mut() {
                        swap(holder);
                    }
                }
                for event in &mut self.events {
                    event.participants.iter_mut().for_each(swap);
                }
                for rule in &mut self.world_rules {
                    rule.character_restrictions.iter_mut().for_each(swap);
                }
            }
            EntityKind::Location => {
                for location in &mut self.locations {
                    location.connected_to.iter_mut().for_each(swap);
                }
                for artifact in &mut self.artifacts {
                    if let Some(location) = artifact.current_location.as_mut() {
                        swap(location);
                    }
                    if let Some(hidden) = artifact.hidden_location.as_mut() {
                        swap(hidden);
                    }
                }
                for rule in &mut self.world_rules {
                    rule.location_restrictions.iter_mut().for_each(swap);
                }
            }
            _ => {}
        }
    }
}
