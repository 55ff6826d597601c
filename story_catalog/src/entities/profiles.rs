//! Non-character catalog records: locations, factions, artifacts, events, world rules.

use serde::{Deserialize, Serialize};

use super::{EntityId, EntityKind};

/// Location types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationType {
    Landmark,
    Settlement,
    Region,
    Building,
    Wilderness,
    #[default]
    Other,
}

/// A place in the story world.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Location {
    pub id: EntityId,
    pub name: String,
    pub location_type: LocationType,
    pub description: String,
    pub atmosphere: String,
    pub key_features: Vec<String>,
    pub visual_elements: Vec<String>,
    /// Names of adjacent locations.
    pub connected_to: Vec<String>,
}

impl_catalog_entity!(Location, EntityKind::Location);

impl Location {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_atmosphere(mut self, atmosphere: impl Into<String>) -> Self {
        self.atmosphere = atmosphere.into();
        self
    }
}

/// A faction or organization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Faction {
    pub id: EntityId,
    pub name: String,
    pub faction_type: String,
    pub description: String,
    pub goals: Vec<String>,
    pub methods: Vec<String>,
}

impl_catalog_entity!(Faction, EntityKind::Faction);

impl Faction {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(),
            name: name.into(),
            ..Default::default()
        }
    }
}

/// An item that can be carried, hidden, or handed over.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Artifact {
    pub id: EntityId,
    pub name: String,
    /// "object", "tool", "weapon", ...
    pub artifact_type: String,
    pub description: String,
    pub visual_description: String,
    pub origin: String,
    pub powers: Vec<String>,
    pub limitations: Vec<String>,
    /// Where the item starts the story.
    pub current_location: Option<String>,
    /// Character holding the item when the story starts.
    pub current_holder: Option<String>,
    pub hidden_location: Option<String>,
}

impl_catalog_entity!(Artifact, EntityKind::Artifact);

impl Artifact {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_holder(mut self, holder: impl Into<String>) -> Self {
        self.current_holder = Some(holder.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.current_location = Some(location.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Whether a single word from panel text refers to this item.
    ///
    /// Matches the whole name or any word of it, ignoring case, so "crown"
    /// refers to "The Shattered Crown".
    pub fn is_named_by(&self, word: &str) -> bool {
        name_mentions_word(&self.name, word)
    }
}

/// Whether `word` is a display name or one of its significant words.
///
/// Articles and "of" never count, and a possessive `'s` is ignored.
pub fn name_mentions_word(name: &str, word: &str) -> bool {
    let word = word.trim().to_lowercase();
    if word.is_empty() {
        return false;
    }
    let name = name.to_lowercase();
    name == word
        || name
            .split(|c: char| !c.is_alphanumeric() && c != '\'')
            .filter(|part| !matches!(*part, "" | "the" | "a" | "an" | "of"))
            .any(|part| part == word || part.trim_end_matches("'s") == word)
}

/// A historical event that predates the story (backstory).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoryEvent {
    pub id: EntityId,
    pub name: String,
    pub event_type: String,
    pub description: String,
    /// Free-form in-world date, e.g. "200 years before present".
    pub date: String,
    pub impact: String,
    pub participants: Vec<String>,
    /// Consequences still felt during the story, if any.
    pub ongoing_consequences: Option<String>,
}

impl_catalog_entity!(StoryEvent, EntityKind::Event);

impl StoryEvent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_consequences(mut self, consequences: impl Into<String>) -> Self {
        self.ongoing_consequences = Some(consequences.into());
        self
    }
}

/// A rule governing how the world works.
///
/// Empty restriction lists mean the rule applies everywhere.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldRule {
    pub id: EntityId,
    pub name: String,
    pub category: String,
    pub statement: String,
    pub explanation: String,
    pub implications: Option<String>,
    pub exceptions: Option<String>,
    pub visual_manifestation: String,
    /// Location names (matched as case-insensitive substrings).
    pub location_restrictions: Vec<String>,
    /// Character names (matched exactly).
    pub character_restrictions: Vec<String>,
}

impl_catalog_entity!(WorldRule, EntityKind::WorldRule);

impl WorldRule {
    pub fn new(name: impl Into<String>, statement: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(),
            name: name.into(),
            statement: statement.into(),
            ..Default::default()
        }
    }

    pub fn with_implications(mut self, implications: impl Into<String>) -> Self {
        self.implications = Some(implications.into());
        self
    }

    pub fn restricted_to_location(mut self, location: impl Into<String>) -> Self {
        self.location_restrictions.push(location.into());
        self
    }

    pub fn restricted_to_character(mut self, character: impl Into<String>) -> Self {
        self.character_restrictions.push(character.into());
        self
    }

    pub fn is_unrestricted(&self) -> bool {
        self.location_restrictions.is_empty() && self.character_restrictions.is_empty()
    }
}
