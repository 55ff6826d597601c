//! The snapshot produced by [`super::ContinuityAggregator`].
//!
//! Every map is a `BTreeMap` so that serializing the same state twice gives
//! byte-identical output.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use story_catalog::{
    name_mentions_word, Artifact, Character, DeclaredRelationship, Location, LocationType,
    StoryEvent, VocabularyLevel,
};

use super::checklist::SceneContinuity;
use super::cursor::{Cursor, StoryPosition};
use super::lexicon::Lexicon;

pub const DEFAULT_EMOTION: &str = "neutral";
pub const DEFAULT_CONDITION: &str = "normal";
pub const DEFAULT_ITEM_CONDITION: &str = "intact";
pub const DEFAULT_WOUND_SEVERITY: &str = "moderate";

/// Point-in-time continuity for one cursor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContinuityState {
    pub cursor: Cursor,
    pub characters: BTreeMap<String, CharacterState>,
    pub items: BTreeMap<String, ItemState>,
    /// Backstory first, then story events in walk order.
    pub timeline: Vec<TimelineEntry>,
    pub active_consequences: Vec<Consequence>,
    pub locations: BTreeMap<String, LocationState>,
    /// Names the tree uses that the catalog does not know.
    pub degraded_references: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene: Option<SceneContinuity>,
}

impl ContinuityState {
    pub fn character(&self, name: &str) -> Option<&CharacterState> {
        self.characters.get(name)
    }

    pub fn item(&self, name: &str) -> Option<&ItemState> {
        self.items.get(name)
    }

    /// Exact name first, then a case-insensitive match.
    pub fn location(&self, name: &str) -> Option<&LocationState> {
        self.locations.get(name).or_else(|| {
            self.locations
                .values()
                .find(|loc| loc.name.eq_ignore_ascii_case(name))
        })
    }

    /// Timeline entries that happened during the walked story.
    pub fn story_events(&self) -> impl Iterator<Item = &TimelineEntry> {
        self.timeline.iter().filter(|entry| !entry.is_backstory)
    }
}

// ---------------------------------------------------------------------------
// Characters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CharacterState {
    pub identity: Identity,
    pub personality: Personality,
    pub visual: VisualDetails,
    pub current: CurrentState,
    /// Keyed by the other character's name.
    pub relationships: BTreeMap<String, RelationshipState>,
    pub appearances: Vec<Appearance>,
    pub series_arc: String,
    /// Built from tree references alone; the catalog has no record.
    pub is_stub: bool,
}

impl CharacterState {
    /// Seed from a catalog record, deriving traits through `lexicon`.
    pub fn from_catalog(character: &Character, lexicon: &Lexicon) -> Self {
        let visual = lexicon.visual_traits(&character.physical_description);
        let relationships = character
            .relationships
            .iter()
            .filter(|r| !r.target.is_empty())
            .map(|r| (r.target.clone(), RelationshipState::declared(r)))
            .collect();

        Self {
            identity: Identity {
                name: character.name.clone(),
                role: character.role.clone(),
                age: character.age.clone(),
                physical_description: character.physical_description.clone(),
                distinguishing_features: lexicon
                    .distinguishing_features(&character.physical_description),
                voice: lexicon.voice(&character.personality, &character.accent),
                speech_patterns: lexicon.speech_patterns(character),
                vocabulary: character.vocabulary_level,
                accent: character.accent.clone(),
            },
            personality: Personality {
                core: character.personality.clone(),
                traits: lexicon.traits(&character.personality),
                motivations: character.motivations.clone(),
                fears: character.fears.clone(),
                flaws: character.flaws.clone(),
                habits: character.habits.clone(),
                mannerisms: character.mannerisms.clone(),
            },
            visual: VisualDetails {
                hair: visual.hair,
                eyes: visual.eyes,
                skin: visual.skin,
                height: visual.height,
                build: visual.build,
                distinctive_marks: character.distinctive_marks.clone(),
                default_clothing: character.default_clothing.clone(),
                style_notes: character.style_notes.clone(),
            },
            current: CurrentState::wearing(&character.default_clothing),
            relationships,
            appearances: Vec::new(),
            series_arc: character.series_arc.clone(),
            is_stub: false,
        }
    }

    /// Minimal state for a name the catalog does not know.
    pub fn stub(name: &str) -> Self {
        Self {
            identity: Identity {
                name: name.to_string(),
                ..Default::default()
            },
            current: CurrentState::default(),
            is_stub: true,
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.identity.name
    }

    /// Case-insensitive.
    pub fn is_carrying(&self, item: &str) -> bool {
        self.current
            .items_carrying
            .iter()
            .any(|carried| carried.eq_ignore_ascii_case(item))
    }

    pub fn relationship(&self, other: &str) -> Option<&RelationshipState> {
        self.relationships.get(other)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    pub role: String,
    pub age: String,
    pub physical_description: String,
    pub distinguishing_features: Vec<String>,
    pub voice: Vec<String>,
    pub speech_patterns: Vec<String>,
    pub vocabulary: Option<VocabularyLevel>,
    pub accent: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Personality {
    /// The catalog's personality text as written.
    pub core: String,
    pub traits: Vec<String>,
    pub motivations: String,
    pub fears: String,
    pub flaws: String,
    pub habits: Vec<String>,
    pub mannerisms: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisualDetails {
    pub hair: Option<String>,
    pub eyes: Option<String>,
    pub skin: Option<String>,
    pub height: Option<String>,
    pub build: Option<String>,
    pub distinctive_marks: Vec<String>,
    pub default_clothing: String,
    pub style_notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentState {
    pub emotional_state: String,
    pub physical_condition: String,
    pub current_clothing: String,
    pub injuries: Vec<Wound>,
    pub items_carrying: Vec<String>,
    pub current_location: Option<String>,
}

impl Default for CurrentState {
    fn default() -> Self {
        Self::wearing("")
    }
}

impl CurrentState {
    pub fn wearing(clothing: &str) -> Self {
        Self {
            emotional_state: DEFAULT_EMOTION.to_string(),
            physical_condition: DEFAULT_CONDITION.to_string(),
            current_clothing: clothing.to_string(),
            injuries: Vec::new(),
            items_carrying: Vec::new(),
            current_location: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wound {
    /// The injury phrase as written in the panel.
    pub description: String,
    pub severity: String,
    pub at: StoryPosition,
    pub page: u32,
    pub panel: u32,
}

/// A beat the character was present in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appearance {
    pub at: StoryPosition,
    pub beat_title: String,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationshipState {
    pub kind: String,
    pub description: String,
    pub dynamics: String,
    /// Declared in the catalog rather than inferred from shared beats.
    pub declared: bool,
    pub interactions: Vec<Interaction>,
}

impl RelationshipState {
    pub fn declared(relationship: &DeclaredRelationship) -> Self {
        Self {
            kind: relationship.kind.clone(),
            description: relationship.description.clone(),
            dynamics: relationship.dynamics.clone(),
            declared: true,
            interactions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub at: StoryPosition,
    /// Summary of the shared beat.
    pub context: String,
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemState {
    pub name: String,
    pub item_type: String,
    pub description: String,
    pub visual_description: String,
    pub powers: Vec<String>,
    pub limitations: Vec<String>,
    pub origin: String,
    pub current_location: String,
    pub condition: String,
    pub holder: Option<String>,
    pub hidden_location: Option<String>,
    pub history: Vec<ItemEvent>,
}

impl ItemState {
    pub fn from_artifact(artifact: &Artifact) -> Self {
        let non_empty = |value: &str, fallback: &str| {
            if value.trim().is_empty() {
                fallback.to_string()
            } else {
                value.to_string()
            }
        };

        Self {
            name: artifact.name.clone(),
            item_type: non_empty(&artifact.artifact_type, "object"),
            description: artifact.description.clone(),
            visual_description: non_empty(&artifact.visual_description, &artifact.description),
            powers: artifact.powers.clone(),
            limitations: artifact.limitations.clone(),
            origin: artifact.origin.clone(),
            current_location: artifact
                .current_location
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
            condition: DEFAULT_ITEM_CONDITION.to_string(),
            holder: artifact.current_holder.clone(),
            hidden_location: artifact.hidden_location.clone(),
            history: Vec::new(),
        }
    }

    /// Whether a word from panel text refers to this item.
    pub fn is_named_by(&self, word: &str) -> bool {
        name_mentions_word(&self.name, word)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemEvent {
    pub at: StoryPosition,
    pub kind: ItemEventKind,
    pub context: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemEventKind {
    /// Named in a beat summary.
    Mentioned,
    PickedUp { by: String },
    Dropped { by: String },
}

// ---------------------------------------------------------------------------
// Timeline
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    pub name: String,
    pub description: String,
    /// In-world date of a backstory event.
    pub date: Option<String>,
    pub impact: String,
    pub participants: Vec<String>,
    /// Where in the story the event happened; `None` for backstory.
    pub at: Option<StoryPosition>,
    pub is_backstory: bool,
}

impl TimelineEntry {
    pub fn backstory(event: &StoryEvent) -> Self {
        Self {
            name: event.name.clone(),
            description: event.description.clone(),
            date: (!event.date.is_empty()).then(|| event.date.clone()),
            impact: event.impact.clone(),
            participants: event.participants.clone(),
            at: None,
            is_backstory: true,
        }
    }
}

/// An effect of a past event that still shapes the story.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consequence {
    pub source: String,
    pub consequence: String,
}

// ---------------------------------------------------------------------------
// Locations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationState {
    pub name: String,
    pub location_type: LocationType,
    pub description: String,
    /// The catalog's standing mood for the place.
    pub mood: String,
    pub key_features: Vec<String>,
    pub visual_elements: Vec<String>,
    pub connected_to: Vec<String>,
    /// Most recent panel visuals, oldest first.
    pub details: Vec<VisualNote>,
    /// Most recent art notes, oldest first.
    pub atmosphere: Vec<String>,
    /// Last lighting seen in a panel here.
    pub lighting: Option<String>,
    pub weather: Option<String>,
}

impl LocationState {
    pub fn from_catalog(location: &Location) -> Self {
        Self {
            name: location.name.clone(),
            location_type: location.location_type,
            description: location.description.clone(),
            mood: location.atmosphere.clone(),
            key_features: location.key_features.clone(),
            visual_elements: location.visual_elements.clone(),
            connected_to: location.connected_to.clone(),
            ..Default::default()
        }
    }

    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualNote {
    pub at: StoryPosition,
    pub page: u32,
    pub panel: u32,
    pub description: String,
    pub lighting: Option<String>,
    pub weather: Option<String>,
}

/// Append, then drop the oldest entries beyond `cap`.
pub(crate) fn push_capped<T>(list: &mut Vec<T>, value: T, cap: usize) {
    list.push(value);
    if list.len() > cap {
        let excess = list.len() - cap;
        list.drain(..excess);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_character_seed_derives_traits() {
        let kael = Character::new("Kael")
            .with_role("protagonist")
            .with_physical_description("Tall, with a scar across his cheek and grey eyes")
            .with_personality("Quiet and brave")
            .with_default_clothing("worn leather coat")
            .with_relationship("Lyria", "ally", "Uneasy trust");

        let state = CharacterState::from_catalog(&kael, &Lexicon::default());

        assert_eq!(state.identity.role, "protagonist");
        assert_eq!(
            state.identity.distinguishing_features,
            vec!["scar across his cheek", "grey eyes"]
        );
        assert_eq!(state.identity.voice, vec!["soft-spoken"]);
        assert_eq!(state.personality.traits, vec!["brave"]);
        assert_eq!(state.visual.eyes.as_deref(), Some("grey"));
        assert_eq!(state.current.emotional_state, DEFAULT_EMOTION);
        assert_eq!(state.current.current_clothing, "worn leather coat");
        assert!(state.relationship("Lyria").is_some_and(|r| r.declared));
        assert!(!state.is_stub);
    }

    #[test]
    fn test_stub_defaults() {
        let stub = CharacterState::stub("Stranger");
        assert!(stub.is_stub);
        assert_eq!(stub.name(), "Stranger");
        assert_eq!(stub.current.emotional_state, "neutral");
        assert_eq!(stub.current.physical_condition, "normal");
    }

    #[test]
    fn test_item_seed_defaults() {
        let amulet = Artifact::new("Amulet of Dawn").with_description("A sun-shaped pendant");
        let item = ItemState::from_artifact(&amulet);

        assert_eq!(item.item_type, "object");
        assert_eq!(item.visual_description, "A sun-shaped pendant");
        assert_eq!(item.current_location, "unknown");
        assert_eq!(item.condition, "intact");
        assert!(item.is_named_by("amulet"));
        assert!(!item.is_named_by("of"));
    }

    #[test]
    fn test_push_capped_keeps_newest() {
        let mut list = Vec::new();
        for n in 1..=7 {
            push_capped(&mut list, n, 5);
        }
        assert_eq!(list, vec![3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_location_lookup_ignores_case() {
        let mut state = ContinuityState::default();
        state
            .locations
            .insert("The Citadel".into(), LocationState::named("The Citadel"));
        assert!(state.location("the citadel").is_some());
        assert!(state.location("Harbour").is_none());
    }
}
