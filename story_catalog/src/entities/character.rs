//! Character definitions.

use serde::{Deserialize, Serialize};

use super::{EntityId, EntityKind};

/// A character as authored in the story bible.
///
/// Everything here is free text written by collaborators; the continuity
/// engine derives structured traits from it at aggregation time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Character {
    pub id: EntityId,
    pub name: String,
    pub role: String,
    pub age: String,

    pub physical_description: String,
    pub personality: String,
    pub backstory: String,

    // Visual
    pub default_clothing: String,
    pub distinctive_marks: Vec<String>,
    pub style_notes: String,

    // Voice
    pub verbal_tics: Vec<String>,
    pub catchphrases: Vec<String>,
    pub vocabulary_level: Option<VocabularyLevel>,
    pub accent: String,

    // Inner life
    pub motivations: String,
    pub fears: String,
    pub flaws: String,
    pub habits: Vec<String>,
    pub mannerisms: Vec<String>,
    pub series_arc: String,

    pub relationships: Vec<DeclaredRelationship>,
}

impl_catalog_entity!(Character, EntityKind::Character);

impl Character {
    /// Create a new character with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: EntityId::new(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    pub fn with_physical_description(mut self, description: impl Into<String>) -> Self {
        self.physical_description = description.into();
        self
    }

    pub fn with_personality(mut self, personality: impl Into<String>) -> Self {
        self.personality = personality.into();
        self
    }

    pub fn with_default_clothing(mut self, clothing: impl Into<String>) -> Self {
        self.default_clothing = clothing.into();
        self
    }

    pub fn with_accent(mut self, accent: impl Into<String>) -> Self {
        self.accent = accent.into();
        self
    }

    pub fn with_vocabulary(mut self, level: VocabularyLevel) -> Self {
        self.vocabulary_level = Some(level);
        self
    }

    /// Declare a relationship towards another entity by name.
    pub fn with_relationship(
        mut self,
        target: impl Into<String>,
        kind: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.relationships.push(DeclaredRelationship {
            target: target.into(),
            kind: kind.into(),
            description: description.into(),
            dynamics: String::new(),
        });
        self
    }

    /// Find the declared relationship towards `target`, if any.
    pub fn relationship_to(&self, target: &str) -> Option<&DeclaredRelationship> {
        self.relationships.iter().find(|r| r.target == target)
    }
}

/// A relationship declared in the catalog, keyed by the target's display name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeclaredRelationship {
    pub target: String,
    /// Free-form label such as "ally", "mentor", "rival".
    pub kind: String,
    pub description: String,
    pub dynamics: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VocabularyLevel {
    Standard,
    Formal,
    Casual,
    Archaic,
}

impl VocabularyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            VocabularyLevel::Standard => "standard",
            VocabularyLevel::Formal => "formal",
            VocabularyLevel::Casual => "casual",
            VocabularyLevel::Archaic => "archaic",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_character() {
        let character = Character::new("Kael Thornwood");
        assert_eq!(character.name, "Kael Thornwood");
        assert!(character.relationships.is_empty());
        assert!(character.vocabulary_level.is_none());
    }

    #[test]
    fn test_relationship_lookup() {
        let kael = Character::new("Kael")
            .with_relationship("Lyria", "ally", "Reluctant partnership")
            .with_relationship("Valdris", "enemy", "");

        assert_eq!(kael.relationship_to("Lyria").map(|r| r.kind.as_str()), Some("ally"));
        assert!(kael.relationship_to("Mira").is_none());
    }

    #[test]
    fn test_deserialize_partial_character() {
        let kael: Character = serde_json::from_str(
            r#"{ "name": "Kael", "vocabulary_level": "archaic", "verbal_tics": ["hm"] }"#,
        )
        .unwrap();
        assert_eq!(kael.vocabulary_level, Some(VocabularyLevel::Archaic));
        assert_eq!(kael.verbal_tics, vec!["hm".to_string()]);
    }
}
