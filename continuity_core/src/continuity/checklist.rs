//! Scene-scoped continuity: active world rules, items at hand and the
//! consistency checklist handed to prompt assembly.

use serde::{Deserialize, Serialize};
use story_catalog::{EntityCatalog, WorldRule};

use super::state::{ContinuityState, TimelineEntry};
use crate::config::EngineConfig;
use crate::tree::Beat;

/// Where a scene happens and who is in it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    pub location: String,
    pub characters: Vec<String>,
}

impl Scene {
    pub fn new<I, S>(location: impl Into<String>, characters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            location: location.into(),
            characters: characters.into_iter().map(Into::into).collect(),
        }
    }

    /// The scene a beat describes.
    pub fn from_beat(beat: &Beat) -> Self {
        Self::new(beat.location.clone(), beat.distinct_characters())
    }

    pub fn has_character(&self, name: &str) -> bool {
        self.characters.iter().any(|c| c == name)
    }
}

/// Whether a world rule is in force for a scene.
///
/// Unrestricted rules always apply. Otherwise a location restriction must be a
/// case-insensitive substring of the scene location, or a character
/// restriction must name someone in the scene.
pub fn rule_applies(rule: &WorldRule, scene: &Scene) -> bool {
    if rule.is_unrestricted() {
        return true;
    }
    let location = scene.location.to_lowercase();
    let by_location = !location.is_empty()
        && rule
            .location_restrictions
            .iter()
            .filter(|r| !r.trim().is_empty())
            .any(|r| location.contains(&r.to_lowercase()));
    by_location
        || rule
            .character_restrictions
            .iter()
            .any(|name| scene.has_character(name))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActiveRule {
    pub name: String,
    pub category: String,
    pub statement: String,
    pub explanation: String,
    pub implications: Option<String>,
    pub exceptions: Option<String>,
    pub visual_manifestation: String,
}

impl From<&WorldRule> for ActiveRule {
    fn from(rule: &WorldRule) -> Self {
        Self {
            name: rule.name.clone(),
            category: rule.category.clone(),
            statement: rule.statement.clone(),
            explanation: rule.explanation.clone(),
            implications: rule.implications.clone(),
            exceptions: rule.exceptions.clone(),
            visual_manifestation: rule.visual_manifestation.clone(),
        }
    }
}

/// How a rule with stated implications plays out in this scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleApplication {
    pub rule: String,
    pub application: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneContinuity {
    pub scene: Scene,
    pub active_rules: Vec<ActiveRule>,
    pub rule_applications: Vec<RuleApplication>,
    pub items_in_scene: Vec<String>,
    pub recent_events: Vec<TimelineEntry>,
    pub checklist: ConsistencyChecklist,
}

impl SceneContinuity {
    pub(crate) fn build(
        state: &ContinuityState,
        catalog: &EntityCatalog,
        scene: &Scene,
        config: &EngineConfig,
    ) -> Self {
        let rules: Vec<&WorldRule> = catalog
            .world_rules
            .iter()
            .filter(|rule| rule_applies(rule, scene))
            .collect();

        let rule_applications = rules
            .iter()
            .filter_map(|rule| {
                let implications = rule.implications.as_deref()?.trim();
                (!implications.is_empty()).then(|| RuleApplication {
                    rule: rule.name.clone(),
                    application: format!("In this scene: {implications}"),
                })
            })
            .collect();

        let items_in_scene = state
            .items
            .values()
            .filter(|item| {
                (!scene.location.is_empty() && item.current_location == scene.location)
                    || item.holder.as_deref().is_some_and(|h| scene.has_character(h))
            })
            .map(|item| item.name.clone())
            .collect();

        let story_events: Vec<&TimelineEntry> = state.story_events().collect();
        let skip = story_events.len().saturating_sub(config.recent_events_limit);
        let recent_events = story_events.into_iter().skip(skip).cloned().collect();

        Self {
            scene: scene.clone(),
            active_rules: rules.into_iter().map(ActiveRule::from).collect(),
            rule_applications,
            items_in_scene,
            recent_events,
            checklist: ConsistencyChecklist::build(state, scene),
        }
    }
}

/// Facts generated content for a scene must not contradict.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyChecklist {
    pub characters: Vec<CharacterChecklist>,
    pub lighting: Option<String>,
    pub weather: Option<String>,
    /// Earlier panel descriptions at this location, oldest first.
    pub location_visuals: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CharacterChecklist {
    pub name: String,
    pub hair: Option<String>,
    pub eyes: Option<String>,
    pub distinguishing_features: Vec<String>,
    pub current_clothing: String,
    pub emotional_state: String,
    pub injuries: Vec<String>,
    /// Carried items plus catalog items this character holds.
    pub carrying: Vec<String>,
}

impl ConsistencyChecklist {
    fn build(state: &ContinuityState, scene: &Scene) -> Self {
        let characters = scene
            .characters
            .iter()
            .filter_map(|name| state.character(name))
            .map(|character| {
                let mut carrying = character.current.items_carrying.clone();
                let held = state
                    .items
                    .values()
                    .filter(|item| item.holder.as_deref() == Some(character.name()))
                    .map(|item| item.name.clone());
                for item in held {
                    if !carrying.iter().any(|c| c.eq_ignore_ascii_case(&item)) {
                        carrying.push(item);
                    }
                }

                CharacterChecklist {
                    name: character.name().to_string(),
                    hair: character.visual.hair.clone(),
                    eyes: character.visual.eyes.clone(),
                    distinguishing_features: character.identity.distinguishing_features.clone(),
                    current_clothing: character.current.current_clothing.clone(),
                    emotional_state: character.current.emotional_state.clone(),
                    injuries: character
                        .current
                        .injuries
                        .iter()
                        .map(|w| w.description.clone())
                        .collect(),
                    carrying,
                }
            })
            .collect();

        let location = state.location(&scene.location);
        Self {
            characters,
            lighting: location.and_then(|l| l.lighting.clone()),
            weather: location.and_then(|l| l.weather.clone()),
            location_visuals: location
                .map(|l| l.details.iter().map(|d| d.description.clone()).collect())
                .unwrap_or_default(),
        }
    }

    /// Render as a markdown block for a generation prompt.
    pub fn to_prompt_section(&self) -> String {
        let mut prompt = String::new();
        prompt.push_str("## Consistency Checklist\n");

        for character in &self.characters {
            prompt.push_str(&format!("### {}\n", character.name));
            if let Some(hair) = &character.hair {
                prompt.push_str(&format!("- Hair: {}\n", hair));
            }
            if let Some(eyes) = &character.eyes {
                prompt.push_str(&format!("- Eyes: {}\n", eyes));
            }
            if !character.distinguishing_features.is_empty() {
                prompt.push_str(&format!(
                    "- Features: {}\n",
                    character.distinguishing_features.join(", ")
                ));
            }
            if !character.current_clothing.is_empty() {
                prompt.push_str(&format!("- Wearing: {}\n", character.current_clothing));
            }
            prompt.push_str(&format!("- Mood: {}\n", character.emotional_state));
            prompt.push_str(&format!(
                "- Injuries: {}\n",
                if character.injuries.is_empty() {
                    "None".to_string()
                } else {
                    character.injuries.join("; ")
                }
            ));
            if !character.carrying.is_empty() {
                prompt.push_str(&format!("- Carrying: {}\n", character.carrying.join(", ")));
            }
        }

        if self.lighting.is_some() || self.weather.is_some() {
            prompt.push_str("### Setting\n");
            if let Some(lighting) = &self.lighting {
                prompt.push_str(&format!("- Lighting: {}\n", lighting));
            }
            if let Some(weather) = &self.weather {
                prompt.push_str(&format!("- Weather: {}\n", weather));
            }
        }

        if !self.location_visuals.is_empty() {
            prompt.push_str("### Established Visuals\n");
            for visual in &self.location_visuals {
                prompt.push_str(&format!("- {}\n", visual));
            }
        }

        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::continuity::state::{CharacterState, ItemState, LocationState};

    #[test]
    fn test_rule_applicability() {
        let scene = Scene::new("The Northern Citadel", ["Kael"]);

        assert!(rule_applies(&WorldRule::new("Gravity", "Things fall"), &scene));
        assert!(rule_applies(
            &WorldRule::new("Wards", "No magic").restricted_to_location("citadel"),
            &scene
        ));
        assert!(rule_applies(
            &WorldRule::new("Bond", "Feels the bells").restricted_to_character("Kael"),
            &scene
        ));
        assert!(!rule_applies(
            &WorldRule::new("Tides", "Sea magic").restricted_to_location("Harbour"),
            &scene
        ));
        assert!(!rule_applies(
            &WorldRule::new("Sight", "Sees ghosts").restricted_to_character("Lyria"),
            &scene
        ));
    }

    #[test]
    fn test_scene_from_beat_dedups() {
        let beat = Beat {
            location: "Harbour".into(),
            characters: vec!["Kael".into(), "Lyria".into(), "Kael".into()],
            ..Default::default()
        };
        let scene = Scene::from_beat(&beat);
        assert_eq!(scene.characters, vec!["Kael", "Lyria"]);
        assert_eq!(scene.location, "Harbour");
    }

    fn sample_state() -> ContinuityState {
        let mut state = ContinuityState::default();

        let mut kael = CharacterState::stub("Kael");
        kael.visual.hair = Some("dark".into());
        kael.current.items_carrying = vec!["torch".into()];
        state.characters.insert("Kael".into(), kael);

        let mut crown = ItemState {
            name: "Shattered Crown".into(),
            current_location: "Vault".into(),
            ..Default::default()
        };
        crown.holder = Some("Kael".into());
        state.items.insert(crown.name.clone(), crown);

        let amulet = ItemState {
            name: "Amulet".into(),
            current_location: "Citadel".into(),
            ..Default::default()
        };
        state.items.insert(amulet.name.clone(), amulet);

        let mut citadel = LocationState::named("Citadel");
        citadel.lighting = Some("dim".into());
        state.locations.insert("Citadel".into(), citadel);
        state
    }

    #[test]
    fn test_scene_items_and_checklist() {
        let state = sample_state();
        let mut catalog = EntityCatalog::new();
        catalog.add_world_rule(
            WorldRule::new("Resonance", "Magic follows feeling")
                .with_implications("spells flare with emotion"),
        );

        let scene = Scene::new("Citadel", ["Kael"]);
        let section = SceneContinuity::build(&state, &catalog, &scene, &EngineConfig::default());

        assert_eq!(section.items_in_scene, vec!["Amulet", "Shattered Crown"]);
        assert_eq!(section.active_rules.len(), 1);
        assert_eq!(
            section.rule_applications[0].application,
            "In this scene: spells flare with emotion"
        );

        let kael = &section.checklist.characters[0];
        assert_eq!(kael.carrying, vec!["torch", "Shattered Crown"]);
        assert_eq!(section.checklist.lighting.as_deref(), Some("dim"));
    }

    #[test]
    fn test_prompt_section() {
        let state = sample_state();
        let scene = Scene::new("Citadel", ["Kael"]);
        let checklist = ConsistencyChecklist::build(&state, &scene);
        let prompt = checklist.to_prompt_section();

        assert!(prompt.starts_with("## Consistency Checklist\n"));
        assert!(prompt.contains("### Kael"));
        assert!(prompt.contains("- Hair: dark"));
        assert!(prompt.contains("- Injuries: None"));
        assert!(prompt.contains("- Carrying: torch, Shattered Crown"));
        assert!(prompt.contains("- Lighting: dim"));
    }
}
