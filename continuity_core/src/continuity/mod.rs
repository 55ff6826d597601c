//! The continuity aggregator.
//!
//! Walks the catalog and the narrative tree up to a [`Cursor`] and builds a
//! [`ContinuityState`]: what every character looks like, feels, carries and
//! has been through, where items are, what has happened, and what each
//! location has looked like so far.
//!
//! Aggregation is a pure function of `(catalog, series, cursor)`. It reads no
//! clock and makes no random choices, so the same inputs always serialize to
//! the same bytes.

mod checklist;
mod cursor;
mod lexicon;
mod state;

use std::collections::BTreeSet;

use story_catalog::EntityCatalog;
use tracing::debug;

pub use checklist::{
    rule_applies, ActiveRule, CharacterChecklist, ConsistencyChecklist, RuleApplication, Scene,
    SceneContinuity,
};
pub use cursor::{Cursor, StoryPosition};
pub use lexicon::{
    mentions_name, mentions_phrase, tokenize, Capture, ItemAction, ItemSignal, KeywordGroup,
    Lexicon, PhraseRule, Token, VisualTraits, VocabularyPatterns,
};
pub use state::*;

use crate::config::EngineConfig;
use crate::tree::{Beat, Panel, Series};

/// Builds continuity snapshots.
#[derive(Debug, Clone, Default)]
pub struct ContinuityAggregator {
    config: EngineConfig,
}

impl ContinuityAggregator {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Snapshot of everything up to and including `cursor`.
    pub fn aggregate(
        &self,
        catalog: &EntityCatalog,
        series: &Series,
        cursor: Cursor,
    ) -> ContinuityState {
        let mut walk = Walk::seed(&self.config, catalog, cursor);
        walk.visit_series(series, cursor);
        walk.state
    }

    /// Like [`Self::aggregate`], plus the scene section: active rules, items
    /// at hand, recent events and the consistency checklist.
    pub fn aggregate_for_scene(
        &self,
        catalog: &EntityCatalog,
        series: &Series,
        cursor: Cursor,
        scene: &Scene,
    ) -> ContinuityState {
        let mut walk = Walk::seed(&self.config, catalog, cursor);
        walk.visit_series(series, cursor);
        for name in &scene.characters {
            walk.character(name);
        }

        let mut state = walk.state;
        state.scene = Some(SceneContinuity::build(&state, catalog, scene, &self.config));
        state
    }
}

/// One aggregation in progress.
struct Walk<'a> {
    config: &'a EngineConfig,
    catalog: &'a EntityCatalog,
    state: ContinuityState,
}

impl<'a> Walk<'a> {
    fn seed(config: &'a EngineConfig, catalog: &'a EntityCatalog, cursor: Cursor) -> Self {
        let lexicon = &config.lexicon;
        let mut state = ContinuityState {
            cursor,
            ..Default::default()
        };

        for character in &catalog.characters {
            state.characters.insert(
                character.name.clone(),
                CharacterState::from_catalog(character, lexicon),
            );
        }
        for artifact in &catalog.artifacts {
            state
                .items
                .insert(artifact.name.clone(), ItemState::from_artifact(artifact));
        }
        for location in &catalog.locations {
            state
                .locations
                .insert(location.name.clone(), LocationState::from_catalog(location));
        }
        for event in &catalog.events {
            state.timeline.push(TimelineEntry::backstory(event));
            if let Some(consequence) = event.ongoing_consequences.as_deref() {
                if !consequence.trim().is_empty() {
                    state.active_consequences.push(Consequence {
                        source: event.name.clone(),
                        consequence: consequence.to_string(),
                    });
                }
            }
        }

        Self {
            config,
            catalog,
            state,
        }
    }

    fn visit_series(&mut self, series: &Series, cursor: Cursor) {
        let mut visited = 0usize;

        let mut books: Vec<_> = series.books.iter().collect();
        books.sort_by_key(|book| book.number);
        'books: for book in books {
            if cursor.stops_before_book(book.number) {
                break;
            }
            let mut chapters: Vec<_> = book.chapters.iter().collect();
            chapters.sort_by_key(|chapter| chapter.number);
            for chapter in chapters {
                if cursor.stops_before_chapter(book.number, chapter.number) {
                    continue 'books;
                }
                let mut beats: Vec<_> = chapter.beats.iter().collect();
                beats.sort_by_key(|beat| beat.sequence);
                for beat in beats {
                    if cursor.stops_before_beat(book.number, chapter.number, beat.sequence) {
                        break;
                    }
                    let at = StoryPosition::new(book.number, chapter.number, beat.sequence);
                    self.visit_beat(at, beat);
                    visited += 1;
                }
            }
        }

        debug!(
            cursor = ?cursor,
            beats = visited,
            degraded = self.state.degraded_references.len(),
            "aggregated continuity"
        );
    }

    fn visit_beat(&mut self, at: StoryPosition, beat: &Beat) {
        let location = (!beat.location.trim().is_empty()).then(|| beat.location.clone());
        let present = beat.distinct_characters();

        for name in &present {
            let character = self.character(name);
            character.appearances.push(Appearance {
                at,
                beat_title: beat.title.clone(),
                location: location.clone(),
            });
            if location.is_some() {
                character.current.current_location = location.clone();
            }
        }
        if let Some(location) = &location {
            self.location(location);
        }

        self.update_emotions(beat, &present);
        self.record_item_mentions(at, beat);

        if beat.beat_type.is_timeline_event() {
            self.state.timeline.push(TimelineEntry {
                name: beat.title.clone(),
                description: beat.summary.clone(),
                participants: beat.characters.clone(),
                at: Some(at),
                ..Default::default()
            });
        }

        let mut pages: Vec<_> = beat.pages.iter().collect();
        pages.sort_by_key(|page| page.page_number);
        for page in pages {
            let mut panels: Vec<_> = page.panels.iter().collect();
            panels.sort_by_key(|panel| panel.panel_number);
            for panel in panels {
                self.visit_panel(at, beat, page.page_number, panel);
            }
        }

        for (i, first) in present.iter().enumerate() {
            for second in &present[i + 1..] {
                self.interact(first, second, at, &beat.summary);
                self.interact(second, first, at, &beat.summary);
            }
        }
    }

    /// Characters whose name appears in the summary take its emotion.
    fn update_emotions(&mut self, beat: &Beat, present: &[&str]) {
        let (config, catalog) = (self.config, self.catalog);
        let tokens = tokenize(&beat.summary);
        let Some(emotion) = config.lexicon.detect_emotion(&tokens) else {
            return;
        };

        let mut candidates: BTreeSet<&str> = present.iter().copied().collect();
        candidates.extend(catalog.characters.iter().map(|c| c.name.as_str()));

        for name in candidates {
            if !name.is_empty() && mentions_name(&tokens, name) {
                self.character(name).current.emotional_state = emotion.to_string();
            }
        }
    }

    fn record_item_mentions(&mut self, at: StoryPosition, beat: &Beat) {
        let tokens = tokenize(&beat.summary);
        for item in self.state.items.values_mut() {
            if mentions_phrase(&tokens, &item.name) {
                item.history.push(ItemEvent {
                    at,
                    kind: ItemEventKind::Mentioned,
                    context: beat.summary.clone(),
                });
            }
        }
    }

    fn visit_panel(&mut self, at: StoryPosition, beat: &Beat, page: u32, panel: &Panel) {
        for name in &panel.characters {
            if !name.is_empty() {
                self.character(name);
            }
        }

        let tokens = tokenize(&panel.action);
        if let Some(actor) = panel.actor() {
            for signal in self.config.lexicon.item_signals(&tokens) {
                self.apply_item_signal(at, actor, &signal, &panel.action);
            }
        }

        let mut wounded = BTreeSet::new();
        for name in &panel.characters {
            if name.is_empty() || !wounded.insert(name.as_str()) {
                continue;
            }
            let injuries = self.config.lexicon.injuries(&panel.action, &tokens, name);
            let character = self.character(name);
            for description in injuries {
                character.current.injuries.push(Wound {
                    description,
                    severity: DEFAULT_WOUND_SEVERITY.to_string(),
                    at,
                    page,
                    panel: panel.panel_number,
                });
            }
        }

        if beat.location.trim().is_empty() {
            return;
        }
        let visual_limit = self.config.visual_history_limit;
        let atmosphere_limit = self.config.atmosphere_history_limit;
        let lighting = self.config.lexicon.lighting(&panel.visual_description);
        let weather = self.config.lexicon.weather(&panel.visual_description);
        let location = self.location(&beat.location);

        if !panel.visual_description.trim().is_empty() {
            if lighting.is_some() {
                location.lighting = lighting.clone();
            }
            if weather.is_some() {
                location.weather = weather.clone();
            }
            push_capped(
                &mut location.details,
                VisualNote {
                    at,
                    page,
                    panel: panel.panel_number,
                    description: panel.visual_description.clone(),
                    lighting,
                    weather,
                },
                visual_limit,
            );
        }
        if !panel.art_notes.trim().is_empty() {
            push_capped(
                &mut location.atmosphere,
                panel.art_notes.clone(),
                atmosphere_limit,
            );
        }
    }

    /// Pickup appends to the actor's carried items, drop removes the first
    /// match. A catalog item the word names follows the hand-off.
    fn apply_item_signal(
        &mut self,
        at: StoryPosition,
        actor: &str,
        signal: &ItemSignal,
        context: &str,
    ) {
        let character = self.character(actor);
        let actor_location = character.current.current_location.clone();
        let carried = &mut character.current.items_carrying;
        match signal.action {
            ItemAction::Pickup => carried.push(signal.item.clone()),
            ItemAction::Drop => {
                if let Some(index) = carried
                    .iter()
                    .position(|c| c.eq_ignore_ascii_case(&signal.item))
                {
                    carried.remove(index);
                }
            }
        }

        let items = &mut self.state.items;
        let key = items
            .values()
            .find(|item| item.name.eq_ignore_ascii_case(&signal.item))
            .or_else(|| items.values().find(|item| item.is_named_by(&signal.item)))
            .map(|item| item.name.clone());
        let Some(item) = key.and_then(|key| items.get_mut(&key)) else {
            return;
        };

        let by = actor.to_string();
        let kind = match signal.action {
            ItemAction::Pickup => {
                item.holder = Some(by.clone());
                ItemEventKind::PickedUp { by }
            }
            ItemAction::Drop => {
                item.holder = None;
                ItemEventKind::Dropped { by }
            }
        };
        if let Some(location) = actor_location {
            item.current_location = location;
        }
        item.history.push(ItemEvent {
            at,
            kind,
            context: context.to_string(),
        });
    }

    fn interact(&mut self, from: &str, to: &str, at: StoryPosition, summary: &str) {
        self.character(from)
            .relationships
            .entry(to.to_string())
            .or_default()
            .interactions
            .push(Interaction {
                at,
                context: summary.to_string(),
            });
    }

    /// State for `name`, stubbed when the catalog has no such character.
    fn character(&mut self, name: &str) -> &mut CharacterState {
        let ContinuityState {
            characters,
            degraded_references,
            ..
        } = &mut self.state;
        characters.entry(name.to_string()).or_insert_with(|| {
            debug!(character = name, "unknown character reference, using a stub");
            degraded_references.insert(name.to_string());
            CharacterState::stub(name)
        })
    }

    fn location(&mut self, name: &str) -> &mut LocationState {
        let ContinuityState {
            locations,
            degraded_references,
            ..
        } = &mut self.state;
        locations.entry(name.to_string()).or_insert_with(|| {
            debug!(location = name, "unknown location reference, using a stub");
            degraded_references.insert(name.to_string());
            LocationState::named(name)
        })
    }
}
