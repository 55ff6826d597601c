//! Keyword tables that read structured signals out of free text.
//!
//! Every heuristic the aggregator uses (emotions, item hand-offs, injuries,
//! looks, voice, lighting, weather) is a table in [`Lexicon`] evaluated over
//! a simple word tokenizer. Tables can be replaced from configuration and
//! each rule can be tested without walking a tree.

use serde::{Deserialize, Serialize};
use story_catalog::{Character, VocabularyLevel};

// ---------------------------------------------------------------------------
// Tokenizer
// ---------------------------------------------------------------------------

/// One word of input text with its byte span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token<'a> {
    /// The word as written.
    pub text: &'a str,
    pub lower: String,
    pub start: usize,
    pub end: usize,
    /// Clause punctuation (`,.;:!?`) follows this word.
    pub clause_end: bool,
}

impl Token<'_> {
    /// Lowercase form without a possessive `'s`.
    pub fn base(&self) -> &str {
        self.lower.strip_suffix("'s").unwrap_or(&self.lower)
    }

    fn is(&self, word: &str) -> bool {
        same_word(&self.lower, word)
    }

    fn is_any(&self, words: &[String]) -> bool {
        words.iter().any(|w| self.is(w))
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || is_joiner(c)
}

fn is_joiner(c: char) -> bool {
    matches!(c, '\'' | '\u{2019}' | '-')
}

/// Split text into words. Apostrophes and hyphens stay inside words.
pub fn tokenize(text: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut start = None;

    for (idx, c) in text.char_indices() {
        if is_word_char(c) {
            start.get_or_insert(idx);
            continue;
        }
        if let Some(word_start) = start.take() {
            push_token(&mut tokens, text, word_start, idx);
        }
        if matches!(c, ',' | '.' | ';' | ':' | '!' | '?') {
            if let Some(last) = tokens.last_mut() {
                last.clause_end = true;
            }
        }
    }
    if let Some(word_start) = start {
        push_token(&mut tokens, text, word_start, text.len());
    }

    tokens
}

fn push_token<'a>(tokens: &mut Vec<Token<'a>>, text: &'a str, start: usize, end: usize) {
    let raw = &text[start..end];
    let lead = raw.len() - raw.trim_start_matches(is_joiner).len();
    let word = raw.trim_matches(is_joiner);
    if word.is_empty() {
        return;
    }
    let start = start + lead;
    tokens.push(Token {
        text: word,
        lower: word.to_lowercase().replace('\u{2019}', "'"),
        start,
        end: start + word.len(),
        clause_end: false,
    });
}

fn same_word(lower: &str, word: &str) -> bool {
    lower == word || lower == word.to_lowercase()
}

/// Source text covering tokens `from..=to`.
fn span(text: &str, tokens: &[Token<'_>], from: usize, to: usize) -> String {
    text[tokens[from].start..tokens[to].end].to_string()
}

/// Number of tokens `phrase` covers if it starts at `tokens[at]`.
fn phrase_len(tokens: &[Token<'_>], at: usize, phrase: &str) -> Option<usize> {
    let mut len = 0;
    for word in phrase.split_whitespace() {
        let token = tokens.get(at + len)?;
        if len > 0 && tokens[at + len - 1].clause_end {
            return None;
        }
        if !token.is(word) {
            return None;
        }
        len += 1;
    }
    (len > 0).then_some(len)
}

fn longest_phrase(tokens: &[Token<'_>], at: usize, phrases: &[String]) -> Option<usize> {
    phrases
        .iter()
        .filter_map(|phrase| phrase_len(tokens, at, phrase))
        .max()
}

// ---------------------------------------------------------------------------
// Names
// ---------------------------------------------------------------------------

/// Lowercased words of a display name.
pub fn name_parts(name: &str) -> Vec<String> {
    tokenize(name).iter().map(|t| t.base().to_string()).collect()
}

/// Index of the first token of a name ending at `end`: the full name, or
/// just its first word.
fn name_ending_at(tokens: &[Token<'_>], end: usize, parts: &[String]) -> Option<usize> {
    let first = parts.first()?;
    let n = parts.len();
    if end + 1 >= n {
        let start = end + 1 - n;
        let full = tokens[start..=end]
            .iter()
            .zip(parts)
            .all(|(token, part)| token.base() == part);
        if full {
            return Some(start);
        }
    }
    (tokens.get(end)?.base() == first).then_some(end)
}

/// Index of the last token of a name starting at `start`.
fn name_starting_at(tokens: &[Token<'_>], start: usize, parts: &[String]) -> Option<usize> {
    let first = parts.first()?;
    let n = parts.len();
    if let Some(window) = tokens.get(start..start + n) {
        if window.iter().zip(parts).all(|(token, part)| token.base() == part) {
            return Some(start + n - 1);
        }
    }
    (tokens.get(start)?.base() == first).then_some(start)
}

/// Whether the text names a character by full name or first name.
pub fn mentions_name(tokens: &[Token<'_>], name: &str) -> bool {
    let parts = name_parts(name);
    !parts.is_empty() && (0..tokens.len()).any(|i| name_starting_at(tokens, i, &parts).is_some())
}

/// Whether the text contains the whole name as consecutive words.
pub fn mentions_phrase(tokens: &[Token<'_>], phrase: &str) -> bool {
    let parts = name_parts(phrase);
    !parts.is_empty()
        && tokens.windows(parts.len()).any(|window| {
            window
                .iter()
                .zip(&parts)
                .all(|(token, part)| token.base() == part)
        })
}

// ---------------------------------------------------------------------------
// Rule tables
// ---------------------------------------------------------------------------

/// A label that applies when any of its keywords appears.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordGroup {
    pub label: String,
    pub keywords: Vec<String>,
}

impl KeywordGroup {
    pub fn new(label: &str, keywords: &[&str]) -> Self {
        Self {
            label: label.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// Speech patterns implied by a vocabulary level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyPatterns {
    pub level: VocabularyLevel,
    pub patterns: Vec<String>,
}

/// What part of the text a [`PhraseRule`] captures around its anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capture {
    /// The word before the anchor ("grey eyes").
    WordBefore,
    /// The first word after the anchor and any connectives ("scar across his cheek").
    WordAfter,
    /// Everything after the anchor up to the end of the clause.
    ClauseAfter,
}

/// A feature phrase anchored on a keyword.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhraseRule {
    pub anchors: Vec<String>,
    pub capture: Capture,
    /// Connective words skipped between the anchor and the capture.
    #[serde(default)]
    pub connectives: Vec<String>,
}

impl PhraseRule {
    fn new(anchors: &[&str], capture: Capture, connectives: &[&str]) -> Self {
        Self {
            anchors: anchors.iter().map(|a| a.to_string()).collect(),
            capture,
            connectives: connectives.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn apply(&self, text: &str, tokens: &[Token<'_>], at: usize) -> Option<String> {
        match self.capture {
            Capture::WordBefore => {
                let before = at.checked_sub(1)?;
                (!tokens[before].clause_end).then(|| span(text, tokens, before, at))
            }
            Capture::WordAfter | Capture::ClauseAfter => {
                let mut next = at;
                loop {
                    if tokens[next].clause_end {
                        return None;
                    }
                    let candidate = tokens.get(next + 1)?;
                    next += 1;
                    if !candidate.is_any(&self.connectives) {
                        break;
                    }
                }
                let mut last = next;
                if self.capture == Capture::ClauseAfter {
                    while !tokens[last].clause_end && last + 1 < tokens.len() {
                        last += 1;
                    }
                }
                Some(span(text, tokens, at, last))
            }
        }
    }
}

/// Looks read from a physical description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualTraits {
    pub hair: Option<String>,
    pub eyes: Option<String>,
    pub skin: Option<String>,
    pub height: Option<String>,
    pub build: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemAction {
    Pickup,
    Drop,
}

/// An item changing hands in panel action text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSignal {
    pub action: ItemAction,
    /// The item word as written.
    pub item: String,
}

/// The full set of keyword tables.
///
/// Missing fields in a config file fall back to the built-in tables, so a
/// config can replace just one list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Lexicon {
    /// Checked in order; the first group with a hit wins.
    pub emotions: Vec<KeywordGroup>,
    /// Label is the voice description, keywords are personality words.
    pub voice_cues: Vec<KeywordGroup>,
    pub vocabulary_patterns: Vec<VocabularyPatterns>,
    pub traits: Vec<String>,

    pub pickup_verbs: Vec<String>,
    pub drop_verbs: Vec<String>,
    /// One of these may sit between a verb and its item.
    pub item_determiners: Vec<String>,

    /// "<name> is <verb>"
    pub injury_verbs: Vec<String>,
    /// "<name> <receive verb> (a) <wound noun>"
    pub receive_verbs: Vec<String>,
    pub wound_nouns: Vec<String>,
    /// "blood <verb> from <name>"
    pub bleeding_verbs: Vec<String>,

    /// Distinguishing-feature phrases, reported in rule order.
    pub feature_rules: Vec<PhraseRule>,
    /// Words or phrases ("average height").
    pub heights: Vec<String>,
    pub builds: Vec<String>,

    /// "<adjective> light"
    pub lighting_adjectives: Vec<String>,
    pub light_sources: Vec<String>,
    pub weather: Vec<String>,

    /// Endings allowed after a keyword ("rain" matches "rainy", "fog" matches "foggy").
    pub stem_suffixes: Vec<String>,
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

impl Default for Lexicon {
    fn default() -> Self {
        Self {
            emotions: vec![
                KeywordGroup::new("angry", &["angry", "furious", "enraged", "livid"]),
                KeywordGroup::new("sad", &["sad", "grief", "mourning", "devastated", "heartbroken"]),
                KeywordGroup::new("happy", &["happy", "joyful", "elated", "excited"]),
                KeywordGroup::new("fearful", &["afraid", "terrified", "scared", "frightened"]),
                KeywordGroup::new("determined", &["determined", "resolute", "focused"]),
                KeywordGroup::new("confused", &["confused", "bewildered", "uncertain"]),
                KeywordGroup::new("suspicious", &["suspicious", "wary", "distrustful"]),
            ],
            voice_cues: vec![
                KeywordGroup::new("soft-spoken", &["quiet"]),
                KeywordGroup::new("booming voice", &["loud"]),
                KeywordGroup::new("commanding tone", &["confident"]),
                KeywordGroup::new("hesitant speech", &["nervous"]),
            ],
            vocabulary_patterns: vec![
                VocabularyPatterns {
                    level: VocabularyLevel::Formal,
                    patterns: words(&["formal vocabulary", "complete sentences"]),
                },
                VocabularyPatterns {
                    level: VocabularyLevel::Casual,
                    patterns: words(&["contractions", "slang"]),
                },
                VocabularyPatterns {
                    level: VocabularyLevel::Archaic,
                    patterns: words(&["thee/thou", "formal archaic"]),
                },
            ],
            traits: words(&[
                "brave", "coward", "loyal", "treacherous", "kind", "cruel", "intelligent",
                "cunning", "naive", "wise", "impulsive", "calculating", "honest", "deceptive",
                "gentle", "fierce", "patient", "impatient",
            ]),
            pickup_verbs: words(&[
                "picks up", "pick up", "grabs", "grab", "takes", "take", "receives", "receive",
            ]),
            drop_verbs: words(&[
                "drops", "drop", "releases", "release", "gives", "give", "hands over",
                "hand over",
            ]),
            item_determiners: words(&["the", "a", "an", "his", "her", "their"]),
            injury_verbs: words(&["hit", "struck", "wounded", "injured", "cut", "burned"]),
            receive_verbs: words(&["receives", "receive"]),
            wound_nouns: words(&["wound", "injury", "cut", "burn"]),
            bleeding_verbs: words(&["flows", "flow", "pours", "pour"]),
            feature_rules: vec![
                PhraseRule::new(
                    &["scar", "scars"],
                    Capture::WordAfter,
                    &["on", "across", "over", "his", "her", "their"],
                ),
                PhraseRule::new(&["missing"], Capture::WordAfter, &[]),
                PhraseRule::new(&["tattoo", "tattoos"], Capture::ClauseAfter, &["of", "depicting"]),
                PhraseRule::new(
                    &["birthmark", "birthmarks"],
                    Capture::ClauseAfter,
                    &["on", "shaped", "like"],
                ),
                PhraseRule::new(&["eye", "eyes"], Capture::WordBefore, &[]),
                PhraseRule::new(&["hair"], Capture::WordBefore, &[]),
            ],
            heights: words(&["tall", "short", "average height"]),
            builds: words(&[
                "slender", "thin", "muscular", "stocky", "heavyset", "athletic", "lean",
            ]),
            lighting_adjectives: words(&[
                "dim", "bright", "harsh", "soft", "flickering", "candlelit", "moonlit", "sunlit",
                "shadowy", "dark",
            ]),
            light_sources: words(&["darkness", "shadow", "sunlight", "moonlight", "torchlight"]),
            weather: words(&[
                "rain", "snow", "storm", "fog", "mist", "wind", "sunshine", "cloudy", "overcast",
            ]),
            stem_suffixes: words(&["s", "es", "y", "ly", "ing", "ed", "ier", "iest"]),
        }
    }
}

impl Lexicon {
    /// Reject tables that could never match.
    pub fn validate(&self) -> Result<(), String> {
        for group in self.emotions.iter().chain(&self.voice_cues) {
            if group.label.trim().is_empty() {
                return Err("keyword group with an empty label".to_string());
            }
            if group.keywords.iter().any(|k| k.trim().is_empty()) {
                return Err(format!("empty keyword in group '{}'", group.label));
            }
        }
        for rule in &self.feature_rules {
            if rule.anchors.is_empty() || rule.anchors.iter().any(|a| a.trim().is_empty()) {
                return Err("feature rule without a usable anchor".to_string());
            }
        }
        let verb_lists = [&self.pickup_verbs, &self.drop_verbs];
        if verb_lists
            .iter()
            .any(|list| list.iter().any(|v| v.split_whitespace().next().is_none()))
        {
            return Err("empty item verb".to_string());
        }
        Ok(())
    }

    /// `token` is `keyword` or `keyword` plus an allowed ending. A doubled
    /// final consonant is allowed before the ending ("fog" → "foggy").
    pub fn stem_matches(&self, token: &str, keyword: &str) -> bool {
        let keyword = keyword.to_lowercase();
        if token == keyword {
            return true;
        }
        let Some(rest) = token.strip_prefix(keyword.as_str()) else {
            return false;
        };
        if self.stem_suffixes.iter().any(|s| s == rest) {
            return true;
        }
        match (keyword.chars().last(), rest.chars().next()) {
            (Some(last), Some(first)) if last == first => {
                let tail = &rest[first.len_utf8()..];
                self.stem_suffixes.iter().any(|s| s == tail)
            }
            _ => false,
        }
    }

    fn first_stem_hit(&self, tokens: &[Token<'_>], keywords: &[String]) -> Option<String> {
        tokens.iter().find_map(|token| {
            keywords
                .iter()
                .find(|kw| self.stem_matches(&token.lower, kw))
                .map(|kw| kw.to_lowercase())
        })
    }

    fn any_stem_hit(&self, tokens: &[Token<'_>], keywords: &[String]) -> bool {
        keywords
            .iter()
            .any(|kw| tokens.iter().any(|t| self.stem_matches(&t.lower, kw)))
    }

    /// The first emotion (in table order) with a keyword in the text.
    pub fn detect_emotion(&self, tokens: &[Token<'_>]) -> Option<&str> {
        self.emotions
            .iter()
            .find(|group| self.any_stem_hit(tokens, &group.keywords))
            .map(|group| group.label.as_str())
    }

    /// Pickups and drops in the order they are written.
    pub fn item_signals(&self, tokens: &[Token<'_>]) -> Vec<ItemSignal> {
        let mut signals = Vec::new();
        let mut i = 0;

        while i < tokens.len() {
            let matched = longest_phrase(tokens, i, &self.pickup_verbs)
                .map(|len| (ItemAction::Pickup, len))
                .or_else(|| {
                    longest_phrase(tokens, i, &self.drop_verbs).map(|len| (ItemAction::Drop, len))
                });
            let Some((action, len)) = matched else {
                i += 1;
                continue;
            };

            let mut at = i + len;
            if tokens[at - 1].clause_end {
                i = at;
                continue;
            }
            if tokens
                .get(at)
                .is_some_and(|t| t.is_any(&self.item_determiners) && !t.clause_end)
            {
                at += 1;
            }
            let Some(item) = tokens.get(at) else {
                break;
            };
            // "receives a wound" is an injury, not an item.
            if !item.is_any(&self.wound_nouns) {
                signals.push(ItemSignal {
                    action,
                    item: item.text.to_string(),
                });
            }
            i = at + 1;
        }

        signals
    }

    /// Injury phrases naming `name`, as written in the text.
    pub fn injuries(&self, text: &str, tokens: &[Token<'_>], name: &str) -> Vec<String> {
        let parts = name_parts(name);
        if parts.is_empty() {
            return Vec::new();
        }
        let mut found = Vec::new();

        for i in 0..tokens.len() {
            let token = &tokens[i];
            let prev_open = i > 0 && !tokens[i - 1].clause_end;

            // <name> is hit
            if prev_open && token.is("is") && !token.clause_end {
                let injured = tokens.get(i + 1).is_some_and(|t| t.is_any(&self.injury_verbs));
                if injured {
                    if let Some(start) = name_ending_at(tokens, i - 1, &parts) {
                        found.push(span(text, tokens, start, i + 1));
                    }
                }
            }

            // <name> receives a wound
            if prev_open && token.is_any(&self.receive_verbs) && !token.clause_end {
                let mut at = i + 1;
                if tokens
                    .get(at)
                    .is_some_and(|t| (t.is("a") || t.is("an")) && !t.clause_end)
                {
                    at += 1;
                }
                if tokens.get(at).is_some_and(|t| t.is_any(&self.wound_nouns)) {
                    if let Some(start) = name_ending_at(tokens, i - 1, &parts) {
                        found.push(span(text, tokens, start, at));
                    }
                }
            }

            // blood flows from <name>
            if token.is("blood") && !token.clause_end {
                let verb = tokens
                    .get(i + 1)
                    .filter(|t| t.is_any(&self.bleeding_verbs) && !t.clause_end);
                let from = tokens.get(i + 2).filter(|t| t.is("from") && !t.clause_end);
                if verb.is_some() && from.is_some() {
                    if let Some(end) = name_starting_at(tokens, i + 3, &parts) {
                        found.push(span(text, tokens, i, end));
                    }
                }
            }
        }

        found
    }

    /// Marks like scars, tattoos, eye and hair phrases.
    pub fn distinguishing_features(&self, description: &str) -> Vec<String> {
        let tokens = tokenize(description);
        let mut features = Vec::new();
        for rule in &self.feature_rules {
            for (i, token) in tokens.iter().enumerate() {
                if token.is_any(&rule.anchors) {
                    if let Some(feature) = rule.apply(description, &tokens, i) {
                        features.push(feature);
                    }
                }
            }
        }
        features
    }

    /// Hair, eyes, skin, height and build from a physical description.
    pub fn visual_traits(&self, description: &str) -> VisualTraits {
        let tokens = tokenize(description);

        let words_before = |anchors: &[&str], max: usize| -> Option<String> {
            let at = tokens
                .iter()
                .position(|t| anchors.iter().any(|a| t.is(a)))?;
            let mut from = at;
            while from > 0 && at - from < max && !tokens[from - 1].clause_end {
                from -= 1;
            }
            (from < at).then(|| span(description, &tokens, from, at - 1))
        };

        let first_phrase = |phrases: &[String]| -> Option<String> {
            (0..tokens.len()).find_map(|i| {
                longest_phrase(&tokens, i, phrases)
                    .map(|len| span(description, &tokens, i, i + len - 1))
            })
        };

        VisualTraits {
            hair: words_before(&["hair"], 2),
            eyes: words_before(&["eye", "eyes"], 1),
            skin: words_before(&["skin"], 1),
            height: first_phrase(&self.heights),
            build: first_phrase(&self.builds),
        }
    }

    /// Voice descriptions implied by a personality, then the accent.
    pub fn voice(&self, personality: &str, accent: &str) -> Vec<String> {
        let tokens = tokenize(personality);
        let mut voice: Vec<String> = self
            .voice_cues
            .iter()
            .filter(|cue| self.any_stem_hit(&tokens, &cue.keywords))
            .map(|cue| cue.label.clone())
            .collect();
        if !accent.trim().is_empty() {
            voice.push(accent.trim().to_string());
        }
        voice
    }

    /// Verbal tics, catchphrases, then vocabulary-level patterns.
    pub fn speech_patterns(&self, character: &Character) -> Vec<String> {
        let mut patterns: Vec<String> = character
            .verbal_tics
            .iter()
            .chain(&character.catchphrases)
            .cloned()
            .collect();
        if let Some(level) = character.vocabulary_level {
            if let Some(entry) = self.vocabulary_patterns.iter().find(|v| v.level == level) {
                patterns.extend(entry.patterns.iter().cloned());
            }
        }
        patterns
    }

    /// Trait words found in a personality, in table order.
    pub fn traits(&self, personality: &str) -> Vec<String> {
        let tokens = tokenize(personality);
        self.traits
            .iter()
            .filter(|word| tokens.iter().any(|t| self.stem_matches(&t.lower, word)))
            .cloned()
            .collect()
    }

    /// "<adjective> light" first, otherwise the first light source word.
    pub fn lighting(&self, description: &str) -> Option<String> {
        let tokens = tokenize(description);
        tokens
            .windows(2)
            .find(|pair| {
                !pair[0].clause_end && pair[1].is("light") && pair[0].is_any(&self.lighting_adjectives)
            })
            .map(|pair| pair[0].lower.clone())
            .or_else(|| self.first_stem_hit(&tokens, &self.light_sources))
    }

    /// The first weather word in the text.
    pub fn weather(&self, description: &str) -> Option<String> {
        let tokens = tokenize(description);
        self.first_stem_hit(&tokens, &self.weather)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lexicon() -> Lexicon {
        Lexicon::default()
    }

    #[test]
    fn test_tokenize_spans_and_clauses() {
        let text = "Kael's blade, silver-streaked.";
        let tokens = tokenize(text);
        let words: Vec<_> = tokens.iter().map(|t| t.text).collect();
        assert_eq!(words, vec!["Kael's", "blade", "silver-streaked"]);
        assert_eq!(tokens[0].base(), "kael");
        assert!(tokens[1].clause_end);
        assert!(tokens[2].clause_end);
        assert_eq!(&text[tokens[2].start..tokens[2].end], "silver-streaked");
    }

    #[test]
    fn test_emotion_order_and_words() {
        let lex = lexicon();
        let detect = |text: &str| lex.detect_emotion(&tokenize(text)).map(str::to_string);

        assert_eq!(detect("Kael is furious at the betrayal").as_deref(), Some("angry"));
        // "angry" is checked before "sad".
        assert_eq!(detect("Heartbroken and livid").as_deref(), Some("angry"));
        assert_eq!(detect("She is wary of him").as_deref(), Some("suspicious"));
        // Whole words only.
        assert_eq!(detect("The crusade begins").as_deref(), None);
    }

    #[test]
    fn test_item_signals_in_text_order() {
        let lex = lexicon();
        let signals = lex.item_signals(&tokenize("Kael drops the torch and picks up the amulet"));
        assert_eq!(
            signals,
            vec![
                ItemSignal {
                    action: ItemAction::Drop,
                    item: "torch".into()
                },
                ItemSignal {
                    action: ItemAction::Pickup,
                    item: "amulet".into()
                },
            ]
        );

        let handed = lex.item_signals(&tokenize("Lyria hands over the Journal."));
        assert_eq!(handed[0].action, ItemAction::Drop);
        assert_eq!(handed[0].item, "Journal");

        // Wounds are not items.
        assert!(lex.item_signals(&tokenize("Kael receives a wound")).is_empty());
    }

    #[test]
    fn test_injury_phrases() {
        let lex = lexicon();
        let text = "Kael is struck by the blade. Blood flows from Lyria while Mira receives a burn";
        let tokens = tokenize(text);

        assert_eq!(lex.injuries(text, &tokens, "Kael"), vec!["Kael is struck"]);
        assert_eq!(lex.injuries(text, &tokens, "Lyria Vane"), vec!["Blood flows from Lyria"]);
        assert_eq!(lex.injuries(text, &tokens, "Mira"), vec!["Mira receives a burn"]);
        assert!(lex.injuries(text, &tokens, "Valdris").is_empty());
    }

    #[test]
    fn test_injury_with_full_name() {
        let lex = lexicon();
        let text = "Kael Thornwood is wounded";
        let tokens = tokenize(text);
        assert_eq!(
            lex.injuries(text, &tokens, "Kael Thornwood"),
            vec!["Kael Thornwood is wounded"]
        );
    }

    #[test]
    fn test_distinguishing_features() {
        let lex = lexicon();
        let features = lex.distinguishing_features(
            "Tall with a scar across his cheek, a tattoo of a coiled serpent, grey eyes and dark hair",
        );
        assert_eq!(
            features,
            vec![
                "scar across his cheek",
                "tattoo of a coiled serpent",
                "grey eyes",
                "dark hair",
            ]
        );
    }

    #[test]
    fn test_visual_traits() {
        let lex = lexicon();
        let traits =
            lex.visual_traits("Tall and lean with silver-streaked dark hair, grey eyes and pale skin");
        assert_eq!(traits.hair.as_deref(), Some("silver-streaked dark"));
        assert_eq!(traits.eyes.as_deref(), Some("grey"));
        assert_eq!(traits.skin.as_deref(), Some("pale"));
        assert_eq!(traits.height.as_deref(), Some("Tall"));
        assert_eq!(traits.build.as_deref(), Some("lean"));

        let average = lex.visual_traits("Of average height, stocky");
        assert_eq!(average.height.as_deref(), Some("average height"));
        assert_eq!(average.build.as_deref(), Some("stocky"));
        assert!(average.hair.is_none());
    }

    #[test]
    fn test_voice_traits_and_speech() {
        let lex = lexicon();
        assert_eq!(
            lex.voice("Quiet but confident", "northern lilt"),
            vec!["soft-spoken", "commanding tone", "northern lilt"]
        );
        // "impatient" does not count as "patient".
        assert_eq!(lex.traits("Brave, impatient and cunning"), vec!["brave", "cunning", "impatient"]);

        let mut kael = Character::new("Kael").with_vocabulary(VocabularyLevel::Archaic);
        kael.verbal_tics = vec!["Hm.".into()];
        assert_eq!(
            lex.speech_patterns(&kael),
            vec!["Hm.", "thee/thou", "formal archaic"]
        );
    }

    #[test]
    fn test_lighting_and_weather() {
        let lex = lexicon();
        assert_eq!(
            lex.lighting("Torches cast a flickering light over the shadows").as_deref(),
            Some("flickering")
        );
        assert_eq!(lex.lighting("Deep shadows fill the hall").as_deref(), Some("shadow"));
        assert_eq!(lex.lighting("A plain room"), None);

        assert_eq!(lex.weather("Rainy streets under a stormy sky").as_deref(), Some("rain"));
        assert_eq!(lex.weather("Foggy harbour").as_deref(), Some("fog"));
        // "window" is not "wind".
        assert_eq!(lex.weather("Light through the window"), None);
    }

    #[test]
    fn test_name_mentions() {
        let tokens = tokenize("Kael's anger at Lyria grows");
        assert!(mentions_name(&tokens, "Kael Thornwood"));
        assert!(mentions_name(&tokens, "Lyria"));
        assert!(!mentions_name(&tokens, "Mira"));

        let summary = tokenize("The Resonance Bells ring");
        assert!(mentions_phrase(&summary, "Resonance Bells"));
        assert!(!mentions_phrase(&summary, "Resonance Crown"));
    }

    #[test]
    fn test_partial_table_from_toml() {
        let lex: Lexicon = toml::from_str(r#"weather = ["hail"]"#).unwrap();
        assert_eq!(lex.weather("Hail hammers the roof").as_deref(), Some("hail"));
        assert_eq!(lex.emotions, Lexicon::default().emotions);
        assert!(lex.validate().is_ok());
    }
}
