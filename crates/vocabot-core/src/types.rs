//! Vocabulary data model.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Placeholder stored in `example_sentence` until enrichment fills it.
pub const EMPTY_SENTENCE_MARKER: &str = "暂无例句";

/// Stored in `example_chinese` when an example was found but had no translation.
pub const EMPTY_TRANSLATION_MARKER: &str = "暂无中文翻译";

/// One vocabulary item as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VocabEntry {
    pub id: i64,
    pub term: String,
    pub part_of_speech: Option<String>,
    pub translation: String,
    pub example_sentence: Option<String>,
    pub example_translation: Option<String>,
    pub learned: bool,
    pub needs_review: bool,
    pub learn_date: Option<NaiveDate>,
    pub review_count: u32,
    pub last_review_date: Option<NaiveDate>,
}

impl VocabEntry {
    /// A freshly scraped, unlearned entry.
    pub fn new(id: i64, term: &str, part_of_speech: Option<&str>, translation: &str) -> Self {
        Self {
            id,
            term: term.to_string(),
            part_of_speech: part_of_speech.map(String::from),
            translation: translation.to_string(),
            example_sentence: Some(EMPTY_SENTENCE_MARKER.to_string()),
            example_translation: None,
            learned: false,
            needs_review: false,
            learn_date: None,
            review_count: 0,
            last_review_date: None,
        }
    }

    /// The example sentence, unless it is missing or still the placeholder.
    pub fn example(&self) -> Option<&str> {
        self.example_sentence
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty() && *s != EMPTY_SENTENCE_MARKER)
    }

    /// The example translation, unless it is missing or the missing-translation marker.
    pub fn example_translation(&self) -> Option<&str> {
        self.example_translation
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty() && *s != EMPTY_TRANSLATION_MARKER)
    }

    /// Selection weight for spaced review: `1 / (1 + review_count)^1.5`.
    pub fn review_weight(&self) -> f64 {
        1.0 / (1.0 + f64::from(self.review_count)).powf(1.5)
    }

    /// Whether the lifecycle invariants hold for this row.
    pub fn is_consistent(&self) -> bool {
        let unlearned_ok =
            self.learned || (self.review_count == 0 && self.last_review_date.is_none());
        let review_ok = !self.needs_review || self.learned;
        unlearned_ok && review_ok
    }
}

/// A word parsed from a source list, before it has an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewWord {
    pub term: String,
    pub part_of_speech: Option<String>,
    pub translation: String,
}

/// A row still waiting for an example sentence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingExample {
    pub id: i64,
    pub term: String,
}

/// Example sentence and its translation as returned by the sentence service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExamplePair {
    pub sentence: String,
    pub translation: String,
}

impl ExamplePair {
    pub fn has_translation(&self) -> bool {
        self.translation != EMPTY_TRANSLATION_MARKER
    }
}

/// A translation that swallowed neighbouring entries, split back apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRepair {
    pub id: i64,
    pub fixed_translation: String,
    pub split_off: Vec<NewWord>,
}
