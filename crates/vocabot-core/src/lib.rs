//! # Vocabot Core
//!
//! Shared building blocks for every Vocabot crate: configuration, the error
//! type, the vocabulary data model and the traits that sit between the jobs
//! and their external collaborators (store, webhook, sentence service).

pub mod config;
pub mod error;
pub mod traits;
pub mod types;

pub use config::VocabotConfig;
pub use error::{Result, VocabotError};
pub use traits::{Notifier, SentenceSource, VocabStore};
pub use types::{
    EMPTY_SENTENCE_MARKER, EMPTY_TRANSLATION_MARKER, ExamplePair, NewWord, PendingExample,
    TranslationRepair, VocabEntry,
};
