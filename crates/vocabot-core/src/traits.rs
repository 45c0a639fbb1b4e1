//! Seams between the jobs and their collaborators.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::Result;
use crate::types::{ExamplePair, NewWord, PendingExample, TranslationRepair, VocabEntry};

/// CRUD against the vocabulary table. All keys are row ids, never terms.
pub trait VocabStore {
    /// Up to `limit` random rows with `learned = false`.
    fn fetch_unlearned(&self, limit: usize) -> Result<Vec<VocabEntry>>;

    /// Every row with `learned = true AND needs_review = true`.
    fn fetch_review_candidates(&self) -> Result<Vec<VocabEntry>>;

    /// Set `learned`, `needs_review` and `learn_date` for the batch in one transaction.
    fn mark_learned(&self, ids: &[i64], today: NaiveDate) -> Result<usize>;

    /// Bump `review_count` and set `last_review_date` for the batch in one transaction.
    fn mark_reviewed(&self, ids: &[i64], today: NaiveDate) -> Result<usize>;

    /// Insert words, silently skipping ones that already exist. Returns rows inserted.
    fn insert_if_absent(&self, words: &[NewWord]) -> Result<usize>;

    /// Rows whose example sentence is still the placeholder, by ascending id.
    fn pending_examples(&self) -> Result<Vec<PendingExample>>;

    /// Fill one row's example, only if it still holds the placeholder.
    /// Returns false when the row was already filled.
    fn fill_example(&self, id: i64, example: &ExamplePair) -> Result<bool>;

    /// `(id, term, translation)` for every row.
    fn all_translations(&self) -> Result<Vec<(i64, String, String)>>;

    /// Apply translation repairs in one transaction. Returns `(updated, inserted)`.
    fn apply_repairs(&self, repairs: &[TranslationRepair]) -> Result<(usize, usize)>;
}

/// Outbound chat channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    /// Deliver a message payload. `Ok` only when the channel confirmed receipt.
    async fn deliver(&self, payload: &serde_json::Value) -> Result<()>;
}

/// External example-sentence lookup.
#[async_trait]
pub trait SentenceSource: Send + Sync {
    fn name(&self) -> &str;

    /// `Ok(None)` means the service answered but had no usable example.
    async fn lookup(&self, word: &str) -> Result<Option<ExamplePair>>;
}
