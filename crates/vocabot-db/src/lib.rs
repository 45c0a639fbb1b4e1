//! # Vocabot DB
//!
//! SQLite-backed vocabulary store. One table, `business_vocab`, keyed by an
//! autoincrement id. State transitions are written per batch in a single
//! transaction; example backfill is written per row.

pub mod sqlite;

pub use sqlite::{SqliteVocabStore, StoreStats};
