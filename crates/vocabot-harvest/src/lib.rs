//! # Vocabot Harvest
//!
//! Getting words and examples into the store:
//! - `scrape`: import a static HTML word list
//! - `tatoeba` + `enrich`: backfill example sentences from Tatoeba
//! - `repair`: split translations that swallowed neighbouring entries

pub mod enrich;
pub mod repair;
pub mod scrape;
pub mod tatoeba;

pub use enrich::{EnrichReport, enrich_examples};
pub use repair::{plan_repairs, repair_translations};
pub use scrape::{ScrapeReport, WordListScraper};
pub use tatoeba::TatoebaClient;
