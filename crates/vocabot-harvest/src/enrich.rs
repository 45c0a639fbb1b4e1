//! Example sentence backfill.
//!
//! Walks every row whose example is still the placeholder, asks the sentence
//! source for an example, and writes it back one row at a time. A failure on
//! one row is logged and does not stop the pass. Rows filled in the meantime
//! are left alone, so running the pass twice is harmless.

use std::time::Duration;

use vocabot_core::error::Result;
use vocabot_core::traits::{SentenceSource, VocabStore};

/// What one enrichment pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichReport {
    pub pending: usize,
    /// Example and translation both found.
    pub complete: usize,
    /// Example found, translation missing.
    pub example_only: usize,
    pub not_found: usize,
    pub failed: usize,
    /// Another writer filled the row first.
    pub already_filled: usize,
}

impl EnrichReport {
    pub fn updated(&self) -> usize {
        self.complete + self.example_only
    }
}

/// Run one backfill pass. `delay` is slept before every lookup.
/// Only a failure to list pending rows is returned as an error.
pub async fn enrich_examples<S, L>(store: &S, source: &L, delay: Duration) -> Result<EnrichReport>
where
    S: VocabStore,
    L: SentenceSource,
{
    let pending = store.pending_examples()?;
    let mut report = EnrichReport {
        pending: pending.len(),
        ..EnrichReport::default()
    };
    if pending.is_empty() {
        tracing::info!("🎉 Every word already has an example sentence");
        return Ok(report);
    }
    tracing::info!("📋 {} words waiting for an example sentence", pending.len());

    for row in &pending {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let pair = match source.lookup(&row.term).await {
            Ok(Some(pair)) => pair,
            Ok(None) => {
                tracing::info!("❌ [{}] #{} no example found", row.term, row.id);
                report.not_found += 1;
                continue;
            }
            Err(e) => {
                tracing::warn!(
                    "⚠️ [{}] #{} {} lookup failed: {e}",
                    row.term,
                    row.id,
                    source.name()
                );
                report.failed += 1;
                continue;
            }
        };

        match store.fill_example(row.id, &pair) {
            Ok(true) if pair.has_translation() => {
                tracing::info!("✅ [{}] #{} {}", row.term, row.id, preview(&pair.sentence));
                report.complete += 1;
            }
            Ok(true) => {
                tracing::info!(
                    "ℹ️ [{}] #{} example without translation: {}",
                    row.term,
                    row.id,
                    preview(&pair.sentence)
                );
                report.example_only += 1;
            }
            Ok(false) => {
                tracing::debug!("[{}] #{} already filled, left unchanged", row.term, row.id);
                report.already_filled += 1;
            }
            Err(e) => {
                tracing::warn!("⚠️ [{}] #{} update rolled back: {e}", row.term, row.id);
                report.failed += 1;
            }
        }
    }

    tracing::info!(
        "📊 Updated {}/{} words ({} complete, {} example only, {} not found, {} failed)",
        report.updated(),
        report.pending,
        report.complete,
        report.example_only,
        report.not_found,
        report.failed
    );
    Ok(report)
}

fn preview(sentence: &str) -> String {
    if sentence.chars().count() > 30 {
        format!("{}...", sentence.chars().take(30).collect::<String>())
    } else {
        sentence.to_string()
    }
}
