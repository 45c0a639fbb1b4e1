//! Translation cleanup.
//!
//! Some scraped lines carried several entries on one line, so a translation
//! such as `收入; revenue n. 收益` swallowed the next word. The repair keeps the
//! text before the first embedded `word pos.` marker and splits every marker
//! out into its own entry.

use std::sync::LazyLock;

use regex::Regex;
use vocabot_core::error::Result;
use vocabot_core::traits::VocabStore;
use vocabot_core::types::{NewWord, TranslationRepair};

static EMBEDDED_ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([a-zA-Z- ]+)\s*(adj|v|n|a\.|adv)\.\s*").expect("static regex")
});

fn trim_separators(s: &str) -> &str {
    s.trim_matches(|c| c == ';' || c == ' ')
}

/// Plan the repair of one translation, `None` when it has no embedded entry.
pub fn plan_repair(id: i64, translation: &str) -> Option<TranslationRepair> {
    let matches: Vec<_> = EMBEDDED_ENTRY.captures_iter(translation).collect();
    let first = matches.first()?.get(0)?;

    let split_off = matches
        .iter()
        .enumerate()
        .filter_map(|(i, caps)| {
            let whole = caps.get(0)?;
            let term = caps.get(1)?.as_str().trim();
            if term.is_empty() {
                return None;
            }
            let end = matches
                .get(i + 1)
                .and_then(|next| next.get(0))
                .map_or(translation.len(), |m| m.start());
            Some(NewWord {
                term: term.to_string(),
                part_of_speech: None,
                translation: trim_separators(&translation[whole.end()..end]).to_string(),
            })
        })
        .collect();

    Some(TranslationRepair {
        id,
        fixed_translation: trim_separators(&translation[..first.start()]).to_string(),
        split_off,
    })
}

/// Plan repairs for `(id, term, translation)` rows.
pub fn plan_repairs(rows: &[(i64, String, String)]) -> Vec<TranslationRepair> {
    rows.iter()
        .filter_map(|(id, term, translation)| {
            let repair = plan_repair(*id, translation)?;
            tracing::info!("🔧 {term}: '{translation}' → '{}'", repair.fixed_translation);
            for word in &repair.split_off {
                tracing::info!("   ➕ {} => {}", word.term, word.translation);
            }
            Some(repair)
        })
        .collect()
}

/// Scan every translation and apply the repairs in one transaction.
/// With `dry_run` nothing is written. Returns `(updated, inserted)`.
pub fn repair_translations<S: VocabStore>(store: &S, dry_run: bool) -> Result<(usize, usize)> {
    let rows = store.all_translations()?;
    let repairs = plan_repairs(&rows);
    let splits: usize = repairs.iter().map(|r| r.split_off.len()).sum();

    if repairs.is_empty() {
        tracing::info!("✅ Scanned {} translations, nothing to repair", rows.len());
        return Ok((0, 0));
    }
    if dry_run {
        tracing::info!(
            "📋 Dry run: {} translations would be fixed, {} entries split off",
            repairs.len(),
            splits
        );
        return Ok((0, 0));
    }

    let (updated, inserted) = store.apply_repairs(&repairs)?;
    tracing::info!(
        "✅ Fixed {updated} translations, inserted {inserted}/{splits} split-off entries"
    );
    Ok((updated, inserted))
}
