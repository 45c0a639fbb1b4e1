//! SQLite implementation of [`VocabStore`].

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::NaiveDate;
use rusqlite::types::Value;
use rusqlite::{Connection, Row, params, params_from_iter};

use vocabot_core::config::StoreConfig;
use vocabot_core::error::{Result, VocabotError};
use vocabot_core::traits::VocabStore;
use vocabot_core::types::{
    EMPTY_SENTENCE_MARKER, ExamplePair, NewWord, PendingExample, TranslationRepair, VocabEntry,
};

const DATE_FORMAT: &str = "%Y-%m-%d";

const ENTRY_COLUMNS: &str = "id, term, part_of_speech, translation, example_sentence, \
     example_chinese, learned, needs_review, learn_date, review_count, last_review_date";

/// Row counts for a quick status line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub total: usize,
    pub learned: usize,
    pub due_for_review: usize,
    pub missing_example: usize,
}

/// Vocabulary store over a single SQLite connection.
#[derive(Debug)]
pub struct SqliteVocabStore {
    conn: Mutex<Connection>,
}

impl SqliteVocabStore {
    /// Open the store described by the config, creating the file and schema if needed.
    pub fn open_with(config: &StoreConfig) -> Result<Self> {
        let path = config.sqlite_path();
        tracing::debug!("📦 Opening store {} at {}", config.describe(), path.display());
        if !config.charset.to_ascii_lowercase().starts_with("utf8") {
            tracing::warn!("⚠️ Charset '{}' not supported, using UTF-8", config.charset);
        }
        Self::open(&path)
    }

    /// Open or create the store at a path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                VocabotError::Store(format!("DB dir {}: {e}", parent.display()))
            })?;
        }
        let conn = Connection::open(path)
            .map_err(|e| VocabotError::Store(format!("DB open {}: {e}", path.display())))?;
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(|e| VocabotError::Store(format!("DB busy timeout: {e}")))?;
        Self::from_connection(conn)
    }

    /// In-memory store, used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| VocabotError::Store(format!("DB open: {e}")))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(&format!(
            "
            PRAGMA encoding = 'UTF-8';

            CREATE TABLE IF NOT EXISTS business_vocab (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                term TEXT NOT NULL,
                part_of_speech TEXT NOT NULL DEFAULT '',   -- '' means no tag
                translation TEXT NOT NULL DEFAULT '',
                example_sentence TEXT NOT NULL DEFAULT '{EMPTY_SENTENCE_MARKER}',
                example_chinese TEXT NOT NULL DEFAULT '',
                learned INTEGER NOT NULL DEFAULT 0,
                needs_review INTEGER NOT NULL DEFAULT 0,
                learn_date TEXT,                           -- YYYY-MM-DD
                review_count INTEGER NOT NULL DEFAULT 0,
                last_review_date TEXT,                     -- YYYY-MM-DD
                UNIQUE (term, part_of_speech)
            );

            CREATE INDEX IF NOT EXISTS idx_business_vocab_state
                ON business_vocab (learned, needs_review);
            "
        ))
        .map_err(|e| VocabotError::Store(format!("Migration: {e}")))?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| VocabotError::Store(format!("Connection poisoned: {e}")))
    }

    /// Fetch a single row by id.
    pub fn get(&self, id: i64) -> Result<Option<VocabEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(&format!("SELECT {ENTRY_COLUMNS} FROM business_vocab WHERE id = ?1"))
            .map_err(|e| VocabotError::Store(format!("Get: {e}")))?;
        let mut rows = stmt
            .query_map(params![id], row_to_entry)
            .map_err(|e| VocabotError::Store(format!("Get: {e}")))?;
        rows.next()
            .transpose()
            .map_err(|e| VocabotError::Store(format!("Get: {e}")))
    }

    /// Look up the id of a term (first match by id order).
    pub fn id_of(&self, term: &str) -> Result<Option<i64>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT id FROM business_vocab WHERE term = ?1 ORDER BY id LIMIT 1")
            .map_err(|e| VocabotError::Store(format!("Id lookup: {e}")))?;
        let mut rows = stmt
            .query_map(params![term], |row| row.get::<_, i64>(0))
            .map_err(|e| VocabotError::Store(format!("Id lookup: {e}")))?;
        rows.next()
            .transpose()
            .map_err(|e| VocabotError::Store(format!("Id lookup: {e}")))
    }

    pub fn stats(&self) -> Result<StoreStats> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(learned), 0),
                    COALESCE(SUM(learned = 1 AND needs_review = 1), 0),
                    COALESCE(SUM(example_sentence = ?1), 0)
             FROM business_vocab",
            params![EMPTY_SENTENCE_MARKER],
            |row| {
                Ok(StoreStats {
                    total: row.get::<_, i64>(0)? as usize,
                    learned: row.get::<_, i64>(1)? as usize,
                    due_for_review: row.get::<_, i64>(2)? as usize,
                    missing_example: row.get::<_, i64>(3)? as usize,
                })
            },
        )
        .map_err(|e| VocabotError::Store(format!("Stats: {e}")))
    }

    fn query_entries(&self, sql: &str, args: &[Value]) -> Result<Vec<VocabEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| VocabotError::Store(format!("Query: {e}")))?;
        let rows = stmt
            .query_map(params_from_iter(args.iter()), row_to_entry)
            .map_err(|e| VocabotError::Store(format!("Query: {e}")))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| VocabotError::Store(format!("Query: {e}")))
    }

    /// `UPDATE business_vocab SET <assignments> WHERE id IN (...)` in one transaction.
    fn update_batch(&self, assignments: &str, today: NaiveDate, ids: &[i64]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let placeholders = (0..ids.len())
            .map(|i| format!("?{}", i + 2))
            .collect::<Vec<_>>()
            .join(",");
        let sql = format!("UPDATE business_vocab SET {assignments} WHERE id IN ({placeholders})");

        let mut args = Vec::with_capacity(ids.len() + 1);
        args.push(Value::Text(today.format(DATE_FORMAT).to_string()));
        args.extend(ids.iter().map(|id| Value::Integer(*id)));

        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| VocabotError::Store(format!("Begin: {e}")))?;
        let changed = tx
            .execute(&sql, params_from_iter(args.iter()))
            .map_err(|e| VocabotError::Store(format!("Batch update: {e}")))?;
        tx.commit()
            .map_err(|e| VocabotError::Store(format!("Commit: {e}")))?;
        Ok(changed)
    }
}

impl VocabStore for SqliteVocabStore {
    fn fetch_unlearned(&self, limit: usize) -> Result<Vec<VocabEntry>> {
        self.query_entries(
            &format!(
                "SELECT {ENTRY_COLUMNS} FROM business_vocab \
                 WHERE learned = 0 ORDER BY RANDOM() LIMIT ?1"
            ),
            &[Value::Integer(limit as i64)],
        )
    }

    fn fetch_review_candidates(&self) -> Result<Vec<VocabEntry>> {
        self.query_entries(
            &format!(
                "SELECT {ENTRY_COLUMNS} FROM business_vocab \
                 WHERE learned = 1 AND needs_review = 1 ORDER BY id"
            ),
            &[],
        )
    }

    fn mark_learned(&self, ids: &[i64], today: NaiveDate) -> Result<usize> {
        let changed =
            self.update_batch("learned = 1, needs_review = 1, learn_date = ?1", today, ids)?;
        tracing::debug!("💾 Marked {changed} words learned");
        Ok(changed)
    }

    fn mark_reviewed(&self, ids: &[i64], today: NaiveDate) -> Result<usize> {
        let changed = self.update_batch(
            "review_count = review_count + 1, last_review_date = ?1",
            today,
            ids,
        )?;
        tracing::debug!("💾 Marked {changed} words reviewed");
        Ok(changed)
    }

    fn insert_if_absent(&self, words: &[NewWord]) -> Result<usize> {
        if words.is_empty() {
            return Ok(0);
        }
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| VocabotError::Store(format!("Begin: {e}")))?;
        let mut inserted = 0;
        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR IGNORE INTO business_vocab
                     (term, part_of_speech, translation, example_sentence, example_chinese,
                      learned, needs_review, learn_date, review_count, last_review_date)
                     VALUES (?1, ?2, ?3, ?4, '', 0, 0, NULL, 0, NULL)",
                )
                .map_err(|e| VocabotError::Store(format!("Insert: {e}")))?;
            for word in words {
                inserted += stmt
                    .execute(params![
                        word.term,
                        word.part_of_speech.as_deref().unwrap_or(""),
                        word.translation,
                        EMPTY_SENTENCE_MARKER,
                    ])
                    .map_err(|e| VocabotError::Store(format!("Insert '{}': {e}", word.term)))?;
            }
        }
        tx.commit()
            .map_err(|e| VocabotError::Store(format!("Commit: {e}")))?;
        Ok(inserted)
    }

    fn pending_examples(&self) -> Result<Vec<PendingExample>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, term FROM business_vocab WHERE example_sentence = ?1 ORDER BY id ASC",
            )
            .map_err(|e| VocabotError::Store(format!("Pending examples: {e}")))?;
        let rows = stmt
            .query_map(params![EMPTY_SENTENCE_MARKER], |row| {
                Ok(PendingExample {
                    id: row.get(0)?,
                    term: row.get(1)?,
                })
            })
            .map_err(|e| VocabotError::Store(format!("Pending examples: {e}")))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| VocabotError::Store(format!("Pending examples: {e}")))
    }

    fn fill_example(&self, id: i64, example: &ExamplePair) -> Result<bool> {
        let mut conn = self.lock()?;
        // Dropping an uncommitted transaction rolls this row back on its own.
        let tx = conn
            .transaction()
            .map_err(|e| VocabotError::Store(format!("Begin: {e}")))?;
        let changed = tx
            .execute(
                "UPDATE business_vocab
                 SET example_sentence = ?1, example_chinese = ?2
                 WHERE id = ?3 AND example_sentence = ?4",
                params![example.sentence, example.translation, id, EMPTY_SENTENCE_MARKER],
            )
            .map_err(|e| VocabotError::Store(format!("Fill example #{id}: {e}")))?;
        tx.commit()
            .map_err(|e| VocabotError::Store(format!("Commit #{id}: {e}")))?;
        Ok(changed > 0)
    }

    fn all_translations(&self) -> Result<Vec<(i64, String, String)>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT id, term, translation FROM business_vocab ORDER BY id")
            .map_err(|e| VocabotError::Store(format!("Translations: {e}")))?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
            .map_err(|e| VocabotError::Store(format!("Translations: {e}")))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| VocabotError::Store(format!("Translations: {e}")))
    }

    fn apply_repairs(&self, repairs: &[TranslationRepair]) -> Result<(usize, usize)> {
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| VocabotError::Store(format!("Begin: {e}")))?;
        let (mut updated, mut inserted) = (0, 0);
        for repair in repairs {
            updated += tx
                .execute(
                    "UPDATE business_vocab SET translation = ?1 WHERE id = ?2",
                    params![repair.fixed_translation, repair.id],
                )
                .map_err(|e| VocabotError::Store(format!("Repair #{}: {e}", repair.id)))?;
            for word in &repair.split_off {
                inserted += tx
                    .execute(
                        "INSERT OR IGNORE INTO business_vocab \
                         (term, part_of_speech, translation, example_sentence) \
                         VALUES (?1, ?2, ?3, ?4)",
                        params![
                            word.term,
                            word.part_of_speech.as_deref().unwrap_or(""),
                            word.translation,
                            EMPTY_SENTENCE_MARKER,
                        ],
                    )
                    .map_err(|e| VocabotError::Store(format!("Split '{}': {e}", word.term)))?;
            }
        }
        tx.commit()
            .map_err(|e| VocabotError::Store(format!("Commit: {e}")))?;
        Ok((updated, inserted))
    }
}

fn parse_date(value: Option<String>) -> Option<NaiveDate> {
    let raw = value?;
    match NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT) {
        Ok(d) => Some(d),
        Err(_) => {
            tracing::warn!("⚠️ Unreadable date '{raw}' in store, treating as empty");
            None
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() { None } else { Some(value) }
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<VocabEntry> {
    let pos: String = row.get(2)?;
    let example_sentence: String = row.get(4)?;
    let example_chinese: String = row.get(5)?;
    let review_count: i64 = row.get(9)?;
    Ok(VocabEntry {
        id: row.get(0)?,
        term: row.get(1)?,
        part_of_speech: non_empty(pos),
        translation: row.get(3)?,
        example_sentence: non_empty(example_sentence),
        example_translation: non_empty(example_chinese),
        learned: row.get::<_, i64>(6)? != 0,
        needs_review: row.get::<_, i64>(7)? != 0,
        learn_date: parse_date(row.get(8)?),
        review_count: u32::try_from(review_count.max(0)).unwrap_or(u32::MAX),
        last_review_date: parse_date(row.get(10)?),
    })
}
