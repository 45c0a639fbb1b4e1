//! Vocabot configuration system.
//!
//! Built once at process start: TOML file (optional) first, then environment
//! overrides, then validation. Components receive `&VocabotConfig` and never
//! read the environment themselves.

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, VocabotError};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VocabotConfig {
    /// Fixed local offset used for every date/time decision.
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,
    /// Exact-match `YYYY-MM-DD` dates on which the learn job does not run.
    #[serde(default = "default_holidays")]
    pub holidays: Vec<String>,
    /// Tick interval of the `watch` loop.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Log file for commands that are not one of the two jobs.
    #[serde(default = "default_log_file")]
    pub log_file: String,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub learn: LearnConfig,
    #[serde(default)]
    pub review: ReviewConfig,
    #[serde(default)]
    pub enrich: EnrichConfig,
    #[serde(default)]
    pub scrape: ScrapeConfig,
}

fn default_utc_offset_hours() -> i32 { 8 }
fn default_holidays() -> Vec<String> {
    (1..=8).map(|d| format!("2025-10-{d:02}")).collect()
}
fn default_poll_interval_secs() -> u64 { 30 }
fn default_log_file() -> String { "vocabot.log".into() }
fn default_timeout_secs() -> u64 { 10 }
fn default_delay_ms() -> u64 { 1000 }

impl Default for VocabotConfig {
    fn default() -> Self {
        Self {
            utc_offset_hours: default_utc_offset_hours(),
            holidays: default_holidays(),
            poll_interval_secs: default_poll_interval_secs(),
            log_file: default_log_file(),
            store: StoreConfig::default(),
            webhook: WebhookConfig::default(),
            learn: LearnConfig::default(),
            review: ReviewConfig::default(),
            enrich: EnrichConfig::default(),
            scrape: ScrapeConfig::default(),
        }
    }
}

impl VocabotConfig {
    /// Load config from the default path (~/.vocabot/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| VocabotError::Config(format!("Failed to read config: {e}")))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| VocabotError::Config(format!("Failed to parse config: {e}")))
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the Vocabot home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".vocabot")
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Apply overrides from any key lookup. Unparseable numbers are ignored with a warning.
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("DB_HOST") { self.store.host = v; }
        if let Some(v) = get("DB_PORT") {
            match v.trim().parse() {
                Ok(port) => self.store.port = port,
                Err(_) => tracing::warn!("⚠️ Ignoring invalid DB_PORT '{v}'"),
            }
        }
        if let Some(v) = get("DB_USER") { self.store.user = v; }
        if let Some(v) = lookup("DB_PASSWORD") { self.store.password = v; }
        if let Some(v) = get("DB_NAME") { self.store.database = v; }
        if let Some(v) = get("DB_CHARSET") { self.store.charset = v; }
        if let Some(v) = get("VOCABOT_DB_PATH") { self.store.path = Some(v); }

        if let Some(v) = get("VOCABOT_WEBHOOK_URL").or_else(|| get("FEISHU_WEBHOOK")) {
            self.webhook.url = v;
        }
        if let Some(v) = get("VOCABOT_UTC_OFFSET_HOURS") {
            match v.trim().parse() {
                Ok(h) => self.utc_offset_hours = h,
                Err(_) => tracing::warn!("⚠️ Ignoring invalid VOCABOT_UTC_OFFSET_HOURS '{v}'"),
            }
        }
        if let Some(v) = get("VOCABOT_HOLIDAYS") {
            self.holidays = v
                .split(',')
                .map(|d| d.trim().to_string())
                .filter(|d| !d.is_empty())
                .collect();
        }
    }

    /// Reject values the jobs cannot work with.
    pub fn validate(&self) -> Result<()> {
        if !(-23..=23).contains(&self.utc_offset_hours) {
            return Err(VocabotError::Config(format!(
                "utc_offset_hours must be within ±23, got {}",
                self.utc_offset_hours
            )));
        }
        if self.learn.batch_size == 0 || self.review.batch_size == 0 {
            return Err(VocabotError::Config("batch_size must be positive".into()));
        }
        if self.poll_interval_secs == 0 {
            return Err(VocabotError::Config("poll_interval_secs must be positive".into()));
        }
        for day in &self.holidays {
            if NaiveDate::parse_from_str(day, "%Y-%m-%d").is_err() {
                return Err(VocabotError::Config(format!(
                    "holiday '{day}' is not a YYYY-MM-DD date"
                )));
            }
        }
        Ok(())
    }

    /// The webhook URL, or a config error when it is not set.
    pub fn require_webhook(&self) -> Result<&str> {
        let url = self.webhook.url.trim();
        if url.is_empty() {
            return Err(VocabotError::Config(
                "webhook url not set (FEISHU_WEBHOOK or [webhook] url)".into(),
            ));
        }
        Ok(url)
    }

    pub fn timezone(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_hours * 3600).unwrap_or_else(|| Utc.fix())
    }

    pub fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().with_timezone(&self.timezone())
    }

    pub fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        let key = date.format("%Y-%m-%d").to_string();
        self.holidays.iter().any(|h| h == &key)
    }
}

/// Vocabulary store connection.
#[derive(Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_db_host")]
    pub host: String,
    #[serde(default = "default_db_port")]
    pub port: u16,
    #[serde(default = "default_db_user")]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_db_name")]
    pub database: String,
    #[serde(default = "default_db_charset")]
    pub charset: String,
    /// Explicit SQLite file. Defaults to `~/.vocabot/<database>.db`.
    #[serde(default)]
    pub path: Option<String>,
}

fn default_db_host() -> String { "localhost".into() }
fn default_db_port() -> u16 { 3306 }
fn default_db_user() -> String { "root".into() }
fn default_db_name() -> String { "englishbot".into() }
fn default_db_charset() -> String { "utf8mb4".into() }

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: default_db_host(),
            port: default_db_port(),
            user: default_db_user(),
            password: String::new(),
            database: default_db_name(),
            charset: default_db_charset(),
            path: None,
        }
    }
}

impl StoreConfig {
    /// Resolved SQLite file location.
    pub fn sqlite_path(&self) -> PathBuf {
        match &self.path {
            Some(p) => PathBuf::from(p),
            None => VocabotConfig::home_dir().join(format!("{}.db", self.database)),
        }
    }

    /// Connection summary safe for logs.
    pub fn describe(&self) -> String {
        format!(
            "{}@{}:{}/{} ({})",
            self.user, self.host, self.port, self.database, self.charset
        )
    }
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"***")
            .field("database", &self.database)
            .field("charset", &self.charset)
            .field("path", &self.path)
            .finish()
    }
}

/// Outbound chat webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// "Learn new words" job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnConfig {
    #[serde(default = "default_learn_batch")]
    pub batch_size: usize,
    #[serde(default = "default_learn_lock")]
    pub lock_file: String,
    #[serde(default = "default_learn_log")]
    pub log_file: String,
    /// Cron-style trigger for `watch` (MIN HOUR DOM MON DOW).
    #[serde(default = "default_learn_schedule")]
    pub schedule: String,
}

fn default_learn_batch() -> usize { 5 }
fn default_learn_lock() -> String { "learnbot.lock".into() }
fn default_learn_log() -> String { "learnbot.log".into() }
fn default_learn_schedule() -> String { "30 10 * * *".into() }

impl Default for LearnConfig {
    fn default() -> Self {
        Self {
            batch_size: default_learn_batch(),
            lock_file: default_learn_lock(),
            log_file: default_learn_log(),
            schedule: default_learn_schedule(),
        }
    }
}

/// Which weighted sampler the review selector uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SamplerKind {
    #[default]
    Reservoir,
    Tickets,
}

/// Spaced review job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewConfig {
    #[serde(default = "default_review_batch")]
    pub batch_size: usize,
    #[serde(default = "default_review_lock")]
    pub lock_file: String,
    #[serde(default = "default_review_log")]
    pub log_file: String,
    #[serde(default = "default_review_schedule")]
    pub schedule: String,
    #[serde(default)]
    pub sampler: SamplerKind,
}

fn default_review_batch() -> usize { 10 }
fn default_review_lock() -> String { "reviewbot.lock".into() }
fn default_review_log() -> String { "reviewbot.log".into() }
fn default_review_schedule() -> String { "0 20 * * *".into() }

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            batch_size: default_review_batch(),
            lock_file: default_review_lock(),
            log_file: default_review_log(),
            schedule: default_review_schedule(),
            sampler: SamplerKind::default(),
        }
    }
}

/// Example sentence backfill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichConfig {
    #[serde(default = "default_enrich_url")]
    pub base_url: String,
    #[serde(default = "default_from_lang")]
    pub from_lang: String,
    #[serde(default = "default_to_lang")]
    pub to_lang: String,
    /// Pause before every lookup.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_enrich_url() -> String { "https://tatoeba.org/en/api_v0/search".into() }
fn default_from_lang() -> String { "eng".into() }
fn default_to_lang() -> String { "cmn".into() }

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            base_url: default_enrich_url(),
            from_lang: default_from_lang(),
            to_lang: default_to_lang(),
            delay_ms: default_delay_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Word list scraping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeConfig {
    #[serde(default = "default_index_url")]
    pub index_url: String,
    /// Anchor text that marks a word-list page on the index.
    #[serde(default = "default_link_marker")]
    pub link_marker: String,
    /// Class of the element that holds the word list on each page.
    #[serde(default = "default_content_class")]
    pub content_class: String,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_index_url() -> String { "https://english.koolearn.com/20170619/821129.html".into() }
fn default_link_marker() -> String { "BEC商务英语初级必备词汇：".into() }
fn default_content_class() -> String { "xqy_core_text".into() }
fn default_user_agent() -> String {
    concat!(
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 ",
        "(KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36"
    )
    .into()
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            index_url: default_index_url(),
            link_marker: default_link_marker(),
            content_class: default_content_class(),
            delay_ms: default_delay_ms(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = VocabotConfig::default();
        assert_eq!(config.utc_offset_hours, 8);
        assert_eq!(config.learn.batch_size, 5);
        assert_eq!(config.review.batch_size, 10);
        assert_eq!(config.review.sampler, SamplerKind::Reservoir);
        assert_eq!(config.holidays.len(), 8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml() {
        let config = VocabotConfig::from_toml(
            r#"
            holidays = ["2026-01-01"]

            [review]
            batch_size = 3
            sampler = "tickets"

            [webhook]
            url = "https://example.invalid/hook"
            "#,
        )
        .unwrap();
        assert_eq!(config.review.batch_size, 3);
        assert_eq!(config.review.sampler, SamplerKind::Tickets);
        assert_eq!(config.learn.batch_size, 5);
        assert_eq!(config.store.port, 3306);
        assert_eq!(config.require_webhook().unwrap(), "https://example.invalid/hook");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "utc_offset_hours = 2\n").unwrap();
        let config = VocabotConfig::load_from(&path).unwrap();
        assert_eq!(config.utc_offset_hours, 2);
        assert!(VocabotConfig::load_from(&dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("DB_HOST", "db.internal"),
            ("DB_PORT", "3307"),
            ("DB_PASSWORD", "s3cret"),
            ("FEISHU_WEBHOOK", "https://hooks.invalid/abc"),
            ("VOCABOT_HOLIDAYS", "2026-01-01, 2026-02-17"),
        ]
        .into_iter()
        .collect();

        let mut config = VocabotConfig::default();
        config.apply_env_with(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.store.host, "db.internal");
        assert_eq!(config.store.port, 3307);
        assert_eq!(config.store.password, "s3cret");
        assert_eq!(config.webhook.url, "https://hooks.invalid/abc");
        assert_eq!(config.holidays, vec!["2026-01-01", "2026-02-17"]);
    }

    #[test]
    fn test_invalid_port_ignored() {
        let mut config = VocabotConfig::default();
        config.apply_env_with(|k| (k == "DB_PORT").then(|| "not-a-port".to_string()));
        assert_eq!(config.store.port, 3306);
    }

    #[test]
    fn test_validate_rejects_bad_holiday() {
        let mut config = VocabotConfig::default();
        config.holidays.push("Oct 1st".into());
        assert!(matches!(config.validate(), Err(VocabotError::Config(_))));
    }

    #[test]
    fn test_missing_webhook() {
        assert!(VocabotConfig::default().require_webhook().is_err());
    }

    #[test]
    fn test_password_redacted() {
        let mut store = StoreConfig::default();
        store.password = "hunter2".into();
        let dbg = format!("{store:?}");
        assert!(!dbg.contains("hunter2"));
        assert!(!store.describe().contains("hunter2"));
    }

    #[test]
    fn test_holiday_lookup() {
        let config = VocabotConfig::default();
        let national_day = NaiveDate::from_ymd_opt(2025, 10, 3).unwrap();
        let normal_day = NaiveDate::from_ymd_opt(2025, 10, 9).unwrap();
        assert!(config.is_holiday(national_day));
        assert!(!config.is_holiday(normal_day));
    }

    #[test]
    fn test_sqlite_path_override() {
        let mut store = StoreConfig::default();
        assert!(store.sqlite_path().ends_with("englishbot.db"));
        store.path = Some("/tmp/words.db".into());
        assert_eq!(store.sqlite_path(), PathBuf::from("/tmp/words.db"));
    }
}
