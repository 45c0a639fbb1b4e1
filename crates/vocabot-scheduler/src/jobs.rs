//! The learn and review jobs.
//!
//! Each run walks `Idle → LockAcquired → Gate → Fetch → Select → Render →
//! Deliver → Commit`, or stops early in `Skip`. Store state is written only
//! after the webhook confirmed delivery, so a word is never marked learned or
//! reviewed unless it was actually shown.

use std::fmt;
use std::path::Path;

use chrono::NaiveDate;
use vocabot_core::config::VocabotConfig;
use vocabot_core::error::{Result, VocabotError};
use vocabot_core::traits::{Notifier, VocabStore};
use vocabot_core::types::VocabEntry;

use crate::card::{CardMode, WebhookCard, build_card};
use crate::gate::{Gate, check_workday};
use crate::lock::InstanceLock;
use crate::selector::{AnySampler, select_with};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKind {
    Learn,
    Review,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::Learn => write!(f, "learn"),
            JobKind::Review => write!(f, "review"),
        }
    }
}

impl JobKind {
    pub fn lock_file<'a>(&self, config: &'a VocabotConfig) -> &'a str {
        match self {
            JobKind::Learn => &config.learn.lock_file,
            JobKind::Review => &config.review.lock_file,
        }
    }

    pub fn log_file<'a>(&self, config: &'a VocabotConfig) -> &'a str {
        match self {
            JobKind::Learn => &config.learn.log_file,
            JobKind::Review => &config.review.log_file,
        }
    }

    pub fn schedule<'a>(&self, config: &'a VocabotConfig) -> &'a str {
        match self {
            JobKind::Learn => &config.learn.schedule,
            JobKind::Review => &config.review.schedule,
        }
    }

    pub fn span_name(&self) -> &'static str {
        match self {
            JobKind::Learn => "learn",
            JobKind::Review => "review",
        }
    }

    /// Span named after the job. Events inside it go to the job's own log file
    /// when logging was set up with [`crate::logging::init_watch`].
    pub fn span(&self) -> tracing::Span {
        match self {
            JobKind::Learn => tracing::info_span!("learn"),
            JobKind::Review => tracing::info_span!("review"),
        }
    }
}

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Idle,
    LockAcquired,
    Gate,
    Fetch,
    Select,
    Render,
    Deliver,
    Commit,
    Skip,
}

/// Why a run ended without writing anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    LockHeld,
    NotWorkday(Gate),
    NoCandidates,
    StoreUnavailable(String),
    DeliveryFailed(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::LockHeld => write!(f, "another instance is running"),
            SkipReason::NotWorkday(Gate::Holiday) => write!(f, "today is a holiday"),
            SkipReason::NotWorkday(_) => write!(f, "today is not a workday"),
            SkipReason::NoCandidates => write!(f, "no words to send"),
            SkipReason::StoreUnavailable(e) => write!(f, "store unavailable: {e}"),
            SkipReason::DeliveryFailed(e) => write!(f, "delivery failed: {e}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Delivered and written back for `ids`.
    Committed { ids: Vec<i64> },
    Skipped(SkipReason),
}

impl JobOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, JobOutcome::Committed { .. })
    }
}

/// Runs jobs against a store and a notifier.
pub struct JobRunner<'a, S: VocabStore, N: Notifier> {
    config: &'a VocabotConfig,
    store: &'a S,
    notifier: &'a N,
    sampler: AnySampler,
}

impl<'a, S: VocabStore, N: Notifier> JobRunner<'a, S, N> {
    pub fn new(config: &'a VocabotConfig, store: &'a S, notifier: &'a N) -> Self {
        Self {
            config,
            store,
            notifier,
            sampler: AnySampler::from_kind(config.review.sampler),
        }
    }

    fn enter(&self, kind: JobKind, phase: JobPhase) {
        tracing::debug!(job = %kind, ?phase, "job phase");
    }

    fn skip(&self, kind: JobKind, reason: SkipReason) -> Result<JobOutcome> {
        self.enter(kind, JobPhase::Skip);
        Ok(JobOutcome::Skipped(reason))
    }

    /// Take the job's lock, then run it. Lock contention is a skip, not an error.
    pub async fn run_exclusive(&self, kind: JobKind, today: NaiveDate) -> Result<JobOutcome> {
        self.enter(kind, JobPhase::Idle);
        let Some(_guard) = InstanceLock::try_acquire(Path::new(kind.lock_file(self.config)))?
        else {
            tracing::info!("🔒 {kind} job already running elsewhere, exiting");
            return self.skip(kind, SkipReason::LockHeld);
        };
        self.enter(kind, JobPhase::LockAcquired);
        self.run(kind, today).await
    }

    /// Run a job without taking the lock.
    pub async fn run(&self, kind: JobKind, today: NaiveDate) -> Result<JobOutcome> {
        match kind {
            JobKind::Learn => self.run_learn(today).await,
            JobKind::Review => self.run_review(today).await,
        }
    }

    pub async fn run_learn(&self, today: NaiveDate) -> Result<JobOutcome> {
        let kind = JobKind::Learn;
        self.enter(kind, JobPhase::Gate);
        let gate = check_workday(today, self.config);
        if !gate.is_open() {
            tracing::info!("📅 {today} is not a workday ({gate:?}), skipping push");
            return self.skip(kind, SkipReason::NotWorkday(gate));
        }

        self.enter(kind, JobPhase::Fetch);
        let words = match self.store.fetch_unlearned(self.config.learn.batch_size) {
            Ok(words) => words,
            Err(e) => {
                tracing::error!("❌ Could not fetch new words: {e}");
                return self.skip(kind, SkipReason::StoreUnavailable(e.to_string()));
            }
        };
        // Selection for new words is the store's random limit.
        self.enter(kind, JobPhase::Select);
        if words.is_empty() {
            tracing::info!("📭 No unlearned words left");
            return self.skip(kind, SkipReason::NoCandidates);
        }

        self.enter(kind, JobPhase::Render);
        let card = build_card(&words, CardMode::New, today);
        self.deliver_and_commit(kind, &words, &card, |ids| {
            self.store.mark_learned(ids, today)
        })
        .await
    }

    pub async fn run_review(&self, today: NaiveDate) -> Result<JobOutcome> {
        let kind = JobKind::Review;
        self.enter(kind, JobPhase::Fetch);
        let candidates = match self.store.fetch_review_candidates() {
            Ok(c) => c,
            Err(e) => {
                tracing::error!("❌ Could not fetch review candidates: {e}");
                return self.skip(kind, SkipReason::StoreUnavailable(e.to_string()));
            }
        };

        self.enter(kind, JobPhase::Select);
        let words = select_with(
            &candidates,
            self.config.review.batch_size,
            &self.sampler,
            &mut rand::rng(),
        );
        if words.is_empty() {
            tracing::info!("📭 Nothing to review");
            return self.skip(kind, SkipReason::NoCandidates);
        }
        tracing::info!("🎯 Selected {} of {} review candidates", words.len(), candidates.len());

        self.enter(kind, JobPhase::Render);
        let card = build_card(&words, CardMode::Review, today);
        self.deliver_and_commit(kind, &words, &card, |ids| {
            self.store.mark_reviewed(ids, today)
        })
        .await
    }

    async fn deliver_and_commit<F>(
        &self,
        kind: JobKind,
        words: &[VocabEntry],
        card: &WebhookCard,
        commit: F,
    ) -> Result<JobOutcome>
    where
        F: FnOnce(&[i64]) -> Result<usize>,
    {
        self.enter(kind, JobPhase::Deliver);
        let payload = card.to_payload()?;
        if let Err(e) = self.notifier.deliver(&payload).await {
            tracing::warn!("⚠️ {} delivery failed, nothing written: {e}", self.notifier.name());
            return self.skip(kind, SkipReason::DeliveryFailed(e.to_string()));
        }

        self.enter(kind, JobPhase::Commit);
        let ids: Vec<i64> = words.iter().map(|w| w.id).collect();
        let changed = commit(&ids).map_err(|e| {
            tracing::error!("❌ Card delivered but {kind} state not saved: {e}");
            VocabotError::Store(format!("commit after delivery: {e}"))
        })?;
        tracing::info!("✅ {kind} job committed {changed} words");
        Ok(JobOutcome::Committed { ids })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::cell::Cell;
    use std::sync::Mutex;
    use vocabot_core::types::{ExamplePair, NewWord, PendingExample, TranslationRepair};
    use vocabot_db::SqliteVocabStore;

    /// Records payloads; fails every delivery when `fail` is set.
    struct FakeNotifier {
        fail: bool,
        sent: Mutex<Vec<serde_json::Value>>,
    }

    impl FakeNotifier {
        fn ok() -> Self {
            Self { fail: false, sent: Mutex::new(Vec::new()) }
        }

        fn failing() -> Self {
            Self { fail: true, sent: Mutex::new(Vec::new()) }
        }

        fn sent(&self) -> Vec<serde_json::Value> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for FakeNotifier {
        fn name(&self) -> &str {
            "fake"
        }

        async fn deliver(&self, payload: &serde_json::Value) -> Result<()> {
            self.sent.lock().unwrap().push(payload.clone());
            if self.fail {
                Err(VocabotError::Delivery("HTTP 500".into()))
            } else {
                Ok(())
            }
        }
    }

    /// Store that counts reads and refuses every call.
    #[derive(Default)]
    struct UnreachableStore {
        calls: Cell<usize>,
    }

    impl UnreachableStore {
        fn fail<T>(&self) -> Result<T> {
            self.calls.set(self.calls.get() + 1);
            Err(VocabotError::Store("connection refused".into()))
        }
    }

    impl VocabStore for UnreachableStore {
        fn fetch_unlearned(&self, _: usize) -> Result<Vec<VocabEntry>> {
            self.fail()
        }
        fn fetch_review_candidates(&self) -> Result<Vec<VocabEntry>> {
            self.fail()
        }
        fn mark_learned(&self, _: &[i64], _: NaiveDate) -> Result<usize> {
            self.fail()
        }
        fn mark_reviewed(&self, _: &[i64], _: NaiveDate) -> Result<usize> {
            self.fail()
        }
        fn insert_if_absent(&self, _: &[NewWord]) -> Result<usize> {
            self.fail()
        }
        fn pending_examples(&self) -> Result<Vec<PendingExample>> {
            self.fail()
        }
        fn fill_example(&self, _: i64, _: &ExamplePair) -> Result<bool> {
            self.fail()
        }
        fn all_translations(&self) -> Result<Vec<(i64, String, String)>> {
            self.fail()
        }
        fn apply_repairs(&self, _: &[TranslationRepair]) -> Result<(usize, usize)> {
            self.fail()
        }
    }

    fn store_with(n: usize) -> SqliteVocabStore {
        let store = SqliteVocabStore::open_in_memory().unwrap();
        let words: Vec<NewWord> = (0..n)
            .map(|i| NewWord {
                term: format!("term{i}"),
                part_of_speech: Some("n".into()),
                translation: format!("译{i}"),
            })
            .collect();
        store.insert_if_absent(&words).unwrap();
        store
    }

    fn workday() -> NaiveDate {
        // Monday
        NaiveDate::from_ymd_opt(2026, 3, 9).unwrap()
    }

    #[tokio::test]
    async fn test_learn_commits_after_delivery() {
        let config = VocabotConfig::default();
        let store = store_with(8);
        let notifier = FakeNotifier::ok();
        let runner = JobRunner::new(&config, &store, &notifier);

        let outcome = runner.run_learn(workday()).await.unwrap();
        let JobOutcome::Committed { ids } = outcome else {
            panic!("expected commit, got {outcome:?}");
        };
        assert_eq!(ids.len(), 5);

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["card"]["elements"].as_array().unwrap().len(), 5);

        for id in &ids {
            let e = store.get(*id).unwrap().unwrap();
            assert!(e.learned && e.needs_review);
            assert_eq!(e.learn_date, Some(workday()));
        }
        assert_eq!(store.fetch_unlearned(100).unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_learn_with_small_pool() {
        let config = VocabotConfig::default();
        let store = store_with(2);
        let notifier = FakeNotifier::ok();
        let outcome = JobRunner::new(&config, &store, &notifier)
            .run_learn(workday())
            .await
            .unwrap();
        assert!(matches!(outcome, JobOutcome::Committed { ref ids } if ids.len() == 2));
    }

    #[tokio::test]
    async fn test_failed_delivery_writes_nothing() {
        let config = VocabotConfig::default();
        let store = store_with(5);
        let notifier = FakeNotifier::failing();
        let runner = JobRunner::new(&config, &store, &notifier);

        let outcome = runner.run_learn(workday()).await.unwrap();
        assert!(matches!(outcome, JobOutcome::Skipped(SkipReason::DeliveryFailed(_))));
        assert_eq!(store.stats().unwrap().learned, 0);
        assert_eq!(notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_review_delivery_keeps_counts() {
        let config = VocabotConfig::default();
        let store = store_with(4);
        let ids: Vec<i64> = store.fetch_unlearned(4).unwrap().iter().map(|e| e.id).collect();
        store.mark_learned(&ids, workday()).unwrap();
        let before = store.fetch_review_candidates().unwrap();

        let notifier = FakeNotifier::failing();
        let outcome = JobRunner::new(&config, &store, &notifier)
            .run_review(workday())
            .await
            .unwrap();
        assert!(matches!(outcome, JobOutcome::Skipped(SkipReason::DeliveryFailed(_))));
        assert_eq!(store.fetch_review_candidates().unwrap(), before);
    }

    #[tokio::test]
    async fn test_review_increments_selected_only() {
        let mut config = VocabotConfig::default();
        config.review.batch_size = 3;
        let store = store_with(6);
        let ids: Vec<i64> = store.fetch_unlearned(6).unwrap().iter().map(|e| e.id).collect();
        store.mark_learned(&ids, workday()).unwrap();

        let notifier = FakeNotifier::ok();
        let review_day = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let outcome = JobRunner::new(&config, &store, &notifier)
            .run_review(review_day)
            .await
            .unwrap();
        let JobOutcome::Committed { ids: reviewed } = outcome else {
            panic!("expected commit");
        };
        assert_eq!(reviewed.len(), 3);

        for e in store.fetch_review_candidates().unwrap() {
            if reviewed.contains(&e.id) {
                assert_eq!(e.review_count, 1);
                assert_eq!(e.last_review_date, Some(review_day));
            } else {
                assert_eq!(e.review_count, 0);
                assert_eq!(e.last_review_date, None);
            }
        }
    }

    #[tokio::test]
    async fn test_review_empty_pool_sends_nothing() {
        let config = VocabotConfig::default();
        let store = store_with(3);
        let notifier = FakeNotifier::ok();
        let outcome = JobRunner::new(&config, &store, &notifier)
            .run_review(workday())
            .await
            .unwrap();
        assert_eq!(outcome, JobOutcome::Skipped(SkipReason::NoCandidates));
        assert!(notifier.sent().is_empty());
        assert_eq!(store.stats().unwrap().learned, 0);
    }

    #[tokio::test]
    async fn test_holiday_skips_before_store() {
        let config = VocabotConfig::default();
        let store = UnreachableStore::default();
        let notifier = FakeNotifier::ok();
        let national_day = NaiveDate::from_ymd_opt(2025, 10, 1).unwrap();

        let outcome = JobRunner::new(&config, &store, &notifier)
            .run_learn(national_day)
            .await
            .unwrap();
        assert_eq!(outcome, JobOutcome::Skipped(SkipReason::NotWorkday(Gate::Holiday)));
        assert_eq!(store.calls.get(), 0);
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_weekend_skips_learn_but_not_review() {
        let config = VocabotConfig::default();
        let store = UnreachableStore::default();
        let notifier = FakeNotifier::ok();
        let saturday = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();
        let runner = JobRunner::new(&config, &store, &notifier);

        let learn = runner.run_learn(saturday).await.unwrap();
        assert_eq!(learn, JobOutcome::Skipped(SkipReason::NotWorkday(Gate::Weekend)));
        assert_eq!(store.calls.get(), 0);

        let review = runner.run_review(saturday).await.unwrap();
        assert!(matches!(review, JobOutcome::Skipped(SkipReason::StoreUnavailable(_))));
        assert_eq!(store.calls.get(), 1);
    }

    #[tokio::test]
    async fn test_lock_contention_skips() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = VocabotConfig::default();
        config.learn.lock_file = dir.path().join("learnbot.lock").display().to_string();
        let store = store_with(5);
        let notifier = FakeNotifier::ok();
        let runner = JobRunner::new(&config, &store, &notifier);

        let held = InstanceLock::try_acquire(Path::new(&config.learn.lock_file)).unwrap();
        assert!(held.is_some());
        let outcome = runner.run_exclusive(JobKind::Learn, workday()).await.unwrap();
        assert_eq!(outcome, JobOutcome::Skipped(SkipReason::LockHeld));
        assert!(notifier.sent().is_empty());

        drop(held);
        let outcome = runner.run_exclusive(JobKind::Learn, workday()).await.unwrap();
        assert!(outcome.is_committed());
    }

    #[test]
    fn test_span_names_match_kind() {
        for kind in [JobKind::Learn, JobKind::Review] {
            assert_eq!(kind.span_name(), kind.to_string());
        }
    }

    #[test]
    fn test_skip_reason_display() {
        assert_eq!(SkipReason::NoCandidates.to_string(), "no words to send");
        assert_eq!(SkipReason::NotWorkday(Gate::Holiday).to_string(), "today is a holiday");
    }
}
