//! End-to-end runs of the learn, review and enrichment pipeline against an
//! in-memory store, a recording webhook and a canned sentence source.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use vocabot_core::config::VocabotConfig;
use vocabot_core::error::{Result, VocabotError};
use vocabot_core::traits::{Notifier, SentenceSource, VocabStore};
use vocabot_core::types::{ExamplePair, NewWord};
use vocabot_db::SqliteVocabStore;
use vocabot_harvest::enrich_examples;
use vocabot_scheduler::gate::Gate;
use vocabot_scheduler::{InstanceLock, JobKind, JobOutcome, JobRunner, SkipReason};

struct RecordingWebhook {
    fail: bool,
    sent: Mutex<Vec<serde_json::Value>>,
}

impl RecordingWebhook {
    fn new(fail: bool) -> Self {
        Self {
            fail,
            sent: Mutex::new(Vec::new()),
        }
    }

    fn sent(&self) -> Vec<serde_json::Value> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingWebhook {
    fn name(&self) -> &str {
        "recording"
    }

    async fn deliver(&self, payload: &serde_json::Value) -> Result<()> {
        self.sent.lock().unwrap().push(payload.clone());
        if self.fail {
            return Err(VocabotError::Delivery("StatusCode 19001".into()));
        }
        Ok(())
    }
}

struct EchoSource;

#[async_trait]
impl SentenceSource for EchoSource {
    fn name(&self) -> &str {
        "echo"
    }

    async fn lookup(&self, word: &str) -> Result<Option<ExamplePair>> {
        Ok(Some(ExamplePair {
            sentence: format!("We discussed the {word} today."),
            translation: format!("我们今天讨论了{word}。"),
        }))
    }
}

fn tuesday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 10).unwrap()
}

fn config(dir: &tempfile::TempDir) -> VocabotConfig {
    let mut config = VocabotConfig::default();
    config.learn.lock_file = dir.path().join("learnbot.lock").display().to_string();
    config.review.lock_file = dir.path().join("reviewbot.lock").display().to_string();
    config
}

fn seeded(n: usize) -> SqliteVocabStore {
    let store = SqliteVocabStore::open_in_memory().unwrap();
    let words: Vec<NewWord> = (0..n)
        .map(|i| NewWord {
            term: format!("word{i}"),
            part_of_speech: Some("n".into()),
            translation: format!("词{i}"),
        })
        .collect();
    assert_eq!(store.insert_if_absent(&words).unwrap(), n);
    store
}

fn card_blocks(payload: &serde_json::Value) -> usize {
    payload["card"]["elements"].as_array().map_or(0, Vec::len)
}

#[tokio::test]
async fn test_learn_then_review() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    let store = seeded(7);
    let webhook = RecordingWebhook::new(false);
    let runner = JobRunner::new(&config, &store, &webhook);

    let JobOutcome::Committed { ids } =
        runner.run_exclusive(JobKind::Learn, tuesday()).await.unwrap()
    else {
        panic!("learn job did not commit");
    };
    assert_eq!(ids.len(), 5);
    assert_eq!(card_blocks(&webhook.sent()[0]), 5);
    assert_eq!(webhook.sent()[0]["msg_type"], "interactive");

    for id in &ids {
        let entry = store.get(*id).unwrap().unwrap();
        assert!(entry.learned && entry.needs_review);
        assert_eq!(entry.learn_date, Some(tuesday()));
        assert_eq!(entry.review_count, 0);
    }
    assert_eq!(store.fetch_unlearned(10).unwrap().len(), 2);

    let review_day = tuesday().succ_opt().unwrap();
    let JobOutcome::Committed { ids: reviewed } =
        runner.run_exclusive(JobKind::Review, review_day).await.unwrap()
    else {
        panic!("review job did not commit");
    };
    // Pool of five is smaller than the batch, so everything comes back.
    assert_eq!(reviewed.len(), 5);
    assert_eq!(card_blocks(&webhook.sent()[1]), 5);
    for id in &reviewed {
        let entry = store.get(*id).unwrap().unwrap();
        assert_eq!(entry.review_count, 1);
        assert_eq!(entry.last_review_date, Some(review_day));
        assert!(entry.is_consistent());
    }
}

#[tokio::test]
async fn test_failed_delivery_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    let store = seeded(3);
    let webhook = RecordingWebhook::new(true);
    let runner = JobRunner::new(&config, &store, &webhook);

    let outcome = runner.run_exclusive(JobKind::Learn, tuesday()).await.unwrap();
    assert!(matches!(outcome, JobOutcome::Skipped(SkipReason::DeliveryFailed(_))));
    assert_eq!(webhook.sent().len(), 1);
    assert_eq!(store.fetch_unlearned(10).unwrap().len(), 3);
    assert!(store.fetch_review_candidates().unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_review_pool_sends_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    let store = seeded(4);
    let webhook = RecordingWebhook::new(false);
    let runner = JobRunner::new(&config, &store, &webhook);

    let outcome = runner.run_exclusive(JobKind::Review, tuesday()).await.unwrap();
    assert_eq!(outcome, JobOutcome::Skipped(SkipReason::NoCandidates));
    assert!(webhook.sent().is_empty());
}

#[tokio::test]
async fn test_holiday_skips_learn_but_not_review() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    let store = seeded(4);
    let webhook = RecordingWebhook::new(false);
    let runner = JobRunner::new(&config, &store, &webhook);

    // Learn something on a workday first so review has a pool.
    runner.run_exclusive(JobKind::Learn, tuesday()).await.unwrap();

    let national_day = NaiveDate::from_ymd_opt(2025, 10, 1).unwrap();
    let outcome = runner.run_exclusive(JobKind::Learn, national_day).await.unwrap();
    assert_eq!(outcome, JobOutcome::Skipped(SkipReason::NotWorkday(Gate::Holiday)));
    assert_eq!(webhook.sent().len(), 1);

    let outcome = runner.run_exclusive(JobKind::Review, national_day).await.unwrap();
    assert!(outcome.is_committed());
}

#[tokio::test]
async fn test_lock_held_by_another_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir);
    let store = seeded(4);
    let webhook = RecordingWebhook::new(false);
    let runner = JobRunner::new(&config, &store, &webhook);

    let held = InstanceLock::try_acquire(std::path::Path::new(&config.learn.lock_file))
        .unwrap()
        .unwrap();
    let outcome = runner.run_exclusive(JobKind::Learn, tuesday()).await.unwrap();
    assert_eq!(outcome, JobOutcome::Skipped(SkipReason::LockHeld));
    assert!(webhook.sent().is_empty());

    // The review lock is independent.
    let outcome = runner.run_exclusive(JobKind::Review, tuesday()).await.unwrap();
    assert_eq!(outcome, JobOutcome::Skipped(SkipReason::NoCandidates));

    drop(held);
    assert!(runner.run_exclusive(JobKind::Learn, tuesday()).await.unwrap().is_committed());
}

#[tokio::test]
async fn test_enriched_examples_reach_the_card() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(&dir);
    config.learn.batch_size = 1;
    let store = seeded(1);
    let webhook = RecordingWebhook::new(false);

    let report = enrich_examples(&store, &EchoSource, Duration::ZERO).await.unwrap();
    assert_eq!(report.complete, 1);
    assert!(store.pending_examples().unwrap().is_empty());

    let runner = JobRunner::new(&config, &store, &webhook);
    assert!(runner.run_exclusive(JobKind::Learn, tuesday()).await.unwrap().is_committed());
    let content = webhook.sent()[0]["card"]["elements"][0]["text"]["content"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(content.contains("We discussed the word0 today."));
    assert!(content.contains("我们今天讨论了word0。"));
}
