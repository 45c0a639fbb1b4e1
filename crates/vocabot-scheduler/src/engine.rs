//! Polling loop for the long-running `watch` mode.
//! Uses tokio::interval to wake every few seconds, checks local wall-clock
//! time against each job's schedule, and fires a job at most once per day.
//! The watching process holds every watched job's lock until it exits.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, NaiveDate, Timelike};
use vocabot_core::config::VocabotConfig;
use vocabot_core::error::{Result, VocabotError};

use crate::cron::Schedule;
use crate::jobs::JobKind;
use crate::lock::InstanceLock;

/// A job and its trigger.
#[derive(Debug, Clone)]
pub struct WatchedJob {
    pub kind: JobKind,
    pub schedule: Schedule,
    last_fired: Option<NaiveDate>,
}

impl WatchedJob {
    pub fn new(kind: JobKind, schedule: Schedule) -> Self {
        Self {
            kind,
            schedule,
            last_fired: None,
        }
    }

    pub fn last_fired(&self) -> Option<NaiveDate> {
        self.last_fired
    }
}

/// Tracks which jobs are due.
pub struct Watcher {
    jobs: Vec<WatchedJob>,
}

impl Watcher {
    pub fn new(jobs: Vec<WatchedJob>) -> Self {
        Self { jobs }
    }

    /// Both jobs with the schedules from config.
    pub fn from_config(config: &VocabotConfig, kinds: &[JobKind]) -> Result<Self> {
        let jobs = kinds
            .iter()
            .map(|kind| {
                let expr = kind.schedule(config);
                Schedule::parse(expr)
                    .map(|s| WatchedJob::new(*kind, s))
                    .ok_or_else(|| {
                        VocabotError::Config(format!("invalid {kind} schedule '{expr}'"))
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(jobs))
    }

    pub fn jobs(&self) -> &[WatchedJob] {
        &self.jobs
    }

    /// Jobs whose trigger minute is `now` and which have not fired today.
    /// Returned jobs are recorded as fired for today's date.
    pub fn due(&mut self, now: DateTime<FixedOffset>) -> Vec<JobKind> {
        let today = now.date_naive();
        let mut due = Vec::new();
        for job in self.jobs.iter_mut() {
            if job.schedule.matches(&now) && job.last_fired != Some(today) {
                job.last_fired = Some(today);
                due.push(job.kind);
            }
        }
        due
    }
}

/// Seconds left in the minute containing `now`.
pub fn rest_of_minute(now: DateTime<FixedOffset>) -> Duration {
    Duration::from_secs(u64::from(60 - now.second().min(59)))
}

/// Take the locks of every watched job for the lifetime of the watch loop.
/// `Ok(None)` when another process holds any of them; nothing stays locked then.
pub fn acquire_watch_locks(
    config: &VocabotConfig,
    watcher: &Watcher,
) -> Result<Option<Vec<InstanceLock>>> {
    let mut guards = Vec::with_capacity(watcher.jobs().len());
    for job in watcher.jobs() {
        match InstanceLock::try_acquire(Path::new(job.kind.lock_file(config)))? {
            Some(guard) => guards.push(guard),
            None => {
                tracing::info!("🔒 {} job already running elsewhere, not watching", job.kind);
                return Ok(None);
            }
        }
    }
    Ok(Some(guards))
}

/// Run until Ctrl-C: tick every `poll_interval_secs`, fire due jobs through `run_job`.
pub async fn run_watcher<F, Fut>(config: &VocabotConfig, watcher: Watcher, run_job: F)
where
    F: Fn(JobKind) -> Fut,
    Fut: Future<Output = ()>,
{
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("❌ Ctrl-C handler failed: {e}");
            std::future::pending::<()>().await;
        }
    };
    run_watcher_until(config, watcher, run_job, ctrl_c).await;
}

/// Like [`run_watcher`], stopping when `shutdown` completes.
/// A job already running when the signal arrives is finished first.
pub async fn run_watcher_until<F, Fut, S>(
    config: &VocabotConfig,
    mut watcher: Watcher,
    run_job: F,
    shutdown: S,
) where
    F: Fn(JobKind) -> Fut,
    Fut: Future<Output = ()>,
    S: Future<Output = ()>,
{
    for job in watcher.jobs() {
        let next = job.schedule.next_after(config.now());
        tracing::info!(
            "⏰ Watching {} job '{}' (next: {})",
            job.kind,
            job.schedule.expression(),
            next.map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "never".into())
        );
    }

    tokio::pin!(shutdown);
    let mut interval = tokio::time::interval(Duration::from_secs(config.poll_interval_secs));
    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = &mut shutdown => {
                tracing::info!("👋 Watcher stopped");
                return;
            }
        }

        let now = config.now();
        let due = watcher.due(now);
        if due.is_empty() {
            continue;
        }
        for kind in due {
            tracing::info!("🔔 {kind} job triggered at {}", now.format("%H:%M:%S"));
            let job = run_job(kind);
            tokio::pin!(job);
            tokio::select! {
                _ = &mut job => {}
                _ = &mut shutdown => {
                    tracing::info!("👋 Stopping after the running {kind} job");
                    job.await;
                    return;
                }
            }
        }
        // Sleep past the trigger minute so the next tick cannot match it again.
        tokio::select! {
            _ = tokio::time::sleep(rest_of_minute(config.now())) => {}
            _ = &mut shutdown => {
                tracing::info!("👋 Watcher stopped");
                return;
            }
        }
    }
}
