//! # Vocabot CLI
//!
//! Usage:
//!   vocabot learn                  # push today's new words
//!   vocabot review                 # push a weighted review batch
//!   vocabot watch                  # run both jobs on their schedules
//!   vocabot enrich                 # backfill example sentences
//!   vocabot scrape                 # import the word list
//!   vocabot repair --dry-run       # show merged translations that would be split
//!   vocabot lookup <word>          # query the sentence service once
//!   vocabot status                 # store counters

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Instrument;
use vocabot_core::config::VocabotConfig;
use vocabot_core::traits::SentenceSource;
use vocabot_db::SqliteVocabStore;
use vocabot_harvest::{TatoebaClient, WordListScraper, enrich_examples, repair_translations};
use vocabot_scheduler::{
    InstanceLock, JobKind, JobOutcome, JobRunner, WebhookNotifier, Watcher, acquire_watch_locks,
    logging, run_watcher,
};

#[derive(Parser)]
#[command(
    name = "vocabot",
    version,
    about = "📚 Vocabot: daily vocabulary cards for your team chat"
)]
struct Cli {
    /// Config file (default: ~/.vocabot/config.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Push a batch of unlearned words (workdays only)
    Learn,
    /// Push a weighted batch of learned words for review
    Review,
    /// Run learn and review on their schedules until Ctrl-C
    Watch,
    /// Fill missing example sentences from the sentence service
    Enrich,
    /// Import the word list into the store
    Scrape,
    /// Split translations that swallowed neighbouring entries
    Repair {
        /// Only report what would change
        #[arg(long)]
        dry_run: bool,
    },
    /// Look up one example sentence without touching the store
    Lookup { word: String },
    /// Show store counters
    Status,
}

fn expand_path(p: &str) -> String {
    shellexpand::tilde(p).to_string()
}

fn load_config(path: Option<&str>) -> Result<VocabotConfig> {
    let mut config = match path {
        Some(p) => VocabotConfig::load_from(Path::new(&expand_path(p)))?,
        None => VocabotConfig::load()?,
    };
    config.apply_env();
    config.log_file = expand_path(&config.log_file);
    config.learn.lock_file = expand_path(&config.learn.lock_file);
    config.learn.log_file = expand_path(&config.learn.log_file);
    config.review.lock_file = expand_path(&config.review.lock_file);
    config.review.log_file = expand_path(&config.review.log_file);
    config.store.path = config.store.path.as_deref().map(expand_path);
    config.validate()?;
    Ok(config)
}

fn open_store(config: &VocabotConfig) -> vocabot_core::Result<SqliteVocabStore> {
    tracing::debug!("Opening store {}", config.store.describe());
    SqliteVocabStore::open_with(&config.store)
}

/// Soft failures (store, network, delivery) are logged and end the command cleanly.
fn settle(what: &str, result: vocabot_core::Result<()>) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(e) if e.is_soft() => {
            tracing::error!("❌ {what} abandoned: {e}");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// One-shot run: take the job's lock before anything else touches the store.
async fn run_job(config: &VocabotConfig, kind: JobKind) -> vocabot_core::Result<()> {
    let Some(_guard) = InstanceLock::try_acquire(Path::new(kind.lock_file(config)))? else {
        tracing::info!("🔒 {kind} job already running elsewhere, exiting");
        return Ok(());
    };
    run_locked(config, kind).await
}

/// Run a job whose lock the caller already holds.
async fn run_locked(config: &VocabotConfig, kind: JobKind) -> vocabot_core::Result<()> {
    let notifier = WebhookNotifier::from_config(&config.webhook);
    let store = open_store(config)?;
    let runner = JobRunner::new(config, &store, &notifier);
    match runner.run(kind, config.today()).await? {
        JobOutcome::Committed { ids } => {
            tracing::info!("🏁 {kind} job done, {} words sent", ids.len());
        }
        JobOutcome::Skipped(reason) => tracing::info!("⏭️ {kind} job skipped: {reason}"),
    }
    Ok(())
}

async fn run_watched(config: &VocabotConfig, kind: JobKind) {
    if let Err(e) = settle(&format!("{kind} job"), run_locked(config, kind).await) {
        tracing::error!("❌ {kind} job failed: {e}");
    }
}

async fn enrich(config: &VocabotConfig) -> vocabot_core::Result<()> {
    let store = open_store(config)?;
    let source = TatoebaClient::new(&config.enrich);
    let delay = Duration::from_millis(config.enrich.delay_ms);
    enrich_examples(&store, &source, delay).await?;
    Ok(())
}

async fn scrape(config: &VocabotConfig) -> vocabot_core::Result<()> {
    let store = open_store(config)?;
    WordListScraper::new(&config.scrape)?.run(&store).await?;
    Ok(())
}

fn repair(config: &VocabotConfig, dry_run: bool) -> vocabot_core::Result<()> {
    let store = open_store(config)?;
    repair_translations(&store, dry_run)?;
    Ok(())
}

async fn lookup(config: &VocabotConfig, word: &str) -> vocabot_core::Result<()> {
    let source = TatoebaClient::new(&config.enrich);
    match source.lookup(word).await? {
        Some(pair) => {
            println!("📖 {word}");
            println!("   {}", pair.sentence);
            println!("   {}", pair.translation);
        }
        None => println!("❌ No example found for '{word}'"),
    }
    Ok(())
}

fn status(config: &VocabotConfig) -> vocabot_core::Result<()> {
    let store = open_store(config)?;
    let stats = store.stats()?;
    println!("📚 Vocabot store: {}", config.store.sqlite_path().display());
    println!("   Words:            {}", stats.total);
    println!("   Learned:          {}", stats.learned);
    println!("   Due for review:   {}", stats.due_for_review);
    println!("   Missing example:  {}", stats.missing_example);
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    let offset = config.timezone();
    match &cli.command {
        Command::Learn => {
            let log_file = Path::new(JobKind::Learn.log_file(&config));
            logging::init(offset, log_file, cli.verbose)?;
        }
        Command::Review => {
            let log_file = Path::new(JobKind::Review.log_file(&config));
            logging::init(offset, log_file, cli.verbose)?;
        }
        Command::Watch => {
            let job_logs = [JobKind::Learn, JobKind::Review]
                .map(|kind| (kind, Path::new(kind.log_file(&config))));
            logging::init_watch(offset, Path::new(&config.log_file), &job_logs, cli.verbose)?;
        }
        _ => logging::init(offset, Path::new(&config.log_file), cli.verbose)?,
    }

    match cli.command {
        Command::Learn | Command::Review | Command::Watch => {
            config.require_webhook()?;
        }
        _ => {}
    }

    match cli.command {
        Command::Learn => settle("learn job", run_job(&config, JobKind::Learn).await)?,
        Command::Review => settle("review job", run_job(&config, JobKind::Review).await)?,

        Command::Watch => {
            let watcher = Watcher::from_config(&config, &[JobKind::Learn, JobKind::Review])?;
            // Held until the loop ends, so one-shot runs and other watchers stay out.
            let Some(_locks) = acquire_watch_locks(&config, &watcher)? else {
                return Ok(());
            };
            tracing::info!("🚀 Vocabot watching ({})", config.store.describe());
            run_watcher(&config, watcher, |kind| {
                run_watched(&config, kind).instrument(kind.span())
            })
            .await;
        }

        Command::Enrich => settle("Enrich", enrich(&config).await)?,
        Command::Scrape => settle("Scrape", scrape(&config).await)?,
        Command::Repair { dry_run } => settle("Repair", repair(&config, dry_run))?,
        Command::Lookup { word } => settle("Lookup", lookup(&config, &word).await)?,
        Command::Status => settle("Status", status(&config))?,
    }

    Ok(())
}
