//! Log setup: timestamped lines in local time, to stdout and an append-only file.
//! In watch mode each job additionally gets its own file, fed by the events
//! recorded inside that job's span.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use chrono::{FixedOffset, Utc};
use tracing::{Metadata, Subscriber};
use tracing_subscriber::filter::dynamic_filter_fn;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::layer::{Context, Layered, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};
use vocabot_core::error::{Result, VocabotError};

use crate::jobs::JobKind;

const CRATES: [&str; 5] = [
    "vocabot",
    "vocabot_core",
    "vocabot_db",
    "vocabot_scheduler",
    "vocabot_harvest",
];

/// Renders `YYYY-MM-DD HH:MM:SS` in a fixed offset.
#[derive(Debug, Clone, Copy)]
pub struct LocalTimer {
    offset: FixedOffset,
}

impl LocalTimer {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }
}

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "[{}]",
            Utc::now().with_timezone(&self.offset).format("%Y-%m-%d %H:%M:%S")
        )
    }
}

fn default_directives(verbose: bool) -> String {
    let level = if verbose { "debug" } else { "info" };
    CRATES
        .iter()
        .map(|c| format!("{c}={level}"))
        .collect::<Vec<_>>()
        .join(",")
}

fn env_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(verbose)))
}

/// Log files are opened in append mode and never truncated.
fn open_log(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

/// Install the global subscriber. `RUST_LOG` overrides the default levels.
pub fn init(offset: FixedOffset, log_file: &Path, verbose: bool) -> Result<()> {
    let file = open_log(log_file)?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(verbose))
        .with_target(false)
        .with_ansi(false)
        .with_timer(LocalTimer::new(offset))
        .with_writer(std::io::stdout.and(Mutex::new(file)))
        .try_init()
        .map_err(|e| VocabotError::Other(format!("Logging init failed: {e}")))
}

/// True for the job's span itself and for events recorded inside it.
fn in_job_span<S>(name: &str, meta: &Metadata<'_>, cx: &Context<'_, S>) -> bool
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    if meta.is_span() {
        return meta.name() == name;
    }
    cx.lookup_current()
        .is_some_and(|span| span.scope().any(|s| s.name() == name))
}

type JobLayer<S> = Box<dyn Layer<S> + Send + Sync>;

fn job_layer<S>(offset: FixedOffset, kind: JobKind, file: File) -> JobLayer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a> + 'static,
{
    let name = kind.span_name();
    tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_ansi(false)
        .with_timer(LocalTimer::new(offset))
        .with_writer(Mutex::new(file))
        .with_filter(dynamic_filter_fn(move |meta, cx| in_job_span(name, meta, cx)))
        .boxed()
}

/// Subscriber for watch mode: everything to stdout and `main_log`, plus each
/// job's events to its own file.
pub fn watch_subscriber(
    offset: FixedOffset,
    main_log: &Path,
    job_logs: &[(JobKind, &Path)],
    verbose: bool,
) -> Result<impl Subscriber + Send + Sync + 'static> {
    let main_file = open_log(main_log)?;
    let job_layers = job_logs
        .iter()
        .map(|(kind, path)| Ok(job_layer(offset, *kind, open_log(path)?)))
        .collect::<Result<Vec<JobLayer<Layered<EnvFilter, Registry>>>>>()?;

    let main_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_ansi(false)
        .with_timer(LocalTimer::new(offset))
        .with_writer(std::io::stdout.and(Mutex::new(main_file)));

    Ok(Registry::default()
        .with(env_filter(verbose))
        .with(job_layers)
        .with(main_layer))
}

/// Install the watch-mode subscriber globally.
pub fn init_watch(
    offset: FixedOffset,
    main_log: &Path,
    job_logs: &[(JobKind, &Path)],
    verbose: bool,
) -> Result<()> {
    watch_subscriber(offset, main_log, job_logs, verbose)?
        .try_init()
        .map_err(|e| VocabotError::Other(format!("Logging init failed: {e}")))
}
