//! # Vocabot Scheduler
//!
//! Everything between "the store has words" and "the chat got a card".
//!
//! ## Architecture
//! ```text
//! JobRunner (single shot, or driven by the watch loop)
//!   ├── InstanceLock: one run per job at a time
//!   ├── Gate: learn job only runs on workdays
//!   ├── Store fetch → selector (review) → card
//!   ├── WebhookNotifier: POST the card
//!   └── on confirmed delivery → store commit
//! ```

pub mod card;
pub mod cron;
pub mod dispatch;
pub mod engine;
pub mod gate;
pub mod jobs;
pub mod lock;
pub mod logging;
pub mod selector;

pub use card::{CardMode, WebhookCard, build_card};
pub use dispatch::WebhookNotifier;
pub use engine::{Watcher, acquire_watch_locks, run_watcher};
pub use jobs::{JobKind, JobOutcome, JobRunner, SkipReason};
pub use lock::InstanceLock;
pub use selector::{AnySampler, ReservoirSampler, TicketSampler, WeightedSampler, select_for_review};
