//! The scraping loop.
//!
//! [`Scheduler`] owns the timer and the per-cycle worker group; each worker
//! runs [`ingest_feed`] for one feed. Workers share nothing but the store
//! pool and the HTTP client.

mod ingest;
mod scheduler;

pub use ingest::{ingest_feed, prepare_post, store_items, IngestOutcome, IngestReport, ItemSkip};
pub use scheduler::{CycleSummary, Scheduler, ScraperConfig, MIN_INTERVAL};
