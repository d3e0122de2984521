use std::time::{Duration, Instant};
use tokio::task::{JoinError, JoinSet};
use tokio::time::MissedTickBehavior;

use super::ingest::{ingest_feed, IngestReport};
use crate::storage::Database;

/// Settings the scheduler runs with, usually built from a validated
/// [`Config`](crate::config::Config).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScraperConfig {
    /// Time between cycle starts
    pub interval: Duration,
    /// Maximum feeds selected (and workers spawned) per cycle
    pub concurrency: usize,
    /// Budget for one feed's request and body download
    pub fetch_timeout: Duration,
    /// Budget for a whole cycle; remaining workers are aborted when it elapses
    pub cycle_timeout: Option<Duration>,
}

/// Outcome of one cycle, aggregated over its workers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleSummary {
    /// Feed selection failed and nothing was dispatched
    pub skipped: bool,
    pub selected: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Workers that panicked
    pub crashed: usize,
    /// Workers cut off by the cycle deadline
    pub aborted: usize,
    pub inserted: usize,
    pub reports: Vec<IngestReport>,
}

impl CycleSummary {
    fn record(&mut self, joined: Result<IngestReport, JoinError>) {
        match joined {
            Ok(report) => {
                if report.is_success() {
                    self.succeeded += 1;
                } else {
                    self.failed += 1;
                }
                self.inserted += report.inserted;
                self.reports.push(report);
            }
            Err(e) if e.is_cancelled() => self.aborted += 1,
            Err(e) => {
                tracing::error!(error = %e, "Scrape worker panicked");
                self.crashed += 1;
            }
        }
    }
}

/// Periodic scraper: each tick selects the stalest feeds and ingests them
/// concurrently, waiting for every worker before the next tick.
///
/// Constructed once by the process root. It owns nothing but its
/// configuration and handles to the store and the HTTP client.
pub struct Scheduler {
    db: Database,
    client: reqwest::Client,
    config: ScraperConfig,
}

/// Shortest interval the scheduler accepts.
pub const MIN_INTERVAL: Duration = Duration::from_secs(1);

impl Scheduler {
    /// An `interval` below [`MIN_INTERVAL`] is raised to it.
    pub fn new(db: Database, client: reqwest::Client, mut config: ScraperConfig) -> Self {
        if config.interval < MIN_INTERVAL {
            tracing::warn!(
                interval_ms = config.interval.as_millis() as u64,
                "Scrape interval too short, using {}s",
                MIN_INTERVAL.as_secs()
            );
            config.interval = MIN_INTERVAL;
        }
        Self { db, client, config }
    }

    pub fn config(&self) -> &ScraperConfig {
        &self.config
    }

    /// Run cycles forever. The first cycle starts immediately.
    ///
    /// A cycle that overruns the interval delays the next tick rather than
    /// triggering a burst of catch-up cycles.
    pub async fn run(&self) {
        tracing::info!(
            concurrency = self.config.concurrency,
            interval_secs = self.config.interval.as_secs_f64(),
            "Scraping feeds"
        );

        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.run_cycle().await;
        }
    }

    /// Run one select/dispatch/join cycle and return what happened.
    ///
    /// A failed selection query skips the cycle. A failing, panicking or
    /// aborted worker never affects its siblings.
    pub async fn run_cycle(&self) -> CycleSummary {
        let started = Instant::now();

        let feeds = match self
            .db
            .select_next_feeds_to_fetch(self.config.concurrency)
            .await
        {
            Ok(feeds) => feeds,
            Err(e) => {
                tracing::error!(error = %e, "Failed to select feeds to fetch, skipping cycle");
                return CycleSummary {
                    skipped: true,
                    ..CycleSummary::default()
                };
            }
        };

        let mut summary = CycleSummary {
            selected: feeds.len(),
            ..CycleSummary::default()
        };
        if feeds.is_empty() {
            tracing::debug!("No feeds to fetch");
            return summary;
        }

        let mut workers = JoinSet::new();
        for feed in feeds {
            let db = self.db.clone();
            let client = self.client.clone();
            let fetch_timeout = self.config.fetch_timeout;
            workers.spawn(async move { ingest_feed(&db, &client, &feed, fetch_timeout).await });
        }

        let drained = match self.config.cycle_timeout {
            Some(limit) => tokio::time::timeout(limit, join_all(&mut workers, &mut summary))
                .await
                .is_ok(),
            None => {
                join_all(&mut workers, &mut summary).await;
                true
            }
        };

        if !drained {
            tracing::warn!(
                remaining = workers.len(),
                "Cycle deadline elapsed, aborting remaining workers"
            );
            workers.abort_all();
            join_all(&mut workers, &mut summary).await;
        }

        tracing::info!(
            selected = summary.selected,
            succeeded = summary.succeeded,
            failed = summary.failed,
            crashed = summary.crashed,
            aborted = summary.aborted,
            inserted = summary.inserted,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Scrape cycle finished"
        );

        summary
    }
}

async fn join_all(workers: &mut JoinSet<IngestReport>, summary: &mut CycleSummary) {
    while let Some(joined) = workers.join_next().await {
        summary.record(joined);
    }
}
