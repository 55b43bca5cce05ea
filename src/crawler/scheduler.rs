//! Bounded, self-replenishing pool of thread synchronisations
//!
//! This module handles:
//! - Fetching and flattening the board catalog
//! - Keeping up to `max_concurrency` `ThreadSync` tasks in flight
//! - Refilling a slot as soon as any task completes
//! - Never running two tasks for the same thread number at once
//! - Merging every finished task's statistics into the board aggregator

use crate::crawler::parser::ThreadSummary;
use crate::crawler::thread_sync::{SyncContext, SyncStatus, ThreadOutcome, ThreadSync};
use crate::state::{Stat, StatsAggregator, Timing, TrafficClass};
use crate::Result;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinSet;

/// Bookkeeping of one pass over a catalog
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolReport {
    /// Tasks launched
    pub launched: usize,
    /// Tasks that reported back, successfully or not
    pub completed: usize,
    /// Highest number of tasks in flight at any instant
    pub peak_in_flight: usize,
    /// Threads that were fetched and diffed
    pub updated: usize,
    /// Threads skipped by the threshold or staleness checks
    pub skipped: usize,
    /// Threads that could not be synchronised
    pub failed: usize,
}

/// Runs thread synchronisations for one board over a bounded pool
pub struct CrawlScheduler {
    ctx: Arc<SyncContext>,
    max_concurrency: usize,
    stats: StatsAggregator,
}

impl CrawlScheduler {
    /// Creates a scheduler; a concurrency of zero is treated as one
    pub fn new(ctx: Arc<SyncContext>, max_concurrency: usize) -> Self {
        Self {
            ctx,
            max_concurrency: max_concurrency.max(1),
            stats: StatsAggregator::new(),
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Board-level statistics merged from every completed task
    pub fn stats(&self) -> &StatsAggregator {
        &self.stats
    }

    /// Fetches the catalog and synchronises every listed thread
    ///
    /// Only a catalog failure is returned as an error.
    pub async fn run(&self) -> Result<PoolReport> {
        let summaries = self.fetch_catalog().await?;
        tracing::info!(
            board = %self.ctx.board.name,
            "Catalog lists {} threads",
            summaries.len()
        );
        Ok(self.process(summaries).await)
    }

    /// Fetches the board catalog (metadata traffic class)
    pub async fn fetch_catalog(&self) -> Result<Vec<ThreadSummary>> {
        self.ctx.limiter.wait_turn(TrafficClass::Metadata).await;

        let started = Instant::now();
        let result = self.ctx.source.fetch_catalog(&self.ctx.board.name).await;
        self.stats.add_duration(Timing::Download, started.elapsed());

        result
    }

    /// Drains `summaries` through the pool and waits for every task
    pub async fn process(&self, summaries: Vec<ThreadSummary>) -> PoolReport {
        let mut pending: VecDeque<ThreadSummary> = summaries.into();
        let mut running: HashSet<i64> = HashSet::new();
        let mut tasks: JoinSet<ThreadOutcome> = JoinSet::new();
        let mut report = PoolReport::default();

        loop {
            while tasks.len() < self.max_concurrency {
                let Some(summary) = next_launchable(&mut pending, &running) else {
                    break;
                };
                running.insert(summary.number);
                self.launch(&mut tasks, summary);
                report.launched += 1;
                report.peak_in_flight = report.peak_in_flight.max(tasks.len());
            }

            let Some(joined) = tasks.join_next().await else {
                break;
            };

            report.completed += 1;
            self.stats.add(Stat::ProcessedThreads, 1);

            match joined {
                Ok(outcome) => {
                    running.remove(&outcome.number);
                    self.stats.merge(&outcome.stats);
                    match outcome.status {
                        SyncStatus::BelowThreshold | SyncStatus::Unchanged => report.skipped += 1,
                        SyncStatus::Updated { .. } | SyncStatus::UpdatedWithErrors { .. } => {
                            report.updated += 1
                        }
                        SyncStatus::Failed(_) => report.failed += 1,
                    }
                }
                Err(e) => {
                    // Only reachable if the wrapper task itself was cancelled.
                    tracing::error!("Thread task did not complete: {}", e);
                    self.stats.add(Stat::FailedThreads, 1);
                    report.failed += 1;
                }
            }
        }

        if !pending.is_empty() {
            tracing::warn!(
                "{} catalog entries were left unprocessed",
                pending.len()
            );
        }

        report
    }

    /// Spawns a `ThreadSync`, converting a panic into a failed outcome
    fn launch(&self, tasks: &mut JoinSet<ThreadOutcome>, summary: ThreadSummary) {
        let number = summary.number;
        let sync = ThreadSync::new(Arc::clone(&self.ctx), summary);

        tasks.spawn(async move {
            match tokio::spawn(sync.run()).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(thread = number, "Thread task panicked: {}", e);
                    ThreadOutcome::aborted(number, e.to_string())
                }
            }
        });
    }
}

/// Removes and returns the first pending entry whose thread is not running
fn next_launchable(
    pending: &mut VecDeque<ThreadSummary>,
    running: &HashSet<i64>,
) -> Option<ThreadSummary> {
    let index = pending
        .iter()
        .position(|summary| !running.contains(&summary.number))?;
    pending.remove(index)
}
