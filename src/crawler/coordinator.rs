//! Archiver coordinator - board run orchestration
//!
//! This module ties the pieces of one crawl together:
//! - Opening the archive and registering the configured boards
//! - Loading the trigger rules once per board run
//! - Running the `CrawlScheduler` with a fresh `RateLimiter`
//! - Opening and finalizing the run record of every board

use crate::config::Config;
use crate::crawler::fetcher::{ContentSource, HttpContentSource};
use crate::crawler::scheduler::{CrawlScheduler, PoolReport};
use crate::crawler::thread_sync::SyncContext;
use crate::state::{RateLimiter, StatsSnapshot, Timing};
use crate::storage::{
    lock_storage, open_storage, BlobStore, BoardRecord, LocalBlobStore, RunOutcome, RunStatus,
    SharedStorage, SqliteStorage, Storage, StorageError,
};
use crate::triggers::TriggerEngine;
use crate::Result;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Summary of one board run, as recorded in the run table
#[derive(Debug, Clone)]
pub struct RunReport {
    pub board: String,
    /// Id of the run record, absent if it could not be created
    pub run_id: Option<i64>,
    pub status: RunStatus,
    pub workers: usize,
    pub total_time: Duration,
    pub stats: StatsSnapshot,
    pub pool: PoolReport,
    pub error: Option<String>,
}

impl RunReport {
    /// One-line human readable summary
    pub fn summary_text(&self) -> String {
        self.stats.summary_text(self.total_time, self.workers)
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Completed
    }
}

/// Main archiver structure
pub struct Archiver {
    config: Arc<Config>,
    storage: SharedStorage,
    source: Arc<dyn ContentSource>,
    blobs: Arc<dyn BlobStore>,
}

impl Archiver {
    /// Creates an archiver backed by the configured database, media root and HTTP API
    ///
    /// # Arguments
    ///
    /// * `config` - The archiver configuration
    ///
    /// # Returns
    ///
    /// * `Ok(Archiver)` - Successfully created archiver
    /// * `Err(ArchiveError)` - Failed to open the database or build the HTTP client
    pub fn new(config: Config) -> Result<Self> {
        let storage = open_storage(Path::new(&config.output.database_path))?;
        let source = HttpContentSource::from_config(&config)?;
        let blobs = LocalBlobStore::new(&config.output.media_root);

        Self::with_parts(config, storage, Arc::new(source), Arc::new(blobs))
    }

    /// Creates an archiver from explicit collaborators
    ///
    /// The boards listed in the configuration are registered in `storage`.
    pub fn with_parts(
        config: Config,
        mut storage: SqliteStorage,
        source: Arc<dyn ContentSource>,
        blobs: Arc<dyn BlobStore>,
    ) -> Result<Self> {
        for entry in &config.boards {
            storage.upsert_board(&BoardRecord::from(entry))?;
        }

        Ok(Self {
            config: Arc::new(config),
            storage: Arc::new(Mutex::new(storage)),
            source,
            blobs,
        })
    }

    /// Handle to the archive database
    pub fn storage(&self) -> SharedStorage {
        Arc::clone(&self.storage)
    }

    /// Runs one crawl of every active board, sequentially
    pub async fn run_all(&self) -> Result<Vec<RunReport>> {
        let boards = lock_storage(&self.storage)?.get_active_boards()?;
        if boards.is_empty() {
            tracing::warn!("No active boards to archive");
        }

        let mut reports = Vec::with_capacity(boards.len());
        for board in &boards {
            reports.push(self.run_board(board).await);
        }
        Ok(reports)
    }

    /// Runs one crawl of the board called `name`
    pub async fn run_board_named(&self, name: &str) -> Result<RunReport> {
        let board = lock_storage(&self.storage)?
            .get_board(name)?
            .ok_or_else(|| StorageError::NotFound(format!("board {}", name)))?;
        Ok(self.run_board(&board).await)
    }

    /// Runs one crawl of a board
    ///
    /// Never fails: every problem ends up in the report's status and error.
    pub async fn run_board(&self, board: &BoardRecord) -> RunReport {
        let workers = self.config.scraper.max_concurrency.max(1);
        let started = Instant::now();

        tracing::info!(board = %board.name, "Starting board run with {} workers", workers);

        let run_id = match lock_storage(&self.storage).and_then(|mut s| s.create_run(&board.name, workers)) {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::error!(board = %board.name, "Failed to create run record: {}", e);
                None
            }
        };

        let limiter = Arc::new(RateLimiter::from_config(&self.config.scraper));

        let (status, stats, pool, error) = match self.load_triggers() {
            Ok(triggers) => {
                let ctx = Arc::new(SyncContext {
                    board: board.clone(),
                    source: Arc::clone(&self.source),
                    storage: Arc::clone(&self.storage),
                    blobs: Arc::clone(&self.blobs),
                    limiter: Arc::clone(&limiter),
                    triggers: Arc::new(triggers),
                });
                let scheduler = CrawlScheduler::new(ctx, workers);
                let result = scheduler.run().await;

                scheduler
                    .stats()
                    .add_duration(Timing::Wait, limiter.sleep_time());
                scheduler
                    .stats()
                    .add_duration(Timing::WaitWithLock, limiter.wait_time_with_lock());
                let stats = scheduler.stats().snapshot();

                match result {
                    Ok(pool) => (RunStatus::Completed, stats, pool, None),
                    Err(e) => {
                        tracing::error!(board = %board.name, "Catalog fetch failed: {}", e);
                        (RunStatus::Failed, stats, PoolReport::default(), Some(e.to_string()))
                    }
                }
            }
            Err(e) => {
                tracing::error!(board = %board.name, "Failed to load triggers: {}", e);
                (
                    RunStatus::Failed,
                    StatsSnapshot::default(),
                    PoolReport::default(),
                    Some(e.to_string()),
                )
            }
        };

        let report = RunReport {
            board: board.name.clone(),
            run_id,
            status,
            workers,
            total_time: started.elapsed(),
            stats,
            pool,
            error,
        };

        if let Some(run_id) = run_id {
            self.finish_run(run_id, &report);
        }

        tracing::info!(board = %board.name, "{}", report.summary_text());
        report
    }

    fn load_triggers(&self) -> Result<TriggerEngine> {
        let rules = lock_storage(&self.storage)?.get_active_triggers()?;
        tracing::debug!("Loaded {} active triggers", rules.len());
        Ok(TriggerEngine::new(rules))
    }

    fn finish_run(&self, run_id: i64, report: &RunReport) {
        let outcome = RunOutcome {
            status: report.status,
            total_time: report.total_time,
            used_workers: report.workers,
            stats: report.stats.clone(),
            error_message: report.error.clone(),
        };

        let finished = lock_storage(&self.storage).and_then(|mut s| s.finish_run(run_id, &outcome));
        if let Err(e) = finished {
            tracing::error!(run_id, "Failed to finalize run record: {}", e);
        }
    }
}
