//! Run history reporting from the archive database
//!
//! This module provides functionality for extracting and displaying
//! recent crawl runs from the storage layer.

use crate::storage::{RunRecord, RunStatus, Storage};
use crate::Result;

/// Recent crawl runs, newest first
#[derive(Debug, Clone)]
pub struct RunHistory {
    pub runs: Vec<RunRecord>,
}

impl RunHistory {
    /// Number of runs that ended in failure
    pub fn failed_runs(&self) -> usize {
        self.runs
            .iter()
            .filter(|run| run.status == RunStatus::Failed)
            .count()
    }

    /// Posts added over all listed runs
    pub fn total_added_posts(&self) -> u64 {
        self.runs.iter().map(|run| run.added_posts).sum()
    }
}

/// Loads the `limit` most recent runs
///
/// # Arguments
///
/// * `storage` - The storage backend to query
/// * `limit` - Maximum number of runs to load
pub fn load_history(storage: &dyn Storage, limit: usize) -> Result<RunHistory> {
    let runs = storage.get_recent_runs(limit)?;
    Ok(RunHistory { runs })
}

/// Formats one run as a single line
pub fn format_run_line(run: &RunRecord) -> String {
    let mut line = format!(
        "#{} /{}/ {} started {} | {:.2}s, {} workers | threads {} (failed {}) | posts +{} -{} | images {} thumbnails {}",
        run.id,
        run.board,
        run.status.to_db_string(),
        run.started_at,
        run.total_time,
        run.used_workers,
        run.processed_threads,
        run.failed_threads,
        run.added_posts,
        run.removed_posts,
        run.downloaded_images,
        run.downloaded_thumbnails,
    );

    if let Some(error) = &run.error_message {
        line.push_str(&format!(" | error: {}", error));
    }

    line
}

/// Prints the run history to stdout
pub fn print_history(history: &RunHistory) {
    println!("=== Crawl History ===\n");

    if history.runs.is_empty() {
        println!("No runs recorded yet.");
        return;
    }

    for run in &history.runs {
        println!("{}", format_run_line(run));
    }

    println!();
    println!(
        "{} runs listed, {} failed, {} posts added",
        history.runs.len(),
        history.failed_runs(),
        history.total_added_posts()
    );
}
