//! Thread-safe run statistics
//!
//! One `StatsAggregator` is filled by each thread synchronisation and merged
//! into the board-level aggregator when that synchronisation completes. Every
//! counter is its own atomic, so concurrent increments of different counters
//! never contend and increments of one counter are never lost.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

const STAT_COUNT: usize = 8;
const TIMING_COUNT: usize = 3;

/// Counted events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stat {
    ProcessedThreads,
    AddedPosts,
    RemovedPosts,
    DownloadedImages,
    DownloadedThumbnails,
    DownloadedThreads,
    FailedThreads,
    FailedPosts,
}

impl Stat {
    pub const ALL: [Stat; STAT_COUNT] = [
        Stat::ProcessedThreads,
        Stat::AddedPosts,
        Stat::RemovedPosts,
        Stat::DownloadedImages,
        Stat::DownloadedThumbnails,
        Stat::DownloadedThreads,
        Stat::FailedThreads,
        Stat::FailedPosts,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// Accumulated durations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timing {
    /// Time spent waiting on network responses
    Download,
    /// Sleep imposed by the rate limiter
    Wait,
    /// Rate limiter sleep plus time queued for its locks
    WaitWithLock,
}

impl Timing {
    pub const ALL: [Timing; TIMING_COUNT] = [Timing::Download, Timing::Wait, Timing::WaitWithLock];

    fn index(self) -> usize {
        self as usize
    }
}

/// Concurrently updatable set of counters and durations
#[derive(Debug, Default)]
pub struct StatsAggregator {
    counters: [AtomicU64; STAT_COUNT],
    timings_nanos: [AtomicU64; TIMING_COUNT],
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `value` to a counter
    pub fn add(&self, stat: Stat, value: u64) {
        self.counters[stat.index()].fetch_add(value, Ordering::Relaxed);
    }

    /// Adds `duration` to an accumulated timing
    pub fn add_duration(&self, timing: Timing, duration: Duration) {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        self.timings_nanos[timing.index()].fetch_add(nanos, Ordering::Relaxed);
    }

    /// Current value of a counter
    pub fn get(&self, stat: Stat) -> u64 {
        self.counters[stat.index()].load(Ordering::Relaxed)
    }

    /// Current value of a timing
    pub fn get_duration(&self, timing: Timing) -> Duration {
        Duration::from_nanos(self.timings_nanos[timing.index()].load(Ordering::Relaxed))
    }

    /// Adds every field of `other` into this aggregator
    pub fn merge(&self, other: &StatsAggregator) {
        for stat in Stat::ALL {
            self.add(stat, other.get(stat));
        }
        for timing in Timing::ALL {
            self.add_duration(timing, other.get_duration(timing));
        }
    }

    /// Immutable read of all values
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            processed_threads: self.get(Stat::ProcessedThreads),
            added_posts: self.get(Stat::AddedPosts),
            removed_posts: self.get(Stat::RemovedPosts),
            downloaded_images: self.get(Stat::DownloadedImages),
            downloaded_thumbnails: self.get(Stat::DownloadedThumbnails),
            downloaded_threads: self.get(Stat::DownloadedThreads),
            failed_threads: self.get(Stat::FailedThreads),
            failed_posts: self.get(Stat::FailedPosts),
            download_time: self.get_duration(Timing::Download),
            wait_time: self.get_duration(Timing::Wait),
            wait_time_with_lock: self.get_duration(Timing::WaitWithLock),
        }
    }
}

/// Point-in-time copy of a `StatsAggregator`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub processed_threads: u64,
    pub added_posts: u64,
    pub removed_posts: u64,
    pub downloaded_images: u64,
    pub downloaded_thumbnails: u64,
    pub downloaded_threads: u64,
    pub failed_threads: u64,
    pub failed_posts: u64,
    pub download_time: Duration,
    pub wait_time: Duration,
    pub wait_time_with_lock: Duration,
}

impl StatsSnapshot {
    /// Share of the run spent in `part`, per worker, as a rounded percentage
    fn percent_of(part: Duration, total: Duration, workers: usize) -> u64 {
        let total = total.as_secs_f64();
        if total <= 0.0 || workers == 0 {
            return 0;
        }
        (part.as_secs_f64() / total * 100.0 / workers as f64).round() as u64
    }

    /// Per-worker average of the lock-inclusive wait time, in seconds
    pub fn wait_seconds_per_worker(&self, workers: usize) -> f64 {
        self.wait_time_with_lock.as_secs_f64() / workers.max(1) as f64
    }

    /// Per-worker average of the download time, in seconds
    pub fn download_seconds_per_worker(&self, workers: usize) -> f64 {
        self.download_time.as_secs_f64() / workers.max(1) as f64
    }

    /// One-line human readable summary of a board run
    pub fn summary_text(&self, total_time: Duration, workers: usize) -> String {
        format!(
            "Time passed: {:.2} seconds ({}% waiting, {}% downloading files) \
             Processed threads: {} Added posts: {} Removed posts: {} \
             Downloaded images: {} Downloaded thumbnails: {} Downloaded threads: {} \
             Failed threads: {}",
            total_time.as_secs_f64(),
            Self::percent_of(self.wait_time_with_lock, total_time, workers),
            Self::percent_of(self.download_time, total_time, workers),
            self.processed_threads,
            self.added_posts,
            self.removed_posts,
            self.downloaded_images,
            self.downloaded_thumbnails,
            self.downloaded_threads,
            self.failed_threads,
        )
    }
}
