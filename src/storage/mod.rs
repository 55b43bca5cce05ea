//! Storage module for persisting the archive
//!
//! This module handles all persistence for the archiver, including:
//! - SQLite database initialization and schema management
//! - Board, thread, post and image records with denormalized thread counters
//! - Tags, trigger rules and the crawl run audit trail
//! - Blob storage for downloaded images and thumbnails

mod blob;
mod schema;
mod sqlite;
mod traits;

pub use blob::{sanitize_filename, BlobStore, LocalBlobStore};
pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::config::BoardEntry;
use crate::state::StatsSnapshot;
use chrono::{DateTime, Utc};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// Storage handle shared by concurrent workers
///
/// The lock is only ever held for synchronous database calls, never across
/// an `.await`.
pub type SharedStorage = Arc<Mutex<SqliteStorage>>;

/// Locks the shared storage for a synchronous call
pub fn lock_storage(storage: &SharedStorage) -> StorageResult<MutexGuard<'_, SqliteStorage>> {
    storage
        .lock()
        .map_err(|_| StorageError::Database("storage lock poisoned".to_string()))
}

/// Opens (or creates) the archive database at `path`, creating its directory
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    SqliteStorage::new(path)
}

/// An archived board and its crawl policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardRecord {
    pub name: String,
    pub active: bool,
    /// Hours unsaved threads are kept; 0 keeps them forever
    pub retention_hours: u32,
    /// Minimum catalog reply count before a thread is archived
    pub reply_threshold: u32,
}

impl BoardRecord {
    pub fn new(name: &str, active: bool, retention_hours: u32, reply_threshold: u32) -> Self {
        Self {
            name: name.to_string(),
            active,
            retention_hours,
            reply_threshold,
        }
    }
}

impl From<&BoardEntry> for BoardRecord {
    fn from(entry: &BoardEntry) -> Self {
        Self::new(
            &entry.name,
            entry.active,
            entry.retention_hours,
            entry.reply_threshold,
        )
    }
}

/// An archived thread with its denormalized counters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadRecord {
    pub id: i64,
    pub board: String,
    /// Remote thread number (equal to the opening post's number)
    pub number: i64,
    pub saved: bool,
    pub auto_saved: bool,
    /// Number of stored posts, opening post included
    pub reply_count: i64,
    /// Number of stored images
    pub image_count: i64,
    pub first_reply: Option<DateTime<Utc>>,
    pub last_reply: Option<DateTime<Utc>>,
}

impl ThreadRecord {
    /// Stored reply count in the catalog's convention, which does not count
    /// the opening post
    pub fn replies_excluding_first_post(&self) -> i64 {
        self.reply_count - 1
    }
}

/// An archived post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRecord {
    pub id: i64,
    pub thread_id: i64,
    pub number: i64,
    pub time: DateTime<Utc>,
    pub name: String,
    pub trip: String,
    pub email: String,
    pub country: String,
    pub subject: String,
    pub comment: String,
}

/// Image attached to a post, referencing two blobs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    pub id: i64,
    pub post_id: i64,
    pub original_name: String,
    /// Blob path of the full image, relative to the media root
    pub image_path: String,
    /// Blob path of the thumbnail, relative to the media root
    pub thumbnail_path: String,
}

/// Image data for a post about to be inserted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewImage {
    pub original_name: String,
    pub image_path: String,
    pub thumbnail_path: String,
}

/// Represents a crawl run of one board
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub board: String,
    pub status: RunStatus,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub used_workers: u32,
    /// Wall-clock duration in seconds
    pub total_time: f64,
    /// Per-worker rate limiter wait in seconds
    pub wait_time: f64,
    /// Per-worker network time in seconds
    pub download_time: f64,
    pub processed_threads: u64,
    pub added_posts: u64,
    pub removed_posts: u64,
    pub downloaded_images: u64,
    pub downloaded_thumbnails: u64,
    pub downloaded_threads: u64,
    pub failed_threads: u64,
    pub error_message: Option<String>,
}

/// Final figures written to a run record
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub total_time: Duration,
    pub used_workers: usize,
    pub stats: StatsSnapshot,
    pub error_message: Option<String>,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_roundtrip() {
        for status in &[RunStatus::Running, RunStatus::Completed, RunStatus::Failed] {
            let db_str = status.to_db_string();
            let parsed = RunStatus::from_db_string(db_str);
            assert_eq!(Some(*status), parsed);
        }
    }

    #[test]
    fn test_run_status_invalid() {
        assert_eq!(RunStatus::from_db_string("interrupted"), None);
    }

    #[test]
    fn test_replies_excluding_first_post() {
        let thread = ThreadRecord {
            id: 1,
            board: "g".to_string(),
            number: 100,
            saved: false,
            auto_saved: false,
            reply_count: 6,
            image_count: 2,
            first_reply: None,
            last_reply: None,
        };
        assert_eq!(thread.replies_excluding_first_post(), 5);
    }

    #[test]
    fn test_board_record_from_entry() {
        let entry = BoardEntry {
            name: "g".to_string(),
            active: false,
            retention_hours: 0,
            reply_threshold: 3,
        };
        assert_eq!(BoardRecord::from(&entry), BoardRecord::new("g", false, 0, 3));
    }
}
