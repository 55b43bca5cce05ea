//! Storage traits and error types
//!
//! This module defines the repository interface the archiver core consumes.
//! Every method is a self-contained write or read; multi-row writes that must
//! stay consistent (a post with its image and the thread counters) are a
//! single call.

use crate::crawler::PostData;
use crate::storage::{
    BoardRecord, ImageRecord, NewImage, PostRecord, RunOutcome, RunRecord, ThreadRecord,
};
use crate::triggers::TriggerRule;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Invalid stored value: {0}")]
    InvalidValue(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Repository interface for the archive
pub trait Storage {
    // ===== Boards =====

    /// Inserts a board or replaces its policy fields
    fn upsert_board(&mut self, board: &BoardRecord) -> StorageResult<()>;

    /// Gets a board by name
    fn get_board(&self, name: &str) -> StorageResult<Option<BoardRecord>>;

    /// Gets every board flagged active, ordered by name
    fn get_active_boards(&self) -> StorageResult<Vec<BoardRecord>>;

    // ===== Threads =====

    /// Gets a thread by board and remote number
    fn get_thread(&self, board: &str, number: i64) -> StorageResult<Option<ThreadRecord>>;

    /// Creates an empty thread record
    fn insert_thread(&mut self, board: &str, number: i64) -> StorageResult<ThreadRecord>;

    /// Sets `saved` and `auto_saved` if the thread is not saved yet
    ///
    /// Returns true if the thread changed.
    fn mark_thread_saved(&mut self, thread_id: i64) -> StorageResult<bool>;

    // ===== Posts =====

    /// Highest stored post number of a thread
    fn max_post_number(&self, thread_id: i64) -> StorageResult<Option<i64>>;

    /// Posts of a thread with a number strictly above `number`, ascending
    fn get_posts_above(&self, thread_id: i64, number: i64) -> StorageResult<Vec<PostRecord>>;

    /// `(post id, post number)` of every stored post of a thread, ascending
    fn get_post_numbers(&self, thread_id: i64) -> StorageResult<Vec<(i64, i64)>>;

    /// Inserts a post and its optional image, updating the thread counters
    ///
    /// Either everything is written or nothing is.
    fn insert_post(
        &mut self,
        thread_id: i64,
        post: &PostData,
        image: Option<&NewImage>,
    ) -> StorageResult<i64>;

    /// Deletes a post and its image row, updating the thread counters
    ///
    /// Returns the deleted image so the caller can remove its blobs.
    fn delete_post(&mut self, post_id: i64) -> StorageResult<Option<ImageRecord>>;

    /// Gets the image attached to a post
    fn get_image(&self, post_id: i64) -> StorageResult<Option<ImageRecord>>;

    /// Counts the live posts of a thread
    fn count_posts(&self, thread_id: i64) -> StorageResult<i64>;

    /// Counts the live images of a thread
    fn count_images(&self, thread_id: i64) -> StorageResult<i64>;

    // ===== Tags =====

    /// Gets the id of a tag, creating it if necessary
    fn get_or_create_tag(&mut self, name: &str) -> StorageResult<i64>;

    /// Associates a tag with a thread unless already associated
    ///
    /// Returns true if a new association was created.
    fn add_thread_tag(&mut self, thread_id: i64, tag_id: i64, automatic: bool)
        -> StorageResult<bool>;

    /// Names of the tags associated with a thread, sorted
    fn get_thread_tags(&self, thread_id: i64) -> StorageResult<Vec<String>>;

    // ===== Triggers =====

    /// Stores a trigger rule, creating its tag if needed
    fn insert_trigger(&mut self, rule: &TriggerRule) -> StorageResult<i64>;

    /// Loads the active trigger rules in id order
    ///
    /// Rows that do not describe a valid rule are skipped.
    fn get_active_triggers(&self) -> StorageResult<Vec<TriggerRule>>;

    // ===== Runs =====

    /// Opens a run record in the `running` state
    fn create_run(&mut self, board: &str, used_workers: usize) -> StorageResult<i64>;

    /// Finalizes a run record with its status and counters
    fn finish_run(&mut self, run_id: i64, outcome: &RunOutcome) -> StorageResult<()>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Most recent runs first
    fn get_recent_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>>;
}
