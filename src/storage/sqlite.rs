//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::crawler::PostData;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{
    BoardRecord, ImageRecord, NewImage, PostRecord, RunOutcome, RunRecord, RunStatus,
    ThreadRecord,
};
use crate::triggers::{PostField, PostTypeScope, TriggerEvent, TriggerRule};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const THREAD_COLUMNS: &str = "id, board, number, saved, auto_saved, reply_count, image_count, \
     first_reply, last_reply";

const RUN_COLUMNS: &str = "id, board, status, started_at, finished_at, used_workers, total_time, \
     wait_time, download_time, processed_threads, added_posts, removed_posts, \
     downloaded_images, downloaded_thumbnails, downloaded_threads, failed_threads, error_message";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn get_thread_by_id(&self, thread_id: i64) -> StorageResult<ThreadRecord> {
        let sql = format!("SELECT {} FROM threads WHERE id = ?1", THREAD_COLUMNS);
        self.conn
            .query_row(&sql, params![thread_id], thread_from_row)
            .optional()?
            .ok_or_else(|| StorageError::NotFound(format!("thread id {}", thread_id)))
    }
}

/// Formats a timestamp so that lexical order matches chronological order
fn format_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_time(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|time| time.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_optional_time(idx: usize, value: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    value.map(|value| parse_time(idx, &value)).transpose()
}

fn thread_from_row(row: &Row<'_>) -> rusqlite::Result<ThreadRecord> {
    Ok(ThreadRecord {
        id: row.get(0)?,
        board: row.get(1)?,
        number: row.get(2)?,
        saved: row.get(3)?,
        auto_saved: row.get(4)?,
        reply_count: row.get(5)?,
        image_count: row.get(6)?,
        first_reply: parse_optional_time(7, row.get(7)?)?,
        last_reply: parse_optional_time(8, row.get(8)?)?,
    })
}

fn post_from_row(row: &Row<'_>) -> rusqlite::Result<PostRecord> {
    Ok(PostRecord {
        id: row.get(0)?,
        thread_id: row.get(1)?,
        number: row.get(2)?,
        time: parse_time(3, &row.get::<_, String>(3)?)?,
        name: row.get(4)?,
        trip: row.get(5)?,
        email: row.get(6)?,
        country: row.get(7)?,
        subject: row.get(8)?,
        comment: row.get(9)?,
    })
}

fn image_from_row(row: &Row<'_>) -> rusqlite::Result<ImageRecord> {
    Ok(ImageRecord {
        id: row.get(0)?,
        post_id: row.get(1)?,
        original_name: row.get(2)?,
        image_path: row.get(3)?,
        thumbnail_path: row.get(4)?,
    })
}

fn board_from_row(row: &Row<'_>) -> rusqlite::Result<BoardRecord> {
    Ok(BoardRecord {
        name: row.get(0)?,
        active: row.get(1)?,
        retention_hours: row.get(2)?,
        reply_threshold: row.get(3)?,
    })
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        board: row.get(1)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(2)?).unwrap_or(RunStatus::Failed),
        started_at: row.get(3)?,
        finished_at: row.get(4)?,
        used_workers: row.get(5)?,
        total_time: row.get(6)?,
        wait_time: row.get(7)?,
        download_time: row.get(8)?,
        processed_threads: row.get(9)?,
        added_posts: row.get(10)?,
        removed_posts: row.get(11)?,
        downloaded_images: row.get(12)?,
        downloaded_thumbnails: row.get(13)?,
        downloaded_threads: row.get(14)?,
        failed_threads: row.get(15)?,
        error_message: row.get(16)?,
    })
}

/// Raw trigger row, validated after the query
struct TriggerRow {
    id: i64,
    field: String,
    event: String,
    phrase: String,
    case_sensitive: bool,
    post_type: String,
    save_thread: bool,
    tag: Option<String>,
    active: bool,
}

impl TriggerRow {
    fn into_rule(self) -> Option<TriggerRule> {
        Some(TriggerRule {
            id: self.id,
            field: PostField::from_db_string(&self.field)?,
            event: TriggerEvent::from_db_string(&self.event)?,
            phrase: self.phrase,
            case_sensitive: self.case_sensitive,
            post_type: PostTypeScope::from_db_string(&self.post_type)?,
            save_thread: self.save_thread,
            tag: self.tag,
            active: self.active,
        })
    }
}

impl Storage for SqliteStorage {
    // ===== Boards =====

    fn upsert_board(&mut self, board: &BoardRecord) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO boards (name, active, retention_hours, reply_threshold)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(name) DO UPDATE SET
                active = excluded.active,
                retention_hours = excluded.retention_hours,
                reply_threshold = excluded.reply_threshold",
            params![
                board.name,
                board.active,
                board.retention_hours,
                board.reply_threshold
            ],
        )?;
        Ok(())
    }

    fn get_board(&self, name: &str) -> StorageResult<Option<BoardRecord>> {
        let board = self
            .conn
            .query_row(
                "SELECT name, active, retention_hours, reply_threshold FROM boards WHERE name = ?1",
                params![name],
                board_from_row,
            )
            .optional()?;
        Ok(board)
    }

    fn get_active_boards(&self) -> StorageResult<Vec<BoardRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT name, active, retention_hours, reply_threshold
             FROM boards WHERE active = 1 ORDER BY name",
        )?;
        let boards = stmt
            .query_map([], board_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(boards)
    }

    // ===== Threads =====

    fn get_thread(&self, board: &str, number: i64) -> StorageResult<Option<ThreadRecord>> {
        let sql = format!(
            "SELECT {} FROM threads WHERE board = ?1 AND number = ?2",
            THREAD_COLUMNS
        );
        let thread = self
            .conn
            .query_row(&sql, params![board, number], thread_from_row)
            .optional()?;
        Ok(thread)
    }

    fn insert_thread(&mut self, board: &str, number: i64) -> StorageResult<ThreadRecord> {
        self.conn.execute(
            "INSERT INTO threads (board, number) VALUES (?1, ?2)",
            params![board, number],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_thread_by_id(id)
    }

    fn mark_thread_saved(&mut self, thread_id: i64) -> StorageResult<bool> {
        let changed = self.conn.execute(
            "UPDATE threads SET saved = 1, auto_saved = 1 WHERE id = ?1 AND saved = 0",
            params![thread_id],
        )?;
        Ok(changed > 0)
    }

    // ===== Posts =====

    fn max_post_number(&self, thread_id: i64) -> StorageResult<Option<i64>> {
        let max = self.conn.query_row(
            "SELECT MAX(number) FROM posts WHERE thread_id = ?1",
            params![thread_id],
            |row| row.get(0),
        )?;
        Ok(max)
    }

    fn get_posts_above(&self, thread_id: i64, number: i64) -> StorageResult<Vec<PostRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, thread_id, number, time, name, trip, email, country, subject, comment
             FROM posts WHERE thread_id = ?1 AND number > ?2 ORDER BY number",
        )?;
        let posts = stmt
            .query_map(params![thread_id, number], post_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(posts)
    }

    fn get_post_numbers(&self, thread_id: i64) -> StorageResult<Vec<(i64, i64)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, number FROM posts WHERE thread_id = ?1 ORDER BY number")?;
        let numbers = stmt
            .query_map(params![thread_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(numbers)
    }

    fn insert_post(
        &mut self,
        thread_id: i64,
        post: &PostData,
        image: Option<&NewImage>,
    ) -> StorageResult<i64> {
        let tx = self.conn.transaction()?;

        let (first_reply, last_reply): (Option<String>, Option<String>) = tx
            .query_row(
                "SELECT first_reply, last_reply FROM threads WHERE id = ?1",
                params![thread_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?
            .ok_or_else(|| StorageError::NotFound(format!("thread id {}", thread_id)))?;
        let first_reply = parse_optional_time(0, first_reply)?;
        let last_reply = parse_optional_time(1, last_reply)?;

        tx.execute(
            "INSERT INTO posts (thread_id, number, time, name, trip, email, country, subject, comment, saved_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                thread_id,
                post.number,
                format_time(&post.time),
                post.name,
                post.trip,
                post.email,
                post.country,
                post.subject,
                post.comment,
                format_time(&Utc::now()),
            ],
        )?;
        let post_id = tx.last_insert_rowid();

        if let Some(image) = image {
            tx.execute(
                "INSERT INTO images (post_id, original_name, image_path, thumbnail_path)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    post_id,
                    image.original_name,
                    image.image_path,
                    image.thumbnail_path
                ],
            )?;
        }

        let first_reply = first_reply.map_or(post.time, |first| first.min(post.time));
        let last_reply = last_reply.map_or(post.time, |last| last.max(post.time));

        tx.execute(
            "UPDATE threads SET
                reply_count = reply_count + 1,
                image_count = image_count + ?1,
                first_reply = ?2,
                last_reply = ?3
             WHERE id = ?4",
            params![
                i64::from(image.is_some()),
                format_time(&first_reply),
                format_time(&last_reply),
                thread_id
            ],
        )?;

        tx.commit()?;
        Ok(post_id)
    }

    fn delete_post(&mut self, post_id: i64) -> StorageResult<Option<ImageRecord>> {
        let tx = self.conn.transaction()?;

        let thread_id: i64 = tx
            .query_row(
                "SELECT thread_id FROM posts WHERE id = ?1",
                params![post_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| StorageError::NotFound(format!("post id {}", post_id)))?;

        let image = tx
            .query_row(
                "SELECT id, post_id, original_name, image_path, thumbnail_path
                 FROM images WHERE post_id = ?1",
                params![post_id],
                image_from_row,
            )
            .optional()?;

        if image.is_some() {
            tx.execute("DELETE FROM images WHERE post_id = ?1", params![post_id])?;
        }
        tx.execute("DELETE FROM posts WHERE id = ?1", params![post_id])?;

        // Bounds shrink to the remaining posts; fixed-width UTC text sorts chronologically.
        tx.execute(
            "UPDATE threads SET
                reply_count = reply_count - 1,
                image_count = image_count - ?1,
                first_reply = (SELECT MIN(time) FROM posts WHERE thread_id = ?2),
                last_reply = (SELECT MAX(time) FROM posts WHERE thread_id = ?2)
             WHERE id = ?2",
            params![i64::from(image.is_some()), thread_id],
        )?;

        tx.commit()?;
        Ok(image)
    }

    fn get_image(&self, post_id: i64) -> StorageResult<Option<ImageRecord>> {
        let image = self
            .conn
            .query_row(
                "SELECT id, post_id, original_name, image_path, thumbnail_path
                 FROM images WHERE post_id = ?1",
                params![post_id],
                image_from_row,
            )
            .optional()?;
        Ok(image)
    }

    fn count_posts(&self, thread_id: i64) -> StorageResult<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM posts WHERE thread_id = ?1",
            params![thread_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn count_images(&self, thread_id: i64) -> StorageResult<i64> {
        let count = self.conn.query_row(
            "SELECT COUNT(*) FROM images i JOIN posts p ON p.id = i.post_id WHERE p.thread_id = ?1",
            params![thread_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // ===== Tags =====

    fn get_or_create_tag(&mut self, name: &str) -> StorageResult<i64> {
        self.conn.execute(
            "INSERT OR IGNORE INTO tags (name) VALUES (?1)",
            params![name],
        )?;
        let id = self.conn.query_row(
            "SELECT id FROM tags WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn add_thread_tag(
        &mut self,
        thread_id: i64,
        tag_id: i64,
        automatic: bool,
    ) -> StorageResult<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO thread_tags (thread_id, tag_id, automatically_added, saved_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![thread_id, tag_id, automatic, format_time(&Utc::now())],
        )?;
        Ok(inserted > 0)
    }

    fn get_thread_tags(&self, thread_id: i64) -> StorageResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT t.name FROM thread_tags tt JOIN tags t ON t.id = tt.tag_id
             WHERE tt.thread_id = ?1 ORDER BY t.name",
        )?;
        let tags = stmt
            .query_map(params![thread_id], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tags)
    }

    // ===== Triggers =====

    fn insert_trigger(&mut self, rule: &TriggerRule) -> StorageResult<i64> {
        let tag_id = match &rule.tag {
            Some(name) => Some(self.get_or_create_tag(name)?),
            None => None,
        };

        self.conn.execute(
            "INSERT INTO triggers (field, event, phrase, case_sensitive, post_type, save_thread, tag_id, active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                rule.field.to_db_string(),
                rule.event.to_db_string(),
                rule.phrase,
                rule.case_sensitive,
                rule.post_type.to_db_string(),
                rule.save_thread,
                tag_id,
                rule.active,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_active_triggers(&self) -> StorageResult<Vec<TriggerRule>> {
        let mut stmt = self.conn.prepare(
            "SELECT tr.id, tr.field, tr.event, tr.phrase, tr.case_sensitive, tr.post_type,
                    tr.save_thread, t.name, tr.active
             FROM triggers tr LEFT JOIN tags t ON t.id = tr.tag_id
             WHERE tr.active = 1 ORDER BY tr.id",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok(TriggerRow {
                    id: row.get(0)?,
                    field: row.get(1)?,
                    event: row.get(2)?,
                    phrase: row.get(3)?,
                    case_sensitive: row.get(4)?,
                    post_type: row.get(5)?,
                    save_thread: row.get(6)?,
                    tag: row.get(7)?,
                    active: row.get(8)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut rules = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row.id;
            match row.into_rule() {
                Some(rule) => rules.push(rule),
                None => tracing::warn!(trigger = id, "Skipping trigger with unrecognised settings"),
            }
        }
        Ok(rules)
    }

    // ===== Runs =====

    fn create_run(&mut self, board: &str, used_workers: usize) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (board, status, started_at, used_workers) VALUES (?1, ?2, ?3, ?4)",
            params![
                board,
                RunStatus::Running.to_db_string(),
                now,
                used_workers as i64
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(&mut self, run_id: i64, outcome: &RunOutcome) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let stats = &outcome.stats;
        let updated = self.conn.execute(
            "UPDATE runs SET
                status = ?1, finished_at = ?2, used_workers = ?3, total_time = ?4,
                wait_time = ?5, download_time = ?6, processed_threads = ?7,
                added_posts = ?8, removed_posts = ?9, downloaded_images = ?10,
                downloaded_thumbnails = ?11, downloaded_threads = ?12,
                failed_threads = ?13, error_message = ?14
             WHERE id = ?15",
            params![
                outcome.status.to_db_string(),
                now,
                outcome.used_workers as i64,
                outcome.total_time.as_secs_f64(),
                stats.wait_seconds_per_worker(outcome.used_workers),
                stats.download_seconds_per_worker(outcome.used_workers),
                stats.processed_threads as i64,
                stats.added_posts as i64,
                stats.removed_posts as i64,
                stats.downloaded_images as i64,
                stats.downloaded_thumbnails as i64,
                stats.downloaded_threads as i64,
                stats.failed_threads as i64,
                outcome.error_message,
                run_id,
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::NotFound(format!("run id {}", run_id)));
        }
        Ok(())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let sql = format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS);
        self.conn
            .query_row(&sql, params![run_id], run_from_row)
            .optional()?
            .ok_or_else(|| StorageError::NotFound(format!("run id {}", run_id)))
    }

    fn get_recent_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>> {
        let sql = format!("SELECT {} FROM runs ORDER BY id DESC LIMIT ?1", RUN_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let runs = stmt
            .query_map(params![limit as i64], run_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(runs)
    }
}
