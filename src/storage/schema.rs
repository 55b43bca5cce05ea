//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the archive database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Archived boards and their crawl policy
CREATE TABLE IF NOT EXISTS boards (
    name TEXT PRIMARY KEY,
    active INTEGER NOT NULL DEFAULT 1,
    retention_hours INTEGER NOT NULL DEFAULT 48,
    reply_threshold INTEGER NOT NULL DEFAULT 20
);

-- Archived threads with denormalized counters
CREATE TABLE IF NOT EXISTS threads (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    board TEXT NOT NULL REFERENCES boards(name),
    number INTEGER NOT NULL,
    saved INTEGER NOT NULL DEFAULT 0,
    auto_saved INTEGER NOT NULL DEFAULT 0,
    reply_count INTEGER NOT NULL DEFAULT 0,
    image_count INTEGER NOT NULL DEFAULT 0,
    first_reply TEXT,
    last_reply TEXT,
    UNIQUE(board, number)
);

CREATE INDEX IF NOT EXISTS idx_threads_last_reply ON threads(last_reply);

-- Archived posts
CREATE TABLE IF NOT EXISTS posts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    thread_id INTEGER NOT NULL REFERENCES threads(id) ON DELETE CASCADE,
    number INTEGER NOT NULL,
    time TEXT NOT NULL,
    name TEXT NOT NULL,
    trip TEXT NOT NULL,
    email TEXT NOT NULL,
    country TEXT NOT NULL,
    subject TEXT NOT NULL,
    comment TEXT NOT NULL,
    saved_at TEXT NOT NULL,
    UNIQUE(thread_id, number)
);

-- Images attached to posts
CREATE TABLE IF NOT EXISTS images (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    post_id INTEGER NOT NULL UNIQUE REFERENCES posts(id) ON DELETE CASCADE,
    original_name TEXT NOT NULL,
    image_path TEXT NOT NULL,
    thumbnail_path TEXT NOT NULL
);

-- Tag master records
CREATE TABLE IF NOT EXISTS tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

-- Tag associations
CREATE TABLE IF NOT EXISTS thread_tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    thread_id INTEGER NOT NULL REFERENCES threads(id) ON DELETE CASCADE,
    tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
    automatically_added INTEGER NOT NULL DEFAULT 0,
    saved_at TEXT NOT NULL,
    UNIQUE(thread_id, tag_id)
);

-- Declarative trigger rules
CREATE TABLE IF NOT EXISTS triggers (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    field TEXT NOT NULL,
    event TEXT NOT NULL,
    phrase TEXT NOT NULL,
    case_sensitive INTEGER NOT NULL DEFAULT 1,
    post_type TEXT NOT NULL DEFAULT 'any',
    save_thread INTEGER NOT NULL DEFAULT 0,
    tag_id INTEGER REFERENCES tags(id) ON DELETE SET NULL,
    active INTEGER NOT NULL DEFAULT 1
);

-- Crawl run audit trail
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    board TEXT NOT NULL,
    status TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    used_workers INTEGER NOT NULL,
    total_time REAL NOT NULL DEFAULT 0,
    wait_time REAL NOT NULL DEFAULT 0,
    download_time REAL NOT NULL DEFAULT 0,
    processed_threads INTEGER NOT NULL DEFAULT 0,
    added_posts INTEGER NOT NULL DEFAULT 0,
    removed_posts INTEGER NOT NULL DEFAULT 0,
    downloaded_images INTEGER NOT NULL DEFAULT 0,
    downloaded_thumbnails INTEGER NOT NULL DEFAULT 0,
    downloaded_threads INTEGER NOT NULL DEFAULT 0,
    failed_threads INTEGER NOT NULL DEFAULT 0,
    error_message TEXT
);

CREATE INDEX IF NOT EXISTS idx_runs_board ON runs(board);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
