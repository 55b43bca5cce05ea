//! Synchronisation of one remote thread with the archive
//!
//! A `ThreadSync` is created per catalog entry and driven once. It decides
//! whether the thread needs fetching, fetches it, inserts the posts that are
//! new (downloading their media and running the triggers), then deletes the
//! stored posts that disappeared remotely.

use crate::crawler::fetcher::ContentSource;
use crate::crawler::parser::{Attachment, PostData, ThreadSummary};
use crate::state::{RateLimiter, Stat, StatsAggregator, Timing, TrafficClass};
use crate::storage::{
    lock_storage, sanitize_filename, BlobStore, BoardRecord, NewImage, SharedStorage, Storage,
    ThreadRecord,
};
use crate::triggers::TriggerEngine;
use crate::{ArchiveError, Result};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

/// Resources shared by every thread synchronisation of a board run
pub struct SyncContext {
    pub board: BoardRecord,
    pub source: Arc<dyn ContentSource>,
    pub storage: SharedStorage,
    pub blobs: Arc<dyn BlobStore>,
    pub limiter: Arc<RateLimiter>,
    pub triggers: Arc<TriggerEngine>,
}

/// How a thread synchronisation ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStatus {
    /// Not enough replies to be archived
    BelowThreshold,
    /// The catalog entry matches the stored thread; nothing was fetched
    Unchanged,
    /// The thread was fetched and diffed
    Updated { added: u64, removed: u64 },
    /// The thread was fetched but some posts could not be stored or removed
    UpdatedWithErrors {
        added: u64,
        removed: u64,
        failed: u64,
    },
    /// The thread could not be synchronised this cycle
    Failed(String),
}

impl SyncStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Result of one `ThreadSync`, with the statistics it gathered
#[derive(Debug)]
pub struct ThreadOutcome {
    pub number: i64,
    pub status: SyncStatus,
    pub stats: StatsAggregator,
}

impl ThreadOutcome {
    /// Outcome of a synchronisation task that died before reporting
    pub fn aborted(number: i64, reason: String) -> Self {
        let stats = StatsAggregator::new();
        stats.add(Stat::FailedThreads, 1);
        Self {
            number,
            status: SyncStatus::Failed(reason),
            stats,
        }
    }
}

#[derive(Debug, Default)]
struct DiffCounts {
    added: u64,
    removed: u64,
    failed: u64,
}

/// Brings one stored thread up to date with its remote counterpart
pub struct ThreadSync {
    ctx: Arc<SyncContext>,
    summary: ThreadSummary,
    stats: StatsAggregator,
}

impl ThreadSync {
    pub fn new(ctx: Arc<SyncContext>, summary: ThreadSummary) -> Self {
        Self {
            ctx,
            summary,
            stats: StatsAggregator::new(),
        }
    }

    /// Runs the synchronisation; errors are contained in the returned status
    pub async fn run(self) -> ThreadOutcome {
        let status = match self.sync().await {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(
                    board = %self.ctx.board.name,
                    thread = self.summary.number,
                    "Thread skipped this cycle: {}",
                    e
                );
                self.stats.add(Stat::FailedThreads, 1);
                SyncStatus::Failed(e.to_string())
            }
        };

        ThreadOutcome {
            number: self.summary.number,
            status,
            stats: self.stats,
        }
    }

    async fn sync(&self) -> Result<SyncStatus> {
        let board = &self.ctx.board;

        if self.summary.replies < i64::from(board.reply_threshold) {
            return Ok(SyncStatus::BelowThreshold);
        }

        let existing = lock_storage(&self.ctx.storage)?.get_thread(&board.name, self.summary.number)?;
        if let Some(thread) = &existing {
            if self.is_unchanged(thread) {
                tracing::trace!(thread = thread.number, "Thread unchanged");
                return Ok(SyncStatus::Unchanged);
            }
        }

        let posts = self.fetch_posts().await?;

        let thread = match existing {
            Some(thread) => thread,
            None => lock_storage(&self.ctx.storage)?.insert_thread(&board.name, self.summary.number)?,
        };

        let counts = self.apply_diff(&thread, posts).await?;

        if counts.added > 0 || counts.removed > 0 {
            tracing::debug!(
                board = %board.name,
                thread = thread.number,
                "Thread updated: {} added, {} removed",
                counts.added,
                counts.removed
            );
        }

        if counts.failed > 0 {
            Ok(SyncStatus::UpdatedWithErrors {
                added: counts.added,
                removed: counts.removed,
                failed: counts.failed,
            })
        } else {
            Ok(SyncStatus::Updated {
                added: counts.added,
                removed: counts.removed,
            })
        }
    }

    /// Staleness check against the stored thread
    ///
    /// The catalog does not count the opening post, so its reply count is
    /// compared with the stored post count minus one.
    fn is_unchanged(&self, thread: &ThreadRecord) -> bool {
        match thread.last_reply {
            Some(last_reply) if thread.reply_count > 0 => {
                self.summary.last_reply_time <= last_reply
                    && self.summary.replies == thread.replies_excluding_first_post()
            }
            _ => false,
        }
    }

    async fn fetch_posts(&self) -> Result<Vec<PostData>> {
        self.wait_turn(TrafficClass::Metadata).await;

        let started = Instant::now();
        let result = self
            .ctx
            .source
            .fetch_thread(&self.ctx.board.name, self.summary.number)
            .await;
        self.stats.add_duration(Timing::Download, started.elapsed());

        let mut posts = result?;
        self.stats.add(Stat::DownloadedThreads, 1);
        posts.sort_by_key(|post| post.number);
        Ok(posts)
    }

    async fn apply_diff(&self, thread: &ThreadRecord, posts: Vec<PostData>) -> Result<DiffCounts> {
        let mut counts = DiffCounts::default();

        let stored = lock_storage(&self.ctx.storage)?.get_post_numbers(thread.id)?;
        let stored_numbers: HashSet<i64> = stored.iter().map(|&(_, number)| number).collect();
        let remote_numbers: HashSet<i64> = posts.iter().map(|post| post.number).collect();

        // Any remote post missing from the store is new, including gaps left
        // by posts that failed on an earlier cycle.
        for post in posts
            .iter()
            .filter(|post| !stored_numbers.contains(&post.number))
        {
            match self.add_post(thread, post).await {
                Ok(()) => counts.added += 1,
                Err(e) => {
                    tracing::warn!(
                        thread = thread.number,
                        post = post.number,
                        "Failed to archive post: {}",
                        e
                    );
                    self.stats.add(Stat::FailedPosts, 1);
                    counts.failed += 1;
                }
            }
        }

        for (post_id, number) in stored {
            if remote_numbers.contains(&number) {
                continue;
            }
            match self.remove_post(post_id) {
                Ok(()) => counts.removed += 1,
                Err(e) => {
                    tracing::warn!(
                        thread = thread.number,
                        post = number,
                        "Failed to remove post: {}",
                        e
                    );
                    counts.failed += 1;
                }
            }
        }

        Ok(counts)
    }

    /// Downloads the media of a post, stores it and runs the triggers on it
    async fn add_post(&self, thread: &ThreadRecord, post: &PostData) -> Result<()> {
        let image = match &post.attachment {
            Some(attachment) => Some(self.download_attachment(attachment).await?),
            None => None,
        };

        let inserted = lock_storage(&self.ctx.storage)
            .and_then(|mut storage| storage.insert_post(thread.id, post, image.as_ref()));
        if let Err(e) = inserted {
            if let Some(image) = &image {
                self.discard_blob(&image.image_path);
                self.discard_blob(&image.thumbnail_path);
            }
            return Err(e.into());
        }
        self.stats.add(Stat::AddedPosts, 1);

        let actions = self.ctx.triggers.evaluate(thread.number, post);
        if !actions.is_empty() {
            let applied = lock_storage(&self.ctx.storage)
                .and_then(|mut storage| TriggerEngine::apply(&mut *storage, thread.id, &actions));
            match applied {
                Ok(outcome) => tracing::debug!(
                    thread = thread.number,
                    post = post.number,
                    "Triggers matched: saved={}, tags added={}",
                    outcome.saved,
                    outcome.tags_added
                ),
                Err(e) => tracing::warn!(
                    thread = thread.number,
                    post = post.number,
                    "Failed to apply trigger actions: {}",
                    e
                ),
            }
        }

        Ok(())
    }

    /// Downloads the image and thumbnail and writes them to the blob store
    async fn download_attachment(&self, attachment: &Attachment) -> Result<NewImage> {
        let board = &self.ctx.board.name;

        if attachment.ext.is_empty() {
            return Err(ArchiveError::Media {
                url: self.ctx.source.image_url(board, attachment),
                message: "attachment has no file extension".to_string(),
            });
        }

        let image_bytes = self
            .download_file(&self.ctx.source.image_url(board, attachment))
            .await?;
        self.stats.add(Stat::DownloadedImages, 1);

        let thumbnail_bytes = self
            .download_file(&self.ctx.source.thumbnail_url(board, attachment))
            .await?;
        self.stats.add(Stat::DownloadedThumbnails, 1);

        let image = NewImage {
            original_name: format!("{}{}", attachment.filename, attachment.ext),
            image_path: format!(
                "post_images/{}",
                sanitize_filename(&format!("{}{}", attachment.tim, attachment.ext))
            ),
            thumbnail_path: format!(
                "post_thumbnails/{}",
                sanitize_filename(&format!("{}.jpg", attachment.tim))
            ),
        };

        self.save_blob(&image.image_path, &image_bytes)?;
        if let Err(e) = self.save_blob(&image.thumbnail_path, &thumbnail_bytes) {
            self.discard_blob(&image.image_path);
            return Err(e);
        }

        Ok(image)
    }

    async fn download_file(&self, url: &str) -> Result<Vec<u8>> {
        self.wait_turn(TrafficClass::File).await;

        let started = Instant::now();
        let result = self.ctx.source.fetch_file(url).await;
        self.stats.add_duration(Timing::Download, started.elapsed());

        result
    }

    /// Deletes a stored post, then removes its media files
    fn remove_post(&self, post_id: i64) -> Result<()> {
        let image = lock_storage(&self.ctx.storage)?.delete_post(post_id)?;
        self.stats.add(Stat::RemovedPosts, 1);

        if let Some(image) = image {
            self.discard_blob(&image.image_path);
            self.discard_blob(&image.thumbnail_path);
        }
        Ok(())
    }

    fn save_blob(&self, path: &str, bytes: &[u8]) -> Result<()> {
        self.ctx
            .blobs
            .save(path, bytes)
            .map_err(|source| ArchiveError::Blob {
                path: path.to_string(),
                source,
            })
    }

    /// Best-effort blob removal
    fn discard_blob(&self, path: &str) {
        if let Err(e) = self.ctx.blobs.delete(path) {
            tracing::warn!("Failed to delete blob {}: {}", path, e);
        }
    }

    async fn wait_turn(&self, class: TrafficClass) {
        self.ctx.limiter.wait_turn(class).await;
    }
}
