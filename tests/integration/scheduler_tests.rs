//! Integration tests for the worker pool
//!
//! These tests drive `CrawlScheduler` and `Archiver` against an in-process
//! content source that records concurrency.

mod common;

use chan_archiver::config::{
    BoardEntry, Config, OutputConfig, RemoteConfig, ScraperConfig, UserAgentConfig,
};
use chan_archiver::crawler::{Archiver, CrawlScheduler, PostData, SyncContext, ThreadSummary};
use chan_archiver::state::{RateLimiter, Stat};
use chan_archiver::storage::{
    BoardRecord, LocalBlobStore, RunStatus, SharedStorage, SqliteStorage, Storage,
};
use chan_archiver::triggers::TriggerEngine;
use common::{post, summary, FakeSource};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

fn five_threads() -> (Vec<ThreadSummary>, HashMap<i64, Vec<PostData>>) {
    let mut catalog = Vec::new();
    let mut threads = HashMap::new();
    for number in [100, 200, 300, 400, 500] {
        catalog.push(summary(number, 2, number + 1));
        threads.insert(
            number,
            vec![post(number, number, "op"), post(number + 1, number + 1, "reply")],
        );
    }
    (catalog, threads)
}

fn context(source: Arc<FakeSource>, media: &TempDir) -> (Arc<SyncContext>, SharedStorage) {
    let mut storage = SqliteStorage::new_in_memory().unwrap();
    let board = BoardRecord::new("g", true, 48, 0);
    storage.upsert_board(&board).unwrap();
    let storage: SharedStorage = Arc::new(Mutex::new(storage));

    let ctx = Arc::new(SyncContext {
        board,
        source,
        storage: Arc::clone(&storage),
        blobs: Arc::new(LocalBlobStore::new(media.path())),
        limiter: Arc::new(RateLimiter::new(Duration::ZERO, Duration::ZERO)),
        triggers: Arc::new(TriggerEngine::default()),
    });
    (ctx, storage)
}

#[tokio::test]
async fn test_pool_of_two_processes_five_threads() {
    let media = TempDir::new().unwrap();
    let (catalog, threads) = five_threads();
    let source = Arc::new(FakeSource::new(catalog.clone(), threads));
    let (ctx, storage) = context(source.clone(), &media);

    let scheduler = CrawlScheduler::new(ctx, 2);
    let report = scheduler.process(catalog).await;

    assert_eq!(report.launched, 5);
    assert_eq!(report.completed, 5);
    assert_eq!(report.updated, 5);
    assert!(report.peak_in_flight <= 2);
    assert!(source.max_in_flight() <= 2);
    assert_eq!(source.max_in_flight(), 2, "the pool should be kept saturated");
    assert_eq!(scheduler.stats().get(Stat::ProcessedThreads), 5);
    assert_eq!(scheduler.stats().get(Stat::AddedPosts), 10);

    let storage = storage.lock().unwrap();
    for number in [100, 200, 300, 400, 500] {
        let thread = storage.get_thread("g", number).unwrap().unwrap();
        assert_eq!(thread.reply_count, 2);
    }
}

#[tokio::test]
async fn test_same_thread_never_runs_twice_at_once() {
    let media = TempDir::new().unwrap();
    let mut threads = HashMap::new();
    threads.insert(1, vec![post(1, 10, "op"), post(2, 20, "reply")]);
    threads.insert(3, vec![post(3, 30, "op")]);

    let catalog = vec![summary(1, 2, 20), summary(1, 2, 20), summary(3, 1, 30)];
    let source = Arc::new(FakeSource::new(catalog.clone(), threads));
    let (ctx, _storage) = context(source.clone(), &media);

    let scheduler = CrawlScheduler::new(ctx, 3);
    let report = scheduler.process(catalog).await;

    assert_eq!(report.completed, 3);
    assert_eq!(source.max_per_thread(), 1);
    // The duplicate entry runs after the first one and finds the thread unchanged.
    assert_eq!(report.skipped, 1);
    assert_eq!(scheduler.stats().get(Stat::ProcessedThreads), 3);
}

#[tokio::test]
async fn test_unchanged_threads_are_not_refetched() {
    let media = TempDir::new().unwrap();
    let (catalog, threads) = five_threads();
    let source = Arc::new(FakeSource::new(catalog.clone(), threads));
    let (ctx, storage) = context(source.clone(), &media);

    CrawlScheduler::new(Arc::clone(&ctx), 4)
        .process(catalog.clone())
        .await;
    assert_eq!(source.thread_fetches(), 5);

    let second = CrawlScheduler::new(ctx, 4);
    let report = second.process(catalog).await;

    assert_eq!(source.thread_fetches(), 5);
    assert_eq!(report.skipped, 5);
    assert_eq!(second.stats().get(Stat::AddedPosts), 0);

    let storage = storage.lock().unwrap();
    let thread = storage.get_thread("g", 300).unwrap().unwrap();
    assert_eq!(thread.reply_count, 2);
}

#[tokio::test]
async fn test_missing_thread_counts_as_failed() {
    let media = TempDir::new().unwrap();
    let (mut catalog, threads) = five_threads();
    catalog.push(summary(999, 3, 1000));
    let source = Arc::new(FakeSource::new(catalog.clone(), threads));
    let (ctx, storage) = context(source, &media);

    let scheduler = CrawlScheduler::new(ctx, 2);
    let report = scheduler.process(catalog).await;

    assert_eq!(report.completed, 6);
    assert_eq!(report.failed, 1);
    assert_eq!(scheduler.stats().get(Stat::FailedThreads), 1);
    assert_eq!(scheduler.stats().get(Stat::ProcessedThreads), 6);
    assert!(storage.lock().unwrap().get_thread("g", 999).unwrap().is_none());
}

fn archiver_config(media: &TempDir, max_concurrency: usize) -> Config {
    Config {
        scraper: ScraperConfig {
            api_wait_ms: 0,
            file_wait_ms: 0,
            max_concurrency,
            connection_timeout_secs: 5,
        },
        remote: RemoteConfig {
            api_base_url: "http://localhost".to_string(),
            image_base_url: "http://localhost".to_string(),
            thumbnail_base_url: "http://localhost".to_string(),
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestArchiver".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://example.com/about".to_string(),
            contact_email: "admin@example.com".to_string(),
        },
        output: OutputConfig {
            database_path: media.path().join("archive.db").display().to_string(),
            media_root: media.path().display().to_string(),
        },
        boards: vec![BoardEntry {
            name: "g".to_string(),
            active: true,
            retention_hours: 48,
            reply_threshold: 0,
        }],
    }
}

#[tokio::test]
async fn test_archiver_records_completed_run() {
    let media = TempDir::new().unwrap();
    let (catalog, threads) = five_threads();
    let source = Arc::new(FakeSource::new(catalog, threads));

    let archiver = Archiver::with_parts(
        archiver_config(&media, 2),
        SqliteStorage::new_in_memory().unwrap(),
        source,
        Arc::new(LocalBlobStore::new(media.path())),
    )
    .unwrap();

    let reports = archiver.run_all().await.unwrap();
    assert_eq!(reports.len(), 1);

    let report = &reports[0];
    assert!(report.is_success());
    assert_eq!(report.stats.processed_threads, 5);
    assert_eq!(report.stats.added_posts, 10);
    assert_eq!(report.stats.downloaded_threads, 5);
    assert!(report.pool.peak_in_flight <= 2);

    let storage = archiver.storage();
    let storage = storage.lock().unwrap();
    let run = storage.get_run(report.run_id.unwrap()).unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.used_workers, 2);
    assert_eq!(run.processed_threads, 5);
    assert_eq!(run.added_posts, 10);
    assert!(run.finished_at.is_some());
}

#[tokio::test]
async fn test_archiver_catalog_failure_fails_run() {
    let media = TempDir::new().unwrap();
    let (catalog, threads) = five_threads();
    let mut source = FakeSource::new(catalog, threads);
    source.fail_catalog = true;
    let source = Arc::new(source);

    let archiver = Archiver::with_parts(
        archiver_config(&media, 2),
        SqliteStorage::new_in_memory().unwrap(),
        source.clone(),
        Arc::new(LocalBlobStore::new(media.path())),
    )
    .unwrap();

    let reports = archiver.run_all().await.unwrap();
    let report = &reports[0];

    assert_eq!(report.status, RunStatus::Failed);
    assert!(report.error.as_deref().unwrap_or_default().contains("503"));
    assert_eq!(source.thread_fetches(), 0);

    let storage = archiver.storage();
    let storage = storage.lock().unwrap();
    let run = storage.get_run(report.run_id.unwrap()).unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.error_message.is_some());
    assert_eq!(run.processed_threads, 0);
}

#[tokio::test]
async fn test_archiver_unknown_board() {
    let media = TempDir::new().unwrap();
    let (catalog, threads) = five_threads();

    let archiver = Archiver::with_parts(
        archiver_config(&media, 1),
        SqliteStorage::new_in_memory().unwrap(),
        Arc::new(FakeSource::new(catalog, threads)),
        Arc::new(LocalBlobStore::new(media.path())),
    )
    .unwrap();

    assert!(archiver.run_board_named("zz").await.is_err());
}
