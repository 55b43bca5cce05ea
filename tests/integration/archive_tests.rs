//! Integration tests for the archiver
//!
//! These tests use wiremock to stand in for the remote content API and run
//! complete board crawls end-to-end.

use chan_archiver::config::{
    BoardEntry, Config, OutputConfig, RemoteConfig, ScraperConfig, UserAgentConfig,
};
use chan_archiver::crawler::Archiver;
use chan_archiver::storage::{RunStatus, Storage};
use chan_archiver::triggers::{PostField, TriggerEvent, TriggerRule};
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration pointing every endpoint at the mock server
fn create_test_config(server: &MockServer, dir: &TempDir, reply_threshold: u32) -> Config {
    let base = server.uri();
    Config {
        scraper: ScraperConfig {
            api_wait_ms: 5,
            file_wait_ms: 0,
            max_concurrency: 2,
            connection_timeout_secs: 5,
        },
        remote: RemoteConfig {
            api_base_url: format!("{}/api", base),
            image_base_url: format!("{}/img", base),
            thumbnail_base_url: format!("{}/thumb", base),
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestArchiver".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://example.com/about".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        output: OutputConfig {
            database_path: dir.path().join("db/archive.db").display().to_string(),
            media_root: dir.path().join("media").display().to_string(),
        },
        boards: vec![BoardEntry {
            name: "g".to_string(),
            active: true,
            retention_hours: 48,
            reply_threshold,
        }],
    }
}

fn catalog(threads: Value) -> Value {
    json!([{ "page": 1, "threads": threads }])
}

async fn mount_json(server: &MockServer, route: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

async fn mount_media(server: &MockServer, tim: i64, ext: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/img/g/{}{}", tim, ext)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"full image".to_vec()))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/thumb/g/{}s.jpg", tim)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"thumbnail".to_vec()))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_threshold_and_trigger_scenario() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_json(
        &server,
        "/api/g/catalog.json",
        catalog(json!([
            { "no": 10, "time": 1000, "replies": 1 },
            { "no": 1, "time": 1000, "replies": 5, "last_replies": [{ "no": 7, "time": 1007 }] }
        ])),
    )
    .await;

    mount_json(
        &server,
        "/api/g/thread/1.json",
        json!({ "posts": [
            { "no": 1, "time": 1000, "name": "Anonymous", "sub": "General", "com": "first" },
            { "no": 2, "time": 1002, "com": "a picture", "tim": 1700000000002i64,
              "ext": ".png", "filename": "cat" },
            { "no": 7, "time": 1007, "com": "<a href=\"#p2\" class=\"quotelink\">&gt;&gt;2</a><br>please archive this" }
        ]}),
    )
    .await;
    mount_media(&server, 1700000000002, ".png").await;

    Mock::given(method("GET"))
        .and(path("/api/g/thread/10.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "posts": [] })))
        .expect(0)
        .mount(&server)
        .await;

    let archiver = Archiver::new(create_test_config(&server, &dir, 2)).unwrap();
    archiver
        .storage()
        .lock()
        .unwrap()
        .insert_trigger(
            &TriggerRule::new(PostField::Comment, TriggerEvent::Contains, "archive")
                .saving_thread(),
        )
        .unwrap();

    let reports = archiver.run_all().await.unwrap();
    let report = &reports[0];
    assert!(report.is_success());
    assert_eq!(report.stats.processed_threads, 2);
    assert_eq!(report.stats.added_posts, 3);
    assert_eq!(report.stats.downloaded_images, 1);
    assert_eq!(report.stats.downloaded_thumbnails, 1);

    let storage = archiver.storage();
    let storage = storage.lock().unwrap();

    assert!(storage.get_thread("g", 10).unwrap().is_none());

    let thread = storage.get_thread("g", 1).unwrap().unwrap();
    assert!(thread.saved);
    assert!(thread.auto_saved);
    assert_eq!(thread.reply_count, 3);
    assert_eq!(thread.image_count, 1);
    assert_eq!(storage.count_posts(thread.id).unwrap(), 3);

    let posts = storage.get_posts_above(thread.id, 2).unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].comment, ">>2\nplease archive this");

    let media = dir.path().join("media");
    assert_eq!(
        std::fs::read(media.join("post_images/1700000000002.png")).unwrap(),
        b"full image"
    );
    assert_eq!(
        std::fs::read(media.join("post_thumbnails/1700000000002.jpg")).unwrap(),
        b"thumbnail"
    );

    let run = storage.get_run(report.run_id.unwrap()).unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.added_posts, 3);
    assert_eq!(run.downloaded_threads, 1);
}

#[tokio::test]
async fn test_rerun_of_unchanged_board_is_idempotent() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_json(
        &server,
        "/api/g/catalog.json",
        catalog(json!([
            { "no": 1, "time": 1000, "replies": 2, "last_replies": [{ "no": 3, "time": 1003 }] }
        ])),
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/api/g/thread/1.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "posts": [
            { "no": 1, "time": 1000, "com": "op" },
            { "no": 2, "time": 1002, "com": "file", "tim": 55, "ext": ".gif", "filename": "x" },
            { "no": 3, "time": 1003, "com": "reply" }
        ]})))
        .expect(1)
        .mount(&server)
        .await;
    mount_media(&server, 55, ".gif").await;

    let archiver = Archiver::new(create_test_config(&server, &dir, 0)).unwrap();

    let first = archiver.run_all().await.unwrap();
    assert_eq!(first[0].stats.added_posts, 3);

    let second = archiver.run_all().await.unwrap();
    assert!(second[0].is_success());
    assert_eq!(second[0].stats.added_posts, 0);
    assert_eq!(second[0].stats.downloaded_threads, 0);
    assert_eq!(second[0].stats.processed_threads, 1);

    let storage = archiver.storage();
    let storage = storage.lock().unwrap();
    let thread = storage.get_thread("g", 1).unwrap().unwrap();
    assert_eq!(thread.reply_count, 3);
    assert_eq!(thread.image_count, 1);
    assert_eq!(storage.get_recent_runs(10).unwrap().len(), 2);
}

#[tokio::test]
async fn test_post_diff_adds_and_removes() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    // The reply count never matches the stored posts, so every run refetches.
    mount_json(
        &server,
        "/api/g/catalog.json",
        catalog(json!([{ "no": 1, "time": 1000, "replies": 9 }])),
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/api/g/thread/1.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "posts": [
            { "no": 1, "time": 1000, "com": "a" },
            { "no": 2, "time": 1001, "com": "b" },
            { "no": 3, "time": 1002, "com": "c" },
            { "no": 4, "time": 1003, "com": "d", "tim": 44, "ext": ".png", "filename": "d" }
        ]})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_json(
        &server,
        "/api/g/thread/1.json",
        json!({ "posts": [
            { "no": 1, "time": 1000, "com": "a" },
            { "no": 2, "time": 1001, "com": "b" },
            { "no": 3, "time": 1002, "com": "c" },
            { "no": 5, "time": 1004, "com": "e" }
        ]}),
    )
    .await;
    mount_media(&server, 44, ".png").await;

    let archiver = Archiver::new(create_test_config(&server, &dir, 0)).unwrap();
    archiver.run_all().await.unwrap();

    let image_path = dir.path().join("media/post_images/44.png");
    assert!(image_path.exists());

    let reports = archiver.run_all().await.unwrap();
    assert_eq!(reports[0].stats.added_posts, 1);
    assert_eq!(reports[0].stats.removed_posts, 1);

    let storage = archiver.storage();
    let storage = storage.lock().unwrap();
    let thread = storage.get_thread("g", 1).unwrap().unwrap();
    let numbers: Vec<i64> = storage
        .get_post_numbers(thread.id)
        .unwrap()
        .into_iter()
        .map(|(_, number)| number)
        .collect();
    assert_eq!(numbers, vec![1, 2, 3, 5]);
    assert_eq!(thread.reply_count, 4);
    assert_eq!(thread.image_count, 0);
    assert!(!image_path.exists());
}

#[tokio::test]
async fn test_catalog_failure_marks_run_failed() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/api/g/catalog.json"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let archiver = Archiver::new(create_test_config(&server, &dir, 0)).unwrap();
    let reports = archiver.run_all().await.unwrap();
    let report = &reports[0];

    assert_eq!(report.status, RunStatus::Failed);
    assert!(report.error.is_some());

    let storage = archiver.storage();
    let storage = storage.lock().unwrap();
    let run = storage.get_run(report.run_id.unwrap()).unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.error_message.unwrap().contains("500"));
}

#[tokio::test]
async fn test_thread_failures_do_not_stop_the_run() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_json(
        &server,
        "/api/g/catalog.json",
        catalog(json!([
            { "no": 1, "time": 1000, "replies": 0 },
            { "no": 2, "time": 1000, "replies": 0 },
            { "bogus": true }
        ])),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/api/g/thread/1.json"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    mount_json(
        &server,
        "/api/g/thread/2.json",
        json!({ "posts": [{ "no": 2, "time": 1000, "com": "op" }] }),
    )
    .await;

    let archiver = Archiver::new(create_test_config(&server, &dir, 0)).unwrap();
    let reports = archiver.run_all().await.unwrap();
    let report = &reports[0];

    assert!(report.is_success());
    assert_eq!(report.stats.processed_threads, 2);
    assert_eq!(report.stats.failed_threads, 1);
    assert_eq!(report.stats.added_posts, 1);

    let storage = archiver.storage();
    let storage = storage.lock().unwrap();
    assert!(storage.get_thread("g", 1).unwrap().is_none());
    assert!(storage.get_thread("g", 2).unwrap().is_some());
    assert_eq!(
        storage.get_run(report.run_id.unwrap()).unwrap().failed_threads,
        1
    );
}
