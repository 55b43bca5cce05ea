//! Shared helpers for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chan_archiver::crawler::{Attachment, ContentSource, PostData, ThreadSummary};
use chan_archiver::{ArchiveError, Result};
use chrono::{TimeZone, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// In-process `ContentSource` that records how it is called
pub struct FakeSource {
    pub catalog: Vec<ThreadSummary>,
    pub threads: HashMap<i64, Vec<PostData>>,
    pub fail_catalog: bool,
    pub fetch_delay: Duration,
    pub thread_fetches: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    per_thread_in_flight: Mutex<HashMap<i64, usize>>,
    max_per_thread: AtomicUsize,
}

impl FakeSource {
    pub fn new(catalog: Vec<ThreadSummary>, threads: HashMap<i64, Vec<PostData>>) -> Self {
        Self {
            catalog,
            threads,
            fail_catalog: false,
            fetch_delay: Duration::from_millis(20),
            thread_fetches: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            per_thread_in_flight: Mutex::new(HashMap::new()),
            max_per_thread: AtomicUsize::new(0),
        }
    }

    /// Highest number of thread fetches observed in flight at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Highest number of concurrent fetches observed for one thread number
    pub fn max_per_thread(&self) -> usize {
        self.max_per_thread.load(Ordering::SeqCst)
    }

    pub fn thread_fetches(&self) -> usize {
        self.thread_fetches.load(Ordering::SeqCst)
    }

    fn enter(&self, number: i64) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let mut per_thread = self.per_thread_in_flight.lock().unwrap();
        let count = per_thread.entry(number).or_insert(0);
        *count += 1;
        self.max_per_thread.fetch_max(*count, Ordering::SeqCst);
    }

    fn leave(&self, number: i64) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let mut per_thread = self.per_thread_in_flight.lock().unwrap();
        if let Some(count) = per_thread.get_mut(&number) {
            *count -= 1;
        }
    }
}

#[async_trait]
impl ContentSource for FakeSource {
    async fn fetch_catalog(&self, board: &str) -> Result<Vec<ThreadSummary>> {
        if self.fail_catalog {
            return Err(ArchiveError::Status {
                url: format!("fake://{}/catalog.json", board),
                status: 503,
            });
        }
        Ok(self.catalog.clone())
    }

    async fn fetch_thread(&self, board: &str, number: i64) -> Result<Vec<PostData>> {
        self.thread_fetches.fetch_add(1, Ordering::SeqCst);
        self.enter(number);
        tokio::time::sleep(self.fetch_delay).await;
        self.leave(number);

        self.threads
            .get(&number)
            .cloned()
            .ok_or_else(|| ArchiveError::Status {
                url: format!("fake://{}/thread/{}.json", board, number),
                status: 404,
            })
    }

    async fn fetch_file(&self, url: &str) -> Result<Vec<u8>> {
        Ok(url.as_bytes().to_vec())
    }

    fn image_url(&self, board: &str, attachment: &Attachment) -> String {
        format!("fake://{}/{}{}", board, attachment.tim, attachment.ext)
    }

    fn thumbnail_url(&self, board: &str, attachment: &Attachment) -> String {
        format!("fake://{}/{}s.jpg", board, attachment.tim)
    }
}

pub fn post(number: i64, timestamp: i64, comment: &str) -> PostData {
    PostData {
        number,
        time: Utc.timestamp_opt(timestamp, 0).unwrap(),
        name: "Anonymous".to_string(),
        trip: String::new(),
        email: String::new(),
        country: String::new(),
        subject: String::new(),
        comment: comment.to_string(),
        attachment: None,
    }
}

/// Catalog entry consistent with a thread of `posts` posts, the last one at `last_reply`
pub fn summary(number: i64, posts: i64, last_reply: i64) -> ThreadSummary {
    ThreadSummary {
        number,
        replies: posts - 1,
        last_reply_time: Utc.timestamp_opt(last_reply, 0).unwrap(),
    }
}
