//! Crawler module for archiving threads
//!
//! This module contains the core archiving logic, including:
//! - Remote API access behind the `ContentSource` trait
//! - Catalog and thread decoding with markup cleaning
//! - Per-thread synchronisation against the archive
//! - The bounded worker pool and board run coordination

mod coordinator;
mod fetcher;
mod parser;
mod scheduler;
mod thread_sync;

pub use coordinator::{Archiver, RunReport};
pub use fetcher::{build_http_client, user_agent_string, ContentSource, HttpContentSource};
pub use parser::{
    clean_markup, flatten_catalog, timestamp_to_datetime, Attachment, CatalogPage, PostData,
    RawPost, ThreadBody, ThreadSummary,
};
pub use scheduler::{CrawlScheduler, PoolReport};
pub use thread_sync::{SyncContext, SyncStatus, ThreadOutcome, ThreadSync};
