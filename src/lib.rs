//! Chan-Archiver: an incremental, polite thread archiver
//!
//! This crate archives discussion threads from a paginated JSON content API.
//! Each crawl fetches a board catalog, hands the threads to a bounded pool of
//! workers that diff them against the local archive, downloads attached media,
//! and runs declarative triggers against every newly observed post.

pub mod config;
pub mod crawler;
pub mod output;
pub mod state;
pub mod storage;
pub mod triggers;

use thiserror::Error;

/// Main error type for Chan-Archiver operations
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Unexpected HTTP status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Failed to decode response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("Media download failed for {url}: {message}")]
    Media { url: String, message: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Blob storage error for {path}: {source}")]
    Blob {
        path: String,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Chan-Archiver operations
pub type Result<T> = std::result::Result<T, ArchiveError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Archiver, CrawlScheduler, RunReport, ThreadSync};
pub use state::{RateLimiter, StatsAggregator, TrafficClass};
pub use triggers::{Action, TriggerEngine, TriggerRule};
