use serde::Deserialize;

/// Main configuration structure for Chan-Archiver
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub scraper: ScraperConfig,
    pub remote: RemoteConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    #[serde(default, rename = "board")]
    pub boards: Vec<BoardEntry>,
}

/// Scraper pacing and concurrency configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ScraperConfig {
    /// Minimum time between two metadata calls (catalog/thread), in milliseconds
    #[serde(rename = "api-wait-ms", default = "default_api_wait_ms")]
    pub api_wait_ms: u64,

    /// Minimum time between two file downloads, in milliseconds
    #[serde(rename = "file-wait-ms", default)]
    pub file_wait_ms: u64,

    /// Number of threads synchronised concurrently per board
    #[serde(rename = "max-concurrency", default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Per-request connection timeout in seconds
    #[serde(
        rename = "connection-timeout-secs",
        default = "default_connection_timeout_secs"
    )]
    pub connection_timeout_secs: u64,
}

fn default_api_wait_ms() -> u64 {
    1000
}

fn default_max_concurrency() -> usize {
    4
}

fn default_connection_timeout_secs() -> u64 {
    10
}

/// Remote content API endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
    /// Base URL serving catalog and thread JSON
    #[serde(rename = "api-base-url")]
    pub api_base_url: String,

    /// Base URL serving full-size images
    #[serde(rename = "image-base-url")]
    pub image_base_url: String,

    /// Base URL serving thumbnails
    #[serde(rename = "thumbnail-base-url")]
    pub thumbnail_base_url: String,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Directory holding downloaded images and thumbnails
    #[serde(rename = "media-root")]
    pub media_root: String,
}

/// A board registered for archiving
#[derive(Debug, Clone, Deserialize)]
pub struct BoardEntry {
    /// Stable board name, e.g. "g"
    pub name: String,

    /// Whether the board is crawled at all
    #[serde(default = "default_active")]
    pub active: bool,

    /// Hours an unsaved thread is retained (0 keeps forever)
    #[serde(rename = "retention-hours", default = "default_retention_hours")]
    pub retention_hours: u32,

    /// Minimum reply count before a thread is archived
    #[serde(rename = "reply-threshold", default = "default_reply_threshold")]
    pub reply_threshold: u32,
}

fn default_active() -> bool {
    true
}

fn default_retention_hours() -> u32 {
    48
}

fn default_reply_threshold() -> u32 {
    20
}
