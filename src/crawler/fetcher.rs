//! HTTP access to the remote content API
//!
//! This module handles all outbound requests for the archiver:
//! - Building the HTTP client with the configured user agent and timeout
//! - Fetching and decoding the board catalog and thread bodies
//! - Downloading image and thumbnail payloads
//!
//! Pacing is not handled here; callers wait on the `RateLimiter` first.

use crate::config::{Config, RemoteConfig, UserAgentConfig};
use crate::crawler::parser::{flatten_catalog, Attachment, CatalogPage, PostData, ThreadBody, ThreadSummary};
use crate::{ArchiveError, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use std::time::Duration;

/// Source of catalogs, threads and media files
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Fetches the catalog of a board as a flat list of thread summaries
    async fn fetch_catalog(&self, board: &str) -> Result<Vec<ThreadSummary>>;

    /// Fetches every post of a thread
    async fn fetch_thread(&self, board: &str, number: i64) -> Result<Vec<PostData>>;

    /// Downloads a media file
    async fn fetch_file(&self, url: &str) -> Result<Vec<u8>>;

    /// URL of the full image of an attachment
    fn image_url(&self, board: &str, attachment: &Attachment) -> String;

    /// URL of the thumbnail of an attachment
    fn thumbnail_url(&self, board: &str, attachment: &Attachment) -> String;
}

/// Formats the user agent string: `CrawlerName/Version (+ContactURL; ContactEmail)`
pub fn user_agent_string(config: &UserAgentConfig) -> String {
    format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    )
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `connect_timeout` - Maximum time to establish a connection
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(
    config: &UserAgentConfig,
    connect_timeout: Duration,
) -> std::result::Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent_string(config))
        .connect_timeout(connect_timeout)
        .timeout(connect_timeout * 6)
        .gzip(true)
        .brotli(true)
        .build()
}

/// `ContentSource` backed by the HTTP API
#[derive(Debug, Clone)]
pub struct HttpContentSource {
    client: Client,
    remote: RemoteConfig,
}

impl HttpContentSource {
    pub fn new(client: Client, remote: RemoteConfig) -> Self {
        Self { client, remote }
    }

    /// Builds the client and endpoints from the archiver configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = build_http_client(
            &config.user_agent,
            Duration::from_secs(config.scraper.connection_timeout_secs),
        )?;
        Ok(Self::new(client, config.remote.clone()))
    }

    pub fn catalog_url(&self, board: &str) -> String {
        format!("{}/{}/catalog.json", trim_base(&self.remote.api_base_url), board)
    }

    pub fn thread_url(&self, board: &str, number: i64) -> String {
        format!(
            "{}/{}/thread/{}.json",
            trim_base(&self.remote.api_base_url),
            board,
            number
        )
    }

    /// Sends a GET request, turning non-2xx statuses into errors
    async fn get(&self, url: &str) -> Result<Response> {
        tracing::trace!("GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| ArchiveError::Http {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ArchiveError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response)
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        self.get(url)
            .await?
            .text()
            .await
            .map_err(|source| ArchiveError::Http {
                url: url.to_string(),
                source,
            })
    }
}

fn trim_base(base: &str) -> &str {
    base.trim_end_matches('/')
}

#[async_trait]
impl ContentSource for HttpContentSource {
    async fn fetch_catalog(&self, board: &str) -> Result<Vec<ThreadSummary>> {
        let url = self.catalog_url(board);
        let body = self.get_text(&url).await?;

        let pages: Vec<CatalogPage> =
            serde_json::from_str(&body).map_err(|e| ArchiveError::Decode {
                url: url.clone(),
                message: e.to_string(),
            })?;

        Ok(flatten_catalog(&pages))
    }

    async fn fetch_thread(&self, board: &str, number: i64) -> Result<Vec<PostData>> {
        let url = self.thread_url(board, number);
        let body = self.get_text(&url).await?;

        let thread: ThreadBody = serde_json::from_str(&body).map_err(|e| ArchiveError::Decode {
            url: url.clone(),
            message: e.to_string(),
        })?;

        thread.into_posts().map_err(|post| ArchiveError::Decode {
            url,
            message: format!("post {} has an invalid timestamp", post),
        })
    }

    async fn fetch_file(&self, url: &str) -> Result<Vec<u8>> {
        let bytes = self
            .get(url)
            .await?
            .bytes()
            .await
            .map_err(|e| ArchiveError::Media {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        Ok(bytes.to_vec())
    }

    fn image_url(&self, board: &str, attachment: &Attachment) -> String {
        format!(
            "{}/{}/{}{}",
            trim_base(&self.remote.image_base_url),
            board,
            attachment.tim,
            attachment.ext
        )
    }

    fn thumbnail_url(&self, board: &str, attachment: &Attachment) -> String {
        format!(
            "{}/{}/{}s.jpg",
            trim_base(&self.remote.thumbnail_base_url),
            board,
            attachment.tim
        )
    }
}
