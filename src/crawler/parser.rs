//! Wire models of the remote content API
//!
//! This module turns API responses into the crawler's own types:
//! - Catalog pages flattened into `ThreadSummary` entries
//! - Thread bodies converted into `PostData` with cleaned markup
//! - Attachment metadata used to build media URLs and blob paths

use chrono::{DateTime, TimeZone, Utc};
use scraper::{ElementRef, Html, Node};
use serde::Deserialize;
use serde_json::Value;

/// One page of the board catalog
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogPage {
    #[serde(default)]
    pub page: u32,

    /// Raw thread entries, validated one by one
    #[serde(default)]
    pub threads: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct CatalogThread {
    no: i64,
    time: i64,
    replies: i64,
    #[serde(default)]
    last_replies: Vec<CatalogReply>,
}

#[derive(Debug, Deserialize)]
struct CatalogReply {
    time: i64,
}

/// Listing entry of a thread, derived from the catalog each crawl
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadSummary {
    /// Remote thread number
    pub number: i64,

    /// Reply count, not counting the opening post
    pub replies: i64,

    /// Time of the most recent reply, or the creation time without replies
    pub last_reply_time: DateTime<Utc>,
}

impl ThreadSummary {
    /// Builds a summary from one raw catalog entry
    ///
    /// Returns `None` for entries missing required fields.
    pub fn from_catalog_entry(entry: &Value) -> Option<Self> {
        let thread = CatalogThread::deserialize(entry).ok()?;

        let last_reply = thread
            .last_replies
            .last()
            .map(|reply| reply.time)
            .unwrap_or(thread.time);

        Some(Self {
            number: thread.no,
            replies: thread.replies,
            last_reply_time: timestamp_to_datetime(last_reply)?,
        })
    }
}

/// Flattens catalog pages into thread summaries, in catalog order
pub fn flatten_catalog(pages: &[CatalogPage]) -> Vec<ThreadSummary> {
    let mut summaries = Vec::new();

    for page in pages {
        for entry in &page.threads {
            match ThreadSummary::from_catalog_entry(entry) {
                Some(summary) => summaries.push(summary),
                None => tracing::debug!("Skipping malformed catalog entry on page {}", page.page),
            }
        }
    }

    summaries
}

/// Full body of one thread
#[derive(Debug, Clone, Deserialize)]
pub struct ThreadBody {
    pub posts: Vec<RawPost>,
}

/// A post exactly as the API returns it
#[derive(Debug, Clone, Deserialize)]
pub struct RawPost {
    pub no: i64,
    pub time: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub trip: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub com: Option<String>,
    #[serde(default)]
    pub tim: Option<i64>,
    #[serde(default)]
    pub ext: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

/// File attached to a post
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Server-side file name (upload timestamp)
    pub tim: i64,
    /// Extension including the leading dot, empty if the listing omitted it
    pub ext: String,
    /// Name of the file as uploaded, without extension
    pub filename: String,
}

/// A post as processed by the archiver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostData {
    pub number: i64,
    pub time: DateTime<Utc>,
    pub name: String,
    pub trip: String,
    pub email: String,
    pub country: String,
    pub subject: String,
    pub comment: String,
    pub attachment: Option<Attachment>,
}

impl RawPost {
    /// Converts the raw post, cleaning the subject and comment markup
    pub fn into_post_data(self) -> Option<PostData> {
        let attachment = self.tim.map(|tim| Attachment {
            tim,
            ext: self.ext.unwrap_or_default(),
            filename: self.filename.unwrap_or_default(),
        });

        Some(PostData {
            number: self.no,
            time: timestamp_to_datetime(self.time)?,
            name: self.name.unwrap_or_default(),
            trip: self.trip.unwrap_or_default(),
            email: self.email.unwrap_or_default(),
            country: self.country.unwrap_or_default(),
            subject: clean_markup(self.sub.as_deref().unwrap_or_default()),
            comment: clean_markup(self.com.as_deref().unwrap_or_default()),
            attachment,
        })
    }
}

impl ThreadBody {
    /// Converts every post
    ///
    /// Fails with the number of the first post carrying an invalid timestamp,
    /// so a partial listing never reaches the removal diff.
    pub fn into_posts(self) -> std::result::Result<Vec<PostData>, i64> {
        self.posts
            .into_iter()
            .map(|raw| {
                let number = raw.no;
                raw.into_post_data().ok_or(number)
            })
            .collect()
    }
}

/// Converts a UNIX timestamp in seconds to a UTC datetime
pub fn timestamp_to_datetime(timestamp: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(timestamp, 0).single()
}

/// Reduces post markup to plain text
///
/// Links and spans keep only their text, `<pre>` blocks become
/// `[code]...[/code]`, `<br>` becomes a newline, `<wbr>` is dropped and
/// entities are decoded.
pub fn clean_markup(markup: &str) -> String {
    if !markup.contains('<') && !markup.contains('&') {
        return markup.to_string();
    }

    let fragment = Html::parse_fragment(markup);
    let mut text = String::with_capacity(markup.len());
    push_text(fragment.root_element(), &mut text);
    text
}

fn push_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                let Some(child_element) = ElementRef::wrap(child) else {
                    continue;
                };
                match el.name() {
                    "br" => out.push('\n'),
                    "wbr" => {}
                    "pre" => {
                        out.push_str("[code]");
                        push_text(child_element, out);
                        out.push_str("[/code]");
                    }
                    _ => push_text(child_element, out),
                }
            }
            _ => {}
        }
    }
}
