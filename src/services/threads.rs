// src/services/threads.rs

//! Forum listing fetcher and parser.
//!
//! Fetches the listing page and turns each `li.discussionListItem` into a
//! [`ThreadRecord`]. Sticky entries are dropped here and never reach the
//! diff stage.

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};

use crate::error::{AppError, Result};
use crate::models::{Config, ThreadRecord};
use crate::services::ThreadSource;
use crate::utils::http;

const ENTRY_SELECTOR: &str = "li.discussionListItem";
const STATS_SELECTOR: &str = ".stats";
const MAJOR_SELECTOR: &str = ".major";
const ANCHOR_SELECTOR: &str = "a";
const PREVIEW_ATTR: &str = "data-previewurl";
const STICKY_CLASS: &str = "sticky";

/// Compiled selectors for the listing markup.
#[derive(Debug)]
pub struct ListingParser {
    entry: Selector,
    stats: Selector,
    major: Selector,
    anchor: Selector,
}

impl ListingParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            entry: Self::parse_selector(ENTRY_SELECTOR)?,
            stats: Self::parse_selector(STATS_SELECTOR)?,
            major: Self::parse_selector(MAJOR_SELECTOR)?,
            anchor: Self::parse_selector(ANCHOR_SELECTOR)?,
        })
    }

    /// Parse a listing page into non-sticky thread records, in document order.
    ///
    /// Malformed entries are logged and skipped.
    pub fn parse_listing(&self, html: &str) -> Vec<ThreadRecord> {
        let document = Html::parse_document(html);
        let mut threads = Vec::new();

        for entry in document.select(&self.entry) {
            if Self::is_sticky(&entry) {
                log::debug!(
                    "Skipping sticky entry {}",
                    entry.value().attr("id").unwrap_or("<no id>")
                );
                continue;
            }

            match self.parse_entry(&entry) {
                Ok(thread) => threads.push(thread),
                Err(e) => log::warn!("Skipping listing entry: {}", e),
            }
        }
        threads
    }

    /// Build a thread record from one listing entry.
    pub fn parse_entry(&self, entry: &ElementRef) -> Result<ThreadRecord> {
        let id = entry
            .value()
            .attr("id")
            .map(str::to_string)
            .ok_or_else(|| AppError::malformed("<no id>", "entry has no id attribute"))?;

        let post_count = self.parse_post_count(entry, &id)?;

        let preview = entry
            .select(&self.anchor)
            .find(|a| a.value().attr(PREVIEW_ATTR).is_some());

        let link = preview.and_then(|a| a.value().attr("href").map(str::to_string));
        let title = preview.map(|a| a.text().collect::<String>().trim().to_string());

        Ok(ThreadRecord {
            id,
            title,
            link,
            post_count,
            is_sticky: Self::is_sticky(entry),
        })
    }

    fn parse_post_count(&self, entry: &ElementRef, id: &str) -> Result<u32> {
        let stats = entry
            .select(&self.stats)
            .next()
            .ok_or_else(|| AppError::malformed(id, "missing stats element"))?;
        let major = stats
            .select(&self.major)
            .next()
            .ok_or_else(|| AppError::malformed(id, "missing major stats element"))?;

        let text: String = major.text().collect();
        let token = text
            .split_whitespace()
            .nth(1)
            .ok_or_else(|| AppError::malformed(id, format!("no count in '{}'", text.trim())))?;

        // Large counts are rendered with thousands separators ("1,234").
        token
            .replace(',', "")
            .parse::<u32>()
            .map_err(|e| AppError::malformed(id, format!("bad count '{token}': {e}")))
    }

    fn is_sticky(entry: &ElementRef) -> bool {
        entry.value().classes().any(|c| c == STICKY_CLASS)
    }

    fn parse_selector(s: &str) -> Result<Selector> {
        Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
    }
}

/// Listing fetcher for the configured forum page.
pub struct ForumClient {
    client: Client,
    url: String,
    parser: ListingParser,
}

impl ForumClient {
    /// Create a client for `config.sales_url`.
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            client: http::create_async_client(config)?,
            url: config.sales_url.clone(),
            parser: ListingParser::new()?,
        })
    }
}

#[async_trait]
impl ThreadSource for ForumClient {
    async fn fetch_threads(&self) -> Result<Vec<ThreadRecord>> {
        let html = http::fetch_text(&self.client, &self.url).await?;
        let threads = self.parser.parse_listing(&html);
        log::debug!("Parsed {} threads from {}", threads.len(), self.url);
        Ok(threads)
    }
}
