mod fetcher;
mod models;
mod parser;

pub use fetcher::FeedFetcher;
pub use models::{NewsEntry, ParsedFeed, RawEntry, RawSource, TimestampField};
pub use parser::parse_feed;

use crate::Result;

/// Anything that can turn a feed URL into raw entries
#[async_trait::async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch the document at `url` and return its entries in feed order
    async fn fetch_entries(&self, url: &str) -> Result<Vec<RawEntry>>;
}
