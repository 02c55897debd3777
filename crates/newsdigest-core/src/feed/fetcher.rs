use std::time::Duration;

use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client, Proxy};
use url::Url;

use super::models::RawEntry;
use super::parser::parse_feed;
use super::FeedSource;
use crate::config::SyncConfig;
use crate::{Error, Result};

const MAX_FEED_BYTES: usize = 5 * 1024 * 1024;
const FEED_USER_AGENT: &str = concat!("newsdigest/", env!("CARGO_PKG_VERSION"));

/// Feed fetcher backed by a reqwest client with a bounded timeout
pub struct FeedFetcher {
    client: Client,
}

impl FeedFetcher {
    /// Create a new feed fetcher with configuration
    pub fn new(config: &SyncConfig) -> Result<Self> {
        let client = Self::build_client(config.request_timeout_secs, &config.proxy_url)?;
        Ok(Self { client })
    }

    /// Build HTTP client with optional proxy
    fn build_client(timeout_secs: u64, proxy_url: &Option<String>) -> Result<Client> {
        let mut builder = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(10))
            .default_headers(Self::build_headers());

        if let Some(ref proxy) = proxy_url {
            let proxy = Proxy::all(proxy)
                .map_err(|e| Error::Config(format!("Invalid proxy URL: {}", e)))?;
            builder = builder.proxy(proxy);
            tracing::info!("Using HTTP proxy for feed fetching");
        }

        builder.build().map_err(Error::Http)
    }

    fn build_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "application/rss+xml,application/atom+xml,application/xml;q=0.9,text/xml;q=0.8,*/*;q=0.5",
            ),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static(FEED_USER_AGENT));
        headers
    }

    /// Download the raw feed body, rejecting error statuses and oversize bodies
    pub async fn fetch_raw(&self, url: &str) -> Result<Bytes> {
        Url::parse(url)?;

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Fetch(format!("HTTP {} for URL: {}", status, url)));
        }

        if let Some(len) = response.content_length() {
            ensure_content_size(len as usize, url)?;
        }

        let body = response.bytes().await?;
        ensure_content_size(body.len(), url)?;

        Ok(body)
    }
}

#[async_trait::async_trait]
impl FeedSource for FeedFetcher {
    async fn fetch_entries(&self, url: &str) -> Result<Vec<RawEntry>> {
        tracing::info!("Fetching feed from: {}", url);

        let body = self.fetch_raw(url).await?;
        let feed = parse_feed(&body)?;

        tracing::info!(
            "Parsed {} entries from '{}'",
            feed.entries.len(),
            feed.title.as_deref().unwrap_or(url)
        );

        Ok(feed.entries)
    }
}

fn ensure_content_size(size: usize, url: &str) -> Result<()> {
    if size > MAX_FEED_BYTES {
        return Err(Error::Fetch(format!(
            "Feed too large ({} bytes) for URL: {}",
            size, url
        )));
    }
    Ok(())
}
