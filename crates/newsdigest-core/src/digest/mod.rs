mod filter;
mod pipeline;
mod rank;
mod render;
mod time;

pub use filter::{collapse_whitespace, EntryFilter, FilterStats};
pub use pipeline::{build_digest, DigestPipeline, FailureStage, JobReport, JobStatus};
pub use rank::rank;
pub use render::{compact_title, DigestRenderer, RenderedDigest, TITLE_LIMIT};
pub use time::{parse_timestamp, NormalizedTime, TimeNormalizer};

use crate::feed::NewsEntry;

/// One independent keyword/feed digest run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub tag: String,
    pub keyword: String,
    pub feed_url: String,
}

/// Window and cap shared by every job of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DigestParams {
    /// Lookback window in hours
    pub hours_back: u32,
    /// Already clamped to [1, 100]
    pub max_items: usize,
}

/// Ranked, truncated entries of one job plus the parameters that produced them
#[derive(Debug, Clone)]
pub struct DigestResult {
    pub job: Job,
    pub params: DigestParams,
    pub entries: Vec<NewsEntry>,
}

impl DigestResult {
    /// e.g. `[News Digest:US] 'stablecoin' Last 24h - 7 items`
    pub fn subject(&self, prefix: &str) -> String {
        format!(
            "[{}:{}] '{}' Last {}h - {} items",
            prefix,
            self.job.tag,
            self.job.keyword,
            self.params.hours_back,
            self.entries.len()
        )
    }
}
