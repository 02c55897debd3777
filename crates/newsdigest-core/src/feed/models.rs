use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Timestamp-bearing fields a feed entry may carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimestampField {
    Published,
    Updated,
    Created,
}

/// Nested source record (RSS `<source>` or Atom `<source>`)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawSource {
    pub title: Option<String>,
    pub url: Option<String>,
}

/// An entry as found in the feed document, before any validation.
///
/// Every field holds the raw text of the element, so `None` means the element
/// was absent and `Some("")` means it was present but empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEntry {
    pub title: Option<String>,
    pub link: Option<String>,
    pub published: Option<String>,
    pub updated: Option<String>,
    pub created: Option<String>,
    pub source: Option<RawSource>,
}

impl RawEntry {
    /// Raw text of a timestamp field, if present
    pub fn timestamp(&self, field: TimestampField) -> Option<&str> {
        match field {
            TimestampField::Published => self.published.as_deref(),
            TimestampField::Updated => self.updated.as_deref(),
            TimestampField::Created => self.created.as_deref(),
        }
    }

    /// Source name from the nested source record, if any
    pub fn source_name(&self) -> Option<&str> {
        self.source.as_ref().and_then(|s| s.title.as_deref())
    }
}

/// A validated entry that passed keyword, recency and dedup checks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsEntry {
    pub title: String,
    pub link: String,
    pub published_at: DateTime<Utc>,
    #[serde(default)]
    pub source: String,
}

/// Parsed feed document
#[derive(Debug, Clone, Default)]
pub struct ParsedFeed {
    pub title: Option<String>,
    pub entries: Vec<RawEntry>,
}
