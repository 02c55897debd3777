use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};

use super::time::{NormalizedTime, TimeNormalizer};
use super::DigestParams;
use crate::feed::{NewsEntry, RawEntry};

/// Why entries were dropped during one filter pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterStats {
    pub accepted: usize,
    pub missing_title: usize,
    pub keyword_miss: usize,
    pub unparseable_time: usize,
    pub outside_window: usize,
    pub missing_link: usize,
    pub duplicate_link: usize,
}

impl FilterStats {
    pub fn rejected(&self) -> usize {
        self.missing_title
            + self.keyword_miss
            + self.unparseable_time
            + self.outside_window
            + self.missing_link
            + self.duplicate_link
    }
}

/// Keyword, recency and link-dedup filter for raw feed entries
#[derive(Debug, Clone)]
pub struct EntryFilter {
    keyword: String,
    hours_back: u32,
    normalizer: TimeNormalizer,
}

impl EntryFilter {
    pub fn new(keyword: &str, params: &DigestParams) -> Self {
        Self {
            keyword: keyword.trim().to_lowercase(),
            hours_back: params.hours_back,
            normalizer: TimeNormalizer::default(),
        }
    }

    /// Use a custom timestamp field order
    pub fn with_normalizer(mut self, normalizer: TimeNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Filter against the current time
    pub fn filter(&self, entries: &[RawEntry]) -> Vec<NewsEntry> {
        self.filter_at(entries, Utc::now()).0
    }

    /// Filter against a fixed `now`. Output keeps feed order; links are
    /// unique within the pass and the first occurrence wins.
    pub fn filter_at(&self, entries: &[RawEntry], now: DateTime<Utc>) -> (Vec<NewsEntry>, FilterStats) {
        let cutoff = Duration::try_hours(i64::from(self.hours_back))
            .and_then(|window| now.checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let mut seen_links: HashSet<&str> = HashSet::new();
        let mut stats = FilterStats::default();
        let mut accepted = Vec::new();

        for raw in entries {
            let title = collapse_whitespace(raw.title.as_deref().unwrap_or_default());
            if title.is_empty() {
                stats.missing_title += 1;
                continue;
            }

            if !self.keyword.is_empty() && !title.to_lowercase().contains(&self.keyword) {
                stats.keyword_miss += 1;
                continue;
            }

            let published_at = match self.normalizer.normalize(raw) {
                NormalizedTime::Utc(dt) => dt,
                NormalizedTime::Unparseable => {
                    stats.unparseable_time += 1;
                    continue;
                }
            };
            if published_at < cutoff || published_at > now {
                stats.outside_window += 1;
                continue;
            }

            let link = raw.link.as_deref().unwrap_or_default().trim();
            if link.is_empty() {
                stats.missing_link += 1;
                continue;
            }
            if !seen_links.insert(link) {
                stats.duplicate_link += 1;
                continue;
            }

            let source = raw.source_name().unwrap_or_default().trim().to_string();

            accepted.push(NewsEntry {
                title,
                link: link.to_string(),
                published_at,
                source,
            });
        }

        stats.accepted = accepted.len();
        tracing::debug!(
            "Filter kept {} of {} entries (no title: {}, keyword: {}, bad time: {}, window: {}, no link: {}, duplicate: {})",
            stats.accepted,
            entries.len(),
            stats.missing_title,
            stats.keyword_miss,
            stats.unparseable_time,
            stats.outside_window,
            stats.missing_link,
            stats.duplicate_link
        );

        (accepted, stats)
    }
}

/// Collapse whitespace runs to single spaces and trim both ends
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::RawSource;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-03-04T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn params(hours_back: u32) -> DigestParams {
        DigestParams {
            hours_back,
            max_items: 10,
        }
    }

    fn raw(title: &str, link: &str, hours_ago: i64) -> RawEntry {
        RawEntry {
            title: Some(title.to_string()),
            link: Some(link.to_string()),
            published: Some((now() - Duration::hours(hours_ago)).to_rfc2822()),
            ..RawEntry::default()
        }
    }

    #[test]
    fn test_rejects_empty_and_whitespace_titles() {
        let mut missing = raw("x", "https://a.example/0", 1);
        missing.title = None;
        let entries = vec![
            raw("", "https://a.example/1", 1),
            raw("   \n\t ", "https://a.example/2", 1),
            missing,
            raw("kept", "https://a.example/3", 1),
        ];

        let (kept, stats) = EntryFilter::new("", &params(24)).filter_at(&entries, now());
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].title, "kept");
        assert_eq!(stats.missing_title, 3);
    }

    #[test]
    fn test_keyword_is_case_insensitive_substring() {
        let entries = vec![
            raw("BREAKING: Stablecoin regulation", "https://a.example/1", 1),
            raw("Bitcoin rallies", "https://a.example/2", 1),
            raw("New STABLECOINS launched", "https://a.example/3", 1),
        ];

        let (kept, stats) = EntryFilter::new("  stablecoin ", &params(24)).filter_at(&entries, now());
        let titles: Vec<_> = kept.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["BREAKING: Stablecoin regulation", "New STABLECOINS launched"]);
        assert_eq!(stats.keyword_miss, 1);
    }

    #[test]
    fn test_non_ascii_keyword() {
        let entries = vec![
            raw("원화 스테이블코인 법안 발의", "https://a.example/1", 1),
            raw("비트코인 급등", "https://a.example/2", 1),
        ];
        let (kept, _) = EntryFilter::new("스테이블코인", &params(24)).filter_at(&entries, now());
        assert_eq!(kept.len(), 1);
    }

    #[test]
    fn test_empty_keyword_passes_everything() {
        let entries = vec![
            raw("one", "https://a.example/1", 1),
            raw("two", "https://a.example/2", 2),
        ];
        let (kept, _) = EntryFilter::new("", &params(24)).filter_at(&entries, now());
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn test_window_bounds() {
        let mut future = raw("future", "https://a.example/future", 0);
        future.published = Some((now() + Duration::minutes(5)).to_rfc3339());
        let mut at_now = raw("at now", "https://a.example/now", 0);
        at_now.published = Some(now().to_rfc3339());
        let entries = vec![
            raw("old", "https://a.example/old", 25),
            raw("edge", "https://a.example/edge", 24),
            raw("fresh", "https://a.example/fresh", 2),
            future,
            at_now,
        ];

        let (kept, stats) = EntryFilter::new("", &params(24)).filter_at(&entries, now());
        let titles: Vec<_> = kept.iter().map(|e| e.title.as_str()).collect();
        assert_eq!(titles, vec!["edge", "fresh", "at now"]);
        assert_eq!(stats.outside_window, 2);

        let cutoff = now() - Duration::hours(24);
        for entry in &kept {
            assert!(entry.published_at >= cutoff && entry.published_at <= now());
        }
    }

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        let entries = vec![
            raw("first", "https://a.example/same", 3),
            raw("second", " https://a.example/same ", 1),
            raw("other", "https://a.example/other", 2),
        ];

        let (kept, stats) = EntryFilter::new("", &params(24)).filter_at(&entries, now());
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].title, "first");
        assert_eq!(kept[0].link, "https://a.example/same");
        assert_eq!(kept[1].title, "other");
        assert_eq!(stats.duplicate_link, 1);

        let links: HashSet<_> = kept.iter().map(|e| e.link.as_str()).collect();
        assert_eq!(links.len(), kept.len());
    }

    #[test]
    fn test_malformed_timestamp_excludes_only_that_entry() {
        let mut broken = raw("broken", "https://a.example/broken", 1);
        broken.published = Some("sometime last week".to_string());
        let entries = vec![
            raw("before", "https://a.example/1", 1),
            broken,
            raw("after", "https://a.example/2", 1),
        ];

        let (kept, stats) = EntryFilter::new("", &params(24)).filter_at(&entries, now());
        assert_eq!(kept.len(), 2);
        assert_eq!(stats.unparseable_time, 1);
    }

    #[test]
    fn test_source_and_title_normalization() {
        let mut entry = raw("  Stablecoin\n   bill   passes ", "https://a.example/1", 1);
        entry.source = Some(RawSource {
            title: Some(" Reuters ".to_string()),
            url: None,
        });
        let plain = raw("no source", "https://a.example/2", 1);

        let (kept, _) = EntryFilter::new("", &params(24)).filter_at(&[entry, plain], now());
        assert_eq!(kept[0].title, "Stablecoin bill passes");
        assert_eq!(kept[0].source, "Reuters");
        assert_eq!(kept[1].source, "");
    }

    #[test]
    fn test_round_trip_scenario() {
        let mut no_link = raw("stablecoin without link", "", 1);
        no_link.link = Some("   ".to_string());
        let entries = vec![
            raw("Stablecoin rules tighten", "https://a.example/valid", 2),
            no_link,
            raw("Stablecoin rules tighten (copy)", "https://a.example/valid", 1),
        ];

        let (kept, stats) = EntryFilter::new("stablecoin", &params(24)).filter_at(&entries, now());
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].link, "https://a.example/valid");
        assert_eq!(stats.missing_link, 1);
        assert_eq!(stats.duplicate_link, 1);
        assert_eq!(stats.rejected(), 2);
    }

    #[test]
    fn test_unrepresentable_window_keeps_everything_past() {
        let filter = EntryFilter::new("", &params(u32::MAX));
        let entries = vec![raw("ancient", "https://a.example/old", 24 * 365 * 50)];
        let (accepted, stats) = filter.filter_at(&entries, now());
        assert_eq!(accepted.len(), 1);
        assert_eq!(stats.outside_window, 0);
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  a \t b\n\nc  "), "a b c");
        assert_eq!(collapse_whitespace("   "), "");
    }
}
