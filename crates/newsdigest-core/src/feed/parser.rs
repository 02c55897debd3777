use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::Reader;

use super::models::{ParsedFeed, RawEntry, RawSource};
use crate::{Error, Result};

/// Which field the text of the currently open element belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    FeedTitle,
    Title,
    Link,
    Published,
    Updated,
    DcDate,
    Created,
    SourceTitle,
}

#[derive(Default)]
struct FeedBuilder {
    feed: ParsedFeed,
    root_seen: bool,
    stack: Vec<Vec<u8>>,
    entry: Option<(RawEntry, usize)>,
    alternate_link: bool,
    source_depth: Option<usize>,
    target: Option<(Target, usize)>,
    text: String,
}

impl FeedBuilder {
    fn start(&mut self, e: &BytesStart) -> Result<()> {
        let name = e.local_name().as_ref().to_vec();
        self.stack.push(name);
        let depth = self.stack.len();
        let name = self.stack[depth - 1].as_slice();

        if !self.root_seen {
            if !matches!(name, b"rss" | b"RDF" | b"feed") {
                return Err(Error::FeedParse(format!(
                    "Not an RSS or Atom document (root element <{}>)",
                    String::from_utf8_lossy(name)
                )));
            }
            self.root_seen = true;
            return Ok(());
        }

        let Some((entry, entry_depth)) = self.entry.as_mut() else {
            if matches!(name, b"item" | b"entry") {
                self.entry = Some((RawEntry::default(), depth));
                self.alternate_link = false;
                self.source_depth = None;
                return Ok(());
            }
            let parent = self.stack.get(depth.wrapping_sub(2)).map(Vec::as_slice);
            if name == b"title" && matches!(parent, Some(b"channel") | Some(b"feed")) {
                self.begin_text(Target::FeedTitle, depth);
            }
            return Ok(());
        };
        let entry_depth = *entry_depth;

        if let Some(source_depth) = self.source_depth {
            if depth == source_depth + 1 && name == b"title" {
                self.begin_text(Target::SourceTitle, depth);
            }
            return Ok(());
        }

        if depth != entry_depth + 1 {
            return Ok(());
        }

        let target = match name {
            b"title" => Some(Target::Title),
            b"link" => {
                match attribute(e, b"href") {
                    Some(href) => {
                        let rel = attribute(e, b"rel");
                        let is_alternate = matches!(rel.as_deref(), None | Some("alternate"));
                        if (is_alternate && !self.alternate_link) || entry.link.is_none() {
                            entry.link = Some(href);
                            self.alternate_link |= is_alternate;
                        }
                        None
                    }
                    None => Some(Target::Link),
                }
            }
            b"pubDate" | b"published" | b"issued" => Some(Target::Published),
            b"updated" | b"modified" => Some(Target::Updated),
            b"date" => Some(Target::DcDate),
            b"created" => Some(Target::Created),
            b"source" => {
                entry.source = Some(RawSource {
                    title: None,
                    url: attribute(e, b"url"),
                });
                self.source_depth = Some(depth);
                Some(Target::SourceTitle)
            }
            _ => None,
        };

        if let Some(target) = target {
            self.begin_text(target, depth);
        }
        Ok(())
    }

    fn begin_text(&mut self, target: Target, depth: usize) {
        self.target = Some((target, depth));
        self.text.clear();
    }

    fn text(&mut self, text: &str) {
        if let Some((_, depth)) = self.target {
            if depth == self.stack.len() {
                self.text.push_str(text);
            }
        }
    }

    fn end(&mut self) {
        let depth = self.stack.len();

        if let Some((target, target_depth)) = self.target {
            if target_depth == depth {
                let value = std::mem::take(&mut self.text).trim().to_string();
                self.commit(target, value);
                self.target = None;
            }
        }

        if self.source_depth == Some(depth) {
            self.source_depth = None;
        }

        if let Some((_, entry_depth)) = self.entry.as_ref() {
            if *entry_depth == depth {
                if let Some((entry, _)) = self.entry.take() {
                    self.feed.entries.push(entry);
                }
            }
        }

        self.stack.pop();
    }

    fn commit(&mut self, target: Target, value: String) {
        if target == Target::FeedTitle {
            self.feed.title = Some(value);
            return;
        }
        let Some((entry, _)) = self.entry.as_mut() else {
            return;
        };
        match target {
            Target::Title => entry.title = Some(value),
            Target::Link => entry.link = Some(value),
            Target::Published => entry.published = Some(value),
            Target::Updated => entry.updated = Some(value),
            Target::DcDate => {
                if entry.updated.is_none() {
                    entry.updated = Some(value);
                }
            }
            Target::Created => entry.created = Some(value),
            Target::SourceTitle => {
                let source = entry.source.get_or_insert_with(RawSource::default);
                if !value.is_empty() {
                    source.title = Some(value);
                }
            }
            Target::FeedTitle => {}
        }
    }
}

/// Read an attribute by local name, tolerating bad escapes
fn attribute(e: &BytesStart, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == key)
        .map(|attr| match attr.unescape_value() {
            Ok(value) => value.into_owned(),
            Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
        })
}

/// Decode element text. Feeds routinely carry HTML entities such as `&nbsp;`
/// that XML does not define, so those fall back to HTML entity decoding.
fn decode_text(e: &BytesText) -> String {
    match e.unescape() {
        Ok(text) => text.into_owned(),
        Err(_) => html_escape::decode_html_entities(&String::from_utf8_lossy(e)).into_owned(),
    }
}

/// Parse an RSS 2.0 / RSS 1.0 / Atom document into raw entries
pub fn parse_feed(content: &[u8]) -> Result<ParsedFeed> {
    // Field text is trimmed once in `end`, after Text and CDATA pieces are joined
    let mut reader = Reader::from_reader(content);

    let mut builder = FeedBuilder::default();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => builder.start(&e)?,
            Ok(Event::Empty(e)) => {
                builder.start(&e)?;
                builder.end();
            }
            Ok(Event::End(_)) => builder.end(),
            Ok(Event::Text(e)) => {
                let text = decode_text(&e);
                builder.text(&text);
            }
            Ok(Event::CData(e)) => {
                let text = String::from_utf8_lossy(&e).into_owned();
                builder.text(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::FeedParse(format!("Failed to parse feed: {}", e)));
            }
            _ => {}
        }
    }

    if !builder.root_seen {
        return Err(Error::FeedParse("Empty feed document".to_string()));
    }

    Ok(builder.feed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_google_news_rss() {
        let rss = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <title>"stablecoin" - Google News</title>
    <link>https://news.google.com/search?q=stablecoin</link>
    <item>
      <title>Stablecoin bill advances in Senate - Reuters</title>
      <link>https://news.google.com/rss/articles/abc?oc=5</link>
      <guid isPermaLink="false">abc</guid>
      <pubDate>Tue, 04 Mar 2025 14:03:00 GMT</pubDate>
      <description>&lt;a href="x"&gt;link&lt;/a&gt;</description>
      <source url="https://www.reuters.com">Reuters</source>
    </item>
    <item>
      <title><![CDATA[Banks & <stablecoins>]]></title>
      <link>https://example.com/2</link>
    </item>
  </channel>
</rss>"#;

        let feed = parse_feed(rss.as_bytes()).unwrap();
        assert_eq!(feed.title.as_deref(), Some("\"stablecoin\" - Google News"));
        assert_eq!(feed.entries.len(), 2);

        let first = &feed.entries[0];
        assert_eq!(first.title.as_deref(), Some("Stablecoin bill advances in Senate - Reuters"));
        assert_eq!(first.link.as_deref(), Some("https://news.google.com/rss/articles/abc?oc=5"));
        assert_eq!(first.published.as_deref(), Some("Tue, 04 Mar 2025 14:03:00 GMT"));
        assert_eq!(first.source_name(), Some("Reuters"));
        assert_eq!(
            first.source.as_ref().and_then(|s| s.url.as_deref()),
            Some("https://www.reuters.com")
        );

        let second = &feed.entries[1];
        assert_eq!(second.title.as_deref(), Some("Banks & <stablecoins>"));
        assert!(second.published.is_none());
        assert!(second.source.is_none());
    }

    #[test]
    fn test_parse_atom_feed() {
        let atom = r#"<?xml version="1.0" encoding="utf-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <title>Example Atom</title>
  <entry>
    <title>Atom entry</title>
    <link rel="self" href="https://example.com/self"/>
    <link rel="alternate" href="https://example.com/post"/>
    <published>2025-03-04T10:00:00+09:00</published>
    <updated>2025-03-04T11:00:00Z</updated>
    <source>
      <id>urn:src</id>
      <title>Upstream Blog</title>
    </source>
  </entry>
  <entry>
    <title>Only self link</title>
    <link rel="self" href="https://example.com/only-self"/>
  </entry>
</feed>"#;

        let feed = parse_feed(atom.as_bytes()).unwrap();
        assert_eq!(feed.title.as_deref(), Some("Example Atom"));
        assert_eq!(feed.entries.len(), 2);

        let first = &feed.entries[0];
        assert_eq!(first.title.as_deref(), Some("Atom entry"));
        assert_eq!(first.link.as_deref(), Some("https://example.com/post"));
        assert_eq!(first.published.as_deref(), Some("2025-03-04T10:00:00+09:00"));
        assert_eq!(first.updated.as_deref(), Some("2025-03-04T11:00:00Z"));
        assert_eq!(first.source_name(), Some("Upstream Blog"));

        assert_eq!(feed.entries[1].link.as_deref(), Some("https://example.com/only-self"));
    }

    #[test]
    fn test_html_entities_and_dc_date() {
        let rss = r#"<rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/">
  <channel>
    <item>
      <title>Fed&nbsp;minutes &amp; markets</title>
      <link>https://example.com/a</link>
      <dc:date>2025-03-04T10:00:00Z</dc:date>
    </item>
  </channel>
</rss>"#;

        let feed = parse_feed(rss.as_bytes()).unwrap();
        let entry = &feed.entries[0];
        assert_eq!(entry.title.as_deref(), Some("Fed\u{a0}minutes & markets"));
        assert_eq!(entry.updated.as_deref(), Some("2025-03-04T10:00:00Z"));
    }

    #[test]
    fn test_empty_elements_are_present_but_empty() {
        let rss = r#"<rss><channel><item><title/><link></link></item></channel></rss>"#;

        let feed = parse_feed(rss.as_bytes()).unwrap();
        assert_eq!(feed.entries[0].title.as_deref(), Some(""));
        assert_eq!(feed.entries[0].link.as_deref(), Some(""));
    }

    #[test]
    fn test_mixed_text_and_cdata_keep_spacing() {
        let rss = r#"<rss><channel><item>
  <title>  Stablecoin <![CDATA[rules]]> tighten
  </title>
  <link>https://example.com/a</link>
</item></channel></rss>"#;

        let feed = parse_feed(rss.as_bytes()).unwrap();
        let entry = &feed.entries[0];
        assert_eq!(entry.title.as_deref(), Some("Stablecoin rules tighten"));
        assert_eq!(entry.link.as_deref(), Some("https://example.com/a"));
    }

    #[test]
    fn test_rejects_non_feed_documents() {
        assert!(parse_feed(b"<html><body>Just a moment...</body></html>").is_err());
        assert!(parse_feed(b"").is_err());
    }
}
