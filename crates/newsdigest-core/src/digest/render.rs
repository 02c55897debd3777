use chrono::{DateTime, SecondsFormat, Utc};
use html_escape::{encode_double_quoted_attribute, encode_text};

use super::filter::collapse_whitespace;
use super::DigestResult;

/// Maximum rendered title length, in characters
pub const TITLE_LIMIT: usize = 90;

const EMPTY_MESSAGE: &str = "No matching items in this period.";

const STYLE: &str = "\
body{margin:0;background:#f6f7f9;color:#1f2937;font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Roboto,sans-serif;}\
.wrap{max-width:760px;margin:0 auto;padding:24px 16px 40px;}\
.hero{background:#ffffff;border:1px solid #e5e7eb;border-radius:14px;padding:18px 18px 14px;}\
.headline{margin:0;font-size:22px;line-height:1.25;letter-spacing:-0.02em;}\
.sub{margin:8px 0 0;color:#6b7280;font-size:13px;}\
.section{margin-top:16px;}\
.card{background:#fff;border:1px solid #e5e7eb;border-radius:12px;padding:14px;margin:10px 0;}\
.title{display:block;font-size:16px;line-height:1.45;}\
.link{margin-top:8px;word-break:break-all;}\
.link a{color:#0f766e;font-size:14px;font-weight:700;text-decoration:none;}\
.link a:hover{text-decoration:underline;}\
.meta{margin-top:6px;font-size:12px;color:#6b7280;word-break:break-all;}\
.foot{margin-top:14px;color:#6b7280;font-size:12px;}";

/// Plain-text and HTML bodies of one digest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDigest {
    pub text: String,
    pub html: String,
}

/// Collapse whitespace and cut overlong titles with an ellipsis
pub fn compact_title(title: &str, max_chars: usize) -> String {
    let collapsed = collapse_whitespace(title);
    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }
    let cut: String = collapsed.chars().take(max_chars.saturating_sub(1)).collect();
    format!("{}…", cut.trim_end())
}

/// Renders digests; output only varies with the generation timestamp
#[derive(Debug, Clone)]
pub struct DigestRenderer {
    title_limit: usize,
}

impl Default for DigestRenderer {
    fn default() -> Self {
        Self {
            title_limit: TITLE_LIMIT,
        }
    }
}

impl DigestRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render with the current wall-clock time as generation timestamp
    pub fn render(&self, digest: &DigestResult) -> RenderedDigest {
        self.render_at(digest, Utc::now())
    }

    pub fn render_at(&self, digest: &DigestResult, generated_at: DateTime<Utc>) -> RenderedDigest {
        RenderedDigest {
            text: self.plain_text(digest, generated_at),
            html: self.html(digest, generated_at),
        }
    }

    pub fn plain_text(&self, digest: &DigestResult, generated_at: DateTime<Utc>) -> String {
        let mut lines: Vec<String> = Vec::new();
        lines.push(format!("News Digest - '{}'", digest.job.keyword));
        lines.push(String::new());
        lines.push(format!(
            "{} items (last {}h, newest first)",
            digest.entries.len(),
            digest.params.hours_back
        ));
        lines.push(String::new());

        if digest.entries.is_empty() {
            lines.push(EMPTY_MESSAGE.to_string());
            lines.push(String::new());
        }

        for (idx, entry) in digest.entries.iter().enumerate() {
            let source = if entry.source.is_empty() {
                String::new()
            } else {
                format!(" ({})", entry.source)
            };
            lines.push(format!(
                "[{}] {}{}",
                idx + 1,
                compact_title(&entry.title, self.title_limit),
                source
            ));
            lines.push(format!("- Link: {}", entry.link));
            lines.push(format!("- Published (UTC): {}", entry.published_at.to_rfc3339()));
            lines.push(String::new());
        }

        lines.push(format!("Generated at (UTC): {}", format_generated(generated_at)));
        lines.join("\n")
    }

    /// Self-contained HTML document. Every interpolated value is escaped.
    pub fn html(&self, digest: &DigestResult, generated_at: DateTime<Utc>) -> String {
        let mut cards = String::new();

        if digest.entries.is_empty() {
            cards.push_str(&format!(
                "<article class=\"card empty\"><strong class=\"title\">{}</strong></article>",
                encode_text(EMPTY_MESSAGE)
            ));
        }

        for (idx, entry) in digest.entries.iter().enumerate() {
            let source = if entry.source.is_empty() {
                String::new()
            } else {
                format!(" ({})", encode_text(&entry.source))
            };
            let title = compact_title(&entry.title, self.title_limit);
            cards.push_str(&format!(
                "<article class=\"card\">\
<strong class=\"title\">[{}] {}{}</strong>\
<div class=\"link\"><a href=\"{}\">{}</a></div>\
<div class=\"meta\">Published (UTC): {}</div>\
</article>",
                idx + 1,
                encode_text(&title),
                source,
                encode_double_quoted_attribute(&entry.link),
                encode_text(&entry.link),
                encode_text(&entry.published_at.to_rfc3339()),
            ));
        }

        let keyword = encode_text(&digest.job.keyword);
        format!(
            "<!doctype html>\
<html><head><meta charset=\"utf-8\">\
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\
<title>News Digest - '{keyword}'</title>\
<style>{STYLE}</style></head><body>\
<div class=\"wrap\">\
<header class=\"hero\">\
<h1 class=\"headline\">News Digest - '{keyword}'</h1>\
<p class=\"sub\">{count} items (last {hours}h, newest first, max {cap})</p>\
</header>\
<section class=\"section\">{cards}</section>\
<div class=\"foot\">Generated at (UTC): {generated}</div>\
</div></body></html>",
            count = digest.entries.len(),
            hours = digest.params.hours_back,
            cap = digest.params.max_items,
            generated = encode_text(&format_generated(generated_at)),
        )
    }
}

fn format_generated(generated_at: DateTime<Utc>) -> String {
    generated_at.to_rfc3339_opts(SecondsFormat::Secs, false)
}
