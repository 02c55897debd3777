use super::filter::EntryFilter;
use super::rank::rank;
use super::render::DigestRenderer;
use super::{DigestParams, DigestResult, Job};
use crate::config::RunSettings;
use crate::feed::FeedSource;
use crate::mail::{MailSender, OutgoingMail};
use crate::{Error, Result};

/// Where a failed job stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Fetch,
    Send,
}

impl std::fmt::Display for FailureStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureStage::Fetch => write!(f, "fetch"),
            FailureStage::Send => write!(f, "send"),
        }
    }
}

#[derive(Debug)]
pub enum JobStatus {
    Sent { items: usize },
    Failed { stage: FailureStage, error: Error },
}

/// Outcome of one job
#[derive(Debug)]
pub struct JobReport {
    pub tag: String,
    pub keyword: String,
    pub recipient: String,
    pub status: JobStatus,
}

impl JobReport {
    pub fn is_failure(&self) -> bool {
        matches!(self.status, JobStatus::Failed { .. })
    }
}

/// Fetch, filter and rank one job. Nothing is sent.
pub async fn build_digest(
    source: &dyn FeedSource,
    job: &Job,
    params: DigestParams,
) -> Result<DigestResult> {
    let raw = source.fetch_entries(&job.feed_url).await?;
    let accepted = EntryFilter::new(&job.keyword, &params).filter(&raw);
    let entries = rank(accepted, params.max_items);

    tracing::info!(
        "Job {}: {} raw entries, {} in digest",
        job.tag,
        raw.len(),
        entries.len()
    );

    Ok(DigestResult {
        job: job.clone(),
        params,
        entries,
    })
}

/// Runs digest jobs end to end: fetch, filter, rank, render, send
pub struct DigestPipeline {
    source: Box<dyn FeedSource>,
    sender: Box<dyn MailSender>,
    renderer: DigestRenderer,
    params: DigestParams,
    from: String,
    to: String,
    subject_prefix: String,
    fail_fast: bool,
}

impl DigestPipeline {
    pub fn new(
        source: Box<dyn FeedSource>,
        sender: Box<dyn MailSender>,
        settings: &RunSettings,
    ) -> Self {
        Self {
            source,
            sender,
            renderer: DigestRenderer::new(),
            params: settings.params,
            from: settings.from.clone(),
            to: settings.to.clone(),
            subject_prefix: settings.subject_prefix.clone(),
            fail_fast: settings.fail_fast,
        }
    }

    pub async fn build_digest(&self, job: &Job) -> Result<DigestResult> {
        build_digest(self.source.as_ref(), job, self.params).await
    }

    /// Render both bodies and address the mail
    pub fn compose(&self, digest: &DigestResult) -> OutgoingMail {
        let rendered = self.renderer.render(digest);
        OutgoingMail {
            from: self.from.clone(),
            to: self.to.clone(),
            subject: digest.subject(&self.subject_prefix),
            text_body: rendered.text,
            html_body: rendered.html,
        }
    }

    /// Run one job; failures are reported, never propagated
    pub async fn run_job(&self, job: &Job) -> JobReport {
        let status = match self.build_digest(job).await {
            Err(error) => {
                tracing::error!("Job {}: fetching '{}' failed: {}", job.tag, job.feed_url, error);
                JobStatus::Failed {
                    stage: FailureStage::Fetch,
                    error,
                }
            }
            Ok(digest) => {
                let mail = self.compose(&digest);
                match self.sender.send(&mail).await {
                    Ok(()) => {
                        tracing::info!(
                            "Job {}: sent digest with {} items to {}",
                            job.tag,
                            digest.entries.len(),
                            self.to
                        );
                        JobStatus::Sent {
                            items: digest.entries.len(),
                        }
                    }
                    Err(error) => {
                        tracing::error!("Job {}: sending digest failed: {}", job.tag, error);
                        JobStatus::Failed {
                            stage: FailureStage::Send,
                            error,
                        }
                    }
                }
            }
        };

        JobReport {
            tag: job.tag.clone(),
            keyword: job.keyword.clone(),
            recipient: self.to.clone(),
            status,
        }
    }

    /// Run jobs in order. A failed job does not stop the others unless
    /// fail-fast is set.
    pub async fn run_all(&self, jobs: &[Job]) -> Vec<JobReport> {
        let mut reports = Vec::with_capacity(jobs.len());

        for job in jobs {
            let report = self.run_job(job).await;
            let failed = report.is_failure();
            reports.push(report);

            if failed && self.fail_fast {
                tracing::warn!(
                    "Stopping after failed job {}; {} job(s) skipped",
                    job.tag,
                    jobs.len() - reports.len()
                );
                break;
            }
        }

        reports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::RawEntry;
    use chrono::{Duration, Utc};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    struct StubSource {
        feeds: HashMap<String, Vec<RawEntry>>,
    }

    #[async_trait::async_trait]
    impl FeedSource for StubSource {
        async fn fetch_entries(&self, url: &str) -> Result<Vec<RawEntry>> {
            self.feeds
                .get(url)
                .cloned()
                .ok_or_else(|| Error::Fetch(format!("HTTP 503 for URL: {}", url)))
        }
    }

    #[derive(Clone, Default)]
    struct RecordingSender {
        sent: Arc<Mutex<Vec<OutgoingMail>>>,
        fail: bool,
    }

    #[async_trait::async_trait]
    impl MailSender for RecordingSender {
        async fn send(&self, mail: &OutgoingMail) -> Result<()> {
            if self.fail {
                return Err(Error::Send("quota exceeded".to_string()));
            }
            self.sent.lock().unwrap().push(mail.clone());
            Ok(())
        }
    }

    fn raw(title: &str, link: &str, hours_ago: i64) -> RawEntry {
        RawEntry {
            title: Some(title.to_string()),
            link: Some(link.to_string()),
            published: Some((Utc::now() - Duration::hours(hours_ago)).to_rfc2822()),
            ..RawEntry::default()
        }
    }

    fn job(tag: &str, keyword: &str, url: &str) -> Job {
        Job {
            tag: tag.to_string(),
            keyword: keyword.to_string(),
            feed_url: url.to_string(),
        }
    }

    fn settings(fail_fast: bool) -> RunSettings {
        RunSettings {
            params: DigestParams {
                hours_back: 24,
                max_items: 10,
            },
            jobs: Vec::new(),
            from: "digest@example.com".to_string(),
            to: "reader@example.com".to_string(),
            subject_prefix: "Stablecoin News".to_string(),
            fail_fast,
        }
    }

    fn pipeline(
        feeds: Vec<(&str, Vec<RawEntry>)>,
        sender: RecordingSender,
        fail_fast: bool,
    ) -> DigestPipeline {
        let source = StubSource {
            feeds: feeds
                .into_iter()
                .map(|(url, entries)| (url.to_string(), entries))
                .collect(),
        };
        DigestPipeline::new(Box::new(source), Box::new(sender), &settings(fail_fast))
    }

    #[tokio::test]
    async fn test_round_trip_single_entry() {
        let sender = RecordingSender::default();
        let feed = vec![
            raw("Stablecoin bill without link", "", 1),
            raw("Stablecoin bill advances", "https://a.example/valid", 2),
            raw("Stablecoin bill advances again", "https://a.example/valid", 1),
        ];
        let pipeline = pipeline(vec![("https://feed.example/us", feed)], sender.clone(), false);

        let reports = pipeline
            .run_all(&[job("US", "stablecoin", "https://feed.example/us")])
            .await;
        assert_eq!(reports.len(), 1);
        assert!(matches!(reports[0].status, JobStatus::Sent { items: 1 }));
        assert_eq!(reports[0].recipient, "reader@example.com");

        let sent = sender.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let mail = &sent[0];
        assert_eq!(mail.subject, "[Stablecoin News:US] 'stablecoin' Last 24h - 1 items");
        assert_eq!(mail.from, "digest@example.com");
        assert!(mail.text_body.contains("[1]"));
        assert!(mail.text_body.contains("https://a.example/valid"));
        assert!(mail.html_body.contains("<a href=\"https://a.example/valid\">"));
    }

    #[tokio::test]
    async fn test_fetch_failure_is_isolated() {
        let sender = RecordingSender::default();
        let pipeline = pipeline(
            vec![("https://feed.example/us", vec![raw("stablecoin up", "https://a.example/1", 1)])],
            sender.clone(),
            false,
        );

        let reports = pipeline
            .run_all(&[
                job("KR", "스테이블코인", "https://feed.example/missing"),
                job("US", "stablecoin", "https://feed.example/us"),
            ])
            .await;

        assert_eq!(reports.len(), 2);
        assert!(matches!(
            reports[0].status,
            JobStatus::Failed { stage: FailureStage::Fetch, .. }
        ));
        assert!(matches!(reports[1].status, JobStatus::Sent { items: 1 }));

        let sent = sender.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].subject.contains(":US]"));
    }

    #[tokio::test]
    async fn test_fail_fast_stops_remaining_jobs() {
        let sender = RecordingSender::default();
        let pipeline = pipeline(
            vec![("https://feed.example/us", vec![raw("stablecoin up", "https://a.example/1", 1)])],
            sender.clone(),
            true,
        );

        let reports = pipeline
            .run_all(&[
                job("KR", "스테이블코인", "https://feed.example/missing"),
                job("US", "stablecoin", "https://feed.example/us"),
            ])
            .await;

        assert_eq!(reports.len(), 1);
        assert!(reports[0].is_failure());
        assert!(sender.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_send_failure_is_reported() {
        let sender = RecordingSender {
            fail: true,
            ..RecordingSender::default()
        };
        let pipeline = pipeline(vec![("https://feed.example/us", Vec::new())], sender, false);

        let reports = pipeline
            .run_all(&[
                job("US", "stablecoin", "https://feed.example/us"),
                job("US2", "stablecoin", "https://feed.example/us"),
            ])
            .await;

        assert_eq!(reports.len(), 2);
        for report in &reports {
            match &report.status {
                JobStatus::Failed { stage, error } => {
                    assert_eq!(*stage, FailureStage::Send);
                    assert!(error.to_string().contains("quota"));
                }
                other => panic!("unexpected status {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_empty_digest_is_still_sent() {
        let sender = RecordingSender::default();
        let pipeline = pipeline(
            vec![("https://feed.example/us", vec![raw("Bitcoin only", "https://a.example/1", 1)])],
            sender.clone(),
            false,
        );

        let reports = pipeline
            .run_all(&[job("US", "stablecoin", "https://feed.example/us")])
            .await;
        assert!(matches!(reports[0].status, JobStatus::Sent { items: 0 }));

        let sent = sender.sent.lock().unwrap();
        assert!(sent[0].subject.ends_with("- 0 items"));
        assert!(sent[0].text_body.contains("No matching items"));
    }

    #[tokio::test]
    async fn test_jobs_do_not_share_dedup_state() {
        let sender = RecordingSender::default();
        let shared = vec![raw("stablecoin news", "https://a.example/shared", 1)];
        let pipeline = pipeline(
            vec![
                ("https://feed.example/a", shared.clone()),
                ("https://feed.example/b", shared),
            ],
            sender.clone(),
            false,
        );

        let reports = pipeline
            .run_all(&[
                job("A", "stablecoin", "https://feed.example/a"),
                job("B", "stablecoin", "https://feed.example/b"),
            ])
            .await;

        assert!(matches!(reports[0].status, JobStatus::Sent { items: 1 }));
        assert!(matches!(reports[1].status, JobStatus::Sent { items: 1 }));
    }

    #[tokio::test]
    async fn test_build_digest_caps_and_orders() {
        let feed: Vec<_> = (1..=15)
            .map(|i| raw(&format!("stablecoin {}", i), &format!("https://a.example/{}", i), i))
            .rev()
            .collect();
        let source = StubSource {
            feeds: HashMap::from([("https://feed.example/us".to_string(), feed)]),
        };

        let digest = build_digest(
            &source,
            &job("US", "stablecoin", "https://feed.example/us"),
            DigestParams {
                hours_back: 24,
                max_items: 10,
            },
        )
        .await
        .unwrap();

        assert_eq!(digest.entries.len(), 10);
        assert_eq!(digest.entries[0].title, "stablecoin 1");
        assert_eq!(digest.entries[9].title, "stablecoin 10");
    }
}
