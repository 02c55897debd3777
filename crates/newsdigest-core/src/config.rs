use std::path::{Path, PathBuf};

use lettre::message::Mailbox;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::digest::{DigestParams, Job};
use crate::{Error, Result};

/// Upper bound for the number of entries in one digest
pub const MAX_ITEMS_LIMIT: usize = 100;
/// Longest accepted lookback window (100 years)
pub const MAX_HOURS_BACK: u32 = 24 * 365 * 100;

const DEFAULT_RSS_URL_KR: &str = "https://news.google.com/rss/search?q=intitle:%22%EC%8A%A4%ED%85%8C%EC%9D%B4%EB%B8%94%EC%BD%94%EC%9D%B8%22&hl=ko&gl=KR&ceid=KR:ko";
const DEFAULT_RSS_URL_US: &str =
    "https://news.google.com/rss/search?q=intitle:stablecoin&hl=en-US&gl=US&ceid=US:en";
const KEYWORD_KR: &str = "스테이블코인";
const KEYWORD_US: &str = "stablecoin";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub digest: DigestConfig,
    #[serde(default)]
    pub mail: MailConfig,
    #[serde(default)]
    pub gmail: GmailConfig,
    #[serde(default)]
    pub sync: SyncConfig,
    #[serde(default = "default_jobs")]
    pub jobs: Vec<JobConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            digest: DigestConfig::default(),
            mail: MailConfig::default(),
            gmail: GmailConfig::default(),
            sync: SyncConfig::default(),
            jobs: default_jobs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level used when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DigestConfig {
    /// Lookback window in hours
    #[serde(default = "default_hours_back")]
    pub hours_back: u32,
    /// Maximum entries per digest, clamped to [1, 100] on resolve
    #[serde(default = "default_max_items")]
    pub max_items: i64,
    /// Prefix placed in the subject tag, e.g. "[News Digest:US]"
    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,
    /// Stop processing remaining jobs after the first failure
    #[serde(default)]
    pub fail_fast: bool,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            hours_back: default_hours_back(),
            max_items: default_max_items(),
            subject_prefix: default_subject_prefix(),
            fail_fast: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MailConfig {
    /// Sender address
    #[serde(default)]
    pub from: String,
    /// Recipient address
    #[serde(default)]
    pub to: String,
}

/// OAuth client and refresh token for the Gmail API
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GmailConfig {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Request timeout in seconds, applied to feed fetches and mail API calls
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
    /// HTTP proxy URL for feed fetching (e.g., "http://127.0.0.1:7890" or "socks5://127.0.0.1:1080")
    #[serde(default)]
    pub proxy_url: Option<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_timeout(),
            proxy_url: None,
        }
    }
}

/// One keyword/feed pair as written in the config file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobConfig {
    pub tag: String,
    pub keyword: String,
    pub feed_url: String,
}

/// Everything the digest run needs, validated
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub params: DigestParams,
    pub jobs: Vec<Job>,
    pub from: String,
    pub to: String,
    pub subject_prefix: String,
    pub fail_fast: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_hours_back() -> u32 {
    24
}

fn default_max_items() -> i64 {
    MAX_ITEMS_LIMIT as i64
}

fn default_subject_prefix() -> String {
    "News Digest".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_jobs() -> Vec<JobConfig> {
    vec![
        JobConfig {
            tag: "KR".to_string(),
            keyword: KEYWORD_KR.to_string(),
            feed_url: DEFAULT_RSS_URL_KR.to_string(),
        },
        JobConfig {
            tag: "US".to_string(),
            keyword: KEYWORD_US.to_string(),
            feed_url: DEFAULT_RSS_URL_US.to_string(),
        },
    ]
}

/// Clamp a requested item cap into [1, MAX_ITEMS_LIMIT]
pub fn clamp_max_items(requested: i64) -> usize {
    requested.clamp(1, MAX_ITEMS_LIMIT as i64) as usize
}

fn parse_env_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{} must be an integer, got '{}'", key, value)))
}

impl AppConfig {
    /// Load configuration from `path`, or the default location, or defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path.map(Path::to_path_buf).unwrap_or_else(Self::config_path);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content).map_err(|e| {
                Error::Config(format!("{}: {}", config_path.display(), e))
            })
        } else if path.is_some() {
            Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )))
        } else {
            Ok(Self::default())
        }
    }

    /// Get the configuration file path
    /// Always uses ~/.config/newsdigest/config.toml on all platforms
    pub fn config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".config")
            .join("newsdigest")
            .join("config.toml")
    }

    /// Apply overrides from the process environment (after `.env` is loaded)
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary lookup. Empty values are ignored.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(to) = get("TO_EMAIL") {
            self.mail.to = to;
        }
        if let Some(from) = get("FROM_EMAIL") {
            self.mail.from = from;
        }
        if let Some(hours) = get("HOURS_BACK") {
            self.digest.hours_back = parse_env_number("HOURS_BACK", &hours)?;
        }
        if let Some(max_items) = get("MAX_ITEMS") {
            self.digest.max_items = parse_env_number("MAX_ITEMS", &max_items)?;
        }
        if let Some(timeout) = get("REQUEST_TIMEOUT_SECS") {
            self.sync.request_timeout_secs = parse_env_number("REQUEST_TIMEOUT_SECS", &timeout)?;
        }
        if let Some(client_id) = get("GOOGLE_CLIENT_ID") {
            self.gmail.client_id = Some(client_id);
        }
        if let Some(client_secret) = get("GOOGLE_CLIENT_SECRET") {
            self.gmail.client_secret = Some(client_secret);
        }
        if let Some(refresh_token) = get("GOOGLE_REFRESH_TOKEN") {
            self.gmail.refresh_token = Some(refresh_token);
        }

        for job in &mut self.jobs {
            let key = format!("RSS_URL_{}", job.tag.trim().to_ascii_uppercase());
            if let Some(url) = get(&key) {
                job.feed_url = url;
            }
        }

        Ok(())
    }

    /// Validate and resolve into the parameters of one run
    pub fn resolve(&self) -> Result<RunSettings> {
        let to = required(&self.mail.to, "mail.to (TO_EMAIL)")?;
        let from = required(&self.mail.from, "mail.from (FROM_EMAIL)")?;
        for (label, addr) in [("recipient", &to), ("sender", &from)] {
            addr.parse::<Mailbox>()
                .map_err(|e| Error::Config(format!("Invalid {} address '{}': {}", label, addr, e)))?;
        }

        Ok(RunSettings {
            params: self.digest_params()?,
            jobs: self.resolve_jobs()?,
            from,
            to,
            subject_prefix: self.digest.subject_prefix.clone(),
            fail_fast: self.digest.fail_fast,
        })
    }

    /// Window and cap, without requiring any mail settings
    pub fn digest_params(&self) -> Result<DigestParams> {
        if self.digest.hours_back == 0 {
            return Err(Error::Config("hours_back must be at least 1".to_string()));
        }
        if self.digest.hours_back > MAX_HOURS_BACK {
            return Err(Error::Config(format!(
                "hours_back must be at most {}, got {}",
                MAX_HOURS_BACK, self.digest.hours_back
            )));
        }
        if self.sync.request_timeout_secs == 0 {
            return Err(Error::Config(
                "request_timeout_secs must be at least 1".to_string(),
            ));
        }

        Ok(DigestParams {
            hours_back: self.digest.hours_back,
            max_items: clamp_max_items(self.digest.max_items),
        })
    }

    /// Validated job list
    pub fn resolve_jobs(&self) -> Result<Vec<Job>> {
        if self.jobs.is_empty() {
            return Err(Error::Config("No jobs configured".to_string()));
        }

        let mut jobs = Vec::with_capacity(self.jobs.len());
        for job in &self.jobs {
            let tag = job.tag.trim();
            if tag.is_empty() {
                return Err(Error::Config(format!(
                    "Job for feed '{}' has an empty tag",
                    job.feed_url
                )));
            }
            let url = Url::parse(job.feed_url.trim()).map_err(|e| {
                Error::Config(format!("Job {}: invalid feed URL '{}': {}", tag, job.feed_url, e))
            })?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(Error::Config(format!(
                    "Job {}: feed URL must be http(s), got '{}'",
                    tag, job.feed_url
                )));
            }
            jobs.push(Job {
                tag: tag.to_string(),
                keyword: job.keyword.trim().to_string(),
                feed_url: job.feed_url.trim().to_string(),
            });
        }

        Ok(jobs)
    }
}

fn required(value: &str, name: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::Config(format!("Missing required setting: {}", name)));
    }
    Ok(value.to_string())
}
