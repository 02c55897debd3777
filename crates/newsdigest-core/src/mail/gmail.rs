use std::time::{Duration, Instant};

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::message::build_mime;
use super::oauth::refresh_access_token;
use super::{MailSender, OutgoingMail};
use crate::config::GmailConfig;
use crate::{Error, Result};

const SEND_URL: &str = "https://gmail.googleapis.com/gmail/v1/users/me/messages/send";
/// Refresh this long before Google's stated expiry
const TOKEN_EXPIRY_MARGIN_SECS: u64 = 60;

/// OAuth client plus the long-lived refresh token
#[derive(Debug, Clone)]
pub struct GmailCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

impl GmailCredentials {
    pub fn from_config(config: &GmailConfig) -> Result<Self> {
        fn require(value: &Option<String>, name: &str) -> Result<String> {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or_else(|| Error::Config(format!("Missing required setting: {}", name)))
        }

        Ok(Self {
            client_id: require(&config.client_id, "gmail.client_id (GOOGLE_CLIENT_ID)")?,
            client_secret: require(
                &config.client_secret,
                "gmail.client_secret (GOOGLE_CLIENT_SECRET)",
            )?,
            refresh_token: require(
                &config.refresh_token,
                "gmail.refresh_token (GOOGLE_REFRESH_TOKEN)",
            )?,
        })
    }
}

#[derive(Serialize)]
struct SendRequest<'a> {
    raw: &'a str,
}

#[derive(Deserialize)]
struct SendResponse {
    id: Option<String>,
}

struct CachedToken {
    access_token: String,
    valid_until: Instant,
}

/// Sends mail through the Gmail REST API using a refreshed OAuth access token
pub struct GmailSender {
    client: Client,
    credentials: GmailCredentials,
    token: Mutex<Option<CachedToken>>,
}

impl GmailSender {
    pub fn new(credentials: GmailCredentials, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            client,
            credentials,
            token: Mutex::new(None),
        })
    }

    async fn access_token(&self) -> Result<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() < token.valid_until {
                return Ok(token.access_token.clone());
            }
        }

        tracing::debug!("Refreshing Gmail access token");
        let tokens = refresh_access_token(
            &self.client,
            &self.credentials.client_id,
            &self.credentials.client_secret,
            &self.credentials.refresh_token,
        )
        .await?;

        let lifetime = tokens
            .expires_in
            .unwrap_or(0)
            .saturating_sub(TOKEN_EXPIRY_MARGIN_SECS);
        *cached = Some(CachedToken {
            access_token: tokens.access_token.clone(),
            valid_until: Instant::now() + Duration::from_secs(lifetime),
        });

        Ok(tokens.access_token)
    }
}

/// Gmail expects the whole message base64url-encoded in the `raw` field
pub fn encode_raw(mime: &[u8]) -> String {
    URL_SAFE.encode(mime)
}

#[async_trait::async_trait]
impl MailSender for GmailSender {
    async fn send(&self, mail: &OutgoingMail) -> Result<()> {
        let mime = build_mime(mail)?;
        let raw = encode_raw(&mime);
        let token = self.access_token().await?;

        let response = self
            .client
            .post(SEND_URL)
            .bearer_auth(token)
            .json(&SendRequest { raw: &raw })
            .send()
            .await
            .map_err(|e| Error::Send(format!("Gmail API request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Send(format!(
                "Gmail API returned HTTP {}: {}",
                status,
                body.trim()
            )));
        }

        let sent: SendResponse = response
            .json()
            .await
            .map_err(|e| Error::Send(format!("Failed to parse Gmail response: {}", e)))?;
        tracing::info!(
            "Gmail accepted message '{}' (id {})",
            mail.subject,
            sent.id.as_deref().unwrap_or("unknown")
        );

        Ok(())
    }
}
