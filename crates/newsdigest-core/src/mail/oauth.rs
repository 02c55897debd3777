//! Google OAuth 2.0 helpers for the `gmail.send` scope.
//!
//! The consent ceremony (`consent_url` + `exchange_code`) runs once to obtain a
//! refresh token; every digest run then calls `refresh_access_token`.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{Error, Result};

pub const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
pub const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const GMAIL_SEND_SCOPE: &str = "https://www.googleapis.com/auth/gmail.send";
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost";

/// Raw token endpoint response; Google reports failures in the same body
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenResponse {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
    pub scope: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Tokens returned by a successful exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<u64>,
    pub scope: Option<String>,
}

impl TokenResponse {
    pub fn into_token_set(self) -> Result<TokenSet> {
        if let Some(error) = self.error {
            let detail = self.error_description.unwrap_or_default();
            return Err(Error::Auth(format!("{} {}", error, detail).trim().to_string()));
        }
        let access_token = self
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::Auth("Token response has no access_token".to_string()))?;

        Ok(TokenSet {
            access_token,
            refresh_token: self.refresh_token,
            expires_in: self.expires_in,
            scope: self.scope,
        })
    }
}

/// URL the user opens to grant offline `gmail.send` access
pub fn consent_url(client_id: &str, redirect_uri: &str) -> Result<Url> {
    let url = Url::parse_with_params(
        AUTH_URL,
        &[
            ("client_id", client_id),
            ("redirect_uri", redirect_uri),
            ("response_type", "code"),
            ("scope", GMAIL_SEND_SCOPE),
            ("access_type", "offline"),
            ("prompt", "consent"),
        ],
    )?;
    Ok(url)
}

/// Accepts either the full redirected URL or the bare authorization code
pub fn extract_code(input: &str) -> Option<String> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    match Url::parse(input) {
        Ok(url) => url
            .query_pairs()
            .find(|(key, _)| key == "code")
            .map(|(_, value)| value.into_owned())
            .filter(|code| !code.is_empty()),
        Err(_) => Some(input.to_string()),
    }
}

async fn post_token_form(client: &Client, form: &[(&str, &str)]) -> Result<TokenSet> {
    let response = client.post(TOKEN_URL).form(form).send().await?;
    let status = response.status();
    let body: TokenResponse = response
        .json()
        .await
        .map_err(|e| Error::Auth(format!("Unreadable token response (HTTP {}): {}", status, e)))?;

    if !status.is_success() && body.error.is_none() {
        return Err(Error::Auth(format!("Token endpoint returned HTTP {}", status)));
    }
    body.into_token_set()
}

/// Exchange an authorization code for access and refresh tokens
pub async fn exchange_code(
    client: &Client,
    client_id: &str,
    client_secret: &str,
    code: &str,
    redirect_uri: &str,
) -> Result<TokenSet> {
    post_token_form(
        client,
        &[
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("grant_type", "authorization_code"),
        ],
    )
    .await
}

/// Mint a fresh access token from a stored refresh token
pub async fn refresh_access_token(
    client: &Client,
    client_id: &str,
    client_secret: &str,
    refresh_token: &str,
) -> Result<TokenSet> {
    post_token_form(
        client,
        &[
            ("client_id", client_id),
            ("client_secret", client_secret),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ],
    )
    .await
}
