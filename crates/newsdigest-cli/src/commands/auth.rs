use std::io::{self, BufRead, Write};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use newsdigest_core::mail::oauth::{consent_url, exchange_code, extract_code};
use newsdigest_core::AppConfig;

const TOKEN_FILE: &str = "oauth_token.json";

pub async fn run(config: &AppConfig, redirect_uri: &str) -> Result<()> {
    let client_id = config
        .gmail
        .client_id
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| anyhow!("Set gmail.client_id or GOOGLE_CLIENT_ID first"))?;
    let client_secret = config
        .gmail
        .client_secret
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| anyhow!("Set gmail.client_secret or GOOGLE_CLIENT_SECRET first"))?;

    let url = consent_url(client_id, redirect_uri)?;
    println!("Open this URL in a browser and grant access:\n");
    println!("  {}\n", url);
    println!("After approving, paste the redirected URL (or just the code) here:");
    print!("> ");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().lock().read_line(&mut input)?;
    let code = extract_code(&input).ok_or_else(|| anyhow!("No authorization code found"))?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.sync.request_timeout_secs))
        .build()?;
    let tokens = exchange_code(&client, client_id, client_secret, &code, redirect_uri).await?;

    let json = serde_json::to_string_pretty(&tokens)?;
    std::fs::write(TOKEN_FILE, json).with_context(|| format!("Failed to write {}", TOKEN_FILE))?;
    println!("\nTokens saved to {}", TOKEN_FILE);

    match &tokens.refresh_token {
        Some(refresh_token) => {
            println!("\nAdd this to your .env or config.toml:");
            println!("  GOOGLE_REFRESH_TOKEN={}", refresh_token);
        }
        None => {
            println!("\nNo refresh token was returned.");
            println!("Revoke the app's access in your Google account and run `newsdigest auth` again.");
        }
    }

    Ok(())
}
