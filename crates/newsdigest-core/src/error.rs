use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Feed fetch error: {0}")]
    Fetch(String),

    #[error("Feed parsing error: {0}")]
    FeedParse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Authorization error: {0}")]
    Auth(String),

    #[error("Mail send error: {0}")]
    Send(String),

    #[error("Mail build error: {0}")]
    MailBuild(#[from] lettre::error::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
