pub mod config;
pub mod digest;
pub mod error;
pub mod feed;
pub mod mail;

pub use config::{AppConfig, RunSettings};
pub use error::{Error, Result};
