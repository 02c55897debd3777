mod gmail;
mod message;
pub mod oauth;

pub use gmail::{GmailCredentials, GmailSender};
pub use message::build_mime;

use crate::Result;

/// A fully rendered email ready for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text_body: String,
    pub html_body: String,
}

/// Delivery capability for rendered digests
#[async_trait::async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> Result<()>;
}
