use lettre::message::{Mailbox, Message, MultiPart};

use super::OutgoingMail;
use crate::{Error, Result};

fn mailbox(addr: &str, label: &str) -> Result<Mailbox> {
    addr.parse()
        .map_err(|e| Error::Config(format!("Invalid {} address '{}': {}", label, addr, e)))
}

/// Build an RFC 5322 `multipart/alternative` message (plain text + HTML)
pub fn build_mime(mail: &OutgoingMail) -> Result<Vec<u8>> {
    let message = Message::builder()
        .from(mailbox(&mail.from, "sender")?)
        .to(mailbox(&mail.to, "recipient")?)
        .subject(mail.subject.as_str())
        .multipart(MultiPart::alternative_plain_html(
            mail.text_body.clone(),
            mail.html_body.clone(),
        ))?;

    Ok(message.formatted())
}
