use crate::domain::ports::Mailer;
use crate::error::Result;
use async_trait::async_trait;

/// Mailer that writes each message to the log instead of a mail server.
///
/// Used by the command-line binary, which has no outbound transport.
#[derive(Debug, Default, Clone)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<()> {
        tracing::info!(recipient, subject, body, "mail sent");
        Ok(())
    }
}
