//! Email sender that logs instead of delivering.

use async_trait::async_trait;
use tracing::info;

use crate::domain::SmtpSettings;
use crate::ports::{EmailMessage, EmailSender, NotifyError};

/// Development sender: checks the SMTP settings and logs the message.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEmailSender;

#[async_trait]
impl EmailSender for TracingEmailSender {
    async fn send(&self, smtp: &SmtpSettings, message: &EmailMessage) -> Result<(), NotifyError> {
        if !smtp.is_configured() {
            return Err(NotifyError::NotConfigured("smtp"));
        }
        info!(
            smtp_host = %smtp.host,
            smtp_port = smtp.port,
            from = %smtp.from,
            to = %message.to,
            subject = %message.subject,
            "email delivered to log"
        );
        Ok(())
    }
}
