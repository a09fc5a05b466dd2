//! SMTP delivery via lettre.

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::debug;

use crate::domain::SmtpSettings;
use crate::ports::{EmailMessage, EmailSender, NotifyError};

/// Implicit TLS port; every other port upgrades with STARTTLS.
const SMTPS_PORT: u16 = 465;

/// Sends mail through the SMTP server named by the settings of each call,
/// so one sender serves every company.
#[derive(Debug, Clone)]
pub struct SmtpEmailSender {
    timeout: Duration,
}

impl SmtpEmailSender {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn transport(&self, smtp: &SmtpSettings) -> Result<AsyncSmtpTransport<Tokio1Executor>, NotifyError> {
        let builder = if smtp.port == SMTPS_PORT {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp.host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)
        }
        .map_err(|e| NotifyError::Transport(e.to_string()))?;

        Ok(builder
            .port(smtp.port)
            .timeout(Some(self.timeout))
            .credentials(Credentials::new(smtp.user.clone(), smtp.password.clone()))
            .build())
    }
}

impl Default for SmtpEmailSender {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

fn mailbox(address: &str) -> Result<Mailbox, NotifyError> {
    address
        .parse()
        .map_err(|e| NotifyError::InvalidMessage(format!("bad address '{address}': {e}")))
}

/// Build the wire message. Bad addresses are permanent faults.
pub(crate) fn build_message(smtp: &SmtpSettings, message: &EmailMessage) -> Result<Message, NotifyError> {
    let content_type = if message.html {
        ContentType::TEXT_HTML
    } else {
        ContentType::TEXT_PLAIN
    };
    Message::builder()
        .from(mailbox(&smtp.from)?)
        .to(mailbox(&message.to)?)
        .subject(message.subject.clone())
        .header(content_type)
        .body(message.body.clone())
        .map_err(|e| NotifyError::InvalidMessage(e.to_string()))
}

#[async_trait]
impl EmailSender for SmtpEmailSender {
    async fn send(&self, smtp: &SmtpSettings, message: &EmailMessage) -> Result<(), NotifyError> {
        if !smtp.is_configured() {
            return Err(NotifyError::NotConfigured("smtp"));
        }
        let email = build_message(smtp, message)?;
        let transport = self.transport(smtp)?;

        let response = transport
            .send(email)
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        debug!(
            smtp_host = %smtp.host,
            to = %message.to,
            code = %response.code(),
            "email accepted by smtp server"
        );
        Ok(())
    }
}
