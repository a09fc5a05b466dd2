//! Outbound notification ports: email and Slack.

use async_trait::async_trait;

use crate::domain::{SmtpSettings, TaskError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub html: bool,
}

/// A churn alert posted to the Slack webhook.
#[derive(Debug, Clone, PartialEq)]
pub struct SlackAlert {
    pub employee: String,
    pub message: String,
    pub risk_score: f64,
}

impl SlackAlert {
    /// Attachment colour used by Slack.
    pub fn color(&self) -> &'static str {
        if self.risk_score > 0.8 { "danger" } else { "warning" }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NotifyError {
    #[error("{0} not configured")]
    NotConfigured(&'static str),

    /// The message cannot be built, e.g. a malformed address.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("remote rejected message with status {0}")]
    Rejected(u16),
}

impl NotifyError {
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            NotifyError::NotConfigured(_) | NotifyError::InvalidMessage(_)
        )
    }
}

impl From<NotifyError> for TaskError {
    fn from(err: NotifyError) -> Self {
        if err.is_permanent() {
            TaskError::validation(err.to_string())
        } else {
            TaskError::transient(err.to_string())
        }
    }
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, smtp: &SmtpSettings, message: &EmailMessage) -> Result<(), NotifyError>;
}

#[async_trait]
pub trait SlackSender: Send + Sync {
    /// Unconfigured senders return `Ok(())` without sending.
    async fn send(&self, alert: &SlackAlert) -> Result<(), NotifyError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorKind;

    #[test]
    fn alert_colour_tracks_severity() {
        let mut alert = SlackAlert {
            employee: "Asha".into(),
            message: "Employee has high churn risk: 0.75".into(),
            risk_score: 0.75,
        };
        assert_eq!(alert.color(), "warning");
        alert.risk_score = 0.81;
        assert_eq!(alert.color(), "danger");
    }

    #[test]
    fn transport_failures_are_retryable() {
        let err: TaskError = NotifyError::Transport("connection refused".into()).into();
        assert_eq!(err.kind(), ErrorKind::Transient);

        let err: TaskError = NotifyError::NotConfigured("smtp").into();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err: TaskError = NotifyError::InvalidMessage("bad address".into()).into();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
