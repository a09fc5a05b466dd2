//! Senders that record what they were asked to send, for tests.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::SmtpSettings;
use crate::ports::{EmailMessage, EmailSender, NotifyError, SlackAlert, SlackSender};

#[derive(Debug, Default)]
pub struct RecordingEmailSender {
    sent: Mutex<Vec<(SmtpSettings, EmailMessage)>>,
    failure: Mutex<Option<NotifyError>>,
}

impl RecordingEmailSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every later send fails with `error` until cleared with `None`.
    pub fn fail_with(&self, error: Option<NotifyError>) {
        *self.failure.lock().unwrap_or_else(|e| e.into_inner()) = error;
    }

    pub fn sent(&self) -> Vec<(SmtpSettings, EmailMessage)> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send(&self, smtp: &SmtpSettings, message: &EmailMessage) -> Result<(), NotifyError> {
        let failure = self.failure.lock().unwrap_or_else(|e| e.into_inner()).clone();
        if let Some(err) = failure {
            return Err(err);
        }
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((smtp.clone(), message.clone()));
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RecordingSlackSender {
    sent: Mutex<Vec<SlackAlert>>,
    failure: Mutex<Option<NotifyError>>,
}

impl RecordingSlackSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_with(&self, error: Option<NotifyError>) {
        *self.failure.lock().unwrap_or_else(|e| e.into_inner()) = error;
    }

    pub fn sent(&self) -> Vec<SlackAlert> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl SlackSender for RecordingSlackSender {
    async fn send(&self, alert: &SlackAlert) -> Result<(), NotifyError> {
        let failure = self.failure.lock().unwrap_or_else(|e| e.into_inner()).clone();
        if let Some(err) = failure {
            return Err(err);
        }
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(alert.clone());
        Ok(())
    }
}
