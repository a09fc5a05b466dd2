//! Slack incoming-webhook sender.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::debug;

use crate::ports::{NotifyError, SlackAlert, SlackSender};

/// Placeholder URL shipped in sample env files; treated as unset.
const PLACEHOLDER_WEBHOOK: &str = "https://hooks.slack.com/services/YOUR/WEBHOOK/URL";

pub struct SlackWebhookSender {
    client: Client,
    webhook_url: Option<String>,
}

impl SlackWebhookSender {
    pub fn new(
        webhook_url: Option<String>,
        timeout: std::time::Duration,
    ) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        let webhook_url = webhook_url.filter(|u| !u.is_empty() && u != PLACEHOLDER_WEBHOOK);
        Ok(Self {
            client,
            webhook_url,
        })
    }

    pub fn is_configured(&self) -> bool {
        self.webhook_url.is_some()
    }
}

fn payload(alert: &SlackAlert, ts: i64) -> serde_json::Value {
    json!({
        "attachments": [{
            "color": alert.color(),
            "title": "High Churn Risk Alert",
            "text": alert.message,
            "fields": [
                { "title": "Employee", "value": alert.employee, "short": true },
                { "title": "Risk Score", "value": format!("{:.0}%", alert.risk_score * 100.0), "short": true },
            ],
            "footer": "Pulse HR Analytics",
            "ts": ts,
        }]
    })
}

#[async_trait]
impl SlackSender for SlackWebhookSender {
    async fn send(&self, alert: &SlackAlert) -> Result<(), NotifyError> {
        let Some(url) = &self.webhook_url else {
            debug!("slack webhook not configured, skipping alert");
            return Ok(());
        };

        let body = payload(alert, chrono::Utc::now().timestamp());
        let resp = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected(status.as_u16()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn alert(risk_score: f64) -> SlackAlert {
        SlackAlert {
            employee: "Meena".into(),
            message: "Employee has high churn risk: 0.85".into(),
            risk_score,
        }
    }

    #[test]
    fn payload_carries_colour_and_percentage() {
        let body = payload(&alert(0.85), 1_700_000_000);
        let attachment = &body["attachments"][0];
        assert_eq!(attachment["color"], "danger");
        assert_eq!(attachment["fields"][1]["value"], "85%");
        assert_eq!(attachment["ts"], 1_700_000_000);
    }

    #[tokio::test]
    async fn posts_to_webhook() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/hook")
            .match_body(mockito::Matcher::Regex(r#""color":"warning""#.to_string()))
            .with_status(200)
            .create_async()
            .await;

        let sender = SlackWebhookSender::new(
            Some(format!("{}/hook", server.url())),
            Duration::from_secs(2),
        )
        .unwrap();
        sender.send(&alert(0.75)).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rejected_post_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/hook")
            .with_status(500)
            .create_async()
            .await;

        let sender = SlackWebhookSender::new(
            Some(format!("{}/hook", server.url())),
            Duration::from_secs(2),
        )
        .unwrap();
        let err = sender.send(&alert(0.9)).await.unwrap_err();
        assert_eq!(err, NotifyError::Rejected(500));
    }

    #[tokio::test]
    async fn unconfigured_webhook_is_a_silent_no_op() {
        for url in [None, Some(String::new()), Some(PLACEHOLDER_WEBHOOK.to_string())] {
            let sender = SlackWebhookSender::new(url, Duration::from_secs(1)).unwrap();
            assert!(!sender.is_configured());
            sender.send(&alert(0.9)).await.unwrap();
        }
    }
}
