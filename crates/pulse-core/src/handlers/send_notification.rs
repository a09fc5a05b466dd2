use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::analytics::{SuggestionTable, aggregate};
use crate::domain::{SmtpSettings, TaskError, User};
use crate::ports::{Clock, EmailMessage, EmailSender, HrRepository, SlackAlert, SlackSender};
use crate::typed::{Handler, SendNotification};

/// Alerts HR about an employee over Slack and email.
///
/// Both channels are best-effort: a failed send is logged and the task
/// still succeeds.
pub struct SendNotificationHandler {
    repo: Arc<dyn HrRepository>,
    slack: Arc<dyn SlackSender>,
    email: Arc<dyn EmailSender>,
    suggestions: Arc<SuggestionTable>,
    clock: Arc<dyn Clock>,
    smtp: SmtpSettings,
    alert_email: Option<String>,
}

impl SendNotificationHandler {
    pub fn new(
        repo: Arc<dyn HrRepository>,
        slack: Arc<dyn SlackSender>,
        email: Arc<dyn EmailSender>,
        suggestions: Arc<SuggestionTable>,
        clock: Arc<dyn Clock>,
        smtp: SmtpSettings,
        alert_email: Option<String>,
    ) -> Self {
        Self {
            repo,
            slack,
            email,
            suggestions,
            clock,
            smtp,
            alert_email: alert_email.filter(|a| !a.is_empty()),
        }
    }

    /// Latest stored score of the user, 0 when none exists yet.
    async fn latest_score(&self, user: &User) -> Result<f64, TaskError> {
        let risks = self.repo.list_attrition_risks(user.id).await?;
        Ok(risks.last().map_or(0.0, |r| r.risk_score))
    }

    /// Retention actions for the user in their company's language.
    async fn recommended_actions(&self, user: &User) -> Result<Vec<String>, TaskError> {
        let company = self.repo.get_company(user.company_id).await?;
        let responses = self.repo.get_responses_by_user(user.id).await?;
        let active = self.repo.count_active_surveys(user.company_id).await?;
        let features = aggregate(user, &responses, active, self.clock.now());
        Ok(self.suggestions.suggestions(&features, &company.language))
    }
}

pub(crate) fn alert_subject(employee: &str) -> String {
    format!("Churn Risk Alert: {employee}")
}

pub(crate) fn alert_body(employee: &str, message: &str, risk_score: f64, actions: &[String]) -> String {
    let mut body = format!(
        "<h2>High Churn Risk Alert</h2>\n\
         <p><strong>Employee:</strong> {employee}</p>\n\
         <p><strong>Risk Score:</strong> {:.0}%</p>\n\
         <p><strong>Alert:</strong> {message}</p>\n",
        risk_score * 100.0
    );
    if !actions.is_empty() {
        body.push_str("<p><strong>Recommended Actions:</strong></p>\n<ul>\n");
        for action in actions {
            body.push_str(&format!("<li>{action}</li>\n"));
        }
        body.push_str("</ul>\n");
    }
    body.push_str("<p>This is an automated alert from Pulse HR Analytics</p>\n");
    body
}

#[async_trait]
impl Handler<SendNotification> for SendNotificationHandler {
    async fn handle(&self, task: SendNotification) -> Result<(), TaskError> {
        let user = self.repo.get_user(task.user_id).await?;
        let risk_score = self.latest_score(&user).await?;
        info!(user_id = user.id, kind = %task.notification_type, risk_score, "sending notification");

        let alert = SlackAlert {
            employee: user.name.clone(),
            message: task.message.clone(),
            risk_score,
        };
        match self.slack.send(&alert).await {
            Ok(()) => debug!(user_id = user.id, "slack alert sent"),
            Err(e) => warn!(user_id = user.id, error = %e, "slack alert failed"),
        }

        let Some(to) = &self.alert_email else {
            debug!(user_id = user.id, "no alert recipient, email skipped");
            return Ok(());
        };
        // the Slack alert is already out, so a failed lookup must not retry the task
        let actions = match self.recommended_actions(&user).await {
            Ok(actions) => actions,
            Err(e) => {
                warn!(user_id = user.id, error = %e, "recommended actions unavailable");
                Vec::new()
            }
        };
        let message = EmailMessage {
            to: to.clone(),
            subject: alert_subject(&user.name),
            body: alert_body(&user.name, &task.message, risk_score, &actions),
            html: true,
        };
        match self.email.send(&self.smtp, &message).await {
            Ok(()) => debug!(user_id = user.id, "email alert sent"),
            Err(e) => warn!(user_id = user.id, error = %e, "email alert failed"),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alert_body_lists_actions_and_rounds_score() {
        let body = alert_body(
            "Ravi",
            "Employee has high churn risk: 0.91",
            0.912,
            &["Mentorship".to_string()],
        );
        assert!(body.contains("<strong>Risk Score:</strong> 91%"));
        assert!(body.contains("<li>Mentorship</li>"));
        assert_eq!(alert_subject("Ravi"), "Churn Risk Alert: Ravi");
    }

    #[test]
    fn alert_body_without_actions_has_no_list() {
        let body = alert_body("Ravi", "msg", 0.75, &[]);
        assert!(!body.contains("<ul>"));
    }
}
