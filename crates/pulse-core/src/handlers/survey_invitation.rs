use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::domain::{SmtpSettings, SurveyId, TaskError, UserId};
use crate::ports::{EmailMessage, EmailSender, HrRepository};
use crate::typed::{Handler, SurveyInvitation};

/// Emails a survey link, using the company's SMTP settings when it has
/// them and the process-wide defaults otherwise.
pub struct SurveyInvitationHandler {
    repo: Arc<dyn HrRepository>,
    email: Arc<dyn EmailSender>,
    default_smtp: SmtpSettings,
    link_base: String,
}

impl SurveyInvitationHandler {
    pub fn new(
        repo: Arc<dyn HrRepository>,
        email: Arc<dyn EmailSender>,
        default_smtp: SmtpSettings,
        link_base: impl Into<String>,
    ) -> Self {
        Self {
            repo,
            email,
            default_smtp,
            link_base: link_base.into(),
        }
    }

    /// The user id doubles as the response token.
    pub fn survey_link(&self, survey_id: SurveyId, user_id: UserId) -> String {
        format!(
            "{}/survey/{survey_id}?token={user_id}",
            self.link_base.trim_end_matches('/')
        )
    }
}

pub(crate) fn invitation_subject(title: &str) -> String {
    format!("New Survey: {title}")
}

pub(crate) fn invitation_body(title: &str, link: &str) -> String {
    format!(
        "Hi there!\n\n\
         You have been invited to participate in a new survey: \"{title}\"\n\n\
         Please click the link below to complete the survey:\n\
         {link}\n\n\
         This survey will help us improve your work experience.\n\n\
         Thank you!\n\
         Pulse HR Team\n"
    )
}

#[async_trait]
impl Handler<SurveyInvitation> for SurveyInvitationHandler {
    async fn handle(&self, task: SurveyInvitation) -> Result<(), TaskError> {
        let survey = self.repo.get_survey(task.survey_id).await?;
        let company = self.repo.get_company(survey.company_id).await?;

        let smtp = match company.smtp_settings() {
            Some(settings) => settings,
            None => &self.default_smtp,
        };

        let link = self.survey_link(survey.id, task.user_id);
        let message = EmailMessage {
            to: task.email.clone(),
            subject: invitation_subject(&survey.title),
            body: invitation_body(&survey.title, &link),
            html: false,
        };

        if let Err(e) = self.email.send(smtp, &message).await {
            warn!(survey_id = survey.id, to = %task.email, error = %e, "survey invitation not sent");
            return Err(e.into());
        }
        info!(survey_id = survey.id, user_id = task.user_id, smtp_host = %smtp.host, "survey invitation sent");
        Ok(())
    }
}
