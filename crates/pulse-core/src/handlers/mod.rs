//! Task handlers, one per [`TaskKind`](crate::domain::TaskKind).

pub mod calculate_churn;
pub mod process_survey;
pub mod send_notification;
pub mod survey_invitation;

pub use self::calculate_churn::{CalculateChurnHandler, HIGH_RISK_THRESHOLD};
pub use self::process_survey::ProcessSurveyHandler;
pub use self::send_notification::SendNotificationHandler;
pub use self::survey_invitation::SurveyInvitationHandler;

use std::sync::Arc;

use crate::analytics::{RiskScorer, SentimentEstimator, SuggestionTable};
use crate::app::{AppBuilder, QueueClient};
use crate::domain::SmtpSettings;
use crate::ports::{Clock, EmailSender, HrRepository, SlackSender};
use crate::typed::{
    CalculateChurn, ProcessSurvey, RegistryError, SendNotification, SurveyInvitation,
};

/// Everything the handlers share.
#[derive(Clone)]
pub struct HandlerDeps {
    pub repo: Arc<dyn HrRepository>,
    pub estimator: Arc<SentimentEstimator>,
    pub scorer: RiskScorer,
    pub suggestions: Arc<SuggestionTable>,
    pub email: Arc<dyn EmailSender>,
    pub slack: Arc<dyn SlackSender>,
    pub client: QueueClient,
    pub clock: Arc<dyn Clock>,
    /// SMTP settings for companies without their own.
    pub default_smtp: SmtpSettings,
    pub alert_email: Option<String>,
    pub survey_link_base: String,
}

/// Register the four pipeline handlers.
pub fn register_all(builder: AppBuilder, deps: HandlerDeps) -> Result<AppBuilder, RegistryError> {
    builder
        .register::<ProcessSurvey, _>(ProcessSurveyHandler::new(
            Arc::clone(&deps.repo),
            Arc::clone(&deps.estimator),
            deps.client.clone(),
        ))?
        .register::<CalculateChurn, _>(CalculateChurnHandler::new(
            Arc::clone(&deps.repo),
            deps.scorer,
            deps.client.clone(),
            Arc::clone(&deps.clock),
        ))?
        .register::<SendNotification, _>(SendNotificationHandler::new(
            Arc::clone(&deps.repo),
            deps.slack,
            Arc::clone(&deps.email),
            deps.suggestions,
            Arc::clone(&deps.clock),
            deps.default_smtp.clone(),
            deps.alert_email,
        ))?
        .register::<SurveyInvitation, _>(SurveyInvitationHandler::new(
            deps.repo,
            deps.email,
            deps.default_smtp,
            deps.survey_link_base,
        ))
}
