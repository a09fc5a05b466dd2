//! Producer-side operations of the CRUD layer: storing a survey answer and
//! inviting employees to a survey.

use std::sync::Arc;

use tracing::{info, warn};

use super::client::QueueClient;
use crate::analytics::SentimentEstimator;
use crate::domain::{CompanyId, NewSurveyResponse, Role, SurveyId, SurveyResponse, TaskId, UserId};
use crate::ports::{Clock, HrRepository, RepoError};
use crate::queue::QueueError;

/// The caller, as established by authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
    pub company_id: CompanyId,
    pub role: Role,
}

/// Request-scoped context handed to every producer operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestContext {
    pub user: AuthenticatedUser,
}

impl RequestContext {
    pub fn new(user: AuthenticatedUser) -> Self {
        Self { user }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IntakeError {
    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

pub struct SurveyIntake {
    repo: Arc<dyn HrRepository>,
    estimator: Arc<SentimentEstimator>,
    client: QueueClient,
    clock: Arc<dyn Clock>,
}

impl SurveyIntake {
    pub fn new(
        repo: Arc<dyn HrRepository>,
        estimator: Arc<SentimentEstimator>,
        client: QueueClient,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repo,
            estimator,
            client,
            clock,
        }
    }

    /// Store the caller's answers and queue them for re-scoring.
    ///
    /// The stored row starts with a quick estimate. If the queue is down the
    /// response is still returned; only the background scoring is skipped.
    pub async fn submit_response(
        &self,
        ctx: &RequestContext,
        survey_id: SurveyId,
        answers: Vec<String>,
        language: &str,
    ) -> Result<SurveyResponse, IntakeError> {
        let survey = self.repo.get_survey(survey_id).await?;
        if survey.company_id != ctx.user.company_id {
            return Err(IntakeError::Forbidden(format!(
                "survey {survey_id} belongs to another company"
            )));
        }

        let sentiment = self
            .estimator
            .estimate(&answers.join(" "), language)
            .await;

        let response = self
            .repo
            .create_response(NewSurveyResponse {
                survey_id,
                user_id: ctx.user.user_id,
                responses: answers,
                sentiment,
                created_at: self.clock.now(),
            })
            .await?;

        match self
            .client
            .enqueue_survey_processing(response.id, response.user_id, language)
            .await
        {
            Ok(task_id) => {
                info!(response_id = response.id, user_id = response.user_id, %task_id, "survey response queued for processing")
            }
            Err(e) => {
                warn!(response_id = response.id, user_id = response.user_id, error = %e, "survey processing not queued")
            }
        }

        Ok(response)
    }

    /// Queue one invitation per recipient. HR admins only.
    ///
    /// Recipients outside the caller's company are rejected before anything
    /// is queued.
    pub async fn invite(
        &self,
        ctx: &RequestContext,
        survey_id: SurveyId,
        recipients: &[UserId],
    ) -> Result<Vec<TaskId>, IntakeError> {
        if ctx.user.role != Role::HrAdmin {
            return Err(IntakeError::Forbidden(
                "only HR admins can send invitations".into(),
            ));
        }

        let survey = self.repo.get_survey(survey_id).await?;
        if survey.company_id != ctx.user.company_id {
            return Err(IntakeError::Forbidden(format!(
                "survey {survey_id} belongs to another company"
            )));
        }

        let mut users = Vec::with_capacity(recipients.len());
        for &user_id in recipients {
            let user = self.repo.get_user(user_id).await?;
            if user.company_id != ctx.user.company_id {
                return Err(IntakeError::Forbidden(format!(
                    "user {user_id} belongs to another company"
                )));
            }
            users.push(user);
        }

        let mut task_ids = Vec::with_capacity(users.len());
        for user in users {
            let task_id = self
                .client
                .enqueue_survey_invitation(survey_id, user.id, &user.email)
                .await?;
            task_ids.push(task_id);
        }

        info!(survey_id, invited = task_ids.len(), "survey invitations queued");
        Ok(task_ids)
    }
}
