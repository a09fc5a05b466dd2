use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::analytics::{RiskScorer, aggregate};
use crate::app::QueueClient;
use crate::domain::{AttritionRisk, NewAttritionRisk, TaskError, User};
use crate::ports::{Clock, HrRepository};
use crate::typed::{CalculateChurn, Handler, SendNotification};

/// Scores above this raise a high-churn alert.
pub const HIGH_RISK_THRESHOLD: f64 = 0.7;

/// Scores churn risk from stored responses and appends a risk row per user.
///
/// Running twice appends two rows with equal scores.
pub struct CalculateChurnHandler {
    repo: Arc<dyn HrRepository>,
    scorer: RiskScorer,
    client: QueueClient,
    clock: Arc<dyn Clock>,
}

impl CalculateChurnHandler {
    pub fn new(
        repo: Arc<dyn HrRepository>,
        scorer: RiskScorer,
        client: QueueClient,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repo,
            scorer,
            client,
            clock,
        }
    }

    async fn score_user(&self, user: &User) -> Result<AttritionRisk, TaskError> {
        let responses = self.repo.get_responses_by_user(user.id).await?;
        let active_surveys = self.repo.count_active_surveys(user.company_id).await?;
        let now = self.clock.now();

        let features = aggregate(user, &responses, active_surveys, now);
        let assessment = self.scorer.assess(&features);
        debug!(user_id = user.id, ?features, score = assessment.score, "churn features");

        let risk = self
            .repo
            .create_attrition_risk(NewAttritionRisk::new(
                user.id,
                assessment.score,
                assessment.factor_labels(),
                now,
            ))
            .await?;
        info!(user_id = user.id, risk_score = risk.risk_score, factors = ?risk.factors, "attrition risk stored");

        if risk.risk_score > HIGH_RISK_THRESHOLD {
            let message = format!("Employee has high churn risk: {:.2}", risk.risk_score);
            let task_id = self
                .client
                .enqueue_notification(user.id, SendNotification::HIGH_CHURN_RISK, &message)
                .await?;
            warn!(user_id = user.id, risk_score = risk.risk_score, %task_id, "high churn risk, alert queued");
        }
        Ok(risk)
    }
}

#[async_trait]
impl Handler<CalculateChurn> for CalculateChurnHandler {
    async fn handle(&self, task: CalculateChurn) -> Result<(), TaskError> {
        let users = if task.is_whole_company() {
            self.repo.list_users_by_company(task.company_id).await?
        } else {
            let user = self.repo.get_user(task.user_id).await?;
            if user.company_id != task.company_id {
                return Err(TaskError::validation(format!(
                    "user {} is not in company {}",
                    user.id, task.company_id
                )));
            }
            vec![user]
        };

        for user in &users {
            self.score_user(user).await?;
        }
        if task.is_whole_company() {
            info!(company_id = task.company_id, users = users.len(), "company churn sweep done");
        }
        Ok(())
    }
}
