use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::analytics::SentimentEstimator;
use crate::app::QueueClient;
use crate::domain::TaskError;
use crate::ports::HrRepository;
use crate::typed::{Handler, ProcessSurvey};

/// Re-scores a stored response and queues a churn recalculation for its
/// author.
pub struct ProcessSurveyHandler {
    repo: Arc<dyn HrRepository>,
    estimator: Arc<SentimentEstimator>,
    client: QueueClient,
}

impl ProcessSurveyHandler {
    pub fn new(
        repo: Arc<dyn HrRepository>,
        estimator: Arc<SentimentEstimator>,
        client: QueueClient,
    ) -> Self {
        Self {
            repo,
            estimator,
            client,
        }
    }
}

#[async_trait]
impl Handler<ProcessSurvey> for ProcessSurveyHandler {
    async fn handle(&self, task: ProcessSurvey) -> Result<(), TaskError> {
        let response = self.repo.get_response(task.response_id).await?;
        if response.user_id != task.user_id {
            return Err(TaskError::validation(format!(
                "response {} was not written by user {}",
                task.response_id, task.user_id
            )));
        }

        let estimate = self
            .estimator
            .estimate_detailed(&response.combined_text(), &task.language)
            .await;
        self.repo
            .update_response_sentiment(response.id, estimate.score)
            .await?;
        info!(
            response_id = response.id,
            user_id = task.user_id,
            sentiment = estimate.score,
            source = ?estimate.source,
            "response sentiment updated"
        );

        let user = self.repo.get_user(task.user_id).await?;
        let task_id = self
            .client
            .enqueue_churn_calculation(user.id, user.company_id)
            .await?;
        info!(user_id = user.id, company_id = user.company_id, %task_id, "churn recalculation queued");
        Ok(())
    }
}
