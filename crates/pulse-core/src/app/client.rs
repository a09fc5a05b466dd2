//! QueueClient: the producer side of the queue.
//!
//! Producers hand over a typed payload and get a task id back. Success means
//! the task is stored, not that it ran.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::domain::{
    CompanyId, Priority, ResponseId, SurveyId, TaskEnvelope, TaskId, TaskType, UserId,
};
use crate::ports::{Clock, IdGenerator};
use crate::queue::{Queue, QueueError};
use crate::typed::{
    CalculateChurn, PayloadCodec, ProcessSurvey, SendNotification, SurveyInvitation, Task,
};

/// Delay before a churn recalculation runs, so a burst of answers from one
/// user is scored once the burst is over.
pub const CHURN_RECALC_DELAY: Duration = Duration::from_secs(5 * 60);

/// Interval of the company-wide churn sweep.
pub const DAILY_ANALYSIS_DELAY: Duration = Duration::from_secs(24 * 60 * 60);

/// When a task becomes eligible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    At(DateTime<Utc>),
    After(Duration),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnqueueOptions {
    /// Falls back to the payload type's own class.
    pub priority: Option<Priority>,
    pub schedule: Option<Schedule>,
}

impl EnqueueOptions {
    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn run_at(mut self, at: DateTime<Utc>) -> Self {
        self.schedule = Some(Schedule::At(at));
        self
    }

    pub fn run_after(mut self, delay: Duration) -> Self {
        self.schedule = Some(Schedule::After(delay));
        self
    }
}

#[derive(Clone)]
pub struct QueueClient {
    queue: Arc<dyn Queue>,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
}

impl QueueClient {
    pub fn new(queue: Arc<dyn Queue>, ids: Arc<dyn IdGenerator>, clock: Arc<dyn Clock>) -> Self {
        Self { queue, ids, clock }
    }

    /// Encode `task` and store it.
    ///
    /// Encoding failures and an unavailable broker are both reported here,
    /// before anything is stored.
    pub async fn enqueue<T: Task>(
        &self,
        task: &T,
        options: EnqueueOptions,
    ) -> Result<TaskId, QueueError> {
        let payload = PayloadCodec::encode(task)?;
        let now = self.clock.now();
        let priority = options.priority.unwrap_or(T::PRIORITY);

        let not_before = match options.schedule {
            None => None,
            Some(Schedule::At(at)) => Some(at),
            Some(Schedule::After(delay)) => {
                let delay = chrono::Duration::from_std(delay)
                    .map_err(|e| QueueError::Encode(format!("delay out of range: {e}")))?;
                Some(now + delay)
            }
        };

        let envelope = TaskEnvelope::new(
            self.ids.generate_task_id(),
            TaskType::from(T::KIND),
            payload,
            priority,
            not_before,
            now,
        );

        self.queue.enqueue(envelope).await
    }

    pub async fn enqueue_survey_processing(
        &self,
        response_id: ResponseId,
        user_id: UserId,
        language: &str,
    ) -> Result<TaskId, QueueError> {
        let task = ProcessSurvey {
            response_id,
            user_id,
            language: language.to_string(),
        };
        self.enqueue(&task, EnqueueOptions::default()).await
    }

    /// Runs after [`CHURN_RECALC_DELAY`].
    pub async fn enqueue_churn_calculation(
        &self,
        user_id: UserId,
        company_id: CompanyId,
    ) -> Result<TaskId, QueueError> {
        let task = CalculateChurn {
            user_id,
            company_id,
        };
        self.enqueue(&task, EnqueueOptions::default().run_after(CHURN_RECALC_DELAY))
            .await
    }

    pub async fn enqueue_notification(
        &self,
        user_id: UserId,
        notification_type: &str,
        message: &str,
    ) -> Result<TaskId, QueueError> {
        let task = SendNotification {
            user_id,
            notification_type: notification_type.to_string(),
            message: message.to_string(),
        };
        self.enqueue(&task, EnqueueOptions::default().priority(Priority::Critical))
            .await
    }

    pub async fn enqueue_survey_invitation(
        &self,
        survey_id: SurveyId,
        user_id: UserId,
        email: &str,
    ) -> Result<TaskId, QueueError> {
        let task = SurveyInvitation {
            survey_id,
            user_id,
            email: email.to_string(),
        };
        self.enqueue(&task, EnqueueOptions::default()).await
    }

    /// Company-wide churn sweep, low priority, due in 24 hours.
    pub async fn schedule_daily_churn_analysis(
        &self,
        company_id: CompanyId,
    ) -> Result<TaskId, QueueError> {
        let run_at = self.clock.now()
            + chrono::Duration::from_std(DAILY_ANALYSIS_DELAY)
                .map_err(|e| QueueError::Encode(e.to_string()))?;
        self.enqueue(
            &CalculateChurn::whole_company(company_id),
            EnqueueOptions::default()
                .priority(Priority::Low)
                .run_at(run_at),
        )
        .await
    }
}
