use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::TaskId;

/// Wire name of a task kind (e.g. `churn:calculate`).
///
/// Kept as a string on the envelope so a worker can still receive (and
/// dead-letter) kinds it has no handler for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskType(String);

impl TaskType {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The known kind this type names, if any.
    pub fn kind(&self) -> Option<TaskKind> {
        TaskKind::parse(&self.0)
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<TaskKind> for TaskType {
    fn from(kind: TaskKind) -> Self {
        Self::new(kind.as_str())
    }
}

/// The task kinds the pipeline knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    ProcessSurvey,
    CalculateChurn,
    SendNotification,
    SurveyInvitation,
}

impl TaskKind {
    pub const ALL: [TaskKind; 4] = [
        TaskKind::ProcessSurvey,
        TaskKind::CalculateChurn,
        TaskKind::SendNotification,
        TaskKind::SurveyInvitation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskKind::ProcessSurvey => "survey:process",
            TaskKind::CalculateChurn => "churn:calculate",
            TaskKind::SendNotification => "notification:send",
            TaskKind::SurveyInvitation => "survey:invitation",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == s)
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Priority class governing dequeue preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    Default,
    Low,
}

impl Priority {
    /// Classes in preference order.
    pub const ALL: [Priority; 3] = [Priority::Critical, Priority::Default, Priority::Low];

    pub fn index(self) -> usize {
        match self {
            Priority::Critical => 0,
            Priority::Default => 1,
            Priority::Low => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Critical => "critical",
            Priority::Default => "default",
            Priority::Low => "low",
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::Default
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An enqueued task. Immutable once the queue has accepted it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEnvelope {
    task_id: TaskId,
    task_type: TaskType,
    payload: Vec<u8>,
    priority: Priority,
    not_before: Option<DateTime<Utc>>,
    enqueued_at: DateTime<Utc>,
}

impl TaskEnvelope {
    pub fn new(
        task_id: TaskId,
        task_type: TaskType,
        payload: Vec<u8>,
        priority: Priority,
        not_before: Option<DateTime<Utc>>,
        enqueued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            task_id,
            task_type,
            payload,
            priority,
            not_before,
            enqueued_at,
        }
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub fn task_type(&self) -> &TaskType {
        &self.task_type
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Earliest time the task may be dequeued.
    pub fn not_before(&self) -> Option<DateTime<Utc>> {
        self.not_before
    }

    pub fn enqueued_at(&self) -> DateTime<Utc> {
        self.enqueued_at
    }
}
