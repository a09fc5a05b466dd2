//! Wire payloads, one per task kind. Unknown fields are rejected so a
//! payload can only decode as the shape its kind declares.

use serde::{Deserialize, Serialize};

use super::task::Task;
use crate::domain::{CompanyId, Priority, ResponseId, SurveyId, TaskKind, UserId};

/// Re-score a stored survey response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessSurvey {
    pub response_id: ResponseId,
    pub user_id: UserId,
    pub language: String,
}

impl Task for ProcessSurvey {
    const KIND: TaskKind = TaskKind::ProcessSurvey;
}

/// Score churn risk for one user, or every user of the company when
/// `user_id` is 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CalculateChurn {
    pub user_id: UserId,
    pub company_id: CompanyId,
}

impl CalculateChurn {
    pub const ALL_USERS: UserId = 0;

    pub fn whole_company(company_id: CompanyId) -> Self {
        Self {
            user_id: Self::ALL_USERS,
            company_id,
        }
    }

    pub fn is_whole_company(&self) -> bool {
        self.user_id == Self::ALL_USERS
    }
}

impl Task for CalculateChurn {
    const KIND: TaskKind = TaskKind::CalculateChurn;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendNotification {
    pub user_id: UserId,
    #[serde(rename = "type")]
    pub notification_type: String,
    pub message: String,
}

impl SendNotification {
    pub const HIGH_CHURN_RISK: &'static str = "high_churn_risk";
}

impl Task for SendNotification {
    const KIND: TaskKind = TaskKind::SendNotification;
    const PRIORITY: Priority = Priority::Critical;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SurveyInvitation {
    pub survey_id: SurveyId,
    pub user_id: UserId,
    pub email: String,
}

impl Task for SurveyInvitation {
    const KIND: TaskKind = TaskKind::SurveyInvitation;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn notification_type_uses_wire_name() {
        let task = SendNotification {
            user_id: 3,
            notification_type: SendNotification::HIGH_CHURN_RISK.into(),
            message: "Employee has high churn risk: 0.91".into(),
        };
        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(
            value,
            json!({
                "user_id": 3,
                "type": "high_churn_risk",
                "message": "Employee has high churn risk: 0.91",
            })
        );
    }

    #[test]
    fn payloads_reject_foreign_shapes() {
        let churn = json!({ "user_id": 1, "company_id": 2 });
        assert!(serde_json::from_value::<CalculateChurn>(churn.clone()).is_ok());
        assert!(serde_json::from_value::<ProcessSurvey>(churn.clone()).is_err());
        assert!(serde_json::from_value::<SurveyInvitation>(churn).is_err());

        let extra = json!({ "user_id": 1, "company_id": 2, "priority": "low" });
        assert!(serde_json::from_value::<CalculateChurn>(extra).is_err());
    }

    #[test]
    fn only_notifications_default_to_critical() {
        assert_eq!(SendNotification::PRIORITY, Priority::Critical);
        assert_eq!(CalculateChurn::PRIORITY, Priority::Default);
        assert!(CalculateChurn::whole_company(4).is_whole_company());
    }
}
