//! HR persistence port.
//!
//! Lookups report a missing row as [`RepoError::NotFound`]; handlers turn
//! that into a permanent domain fault.

use async_trait::async_trait;

use crate::domain::{
    AttritionRisk, Company, CompanyId, NewAttritionRisk, NewSurveyResponse, ResponseId, Survey,
    SurveyId, SurveyResponse, TaskError, User, UserId,
};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RepoError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: u64 },

    #[error("storage error: {0}")]
    Storage(String),
}

impl RepoError {
    pub fn not_found(entity: &'static str, id: u64) -> Self {
        Self::NotFound { entity, id }
    }
}

impl From<RepoError> for TaskError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound { .. } => TaskError::domain(err.to_string()),
            RepoError::Storage(_) => TaskError::transient(err.to_string()),
        }
    }
}

#[async_trait]
pub trait HrRepository: Send + Sync {
    /// All responses of a user, oldest first.
    async fn get_responses_by_user(&self, user_id: UserId)
        -> Result<Vec<SurveyResponse>, RepoError>;

    async fn get_response(&self, id: ResponseId) -> Result<SurveyResponse, RepoError>;

    async fn update_response_sentiment(
        &self,
        id: ResponseId,
        sentiment: f64,
    ) -> Result<(), RepoError>;

    async fn create_response(&self, response: NewSurveyResponse)
        -> Result<SurveyResponse, RepoError>;

    /// Appends a risk row. Never overwrites an earlier one.
    async fn create_attrition_risk(&self, risk: NewAttritionRisk)
        -> Result<AttritionRisk, RepoError>;

    /// Risk history of a user, oldest first.
    async fn list_attrition_risks(&self, user_id: UserId)
        -> Result<Vec<AttritionRisk>, RepoError>;

    async fn get_survey(&self, id: SurveyId) -> Result<Survey, RepoError>;

    async fn count_active_surveys(&self, company_id: CompanyId) -> Result<u32, RepoError>;

    async fn get_company(&self, id: CompanyId) -> Result<Company, RepoError>;

    async fn list_companies(&self) -> Result<Vec<Company>, RepoError>;

    async fn get_user(&self, id: UserId) -> Result<User, RepoError>;

    async fn list_users_by_company(&self, company_id: CompanyId) -> Result<Vec<User>, RepoError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorKind;

    #[test]
    fn missing_rows_are_domain_faults() {
        let err: TaskError = RepoError::not_found("survey", 9).into();
        assert_eq!(err.kind(), ErrorKind::Domain);
        assert_eq!(err.message(), "survey 9 not found");
    }

    #[test]
    fn storage_errors_are_transient() {
        let err: TaskError = RepoError::Storage("connection reset".into()).into();
        assert_eq!(err.kind(), ErrorKind::Transient);
    }
}
