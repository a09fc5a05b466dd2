//! In-memory HR repository, seeded from a fixture.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::domain::{
    AttritionRisk, Company, CompanyId, NewAttritionRisk, NewSurveyResponse, ResponseId, RiskId,
    Survey, SurveyId, SurveyResponse, User, UserId,
};
use crate::ports::{HrRepository, RepoError};

/// Seed data, e.g. read from a JSON file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Fixture {
    pub companies: Vec<Company>,
    pub users: Vec<User>,
    pub surveys: Vec<Survey>,
    pub responses: Vec<SurveyResponse>,
}

#[derive(Default)]
struct Tables {
    companies: BTreeMap<CompanyId, Company>,
    users: BTreeMap<UserId, User>,
    surveys: BTreeMap<SurveyId, Survey>,
    responses: BTreeMap<ResponseId, SurveyResponse>,
    risks: BTreeMap<RiskId, AttritionRisk>,
    next_response_id: ResponseId,
    next_risk_id: RiskId,
}

#[derive(Default)]
pub struct InMemoryHrRepository {
    tables: RwLock<Tables>,
    unavailable: AtomicBool,
}

impl InMemoryHrRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fixture(fixture: Fixture) -> Self {
        let mut tables = Tables::default();
        tables.companies = fixture.companies.into_iter().map(|c| (c.id, c)).collect();
        tables.users = fixture.users.into_iter().map(|u| (u.id, u)).collect();
        tables.surveys = fixture.surveys.into_iter().map(|s| (s.id, s)).collect();
        tables.responses = fixture.responses.into_iter().map(|r| (r.id, r)).collect();
        tables.next_response_id = tables.responses.keys().max().copied().unwrap_or(0);
        Self {
            tables: RwLock::new(tables),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Make every call fail with a storage error, as a lost database would.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), RepoError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(RepoError::Storage("database unavailable".into()))
        } else {
            Ok(())
        }
    }

    pub async fn insert_company(&self, company: Company) {
        self.tables.write().await.companies.insert(company.id, company);
    }

    pub async fn insert_user(&self, user: User) {
        self.tables.write().await.users.insert(user.id, user);
    }

    pub async fn insert_survey(&self, survey: Survey) {
        self.tables.write().await.surveys.insert(survey.id, survey);
    }
}

#[async_trait]
impl HrRepository for InMemoryHrRepository {
    async fn get_responses_by_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<SurveyResponse>, RepoError> {
        self.check()?;
        let tables = self.tables.read().await;
        let mut responses: Vec<SurveyResponse> = tables
            .responses
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        responses.sort_by_key(|r| (r.created_at, r.id));
        Ok(responses)
    }

    async fn get_response(&self, id: ResponseId) -> Result<SurveyResponse, RepoError> {
        self.check()?;
        let tables = self.tables.read().await;
        tables
            .responses
            .get(&id)
            .cloned()
            .ok_or(RepoError::not_found("response", id))
    }

    async fn update_response_sentiment(
        &self,
        id: ResponseId,
        sentiment: f64,
    ) -> Result<(), RepoError> {
        self.check()?;
        let mut tables = self.tables.write().await;
        let response = tables
            .responses
            .get_mut(&id)
            .ok_or(RepoError::not_found("response", id))?;
        response.sentiment = sentiment;
        Ok(())
    }

    async fn create_response(
        &self,
        response: NewSurveyResponse,
    ) -> Result<SurveyResponse, RepoError> {
        self.check()?;
        let mut tables = self.tables.write().await;
        tables.next_response_id += 1;
        let stored = SurveyResponse {
            id: tables.next_response_id,
            survey_id: response.survey_id,
            user_id: response.user_id,
            responses: response.responses,
            sentiment: response.sentiment,
            created_at: response.created_at,
        };
        tables.responses.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn create_attrition_risk(
        &self,
        risk: NewAttritionRisk,
    ) -> Result<AttritionRisk, RepoError> {
        self.check()?;
        let mut tables = self.tables.write().await;
        tables.next_risk_id += 1;
        let stored = AttritionRisk {
            id: tables.next_risk_id,
            user_id: risk.user_id,
            risk_score: risk.risk_score,
            factors: risk.factors,
            created_at: risk.created_at,
        };
        tables.risks.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn list_attrition_risks(&self, user_id: UserId) -> Result<Vec<AttritionRisk>, RepoError> {
        self.check()?;
        let tables = self.tables.read().await;
        Ok(tables
            .risks
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get_survey(&self, id: SurveyId) -> Result<Survey, RepoError> {
        self.check()?;
        let tables = self.tables.read().await;
        tables
            .surveys
            .get(&id)
            .cloned()
            .ok_or(RepoError::not_found("survey", id))
    }

    async fn count_active_surveys(&self, company_id: CompanyId) -> Result<u32, RepoError> {
        self.check()?;
        let tables = self.tables.read().await;
        let count = tables
            .surveys
            .values()
            .filter(|s| s.company_id == company_id && s.is_active)
            .count();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn get_company(&self, id: CompanyId) -> Result<Company, RepoError> {
        self.check()?;
        let tables = self.tables.read().await;
        tables
            .companies
            .get(&id)
            .cloned()
            .ok_or(RepoError::not_found("company", id))
    }

    async fn list_companies(&self) -> Result<Vec<Company>, RepoError> {
        self.check()?;
        let tables = self.tables.read().await;
        Ok(tables.companies.values().cloned().collect())
    }

    async fn get_user(&self, id: UserId) -> Result<User, RepoError> {
        self.check()?;
        let tables = self.tables.read().await;
        tables
            .users
            .get(&id)
            .cloned()
            .ok_or(RepoError::not_found("user", id))
    }

    async fn list_users_by_company(&self, company_id: CompanyId) -> Result<Vec<User>, RepoError> {
        self.check()?;
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .filter(|u| u.company_id == company_id)
            .cloned()
            .collect())
    }
}
