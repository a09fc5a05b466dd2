//! HR entities the pipeline reads and appends.
//!
//! These mirror rows owned by the CRUD backend. The pipeline only ever reads
//! users, companies and surveys; it updates a response's sentiment and
//! appends attrition-risk rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{CompanyId, ResponseId, RiskId, SurveyId, UserId};

/// Upper bound of factor labels kept on a persisted risk row.
pub const MAX_PERSISTED_FACTORS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    HrAdmin,
    Employee,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub company_id: CompanyId,
    #[serde(default)]
    pub last_login_at: Option<DateTime<Utc>>,
}

/// SMTP credentials used to deliver invitation email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtpSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    #[serde(default)]
    pub password: String,
    pub from: String,
}

impl SmtpSettings {
    /// A company row carries an SMTP block only once a user name is set.
    pub fn is_configured(&self) -> bool {
        !self.host.is_empty() && !self.user.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    pub name: String,
    /// ISO language code (`en`, `hi`, `ta`).
    pub language: String,
    #[serde(default)]
    pub smtp: Option<SmtpSettings>,
}

impl Company {
    /// Company SMTP settings, if usable.
    pub fn smtp_settings(&self) -> Option<&SmtpSettings> {
        self.smtp.as_ref().filter(|s| s.is_configured())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Survey {
    pub id: SurveyId,
    pub company_id: CompanyId,
    pub title: String,
    pub questions: Vec<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyResponse {
    pub id: ResponseId,
    pub survey_id: SurveyId,
    pub user_id: UserId,
    pub responses: Vec<String>,
    /// In `[-1, 1]`.
    pub sentiment: f64,
    pub created_at: DateTime<Utc>,
}

impl SurveyResponse {
    /// All answers joined into one text for sentiment estimation.
    pub fn combined_text(&self) -> String {
        self.responses.join(" ")
    }
}

/// A response about to be stored; the repository assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSurveyResponse {
    pub survey_id: SurveyId,
    pub user_id: UserId,
    pub responses: Vec<String>,
    pub sentiment: f64,
    pub created_at: DateTime<Utc>,
}

/// One churn-scoring result. Rows are append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttritionRisk {
    pub id: RiskId,
    pub user_id: UserId,
    /// In `[0, 1]`.
    pub risk_score: f64,
    pub factors: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// A risk row about to be appended.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAttritionRisk {
    pub user_id: UserId,
    pub risk_score: f64,
    pub factors: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl NewAttritionRisk {
    /// Clamps the score and keeps the first distinct factor labels.
    pub fn new(
        user_id: UserId,
        risk_score: f64,
        factors: impl IntoIterator<Item = String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let mut kept: Vec<String> = Vec::with_capacity(MAX_PERSISTED_FACTORS);
        for factor in factors {
            if kept.len() == MAX_PERSISTED_FACTORS {
                break;
            }
            if !kept.contains(&factor) {
                kept.push(factor);
            }
        }

        let risk_score = if risk_score.is_finite() {
            risk_score.clamp(0.0, 1.0)
        } else {
            0.0
        };

        Self {
            user_id,
            risk_score,
            factors: kept,
            created_at,
        }
    }
}
