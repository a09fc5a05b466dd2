//! Domain model: ids, tasks, faults, decisions, HR entities.

pub mod attempt;
pub mod decision;
pub mod errors;
pub mod hr;
pub mod ids;
pub mod task;

pub use attempt::{AttemptRecord, DecisionRecord};
pub use decision::{Decider, Decision, DefaultDecider};
pub use errors::{ErrorKind, TaskError};
pub use hr::{
    AttritionRisk, Company, NewAttritionRisk, NewSurveyResponse, Role, SmtpSettings, Survey,
    SurveyResponse, User, MAX_PERSISTED_FACTORS,
};
pub use ids::{AttemptId, CompanyId, Id, IdMarker, ResponseId, RiskId, SurveyId, TaskId, UserId};
pub use task::{Priority, TaskEnvelope, TaskKind, TaskType};
