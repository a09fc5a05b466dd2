//! Aggregation of stored responses into [`ChurnFeatures`].

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use super::churn::ChurnFeatures;
use crate::domain::{SurveyResponse, User};

/// Responses below this sentiment count as negative.
pub const NEGATIVE_SENTIMENT_THRESHOLD: f64 = -0.1;

fn whole_days_since(then: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
    u32::try_from((now - then).num_days().max(0)).unwrap_or(u32::MAX)
}

/// Build the feature vector of `user`.
///
/// `active_surveys` is the number of active surveys of the user's company.
/// With no responses the vector is neutral except for inactivity, which
/// falls back to the days since the last login.
pub fn aggregate(
    user: &User,
    responses: &[SurveyResponse],
    active_surveys: u32,
    now: DateTime<Utc>,
) -> ChurnFeatures {
    let last_login_days = user
        .last_login_at
        .map(|at| whole_days_since(at, now))
        .unwrap_or(0);

    if responses.is_empty() {
        return ChurnFeatures {
            avg_sentiment: 0.0,
            response_rate: 1.0,
            days_inactive: last_login_days,
            negative_responses: 0,
            total_responses: 0,
            last_login_days,
        };
    }

    let total = responses.len();
    let sum: f64 = responses.iter().map(|r| r.sentiment).sum();
    let negative = responses
        .iter()
        .filter(|r| r.sentiment < NEGATIVE_SENTIMENT_THRESHOLD)
        .count();

    let response_rate = if active_surveys == 0 {
        1.0
    } else {
        let answered: HashSet<_> = responses.iter().map(|r| r.survey_id).collect();
        (answered.len() as f64 / f64::from(active_surveys)).clamp(0.0, 1.0)
    };

    let days_inactive = responses
        .iter()
        .map(|r| r.created_at)
        .max()
        .map(|latest| whole_days_since(latest, now))
        .unwrap_or(0);

    ChurnFeatures {
        avg_sentiment: (sum / total as f64).clamp(-1.0, 1.0),
        response_rate,
        days_inactive,
        negative_responses: u32::try_from(negative).unwrap_or(u32::MAX),
        total_responses: u32::try_from(total).unwrap_or(u32::MAX),
        last_login_days,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 30, 12, 0, 0).unwrap()
    }

    fn user(last_login_days_ago: Option<i64>) -> User {
        User {
            id: 1,
            email: "ravi@acme.test".into(),
            name: "Ravi".into(),
            role: Role::Employee,
            company_id: 1,
            last_login_at: last_login_days_ago.map(|d| now() - Duration::days(d)),
        }
    }

    fn response(survey_id: u64, sentiment: f64, days_ago: i64) -> SurveyResponse {
        SurveyResponse {
            id: survey_id * 100,
            survey_id,
            user_id: 1,
            responses: vec!["ok".into()],
            sentiment,
            created_at: now() - Duration::days(days_ago),
        }
    }

    #[test]
    fn aggregates_sentiment_participation_and_recency() {
        let responses = [
            response(1, -0.6, 20),
            response(2, -0.2, 10),
            response(2, 0.2, 9),
        ];
        let f = aggregate(&user(Some(5)), &responses, 4, now());

        assert!((f.avg_sentiment - (-0.2)).abs() < 1e-9);
        assert_eq!(f.negative_responses, 2);
        assert_eq!(f.total_responses, 3);
        assert_eq!(f.response_rate, 0.5);
        assert_eq!(f.days_inactive, 9);
        assert_eq!(f.last_login_days, 5);
    }

    #[test]
    fn no_responses_yield_neutral_vector() {
        let f = aggregate(&user(Some(12)), &[], 3, now());
        assert_eq!(f.avg_sentiment, 0.0);
        assert_eq!(f.response_rate, 1.0);
        assert_eq!(f.negative_responses, 0);
        assert_eq!(f.total_responses, 0);
        assert_eq!(f.days_inactive, 12);
    }

    #[test]
    fn company_without_active_surveys_has_full_rate() {
        let f = aggregate(&user(None), &[response(1, 0.5, 0)], 0, now());
        assert_eq!(f.response_rate, 1.0);
        assert_eq!(f.last_login_days, 0);
    }
}
