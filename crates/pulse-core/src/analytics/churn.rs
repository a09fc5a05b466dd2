//! Churn-risk scoring.

use serde::{Deserialize, Serialize};

/// Behavioural features of one employee, recomputed on every scoring run.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ChurnFeatures {
    /// In `[-1, 1]`.
    pub avg_sentiment: f64,
    /// In `[0, 1]`.
    pub response_rate: f64,
    pub days_inactive: u32,
    pub negative_responses: u32,
    pub total_responses: u32,
    pub last_login_days: u32,
}

impl ChurnFeatures {
    /// Share of negative responses, 0 when there are none.
    pub fn negative_ratio(&self) -> f64 {
        if self.total_responses == 0 {
            return 0.0;
        }
        (f64::from(self.negative_responses) / f64::from(self.total_responses)).clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskFactor {
    LowSentiment,
    PoorParticipation,
    ReducedActivity,
    FrequentNegativeFeedback,
    InfrequentUsage,
}

impl RiskFactor {
    pub fn label(self) -> &'static str {
        match self {
            RiskFactor::LowSentiment => "Low sentiment scores",
            RiskFactor::PoorParticipation => "Poor survey participation",
            RiskFactor::ReducedActivity => "Reduced activity",
            RiskFactor::FrequentNegativeFeedback => "Frequent negative feedback",
            RiskFactor::InfrequentUsage => "Infrequent system usage",
        }
    }
}

impl std::fmt::Display for RiskFactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Weights of the four sub-scores. They sum to 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskWeights {
    pub sentiment: f64,
    pub response: f64,
    pub activity: f64,
    pub engagement: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            sentiment: 0.50,
            response: 0.15,
            activity: 0.15,
            engagement: 0.20,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskAssessment {
    pub score: f64,
    pub factors: Vec<RiskFactor>,
}

impl RiskAssessment {
    pub fn factor_labels(&self) -> Vec<String> {
        self.factors.iter().map(|f| f.label().to_string()).collect()
    }
}

/// Weighted sum of normalised sub-scores squashed by a logistic curve
/// `1 / (1 + e^(-k (r - m)))`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskScorer {
    pub weights: RiskWeights,
    pub steepness: f64,
    pub midpoint: f64,
}

impl Default for RiskScorer {
    fn default() -> Self {
        Self {
            weights: RiskWeights::default(),
            steepness: 8.0,
            midpoint: 0.4,
        }
    }
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() { value } else { fallback }
}

impl RiskScorer {
    /// Risk in `[0, 1]`.
    pub fn score(&self, features: &ChurnFeatures) -> f64 {
        let avg_sentiment = finite_or(features.avg_sentiment, 0.0).clamp(-1.0, 1.0);
        let response_rate = finite_or(features.response_rate, 1.0).clamp(0.0, 1.0);

        let sentiment = (1.0 - avg_sentiment) / 2.0;
        let response = 1.0 - response_rate;
        let activity = (f64::from(features.days_inactive) / 30.0).min(1.0);
        let engagement = features.negative_ratio();

        let w = &self.weights;
        let r = sentiment * w.sentiment
            + response * w.response
            + activity * w.activity
            + engagement * w.engagement;

        let risk = 1.0 / (1.0 + (-self.steepness * (r - self.midpoint)).exp());
        finite_or(risk, 0.0).clamp(0.0, 1.0)
    }

    /// Triggered factors in evaluation order. At most five.
    pub fn factors(&self, features: &ChurnFeatures) -> Vec<RiskFactor> {
        let mut factors = Vec::with_capacity(5);
        if features.avg_sentiment < -0.2 {
            factors.push(RiskFactor::LowSentiment);
        }
        if features.response_rate < 0.5 {
            factors.push(RiskFactor::PoorParticipation);
        }
        if features.days_inactive > 7 {
            factors.push(RiskFactor::ReducedActivity);
        }
        if features.total_responses > 0 && features.negative_ratio() > 0.6 {
            factors.push(RiskFactor::FrequentNegativeFeedback);
        }
        if features.last_login_days > 3 {
            factors.push(RiskFactor::InfrequentUsage);
        }
        factors
    }

    pub fn assess(&self, features: &ChurnFeatures) -> RiskAssessment {
        RiskAssessment {
            score: self.score(features),
            factors: self.factors(features),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn features(
        avg_sentiment: f64,
        response_rate: f64,
        days_inactive: u32,
        negative_responses: u32,
        total_responses: u32,
    ) -> ChurnFeatures {
        ChurnFeatures {
            avg_sentiment,
            response_rate,
            days_inactive,
            negative_responses,
            total_responses,
            last_login_days: 0,
        }
    }

    #[test]
    fn disengaged_employee_scores_high() {
        let scorer = RiskScorer::default();
        let f = features(-0.5, 0.3, 15, 8, 10);

        let assessment = scorer.assess(&f);
        assert!(assessment.score > 0.5, "score {}", assessment.score);
        assert_eq!(
            assessment.factors,
            vec![
                RiskFactor::LowSentiment,
                RiskFactor::PoorParticipation,
                RiskFactor::ReducedActivity,
                RiskFactor::FrequentNegativeFeedback,
            ]
        );
    }

    #[test]
    fn engaged_employee_scores_low() {
        let scorer = RiskScorer::default();
        let f = features(0.7, 0.9, 1, 1, 10);

        let assessment = scorer.assess(&f);
        assert!(assessment.score < 0.5, "score {}", assessment.score);
        assert!(assessment.factors.is_empty());
    }

    #[rstest]
    #[case::all_zero(ChurnFeatures::default())]
    #[case::all_max(ChurnFeatures {
        avg_sentiment: -1.0,
        response_rate: 0.0,
        days_inactive: u32::MAX,
        negative_responses: u32::MAX,
        total_responses: u32::MAX,
        last_login_days: u32::MAX,
    })]
    #[case::more_negatives_than_total(features(0.0, 1.0, 0, 50, 10))]
    #[case::nan_inputs(features(f64::NAN, f64::NAN, 0, 0, 0))]
    fn extremes_stay_bounded(#[case] f: ChurnFeatures) {
        let score = RiskScorer::default().score(&f);
        assert!((0.0..=1.0).contains(&score), "score {score}");
    }

    #[test]
    fn no_responses_never_divides_by_zero() {
        let scorer = RiskScorer::default();
        let f = features(0.0, 1.0, 20, 0, 0);
        assert_eq!(f.negative_ratio(), 0.0);
        assert_eq!(scorer.factors(&f), vec![RiskFactor::ReducedActivity]);
    }

    #[test]
    fn labels_match_wire_text() {
        assert_eq!(RiskFactor::InfrequentUsage.to_string(), "Infrequent system usage");
    }

    fn arb_features() -> impl Strategy<Value = ChurnFeatures> {
        (
            -1.0f64..=1.0,
            0.0f64..=1.0,
            0u32..400,
            0u32..200,
            0u32..200,
            0u32..400,
        )
            .prop_map(|(avg, rate, inactive, neg, total, login)| ChurnFeatures {
                avg_sentiment: avg,
                response_rate: rate,
                days_inactive: inactive,
                negative_responses: neg.min(total),
                total_responses: total,
                last_login_days: login,
            })
    }

    proptest! {
        #[test]
        fn score_is_bounded(f in arb_features()) {
            let score = RiskScorer::default().score(&f);
            prop_assert!((0.0..=1.0).contains(&score));
        }

        #[test]
        fn factors_are_sound(f in arb_features()) {
            let factors = RiskScorer::default().factors(&f);
            prop_assert!(factors.len() <= 5);
            for factor in factors {
                let holds = match factor {
                    RiskFactor::LowSentiment => f.avg_sentiment < -0.2,
                    RiskFactor::PoorParticipation => f.response_rate < 0.5,
                    RiskFactor::ReducedActivity => f.days_inactive > 7,
                    RiskFactor::FrequentNegativeFeedback => {
                        f.total_responses > 0
                            && f64::from(f.negative_responses) / f64::from(f.total_responses) > 0.6
                    }
                    RiskFactor::InfrequentUsage => f.last_login_days > 3,
                };
                prop_assert!(holds, "{factor:?} reported for {f:?}");
            }
        }

        #[test]
        fn lower_sentiment_never_lowers_risk(f in arb_features(), drop in 0.0f64..=2.0) {
            let scorer = RiskScorer::default();
            let worse = ChurnFeatures {
                avg_sentiment: (f.avg_sentiment - drop).max(-1.0),
                ..f
            };
            prop_assert!(scorer.score(&worse) >= scorer.score(&f));
        }
    }
}
