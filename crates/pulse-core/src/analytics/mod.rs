//! Sentiment estimation, feature aggregation and churn-risk scoring.

pub mod churn;
pub mod features;
pub mod lexicon;
pub mod sentiment;
pub mod suggestions;

pub use self::churn::{ChurnFeatures, RiskAssessment, RiskFactor, RiskScorer, RiskWeights};
pub use self::features::{NEGATIVE_SENTIMENT_THRESHOLD, aggregate};
pub use self::lexicon::{LanguageLexicon, LexiconTable};
pub use self::sentiment::{SentimentEstimate, SentimentEstimator, SentimentSource, clamp_sentiment};
pub use self::suggestions::{SuggestionGroups, SuggestionTable};
