//! External sentiment classifier port (tier 1 of the estimator).

use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClassifierError {
    #[error("classifier not configured")]
    NotConfigured,

    #[error("classifier request failed: {0}")]
    Network(String),

    #[error("classifier timed out")]
    Timeout,

    #[error("classifier returned status {0}")]
    Status(u16),

    #[error("classifier output unparsable: {0}")]
    Unparsable(String),
}

/// Scores a text in `[-1, 1]`.
#[async_trait]
pub trait SentimentClassifier: Send + Sync {
    async fn classify(&self, text: &str, language: &str) -> Result<f64, ClassifierError>;
}
