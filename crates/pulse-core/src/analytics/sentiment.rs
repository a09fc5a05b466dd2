//! Two-tier sentiment estimation.
//!
//! Tier 1 asks the external classifier. Tier 2 is the keyword lexicon and is
//! used whenever tier 1 is missing, fails, times out, or answers exactly 0.
//! A bare zero cannot be told apart from "no opinion", so it is treated as
//! inconclusive.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use super::lexicon::LexiconTable;
use crate::ports::{ClassifierError, SentimentClassifier};

/// Clamp to `[-1, 1]`; non-finite values become 0.
pub fn clamp_sentiment(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SentimentSource {
    Classifier,
    Lexicon,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SentimentEstimate {
    pub score: f64,
    pub source: SentimentSource,
}

#[derive(Clone)]
pub struct SentimentEstimator {
    classifier: Option<Arc<dyn SentimentClassifier>>,
    lexicon: Arc<LexiconTable>,
    timeout: Duration,
}

impl SentimentEstimator {
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

    /// Lexicon only.
    pub fn lexicon_only(lexicon: LexiconTable) -> Self {
        Self {
            classifier: None,
            lexicon: Arc::new(lexicon),
            timeout: Self::DEFAULT_TIMEOUT,
        }
    }

    pub fn with_classifier(
        classifier: Arc<dyn SentimentClassifier>,
        lexicon: LexiconTable,
        timeout: Duration,
    ) -> Self {
        Self {
            classifier: Some(classifier),
            lexicon: Arc::new(lexicon),
            timeout,
        }
    }

    pub fn lexicon(&self) -> &LexiconTable {
        &self.lexicon
    }

    /// Score `text` in `[-1, 1]`. Never fails.
    pub async fn estimate(&self, text: &str, language: &str) -> f64 {
        self.estimate_detailed(text, language).await.score
    }

    pub async fn estimate_detailed(&self, text: &str, language: &str) -> SentimentEstimate {
        if let Some(classifier) = &self.classifier {
            match self.ask(classifier.as_ref(), text, language).await {
                Ok(score) if score.is_finite() && score != 0.0 => {
                    debug!(language, score, "classifier sentiment");
                    return SentimentEstimate {
                        score: clamp_sentiment(score),
                        source: SentimentSource::Classifier,
                    };
                }
                Ok(score) => {
                    debug!(language, score, "classifier inconclusive, using lexicon");
                }
                Err(error) => {
                    warn!(language, %error, "classifier failed, using lexicon");
                }
            }
        }

        SentimentEstimate {
            score: clamp_sentiment(self.lexicon.score(text, language)),
            source: SentimentSource::Lexicon,
        }
    }

    async fn ask(
        &self,
        classifier: &dyn SentimentClassifier,
        text: &str,
        language: &str,
    ) -> Result<f64, ClassifierError> {
        tokio::time::timeout(self.timeout, classifier.classify(text, language))
            .await
            .map_err(|_| ClassifierError::Timeout)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Fixed(Result<f64, ClassifierError>);

    #[async_trait]
    impl SentimentClassifier for Fixed {
        async fn classify(&self, _text: &str, _language: &str) -> Result<f64, ClassifierError> {
            self.0.clone()
        }
    }

    struct Hanging;

    #[async_trait]
    impl SentimentClassifier for Hanging {
        async fn classify(&self, _text: &str, _language: &str) -> Result<f64, ClassifierError> {
            std::future::pending().await
        }
    }

    fn estimator(classifier: impl SentimentClassifier + 'static) -> SentimentEstimator {
        SentimentEstimator::with_classifier(
            Arc::new(classifier),
            LexiconTable::builtin(),
            Duration::from_millis(50),
        )
    }

    #[tokio::test]
    async fn classifier_answer_wins_and_is_clamped() {
        let est = estimator(Fixed(Ok(1.7))).estimate_detailed("bad", "en").await;
        assert_eq!(est.score, 1.0);
        assert_eq!(est.source, SentimentSource::Classifier);
    }

    #[tokio::test]
    async fn zero_from_classifier_is_inconclusive() {
        let est = estimator(Fixed(Ok(0.0))).estimate_detailed("bad pay", "en").await;
        assert_eq!(est.source, SentimentSource::Lexicon);
        assert_eq!(est.score, -0.5);
    }

    #[tokio::test]
    async fn classifier_errors_fall_back() {
        for err in [
            ClassifierError::Status(503),
            ClassifierError::Network("refused".into()),
            ClassifierError::Unparsable("[]".into()),
            ClassifierError::NotConfigured,
        ] {
            let est = estimator(Fixed(Err(err))).estimate_detailed("great", "en").await;
            assert_eq!(est.source, SentimentSource::Lexicon);
            assert_eq!(est.score, 1.0);
        }
    }

    #[tokio::test]
    async fn hung_classifier_times_out() {
        let est = estimator(Hanging).estimate_detailed("awful", "en").await;
        assert_eq!(est.source, SentimentSource::Lexicon);
        assert_eq!(est.score, -1.0);
    }

    #[tokio::test]
    async fn empty_text_scores_zero_without_classifier() {
        let est = SentimentEstimator::lexicon_only(LexiconTable::builtin());
        assert_eq!(est.estimate("", "ta").await, 0.0);
    }

    #[test]
    fn clamp_handles_non_finite() {
        assert_eq!(clamp_sentiment(f64::NAN), 0.0);
        assert_eq!(clamp_sentiment(-3.0), -1.0);
    }
}
