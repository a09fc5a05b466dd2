//! Hosted-inference sentiment classifier over HTTP.
//!
//! `POST {base_url}/models/{model}` with `{"inputs": text}` and a bearer
//! token. The answer is a list of label/score candidates per input; the
//! best-scoring label decides the sign.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::config::ClassifierConfig;
use crate::ports::{ClassifierError, SentimentClassifier};

#[derive(Debug, Deserialize)]
struct Candidate {
    label: String,
    score: f64,
}

pub struct HttpSentimentClassifier {
    client: Client,
    config: ClassifierConfig,
}

impl HttpSentimentClassifier {
    pub fn new(config: ClassifierConfig) -> Result<Self, ClassifierError> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ClassifierError::Network(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self, language: &str) -> String {
        format!(
            "{}/models/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.model_for(language)
        )
    }
}

fn map_reqwest(err: reqwest::Error) -> ClassifierError {
    if err.is_timeout() {
        ClassifierError::Timeout
    } else {
        ClassifierError::Network(err.to_string())
    }
}

/// Turn the raw candidate list into a signed score.
fn interpret(body: &str) -> Result<f64, ClassifierError> {
    let parsed: Vec<Vec<Candidate>> =
        serde_json::from_str(body).map_err(|e| ClassifierError::Unparsable(e.to_string()))?;

    let best = parsed
        .first()
        .and_then(|candidates| {
            candidates
                .iter()
                .filter(|c| c.score.is_finite())
                .max_by(|a, b| a.score.total_cmp(&b.score))
        })
        .ok_or_else(|| ClassifierError::Unparsable("no candidates".into()))?;

    match best.label.as_str() {
        "LABEL_2" | "POSITIVE" | "positive" => Ok(best.score),
        "LABEL_0" | "NEGATIVE" | "negative" => Ok(-best.score),
        "LABEL_1" | "NEUTRAL" | "neutral" => Ok(0.0),
        other => Err(ClassifierError::Unparsable(format!("unknown label {other}"))),
    }
}

#[async_trait]
impl SentimentClassifier for HttpSentimentClassifier {
    async fn classify(&self, text: &str, language: &str) -> Result<f64, ClassifierError> {
        let token = self
            .config
            .token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(ClassifierError::NotConfigured)?;

        let resp = self
            .client
            .post(self.endpoint(language))
            .bearer_auth(token)
            .json(&json!({ "inputs": text }))
            .send()
            .await
            .map_err(map_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ClassifierError::Status(status.as_u16()));
        }

        let body = resp.text().await.map_err(map_reqwest)?;
        debug!(language, status = status.as_u16(), "classifier response");
        interpret(&body)
    }
}
