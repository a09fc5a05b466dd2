//! Process configuration, loaded from TOML.
//!
//! Every section and field has a default, so an empty file is a valid
//! configuration. The loaded value is handed to constructors explicitly.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::analytics::{LexiconTable, SuggestionTable};
use crate::domain::SmtpSettings;
use crate::queue::{PriorityWeights, QueueSettings, RetryPolicy};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Ceiling on in-flight task executions.
    pub concurrency: usize,
    pub weights: PriorityWeights,
    pub poll_interval_ms: u64,
    pub handler_timeout_secs: u64,
    pub lease_timeout_secs: u64,
    /// Succeeded tasks older than this are forgotten by the queue.
    pub succeeded_retention_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            weights: PriorityWeights::default(),
            poll_interval_ms: 200,
            handler_timeout_secs: 30,
            lease_timeout_secs: 300,
            succeeded_retention_secs: 3600,
        }
    }
}

impl WorkerConfig {
    pub fn handler_timeout(&self) -> Duration {
        Duration::from_secs(self.handler_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 2_000,
            multiplier: 2.0,
            max_delay_secs: 300,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_millis(self.base_delay_ms),
            multiplier: self.multiplier,
            max_delay: Duration::from_secs(self.max_delay_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub base_url: String,
    /// Bearer token. The classifier is disabled without one.
    pub token: Option<String>,
    pub timeout_secs: u64,
    /// Model used for languages missing from `models`.
    pub default_model: String,
    pub models: BTreeMap<String, String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        let mut models = BTreeMap::new();
        models.insert(
            "en".to_string(),
            "cardiffnlp/twitter-roberta-base-sentiment-latest".to_string(),
        );
        Self {
            base_url: "https://api-inference.huggingface.co".to_string(),
            token: None,
            timeout_secs: 10,
            default_model: "ai4bharat/indic-bert".to_string(),
            models,
        }
    }
}

impl ClassifierConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn model_for(&self, language: &str) -> &str {
        self.models
            .get(language)
            .map(String::as_str)
            .unwrap_or(&self.default_model)
    }

    pub fn is_enabled(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// Slack incoming webhook. Alerts are skipped when unset.
    pub slack_webhook_url: Option<String>,
    /// Recipient of churn alert email. Email alerts are skipped when unset.
    pub alert_email: Option<String>,
    pub timeout_secs: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            slack_webhook_url: None,
            alert_email: None,
            timeout_secs: 5,
        }
    }
}

impl NotificationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Process-wide SMTP defaults for companies without their own settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub from: String,
    pub timeout_secs: u64,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "smtp.gmail.com".to_string(),
            port: 587,
            user: String::new(),
            password: String::new(),
            from: String::new(),
            timeout_secs: 10,
        }
    }
}

impl SmtpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn settings(&self) -> SmtpSettings {
        let from = if self.from.is_empty() {
            self.user.clone()
        } else {
            self.from.clone()
        };
        SmtpSettings {
            host: self.host.clone(),
            port: self.port,
            user: self.user.clone(),
            password: self.password.clone(),
            from,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvitationConfig {
    pub survey_link_base: String,
}

impl Default for InvitationConfig {
    fn default() -> Self {
        Self {
            survey_link_base: "http://localhost:3002".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PulseConfig {
    pub worker: WorkerConfig,
    pub retry: RetryConfig,
    pub classifier: ClassifierConfig,
    pub notifications: NotificationConfig,
    pub smtp: SmtpConfig,
    pub invitations: InvitationConfig,
    /// Per-language overrides of the built-in lexicon.
    pub lexicon: Option<LexiconTable>,
    /// Per-language overrides of the built-in suggestions.
    pub suggestions: Option<SuggestionTable>,
}

impl PulseConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker.concurrency == 0 {
            return Err(ConfigError::Invalid("worker.concurrency must be at least 1".into()));
        }
        let w = &self.worker.weights;
        if w.critical == 0 || w.default == 0 || w.low == 0 {
            return Err(ConfigError::Invalid("worker.weights must all be positive".into()));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be at least 1".into()));
        }
        if !(self.retry.multiplier.is_finite() && self.retry.multiplier >= 1.0) {
            return Err(ConfigError::Invalid("retry.multiplier must be >= 1".into()));
        }
        Ok(())
    }

    pub fn queue_settings(&self) -> QueueSettings {
        QueueSettings {
            retry: self.retry.policy(),
            weights: self.worker.weights,
            lease_timeout: Duration::from_secs(self.worker.lease_timeout_secs),
            poll_interval: Duration::from_millis(self.worker.poll_interval_ms.max(1)),
            succeeded_retention: Duration::from_secs(self.worker.succeeded_retention_secs),
        }
    }

    /// Built-in lexicon with configured overrides applied.
    pub fn lexicon_table(&self) -> LexiconTable {
        match &self.lexicon {
            Some(overrides) => LexiconTable::builtin().merged_with(overrides.clone()),
            None => LexiconTable::builtin(),
        }
    }

    pub fn suggestion_table(&self) -> SuggestionTable {
        match &self.suggestions {
            Some(overrides) => SuggestionTable::builtin().merged_with(overrides.clone()),
            None => SuggestionTable::builtin(),
        }
    }
}
