use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pulse_core::analytics::{RiskScorer, SentimentEstimator};
use pulse_core::app::{AppBuilder, QueueClient, WorkerPool, WorkerPoolConfig};
use pulse_core::config::PulseConfig;
use pulse_core::domain::TaskKind;
use pulse_core::handlers::{HandlerDeps, register_all};
use pulse_core::impls::{
    Fixture, HttpSentimentClassifier, InMemoryHrRepository, SlackWebhookSender, SmtpEmailSender,
    TracingEmailSender,
};
use pulse_core::ports::{Clock, EmailSender, HrRepository, SystemClock, UlidGenerator};
use pulse_core::queue::{InMemoryQueue, Queue};

/// Background worker of the HR analytics pipeline.
#[derive(Debug, Parser)]
#[command(name = "pulse-worker", version)]
struct Args {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long, env = "PULSE_CONFIG")]
    config: Option<PathBuf>,

    /// JSON file seeding the in-memory HR store.
    #[arg(short, long, env = "PULSE_FIXTURE")]
    fixture: Option<PathBuf>,

    /// Overrides `worker.concurrency`.
    #[arg(long, env = "PULSE_CONCURRENCY")]
    concurrency: Option<usize>,

    #[arg(long, env = "SLACK_WEBHOOK_URL")]
    slack_webhook: Option<String>,

    #[arg(long, env = "ALERT_EMAIL")]
    alert_email: Option<String>,

    /// Token of the hosted sentiment classifier; lexicon only without it.
    #[arg(long, env = "HUGGINGFACE_API_KEY", hide_env_values = true)]
    classifier_token: Option<String>,

    #[arg(long, env = "SMTP_HOST")]
    smtp_host: Option<String>,

    #[arg(long, env = "SMTP_USER")]
    smtp_user: Option<String>,

    #[arg(long, env = "SMTP_PASSWORD", hide_env_values = true)]
    smtp_password: Option<String>,

    /// Log outgoing email instead of delivering it over SMTP.
    #[arg(long, env = "PULSE_LOG_EMAIL")]
    log_email: bool,

    /// Emit logs as JSON lines.
    #[arg(long)]
    json_logs: bool,

    /// Do not queue the daily company-wide churn sweep at startup.
    #[arg(long)]
    no_daily_analysis: bool,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if let Err(e) = result {
        eprintln!("tracing already initialised: {e}");
    }
}

fn load_config(args: &Args) -> Result<PulseConfig> {
    let mut config = match &args.config {
        Some(path) => PulseConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => PulseConfig::default(),
    };

    if let Some(concurrency) = args.concurrency {
        config.worker.concurrency = concurrency;
    }
    if let Some(url) = &args.slack_webhook {
        config.notifications.slack_webhook_url = Some(url.clone());
    }
    if let Some(email) = &args.alert_email {
        config.notifications.alert_email = Some(email.clone());
    }
    if let Some(token) = &args.classifier_token {
        config.classifier.token = Some(token.clone());
    }
    if let Some(host) = &args.smtp_host {
        config.smtp.host = host.clone();
    }
    if let Some(user) = &args.smtp_user {
        config.smtp.user = user.clone();
    }
    if let Some(password) = &args.smtp_password {
        config.smtp.password = password.clone();
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn load_fixture(path: &Path) -> Result<Fixture> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading fixture {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing fixture {}", path.display()))
}

fn build_email_sender(args: &Args, config: &PulseConfig) -> Arc<dyn EmailSender> {
    if args.log_email {
        info!("email delivery disabled, messages are logged");
        return Arc::new(TracingEmailSender);
    }
    if !config.smtp.settings().is_configured() {
        warn!("default smtp settings incomplete, only companies with their own smtp get email");
    }
    Arc::new(SmtpEmailSender::new(config.smtp.timeout()))
}

fn build_estimator(config: &PulseConfig) -> Result<SentimentEstimator> {
    let lexicon = config.lexicon_table();
    if !config.classifier.is_enabled() {
        info!("sentiment classifier disabled, using lexicon only");
        return Ok(SentimentEstimator::lexicon_only(lexicon));
    }
    let classifier = HttpSentimentClassifier::new(config.classifier.clone())
        .context("building sentiment classifier")?;
    info!(base_url = %config.classifier.base_url, "sentiment classifier enabled");
    Ok(SentimentEstimator::with_classifier(
        Arc::new(classifier),
        lexicon,
        config.classifier.timeout(),
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.json_logs);
    let config = load_config(&args)?;

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let queue = InMemoryQueue::new(config.queue_settings(), Arc::clone(&clock));
    let shared_queue: Arc<dyn Queue> = Arc::new(queue.clone());
    let client = QueueClient::new(
        Arc::clone(&shared_queue),
        Arc::new(UlidGenerator::new(Arc::clone(&clock))),
        Arc::clone(&clock),
    );

    let repo: Arc<dyn HrRepository> = match &args.fixture {
        Some(path) => Arc::new(InMemoryHrRepository::from_fixture(load_fixture(path)?)),
        None => {
            warn!("no fixture given, starting with an empty HR store");
            Arc::new(InMemoryHrRepository::new())
        }
    };

    let slack = SlackWebhookSender::new(
        config.notifications.slack_webhook_url.clone(),
        config.notifications.timeout(),
    )
    .context("building slack client")?;
    if !slack.is_configured() {
        info!("slack webhook not configured, alerts go to email only");
    }

    let deps = HandlerDeps {
        repo: Arc::clone(&repo),
        estimator: Arc::new(build_estimator(&config)?),
        scorer: RiskScorer::default(),
        suggestions: Arc::new(config.suggestion_table()),
        email: build_email_sender(&args, &config),
        slack: Arc::new(slack),
        client: client.clone(),
        clock: Arc::clone(&clock),
        default_smtp: config.smtp.settings(),
        alert_email: config.notifications.alert_email.clone(),
        survey_link_base: config.invitations.survey_link_base.clone(),
    };
    let app = register_all(AppBuilder::new(), deps)?
        .expect_kinds(&TaskKind::ALL)
        .build()?;

    let pool = WorkerPool::spawn(
        WorkerPoolConfig::from(&config.worker),
        shared_queue,
        Arc::new(app),
    );

    if !args.no_daily_analysis {
        for company in repo.list_companies().await? {
            let task_id = client.schedule_daily_churn_analysis(company.id).await?;
            info!(company_id = company.id, %task_id, "daily churn analysis scheduled");
        }
    }

    info!("worker running, press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("waiting for Ctrl-C")?;

    info!("shutting down");
    pool.request_shutdown();
    queue.close().await;
    let stats = pool.shutdown_and_join().await;
    let counts = queue.counts_by_state().await?;
    info!(?stats, ?counts, "worker stopped");
    Ok(())
}
