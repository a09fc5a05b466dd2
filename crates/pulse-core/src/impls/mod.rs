//! Adapters for the ports: in-memory storage, HTTP and SMTP clients, dev senders.

pub mod email;
pub mod http_classifier;
pub mod memory_repo;
pub mod recording;
pub mod slack;
pub mod smtp;

pub use self::email::TracingEmailSender;
pub use self::http_classifier::HttpSentimentClassifier;
pub use self::memory_repo::{Fixture, InMemoryHrRepository};
pub use self::recording::{RecordingEmailSender, RecordingSlackSender};
pub use self::slack::SlackWebhookSender;
pub use self::smtp::SmtpEmailSender;
