//! Ports: the traits the pipeline talks to the outside world through.

pub mod classifier;
pub mod clock;
pub mod id_generator;
pub mod notifier;
pub mod repository;

pub use self::classifier::{ClassifierError, SentimentClassifier};
pub use self::clock::{Clock, ManualClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::notifier::{EmailMessage, EmailSender, NotifyError, SlackAlert, SlackSender};
pub use self::repository::{HrRepository, RepoError};
