//! App layer: combines ports into the running pipeline.
//!
//! - **AppBuilder**: handler wiring and startup validation
//! - **QueueClient**: typed enqueue for producers
//! - **SurveyIntake**: producer operations of the CRUD layer
//! - **WorkerPool**: lease → handle → ack/fail loops

pub mod builder;
pub mod client;
pub mod intake;
pub mod worker_pool;

pub use self::builder::{App, AppBuilder, BuildError};
pub use self::client::{
    CHURN_RECALC_DELAY, DAILY_ANALYSIS_DELAY, EnqueueOptions, QueueClient, Schedule,
};
pub use self::intake::{AuthenticatedUser, IntakeError, RequestContext, SurveyIntake};
pub use self::worker_pool::{PoolStats, WorkerPool, WorkerPoolConfig, execute};
