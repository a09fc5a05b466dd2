//! pulse-core
//!
//! Background pipeline of an HR analytics service: survey answers are
//! re-scored for sentiment, turned into churn-risk rows, and high risk is
//! escalated to HR.
//!
//! # Modules
//! - **domain**: ids, task envelopes, faults, retry decisions, HR entities
//! - **ports**: traits for storage, clock, ids, classifier and notifiers
//! - **queue**: priority queue with delays, retries and dead letters
//! - **typed**: typed task payloads, handlers and registry
//! - **analytics**: sentiment estimator, feature aggregation, risk scorer
//! - **app**: queue client, producers, builder, worker pool
//! - **handlers**: the four task handlers
//! - **impls**: in-memory and HTTP adapters
//! - **config**: TOML configuration

pub mod analytics;
pub mod app;
pub mod config;
pub mod domain;
pub mod handlers;
pub mod impls;
pub mod ports;
pub mod queue;
pub mod typed;

pub use crate::app::{App, AppBuilder, QueueClient, SurveyIntake, WorkerPool, WorkerPoolConfig};
pub use crate::config::PulseConfig;
pub use crate::queue::{InMemoryQueue, Queue};
