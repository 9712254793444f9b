//! ChurnForge: churn-risk prediction for subscription-service users
//!
//! This library provides a three-stage batch pipeline: train a classifier on
//! user-activity records, score a batch of users with the persisted model,
//! and visualize the resulting risk distribution.

pub mod cli;
pub mod data;
pub mod model;
pub mod viz;

// Re-export public items for easier access
pub use cli::{Args, Command};
pub use data::{load_scoring_data, load_training_data, write_scored_output, ChurnData, ScoringData};
pub use model::{score_batch, train_churn_model, ChurnModel, Selection, TrainingOutcome};
pub use viz::generate_risk_report;

/// Common result type used throughout the application
pub type Result<T> = anyhow::Result<T>;
