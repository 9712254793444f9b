//! Command-line interface definitions and argument parsing

use clap::{Parser, Subcommand};

/// Churn prediction CLI: train a classifier, score users, visualize risk
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Train the churn classifier and persist the winning model
    Train {
        /// Path to the input CSV of user activity records
        #[arg(short, long, default_value = "churn_data.csv")]
        input: String,

        /// Output path for the model artifact
        #[arg(short, long, default_value = "churn_model.msgpack")]
        model: String,

        /// Seed for the train/evaluation split
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },

    /// Score a batch of users with the persisted model
    Score {
        /// Path to the input CSV of user activity records
        #[arg(short, long, default_value = "churn_data.csv")]
        input: String,

        /// Path to the persisted model artifact
        #[arg(short, long, default_value = "churn_model.msgpack")]
        model: String,

        /// Output path for the scored records
        #[arg(short, long, default_value = "churn_results.csv")]
        output: String,
    },

    /// Render the risk distribution and top-risk charts
    Visualize {
        /// Path to the scored records CSV
        #[arg(short, long, default_value = "churn_results.csv")]
        input: String,

        /// Output path for the probability distribution chart
        #[arg(long, default_value = "churn_probability_plot.png")]
        distribution: String,

        /// Output path for the top high-risk users chart
        #[arg(long, default_value = "top_risky_users.png")]
        top_risk: String,
    },

    /// Run train, score, and visualize in sequence
    Pipeline {
        /// Path to the input CSV of user activity records
        #[arg(short, long, default_value = "churn_data.csv")]
        input: String,

        /// Path for the model artifact
        #[arg(short, long, default_value = "churn_model.msgpack")]
        model: String,

        /// Output path for the scored records
        #[arg(short, long, default_value = "churn_results.csv")]
        output: String,

        /// Output path for the probability distribution chart
        #[arg(long, default_value = "churn_probability_plot.png")]
        distribution: String,

        /// Output path for the top high-risk users chart
        #[arg(long, default_value = "top_risky_users.png")]
        top_risk: String,

        /// Seed for the train/evaluation split
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
}
