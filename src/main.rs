//! ChurnForge: churn-risk prediction pipeline for subscription users
//!
//! This is the main entrypoint that dispatches the three batch stages:
//! training, scoring, and visualization.

use anyhow::Result;
use churnforge::data::{load_scored_records, load_scoring_data, load_training_data, ScoringData};
use churnforge::model::{score_batch, train_churn_model, ChurnModel, Selection};
use churnforge::{viz, Args, Command};
use clap::Parser;
use std::path::Path;
use std::time::Instant;

fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Train { input, model, seed } => run_train(&input, &model, seed),
        Command::Score {
            input,
            model,
            output,
        } => run_score(&input, &model, &output),
        Command::Visualize {
            input,
            distribution,
            top_risk,
        } => run_visualize(&input, &distribution, &top_risk),
        Command::Pipeline {
            input,
            model,
            output,
            distribution,
            top_risk,
            seed,
        } => {
            run_train(&input, &model, seed)?;
            println!();
            run_score(&input, &model, &output)?;
            println!();
            run_visualize(&output, &distribution, &top_risk)
        }
    }
}

/// Train the classifier and persist the winning model
fn run_train(input: &str, model_path: &str, seed: u64) -> Result<()> {
    println!("=== Training Stage ===\n");
    let start = Instant::now();

    let data = load_training_data(input)?;
    println!("✓ Data loaded: {} records", data.features.nrows());
    if data.coerced_values > 0 {
        println!(
            "  Warning: {} values could not be parsed and were treated as 0",
            data.coerced_values
        );
    }

    let outcome = train_churn_model(&data, seed)?;

    if outcome.synthetic_relabels > 0 {
        println!(
            "  Only one churn class found; relabeled the first {} records as churned",
            outcome.synthetic_relabels
        );
    }

    for report in &outcome.reports {
        println!("\nCandidate: {}", report.name);
        if let Some(metrics) = &report.metrics {
            println!("  Accuracy:  {:.3}", metrics.accuracy);
            println!("  Precision: {:.3}", metrics.precision);
            println!("  Recall:    {:.3}", metrics.recall);
            println!("  F1 Score:  {:.3}", metrics.f1);
            println!("  ROC-AUC:   {:.3}", metrics.roc_auc);
        } else if let Some(error) = &report.error {
            println!("  Error: {} (candidate skipped)", error);
        }
    }

    match &outcome.selection {
        Selection::Candidate(name) => println!("\n✓ Selected model: {}", name),
        Selection::MajoritySmallData => println!(
            "\nNot enough data to train a real model ({} records); using the majority-class fallback",
            data.features.nrows()
        ),
        Selection::MajorityNoWinner => {
            println!("\nNo candidate trained successfully; using the majority-class fallback")
        }
    }

    outcome.model.save(Path::new(model_path))?;
    println!("✓ Model saved to: {}", model_path);
    println!("Training time: {:.2}s", start.elapsed().as_secs_f64());

    Ok(())
}

/// Score a batch of users with the persisted model
///
/// Missing inputs are fatal; a failure during prediction itself is reported
/// and the stage exits cleanly, leaving any prior output untouched.
fn run_score(input: &str, model_path: &str, output: &str) -> Result<()> {
    println!("=== Scoring Stage ===\n");
    let start = Instant::now();

    let model = ChurnModel::load(Path::new(model_path))?;
    println!("✓ Model loaded: {}", model.name());

    let mut data = load_scoring_data(input)?;
    println!("✓ Data loaded: {} records", data.df.height());
    if data.coerced_values > 0 {
        println!(
            "  Warning: {} values could not be parsed and were treated as 0",
            data.coerced_values
        );
    }

    match score_and_write(&model, &mut data, output) {
        Ok(()) => {
            println!("✓ Churn prediction complete. Results saved to: {}", output);
            println!("Scoring time: {:.2}s", start.elapsed().as_secs_f64());
        }
        Err(e) => println!("Error during prediction: {}", e),
    }

    Ok(())
}

fn score_and_write(model: &ChurnModel, data: &mut ScoringData, output: &str) -> Result<()> {
    let (probabilities, single_column) = score_batch(model, data)?;
    if single_column {
        println!("  Only one probability column produced; using it as the churn probability");
    }
    churnforge::data::write_scored_output(data, &probabilities, output)?;
    Ok(())
}

/// Render both chart artifacts from the scored records
fn run_visualize(input: &str, distribution: &str, top_risk: &str) -> Result<()> {
    println!("=== Visualization Stage ===\n");
    let start = Instant::now();

    let records = load_scored_records(input)?;
    println!("✓ Scored records loaded: {}", records.probabilities.len());

    viz::generate_risk_report(&records, distribution, top_risk)?;
    println!("Visualization time: {:.2}s", start.elapsed().as_secs_f64());

    Ok(())
}
