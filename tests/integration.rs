//! Integration tests for ChurnForge

use churnforge::data::{load_scored_records, load_scoring_data, load_training_data, write_scored_output};
use churnforge::model::{score_batch, train_churn_model, ChurnModel, Selection};
use churnforge::viz::generate_risk_report;
use std::io::Write;
use tempfile::NamedTempFile;

/// Ten users, seven retained and three churned, with separable activity
fn create_training_csv() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(
        file,
        "user_id,num_videos_watched,avg_watch_time_per_day,last_login_days_ago,support_tickets,tenure_months,churn"
    )
    .unwrap();

    // Retained users: active, recent logins
    writeln!(file, "1,120,2.5,2,0,14,0").unwrap();
    writeln!(file, "2,95,1.9,5,1,10,0").unwrap();
    writeln!(file, "3,150,3.1,1,0,24,0").unwrap();
    writeln!(file, "4,88,2.0,4,0,8,0").unwrap();
    writeln!(file, "5,110,2.7,3,1,18,0").unwrap();
    writeln!(file, "6,70,1.5,6,0,7,0").unwrap();
    writeln!(file, "7,130,2.9,2,0,30,0").unwrap();

    // Churned users: inactive, long absent
    writeln!(file, "8,8,0.2,55,4,2,1").unwrap();
    writeln!(file, "9,3,0.1,70,5,1,1").unwrap();
    writeln!(file, "10,12,0.3,48,3,3,1").unwrap();

    file
}

#[test]
fn test_end_to_end_pipeline() {
    let csv = create_training_csv();
    let csv_path = csv.path().to_str().unwrap();
    let dir = tempfile::tempdir().unwrap();

    // Train: a real candidate must win and expose two probability columns
    let data = load_training_data(csv_path).unwrap();
    assert_eq!(data.features.shape(), &[10, 6]);

    let outcome = train_churn_model(&data, 42).unwrap();
    assert!(matches!(outcome.selection, Selection::Candidate(_)));

    let model_path = dir.path().join("churn_model.msgpack");
    outcome.model.save(&model_path).unwrap();

    // Score through the persisted artifact, never the in-memory model
    let model = ChurnModel::load(&model_path).unwrap();
    assert_eq!(model.predict_proba(&data.features).ncols(), 2);

    let mut scoring = load_scoring_data(csv_path).unwrap();
    let (probabilities, single_column) = score_batch(&model, &scoring).unwrap();
    assert!(!single_column);
    assert_eq!(probabilities.len(), 10);
    assert!(probabilities.iter().all(|p| (0.0..=1.0).contains(p)));

    let results_path = dir.path().join("churn_results.csv");
    let results_str = results_path.to_str().unwrap();
    write_scored_output(&mut scoring, &probabilities, results_str).unwrap();

    // Round trip: no rows dropped or added
    let scored = load_scored_records(results_str).unwrap();
    assert_eq!(scored.probabilities.len(), 10);
    assert_eq!(scored.user_ids.as_ref().unwrap().len(), 10);

    // Visualize: both chart artifacts exist and are non-empty
    let dist_path = dir.path().join("churn_probability_plot.png");
    let top_path = dir.path().join("top_risky_users.png");
    generate_risk_report(
        &scored,
        dist_path.to_str().unwrap(),
        top_path.to_str().unwrap(),
    )
    .unwrap();
    assert!(std::fs::metadata(&dist_path).unwrap().len() > 0);
    assert!(std::fs::metadata(&top_path).unwrap().len() > 0);
}

#[test]
fn test_scoring_is_column_order_independent() {
    let csv = create_training_csv();
    let data = load_training_data(csv.path().to_str().unwrap()).unwrap();
    let outcome = train_churn_model(&data, 42).unwrap();

    // Same records with the columns shuffled
    let mut shuffled = NamedTempFile::new().unwrap();
    writeln!(
        shuffled,
        "tenure_months,churn,user_id,support_tickets,num_videos_watched,last_login_days_ago,avg_watch_time_per_day"
    )
    .unwrap();
    writeln!(shuffled, "14,0,1,0,120,2,2.5").unwrap();
    writeln!(shuffled, "1,1,9,5,3,70,0.1").unwrap();

    let scoring = load_scoring_data(shuffled.path().to_str().unwrap()).unwrap();
    let (probabilities, _) = score_batch(&outcome.model, &scoring).unwrap();

    assert_eq!(probabilities.len(), 2);
    // The churned profile must look riskier than the retained one
    assert!(probabilities[1] >= probabilities[0]);
}

#[test]
fn test_scoring_with_missing_columns() {
    let csv = create_training_csv();
    let data = load_training_data(csv.path().to_str().unwrap()).unwrap();
    let outcome = train_churn_model(&data, 42).unwrap();

    let mut partial = NamedTempFile::new().unwrap();
    writeln!(
        partial,
        "user_id,num_videos_watched,avg_watch_time_per_day,last_login_days_ago"
    )
    .unwrap();
    writeln!(partial, "11,40,1.1,20").unwrap();
    writeln!(partial, "12,6,0.2,65").unwrap();

    let scoring = load_scoring_data(partial.path().to_str().unwrap()).unwrap();
    // Defaults synthesized: support_tickets -> 0, tenure_months -> 6
    assert_eq!(scoring.features[[0, 4]], 0.0);
    assert_eq!(scoring.features[[0, 5]], 6.0);

    let (probabilities, _) = score_batch(&outcome.model, &scoring).unwrap();
    assert_eq!(probabilities.len(), 2);
    assert!(probabilities.iter().all(|p| (0.0..=1.0).contains(p)));
}

#[test]
fn test_small_dataset_degenerate_scoring() {
    // Three records, all retained: majority fallback trained on one class
    let mut csv = NamedTempFile::new().unwrap();
    writeln!(
        csv,
        "user_id,num_videos_watched,avg_watch_time_per_day,last_login_days_ago,support_tickets,tenure_months,churn"
    )
    .unwrap();
    writeln!(csv, "1,120,2.5,2,0,14,0").unwrap();
    writeln!(csv, "2,95,1.9,5,1,10,0").unwrap();
    writeln!(csv, "3,150,3.1,1,0,24,0").unwrap();
    let csv_path = csv.path().to_str().unwrap();

    let data = load_training_data(csv_path).unwrap();
    let outcome = train_churn_model(&data, 42).unwrap();
    assert_eq!(outcome.selection, Selection::MajoritySmallData);

    // Single observed class gives a single probability column, which the
    // scorer uses directly
    let scoring = load_scoring_data(csv_path).unwrap();
    let (probabilities, single_column) = score_batch(&outcome.model, &scoring).unwrap();
    assert!(single_column);
    assert_eq!(probabilities, vec![1.0, 1.0, 1.0]);
}

#[test]
fn test_missing_model_artifact_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let result = ChurnModel::load(&dir.path().join("absent.msgpack"));
    assert!(result.is_err());
}

#[test]
fn test_missing_input_file_is_fatal() {
    assert!(load_training_data("no_such_file.csv").is_err());
    assert!(load_scoring_data("no_such_file.csv").is_err());
    assert!(load_scored_records("no_such_file.csv").is_err());
}

#[test]
fn test_seeded_training_is_reproducible() {
    let csv = create_training_csv();
    let data = load_training_data(csv.path().to_str().unwrap()).unwrap();

    let a = train_churn_model(&data, 7).unwrap();
    let b = train_churn_model(&data, 7).unwrap();
    assert_eq!(a.selection, b.selection);

    let pa = a.model.predict_proba(&data.features);
    let pb = b.model.predict_proba(&data.features);
    assert_eq!(pa, pb);
}
