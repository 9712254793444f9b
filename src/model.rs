//! Classifier candidates, model selection, and artifact persistence

use crate::data::{ChurnData, ScoringData};
use linfa::dataset::Pr;
use linfa::metrics::BinaryClassification;
use linfa::prelude::*;
use linfa_logistic::{FittedLogisticRegression, LogisticRegression};
use linfa_trees::DecisionTree;
use ndarray::{Array1, Array2, Ix1};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rmp_serde::{decode::from_read, encode::write_named};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Candidate classifiers, evaluated in this order
pub const CANDIDATES: [&str; 2] = ["decision_tree", "logistic_regression"];

/// Ratio of records held out for candidate evaluation
const EVALUATION_RATIO: f32 = 0.2;

/// Share of records synthetically relabeled when only one class is observed
const RELABEL_SHARE: f64 = 0.3;

/// Trivial predictor that always outputs the most frequent observed label.
///
/// Its probability output carries one column per *observed* class, so a fit
/// on single-class data yields a single-column matrix; the scorer handles
/// that case explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MajorityClass {
    classes: Vec<usize>,
    priors: Vec<f64>,
    majority: usize,
}

impl MajorityClass {
    /// Fit on a label vector by counting class frequencies
    pub fn fit(labels: &Array1<usize>) -> Self {
        let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
        for &label in labels.iter() {
            *counts.entry(label).or_insert(0) += 1;
        }

        let total = labels.len().max(1) as f64;
        let mut majority = 0;
        let mut best_count = 0;
        for (&class, &count) in &counts {
            // Ties resolve to the smaller class label
            if count > best_count {
                best_count = count;
                majority = class;
            }
        }

        let classes: Vec<usize> = counts.keys().copied().collect();
        let priors = classes
            .iter()
            .map(|class| counts[class] as f64 / total)
            .collect();

        MajorityClass {
            classes,
            priors,
            majority,
        }
    }

    fn predict(&self, features: &Array2<f64>) -> Array1<usize> {
        Array1::from_elem(features.nrows(), self.majority)
    }

    fn predict_proba(&self, features: &Array2<f64>) -> Array2<f64> {
        let n_rows = features.nrows();
        let n_classes = self.classes.len();
        let mut proba = Array2::zeros((n_rows, n_classes));
        for row in 0..n_rows {
            for (col, &prior) in self.priors.iter().enumerate() {
                proba[[row, col]] = prior;
            }
        }
        proba
    }
}

/// The persisted churn classifier: one of the fitted candidates, or the
/// majority-class fallback
#[derive(Serialize, Deserialize)]
pub enum ChurnModel {
    DecisionTree(DecisionTree<f64, usize>),
    LogisticRegression(FittedLogisticRegression<f64, usize>),
    Majority(MajorityClass),
}

impl ChurnModel {
    pub fn name(&self) -> &'static str {
        match self {
            ChurnModel::DecisionTree(_) => "decision_tree",
            ChurnModel::LogisticRegression(_) => "logistic_regression",
            ChurnModel::Majority(_) => "majority_class",
        }
    }

    /// Predict a hard label per row
    pub fn predict(&self, features: &Array2<f64>) -> Array1<usize> {
        match self {
            ChurnModel::DecisionTree(tree) => tree.predict(features),
            ChurnModel::LogisticRegression(logistic) => logistic.predict(features),
            ChurnModel::Majority(majority) => majority.predict(features),
        }
    }

    /// Probability matrix with one row per record.
    ///
    /// Fitted candidates produce two columns ordered `[class 0, class 1]`.
    /// The decision tree exposes no leaf distribution, so its probabilities
    /// are the one-hot encoding of its predicted labels.
    pub fn predict_proba(&self, features: &Array2<f64>) -> Array2<f64> {
        match self {
            ChurnModel::DecisionTree(tree) => {
                let predicted = tree.predict(features);
                let mut proba = Array2::zeros((features.nrows(), 2));
                for (row, &label) in predicted.iter().enumerate() {
                    proba[[row, label.min(1)]] = 1.0;
                }
                proba
            }
            ChurnModel::LogisticRegression(logistic) => {
                let positive = logistic.predict_probabilities(features);
                let mut proba = Array2::zeros((features.nrows(), 2));
                for (row, &p) in positive.iter().enumerate() {
                    proba[[row, 0]] = 1.0 - p;
                    proba[[row, 1]] = p;
                }
                proba
            }
            ChurnModel::Majority(majority) => majority.predict_proba(features),
        }
    }

    /// Persist the model as MessagePack, overwriting any prior artifact
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        write_named(&mut writer, self)?;
        Ok(())
    }

    /// Load a persisted model; fails if the artifact is absent or undecodable
    pub fn load(path: &Path) -> crate::Result<Self> {
        if !path.exists() {
            anyhow::bail!(
                "Model artifact not found at {}; run the train stage first",
                path.display()
            );
        }
        let file = File::open(path)?;
        let model = from_read(BufReader::new(file))?;
        Ok(model)
    }
}

/// Evaluation metrics for one fitted candidate
#[derive(Debug, Clone)]
pub struct CandidateMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub roc_auc: f64,
}

/// Per-candidate outcome: metrics on success, the error text otherwise
#[derive(Debug)]
pub struct CandidateReport {
    pub name: &'static str,
    pub metrics: Option<CandidateMetrics>,
    pub error: Option<String>,
}

/// How the final model was chosen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// Named candidate won on ROC-AUC
    Candidate(&'static str),
    /// Fewer than five records; candidate evaluation skipped
    MajoritySmallData,
    /// No candidate fit with a positive AUC
    MajorityNoWinner,
}

/// Result of a training run
pub struct TrainingOutcome {
    pub model: ChurnModel,
    pub reports: Vec<CandidateReport>,
    pub selection: Selection,
    /// Records synthetically relabeled as positive (single-class input only)
    pub synthetic_relabels: usize,
}

/// Train the churn model: evaluate every candidate on a seeded 80/20 split
/// and keep the one with the highest ROC-AUC, falling back to the
/// majority-class predictor when the data is too small or no candidate fits
pub fn train_churn_model(data: &ChurnData, seed: u64) -> crate::Result<TrainingOutcome> {
    train_with_candidates(data, seed, &CANDIDATES)
}

fn train_with_candidates(
    data: &ChurnData,
    seed: u64,
    candidates: &[&'static str],
) -> crate::Result<TrainingOutcome> {
    let n_records = data.features.nrows();

    if n_records < 5 {
        return Ok(TrainingOutcome {
            model: ChurnModel::Majority(MajorityClass::fit(&data.labels)),
            reports: Vec::new(),
            selection: Selection::MajoritySmallData,
            synthetic_relabels: 0,
        });
    }

    let mut labels = data.labels.clone();
    let distinct: std::collections::BTreeSet<usize> = labels.iter().copied().collect();
    let mut synthetic_relabels = 0;
    if distinct.len() == 1 {
        // Relabel the leading share of records so both classes exist
        let k = ((RELABEL_SHARE * n_records as f64) as usize).max(1);
        for i in 0..k {
            labels[i] = 1;
        }
        synthetic_relabels = k;
    }

    let dataset = Dataset::new(data.features.clone(), labels.clone());
    let mut rng = StdRng::seed_from_u64(seed);
    let (train, valid) = dataset
        .shuffle(&mut rng)
        .split_with_ratio(1.0 - EVALUATION_RATIO);

    let mut reports = Vec::with_capacity(candidates.len());
    let mut best: Option<(&'static str, ChurnModel)> = None;
    let mut best_auc = 0.0_f64;

    for &name in candidates {
        match fit_candidate(name, &train).and_then(|model| {
            let metrics = evaluate_candidate(&model, &valid)?;
            Ok((model, metrics))
        }) {
            Ok((model, metrics)) => {
                if metrics.roc_auc > best_auc {
                    best_auc = metrics.roc_auc;
                    best = Some((name, model));
                }
                reports.push(CandidateReport {
                    name,
                    metrics: Some(metrics),
                    error: None,
                });
            }
            Err(e) => reports.push(CandidateReport {
                name,
                metrics: None,
                error: Some(e.to_string()),
            }),
        }
    }

    let (model, selection) = match best {
        Some((name, model)) => (model, Selection::Candidate(name)),
        None => (
            ChurnModel::Majority(MajorityClass::fit(&labels)),
            Selection::MajorityNoWinner,
        ),
    };

    Ok(TrainingOutcome {
        model,
        reports,
        selection,
        synthetic_relabels,
    })
}

fn fit_candidate(name: &str, train: &Dataset<f64, usize, Ix1>) -> crate::Result<ChurnModel> {
    match name {
        "decision_tree" => {
            let tree = DecisionTree::params().fit(train)?;
            Ok(ChurnModel::DecisionTree(tree))
        }
        "logistic_regression" => {
            let logistic = LogisticRegression::default().max_iterations(200).fit(train)?;
            Ok(ChurnModel::LogisticRegression(logistic))
        }
        other => anyhow::bail!("Unknown candidate: {}", other),
    }
}

fn evaluate_candidate(
    model: &ChurnModel,
    valid: &Dataset<f64, usize, Ix1>,
) -> crate::Result<CandidateMetrics> {
    let records = valid.records();
    let predicted = model.predict(records);
    let cm = predicted.confusion_matrix(valid)?;

    let truth: Vec<bool> = valid.targets().iter().map(|&t| t == 1).collect();
    let has_both_classes = truth.iter().any(|&t| t) && truth.iter().any(|&t| !t);

    // ROC-AUC is undefined on a single-class partition; 0.5 by convention
    let roc_auc = if has_both_classes {
        let proba = model.predict_proba(records);
        // A degenerate single-column model scores every record as zero
        let scores: Vec<Pr> = if proba.ncols() > 1 {
            proba
                .column(1)
                .iter()
                .map(|&p| Pr::new(p as f32))
                .collect()
        } else {
            vec![Pr::new(0.0); proba.nrows()]
        };
        scores.as_slice().roc(truth.as_slice())?.area_under_curve() as f64
    } else {
        0.5
    };

    Ok(CandidateMetrics {
        accuracy: cm.accuracy() as f64,
        precision: cm.precision() as f64,
        recall: cm.recall() as f64,
        f1: cm.f1_score() as f64,
        roc_auc,
    })
}

/// Score a batch: one churn probability per record.
///
/// With a two-column probability matrix the positive-class column is used.
/// A degenerate single-column model is not an error; its only column is
/// taken as the churn probability directly, and the returned flag marks
/// that the fallback was applied.
pub fn score_batch(model: &ChurnModel, data: &ScoringData) -> crate::Result<(Vec<f64>, bool)> {
    let proba = model.predict_proba(&data.features);
    if proba.ncols() == 0 {
        anyhow::bail!("Model produced no probability columns");
    }

    let single_column = proba.ncols() == 1;
    let column = if single_column { 0 } else { 1 };
    let probabilities = proba.column(column).to_vec();
    Ok((probabilities, single_column))
}
