//! Data loading, numeric coercion, and feature-matrix assembly using Polars

use ndarray::{Array1, Array2};
use polars::prelude::*;
use std::path::Path;

/// Feature columns in the exact order the model is trained on.
///
/// The scorer reconstructs this order regardless of how the input file is
/// laid out, so a model artifact is always fed features in training order.
pub const FEATURE_COLUMNS: [&str; 6] = [
    "user_id",
    "num_videos_watched",
    "avg_watch_time_per_day",
    "last_login_days_ago",
    "support_tickets",
    "tenure_months",
];

/// Binary label column, present only in training data.
pub const LABEL_COLUMN: &str = "churn";

/// Column appended to the scored output.
pub const PROBABILITY_COLUMN: &str = "churn_probability";

/// Default value used when a feature column is absent at scoring time.
fn scoring_default(column: &str) -> f64 {
    match column {
        "tenure_months" => 6.0,
        _ => 0.0,
    }
}

/// Training dataset: feature matrix, labels, and bookkeeping
#[derive(Debug)]
pub struct ChurnData {
    /// Feature matrix (n_records, 6) in `FEATURE_COLUMNS` order
    pub features: Array2<f64>,
    /// Binary churn labels (nonzero coerced value means churned)
    pub labels: Array1<usize>,
    /// User IDs corresponding to each row
    pub user_ids: Vec<f64>,
    /// Number of values that were unparseable or missing and coerced to zero
    pub coerced_values: usize,
}

/// Scoring dataset: the full input frame (passthrough columns included)
/// plus the reconstructed feature matrix
#[derive(Debug)]
pub struct ScoringData {
    /// Input records, with any missing feature columns synthesized
    pub df: DataFrame,
    /// Feature matrix (n_records, 6) in `FEATURE_COLUMNS` order
    pub features: Array2<f64>,
    /// Number of values coerced to zero while building the matrix
    pub coerced_values: usize,
}

/// Scored records as read back for visualization
#[derive(Debug)]
pub struct ScoredRecords {
    /// User IDs, when the scored file carries a `user_id` column
    pub user_ids: Option<Vec<f64>>,
    /// One churn probability per record
    pub probabilities: Vec<f64>,
}

fn read_csv(path: &str) -> crate::Result<DataFrame> {
    if !Path::new(path).exists() {
        anyhow::bail!("Input file not found: {}", path);
    }
    let df = CsvReader::from_path(path)?
        .has_header(true)
        .with_ignore_errors(true)
        .finish()?;
    Ok(df)
}

/// Coerce a column to f64, turning unparseable or missing values into zero.
/// Returns the values and the number of values that had to be zero-filled.
fn coerce_to_f64(series: &Series) -> crate::Result<(Vec<f64>, usize)> {
    let cast = series.cast(&DataType::Float64)?;
    let coerced = cast.null_count();
    let filled = cast.fill_null(FillNullStrategy::Zero)?;
    let values = filled.f64()?.into_no_null_iter().collect();
    Ok((values, coerced))
}

/// Assemble column vectors into a row-major (n_records, n_features) matrix
fn to_matrix(columns: &[Vec<f64>], n_records: usize) -> crate::Result<Array2<f64>> {
    let mut data = Vec::with_capacity(n_records * columns.len());
    for row in 0..n_records {
        for column in columns {
            data.push(column[row]);
        }
    }
    Ok(Array2::from_shape_vec((n_records, columns.len()), data)?)
}

/// Load training records and derive the feature matrix and label vector
///
/// Missing columns (the label included) are treated as all-zero; unparseable
/// values coerce to zero. Fails if the file is absent or holds no records.
pub fn load_training_data(path: &str) -> crate::Result<ChurnData> {
    let df = read_csv(path)?;
    let n_records = df.height();
    if n_records == 0 {
        anyhow::bail!("No records found in {}", path);
    }

    let mut coerced_total = 0;
    let mut columns: Vec<Vec<f64>> = Vec::with_capacity(FEATURE_COLUMNS.len());
    for &name in FEATURE_COLUMNS.iter() {
        let values = match df.column(name) {
            Ok(series) => {
                let (values, coerced) = coerce_to_f64(series)?;
                coerced_total += coerced;
                values
            }
            Err(_) => vec![0.0; n_records],
        };
        columns.push(values);
    }

    let labels: Vec<usize> = match df.column(LABEL_COLUMN) {
        Ok(series) => {
            let (values, coerced) = coerce_to_f64(series)?;
            coerced_total += coerced;
            values.iter().map(|&v| usize::from(v != 0.0)).collect()
        }
        Err(_) => vec![0; n_records],
    };

    let user_ids = columns[0].clone();
    let features = to_matrix(&columns, n_records)?;

    Ok(ChurnData {
        features,
        labels: Array1::from_vec(labels),
        user_ids,
        coerced_values: coerced_total,
    })
}

/// Load records to score, reconstructing the training feature order
///
/// Feature columns missing from the input are synthesized with their
/// scoring default (`tenure_months` -> 6, everything else -> 0) and kept in
/// the frame so they appear in the scored output. Passthrough columns are
/// left untouched.
pub fn load_scoring_data(path: &str) -> crate::Result<ScoringData> {
    let mut df = read_csv(path)?;
    let n_records = df.height();

    for &name in FEATURE_COLUMNS.iter() {
        if df.column(name).is_err() {
            df.with_column(Series::new(name, vec![scoring_default(name); n_records]))?;
        }
    }

    let mut coerced_total = 0;
    let mut columns: Vec<Vec<f64>> = Vec::with_capacity(FEATURE_COLUMNS.len());
    for &name in FEATURE_COLUMNS.iter() {
        let (values, coerced) = coerce_to_f64(df.column(name)?)?;
        coerced_total += coerced;
        columns.push(values);
    }
    let features = to_matrix(&columns, n_records)?;

    Ok(ScoringData {
        df,
        features,
        coerced_values: coerced_total,
    })
}

/// Append the probability column and persist the scored records as CSV,
/// overwriting any prior output
pub fn write_scored_output(
    data: &mut ScoringData,
    probabilities: &[f64],
    path: &str,
) -> crate::Result<()> {
    if probabilities.len() != data.df.height() {
        anyhow::bail!(
            "Probability count ({}) does not match record count ({})",
            probabilities.len(),
            data.df.height()
        );
    }

    data.df
        .with_column(Series::new(PROBABILITY_COLUMN, probabilities.to_vec()))?;

    let mut file = std::fs::File::create(path)?;
    CsvWriter::new(&mut file).finish(&mut data.df)?;
    Ok(())
}

/// Read a scored output file back for visualization
pub fn load_scored_records(path: &str) -> crate::Result<ScoredRecords> {
    let df = read_csv(path)?;

    let series = df.column(PROBABILITY_COLUMN).map_err(|_| {
        anyhow::anyhow!(
            "Column '{}' not found in {}; run the score stage first",
            PROBABILITY_COLUMN,
            path
        )
    })?;
    let (probabilities, _) = coerce_to_f64(series)?;

    let user_ids = match df.column("user_id") {
        Ok(series) => Some(coerce_to_f64(series)?.0),
        Err(_) => None,
    };

    Ok(ScoredRecords {
        user_ids,
        probabilities,
    })
}
