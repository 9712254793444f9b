//! Risk-distribution charts rendered with Plotters

use crate::data::ScoredRecords;
use plotters::prelude::*;

/// Fixed bin count for the probability histogram
const HISTOGRAM_BINS: usize = 10;

/// Number of records shown in the high-risk bar chart
const TOP_RISK_COUNT: usize = 5;

const BAR_COLOR: RGBColor = RGBColor(220, 20, 60);

/// Histogram of churn probabilities across all records, with a smoothed
/// density overlay, saved as a PNG at `output_path`
pub fn create_distribution_chart(records: &ScoredRecords, output_path: &str) -> crate::Result<()> {
    let probs = &records.probabilities;
    if probs.is_empty() {
        anyhow::bail!("No scored records to plot");
    }

    let bin_width = 1.0 / HISTOGRAM_BINS as f64;
    let mut counts = vec![0usize; HISTOGRAM_BINS];
    for &p in probs {
        let bin = ((p / bin_width) as usize).min(HISTOGRAM_BINS - 1);
        counts[bin] += 1;
    }
    let max_count = *counts.iter().max().unwrap_or(&1) as f64;
    let y_max = (max_count * 1.2).max(1.0);

    let root = BitMapBackend::new(output_path, (700, 400)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Churn Probability Distribution", ("sans-serif", 24))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(0f64..1f64, 0f64..y_max)?;

    chart
        .configure_mesh()
        .x_desc("Churn Probability")
        .y_desc("Users")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    for (bin, &count) in counts.iter().enumerate() {
        let x0 = bin as f64 * bin_width;
        let x1 = x0 + bin_width;
        chart.draw_series(std::iter::once(Rectangle::new(
            [(x0, 0.0), (x1, count as f64)],
            BAR_COLOR.mix(0.5).filled(),
        )))?;
    }

    // Gaussian KDE overlay, scaled from density to counts
    let density = kde_curve(probs, 200);
    let scale = probs.len() as f64 * bin_width;
    chart.draw_series(LineSeries::new(
        density.into_iter().map(|(x, d)| (x, d * scale)),
        BAR_COLOR.stroke_width(2),
    ))?;

    root.present()?;
    println!("Distribution chart saved to: {}", output_path);

    Ok(())
}

/// Horizontal bar chart of the highest-risk records, descending, saved as a
/// PNG at `output_path`. Bars are labeled with the user ID when the scored
/// file carries one, the record index otherwise.
pub fn create_top_risk_chart(records: &ScoredRecords, output_path: &str) -> crate::Result<()> {
    let probs = &records.probabilities;
    if probs.is_empty() {
        anyhow::bail!("No scored records to plot");
    }

    let mut order: Vec<usize> = (0..probs.len()).collect();
    order.sort_by(|&a, &b| probs[b].partial_cmp(&probs[a]).unwrap_or(std::cmp::Ordering::Equal));
    order.truncate(TOP_RISK_COUNT);
    let shown = order.len();

    let root = BitMapBackend::new(output_path, (700, 400)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("Top {} High-Risk Users", shown),
            ("sans-serif", 24),
        )
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(80)
        .build_cartesian_2d(0f64..1.05f64, 0f64..shown as f64)?;

    chart
        .configure_mesh()
        .x_desc("Churn Probability")
        .disable_y_mesh()
        .y_labels(0)
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    let label_style = ("sans-serif", 15).into_font().color(&BLACK);
    for (rank, &idx) in order.iter().enumerate() {
        // Rank 0 at the top of the chart
        let top = (shown - rank) as f64;
        chart.draw_series(std::iter::once(Rectangle::new(
            [(0.0, top - 0.85), (probs[idx], top - 0.15)],
            BAR_COLOR.filled(),
        )))?;

        let label = match &records.user_ids {
            Some(ids) => format!("user {:.0}", ids[idx]),
            None => format!("record {}", idx),
        };
        chart.draw_series(std::iter::once(Text::new(
            label,
            (0.02, top - 0.4),
            label_style.clone(),
        )))?;
    }

    root.present()?;
    println!("Top-risk chart saved to: {}", output_path);

    Ok(())
}

/// Render both chart artifacts for a scored record set
pub fn generate_risk_report(
    records: &ScoredRecords,
    distribution_path: &str,
    top_risk_path: &str,
) -> crate::Result<()> {
    create_distribution_chart(records, distribution_path)?;
    create_top_risk_chart(records, top_risk_path)?;
    Ok(())
}

/// Evaluate a Gaussian kernel density estimate on an even grid over [0, 1]
fn kde_curve(values: &[f64], points: usize) -> Vec<(f64, f64)> {
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    // Silverman's rule; flat samples get a small fixed bandwidth
    let mut bandwidth = 1.06 * variance.sqrt() * n.powf(-0.2);
    if !bandwidth.is_finite() || bandwidth < 1e-3 {
        bandwidth = 0.05;
    }

    let norm = 1.0 / (n * bandwidth * (2.0 * std::f64::consts::PI).sqrt());
    (0..=points)
        .map(|i| {
            let x = i as f64 / points as f64;
            let density = values
                .iter()
                .map(|v| (-0.5 * ((x - v) / bandwidth).powi(2)).exp())
                .sum::<f64>()
                * norm;
            (x, density)
        })
        .collect()
}
