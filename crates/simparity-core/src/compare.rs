//! Percentile comparison of two distributions.

use crate::artifacts::Table;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PERCENTILES: [f64; 3] = [0.5, 0.9, 0.99];

/// One row of a percentile table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PercentileRow {
    /// Label such as `p50` or `p99.9`.
    pub metric: String,
    /// `None` when the series is empty.
    pub real_ns: Option<f64>,
    pub sim_ns: Option<f64>,
}

impl Table for PercentileRow {
    const NAME: &'static str = "percentiles";
    const COLUMNS: &'static [&'static str] = &["metric", "real_ns", "sim_ns"];
}

/// Percentile of `values` with linear interpolation at rank `p * (m - 1)`.
///
/// Returns `None` for an empty slice.
pub fn percentile_linear(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    Some(percentile_sorted(&sorted, p))
}

fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    let rank = p * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = (rank.ceil() as usize).min(sorted.len() - 1);
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Table label for a percentile fraction, e.g. `0.5 -> "p50"`, `0.999 -> "p99.9"`.
pub fn percentile_label(p: f64) -> String {
    let scaled = (p * 100.0 * 1e6).round() / 1e6;
    format!("p{}", scaled)
}

/// Reject fractions outside `(0, 1]`.
pub fn validate_percentiles(percentiles: &[f64]) -> Result<()> {
    for &p in percentiles {
        if !(p > 0.0 && p <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "percentiles must be in (0, 1], got {}",
                p
            )));
        }
    }
    Ok(())
}

/// Compute each requested percentile over both series.
///
/// No outliers are dropped.
pub fn compare(real: &[f64], sim: &[f64], percentiles: &[f64]) -> Result<Vec<PercentileRow>> {
    validate_percentiles(percentiles)?;

    let sort = |values: &[f64]| {
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        sorted
    };
    let real_sorted = sort(real);
    let sim_sorted = sort(sim);
    let at = |sorted: &[f64], p: f64| (!sorted.is_empty()).then(|| percentile_sorted(sorted, p));

    Ok(percentiles
        .iter()
        .map(|&p| PercentileRow {
            metric: percentile_label(p),
            real_ns: at(&real_sorted, p),
            sim_ns: at(&sim_sorted, p),
        })
        .collect())
}
