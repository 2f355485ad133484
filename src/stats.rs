//! Descriptive statistics
//!
//! Pure computations over a fully materialized value sequence.
//! Non-finite inputs are rejected rather than propagated.

use crate::error::{Result, TsmError};

/// Summary statistics of a value sequence
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Sample standard deviation (divisor N-1), 0.0 for a single value
    pub std: f64,
    pub median: f64,
}

/// Compute count, min, max, mean, sample standard deviation and median
pub fn summarize(values: &[f64]) -> Result<Summary> {
    if values.is_empty() {
        return Err(TsmError::InvalidArgument(
            "cannot summarize an empty sequence".to_string(),
        ));
    }
    if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
        return Err(TsmError::InvalidArgument(format!(
            "non-finite value {} at position {}",
            values[pos], pos
        )));
    }

    let count = values.len();
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0;
    for &v in values {
        min = min.min(v);
        max = max.max(v);
        sum += v;
    }
    let mean = sum / count as f64;

    let std = if count > 1 {
        let squares: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
        (squares / (count - 1) as f64).sqrt()
    } else {
        0.0
    };

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    Ok(Summary {
        count,
        min,
        max,
        mean,
        std,
        median: median_of_sorted(&sorted),
    })
}

/// Median of an ascending, non-empty slice
fn median_of_sorted(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    }
}
