//! Statistical analysis helpers
//!
//! Pure functions over value slices; every stateful component reuses these
//! for trend, anomaly and percentile computation.

use serde::{Deserialize, Serialize};

/// Direction of a value series over time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrendDirection {
    InsufficientData,
    Stable,
    Increasing,
    Decreasing,
}

/// Linear trend over a value series
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TrendAnalysis {
    pub direction: TrendDirection,
    /// Least-squares slope per sample step
    pub slope: f64,
    /// Pearson correlation between value and sample index
    pub correlation: f64,
}

impl TrendAnalysis {
    fn insufficient() -> Self {
        Self {
            direction: TrendDirection::InsufficientData,
            slope: 0.0,
            correlation: 0.0,
        }
    }
}

/// Standard percentile set over a value series
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Percentiles {
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Least-squares trend of values against their indices.
///
/// Slopes within 0.01 of zero count as stable. Fewer than two values
/// cannot carry a trend.
pub fn analyze_trend(values: &[f64]) -> TrendAnalysis {
    if values.len() < 2 {
        return TrendAnalysis::insufficient();
    }

    let n = values.len() as f64;
    let mean_x = (values.len() - 1) as f64 / 2.0;
    let mean_y: f64 = values.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (i, value) in values.iter().enumerate() {
        let dx = i as f64 - mean_x;
        let dy = value - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let slope = if var_x > 0.0 { cov / var_x } else { 0.0 };
    let correlation = if var_x > 0.0 && var_y > 0.0 {
        cov / (var_x.sqrt() * var_y.sqrt())
    } else {
        0.0
    };

    let direction = if slope.abs() < 0.01 {
        TrendDirection::Stable
    } else if slope > 0.0 {
        TrendDirection::Increasing
    } else {
        TrendDirection::Decreasing
    };

    TrendAnalysis {
        direction,
        slope,
        correlation,
    }
}

/// Indices of values whose z-score magnitude exceeds `threshold`.
///
/// Needs at least three values and non-zero deviation to say anything.
pub fn detect_anomalies(values: &[f64], threshold: f64) -> Vec<usize> {
    if values.len() < 3 {
        return Vec::new();
    }

    let n = values.len() as f64;
    let mean: f64 = values.iter().sum::<f64>() / n;
    let variance: f64 = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let std_dev = variance.sqrt();
    if std_dev == 0.0 {
        return Vec::new();
    }

    values
        .iter()
        .enumerate()
        .filter(|(_, v)| ((*v - mean) / std_dev).abs() > threshold)
        .map(|(i, _)| i)
        .collect()
}

/// Nearest-rank percentiles of a value series; `None` when empty
pub fn calculate_percentiles(values: &[f64]) -> Option<Percentiles> {
    if values.is_empty() {
        return None;
    }

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let rank = |p: f64| -> f64 {
        let index = ((sorted.len() as f64 * p) as usize).min(sorted.len() - 1);
        sorted[index]
    };

    Some(Percentiles {
        p50: rank(0.50),
        p75: rank(0.75),
        p90: rank(0.90),
        p95: rank(0.95),
        p99: rank(0.99),
    })
}
