//! Moment and order statistics over plain `f64` slices.

use std::cmp::Ordering;

/// Descriptive summary of a numeric sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Moments {
    pub n: usize,
    pub mean: f64,
    /// Sample standard deviation (n−1 denominator)
    pub sd: f64,
    pub median: f64,
    pub q1: f64,
    pub q3: f64,
    pub min: f64,
    pub max: f64,
    pub skewness: f64,
}

impl Moments {
    /// Screening verdict used throughout the engine: `|skewness| < 1`.
    pub fn is_normal(&self) -> bool {
        self.skewness.abs() < 1.0
    }
}

/// Summarises a sample; `None` when it is empty.
pub fn describe(values: &[f64]) -> Option<Moments> {
    if values.is_empty() {
        return None;
    }
    let sorted = sorted_copy(values);
    let mean = mean(values)?;
    let sd = sample_sd(values)?;
    let (q1, q3) = quartiles(&sorted);
    Some(Moments {
        n: values.len(),
        mean,
        sd,
        median: median(&sorted),
        q1,
        q3,
        min: sorted[0],
        max: sorted[sorted.len() - 1],
        skewness: skewness(values, mean, sd),
    })
}

pub fn sorted_copy(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    sorted
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Sample variance; a single observation has variance 0.
pub fn sample_variance(values: &[f64]) -> Option<f64> {
    let mean = mean(values)?;
    let denominator = (values.len().max(2) - 1) as f64;
    Some(values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / denominator)
}

pub fn sample_sd(values: &[f64]) -> Option<f64> {
    sample_variance(values).map(f64::sqrt)
}

/// Median of an already sorted, non-empty slice; even lengths average the middle pair.
pub fn median(sorted: &[f64]) -> f64 {
    let n = sorted.len();
    if n == 0 {
        return f64::NAN;
    }
    if n % 2 == 0 {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    } else {
        sorted[n / 2]
    }
}

/// First and third quartiles by order-statistic indexing: `sorted[⌊n·0.25⌋]`
/// and `sorted[⌊n·0.75⌋]`, without interpolation.
pub fn quartiles(sorted: &[f64]) -> (f64, f64) {
    let n = sorted.len();
    if n == 0 {
        return (f64::NAN, f64::NAN);
    }
    let at = |fraction: f64| sorted[((n as f64 * fraction).floor() as usize).min(n - 1)];
    (at(0.25), at(0.75))
}

/// Adjusted Fisher-Pearson skewness; 0 for fewer than three values or no spread.
pub fn skewness(values: &[f64], mean: f64, sd: f64) -> f64 {
    let n = values.len();
    if n < 3 || sd == 0.0 {
        return 0.0;
    }
    let n = n as f64;
    let sum: f64 = values.iter().map(|v| ((v - mean) / sd).powi(3)).sum();
    n / ((n - 1.0) * (n - 2.0)) * sum
}

/// Sample excess kurtosis; 0 for fewer than four values or no spread.
pub fn excess_kurtosis(values: &[f64], mean: f64, sd: f64) -> f64 {
    let n = values.len();
    if n < 4 || sd == 0.0 {
        return 0.0;
    }
    let n = n as f64;
    let sum: f64 = values.iter().map(|v| ((v - mean) / sd).powi(4)).sum();
    n * (n + 1.0) / ((n - 1.0) * (n - 2.0) * (n - 3.0)) * sum
        - 3.0 * (n - 1.0).powi(2) / ((n - 2.0) * (n - 3.0))
}

/// Ranks with ties sharing their average rank (1-based).
pub fn average_ranks(values: &[f64]) -> Vec<f64> {
    let mut indexed: Vec<(usize, f64)> = values.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));

    let mut ranks = vec![0.0; values.len()];
    let mut i = 0;
    while i < indexed.len() {
        let mut j = i;
        while j < indexed.len() && indexed[j].1 == indexed[i].1 {
            j += 1;
        }
        let shared = (i + j + 1) as f64 / 2.0;
        for &(original, _) in &indexed[i..j] {
            ranks[original] = shared;
        }
        i = j;
    }
    ranks
}
