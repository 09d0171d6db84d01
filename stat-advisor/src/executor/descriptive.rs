//! Descriptive statistics over resolved record values.

use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{AdvisorError, Result};
use crate::model::record::{as_category, as_number};
use crate::model::{AnalysisResults, CategoricalStats, ContinuousStats, DescriptiveResults};
use crate::stats::describe;

/// Numeric values of a column; the second element counts records without one.
pub fn numeric_column(values: &[Option<&Value>]) -> (Vec<f64>, usize) {
    let numbers: Vec<f64> = values.iter().filter_map(|v| v.and_then(as_number)).collect();
    let missing = values.len() - numbers.len();
    (numbers, missing)
}

/// Category labels of a column; the second element counts records without one.
pub fn label_column(values: &[Option<&Value>]) -> (Vec<String>, usize) {
    let labels: Vec<String> = values.iter().filter_map(|v| v.and_then(as_category)).collect();
    let missing = values.len() - labels.len();
    (labels, missing)
}

/// Summary statistics of a numeric sample.
///
/// # Errors
///
/// Fails when no value is numeric.
pub fn continuous_stats(numbers: &[f64], missing: usize) -> Result<ContinuousStats> {
    let m = describe(numbers)
        .ok_or_else(|| AdvisorError::execution("descriptive", "no numeric values"))?;
    Ok(ContinuousStats {
        n: m.n,
        mean: m.mean,
        sd: m.sd,
        median: m.median,
        iqr: (m.q1, m.q3),
        min: m.min,
        max: m.max,
        missing,
    })
}

/// Frequencies and percentages of a label sample.
///
/// # Errors
///
/// Fails when there is no label at all.
pub fn categorical_stats(labels: &[String], missing: usize) -> Result<CategoricalStats> {
    if labels.is_empty() {
        return Err(AdvisorError::execution("descriptive", "no categorical values"));
    }
    let mut frequencies: BTreeMap<String, usize> = BTreeMap::new();
    for label in labels {
        *frequencies.entry(label.clone()).or_insert(0) += 1;
    }
    let total = labels.len() as f64;
    let percentages = frequencies
        .iter()
        .map(|(k, &c)| (k.clone(), c as f64 / total * 100.0))
        .collect();
    Ok(CategoricalStats {
        n: labels.len(),
        frequencies,
        percentages,
        missing,
    })
}

/// Descriptive results for a column, numeric or categorical.
pub fn summarize(values: &[Option<&Value>], numeric: bool) -> Result<AnalysisResults> {
    let results = if numeric {
        let (numbers, missing) = numeric_column(values);
        DescriptiveResults {
            continuous: Some(continuous_stats(&numbers, missing)?),
            categorical: None,
        }
    } else {
        let (labels, missing) = label_column(values);
        DescriptiveResults {
            continuous: None,
            categorical: Some(categorical_stats(&labels, missing)?),
        }
    };
    Ok(AnalysisResults::Descriptive(results))
}
