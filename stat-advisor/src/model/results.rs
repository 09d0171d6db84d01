//! Numeric results produced by the executor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outcome of running one analysis.
///
/// A failed execution carries `success == false`, an error message, and no
/// results; it is data, never a panic or an error return.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisExecutionResult {
    pub success: bool,
    pub executed_at: DateTime<Utc>,
    pub execution_time_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<AnalysisResults>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnalysisExecutionResult {
    pub fn succeeded(results: AnalysisResults, executed_at: DateTime<Utc>, elapsed_ms: u64) -> Self {
        Self {
            success: true,
            executed_at,
            execution_time_ms: elapsed_ms,
            results: Some(results),
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>, executed_at: DateTime<Utc>, elapsed_ms: u64) -> Self {
        Self {
            success: false,
            executed_at,
            execution_time_ms: elapsed_ms,
            results: None,
            error: Some(error.into()),
        }
    }
}

/// Results, tagged by the computation that produced them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AnalysisResults {
    Descriptive(DescriptiveResults),
    TTest(TTestResults),
    ChiSquare(ContingencyResults),
    FisherExact(ContingencyResults),
    Correlation(CorrelationResults),
    Normality(NormalityResults),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptiveResults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuous: Option<ContinuousStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categorical: Option<CategoricalStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinuousStats {
    pub n: usize,
    pub mean: f64,
    pub sd: f64,
    pub median: f64,
    pub iqr: (f64, f64),
    pub min: f64,
    pub max: f64,
    pub missing: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoricalStats {
    pub n: usize,
    pub frequencies: BTreeMap<String, usize>,
    /// Percentages in `[0, 100]`
    pub percentages: BTreeMap<String, f64>,
    pub missing: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupStats {
    pub label: String,
    pub n: usize,
    pub mean: f64,
    pub sd: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TTestResults {
    pub t_statistic: f64,
    pub p_value: f64,
    pub degrees_of_freedom: f64,
    pub mean_difference: f64,
    pub confidence_interval: (f64, f64),
    /// Cohen's d using the pooled standard deviation
    pub effect_size: f64,
    pub group1: GroupStats,
    pub group2: GroupStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContingencyResults {
    /// Row labels are predictor categories, column labels outcome categories
    pub row_labels: Vec<String>,
    pub column_labels: Vec<String>,
    pub contingency_table: Vec<Vec<u64>>,
    pub p_value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chi_square: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degrees_of_freedom: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_frequencies: Option<Vec<Vec<f64>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub odds_ratio: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub odds_ratio_ci: Option<(f64, f64)>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrelationMethod {
    Pearson,
    Spearman,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrelationResults {
    pub method: CorrelationMethod,
    pub coefficient: f64,
    pub p_value: f64,
    pub confidence_interval: (f64, f64),
    pub n: usize,
    pub r2: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalityResults {
    pub descriptive: ContinuousStats,
    pub skewness: f64,
    /// Excess kurtosis
    pub kurtosis: f64,
    pub jarque_bera: f64,
    pub p_value: f64,
    /// `|skewness| < 1`
    pub is_normal: bool,
}

impl AnalysisResults {
    /// Short name of the result family.
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisResults::Descriptive(_) => "descriptive",
            AnalysisResults::TTest(_) => "t-test",
            AnalysisResults::ChiSquare(_) => "chi-square",
            AnalysisResults::FisherExact(_) => "fisher-exact",
            AnalysisResults::Correlation(_) => "correlation",
            AnalysisResults::Normality(_) => "normality",
        }
    }
}
