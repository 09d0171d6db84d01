//! Runs proposed analyses against study records.
//!
//! The executor never fails loudly: every problem, from an unresolvable field
//! to a degenerate sample, comes back as an [`AnalysisExecutionResult`] with
//! `success == false` and a message. Only complete records participate, and
//! outcome and predictor values are aligned record by record through the same
//! field resolution the context builder uses.
//!
//! ```rust,ignore
//! use stat_advisor::executor::Executor;
//!
//! let executor = Executor::new(config);
//! let result = executor.execute(&suggestion.proposed_analysis, &records);
//! if let Some(results) = result.results {
//!     println!("{}", results.kind());
//! }
//! ```

pub mod descriptive;
pub mod inferential;

use chrono::Utc;
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, instrument, warn};

use crate::classifier::classify;
use crate::config::AdvisorConfig;
use crate::context::{FieldKeys, FieldResolver};
use crate::error::{AdvisorError, Result};
use crate::log_timing;
use crate::logging::LogConfig;
use crate::model::record::{as_category, as_number};
use crate::model::{
    AnalysisExecutionResult, AnalysisResults, AnalysisType, CorrelationMethod, ProposedAnalysis,
    Record, Suggestion, Variable,
};

/// Executes analyses with a fixed configuration.
#[derive(Debug, Clone, Default)]
pub struct Executor {
    config: AdvisorConfig,
    log_config: LogConfig,
}

impl Executor {
    pub fn new(config: AdvisorConfig) -> Self {
        Self {
            config,
            log_config: LogConfig::default(),
        }
    }

    pub fn with_log_config(mut self, log_config: LogConfig) -> Self {
        self.log_config = log_config;
        self
    }

    /// Runs a suggestion's proposed analysis.
    pub fn execute_suggestion(&self, suggestion: &Suggestion, records: &[Record]) -> AnalysisExecutionResult {
        self.execute(&suggestion.proposed_analysis, records)
    }

    /// Runs one analysis over the complete records.
    #[instrument(skip_all, fields(analysis.id = %analysis.analysis_id, analysis.kind = %analysis.analysis_type))]
    pub fn execute(&self, analysis: &ProposedAnalysis, records: &[Record]) -> AnalysisExecutionResult {
        let executed_at = Utc::now();
        let started = Instant::now();
        let outcome = self.run(analysis, records);
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(results) => {
                log_timing!(
                    self.log_config,
                    analysis.id = %analysis.analysis_id,
                    results = results.kind(),
                    elapsed_ms,
                    "Analysis executed"
                );
                AnalysisExecutionResult::succeeded(results, executed_at, elapsed_ms)
            }
            Err(e) => {
                warn!(analysis.id = %analysis.analysis_id, error = %e, "Analysis execution failed");
                AnalysisExecutionResult::failed(e.to_string(), executed_at, elapsed_ms)
            }
        }
    }

    fn run(&self, analysis: &ProposedAnalysis, records: &[Record]) -> Result<AnalysisResults> {
        let complete: Vec<&Record> = records.iter().filter(|r| r.is_complete()).collect();
        if complete.is_empty() {
            return Err(AdvisorError::execution(
                analysis.analysis_type.as_str(),
                "no complete records",
            ));
        }

        let outcome = self.column(&analysis.outcome, &complete);
        let confidence_level = self.confidence_level(analysis);

        match analysis.analysis_type {
            AnalysisType::Descriptive => self.describe(&analysis.outcome, &outcome),
            AnalysisType::NormalityTest => {
                let (numbers, missing) = descriptive::numeric_column(&outcome);
                inferential::normality(&numbers, missing).map(AnalysisResults::Normality)
            }
            AnalysisType::TTest => {
                let predictor = self.predictor_column(analysis, &complete)?;
                let observations: Vec<(String, f64)> = predictor
                    .iter()
                    .zip(&outcome)
                    .filter_map(|(p, o)| Some((p.and_then(as_category)?, o.and_then(as_number)?)))
                    .collect();
                inferential::welch_t_test(&observations, confidence_level).map(AnalysisResults::TTest)
            }
            AnalysisType::ChiSquare | AnalysisType::FisherExact => {
                let predictor = self.predictor_column(analysis, &complete)?;
                let observations: Vec<(String, String)> = predictor
                    .iter()
                    .zip(&outcome)
                    .filter_map(|(p, o)| Some((p.and_then(as_category)?, o.and_then(as_category)?)))
                    .collect();
                let (results, exact) = inferential::contingency(&observations, confidence_level)?;
                Ok(if exact {
                    AnalysisResults::FisherExact(results)
                } else {
                    AnalysisResults::ChiSquare(results)
                })
            }
            AnalysisType::PearsonCorrelation | AnalysisType::SpearmanCorrelation => {
                let method = if analysis.analysis_type == AnalysisType::PearsonCorrelation {
                    CorrelationMethod::Pearson
                } else {
                    CorrelationMethod::Spearman
                };
                let predictor = self.predictor_column(analysis, &complete)?;
                let pairs: Vec<(f64, f64)> = predictor
                    .iter()
                    .zip(&outcome)
                    .filter_map(|(p, o)| Some((p.and_then(as_number)?, o.and_then(as_number)?)))
                    .collect();
                inferential::correlation(&pairs, method, confidence_level)
                    .map(AnalysisResults::Correlation)
            }
            other => {
                debug!(
                    analysis.kind = other.as_str(),
                    "No computation for this analysis kind, summarising the outcome instead"
                );
                self.describe(&analysis.outcome, &outcome)
            }
        }
    }

    fn describe(&self, variable: &Variable, values: &[Option<&Value>]) -> Result<AnalysisResults> {
        let numeric = !classify(variable).is_categorical_like();
        descriptive::summarize(values, numeric)
    }

    fn column<'r>(&self, variable: &Variable, records: &[&'r Record]) -> Vec<Option<&'r Value>> {
        let keys = FieldKeys::for_variable(variable, &self.config.resolution);
        FieldResolver::new(&self.config.resolution).resolve_all(&keys, records)
    }

    fn predictor_column<'r>(
        &self,
        analysis: &ProposedAnalysis,
        records: &[&'r Record],
    ) -> Result<Vec<Option<&'r Value>>> {
        let predictor = analysis.predictor.as_ref().ok_or_else(|| {
            AdvisorError::execution(analysis.analysis_type.as_str(), "a predictor variable is required")
        })?;
        Ok(self.column(predictor, records))
    }

    fn confidence_level(&self, analysis: &ProposedAnalysis) -> f64 {
        analysis
            .parameters
            .confidence_level
            .filter(|level| *level > 0.0 && *level < 1.0)
            .unwrap_or(self.config.default_confidence_level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::{trial_context, trial_records};

    fn analysis(kind: AnalysisType, outcome: &str, predictor: Option<&str>) -> ProposedAnalysis {
        let context = trial_context(12).unwrap();
        let mut analysis = ProposedAnalysis::new(
            format!("analysis-{kind}-{outcome}"),
            kind,
            context.variable(outcome).unwrap().clone(),
        );
        if let Some(p) = predictor {
            analysis = analysis.with_predictor(context.variable(p).unwrap().clone());
        }
        analysis
    }

    #[test]
    fn test_descriptive_uses_complete_records_only() {
        let result = Executor::default().execute(&analysis(AnalysisType::Descriptive, "sbp", None), &trial_records(12));
        assert!(result.success);
        match result.results.unwrap() {
            AnalysisResults::Descriptive(d) => {
                let stats = d.continuous.unwrap();
                assert_eq!(stats.n, 12);
                assert_eq!(stats.max, 148.0);
                assert_eq!(stats.missing, 0);
            }
            other => panic!("unexpected results: {other:?}"),
        }
    }

    #[test]
    fn test_descriptive_of_binary_outcome_is_categorical() {
        let result = Executor::default().execute(&analysis(AnalysisType::Descriptive, "response", None), &trial_records(12));
        match result.results.unwrap() {
            AnalysisResults::Descriptive(d) => {
                let stats = d.categorical.unwrap();
                assert_eq!(stats.frequencies["true"], 6);
                assert_eq!(stats.frequencies["false"], 6);
            }
            other => panic!("unexpected results: {other:?}"),
        }
    }

    #[test]
    fn test_t_test_by_arm() {
        let result = Executor::default().execute(&analysis(AnalysisType::TTest, "sbp", Some("arm")), &trial_records(12));
        assert!(result.success, "{:?}", result.error);
        match result.results.unwrap() {
            AnalysisResults::TTest(t) => {
                assert_eq!(t.group1.label, "Drug");
                assert_eq!(t.group1.n, 6);
                assert_eq!(t.mean_difference, -15.0);
                assert!(t.p_value < 0.001);
            }
            other => panic!("unexpected results: {other:?}"),
        }
    }

    #[test]
    fn test_two_by_two_table_uses_exact_test() {
        let result = Executor::default().execute(
            &analysis(AnalysisType::ChiSquare, "response", Some("arm")),
            &trial_records(12),
        );
        match result.results.unwrap() {
            AnalysisResults::FisherExact(c) => {
                assert_eq!(c.row_labels, vec!["Drug", "Placebo"]);
                assert_eq!(c.contingency_table, vec![vec![4, 2], vec![2, 4]]);
                assert!((c.p_value - 524.0 / 924.0).abs() < 1e-9);
                assert_eq!(c.odds_ratio, Some(4.0));
            }
            other => panic!("unexpected results: {other:?}"),
        }
    }

    #[test]
    fn test_correlation_between_continuous_variables() {
        let result = Executor::default().execute(
            &analysis(AnalysisType::SpearmanCorrelation, "sbp", Some("age")),
            &trial_records(12),
        );
        match result.results.unwrap() {
            AnalysisResults::Correlation(c) => {
                assert_eq!(c.method, CorrelationMethod::Spearman);
                assert_eq!(c.n, 12);
                assert!(c.coefficient.abs() <= 1.0);
            }
            other => panic!("unexpected results: {other:?}"),
        }
    }

    #[test]
    fn test_failures_are_reported_not_raised() {
        let executor = Executor::default();

        let missing_predictor = executor.execute(&analysis(AnalysisType::TTest, "sbp", None), &trial_records(12));
        assert!(!missing_predictor.success);
        assert!(missing_predictor.results.is_none());
        assert!(missing_predictor.error.unwrap().contains("predictor"));

        let no_records = executor.execute(&analysis(AnalysisType::Descriptive, "sbp", None), &trial_records(0));
        assert!(!no_records.success);
        assert!(no_records.error.unwrap().contains("no complete records"));
    }

    #[test]
    fn test_kinds_without_computation_fall_back_to_descriptive() {
        let result = Executor::default().execute(&analysis(AnalysisType::Anova, "sbp", Some("arm")), &trial_records(12));
        assert!(result.success);
        assert_eq!(result.results.unwrap().kind(), "descriptive");
    }

    #[test]
    fn test_normality_check() {
        let result = Executor::default().execute(&analysis(AnalysisType::NormalityTest, "weight", None), &trial_records(12));
        match result.results.unwrap() {
            AnalysisResults::Normality(n) => {
                assert_eq!(n.descriptive.n, 12);
                assert!(n.p_value >= 0.0 && n.p_value <= 1.0);
            }
            other => panic!("unexpected results: {other:?}"),
        }
    }
}
