//! Test selection for a predictor/outcome pair.
//!
//! [`select_test`] is a pure decision table. The outcome kind picks the
//! branch, then the predictor kind and the outcome's normality pick the test:
//!
//! | Outcome        | Predictor            | Test                                  |
//! |----------------|----------------------|---------------------------------------|
//! | time-to-event  | categorical          | log-rank                              |
//! | time-to-event  | binary / continuous  | Cox regression                        |
//! | continuous     | binary               | t-test, or Mann-Whitney if non-normal |
//! | continuous     | categorical          | ANOVA, or Kruskal-Wallis if non-normal|
//! | continuous     | continuous           | Pearson, or Spearman if non-normal    |
//! | continuous     | none                 | descriptive                           |
//! | categorical    | categorical / binary | Fisher exact if cells are sparse, else chi-square |
//! | categorical    | continuous           | logistic regression                   |
//!
//! Anything else, including any outcome without a predictor, falls back to descriptive statistics.

use serde::{Deserialize, Serialize};

use crate::classifier::classify;
use crate::model::{AnalysisType, StatisticalMethod, StudyDesign, Variable, VariableKind};

/// Minimum expected count per contingency cell before Fisher's exact test is preferred.
const MIN_EXPECTED_PER_CELL: usize = 5;

/// Outcome of test selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSelection {
    pub analysis_type: AnalysisType,
    pub method: StatisticalMethod,
    /// User-facing explanation naming the deciding factors
    pub rationale: String,
}

/// Selects the analysis for an outcome and an optional predictor.
///
/// A missing normality verdict counts as normal.
///
/// # Examples
///
/// ```rust
/// use stat_advisor::model::{AnalysisType, DataType, Role, StudyDesign, Variable};
/// use stat_advisor::selection::select_test;
///
/// let arm = Variable::new("arm", DataType::Boolean, Role::Predictor);
/// let sbp = Variable::new("sbp", DataType::Continuous, Role::Outcome);
///
/// let selection = select_test(Some(&arm), &sbp, StudyDesign::Rct);
/// assert_eq!(selection.analysis_type, AnalysisType::TTest);
/// assert!(selection.rationale.contains("randomized controlled trial"));
/// ```
pub fn select_test(
    predictor: Option<&Variable>,
    outcome: &Variable,
    design: StudyDesign,
) -> TestSelection {
    let outcome_kind = classify(outcome);
    let predictor_kind = predictor.map(classify);
    let normal = outcome.is_normal().unwrap_or(true);

    let (analysis_type, reason) = decide(outcome_kind, predictor_kind, normal, || {
        predictor.is_some_and(|p| has_small_expected_counts(p, outcome))
    });

    let rationale = format!(
        "{reason} Outcome: {outcome_kind}; predictor: {}; outcome distribution: {}; design: {}.",
        predictor_kind.map_or("none", |k| k.as_str()),
        normality_phrase(outcome),
        design.describe(),
    );

    TestSelection {
        analysis_type,
        method: analysis_type.default_method(),
        rationale,
    }
}

fn decide(
    outcome: VariableKind,
    predictor: Option<VariableKind>,
    normal: bool,
    sparse_cells: impl FnOnce() -> bool,
) -> (AnalysisType, &'static str) {
    use VariableKind::*;

    match (outcome, predictor) {
        (_, None) => (
            AnalysisType::Descriptive,
            "No predictor specified; summary statistics describe the outcome.",
        ),

        (TimeToEvent, Some(Categorical)) => (
            AnalysisType::LogRank,
            "Time-to-event outcome with a categorical predictor; the log-rank test compares survival curves between groups.",
        ),
        (TimeToEvent, Some(_)) => (
            AnalysisType::CoxRegression,
            "Time-to-event outcome with a non-categorical predictor; Cox regression estimates hazard ratios.",
        ),

        (Continuous, Some(Binary)) if normal => (
            AnalysisType::TTest,
            "Continuous outcome with a binary predictor and an approximately normal distribution; the t-test compares means between two groups.",
        ),
        (Continuous, Some(Binary)) => (
            AnalysisType::MannWhitney,
            "Continuous outcome with a binary predictor but a non-normal distribution; Mann-Whitney U is the non-parametric alternative.",
        ),
        (Continuous, Some(Categorical)) if normal => (
            AnalysisType::Anova,
            "Continuous outcome with a multi-level categorical predictor; ANOVA compares means across groups.",
        ),
        (Continuous, Some(Categorical)) => (
            AnalysisType::KruskalWallis,
            "Continuous outcome with a categorical predictor but a non-normal distribution; Kruskal-Wallis is the non-parametric alternative to ANOVA.",
        ),
        (Continuous, Some(Continuous)) if normal => (
            AnalysisType::PearsonCorrelation,
            "Both variables continuous with an approximately normal outcome; Pearson r measures the linear relationship.",
        ),
        (Continuous, Some(Continuous)) => (
            AnalysisType::SpearmanCorrelation,
            "Both variables continuous but the outcome is non-normal; Spearman rho is robust to non-normality.",
        ),
        (Categorical | Binary, Some(Categorical | Binary)) => {
            if sparse_cells() {
                (
                    AnalysisType::FisherExact,
                    "Categorical outcome with a categorical predictor and small expected cell counts; Fisher's exact test is appropriate for small samples.",
                )
            } else {
                (
                    AnalysisType::ChiSquare,
                    "Categorical outcome with a categorical predictor; the chi-square test assesses association.",
                )
            }
        }
        (Categorical | Binary, Some(Continuous)) => (
            AnalysisType::LogisticRegression,
            "Categorical outcome with a continuous predictor; logistic regression estimates odds ratios.",
        ),

        _ => (
            AnalysisType::Descriptive,
            "Unable to determine a specific test for this combination; defaulting to descriptive statistics.",
        ),
    }
}

/// Rough sparsity check: fewer observations than five per contingency cell.
///
/// Category counts fall back to declared options and then to 2.
fn has_small_expected_counts(predictor: &Variable, outcome: &Variable) -> bool {
    let n = predictor.distribution.as_ref().map_or(0, |d| d.n);
    let rows = predictor.category_count().unwrap_or(2);
    let cols = outcome.category_count().unwrap_or(2);
    n < MIN_EXPECTED_PER_CELL * rows * cols
}

fn normality_phrase(outcome: &Variable) -> &'static str {
    match (classify(outcome), outcome.is_normal()) {
        (VariableKind::Categorical | VariableKind::Binary, _) => "categorical",
        (_, Some(true)) => "approximately normal",
        (_, Some(false)) => "non-normal",
        (_, None) => "normality not assessed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        CategoricalSummary, ContinuousSummary, DataType, DistributionSummary, MethodHint, Role,
    };

    fn continuous(id: &str, is_normal: Option<bool>) -> Variable {
        let mut v = Variable::new(id, DataType::Continuous, Role::Outcome);
        if let Some(is_normal) = is_normal {
            v.distribution = Some(DistributionSummary {
                n: 40,
                continuous: Some(ContinuousSummary {
                    mean: 0.0,
                    sd: 1.0,
                    median: 0.0,
                    iqr: (-1.0, 1.0),
                    min: -2.0,
                    max: 2.0,
                    is_normal,
                    skewness: if is_normal { 0.1 } else { 2.0 },
                }),
                ..DistributionSummary::empty(VariableKind::Continuous)
            });
        }
        v
    }

    fn categorical(id: &str, categories: &[&str], n: usize) -> Variable {
        let mut v = Variable::new(id, DataType::Categorical, Role::Predictor);
        v.distribution = Some(DistributionSummary {
            n,
            categorical: Some(CategoricalSummary {
                categories: categories.iter().map(|c| c.to_string()).collect(),
                ..Default::default()
            }),
            ..DistributionSummary::empty(VariableKind::Categorical)
        });
        v
    }

    fn select(predictor: Option<&Variable>, outcome: &Variable) -> AnalysisType {
        select_test(predictor, outcome, StudyDesign::Rct).analysis_type
    }

    #[test]
    fn test_binary_predictor_continuous_outcome() {
        let arm = Variable::new("arm", DataType::Boolean, Role::Predictor);
        assert_eq!(select(Some(&arm), &continuous("y", Some(true))), AnalysisType::TTest);
        assert_eq!(
            select(Some(&arm), &continuous("y", Some(false))),
            AnalysisType::MannWhitney
        );
        // No verdict counts as normal
        assert_eq!(select(Some(&arm), &continuous("y", None)), AnalysisType::TTest);
    }

    #[test]
    fn test_multi_level_predictor() {
        let site = categorical("site", &["a", "b", "c"], 60);
        assert_eq!(select(Some(&site), &continuous("y", Some(true))), AnalysisType::Anova);
        assert_eq!(
            select(Some(&site), &continuous("y", Some(false))),
            AnalysisType::KruskalWallis
        );
    }

    #[test]
    fn test_correlations() {
        let dose = continuous("dose", Some(true));
        assert_eq!(
            select(Some(&dose), &continuous("y", Some(true))),
            AnalysisType::PearsonCorrelation
        );
        assert_eq!(
            select(Some(&dose), &continuous("y", Some(false))),
            AnalysisType::SpearmanCorrelation
        );
    }

    #[test]
    fn test_survival_outcomes() {
        let mut time = continuous("os", Some(true));
        time.analysis_method = Some(MethodHint::Survival);
        let arm = Variable::new("arm", DataType::Boolean, Role::Predictor);
        let age = continuous("age", Some(true));

        assert_eq!(
            select(Some(&categorical("site", &["a", "b", "c"], 10)), &time),
            AnalysisType::LogRank
        );
        // only a categorical predictor takes the log-rank branch
        assert_eq!(select(Some(&arm), &time), AnalysisType::CoxRegression);
        assert_eq!(select(Some(&age), &time), AnalysisType::CoxRegression);
        assert_eq!(select(None, &time), AnalysisType::Descriptive);
    }

    #[test]
    fn test_categorical_outcome_uses_cell_heuristic() {
        let outcome = categorical("response", &["yes", "no"], 0);
        // 2 x 2 table needs at least 20 observations
        let small = categorical("arm", &["a", "b"], 19);
        let large = categorical("arm", &["a", "b"], 20);
        assert_eq!(select(Some(&small), &outcome), AnalysisType::FisherExact);
        assert_eq!(select(Some(&large), &outcome), AnalysisType::ChiSquare);
    }

    #[test]
    fn test_categorical_outcome_continuous_predictor() {
        let outcome = Variable::new("event", DataType::Boolean, Role::Outcome);
        let age = continuous("age", Some(true));
        assert_eq!(select(Some(&age), &outcome), AnalysisType::LogisticRegression);
    }

    #[test]
    fn test_fallbacks() {
        assert_eq!(select(None, &continuous("y", None)), AnalysisType::Descriptive);
        let outcome = Variable::new("event", DataType::Boolean, Role::Outcome);
        let selection = select_test(None, &outcome, StudyDesign::Cohort);
        assert_eq!(selection.analysis_type, AnalysisType::Descriptive);
        assert!(selection.rationale.contains("No predictor specified"));

        let mut time = continuous("os", Some(true));
        time.analysis_method = Some(MethodHint::Survival);
        let selection = select_test(Some(&time), &outcome, StudyDesign::Cohort);
        assert_eq!(selection.analysis_type, AnalysisType::Descriptive);
        assert!(selection.rationale.contains("Unable to determine"));
    }

    #[test]
    fn test_rationale_names_deciding_factors() {
        let arm = Variable::new("arm", DataType::Boolean, Role::Predictor);
        let selection = select_test(Some(&arm), &continuous("y", Some(false)), StudyDesign::Cohort);
        assert!(selection.rationale.contains("Outcome: continuous"));
        assert!(selection.rationale.contains("predictor: binary"));
        assert!(selection.rationale.contains("non-normal"));
        assert!(selection.rationale.contains("cohort study"));
        assert_eq!(selection.method.name, "Mann-Whitney U Test");
    }
}
