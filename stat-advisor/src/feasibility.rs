//! Feasibility verdicts for proposed analyses.
//!
//! Each check contributes zero or more [`FeasibilityIssue`]s independently;
//! the verdict flags are derived from the issue list. The checker is a pure
//! function of the analysis and the context.

use crate::classifier::classify;
use crate::model::{
    AnalysisContext, AnalysisType, FeasibilityIssue, FeasibilityResult, IssueKind,
    MethodCategory, ProposedAnalysis, Severity, Variable, VariableKind,
};

/// Outcome missingness (percent) above which a warning is raised.
pub const MISSING_WARNING_PERCENT: f64 = 20.0;
/// Outcome missingness (percent) above which the analysis is blocked.
pub const MISSING_BLOCKING_PERCENT: f64 = 40.0;
/// Groups smaller than this block comparative analyses.
pub const MIN_GROUP_SIZE: usize = 5;
/// Largest tolerated ratio between the biggest and the smallest group.
pub const MAX_GROUP_RATIO: f64 = 4.0;

/// Checks whether `analysis` can be soundly run on the data in `context`.
///
/// # Examples
///
/// ```rust
/// use stat_advisor::context::ContextBuilder;
/// use stat_advisor::feasibility::check_feasibility;
/// use stat_advisor::model::{
///     AnalysisType, DataType, IssueKind, ProposedAnalysis, ProtocolVersion, Record, Role,
///     SchemaNode, Severity,
/// };
///
/// let schema = vec![SchemaNode::new("sbp", DataType::Continuous, Role::Outcome)];
/// let records: Vec<Record> = (0..8)
///     .map(|i| Record::complete().with_field("vitals", "sbp", 120 + i))
///     .collect();
/// let context = ContextBuilder::default()
///     .build(&ProtocolVersion::default(), &schema, &records, None, None)
///     .unwrap()
///     .context;
///
/// let outcome = context.variable("sbp").unwrap().clone();
/// let analysis = ProposedAnalysis::new("a1", AnalysisType::TTest, outcome);
/// let result = check_feasibility(&analysis, &context);
/// assert!(!result.feasible);
/// assert_eq!(result.issues[0].kind, IssueKind::SampleSize);
/// assert_eq!(result.issues[0].severity, Severity::Blocking);
/// ```
pub fn check_feasibility(analysis: &ProposedAnalysis, context: &AnalysisContext) -> FeasibilityResult {
    let minimum = analysis.analysis_type.minimum_sample_size();
    let outcome = context
        .variable(&analysis.outcome.id)
        .unwrap_or(&analysis.outcome);

    let mut issues = Vec::new();
    check_sample_size(analysis, context, minimum, &mut issues);
    check_resolved_values(outcome, context, &mut issues);
    check_missing_data(outcome, context, &mut issues);
    check_normality(analysis, outcome, context, &mut issues);
    check_group_balance(analysis, context, &mut issues);
    check_outcome_type(analysis, outcome, &mut issues);

    FeasibilityResult::from_issues(issues, minimum)
}

fn issue(kind: IssueKind, severity: Severity, message: String, resolution: &str) -> FeasibilityIssue {
    FeasibilityIssue {
        kind,
        severity,
        message,
        resolution: Some(resolution.to_string()),
    }
}

fn check_sample_size(
    analysis: &ProposedAnalysis,
    context: &AnalysisContext,
    minimum: usize,
    issues: &mut Vec<FeasibilityIssue>,
) {
    let n = context.data.completed_records;
    if n >= minimum {
        return;
    }
    let severity = if (n as f64) < minimum as f64 / 2.0 {
        Severity::Blocking
    } else {
        Severity::Warning
    };
    issues.push(issue(
        IssueKind::SampleSize,
        severity,
        format!(
            "Sample size (n={n}) may be insufficient for {}. Recommended minimum: {minimum}.",
            analysis.method.name
        ),
        "Consider collecting more data or using a non-parametric alternative.",
    ));
}

/// Completed records exist but none of them holds the outcome.
fn check_resolved_values(
    outcome: &Variable,
    context: &AnalysisContext,
    issues: &mut Vec<FeasibilityIssue>,
) {
    let already_blocked = issues
        .iter()
        .any(|i| i.kind == IssueKind::SampleSize && i.is_blocking());
    let unresolved = context
        .distribution(&outcome.id)
        .is_some_and(|d| d.n == 0);
    if already_blocked || !unresolved || context.data.completed_records == 0 {
        return;
    }
    issues.push(issue(
        IssueKind::SampleSize,
        Severity::Blocking,
        format!("No values for {} were found in completed records.", outcome.label),
        "Check that the variable is mapped to a field in the data tables.",
    ));
}

fn check_missing_data(
    outcome: &Variable,
    context: &AnalysisContext,
    issues: &mut Vec<FeasibilityIssue>,
) {
    let Some(distribution) = context.distribution(&outcome.id) else {
        return;
    };
    if distribution.missing == 0 {
        return;
    }
    let percent = distribution.missing_rate() * 100.0;
    if percent <= MISSING_WARNING_PERCENT {
        return;
    }
    let severity = if percent > MISSING_BLOCKING_PERCENT {
        Severity::Blocking
    } else {
        Severity::Warning
    };
    issues.push(issue(
        IssueKind::MissingData,
        severity,
        format!("{percent:.1}% of outcome data is missing."),
        "Consider multiple imputation or sensitivity analysis.",
    ));
}

fn check_normality(
    analysis: &ProposedAnalysis,
    outcome: &Variable,
    context: &AnalysisContext,
    issues: &mut Vec<FeasibilityIssue>,
) {
    if analysis.method.category != MethodCategory::Parametric {
        return;
    }
    let is_normal = context
        .distribution(&outcome.id)
        .and_then(|d| d.continuous.as_ref())
        .map(|c| c.is_normal)
        .or_else(|| outcome.is_normal());
    if is_normal == Some(false) {
        issues.push(issue(
            IssueKind::AssumptionViolation,
            Severity::Warning,
            "Outcome distribution may not be normal.".to_string(),
            "Consider non-parametric alternative or check with formal normality test.",
        ));
    }
}

fn check_group_balance(
    analysis: &ProposedAnalysis,
    context: &AnalysisContext,
    issues: &mut Vec<FeasibilityIssue>,
) {
    if analysis.predictor.is_none() {
        return;
    }
    let Some(groups) = context.data.group_sizes.as_ref() else {
        return;
    };
    let (Some(&smallest), Some(&largest)) = (groups.values().min(), groups.values().max()) else {
        return;
    };

    if smallest < MIN_GROUP_SIZE {
        issues.push(issue(
            IssueKind::InsufficientGroups,
            Severity::Blocking,
            format!("Smallest group has only {smallest} observations."),
            "Consider pooling groups or collecting more data.",
        ));
    }
    if smallest > 0 && largest as f64 / smallest as f64 > MAX_GROUP_RATIO {
        issues.push(issue(
            IssueKind::AssumptionViolation,
            Severity::Warning,
            "Highly unbalanced group sizes may affect test validity.".to_string(),
            "Consider Welch's t-test or non-parametric alternatives.",
        ));
    }
}

/// Outcome kinds an analysis family can consume; `None` accepts any kind.
fn expected_outcome(analysis_type: AnalysisType) -> Option<(&'static [VariableKind], &'static str)> {
    use VariableKind::*;

    match analysis_type {
        AnalysisType::TTest
        | AnalysisType::PairedTTest
        | AnalysisType::Anova
        | AnalysisType::RepeatedAnova
        | AnalysisType::MannWhitney
        | AnalysisType::Wilcoxon
        | AnalysisType::KruskalWallis
        | AnalysisType::PearsonCorrelation
        | AnalysisType::SpearmanCorrelation
        | AnalysisType::LinearRegression
        | AnalysisType::NormalityTest => Some((&[Continuous], "continuous")),
        AnalysisType::ChiSquare
        | AnalysisType::FisherExact
        | AnalysisType::Mcnemar
        | AnalysisType::LogisticRegression => Some((&[Categorical, Binary], "categorical")),
        AnalysisType::CoxRegression | AnalysisType::KaplanMeier | AnalysisType::LogRank => {
            Some((&[TimeToEvent, Continuous], "time-to-event"))
        }
        AnalysisType::Descriptive | AnalysisType::DiagnosticAccuracy => None,
    }
}

fn check_outcome_type(
    analysis: &ProposedAnalysis,
    outcome: &Variable,
    issues: &mut Vec<FeasibilityIssue>,
) {
    let Some((accepted, expected)) = expected_outcome(analysis.analysis_type) else {
        return;
    };
    let kind = classify(outcome);
    if accepted.contains(&kind) {
        return;
    }
    issues.push(issue(
        IssueKind::DataTypeMismatch,
        Severity::Warning,
        format!(
            "{} expects a {expected} outcome but {} is {kind}.",
            analysis.method.name, outcome.label
        ),
        "Review the analysis type or the variable's data type.",
    ));
}
