//! Suggestions, feasibility verdicts and review decisions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::analysis::{AnalysisParameters, AnalysisType, ExpectedOutputs, ProposedAnalysis, StatisticalMethod};
use super::results::AnalysisExecutionResult;

/// What a suggestion is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SuggestionType {
    Descriptive,
    NormalityCheck,
    PrimaryAnalysis,
    SecondaryAnalysis,
    ExploratoryAnalysis,
    AssumptionCheck,
    SampleSizeReview,
    MissingDataStrategy,
    MultiplicityAdjustment,
    SensitivityAnalysis,
    SubgroupAnalysis,
    EffectSizeEstimation,
}

impl SuggestionType {
    /// The only suggestion types allowed to run without human review.
    pub fn is_auto_executable(&self) -> bool {
        matches!(self, SuggestionType::Descriptive | SuggestionType::NormalityCheck)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestionType::Descriptive => "descriptive",
            SuggestionType::NormalityCheck => "normality-check",
            SuggestionType::PrimaryAnalysis => "primary-analysis",
            SuggestionType::SecondaryAnalysis => "secondary-analysis",
            SuggestionType::ExploratoryAnalysis => "exploratory-analysis",
            SuggestionType::AssumptionCheck => "assumption-check",
            SuggestionType::SampleSizeReview => "sample-size-review",
            SuggestionType::MissingDataStrategy => "missing-data-strategy",
            SuggestionType::MultiplicityAdjustment => "multiplicity-adjustment",
            SuggestionType::SensitivityAnalysis => "sensitivity-analysis",
            SuggestionType::SubgroupAnalysis => "subgroup-analysis",
            SuggestionType::EffectSizeEstimation => "effect-size-estimation",
        }
    }
}

/// Priority tier. Ordering follows declaration: critical sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    Recommended,
    Optional,
}

/// Lifecycle state of a suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionStatus {
    Pending,
    Accepted,
    Modified,
    Rejected,
    Executed,
    Failed,
}

impl SuggestionStatus {
    /// Returns true for states a reviewer approved for execution.
    pub fn is_approved(&self) -> bool {
        matches!(self, SuggestionStatus::Accepted | SuggestionStatus::Modified)
    }
}

/// Where a suggestion came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SuggestionSource {
    RuleBased,
    Ai,
}

/// References that justify a suggestion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grounding {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol_reference: Option<String>,
    /// Variable ids the analysis reads
    #[serde(default)]
    pub schema_reference: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub literature_reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regulatory_reference: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueKind {
    SampleSize,
    MissingData,
    AssumptionViolation,
    DataTypeMismatch,
    InsufficientGroups,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Blocking,
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeasibilityIssue {
    #[serde(rename = "type")]
    pub kind: IssueKind,
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
}

impl FeasibilityIssue {
    pub fn is_blocking(&self) -> bool {
        self.severity == Severity::Blocking
    }
}

/// Itemised verdict on whether an analysis can be soundly run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeasibilityResult {
    pub feasible: bool,
    pub sample_size_adequate: bool,
    pub assumptions_met: bool,
    pub data_complete: bool,
    pub issues: Vec<FeasibilityIssue>,
    pub minimum_sample_size: usize,
}

impl FeasibilityResult {
    /// Verdict placeholder used before the checker has run.
    pub fn unchecked(analysis_type: AnalysisType) -> Self {
        Self {
            feasible: true,
            sample_size_adequate: true,
            assumptions_met: true,
            data_complete: true,
            issues: Vec::new(),
            minimum_sample_size: analysis_type.minimum_sample_size(),
        }
    }

    /// Builds a verdict from issues; every flag is derived from the issue list.
    pub fn from_issues(issues: Vec<FeasibilityIssue>, minimum_sample_size: usize) -> Self {
        let blocking_of = |kind: IssueKind| issues.iter().any(|i| i.kind == kind && i.is_blocking());
        Self {
            feasible: !issues.iter().any(FeasibilityIssue::is_blocking),
            sample_size_adequate: !blocking_of(IssueKind::SampleSize),
            assumptions_met: !blocking_of(IssueKind::AssumptionViolation),
            data_complete: !blocking_of(IssueKind::MissingData),
            minimum_sample_size,
            issues,
        }
    }

    pub fn blocking_issues(&self) -> impl Iterator<Item = &FeasibilityIssue> {
        self.issues.iter().filter(|i| i.is_blocking())
    }
}

/// A reviewable recommendation to run one analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub id: String,
    pub suggestion_type: SuggestionType,
    pub priority: Priority,
    pub title: String,
    pub description: String,
    pub rationale: String,
    #[serde(default)]
    pub grounding: Grounding,
    pub proposed_analysis: ProposedAnalysis,
    #[serde(rename = "feasibilityCheck")]
    pub feasibility: FeasibilityResult,
    /// Confidence in `[0, 100]`
    pub confidence: u8,
    pub auto_execute: bool,
    pub status: SuggestionStatus,
    pub source: SuggestionSource,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modification_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_result: Option<AnalysisExecutionResult>,
}

impl Suggestion {
    /// Returns true if the suggestion passes the auto-execution gate.
    ///
    /// The gate requires the suggestion to ask for auto-execution, to be
    /// feasible, to be of a descriptive or normality-check type, and to
    /// propose a non-inferential analysis kind.
    pub fn passes_auto_execution_gate(&self) -> bool {
        self.auto_execute
            && self.feasibility.feasible
            && self.suggestion_type.is_auto_executable()
            && !self.proposed_analysis.analysis_type.is_inferential()
    }
}

/// Reviewer decision on a pending suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReviewDecision {
    Accept,
    AcceptModified,
    Reject,
    Defer,
}

/// Partial replacement of a proposed analysis, applied on accept-modified.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_type: Option<AnalysisType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<StatisticalMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<AnalysisParameters>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_outputs: Option<ExpectedOutputs>,
}

impl AnalysisPatch {
    pub fn is_empty(&self) -> bool {
        self.analysis_type.is_none()
            && self.method.is_none()
            && self.parameters.is_none()
            && self.expected_outputs.is_none()
    }

    /// Applies the patch. A changed analysis type re-derives the method and
    /// expected outputs unless the patch supplies them.
    pub fn apply_to(&self, analysis: &mut ProposedAnalysis) {
        if let Some(analysis_type) = self.analysis_type.filter(|t| *t != analysis.analysis_type) {
            analysis.analysis_type = analysis_type;
            analysis.method = analysis_type.default_method();
            analysis.expected_outputs = ExpectedOutputs::for_type(analysis_type);
        }
        if let Some(method) = &self.method {
            analysis.method = method.clone();
        }
        if let Some(parameters) = &self.parameters {
            analysis.parameters = parameters.clone();
        }
        if let Some(outputs) = &self.expected_outputs {
            analysis.expected_outputs = outputs.clone();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionReview {
    pub suggestion_id: String,
    pub decision: ReviewDecision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modifications: Option<AnalysisPatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub reviewed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<String>,
}

impl SuggestionReview {
    /// A review stamped with the current time.
    pub fn new(suggestion_id: impl Into<String>, decision: ReviewDecision) -> Self {
        Self {
            suggestion_id: suggestion_id.into(),
            decision,
            modifications: None,
            reason: None,
            reviewed_at: Utc::now(),
            reviewed_by: None,
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_reviewer(mut self, reviewer: impl Into<String>) -> Self {
        self.reviewed_by = Some(reviewer.into());
        self
    }

    pub fn with_modifications(mut self, patch: AnalysisPatch) -> Self {
        self.modifications = Some(patch);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(kind: IssueKind, severity: Severity) -> FeasibilityIssue {
        FeasibilityIssue {
            kind,
            severity,
            message: String::new(),
            resolution: None,
        }
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Critical < Priority::Recommended);
        assert!(Priority::Recommended < Priority::Optional);
    }

    #[test]
    fn test_feasibility_flags_follow_issues() {
        let result = FeasibilityResult::from_issues(
            vec![
                issue(IssueKind::SampleSize, Severity::Warning),
                issue(IssueKind::MissingData, Severity::Blocking),
            ],
            20,
        );
        assert!(!result.feasible);
        assert!(result.sample_size_adequate);
        assert!(!result.data_complete);
        assert!(result.assumptions_met);
        assert_eq!(result.blocking_issues().count(), 1);
    }

    #[test]
    fn test_warnings_alone_stay_feasible() {
        let result = FeasibilityResult::from_issues(
            vec![issue(IssueKind::AssumptionViolation, Severity::Warning)],
            20,
        );
        assert!(result.feasible);
    }

    #[test]
    fn test_review_decision_wire_names() {
        let decision: ReviewDecision = serde_json::from_str("\"accept-modified\"").unwrap();
        assert_eq!(decision, ReviewDecision::AcceptModified);
    }

    #[test]
    fn test_only_descriptive_types_auto_execute() {
        assert!(SuggestionType::Descriptive.is_auto_executable());
        assert!(SuggestionType::NormalityCheck.is_auto_executable());
        assert!(!SuggestionType::PrimaryAnalysis.is_auto_executable());
        assert!(!SuggestionType::AssumptionCheck.is_auto_executable());
    }

    #[test]
    fn test_patch_rederives_method_for_new_type() {
        use crate::model::{DataType, Role, Variable};

        let outcome = Variable::new("sbp", DataType::Continuous, Role::Outcome);
        let mut analysis = ProposedAnalysis::new("a", AnalysisType::TTest, outcome);
        let patch = AnalysisPatch {
            analysis_type: Some(AnalysisType::MannWhitney),
            parameters: Some(AnalysisParameters::two_sided(0.01, 0.99)),
            ..Default::default()
        };
        assert!(!patch.is_empty());
        patch.apply_to(&mut analysis);
        assert_eq!(analysis.method.name, "Mann-Whitney U Test");
        assert_eq!(analysis.expected_outputs.primary_statistic, "U statistic");
        assert_eq!(analysis.parameters.alpha, Some(0.01));
    }
}
