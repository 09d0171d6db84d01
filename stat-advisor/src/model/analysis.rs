//! Analysis kinds, their static metadata, and proposed analysis configurations.
//!
//! Every lookup table the engine needs (minimum sample sizes, expected primary
//! statistic, effect-size label, chart hint) is a `match` on [`AnalysisType`],
//! so adding a kind fails to compile until each table covers it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::variable::Variable;

/// Enumerated statistical analysis kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnalysisType {
    Descriptive,
    NormalityTest,
    TTest,
    PairedTTest,
    Anova,
    RepeatedAnova,
    ChiSquare,
    FisherExact,
    Mcnemar,
    PearsonCorrelation,
    SpearmanCorrelation,
    MannWhitney,
    Wilcoxon,
    KruskalWallis,
    LinearRegression,
    LogisticRegression,
    CoxRegression,
    KaplanMeier,
    LogRank,
    DiagnosticAccuracy,
}

impl AnalysisType {
    /// All analysis kinds in declaration order.
    pub const ALL: [AnalysisType; 20] = [
        AnalysisType::Descriptive,
        AnalysisType::NormalityTest,
        AnalysisType::TTest,
        AnalysisType::PairedTTest,
        AnalysisType::Anova,
        AnalysisType::RepeatedAnova,
        AnalysisType::ChiSquare,
        AnalysisType::FisherExact,
        AnalysisType::Mcnemar,
        AnalysisType::PearsonCorrelation,
        AnalysisType::SpearmanCorrelation,
        AnalysisType::MannWhitney,
        AnalysisType::Wilcoxon,
        AnalysisType::KruskalWallis,
        AnalysisType::LinearRegression,
        AnalysisType::LogisticRegression,
        AnalysisType::CoxRegression,
        AnalysisType::KaplanMeier,
        AnalysisType::LogRank,
        AnalysisType::DiagnosticAccuracy,
    ];

    /// Wire name of the analysis kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisType::Descriptive => "descriptive",
            AnalysisType::NormalityTest => "normality-test",
            AnalysisType::TTest => "t-test",
            AnalysisType::PairedTTest => "paired-t-test",
            AnalysisType::Anova => "anova",
            AnalysisType::RepeatedAnova => "repeated-anova",
            AnalysisType::ChiSquare => "chi-square",
            AnalysisType::FisherExact => "fisher-exact",
            AnalysisType::Mcnemar => "mcnemar",
            AnalysisType::PearsonCorrelation => "pearson-correlation",
            AnalysisType::SpearmanCorrelation => "spearman-correlation",
            AnalysisType::MannWhitney => "mann-whitney",
            AnalysisType::Wilcoxon => "wilcoxon",
            AnalysisType::KruskalWallis => "kruskal-wallis",
            AnalysisType::LinearRegression => "linear-regression",
            AnalysisType::LogisticRegression => "logistic-regression",
            AnalysisType::CoxRegression => "cox-regression",
            AnalysisType::KaplanMeier => "kaplan-meier",
            AnalysisType::LogRank => "log-rank",
            AnalysisType::DiagnosticAccuracy => "diagnostic-accuracy",
        }
    }

    /// Smallest number of completed records for which the analysis is advisable.
    pub fn minimum_sample_size(&self) -> usize {
        match self {
            AnalysisType::Descriptive => 1,
            AnalysisType::NormalityTest => 3,
            AnalysisType::TTest => 20,
            AnalysisType::PairedTTest => 15,
            AnalysisType::Anova => 30,
            AnalysisType::RepeatedAnova => 20,
            AnalysisType::ChiSquare => 20,
            AnalysisType::FisherExact => 10,
            AnalysisType::Mcnemar => 20,
            AnalysisType::PearsonCorrelation => 20,
            AnalysisType::SpearmanCorrelation => 15,
            AnalysisType::MannWhitney => 15,
            AnalysisType::Wilcoxon => 15,
            AnalysisType::KruskalWallis => 20,
            AnalysisType::LinearRegression => 30,
            AnalysisType::LogisticRegression => 50,
            AnalysisType::CoxRegression => 50,
            AnalysisType::KaplanMeier => 20,
            AnalysisType::LogRank => 20,
            AnalysisType::DiagnosticAccuracy => 50,
        }
    }

    /// Name of the statistic the analysis reports first.
    pub fn expected_statistic(&self) -> &'static str {
        match self {
            AnalysisType::Descriptive => "Summary statistics",
            AnalysisType::NormalityTest => "W statistic",
            AnalysisType::TTest | AnalysisType::PairedTTest => "Mean difference",
            AnalysisType::Anova | AnalysisType::RepeatedAnova => "F-statistic",
            AnalysisType::ChiSquare | AnalysisType::Mcnemar | AnalysisType::LogRank => {
                "Chi-square"
            }
            AnalysisType::FisherExact => "Odds ratio",
            AnalysisType::PearsonCorrelation => "r",
            AnalysisType::SpearmanCorrelation => "rho",
            AnalysisType::MannWhitney => "U statistic",
            AnalysisType::Wilcoxon => "W statistic",
            AnalysisType::KruskalWallis => "H statistic",
            AnalysisType::LinearRegression => "Beta coefficients",
            AnalysisType::LogisticRegression => "Odds ratios",
            AnalysisType::CoxRegression => "Hazard ratios",
            AnalysisType::KaplanMeier => "Median survival",
            AnalysisType::DiagnosticAccuracy => "Sensitivity/Specificity",
        }
    }

    /// Effect-size measure reported alongside the test, if any.
    pub fn effect_size(&self) -> Option<&'static str> {
        match self {
            AnalysisType::TTest | AnalysisType::PairedTTest => Some("Cohen's d"),
            AnalysisType::Anova => Some("Eta-squared"),
            AnalysisType::ChiSquare => Some("Cramér's V"),
            AnalysisType::FisherExact
            | AnalysisType::LogisticRegression => Some("Odds ratio"),
            AnalysisType::PearsonCorrelation | AnalysisType::SpearmanCorrelation => Some("r²"),
            AnalysisType::CoxRegression => Some("Hazard ratio"),
            _ => None,
        }
    }

    /// Chart that best presents the analysis.
    pub fn visualization(&self) -> ChartType {
        match self {
            AnalysisType::TTest
            | AnalysisType::PairedTTest
            | AnalysisType::Anova
            | AnalysisType::MannWhitney => ChartType::Boxplot,
            AnalysisType::PearsonCorrelation | AnalysisType::SpearmanCorrelation => {
                ChartType::Scatter
            }
            AnalysisType::KaplanMeier | AnalysisType::LogRank => ChartType::KaplanMeier,
            AnalysisType::CoxRegression | AnalysisType::LogisticRegression => ChartType::ForestPlot,
            AnalysisType::NormalityTest => ChartType::Histogram,
            _ => ChartType::Bar,
        }
    }

    /// Conventional method for the analysis kind, with its assumptions and
    /// regulatory references.
    pub fn default_method(&self) -> StatisticalMethod {
        let (name, category, assumptions, references): (_, _, &[&str], &[&str]) = match self {
            AnalysisType::Descriptive => (
                "Descriptive Statistics",
                MethodCategory::Descriptive,
                &[],
                &["ICH E9 Section 5.1"],
            ),
            AnalysisType::NormalityTest => (
                "Shapiro-Wilk Normality Test",
                MethodCategory::Descriptive,
                &[],
                &[],
            ),
            AnalysisType::TTest => (
                "Independent Samples T-Test",
                MethodCategory::Parametric,
                &["Normality", "Equal variances", "Independence"],
                &["ICH E9 Section 5.2.3"],
            ),
            AnalysisType::PairedTTest => (
                "Paired T-Test",
                MethodCategory::Parametric,
                &["Normality of differences", "Paired observations"],
                &["ICH E9 Section 5.2.3"],
            ),
            AnalysisType::Anova => (
                "One-Way ANOVA",
                MethodCategory::Parametric,
                &["Normality", "Homogeneity of variances", "Independence"],
                &["ICH E9 Section 5.2.3"],
            ),
            AnalysisType::RepeatedAnova => (
                "Repeated Measures ANOVA",
                MethodCategory::Parametric,
                &["Normality", "Sphericity"],
                &["ICH E9 Section 5.2.3"],
            ),
            AnalysisType::ChiSquare => (
                "Chi-Square Test of Independence",
                MethodCategory::NonParametric,
                &["Independence", "Expected counts >= 5"],
                &["ICH E9 Section 5.2.3"],
            ),
            AnalysisType::FisherExact => (
                "Fisher's Exact Test",
                MethodCategory::NonParametric,
                &["Independence", "Fixed marginals"],
                &["ICH E9 Section 5.2.3"],
            ),
            AnalysisType::Mcnemar => (
                "McNemar Test",
                MethodCategory::NonParametric,
                &["Paired nominal observations"],
                &[],
            ),
            AnalysisType::PearsonCorrelation => (
                "Pearson Correlation",
                MethodCategory::Parametric,
                &["Linearity", "Bivariate normality", "No outliers"],
                &[],
            ),
            AnalysisType::SpearmanCorrelation => (
                "Spearman Rank Correlation",
                MethodCategory::NonParametric,
                &["Monotonic relationship"],
                &[],
            ),
            AnalysisType::MannWhitney => (
                "Mann-Whitney U Test",
                MethodCategory::NonParametric,
                &["Independence", "Similar distribution shapes"],
                &["ICH E9 Section 5.2.3"],
            ),
            AnalysisType::Wilcoxon => (
                "Wilcoxon Signed-Rank Test",
                MethodCategory::NonParametric,
                &["Paired observations", "Symmetric differences"],
                &[],
            ),
            AnalysisType::KruskalWallis => (
                "Kruskal-Wallis Test",
                MethodCategory::NonParametric,
                &["Independence", "Similar distribution shapes"],
                &[],
            ),
            AnalysisType::LinearRegression => (
                "Linear Regression",
                MethodCategory::Regression,
                &["Linearity", "Independence", "Homoscedasticity", "Normal residuals"],
                &["ICH E9 Section 5.7"],
            ),
            AnalysisType::LogisticRegression => (
                "Logistic Regression",
                MethodCategory::Regression,
                &["Independence", "No multicollinearity", "Linearity of logit"],
                &["ICH E9 Section 5.2.3"],
            ),
            AnalysisType::CoxRegression => (
                "Cox Proportional Hazards Regression",
                MethodCategory::Survival,
                &["Proportional hazards", "Independent censoring"],
                &["ICH E9 Section 5.4"],
            ),
            AnalysisType::KaplanMeier => (
                "Kaplan-Meier Estimator",
                MethodCategory::Survival,
                &["Independent censoring"],
                &["ICH E9 Section 5.4"],
            ),
            AnalysisType::LogRank => (
                "Log-Rank Test",
                MethodCategory::Survival,
                &["Independent censoring", "Non-informative censoring"],
                &["ICH E9 Section 5.4", "CONSORT survival extension"],
            ),
            AnalysisType::DiagnosticAccuracy => (
                "Diagnostic Accuracy Analysis",
                MethodCategory::Diagnostic,
                &["Reference standard applied to all subjects"],
                &["STARD 2015"],
            ),
        };
        StatisticalMethod::new(name, category)
            .with_assumptions(assumptions)
            .with_references(references)
    }

    /// Returns true if the analysis reports a confidence interval.
    pub fn reports_confidence_interval(&self) -> bool {
        !matches!(self, AnalysisType::Descriptive | AnalysisType::NormalityTest)
    }

    /// Returns true for analyses that test a hypothesis about a predictor.
    ///
    /// Only non-inferential kinds may ever run without human review.
    pub fn is_inferential(&self) -> bool {
        !matches!(self, AnalysisType::Descriptive | AnalysisType::NormalityTest)
    }

    /// Returns true if the executor computes this kind natively.
    pub fn is_executable(&self) -> bool {
        matches!(
            self,
            AnalysisType::Descriptive
                | AnalysisType::NormalityTest
                | AnalysisType::TTest
                | AnalysisType::ChiSquare
                | AnalysisType::FisherExact
                | AnalysisType::PearsonCorrelation
                | AnalysisType::SpearmanCorrelation
        )
    }
}

impl fmt::Display for AnalysisType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnalysisType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace([' ', '_'], "-");
        AnalysisType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| format!("unknown analysis type '{s}'"))
    }
}

/// Broad family a statistical method belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MethodCategory {
    Descriptive,
    Parametric,
    NonParametric,
    Regression,
    Survival,
    Diagnostic,
}

/// Named method with its assumptions and regulatory references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticalMethod {
    pub name: String,
    pub category: MethodCategory,
    #[serde(default)]
    pub assumptions: Vec<String>,
    #[serde(default)]
    pub references: Vec<String>,
}

impl StatisticalMethod {
    pub fn new(name: impl Into<String>, category: MethodCategory) -> Self {
        Self {
            name: name.into(),
            category,
            assumptions: Vec::new(),
            references: Vec::new(),
        }
    }

    pub fn with_assumptions(mut self, assumptions: &[&str]) -> Self {
        self.assumptions = assumptions.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn with_references(mut self, references: &[&str]) -> Self {
        self.references = references.iter().map(|r| r.to_string()).collect();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tails {
    One,
    Two,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MultiplicityMethod {
    Bonferroni,
    Holm,
    Hochberg,
    Fdr,
    None,
}

/// Tunable parameters of an analysis. Absent values fall back to configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alpha: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tails: Option<Tails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_level: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paired: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub equal_variances: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuity_correction: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiplicity: Option<MultiplicityMethod>,
}

impl AnalysisParameters {
    /// Two-sided parameters at the given alpha and confidence level.
    pub fn two_sided(alpha: f64, confidence_level: f64) -> Self {
        Self {
            alpha: Some(alpha),
            tails: Some(Tails::Two),
            confidence_level: Some(confidence_level),
            ..Default::default()
        }
    }
}

/// Chart kinds the UI layer knows how to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChartType {
    Bar,
    Histogram,
    Boxplot,
    Scatter,
    Line,
    KaplanMeier,
    ForestPlot,
    Heatmap,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedOutputs {
    pub primary_statistic: String,
    pub confidence_interval: bool,
    pub p_value: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visualization: Option<ChartType>,
}

impl ExpectedOutputs {
    /// Outputs implied by the analysis kind's static tables.
    pub fn for_type(analysis_type: AnalysisType) -> Self {
        Self {
            primary_statistic: analysis_type.expected_statistic().to_string(),
            confidence_interval: analysis_type.reports_confidence_interval(),
            p_value: analysis_type.is_inferential() || analysis_type == AnalysisType::NormalityTest,
            effect_size: analysis_type.effect_size().map(str::to_string),
            visualization: Some(analysis_type.visualization()),
        }
    }
}

/// A fully specified analysis ready for feasibility checking and execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposedAnalysis {
    pub analysis_id: String,
    pub analysis_type: AnalysisType,
    pub outcome: Variable,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predictor: Option<Variable>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub covariates: Vec<Variable>,
    pub method: StatisticalMethod,
    #[serde(default)]
    pub parameters: AnalysisParameters,
    pub expected_outputs: ExpectedOutputs,
    #[serde(default)]
    pub execution_ready: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub blockers: Vec<String>,
}

impl ProposedAnalysis {
    /// An execution-ready analysis with the kind's default method and outputs.
    pub fn new(analysis_id: impl Into<String>, analysis_type: AnalysisType, outcome: Variable) -> Self {
        Self {
            analysis_id: analysis_id.into(),
            analysis_type,
            outcome,
            predictor: None,
            covariates: Vec::new(),
            method: analysis_type.default_method(),
            parameters: AnalysisParameters::default(),
            expected_outputs: ExpectedOutputs::for_type(analysis_type),
            execution_ready: true,
            blockers: Vec::new(),
        }
    }

    pub fn with_predictor(mut self, predictor: Variable) -> Self {
        self.predictor = Some(predictor);
        self
    }

    pub fn with_method(mut self, method: StatisticalMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_parameters(mut self, parameters: AnalysisParameters) -> Self {
        self.parameters = parameters;
        self
    }

    /// Merge key shared by rule-based and AI-sourced suggestions.
    pub fn dedup_key(&self) -> (AnalysisType, String, Option<String>) {
        (
            self.analysis_type,
            self.outcome.id.clone(),
            self.predictor.as_ref().map(|p| p.id.clone()),
        )
    }
}
