//! Prompt rendering for drafted plans and single-test recommendations.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Write};

use crate::error::Result;
use crate::model::{AnalysisContext, AnalysisType, SuggestionType, Variable};
use crate::classifier::classify;
use crate::selection::select_test;

/// Part of an analysis plan drafted on its own in batched generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisDomain {
    Descriptive,
    Primary,
    Secondary,
    Safety,
    Exploratory,
}

impl AnalysisDomain {
    /// Every domain in generation order.
    pub const ALL: [AnalysisDomain; 5] = [
        AnalysisDomain::Descriptive,
        AnalysisDomain::Primary,
        AnalysisDomain::Secondary,
        AnalysisDomain::Safety,
        AnalysisDomain::Exploratory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisDomain::Descriptive => "descriptive",
            AnalysisDomain::Primary => "primary",
            AnalysisDomain::Secondary => "secondary",
            AnalysisDomain::Safety => "safety",
            AnalysisDomain::Exploratory => "exploratory",
        }
    }

    /// What a prompt restricted to this domain asks for.
    pub fn focus(&self) -> &'static str {
        match self {
            AnalysisDomain::Descriptive => {
                "Baseline characteristics and the distribution of every endpoint."
            }
            AnalysisDomain::Primary => {
                "The primary endpoint analysis, its assumption checks and effect size."
            }
            AnalysisDomain::Secondary => "One analysis per secondary endpoint.",
            AnalysisDomain::Safety => {
                "Adverse event tabulation and complication rates with Wilson score intervals."
            }
            AnalysisDomain::Exploratory => {
                "Exploratory correlations, subgroup and sensitivity analyses."
            }
        }
    }
}

impl fmt::Display for AnalysisDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Prompt asking for an analysis plan, optionally restricted to one domain.
#[derive(Debug, Clone, Copy)]
pub struct PlanPrompt<'a> {
    context: &'a AnalysisContext,
    domain: Option<AnalysisDomain>,
}

impl<'a> PlanPrompt<'a> {
    /// Prompt for the full plan.
    pub fn full(context: &'a AnalysisContext) -> Self {
        Self {
            context,
            domain: None,
        }
    }

    /// Prompt restricted to one domain.
    pub fn for_domain(context: &'a AnalysisContext, domain: AnalysisDomain) -> Self {
        Self {
            context,
            domain: Some(domain),
        }
    }

    pub fn domain(&self) -> Option<AnalysisDomain> {
        self.domain
    }

    /// Renders the prompt text.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the context cannot be rendered as JSON.
    pub fn render(&self) -> Result<String> {
        let context_json = serde_json::to_string_pretty(self.context)?;
        let mut prompt = String::with_capacity(context_json.len() + 2048);

        let _ = writeln!(
            prompt,
            "You are a clinical biostatistician drafting a statistical analysis plan."
        );
        let _ = writeln!(
            prompt,
            "Study design: {}. Completed records: {}.",
            self.context.protocol.study_design.describe(),
            self.context.data.completed_records
        );
        match self.domain {
            Some(domain) => {
                let _ = writeln!(prompt, "\nOnly propose {domain} analyses: {}", domain.focus());
            }
            None => {
                let _ = writeln!(
                    prompt,
                    "\nCover descriptive, primary, secondary, safety and exploratory analyses."
                );
            }
        }

        let _ = writeln!(prompt, "\n## VARIABLES\n");
        for variable in &self.context.schema.variables {
            let _ = writeln!(prompt, "{}", variable_line(variable));
        }

        let _ = writeln!(prompt, "\n## ANALYSIS CONTEXT\n\n```json\n{context_json}\n```");
        let _ = writeln!(prompt, "\n## RESPONSE FORMAT\n");
        let _ = writeln!(prompt, "Respond with valid JSON only:\n\n{}", plan_shape());
        let _ = writeln!(
            prompt,
            "\nUse the variable ids listed above. Inferential analyses must set autoExecute to false."
        );
        Ok(prompt)
    }
}

fn variable_line(variable: &Variable) -> String {
    let mut line = format!(
        "- {} (id: {}, type: {}, classified as: {}",
        variable.label,
        variable.id,
        variable.data_type.as_str(),
        classify(variable)
    );
    if let Some(tier) = variable.endpoint_tier {
        let _ = write!(line, ", {} endpoint", tier.as_str());
    }
    if let Some(options) = &variable.options {
        let _ = write!(line, ", categories: {}", options.join(", "));
    }
    line.push(')');
    line
}

fn plan_shape() -> String {
    let suggestion_types = [
        SuggestionType::Descriptive,
        SuggestionType::NormalityCheck,
        SuggestionType::PrimaryAnalysis,
        SuggestionType::SecondaryAnalysis,
        SuggestionType::ExploratoryAnalysis,
        SuggestionType::AssumptionCheck,
        SuggestionType::SensitivityAnalysis,
        SuggestionType::SampleSizeReview,
        SuggestionType::MissingDataStrategy,
        SuggestionType::MultiplicityAdjustment,
        SuggestionType::SubgroupAnalysis,
        SuggestionType::EffectSizeEstimation,
    ]
    .iter()
    .map(|t| format!("\"{}\"", t.as_str()))
    .collect::<Vec<_>>()
    .join(" | ");
    let analysis_types = AnalysisType::ALL
        .iter()
        .map(|t| format!("\"{t}\""))
        .collect::<Vec<_>>()
        .join(" | ");

    format!(
        r#"{{
  "suggestions": [
    {{
      "suggestionType": {suggestion_types},
      "priority": "critical" | "recommended" | "optional",
      "title": "Clear, specific title",
      "description": "What this analysis accomplishes",
      "rationale": "Why this test, which assumptions were checked",
      "autoExecute": true | false,
      "grounding": {{
        "protocolReference": "Link to PICO or objective",
        "regulatoryReference": "ICH E9 section, CONSORT or STROBE item",
        "literatureReference": "Foundational paper method, if applicable"
      }},
      "proposedAnalysis": {{
        "analysisType": {analysis_types},
        "outcomeId": "variable id (required)",
        "predictorId": "variable id or null",
        "covariateIds": [],
        "method": {{ "name": "...", "category": "...", "assumptions": [], "references": [] }},
        "parameters": {{ "alpha": 0.05, "tails": "two", "confidenceLevel": 0.95 }}
      }},
      "expectedOutputs": {{
        "primaryStatistic": "...",
        "effectSizeType": "...",
        "confidenceInterval": true,
        "pValue": true,
        "visualization": "bar" | "histogram" | "boxplot" | "scatter" | "line" | "kaplan-meier" | "forest-plot"
      }},
      "feasibilityNotes": "Concerns about sample size or assumptions",
      "confidence": 85
    }}
  ]
}}"#
    )
}

/// Prompt asking to confirm or replace the rule-based test for one pair.
///
/// # Errors
///
/// Never fails today; the `Result` mirrors [`PlanPrompt::render`].
pub fn test_recommendation_prompt(
    predictor: Option<&Variable>,
    outcome: &Variable,
    context: &AnalysisContext,
) -> Result<String> {
    let selection = select_test(predictor, outcome, context.protocol.study_design);
    let mut prompt = String::new();

    let _ = writeln!(
        prompt,
        "You are a clinical biostatistician. Recommend the most appropriate statistical test for this variable pair.\n"
    );
    let _ = writeln!(prompt, "Outcome: {}", variable_line(outcome));
    match predictor {
        Some(p) => {
            let _ = writeln!(prompt, "Predictor: {}", variable_line(p));
        }
        None => {
            let _ = writeln!(prompt, "No predictor (descriptive analysis)");
        }
    }
    let _ = writeln!(
        prompt,
        "Study design: {}. Total N: {}.",
        context.protocol.study_design.describe(),
        context.data.completed_records
    );
    if let Some(groups) = &context.data.group_sizes {
        let sizes: Vec<String> = groups.iter().map(|(g, n)| format!("{g}={n}")).collect();
        let _ = writeln!(prompt, "Group sizes: {}", sizes.join(", "));
    }
    let _ = writeln!(
        prompt,
        "\nRule-based recommendation: {} ({}). {}",
        selection.method.name, selection.analysis_type, selection.rationale
    );
    let _ = writeln!(
        prompt,
        r#"
Respond with valid JSON only:
{{
  "recommendation": {{
    "analysisType": "{}",
    "method": {{ "name": "...", "category": "...", "assumptions": [] }},
    "rationale": "Why this test fits the data",
    "alternativeTest": "analysis type to use if assumptions are violated",
    "alternativeRationale": "When to use the alternative"
  }},
  "confidence": 90
}}"#,
        selection.analysis_type
    );
    Ok(prompt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::trial_context;

    #[test]
    fn test_full_prompt_lists_variables_and_shape() {
        let context = trial_context(12).unwrap();
        let prompt = PlanPrompt::full(&context).render().unwrap();
        assert!(prompt.contains("randomized controlled trial"));
        assert!(prompt.contains("- Systolic BP (id: sbp, type: Continuous, classified as: continuous, primary endpoint)"));
        assert!(prompt.contains("categories: Drug, Placebo"));
        assert!(prompt.contains("\"kaplan-meier\""));
        assert!(prompt.contains("\"completedRecords\": 12"));
    }

    #[test]
    fn test_domain_prompt_is_restricted() {
        let context = trial_context(12).unwrap();
        let prompt = PlanPrompt::for_domain(&context, AnalysisDomain::Safety)
            .render()
            .unwrap();
        assert!(prompt.contains("Only propose safety analyses"));
        assert!(!prompt.contains("Cover descriptive"));
    }

    #[test]
    fn test_recommendation_prompt_carries_rule_based_choice() {
        let context = trial_context(12).unwrap();
        let prompt = test_recommendation_prompt(
            context.variable("arm"),
            context.variable("sbp").unwrap(),
            &context,
        )
        .unwrap();
        assert!(prompt.contains("Rule-based recommendation: Independent Samples T-Test (t-test)"));
        assert!(prompt.contains("Group sizes: Drug=6, Placebo=6"));
    }
}
