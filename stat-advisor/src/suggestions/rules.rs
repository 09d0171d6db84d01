//! Built-in suggestion rules.

use chrono::Utc;

use super::SuggestionRule;
use crate::config::AdvisorConfig;
use crate::model::{
    AnalysisContext, AnalysisParameters, AnalysisType, ChartType, DataType, EndpointTier,
    FeasibilityResult, Grounding, Priority, ProposedAnalysis, Suggestion, SuggestionSource,
    SuggestionStatus, SuggestionType, Variable,
};
use crate::selection::select_test;

fn suggestion(
    id: String,
    suggestion_type: SuggestionType,
    priority: Priority,
    proposed_analysis: ProposedAnalysis,
) -> Suggestion {
    Suggestion {
        id,
        suggestion_type,
        priority,
        title: String::new(),
        description: String::new(),
        rationale: String::new(),
        grounding: Grounding::default(),
        feasibility: FeasibilityResult::unchecked(proposed_analysis.analysis_type),
        proposed_analysis,
        confidence: 0,
        auto_execute: false,
        status: SuggestionStatus::Pending,
        source: SuggestionSource::RuleBased,
        created_at: Utc::now(),
        reviewed_at: None,
        reviewed_by: None,
        modification_notes: None,
        executed_at: None,
        execution_result: None,
    }
}

fn endpoints(context: &AnalysisContext, tier: EndpointTier) -> &[Variable] {
    match tier {
        EndpointTier::Primary => &context.schema.primary_endpoints,
        EndpointTier::Secondary => &context.schema.secondary_endpoints,
        EndpointTier::Exploratory => &context.schema.exploratory_endpoints,
    }
}

/// Summary statistics for every primary and secondary endpoint.
pub struct DescriptiveRule;

impl DescriptiveRule {
    fn describe(endpoint: &Variable, priority: Priority, config: &AdvisorConfig) -> Suggestion {
        let mut analysis = ProposedAnalysis::new(
            format!("analysis-desc-{}", endpoint.id),
            AnalysisType::Descriptive,
            endpoint.clone(),
        );
        analysis.expected_outputs.visualization = Some(if endpoint.data_type == DataType::Continuous {
            ChartType::Histogram
        } else {
            ChartType::Bar
        });

        let mut s = suggestion(
            format!("descriptive-{}", endpoint.id),
            SuggestionType::Descriptive,
            priority,
            analysis,
        );
        s.title = format!("Descriptive Statistics: {}", endpoint.label);
        s.description = format!(
            "Calculate summary statistics for {} ({}).",
            endpoint.label,
            endpoint.data_type.as_str()
        );
        s.rationale = "Descriptive statistics provide an overview of the data distribution \
                       and are essential for understanding the study population."
            .to_string();
        s.grounding = Grounding {
            protocol_reference: Some(
                if endpoint.endpoint_tier == Some(EndpointTier::Primary) {
                    "Primary endpoint characterization"
                } else {
                    "Endpoint characterization"
                }
                .to_string(),
            ),
            schema_reference: vec![endpoint.id.clone()],
            literature_reference: None,
            regulatory_reference: Some("ICH E9 Section 5.1".to_string()),
        };
        s.confidence = 100;
        s.auto_execute = config.auto_execute_descriptive;
        s
    }
}

impl SuggestionRule for DescriptiveRule {
    fn apply(&self, context: &AnalysisContext, config: &AdvisorConfig) -> Vec<Suggestion> {
        let primary = endpoints(context, EndpointTier::Primary)
            .iter()
            .map(|e| Self::describe(e, Priority::Critical, config));
        let secondary = endpoints(context, EndpointTier::Secondary)
            .iter()
            .map(|e| Self::describe(e, Priority::Recommended, config));
        primary.chain(secondary).collect()
    }

    fn name(&self) -> &str {
        "descriptive"
    }

    fn description(&self) -> &str {
        "Summary statistics for primary and secondary endpoints"
    }
}

/// Inferential test of each endpoint of one tier against the first declared
/// predictor. Never auto-executes.
pub struct EndpointAnalysisRule {
    tier: EndpointTier,
    priority: Priority,
    suggestion_type: SuggestionType,
    confidence: u8,
}

impl EndpointAnalysisRule {
    pub fn primary() -> Self {
        Self {
            tier: EndpointTier::Primary,
            priority: Priority::Critical,
            suggestion_type: SuggestionType::PrimaryAnalysis,
            confidence: 85,
        }
    }

    pub fn secondary() -> Self {
        Self {
            tier: EndpointTier::Secondary,
            priority: Priority::Recommended,
            suggestion_type: SuggestionType::SecondaryAnalysis,
            confidence: 85,
        }
    }

    /// Tests exploratory endpoints at optional priority.
    pub fn exploratory() -> Self {
        Self {
            tier: EndpointTier::Exploratory,
            priority: Priority::Optional,
            suggestion_type: SuggestionType::ExploratoryAnalysis,
            confidence: 70,
        }
    }

    fn protocol_reference(&self) -> &'static str {
        match self.tier {
            EndpointTier::Primary => "Primary endpoint analysis",
            EndpointTier::Secondary => "Secondary endpoint analysis",
            EndpointTier::Exploratory => "Exploratory endpoint analysis",
        }
    }
}

impl SuggestionRule for EndpointAnalysisRule {
    fn apply(&self, context: &AnalysisContext, config: &AdvisorConfig) -> Vec<Suggestion> {
        let Some(predictor) = context.schema.predictors.first() else {
            return Vec::new();
        };
        let literature = context
            .literature
            .as_ref()
            .and_then(|l| l.synthesized_methods.clone());

        endpoints(context, self.tier)
            .iter()
            .filter(|endpoint| endpoint.id != predictor.id)
            .map(|endpoint| {
                let selection = select_test(Some(predictor), endpoint, context.protocol.study_design);
                let analysis = ProposedAnalysis::new(
                    format!("analysis-{}-{}", selection.analysis_type, endpoint.id),
                    selection.analysis_type,
                    endpoint.clone(),
                )
                .with_predictor(predictor.clone())
                .with_method(selection.method.clone())
                .with_parameters(AnalysisParameters::two_sided(
                    config.default_alpha,
                    config.default_confidence_level,
                ));

                let mut s = suggestion(
                    format!("{}-{}", self.suggestion_type.as_str(), endpoint.id),
                    self.suggestion_type,
                    self.priority,
                    analysis,
                );
                s.title = format!("{}: {}", selection.method.name, endpoint.label);
                s.description = format!(
                    "Compare {} across {} groups using {}.",
                    endpoint.label, predictor.label, selection.method.name
                );
                s.rationale = selection.rationale;
                s.grounding = Grounding {
                    protocol_reference: Some(self.protocol_reference().to_string()),
                    schema_reference: vec![endpoint.id.clone(), predictor.id.clone()],
                    literature_reference: literature.clone(),
                    regulatory_reference: Some(
                        selection
                            .method
                            .references
                            .first()
                            .cloned()
                            .unwrap_or_else(|| "ICH E9".to_string()),
                    ),
                };
                s.confidence = self.confidence;
                s
            })
            .collect()
    }

    fn name(&self) -> &str {
        match self.tier {
            EndpointTier::Primary => "primary-endpoint",
            EndpointTier::Secondary => "secondary-endpoint",
            EndpointTier::Exploratory => "exploratory-endpoint",
        }
    }

    fn description(&self) -> &str {
        "Inferential test of each endpoint against the first declared predictor"
    }
}

/// Normality checks for the first continuous primary and secondary endpoints.
pub struct NormalityRule;

impl SuggestionRule for NormalityRule {
    fn apply(&self, context: &AnalysisContext, config: &AdvisorConfig) -> Vec<Suggestion> {
        endpoints(context, EndpointTier::Primary)
            .iter()
            .chain(endpoints(context, EndpointTier::Secondary))
            .filter(|e| e.data_type == DataType::Continuous)
            .take(config.max_normality_checks)
            .map(|endpoint| {
                let analysis = ProposedAnalysis::new(
                    format!("analysis-normality-{}", endpoint.id),
                    AnalysisType::NormalityTest,
                    endpoint.clone(),
                )
                .with_parameters(AnalysisParameters {
                    alpha: Some(config.default_alpha),
                    ..Default::default()
                });

                let mut s = suggestion(
                    format!("normality-check-{}", endpoint.id),
                    SuggestionType::NormalityCheck,
                    Priority::Recommended,
                    analysis,
                );
                s.title = format!("Normality Check: {}", endpoint.label);
                s.description = format!(
                    "Assess normality of {} distribution using Shapiro-Wilk test and visual inspection.",
                    endpoint.label
                );
                s.rationale = "Parametric tests assume normality; checking this assumption \
                               informs test selection."
                    .to_string();
                s.grounding = Grounding {
                    protocol_reference: Some("Statistical assumptions verification".to_string()),
                    schema_reference: vec![endpoint.id.clone()],
                    literature_reference: None,
                    regulatory_reference: Some("ICH E9 Section 5.2".to_string()),
                };
                s.confidence = 95;
                s.auto_execute = config.auto_execute_normality;
                s
            })
            .collect()
    }

    fn name(&self) -> &str {
        "normality"
    }

    fn description(&self) -> &str {
        "Normality checks for continuous endpoints"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::trial_context;

    #[test]
    fn test_descriptive_rule_covers_primary_then_secondary() {
        let context = trial_context(40).unwrap();
        let suggestions = DescriptiveRule.apply(&context, &AdvisorConfig::default());
        let ids: Vec<&str> = suggestions.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["descriptive-sbp", "descriptive-response", "descriptive-weight"]);

        let sbp = &suggestions[0];
        assert_eq!(sbp.priority, Priority::Critical);
        assert_eq!(sbp.confidence, 100);
        assert!(sbp.auto_execute);
        assert_eq!(sbp.title, "Descriptive Statistics: Systolic BP");
        assert_eq!(sbp.description, "Calculate summary statistics for Systolic BP (Continuous).");
        assert_eq!(
            sbp.proposed_analysis.expected_outputs.visualization,
            Some(ChartType::Histogram)
        );
        assert_eq!(
            suggestions[1].proposed_analysis.expected_outputs.visualization,
            Some(ChartType::Bar)
        );
        assert_eq!(suggestions[1].priority, Priority::Recommended);
    }

    #[test]
    fn test_descriptive_auto_execute_follows_config() {
        let context = trial_context(40).unwrap();
        let config = AdvisorConfig::builder()
            .auto_execute_descriptive(false)
            .build()
            .unwrap();
        assert!(DescriptiveRule
            .apply(&context, &config)
            .iter()
            .all(|s| !s.auto_execute));
    }

    #[test]
    fn test_primary_rule_uses_first_predictor() {
        let context = trial_context(40).unwrap();
        let suggestions = EndpointAnalysisRule::primary().apply(&context, &AdvisorConfig::default());
        assert_eq!(suggestions.len(), 1);

        let s = &suggestions[0];
        assert_eq!(s.id, "primary-analysis-sbp");
        assert_eq!(s.priority, Priority::Critical);
        assert!(!s.auto_execute);
        assert_eq!(s.confidence, 85);
        assert_eq!(s.proposed_analysis.analysis_type, AnalysisType::TTest);
        assert_eq!(s.proposed_analysis.predictor.as_ref().unwrap().id, "arm");
        assert_eq!(s.proposed_analysis.parameters.alpha, Some(0.05));
        assert_eq!(
            s.description,
            "Compare Systolic BP across Treatment Arm groups using Independent Samples T-Test."
        );
        assert_eq!(s.grounding.regulatory_reference.as_deref(), Some("ICH E9 Section 5.2.3"));
    }

    #[test]
    fn test_secondary_rule_selects_per_outcome() {
        let context = trial_context(40).unwrap();
        let suggestions =
            EndpointAnalysisRule::secondary().apply(&context, &AdvisorConfig::default());
        let types: Vec<AnalysisType> = suggestions
            .iter()
            .map(|s| s.proposed_analysis.analysis_type)
            .collect();
        assert_eq!(types, vec![AnalysisType::ChiSquare, AnalysisType::TTest]);
        assert!(suggestions.iter().all(|s| s.priority == Priority::Recommended));
    }

    #[test]
    fn test_no_predictor_means_no_inferential_suggestions() {
        let mut context = trial_context(40).unwrap();
        context.schema.predictors.clear();
        assert!(EndpointAnalysisRule::primary()
            .apply(&context, &AdvisorConfig::default())
            .is_empty());
    }

    #[test]
    fn test_normality_rule_limits_checks() {
        let context = trial_context(40).unwrap();
        let suggestions = NormalityRule.apply(&context, &AdvisorConfig::default());
        let ids: Vec<&str> = suggestions.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["normality-check-sbp", "normality-check-weight"]);
        assert_eq!(suggestions[0].confidence, 95);
        assert_eq!(
            suggestions[0].proposed_analysis.method.name,
            "Shapiro-Wilk Normality Test"
        );

        let config = AdvisorConfig::builder().max_normality_checks(1).build().unwrap();
        assert_eq!(NormalityRule.apply(&context, &config).len(), 1);
    }
}
