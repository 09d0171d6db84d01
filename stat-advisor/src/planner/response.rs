//! Lenient parsing of generated plans and test recommendations.
//!
//! Generated text is rarely clean JSON. The first JSON object is taken from
//! the text (inside a code fence if there is one); within a plan every entry
//! is converted on its own and entries that do not fit are skipped. Only a
//! document without a usable object is an error.

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{AdvisorError, Result};
use crate::model::{
    AnalysisContext, AnalysisParameters, AnalysisType, DataType, ExpectedOutputs,
    FeasibilityResult, Grounding, MethodCategory, MultiplicityMethod, Priority, ProposedAnalysis,
    Role, StatisticalMethod, Suggestion, SuggestionSource, SuggestionStatus, SuggestionType, Tails,
    Variable,
};
use crate::selection::TestSelection;

const DEFAULT_PLAN_CONFIDENCE: u8 = 70;
const DEFAULT_RECOMMENDATION_CONFIDENCE: u8 = 80;
const RULE_BASED_RECOMMENDATION_CONFIDENCE: u8 = 85;

#[derive(Debug, Deserialize)]
struct RawPlan {
    suggestions: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSuggestion {
    suggestion_type: Option<String>,
    priority: Option<String>,
    title: Option<String>,
    description: Option<String>,
    rationale: Option<String>,
    auto_execute: Option<bool>,
    #[serde(default)]
    grounding: RawGrounding,
    proposed_analysis: RawAnalysis,
    expected_outputs: Option<RawOutputs>,
    feasibility_notes: Option<String>,
    confidence: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawGrounding {
    protocol_reference: Option<String>,
    regulatory_reference: Option<String>,
    literature_reference: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAnalysis {
    analysis_type: Option<String>,
    outcome_id: String,
    predictor_id: Option<String>,
    #[serde(default)]
    covariate_ids: Vec<String>,
    method: Option<RawMethod>,
    parameters: Option<RawParameters>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMethod {
    name: Option<String>,
    category: Option<String>,
    #[serde(default)]
    assumptions: Vec<String>,
    #[serde(default)]
    references: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawParameters {
    alpha: Option<f64>,
    tails: Option<String>,
    confidence_level: Option<f64>,
    paired_data: Option<bool>,
    equal_variances: Option<bool>,
    continuity_correction: Option<bool>,
    multiplicity_method: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOutputs {
    primary_statistic: Option<String>,
    effect_size_type: Option<String>,
    confidence_interval: Option<bool>,
    p_value: Option<bool>,
    visualization: Option<String>,
}

/// Parses a generated analysis plan into unreviewed suggestions.
///
/// Variables are placeholders carrying the ids the text used; pass the result
/// through [`bind_to_context`] before merging.
///
/// # Errors
///
/// Returns [`AdvisorError::ResponseParse`] when the text holds no JSON object
/// or the object has no `suggestions` array.
///
/// # Examples
///
/// ```rust
/// use stat_advisor::model::AnalysisType;
/// use stat_advisor::planner::parse_plan_response;
///
/// let fence = "`".repeat(3);
/// let plan = r#"{"suggestions": [{"proposedAnalysis": {"analysisType": "t-test", "outcomeId": "sbp"}}]}"#;
/// let text = format!("Here is the plan:\n{fence}json\n{plan}\n{fence}");
///
/// let suggestions = parse_plan_response(&text).unwrap();
/// assert_eq!(suggestions[0].proposed_analysis.analysis_type, AnalysisType::TTest);
/// ```
pub fn parse_plan_response(text: &str) -> Result<Vec<Suggestion>> {
    let plan: RawPlan = parse_document(text)?;
    let entries = plan
        .suggestions
        .ok_or_else(|| AdvisorError::response_parse("missing suggestions array"))?;

    let total = entries.len();
    let suggestions: Vec<Suggestion> = entries
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| match convert_entry(entry) {
            Ok(suggestion) => Some(suggestion),
            Err(reason) => {
                warn!(index, reason = %reason, "Skipping malformed plan entry");
                None
            }
        })
        .collect();

    debug!(total, parsed = suggestions.len(), "Parsed generated plan");
    Ok(suggestions)
}

fn convert_entry(entry: Value) -> std::result::Result<Suggestion, String> {
    let raw: RawSuggestion = serde_json::from_value(entry).map_err(|e| e.to_string())?;
    let analysis = raw.proposed_analysis;
    if analysis.outcome_id.trim().is_empty() {
        return Err("empty outcomeId".to_string());
    }

    let analysis_type = match analysis.analysis_type.as_deref() {
        Some(name) => name.parse::<AnalysisType>()?,
        None => AnalysisType::Descriptive,
    };

    let method = match analysis.method {
        Some(m) => {
            let default = analysis_type.default_method();
            StatisticalMethod {
                name: m.name.unwrap_or(default.name),
                category: m
                    .category
                    .as_deref()
                    .and_then(parse_wire::<MethodCategory>)
                    .unwrap_or(default.category),
                assumptions: if m.assumptions.is_empty() {
                    default.assumptions
                } else {
                    m.assumptions
                },
                references: m.references,
            }
        }
        None => analysis_type.default_method(),
    };

    let parameters = analysis
        .parameters
        .map(|p| AnalysisParameters {
            alpha: p.alpha,
            tails: p.tails.as_deref().and_then(parse_wire::<Tails>),
            confidence_level: p.confidence_level,
            paired: p.paired_data,
            equal_variances: p.equal_variances,
            continuity_correction: p.continuity_correction,
            multiplicity: p
                .multiplicity_method
                .as_deref()
                .and_then(parse_wire::<MultiplicityMethod>),
        })
        .unwrap_or_default();

    let mut outputs = ExpectedOutputs::for_type(analysis_type);
    if let Some(o) = raw.expected_outputs {
        if let Some(statistic) = o.primary_statistic {
            outputs.primary_statistic = statistic;
        }
        if o.effect_size_type.is_some() {
            outputs.effect_size = o.effect_size_type;
        }
        outputs.confidence_interval = o.confidence_interval.unwrap_or(outputs.confidence_interval);
        outputs.p_value = o.p_value.unwrap_or(outputs.p_value);
        if let Some(chart) = o.visualization.as_deref().and_then(parse_wire) {
            outputs.visualization = Some(chart);
        }
    }

    let mut proposed = ProposedAnalysis::new(
        format!("analysis-{analysis_type}-{}", analysis.outcome_id),
        analysis_type,
        Variable::new(&analysis.outcome_id, DataType::Continuous, Role::Outcome),
    )
    .with_method(method)
    .with_parameters(parameters);
    proposed.predictor = analysis
        .predictor_id
        .filter(|id| !id.trim().is_empty())
        .map(|id| Variable::new(id, DataType::Categorical, Role::Predictor));
    proposed.covariates = analysis
        .covariate_ids
        .iter()
        .map(|id| Variable::new(id, DataType::Continuous, Role::All))
        .collect();
    proposed.expected_outputs = outputs;
    proposed.blockers = raw.feasibility_notes.into_iter().collect();

    let grounding = Grounding {
        protocol_reference: raw.grounding.protocol_reference,
        schema_reference: schema_reference(&proposed),
        literature_reference: raw.grounding.literature_reference,
        regulatory_reference: raw.grounding.regulatory_reference,
    };

    Ok(Suggestion {
        id: drafted_id(&proposed),
        suggestion_type: raw
            .suggestion_type
            .as_deref()
            .and_then(parse_wire)
            .unwrap_or(SuggestionType::ExploratoryAnalysis),
        priority: raw
            .priority
            .as_deref()
            .and_then(parse_wire)
            .unwrap_or(Priority::Optional),
        title: raw.title.unwrap_or_else(|| "Unnamed Analysis".to_string()),
        description: raw.description.unwrap_or_default(),
        rationale: raw.rationale.unwrap_or_default(),
        grounding,
        feasibility: FeasibilityResult::unchecked(analysis_type),
        proposed_analysis: proposed,
        confidence: raw.confidence.map_or(DEFAULT_PLAN_CONFIDENCE, clamp_confidence),
        auto_execute: raw.auto_execute.unwrap_or(false),
        status: SuggestionStatus::Pending,
        source: SuggestionSource::Ai,
        created_at: Utc::now(),
        reviewed_at: None,
        reviewed_by: None,
        modification_notes: None,
        executed_at: None,
        execution_result: None,
    })
}

/// Re-binds drafted suggestions to the context's variables.
///
/// Each reference is matched against variable ids first, then names, then
/// labels. Suggestions whose outcome or named predictor matches nothing are
/// dropped; unmatched covariates are removed.
pub fn bind_to_context(suggestions: Vec<Suggestion>, context: &AnalysisContext) -> Vec<Suggestion> {
    let before = suggestions.len();
    let bound: Vec<Suggestion> = suggestions
        .into_iter()
        .filter_map(|mut suggestion| {
            let analysis = &mut suggestion.proposed_analysis;
            let Some(outcome) = lookup(context, &analysis.outcome.id) else {
                debug!(outcome = %analysis.outcome.id, "Dropping drafted suggestion with unknown outcome");
                return None;
            };
            analysis.outcome = outcome.clone();

            if let Some(predictor) = &analysis.predictor {
                let Some(found) = lookup(context, &predictor.id) else {
                    debug!(predictor = %predictor.id, "Dropping drafted suggestion with unknown predictor");
                    return None;
                };
                analysis.predictor = Some(found.clone());
            }

            analysis.covariates = analysis
                .covariates
                .iter()
                .filter_map(|c| lookup(context, &c.id).cloned())
                .collect();

            analysis.analysis_id =
                format!("analysis-{}-{}", analysis.analysis_type, analysis.outcome.id);
            suggestion.grounding.schema_reference = schema_reference(&suggestion.proposed_analysis);
            suggestion.id = drafted_id(&suggestion.proposed_analysis);
            Some(suggestion)
        })
        .collect();

    debug!(before, after = bound.len(), "Bound drafted suggestions to context");
    bound
}

fn lookup<'a>(context: &'a AnalysisContext, reference: &str) -> Option<&'a Variable> {
    let variables = &context.schema.variables;
    variables
        .iter()
        .find(|v| v.id == reference)
        .or_else(|| variables.iter().find(|v| v.name == reference))
        .or_else(|| variables.iter().find(|v| v.label == reference))
}

fn schema_reference(analysis: &ProposedAnalysis) -> Vec<String> {
    std::iter::once(&analysis.outcome)
        .chain(analysis.predictor.as_ref())
        .chain(analysis.covariates.iter())
        .map(|v| v.id.clone())
        .collect()
}

fn drafted_id(analysis: &ProposedAnalysis) -> String {
    match &analysis.predictor {
        Some(p) => format!("ai-{}-{}-{}", analysis.analysis_type, analysis.outcome.id, p.id),
        None => format!("ai-{}-{}", analysis.analysis_type, analysis.outcome.id),
    }
}

/// Recommendation for a single predictor/outcome pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRecommendation {
    pub analysis_type: AnalysisType,
    pub method: StatisticalMethod,
    pub rationale: String,
    pub confidence: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternative: Option<AnalysisType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternative_rationale: Option<String>,
    pub source: SuggestionSource,
}

impl From<TestSelection> for TestRecommendation {
    fn from(selection: TestSelection) -> Self {
        Self {
            analysis_type: selection.analysis_type,
            method: selection.method,
            rationale: selection.rationale,
            confidence: RULE_BASED_RECOMMENDATION_CONFIDENCE,
            alternative: None,
            alternative_rationale: None,
            source: SuggestionSource::RuleBased,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawRecommendationDocument {
    recommendation: Option<RawRecommendation>,
    confidence: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRecommendation {
    analysis_type: String,
    method: Option<RawMethod>,
    rationale: Option<String>,
    alternative_test: Option<String>,
    alternative_rationale: Option<String>,
}

/// Parses a generated single-test recommendation.
///
/// # Errors
///
/// Returns [`AdvisorError::ResponseParse`] when the text has no
/// `recommendation` object or names an unknown analysis type.
pub fn parse_test_recommendation(text: &str) -> Result<TestRecommendation> {
    let document: RawRecommendationDocument = parse_document(text)?;
    let raw = document
        .recommendation
        .ok_or_else(|| AdvisorError::response_parse("missing recommendation object"))?;
    let analysis_type = raw
        .analysis_type
        .parse::<AnalysisType>()
        .map_err(AdvisorError::response_parse)?;

    let default = analysis_type.default_method();
    let method = match raw.method {
        Some(m) => StatisticalMethod {
            name: m.name.unwrap_or(default.name),
            category: m
                .category
                .as_deref()
                .and_then(parse_wire)
                .unwrap_or(default.category),
            assumptions: m.assumptions,
            references: m.references,
        },
        None => default,
    };

    Ok(TestRecommendation {
        analysis_type,
        method,
        rationale: raw.rationale.unwrap_or_default(),
        confidence: document
            .confidence
            .map_or(DEFAULT_RECOMMENDATION_CONFIDENCE, clamp_confidence),
        alternative: raw
            .alternative_test
            .as_deref()
            .and_then(|t| t.parse::<AnalysisType>().ok()),
        alternative_rationale: raw.alternative_rationale,
        source: SuggestionSource::Ai,
    })
}

fn parse_document<T: DeserializeOwned>(text: &str) -> Result<T> {
    let json = extract_json(text)
        .ok_or_else(|| AdvisorError::response_parse("no JSON object found in response"))?;
    serde_json::from_str(json).map_err(|e| AdvisorError::response_parse(e.to_string()))
}

/// First JSON object in the text, looking inside a code fence first.
fn extract_json(text: &str) -> Option<&str> {
    let body = fenced_block(text).unwrap_or(text);
    let start = body.find('{')?;
    let end = body.rfind('}')?;
    (end > start).then(|| &body[start..=end])
}

fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after = &text[open + 3..];
    let body_start = after.find('\n').map_or(0, |i| i + 1);
    let body = &after[body_start..];
    let close = body.find("```")?;
    Some(&body[..close])
}

fn parse_wire<T: DeserializeOwned>(value: &str) -> Option<T> {
    serde_json::from_value(Value::String(value.trim().to_lowercase())).ok()
}

fn clamp_confidence(value: f64) -> u8 {
    if value.is_finite() {
        value.round().clamp(0.0, 100.0) as u8
    } else {
        0
    }
}
