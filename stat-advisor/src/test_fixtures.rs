//! Shared fixtures for unit tests and, behind the `test-utils` feature, downstream test suites.
//!
//! The trial fixtures describe a small two-arm study: a categorical treatment
//! arm and a continuous age as predictors, systolic blood pressure as the
//! primary endpoint, and a binary response plus body weight as secondary
//! endpoints.

use std::collections::BTreeMap;

use crate::config::AdvisorConfig;
use crate::context::ContextBuilder;
use crate::error::Result;
use crate::model::{
    AnalysisContext, AnalysisType, ContinuousSummary, DataContext, DataType,
    DistributionSummary, EndpointTier, MissingDataSummary, ProposedAnalysis, ProtocolContent,
    ProtocolContext, ProtocolMetadata, ProtocolVersion, Record, RecordStatus, Role,
    SchemaContext, SchemaNode, StudyDesign, Variable, VariableKind,
};

/// A context with `completed` complete records and no variables.
pub fn context_with_records(completed: usize) -> AnalysisContext {
    AnalysisContext {
        protocol: ProtocolContext {
            pico: Default::default(),
            study_design: StudyDesign::Rct,
            study_phase: None,
            primary_objective: None,
            secondary_objectives: Vec::new(),
            statistical_plan: None,
        },
        schema: SchemaContext::default(),
        data: DataContext {
            total_records: completed,
            completed_records: completed,
            distributions: BTreeMap::new(),
            missing_data: MissingDataSummary::default(),
            group_sizes: None,
        },
        literature: None,
    }
}

/// A continuous distribution with the given counts and normality verdict.
pub fn continuous_distribution(n: usize, missing: usize, is_normal: bool) -> DistributionSummary {
    DistributionSummary {
        n,
        missing,
        continuous: (n > missing).then_some(ContinuousSummary {
            mean: 10.0,
            sd: 2.0,
            median: 10.0,
            iqr: (8.5, 11.5),
            min: 5.0,
            max: 15.0,
            is_normal,
            skewness: if is_normal { 0.2 } else { 1.8 },
        }),
        ..DistributionSummary::empty(VariableKind::Continuous)
    }
}

pub fn continuous_variable(id: &str, role: Role) -> Variable {
    Variable::new(id, DataType::Continuous, role)
}

pub fn categorical_variable(id: &str, categories: &[&str]) -> Variable {
    let mut variable = Variable::new(id, DataType::Categorical, Role::Outcome);
    variable.options = Some(categories.iter().map(|c| c.to_string()).collect());
    variable
}

/// An analysis of the continuous variable `outcome` without a predictor.
pub fn proposed(analysis_type: AnalysisType) -> ProposedAnalysis {
    ProposedAnalysis::new(
        format!("analysis-{analysis_type}-outcome"),
        analysis_type,
        continuous_variable("outcome", Role::Outcome),
    )
}

/// Like [`proposed`], with the boolean predictor `arm`.
pub fn proposed_with_predictor(analysis_type: AnalysisType) -> ProposedAnalysis {
    proposed(analysis_type).with_predictor(Variable::new("arm", DataType::Boolean, Role::Predictor))
}

pub fn trial_protocol() -> ProtocolVersion {
    ProtocolVersion {
        id: Some("protocol-1".into()),
        metadata: ProtocolMetadata {
            title: Some("Drug versus placebo in stage 1 hypertension".into()),
            study_design: Some("RCT".into()),
            study_phase: Some("Phase III".into()),
        },
        protocol_content: ProtocolContent {
            primary_objective: Some("Reduce systolic blood pressure at week 12".into()),
            secondary_objectives: Some("- Response rate\n- Change in body weight".into()),
            statistical_plan: None,
        },
    }
}

pub fn trial_schema() -> Vec<SchemaNode> {
    vec![
        SchemaNode::new("enrollment", DataType::Text, Role::Structure)
            .with_child(
                SchemaNode::new("arm", DataType::Categorical, Role::Predictor)
                    .with_name("Treatment Arm")
                    .with_options(["Drug", "Placebo"]),
            )
            .with_child(
                SchemaNode::new("age", DataType::Continuous, Role::Predictor)
                    .with_name("Age")
                    .with_unit("years"),
            ),
        SchemaNode::new("outcomes", DataType::Text, Role::Structure)
            .with_child(
                SchemaNode::new("sbp", DataType::Continuous, Role::Outcome)
                    .with_name("Systolic BP")
                    .with_unit("mmHg")
                    .with_tier(EndpointTier::Primary),
            )
            .with_child(
                SchemaNode::new("response", DataType::Boolean, Role::Outcome)
                    .with_name("Responder")
                    .with_tier(EndpointTier::Secondary),
            )
            .with_child(
                SchemaNode::new("weight", DataType::Continuous, Role::Outcome)
                    .with_name("Body Weight")
                    .with_unit("kg")
                    .with_tier(EndpointTier::Secondary),
            ),
    ]
}

/// `completed` deterministic complete records plus one draft record.
///
/// Systolic BP is read through the snake_case form of its name.
pub fn trial_records(completed: usize) -> Vec<Record> {
    let mut records: Vec<Record> = (0..completed)
        .map(|i| {
            let drug = i % 2 == 0;
            let offset = ((i * 7) % 13) as f64;
            let mut record = Record::complete()
                .with_field("enrollment", "arm", if drug { "Drug" } else { "Placebo" })
                .with_field("enrollment", "age", 40 + ((i * 11) % 30))
                .with_field("vitals", "systolic_bp", (if drug { 128.0 } else { 136.0 }) + offset)
                .with_field("outcomes", "response", i % 3 == 0 || (drug && i % 4 == 0))
                .with_field("outcomes", "weight", 70.0 + ((i * 5) % 17) as f64);
            record.id = Some(format!("subject-{i:03}"));
            record
        })
        .collect();
    records.push(Record::new(RecordStatus::Draft).with_field("vitals", "systolic_bp", 400));
    records
}

/// Context for the trial fixture built with the default configuration.
pub fn trial_context(completed: usize) -> Result<AnalysisContext> {
    trial_context_with(AdvisorConfig::default(), completed)
}

pub fn trial_context_with(config: AdvisorConfig, completed: usize) -> Result<AnalysisContext> {
    ContextBuilder::new(config)
        .build(
            &trial_protocol(),
            &trial_schema(),
            &trial_records(completed),
            None,
            None,
        )
        .map(|built| built.context)
}
