//! Assembles an [`AnalysisContext`] from protocol metadata, schema and records.

use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, instrument};

use super::distribution::summarize;
use super::literature::summarize_papers;
use super::resolver::{FieldKeys, FieldResolver, ResolutionDiagnostics};
use crate::config::AdvisorConfig;
use crate::error::{AdvisorError, Result};
use crate::log_resolution;
use crate::logging::LogConfig;
use crate::model::{
    AnalysisContext, DataContext, DataType, DistributionSummary, EndpointTier,
    FoundationalPaper, MethodHint, MissingCount, MissingDataSummary, MissingPattern, Pico,
    ProtocolContext, ProtocolVersion, Record, Role, SchemaContext, SchemaNode, StudyDesign,
    Variable,
};

/// Overall missing rate (percent) under which data is labelled MCAR.
const MCAR_THRESHOLD_PERCENT: f64 = 5.0;

/// A freshly built context together with the field-resolution report.
#[derive(Debug, Clone)]
pub struct BuiltContext {
    pub context: AnalysisContext,
    pub diagnostics: ResolutionDiagnostics,
}

/// Builds analysis contexts. Each call to [`build`](Self::build) is a pure
/// function of its inputs.
///
/// # Examples
///
/// ```rust
/// use stat_advisor::config::AdvisorConfig;
/// use stat_advisor::context::ContextBuilder;
/// use stat_advisor::model::{DataType, ProtocolVersion, Record, Role, SchemaNode};
///
/// let schema = vec![SchemaNode::new("sbp", DataType::Continuous, Role::Outcome)];
/// let records = vec![
///     Record::complete().with_field("vitals", "sbp", 120),
///     Record::complete().with_field("vitals", "sbp", 128),
/// ];
///
/// let built = ContextBuilder::new(AdvisorConfig::default())
///     .build(&ProtocolVersion::default(), &schema, &records, None, None)
///     .unwrap();
/// assert_eq!(built.context.data.completed_records, 2);
/// assert_eq!(built.context.distribution("sbp").unwrap().n, 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ContextBuilder {
    config: AdvisorConfig,
    log_config: LogConfig,
}

impl ContextBuilder {
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

    pub fn config(&self) -> &AdvisorConfig {
        &self.config
    }

    /// Builds the context.
    ///
    /// Fails only on a malformed schema. Unresolvable variables get empty
    /// distributions and are listed in the diagnostics.
    #[instrument(skip_all, fields(nodes = schema.len(), records = records.len()))]
    pub fn build(
        &self,
        protocol: &ProtocolVersion,
        schema: &[SchemaNode],
        records: &[Record],
        papers: Option<&[FoundationalPaper]>,
        pico: Option<&Pico>,
    ) -> Result<BuiltContext> {
        let mut variables = flatten_schema(schema)?;
        let completed: Vec<&Record> = records.iter().filter(|r| r.is_complete()).collect();

        let resolver = FieldResolver::new(&self.config.resolution);
        let mut diagnostics = ResolutionDiagnostics::default();
        let mut distributions = BTreeMap::new();

        for variable in &mut variables {
            let summary = self.summarize_variable(variable, &completed, &resolver, &mut diagnostics);
            variable.has_data = summary.n > 0;
            variable.completeness = if summary.n == 0 {
                0.0
            } else {
                (summary.n - summary.missing) as f64 / summary.n as f64
            };
            variable.distribution = Some(summary.clone());
            distributions.insert(variable.id.clone(), summary);
        }

        let missing_data = missing_data_summary(&distributions);
        let group_sizes = group_sizes(&variables, &distributions);
        let literature = papers
            .filter(|p| self.config.enable_literature_grounding && !p.is_empty())
            .map(summarize_papers);

        info!(
            variables = variables.len(),
            total_records = records.len(),
            completed_records = completed.len(),
            unresolved = diagnostics.unresolved.len(),
            ambiguous = diagnostics.ambiguous_total,
            "Built analysis context"
        );

        let context = AnalysisContext {
            protocol: protocol_context(protocol, pico),
            schema: group_variables(variables),
            data: DataContext {
                total_records: records.len(),
                completed_records: completed.len(),
                distributions,
                missing_data,
                group_sizes,
            },
            literature,
        };

        Ok(BuiltContext {
            context,
            diagnostics,
        })
    }

    fn summarize_variable(
        &self,
        variable: &Variable,
        records: &[&Record],
        resolver: &FieldResolver<'_>,
        diagnostics: &mut ResolutionDiagnostics,
    ) -> DistributionSummary {
        let keys = FieldKeys::for_variable(variable, &self.config.resolution);
        let mut values = Vec::with_capacity(records.len());
        let mut logged = false;

        for record in records {
            let (hit, ambiguities) = resolver.resolve(&keys, record);
            if !ambiguities.is_empty() {
                debug!(
                    variable = %variable.id,
                    count = ambiguities.len(),
                    "Variable matched in more than one table"
                );
                diagnostics.record_ambiguities(ambiguities, self.config.resolution.max_reported_ambiguities);
            }
            if let Some(hit) = hit {
                if !logged {
                    log_resolution!(
                        self.log_config,
                        variable = %variable.id,
                        table = hit.table,
                        field = hit.field,
                        strategy = hit.strategy.as_str(),
                        "Resolved variable"
                    );
                    logged = true;
                }
                diagnostics.record_hit(&variable.id, &hit);
                values.push(hit.value);
            }
        }

        if values.is_empty() && !records.is_empty() {
            log_resolution!(self.log_config, variable = %variable.id, "Variable not found in any record");
            diagnostics.record_unresolved(&variable.id);
        }

        summarize(
            variable.data_type,
            variable.analysis_method,
            variable.options.as_ref().map(Vec::len),
            &values,
        )
    }
}

/// Flattens the schema tree depth-first.
///
/// Structure nodes only group their children and do not become variables.
/// Every other node needs a non-empty, unique id.
pub fn flatten_schema(nodes: &[SchemaNode]) -> Result<Vec<Variable>> {
    let mut variables = Vec::new();
    let mut seen = HashSet::new();
    flatten_into(nodes, "", &mut variables, &mut seen)?;
    Ok(variables)
}

fn flatten_into(
    nodes: &[SchemaNode],
    parent: &str,
    out: &mut Vec<Variable>,
    seen: &mut HashSet<String>,
) -> Result<()> {
    for (index, node) in nodes.iter().enumerate() {
        let id = node.id.trim();
        let segment = if id.is_empty() { format!("[{index}]") } else { id.to_string() };
        let path = if parent.is_empty() {
            segment
        } else {
            format!("{parent}.{segment}")
        };

        if node.role != Role::Structure {
            if id.is_empty() {
                return Err(AdvisorError::malformed_schema(path, "variable has no id"));
            }
            if !seen.insert(id.to_string()) {
                return Err(AdvisorError::DuplicateVariable { id: id.to_string() });
            }
            out.push(to_variable(node, id, &path));
        }

        flatten_into(&node.children, &path, out, seen)?;
    }
    Ok(())
}

fn to_variable(node: &SchemaNode, id: &str, path: &str) -> Variable {
    let name = non_empty(node.name.as_deref()).unwrap_or(id).to_string();
    let label = non_empty(node.custom_name.as_deref())
        .unwrap_or(&name)
        .to_string();
    Variable {
        id: id.to_string(),
        name,
        label,
        path: path.to_string(),
        data_type: node.data_type,
        role: node.role,
        endpoint_tier: node.endpoint_tier,
        analysis_method: node.analysis_method,
        unit: node.unit.clone(),
        options: node.options.clone().filter(|o| !o.is_empty()),
        has_data: false,
        completeness: 0.0,
        distribution: None,
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn group_variables(variables: Vec<Variable>) -> SchemaContext {
    let having_role = |roles: &[Role]| -> Vec<Variable> {
        variables
            .iter()
            .filter(|v| roles.contains(&v.role))
            .cloned()
            .collect()
    };
    let in_tier = |tier: EndpointTier| -> Vec<Variable> {
        variables
            .iter()
            .filter(|v| v.endpoint_tier == Some(tier))
            .cloned()
            .collect()
    };

    SchemaContext {
        predictors: having_role(&[Role::Predictor, Role::All]),
        outcomes: having_role(&[Role::Outcome, Role::All]),
        primary_endpoints: in_tier(EndpointTier::Primary),
        secondary_endpoints: in_tier(EndpointTier::Secondary),
        exploratory_endpoints: in_tier(EndpointTier::Exploratory),
        variables,
    }
}

fn protocol_context(protocol: &ProtocolVersion, overrides: Option<&Pico>) -> ProtocolContext {
    let metadata = &protocol.metadata;
    let content = &protocol.protocol_content;

    let study_design = non_empty(metadata.study_design.as_deref())
        .or_else(|| non_empty(metadata.study_phase.as_deref()))
        .and_then(|s| s.parse::<StudyDesign>().ok())
        .unwrap_or_default();

    let mut pico = Pico {
        outcome: content.primary_objective.clone().unwrap_or_default(),
        ..Default::default()
    };
    if let Some(overrides) = overrides {
        pico.overlay(overrides);
    }

    let secondary_objectives = content
        .secondary_objectives
        .as_deref()
        .map(split_objectives)
        .unwrap_or_default();

    ProtocolContext {
        pico,
        study_design,
        study_phase: metadata.study_phase.clone(),
        primary_objective: content.primary_objective.clone(),
        secondary_objectives,
        statistical_plan: content.statistical_plan.clone(),
    }
}

/// Splits a free-text objectives block into one entry per line, without
/// list markers.
fn split_objectives(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| {
            line.trim()
                .trim_start_matches(|c: char| {
                    c.is_ascii_digit() || matches!(c, '-' | '*' | '•' | '.' | ')')
                })
                .trim()
        })
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

fn missing_data_summary(distributions: &BTreeMap<String, DistributionSummary>) -> MissingDataSummary {
    let (cells, missing) = distributions
        .values()
        .fold((0usize, 0usize), |(n, m), d| (n + d.n, m + d.missing));
    let overall_missing_rate = if cells == 0 {
        0.0
    } else {
        missing as f64 / cells as f64 * 100.0
    };

    let by_variable = distributions
        .iter()
        .map(|(id, d)| {
            (
                id.clone(),
                MissingCount {
                    count: d.missing,
                    percentage: d.missing_rate() * 100.0,
                },
            )
        })
        .collect();

    let (pattern, pattern_confidence) = if overall_missing_rate < MCAR_THRESHOLD_PERCENT {
        (MissingPattern::Mcar, 0.8)
    } else {
        (MissingPattern::Unknown, 0.3)
    };

    MissingDataSummary {
        overall_missing_rate,
        by_variable,
        pattern,
        pattern_confidence,
    }
}

/// Group sizes of the first label-valued predictor, `None` when it has no observed categories.
fn group_sizes(
    variables: &[Variable],
    distributions: &BTreeMap<String, DistributionSummary>,
) -> Option<BTreeMap<String, usize>> {
    variables
        .iter()
        .filter(|v| matches!(v.role, Role::Predictor | Role::All))
        .filter(|v| v.analysis_method != Some(MethodHint::Survival))
        .find(|v| v.data_type == DataType::Boolean || v.data_type.is_label_like())
        .and_then(|v| distributions.get(&v.id))
        .and_then(|d| d.categorical.as_ref())
        .filter(|c| !c.frequencies.is_empty())
        .map(|c| c.frequencies.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResolutionConfig;
    use crate::model::{ProtocolContent, ProtocolMetadata, RecordStatus, VariableKind};

    fn schema() -> Vec<SchemaNode> {
        vec![
            SchemaNode::new("arm", DataType::Categorical, Role::Predictor)
                .with_name("Treatment Arm")
                .with_options(["A", "B"]),
            SchemaNode::new("demographics", DataType::Text, Role::Structure).with_child(
                SchemaNode::new("sbp", DataType::Continuous, Role::Outcome)
                    .with_name("Systolic BP")
                    .with_custom_name("Systolic blood pressure")
                    .with_tier(EndpointTier::Primary),
            ),
        ]
    }

    fn records() -> Vec<Record> {
        vec![
            Record::complete()
                .with_field("enrol", "arm", "A")
                .with_field("vitals", "systolic_bp", 120),
            Record::complete()
                .with_field("enrol", "Treatment Arm", "B")
                .with_field("vitals", "sbp", ""),
            Record::complete().with_field("enrol", "arm", "A"),
            Record::new(RecordStatus::Draft).with_field("vitals", "sbp", 999),
        ]
    }

    fn build(records: &[Record]) -> BuiltContext {
        ContextBuilder::default()
            .build(&ProtocolVersion::default(), &schema(), records, None, None)
            .unwrap()
    }

    #[test]
    fn test_flatten_keeps_paths_and_skips_structure() {
        let variables = flatten_schema(&schema()).unwrap();
        let ids: Vec<&str> = variables.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["arm", "sbp"]);
        assert_eq!(variables[1].path, "demographics.sbp");
        assert_eq!(variables[1].label, "Systolic blood pressure");
        assert_eq!(variables[0].label, "Treatment Arm");
    }

    #[test]
    fn test_missing_id_is_malformed() {
        let nodes = vec![SchemaNode::new("group", DataType::Text, Role::Structure)
            .with_child(SchemaNode::new("", DataType::Continuous, Role::Outcome))];
        let err = flatten_schema(&nodes).unwrap_err();
        assert!(matches!(
            err,
            AdvisorError::MalformedSchema { ref path, .. } if path == "group.[0]"
        ));
    }

    #[test]
    fn test_duplicate_id_is_rejected() {
        let nodes = vec![
            SchemaNode::new("x", DataType::Continuous, Role::Outcome),
            SchemaNode::new("x", DataType::Boolean, Role::Predictor),
        ];
        assert!(matches!(
            flatten_schema(&nodes),
            Err(AdvisorError::DuplicateVariable { .. })
        ));
    }

    #[test]
    fn test_only_complete_records_feed_distributions() {
        let built = build(&records());
        let data = &built.context.data;
        assert_eq!(data.total_records, 4);
        assert_eq!(data.completed_records, 3);

        let sbp = &data.distributions["sbp"];
        assert_eq!(sbp.n, 2);
        assert_eq!(sbp.missing, 1);
        assert_eq!(sbp.continuous.as_ref().unwrap().mean, 120.0);

        let variable = built.context.variable("sbp").unwrap();
        assert!(variable.has_data);
        assert!((variable.completeness - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_groupings_and_group_sizes() {
        let built = build(&records());
        let schema = &built.context.schema;
        assert_eq!(schema.predictors.len(), 1);
        assert_eq!(schema.primary_endpoints[0].id, "sbp");
        assert_eq!(
            built.context.distribution("arm").map(|d| d.kind),
            Some(VariableKind::Binary)
        );

        let groups = built.context.data.group_sizes.as_ref().unwrap();
        assert_eq!(groups["A"], 2);
        assert_eq!(groups["B"], 1);
    }

    #[test]
    fn test_group_sizes_never_skip_the_first_predictor() {
        let schema = vec![
            SchemaNode::new("arm", DataType::Categorical, Role::Predictor),
            SchemaNode::new("site", DataType::Categorical, Role::Predictor),
            SchemaNode::new("sbp", DataType::Continuous, Role::Outcome)
                .with_tier(EndpointTier::Primary),
        ];
        let records: Vec<Record> = (0..33)
            .map(|i| {
                Record::complete()
                    .with_field("enrol", "site", if i < 3 { "X" } else { "Y" })
                    .with_field("vitals", "sbp", 120 + i % 7)
            })
            .collect();
        let built = ContextBuilder::default()
            .build(&ProtocolVersion::default(), &schema, &records, None, None)
            .unwrap();

        assert_eq!(built.context.distribution("site").map(|d| d.n), Some(33));
        // arm has no values, so site's imbalance must not stand in for it
        assert!(built.context.data.group_sizes.is_none());
    }

    #[test]
    fn test_diagnostics_report_first_resolution() {
        let built = build(&records());
        let first = built.diagnostics.first_resolved.unwrap();
        assert_eq!(first.variable_id, "arm");
        assert_eq!(first.table, "enrol");
        assert_eq!(built.diagnostics.strategy_hits["name"], 1);
        assert!(built.diagnostics.unresolved.is_empty());
    }

    #[test]
    fn test_unresolved_variable_yields_empty_distribution() {
        let records = vec![Record::complete().with_field("t", "other", 1)];
        let built = build(&records);
        assert_eq!(built.diagnostics.first_unresolved.as_deref(), Some("arm"));
        assert_eq!(built.diagnostics.unresolved, vec!["arm", "sbp"]);
        assert_eq!(built.context.data.distributions["sbp"].n, 0);
        assert!(!built.context.variable("sbp").unwrap().has_data);
    }

    #[test]
    fn test_no_records() {
        let built = build(&[]);
        assert_eq!(built.context.data.total_records, 0);
        assert!(built.context.data.group_sizes.is_none());
        assert_eq!(built.context.data.missing_data.pattern, MissingPattern::Mcar);
        assert!(built.diagnostics.unresolved.is_empty());
    }

    #[test]
    fn test_missing_summary_pattern() {
        let built = build(&records());
        let missing = &built.context.data.missing_data;
        // 1 empty of 5 resolved cells
        assert!((missing.overall_missing_rate - 20.0).abs() < 1e-9);
        assert_eq!(missing.pattern, MissingPattern::Unknown);
        assert_eq!(missing.pattern_confidence, 0.3);
        assert_eq!(missing.by_variable["sbp"].count, 1);
    }

    #[test]
    fn test_ambiguous_tables_are_flagged() {
        let records = vec![Record::complete()
            .with_field("baseline", "sbp", 120)
            .with_field("followup", "sbp", 140)];
        let built = build(&records);
        assert_eq!(built.diagnostics.ambiguous_total, 1);
        assert_eq!(built.context.data.distributions["sbp"].continuous.as_ref().unwrap().mean, 120.0);

        let quiet = ContextBuilder::new(AdvisorConfig {
            resolution: ResolutionConfig::default().with_flag_ambiguous(false),
            ..Default::default()
        })
        .build(&ProtocolVersion::default(), &schema(), &records, None, None)
        .unwrap();
        assert!(!quiet.diagnostics.has_ambiguities());
    }

    #[test]
    fn test_protocol_context() {
        let protocol = ProtocolVersion {
            id: Some("p1".into()),
            metadata: ProtocolMetadata {
                study_design: Some("Prospective Cohort".into()),
                ..Default::default()
            },
            protocol_content: ProtocolContent {
                primary_objective: Some("Reduce systolic BP".into()),
                secondary_objectives: Some("1. Safety\n- Tolerability\n\n".into()),
                statistical_plan: None,
            },
        };
        let overrides = Pico {
            population: "Adults with hypertension".into(),
            ..Default::default()
        };
        let built = ContextBuilder::default()
            .build(&protocol, &schema(), &[], None, Some(&overrides))
            .unwrap();
        let ctx = &built.context.protocol;
        assert_eq!(ctx.study_design, StudyDesign::Cohort);
        assert_eq!(ctx.pico.outcome, "Reduce systolic BP");
        assert_eq!(ctx.pico.population, "Adults with hypertension");
        assert_eq!(ctx.secondary_objectives, vec!["Safety", "Tolerability"]);
    }

    #[test]
    fn test_design_defaults_to_rct() {
        let built = build(&[]);
        assert_eq!(built.context.protocol.study_design, StudyDesign::Rct);
    }

    #[test]
    fn test_literature_respects_config() {
        let papers = vec![FoundationalPaper {
            title: "Trial".into(),
            study_design: Some("RCT".into()),
            ..Default::default()
        }];
        let with = ContextBuilder::default()
            .build(&ProtocolVersion::default(), &schema(), &[], Some(&papers), None)
            .unwrap();
        assert!(with.context.literature.is_some());

        let without = ContextBuilder::new(
            AdvisorConfig::builder()
                .enable_literature_grounding(false)
                .build()
                .unwrap(),
        )
        .build(&ProtocolVersion::default(), &schema(), &[], Some(&papers), None)
        .unwrap();
        assert!(without.context.literature.is_none());
    }
}
