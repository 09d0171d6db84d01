//! The immutable analysis context shared by every decision component.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::protocol::{Pico, StudyDesign};
use super::variable::{DistributionSummary, Variable};

/// Everything the engine knows about one protocol at one point in time.
///
/// Built by [`ContextBuilder`](crate::context::ContextBuilder) and never
/// mutated afterwards; a data refresh produces a new context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisContext {
    pub protocol: ProtocolContext,
    pub schema: SchemaContext,
    pub data: DataContext,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub literature: Option<LiteratureContext>,
}

impl AnalysisContext {
    /// Looks a variable up by id.
    pub fn variable(&self, id: &str) -> Option<&Variable> {
        self.schema.variables.iter().find(|v| v.id == id)
    }

    /// Observed distribution of a variable, if the variable exists.
    pub fn distribution(&self, id: &str) -> Option<&DistributionSummary> {
        self.data.distributions.get(id)
    }

    /// Number of variables in the schema.
    pub fn variable_count(&self) -> usize {
        self.schema.variables.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolContext {
    pub pico: Pico,
    pub study_design: StudyDesign,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub study_phase: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_objective: Option<String>,
    #[serde(default)]
    pub secondary_objectives: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistical_plan: Option<String>,
}

/// Schema variables plus convenience groupings, all in depth-first order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaContext {
    pub variables: Vec<Variable>,
    pub predictors: Vec<Variable>,
    pub outcomes: Vec<Variable>,
    pub primary_endpoints: Vec<Variable>,
    pub secondary_endpoints: Vec<Variable>,
    pub exploratory_endpoints: Vec<Variable>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataContext {
    pub total_records: usize,
    pub completed_records: usize,
    /// Distribution per variable id
    pub distributions: BTreeMap<String, DistributionSummary>,
    pub missing_data: MissingDataSummary,
    /// Group sizes of the first label-valued predictor, if any was observed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_sizes: Option<BTreeMap<String, usize>>,
}

/// Pattern label for the missing-data mechanism.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MissingPattern {
    #[serde(rename = "MCAR")]
    Mcar,
    #[serde(rename = "MAR")]
    Mar,
    #[serde(rename = "MNAR")]
    Mnar,
    #[serde(rename = "unknown")]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingDataSummary {
    /// Percentage of resolved cells that were empty
    pub overall_missing_rate: f64,
    pub by_variable: BTreeMap<String, MissingCount>,
    pub pattern: MissingPattern,
    pub pattern_confidence: f64,
}

impl Default for MissingDataSummary {
    fn default() -> Self {
        Self {
            overall_missing_rate: 0.0,
            by_variable: BTreeMap::new(),
            pattern: MissingPattern::Mcar,
            pattern_confidence: 0.8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingCount {
    pub count: usize,
    pub percentage: f64,
}

/// Statistical approaches found in the protocol's foundational papers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiteratureContext {
    pub papers: Vec<PaperSummary>,
    pub common_approaches: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synthesized_methods: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaperSummary {
    pub title: String,
    pub authors: String,
    pub year: String,
    pub statistical_methods: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_endpoint: Option<String>,
}
