//! Schema variables and their observed distributions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Declared data type of a schema variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Continuous,
    Categorical,
    Boolean,
    Text,
    #[serde(rename = "Multi-Select", alias = "MultiSelect")]
    MultiSelect,
    /// Any data type string this engine does not know about.
    #[serde(other)]
    Unknown,
}

impl DataType {
    /// Returns true for the types whose values are labels rather than numbers.
    pub fn is_label_like(&self) -> bool {
        matches!(
            self,
            DataType::Categorical | DataType::Text | DataType::MultiSelect
        )
    }

    /// Returns the wire name of the data type.
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Continuous => "Continuous",
            DataType::Categorical => "Categorical",
            DataType::Boolean => "Boolean",
            DataType::Text => "Text",
            DataType::MultiSelect => "Multi-Select",
            DataType::Unknown => "Unknown",
        }
    }
}

/// Role a variable plays in the study design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Predictor,
    Outcome,
    Structure,
    All,
}

/// Endpoint tier of an outcome variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointTier {
    Primary,
    Secondary,
    Exploratory,
}

impl EndpointTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointTier::Primary => "primary",
            EndpointTier::Secondary => "secondary",
            EndpointTier::Exploratory => "exploratory",
        }
    }
}

/// Analysis method hint attached to a variable by the protocol author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MethodHint {
    Survival,
    Frequency,
    MeanComparison,
    NonParametric,
    ChiSquare,
    #[serde(other)]
    Other,
}

/// Statistical kind of a variable, as used by test selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VariableKind {
    Continuous,
    Categorical,
    Binary,
    TimeToEvent,
}

impl VariableKind {
    /// Returns true for kinds summarised by frequencies rather than moments.
    pub fn is_categorical_like(&self) -> bool {
        matches!(self, VariableKind::Categorical | VariableKind::Binary)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VariableKind::Continuous => "continuous",
            VariableKind::Categorical => "categorical",
            VariableKind::Binary => "binary",
            VariableKind::TimeToEvent => "time-to-event",
        }
    }
}

impl std::fmt::Display for VariableKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node of the protocol's schema tree, as supplied by the persistence layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaNode {
    #[serde(default)]
    pub id: String,
    /// Declared variable name, used as a field key fallback
    #[serde(default)]
    pub name: Option<String>,
    /// Author-facing display name
    #[serde(default)]
    pub custom_name: Option<String>,
    pub data_type: DataType,
    pub role: Role,
    #[serde(default)]
    pub endpoint_tier: Option<EndpointTier>,
    #[serde(default)]
    pub analysis_method: Option<MethodHint>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub children: Vec<SchemaNode>,
}

impl SchemaNode {
    /// Creates a leaf node with the given id, data type and role.
    pub fn new(id: impl Into<String>, data_type: DataType, role: Role) -> Self {
        Self {
            id: id.into(),
            name: None,
            custom_name: None,
            data_type,
            role,
            endpoint_tier: None,
            analysis_method: None,
            unit: None,
            options: None,
            children: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_custom_name(mut self, name: impl Into<String>) -> Self {
        self.custom_name = Some(name.into());
        self
    }

    pub fn with_tier(mut self, tier: EndpointTier) -> Self {
        self.endpoint_tier = Some(tier);
        self
    }

    pub fn with_method(mut self, method: MethodHint) -> Self {
        self.analysis_method = Some(method);
        self
    }

    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = Some(options.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_child(mut self, child: SchemaNode) -> Self {
        self.children.push(child);
        self
    }
}

/// A flattened schema variable with its observed distribution.
///
/// Variables are immutable once placed in an
/// [`AnalysisContext`](crate::model::AnalysisContext); rebuilding the context
/// re-derives them from the source schema and records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    pub id: String,
    pub name: String,
    pub label: String,
    /// Dotted depth-first path of the node in the schema tree
    #[serde(default)]
    pub path: String,
    pub data_type: DataType,
    pub role: Role,
    #[serde(default)]
    pub endpoint_tier: Option<EndpointTier>,
    #[serde(default)]
    pub analysis_method: Option<MethodHint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub has_data: bool,
    /// Share of resolved values that are not missing, in `[0, 1]`
    #[serde(default)]
    pub completeness: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution: Option<DistributionSummary>,
}

impl Variable {
    /// Creates a variable without data. Mostly useful for tests and AI plans.
    pub fn new(id: impl Into<String>, data_type: DataType, role: Role) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            label: id.clone(),
            path: id.clone(),
            id,
            data_type,
            role,
            endpoint_tier: None,
            analysis_method: None,
            unit: None,
            options: None,
            has_data: false,
            completeness: 0.0,
            distribution: None,
        }
    }

    /// Normality verdict of the observed distribution, if one was computed.
    pub fn is_normal(&self) -> Option<bool> {
        self.distribution
            .as_ref()
            .and_then(|d| d.continuous.as_ref())
            .map(|c| c.is_normal)
    }

    /// Distinct categories, observed ones first and declared options second.
    pub fn category_count(&self) -> Option<usize> {
        let observed = self
            .distribution
            .as_ref()
            .and_then(|d| d.categorical.as_ref())
            .map(|c| c.categories.len())
            .filter(|&len| len > 0);
        observed.or_else(|| {
            self.options
                .as_ref()
                .map(|o| o.len())
                .filter(|&len| len > 0)
        })
    }
}

/// Summary of the values observed for one variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionSummary {
    #[serde(rename = "type")]
    pub kind: VariableKind,
    /// Records with a resolvable value for the variable
    pub n: usize,
    /// Resolved values that were empty or unusable for the kind
    pub missing: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuous: Option<ContinuousSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categorical: Option<CategoricalSummary>,
}

impl DistributionSummary {
    /// A distribution with no observations.
    pub fn empty(kind: VariableKind) -> Self {
        Self {
            kind,
            n: 0,
            missing: 0,
            continuous: None,
            categorical: None,
        }
    }

    /// Fraction of resolved values that are missing, in `[0, 1]`.
    pub fn missing_rate(&self) -> f64 {
        if self.n == 0 {
            0.0
        } else {
            self.missing as f64 / self.n as f64
        }
    }
}

/// Moment and order statistics of a numeric variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinuousSummary {
    pub mean: f64,
    pub sd: f64,
    pub median: f64,
    pub iqr: (f64, f64),
    pub min: f64,
    pub max: f64,
    /// `|skewness| < 1`; a screening heuristic, not a formal test
    pub is_normal: bool,
    pub skewness: f64,
}

/// Frequency table of a label-valued variable.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoricalSummary {
    pub frequencies: BTreeMap<String, usize>,
    pub proportions: BTreeMap<String, f64>,
    /// Categories in order of first appearance
    pub categories: Vec<String>,
}
