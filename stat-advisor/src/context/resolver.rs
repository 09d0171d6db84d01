//! Locating a variable's value inside a record.
//!
//! Records group fields by table, and the same variable may be keyed by its
//! id, its declared name, or a snake_case form of that name. Tables are
//! visited in an explicit order (configured priority tables, then the rest
//! lexicographically) and the first table that matches wins. With
//! `flag_ambiguous` enabled, later tables are still scanned and any match that
//! disagrees with the chosen value is reported instead of silently ignored.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::config::{ResolutionConfig, ResolutionStrategy};
use crate::model::{Record, Variable};

static CAMEL_BOUNDARY: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"([a-z0-9])([A-Z])").expect("Hard-coded regex pattern should be valid")
});
static NON_ALPHANUMERIC: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"[^a-z0-9]+").expect("Hard-coded regex pattern should be valid")
});

/// Converts a display name to a snake_case field key.
///
/// ```rust
/// use stat_advisor::context::resolver::to_snake_case;
///
/// assert_eq!(to_snake_case("Systolic BP (mmHg)"), "systolic_bp_mm_hg");
/// assert_eq!(to_snake_case("ageAtBaseline"), "age_at_baseline");
/// ```
pub fn to_snake_case(name: &str) -> String {
    let split = CAMEL_BOUNDARY.replace_all(name.trim(), "${1}_${2}");
    let lowered = split.to_lowercase();
    NON_ALPHANUMERIC
        .replace_all(&lowered, "_")
        .trim_matches('_')
        .to_string()
}

/// Candidate field keys for one variable, in strategy order.
#[derive(Debug, Clone)]
pub struct FieldKeys {
    pub variable_id: String,
    candidates: Vec<(ResolutionStrategy, String)>,
}

impl FieldKeys {
    pub fn new(id: &str, name: Option<&str>, strategies: &[ResolutionStrategy]) -> Self {
        let mut candidates: Vec<(ResolutionStrategy, String)> = Vec::new();
        for &strategy in strategies {
            let key = match strategy {
                ResolutionStrategy::Id => Some(id.to_string()),
                ResolutionStrategy::Name => name.map(str::to_string),
                ResolutionStrategy::SnakeCaseName => name.map(to_snake_case),
            };
            if let Some(key) = key.filter(|k| !k.is_empty()) {
                if !candidates.iter().any(|(_, existing)| existing == &key) {
                    candidates.push((strategy, key));
                }
            }
        }
        Self {
            variable_id: id.to_string(),
            candidates,
        }
    }

    pub fn for_variable(variable: &Variable, config: &ResolutionConfig) -> Self {
        Self::new(&variable.id, Some(&variable.name), &config.strategies)
    }
}

/// Where a value was found.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution<'r> {
    pub value: &'r Value,
    pub table: &'r str,
    pub field: &'r str,
    pub strategy: ResolutionStrategy,
}

/// A second table holding a different value for an already resolved variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AmbiguousMatch {
    pub variable_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    pub chosen_table: String,
    pub other_table: String,
    pub other_field: String,
}

/// Resolves variable values in records according to a [`ResolutionConfig`].
#[derive(Debug, Clone)]
pub struct FieldResolver<'c> {
    config: &'c ResolutionConfig,
}

impl<'c> FieldResolver<'c> {
    pub fn new(config: &'c ResolutionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ResolutionConfig {
        self.config
    }

    /// Table names of a record in visiting order.
    pub fn table_order<'r>(&self, record: &'r Record) -> Vec<&'r str> {
        let mut ordered: Vec<&'r str> = self
            .config
            .table_priority
            .iter()
            .filter_map(|t| record.data.get_key_value(t.as_str()).map(|(k, _)| k.as_str()))
            .collect();
        ordered.extend(
            record
                .data
                .keys()
                .map(String::as_str)
                .filter(|t| !self.config.table_priority.iter().any(|p| p == t)),
        );
        ordered
    }

    /// Resolves one variable in one record.
    ///
    /// Returns the winning match and, when ambiguity flagging is on, every
    /// later table whose match disagrees with it.
    pub fn resolve<'r>(
        &self,
        keys: &FieldKeys,
        record: &'r Record,
    ) -> (Option<Resolution<'r>>, Vec<AmbiguousMatch>) {
        let mut chosen: Option<Resolution<'r>> = None;
        let mut ambiguities = Vec::new();

        for table in self.table_order(record) {
            let Some(fields) = record.data.get(table) else {
                continue;
            };
            let hit = keys.candidates.iter().find_map(|(strategy, key)| {
                fields
                    .get_key_value(key.as_str())
                    .map(|(field, value)| (*strategy, field.as_str(), value))
            });
            let Some((strategy, field, value)) = hit else {
                continue;
            };

            if let Some(first) = &chosen {
                if first.value != value {
                    ambiguities.push(AmbiguousMatch {
                        variable_id: keys.variable_id.clone(),
                        record_id: record.id.clone(),
                        chosen_table: first.table.to_string(),
                        other_table: table.to_string(),
                        other_field: field.to_string(),
                    });
                }
                continue;
            }

            chosen = Some(Resolution {
                value,
                table,
                field,
                strategy,
            });
            if !self.config.flag_ambiguous {
                break;
            }
        }

        (chosen, ambiguities)
    }

    /// Resolves a variable across records, keeping record alignment.
    pub fn resolve_all<'r>(&self, keys: &FieldKeys, records: &[&'r Record]) -> Vec<Option<&'r Value>> {
        records
            .iter()
            .map(|record| self.resolve(keys, record).0.map(|r| r.value))
            .collect()
    }
}

/// First variable resolved, with where and how.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedVariable {
    pub variable_id: String,
    pub table: String,
    pub field: String,
    pub strategy: ResolutionStrategy,
}

/// Structured account of field resolution over one context build.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionDiagnostics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_resolved: Option<ResolvedVariable>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_unresolved: Option<String>,
    /// Variables that matched no field in any completed record
    pub unresolved: Vec<String>,
    /// Number of (record, variable) resolutions per strategy
    pub strategy_hits: BTreeMap<String, usize>,
    pub ambiguous: Vec<AmbiguousMatch>,
    pub ambiguous_total: usize,
}

impl ResolutionDiagnostics {
    pub fn has_ambiguities(&self) -> bool {
        self.ambiguous_total > 0
    }

    pub(crate) fn record_hit(&mut self, variable_id: &str, resolution: &Resolution<'_>) {
        if self.first_resolved.is_none() {
            self.first_resolved = Some(ResolvedVariable {
                variable_id: variable_id.to_string(),
                table: resolution.table.to_string(),
                field: resolution.field.to_string(),
                strategy: resolution.strategy,
            });
        }
        *self
            .strategy_hits
            .entry(resolution.strategy.as_str().to_string())
            .or_default() += 1;
    }

    pub(crate) fn record_unresolved(&mut self, variable_id: &str) {
        if self.first_unresolved.is_none() {
            self.first_unresolved = Some(variable_id.to_string());
        }
        self.unresolved.push(variable_id.to_string());
    }

    pub(crate) fn record_ambiguities(&mut self, found: Vec<AmbiguousMatch>, cap: usize) {
        self.ambiguous_total += found.len();
        let room = cap.saturating_sub(self.ambiguous.len());
        self.ambiguous.extend(found.into_iter().take(room));
    }
}
