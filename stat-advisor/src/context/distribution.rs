//! Per-variable distribution summaries.

use serde_json::Value;
use std::collections::BTreeMap;

use crate::classifier::classify_parts;
use crate::model::record::{as_category, as_number, is_blank};
use crate::model::{
    CategoricalSummary, ContinuousSummary, DataType, DistributionSummary, MethodHint,
    VariableKind,
};
use crate::stats;

/// Summarises the resolved values of one variable.
///
/// `values` holds one entry per record in which the variable resolved, so
/// `n == values.len()`. Blank values are missing; for numeric kinds, values
/// that do not parse as numbers are missing too.
pub fn summarize(
    data_type: DataType,
    method: Option<MethodHint>,
    declared_categories: Option<usize>,
    values: &[&Value],
) -> DistributionSummary {
    let numeric = method == Some(MethodHint::Survival)
        || matches!(data_type, DataType::Continuous | DataType::Unknown);

    if numeric {
        let kind = classify_parts(data_type, method, declared_categories, None);
        summarize_numeric(kind, values)
    } else {
        summarize_labels(data_type, method, declared_categories, values)
    }
}

fn summarize_numeric(kind: VariableKind, values: &[&Value]) -> DistributionSummary {
    let numbers: Vec<f64> = values
        .iter()
        .filter(|v| !is_blank(v))
        .filter_map(|v| as_number(v))
        .collect();

    DistributionSummary {
        kind,
        n: values.len(),
        missing: values.len() - numbers.len(),
        continuous: stats::describe(&numbers).map(|m| ContinuousSummary {
            is_normal: m.is_normal(),
            mean: m.mean,
            sd: m.sd,
            median: m.median,
            iqr: (m.q1, m.q3),
            min: m.min,
            max: m.max,
            skewness: m.skewness,
        }),
        categorical: None,
    }
}

fn summarize_labels(
    data_type: DataType,
    method: Option<MethodHint>,
    declared_categories: Option<usize>,
    values: &[&Value],
) -> DistributionSummary {
    let labels: Vec<String> = values.iter().filter_map(|v| as_category(v)).collect();
    let table = frequency_table(&labels);
    let kind = classify_parts(
        data_type,
        method,
        declared_categories,
        Some(table.categories.len()),
    );

    DistributionSummary {
        kind,
        n: values.len(),
        missing: values.len() - labels.len(),
        continuous: None,
        categorical: Some(table),
    }
}

/// Frequencies and proportions, with categories in order of first appearance.
pub fn frequency_table(labels: &[String]) -> CategoricalSummary {
    let mut frequencies: BTreeMap<String, usize> = BTreeMap::new();
    let mut categories: Vec<String> = Vec::new();
    for label in labels {
        let count = frequencies.entry(label.clone()).or_insert(0);
        if *count == 0 {
            categories.push(label.clone());
        }
        *count += 1;
    }

    let total = labels.len() as f64;
    let proportions = frequencies
        .iter()
        .map(|(k, &c)| (k.clone(), if total > 0.0 { c as f64 / total } else { 0.0 }))
        .collect();

    CategoricalSummary {
        frequencies,
        proportions,
        categories,
    }
}
