//! Maps declared data types and observed categories to statistical kinds.
//!
//! Classification never fails. Data types the engine does not recognise are
//! treated as continuous so a plan can still be drafted for them.

use crate::model::{DataType, MethodHint, Variable, VariableKind};

/// Classifies a variable for test selection.
///
/// Rules, first match wins:
/// 1. A `survival` analysis method hint makes the variable time-to-event.
/// 2. `Boolean` is binary.
/// 3. `Continuous` is continuous.
/// 4. `Categorical`, `Text` and `Multi-Select` are binary when exactly two
///    categories are declared or observed, categorical otherwise.
/// 5. Anything else is continuous.
///
/// # Examples
///
/// ```rust
/// use stat_advisor::classifier::classify;
/// use stat_advisor::model::{DataType, Role, Variable, VariableKind};
///
/// let smoker = Variable::new("smoker", DataType::Boolean, Role::Predictor);
/// assert_eq!(classify(&smoker), VariableKind::Binary);
/// ```
pub fn classify(variable: &Variable) -> VariableKind {
    let observed = variable
        .distribution
        .as_ref()
        .and_then(|d| d.categorical.as_ref())
        .map(|c| c.categories.len());
    classify_parts(
        variable.data_type,
        variable.analysis_method,
        variable.options.as_ref().map(Vec::len),
        observed,
    )
}

/// Classification from the individual inputs, used while a variable's
/// distribution is still being built.
pub fn classify_parts(
    data_type: DataType,
    method: Option<MethodHint>,
    declared_categories: Option<usize>,
    observed_categories: Option<usize>,
) -> VariableKind {
    if method == Some(MethodHint::Survival) {
        return VariableKind::TimeToEvent;
    }
    match data_type {
        DataType::Boolean => VariableKind::Binary,
        DataType::Continuous => VariableKind::Continuous,
        DataType::Categorical | DataType::Text | DataType::MultiSelect => {
            if declared_categories == Some(2) || observed_categories == Some(2) {
                VariableKind::Binary
            } else {
                VariableKind::Categorical
            }
        }
        DataType::Unknown => VariableKind::Continuous,
    }
}
