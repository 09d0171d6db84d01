//! Rule-based suggestion generation and merging with externally drafted plans.
//!
//! The [`SuggestionEngine`] runs its rules in registration order, attaches a
//! feasibility verdict to every suggestion and sorts the result. The default
//! rule set produces, in order: descriptive statistics for each primary and
//! secondary endpoint, the primary endpoint test, the secondary endpoint
//! tests and a bounded number of normality checks.
//!
//! ## Example
//!
//! ```rust
//! use stat_advisor::config::AdvisorConfig;
//! use stat_advisor::context::ContextBuilder;
//! use stat_advisor::model::{DataType, EndpointTier, ProtocolVersion, Role, SchemaNode};
//! use stat_advisor::suggestions::SuggestionEngine;
//!
//! # fn example() -> stat_advisor::error::Result<()> {
//! let schema = vec![
//!     SchemaNode::new("arm", DataType::Boolean, Role::Predictor),
//!     SchemaNode::new("sbp", DataType::Continuous, Role::Outcome).with_tier(EndpointTier::Primary),
//! ];
//! let context = ContextBuilder::default()
//!     .build(&ProtocolVersion::default(), &schema, &[], None, None)?
//!     .context;
//!
//! let engine = SuggestionEngine::with_default_rules(AdvisorConfig::default());
//! let suggestions = engine.generate(&context);
//! assert_eq!(suggestions[0].id, "descriptive-sbp");
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```

pub mod rules;

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, instrument};

use crate::config::AdvisorConfig;
use crate::feasibility::check_feasibility;
use crate::model::{AnalysisContext, Suggestion, SuggestionSource, SuggestionStatus};

pub use rules::{DescriptiveRule, EndpointAnalysisRule, NormalityRule};

/// A source of suggestions derived from the analysis context.
pub trait SuggestionRule: Send + Sync {
    /// Produces suggestions for the context, in the order they should appear.
    fn apply(&self, context: &AnalysisContext, config: &AdvisorConfig) -> Vec<Suggestion>;

    fn name(&self) -> &str;

    fn description(&self) -> &str;
}

/// Runs suggestion rules and merges their output with drafted plans.
pub struct SuggestionEngine {
    rules: Vec<Box<dyn SuggestionRule>>,
    config: AdvisorConfig,
}

impl std::fmt::Debug for SuggestionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuggestionEngine")
            .field("rules", &self.rule_names())
            .field("config", &self.config)
            .finish()
    }
}

impl SuggestionEngine {
    /// Creates an engine without rules.
    pub fn new(config: AdvisorConfig) -> Self {
        Self {
            rules: Vec::new(),
            config,
        }
    }

    /// Creates an engine with the built-in rules in their fixed order.
    pub fn with_default_rules(config: AdvisorConfig) -> Self {
        Self::new(config)
            .add_rule(Box::new(DescriptiveRule))
            .add_rule(Box::new(EndpointAnalysisRule::primary()))
            .add_rule(Box::new(EndpointAnalysisRule::secondary()))
            .add_rule(Box::new(NormalityRule))
    }

    /// Add a suggestion rule to the engine
    pub fn add_rule(mut self, rule: Box<dyn SuggestionRule>) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn config(&self) -> &AdvisorConfig {
        &self.config
    }

    pub fn rule_names(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Generates the prioritized rule-based suggestion list.
    #[instrument(skip(self, context), fields(rules = self.rules.len()))]
    pub fn generate(&self, context: &AnalysisContext) -> Vec<Suggestion> {
        let mut suggestions = Vec::new();

        for rule in &self.rules {
            let rule_suggestions = rule.apply(context, &self.config);
            debug!(
                rule = rule.name(),
                suggestions_count = rule_suggestions.len(),
                "Applied suggestion rule"
            );
            suggestions.extend(rule_suggestions);
        }

        make_ids_unique(&mut suggestions);
        apply_feasibility(&mut suggestions, context);
        prioritize(&mut suggestions);

        info!(
            suggestions = suggestions.len(),
            auto_execute = suggestions.iter().filter(|s| s.passes_auto_execution_gate()).count(),
            "Generated rule-based suggestions"
        );
        suggestions
    }

    /// Merges drafted suggestions into a rule-based list.
    ///
    /// Rule-based entries are never replaced. A drafted entry with the same
    /// analysis type, outcome and predictor only contributes its literature
    /// reference. New drafted entries are sanitized, checked for feasibility
    /// and appended before the combined list is prioritized.
    #[instrument(skip_all, fields(rule_based = rule_based.len(), drafted = drafted.len()))]
    pub fn merge(
        &self,
        rule_based: Vec<Suggestion>,
        drafted: Vec<Suggestion>,
        context: &AnalysisContext,
    ) -> Vec<Suggestion> {
        let mut merged = rule_based;
        let mut positions: HashMap<_, usize> = merged
            .iter()
            .enumerate()
            .map(|(i, s)| (s.proposed_analysis.dedup_key(), i))
            .collect();
        let mut ids: HashSet<String> = merged.iter().map(|s| s.id.clone()).collect();

        let mut enriched = 0usize;
        let mut added = 0usize;
        for mut suggestion in drafted {
            let key = suggestion.proposed_analysis.dedup_key();
            if let Some(&existing) = positions.get(&key) {
                if let Some(reference) = suggestion.grounding.literature_reference.take() {
                    merged[existing].grounding.literature_reference = Some(reference);
                    enriched += 1;
                }
                continue;
            }

            self.sanitize(&mut suggestion);
            suggestion.id = unique_id(&suggestion.id, &ids);
            ids.insert(suggestion.id.clone());
            suggestion.feasibility = check_feasibility(&suggestion.proposed_analysis, context);

            positions.insert(key, merged.len());
            merged.push(suggestion);
            added += 1;
        }

        prioritize(&mut merged);
        debug!(enriched, added, total = merged.len(), "Merged drafted suggestions");
        merged
    }

    /// Resets lifecycle fields of a drafted suggestion and narrows its
    /// auto-execution request to what the configuration allows.
    fn sanitize(&self, suggestion: &mut Suggestion) {
        suggestion.status = SuggestionStatus::Pending;
        suggestion.source = SuggestionSource::Ai;
        suggestion.confidence = suggestion.confidence.min(100);
        suggestion.auto_execute = suggestion.auto_execute
            && self.config.allows_auto_execution(suggestion.suggestion_type)
            && !suggestion.proposed_analysis.analysis_type.is_inferential();
        suggestion.reviewed_at = None;
        suggestion.reviewed_by = None;
        suggestion.modification_notes = None;
        suggestion.executed_at = None;
        suggestion.execution_result = None;
    }
}

/// Replaces every suggestion's feasibility verdict with a fresh check.
pub fn apply_feasibility(suggestions: &mut [Suggestion], context: &AnalysisContext) {
    for suggestion in suggestions.iter_mut() {
        suggestion.feasibility = check_feasibility(&suggestion.proposed_analysis, context);
    }
}

/// Stable sort by priority tier, then by descending confidence.
pub fn prioritize(suggestions: &mut [Suggestion]) {
    suggestions.sort_by(|a, b| {
        a.priority
            .cmp(&b.priority)
            .then_with(|| b.confidence.cmp(&a.confidence))
    });
}

fn make_ids_unique(suggestions: &mut [Suggestion]) {
    let mut seen = HashSet::new();
    for suggestion in suggestions.iter_mut() {
        let id = unique_id(&suggestion.id, &seen);
        seen.insert(id.clone());
        suggestion.id = id;
    }
}

fn unique_id(id: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(id) {
        return id.to_string();
    }
    (2..)
        .map(|n| format!("{id}-{n}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| id.to_string())
}
