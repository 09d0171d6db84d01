//! Property-based tests for the advisor.
//!
//! These check the invariants that must hold for every input rather than for
//! a handful of fixtures:
//! - Boolean variables always classify as binary
//! - test selection for a continuous outcome and binary predictor follows the
//!   observed normality verdict
//! - feasibility is a pure function of its inputs
//! - only descriptive and normality suggestions are ever auto-executed
//! - every suggestion id lives in exactly one queue list, whatever the
//!   sequence of reviews and executions
//! - merging an empty drafted plan is the identity

use proptest::prelude::*;

use stat_advisor::classifier::classify_parts;
use stat_advisor::config::AdvisorConfig;
use stat_advisor::context::ContextBuilder;
use stat_advisor::executor::Executor;
use stat_advisor::feasibility::check_feasibility;
use stat_advisor::model::{
    AnalysisContext, AnalysisType, DataType, EndpointTier, MethodHint, ProposedAnalysis,
    ProtocolVersion, Record, ReviewDecision, Role, SchemaNode, SuggestionReview, SuggestionType,
    VariableKind,
};
use stat_advisor::queue::QueueManager;
use stat_advisor::selection::select_test;
use stat_advisor::stats::describe;
use stat_advisor::suggestions::SuggestionEngine;

fn schema() -> Vec<SchemaNode> {
    vec![
        SchemaNode::new("arm", DataType::Boolean, Role::Predictor),
        SchemaNode::new("sbp", DataType::Continuous, Role::Outcome).with_tier(EndpointTier::Primary),
        SchemaNode::new("grade", DataType::Categorical, Role::Outcome)
            .with_options(["I", "II", "III"])
            .with_tier(EndpointTier::Secondary),
        SchemaNode::new("weight", DataType::Continuous, Role::Outcome)
            .with_tier(EndpointTier::Secondary),
    ]
}

fn build(values: &[f64]) -> (AnalysisContext, Vec<Record>) {
    let grades = ["I", "II", "III"];
    let records: Vec<Record> = values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            Record::complete()
                .with_field("baseline", "arm", i % 2 == 0)
                .with_field("baseline", "sbp", *v)
                .with_field("followup", "grade", grades[i % 3])
                .with_field("followup", "weight", 60.0 + (i % 11) as f64)
        })
        .collect();
    let context = ContextBuilder::new(AdvisorConfig::default())
        .build(&ProtocolVersion::default(), &schema(), &records, None, None)
        .unwrap()
        .context;
    (context, records)
}

fn data_type() -> impl Strategy<Value = DataType> {
    prop_oneof![
        Just(DataType::Continuous),
        Just(DataType::Categorical),
        Just(DataType::Boolean),
        Just(DataType::Text),
        Just(DataType::MultiSelect),
        Just(DataType::Unknown),
    ]
}

fn decision() -> impl Strategy<Value = ReviewDecision> {
    prop_oneof![
        Just(ReviewDecision::Accept),
        Just(ReviewDecision::AcceptModified),
        Just(ReviewDecision::Reject),
        Just(ReviewDecision::Defer),
    ]
}

fn suggestion_type() -> impl Strategy<Value = SuggestionType> {
    prop_oneof![
        Just(SuggestionType::Descriptive),
        Just(SuggestionType::NormalityCheck),
        Just(SuggestionType::PrimaryAnalysis),
        Just(SuggestionType::SecondaryAnalysis),
        Just(SuggestionType::ExploratoryAnalysis),
        Just(SuggestionType::EffectSizeEstimation),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn boolean_is_always_binary(
        declared in proptest::option::of(0usize..10),
        observed in proptest::option::of(0usize..10),
    ) {
        let kind = classify_parts(DataType::Boolean, None, declared, observed);
        prop_assert_eq!(kind, VariableKind::Binary);
    }

    #[test]
    fn survival_hint_wins_over_data_type(data_type in data_type()) {
        let kind = classify_parts(data_type, Some(MethodHint::Survival), None, None);
        prop_assert_eq!(kind, VariableKind::TimeToEvent);
    }

    /// A t-test when the observed outcome screens as normal, Mann-Whitney otherwise.
    #[test]
    fn binary_predictor_selection_follows_normality(
        values in proptest::collection::vec(0.0f64..1000.0, 10..60),
        spike in proptest::option::of(5_000.0f64..50_000.0),
    ) {
        let mut values = values;
        if let Some(spike) = spike {
            values.push(spike);
        }
        let (context, _) = build(&values);
        let normal = describe(&values).unwrap().is_normal();

        let selection = select_test(
            context.variable("arm"),
            context.variable("sbp").unwrap(),
            context.protocol.study_design,
        );
        let expected = if normal { AnalysisType::TTest } else { AnalysisType::MannWhitney };
        prop_assert_eq!(selection.analysis_type, expected);
    }

    #[test]
    fn feasibility_is_deterministic(
        values in proptest::collection::vec(0.0f64..300.0, 0..50),
        kind in 0usize..AnalysisType::ALL.len(),
        with_predictor in any::<bool>(),
    ) {
        let (context, _) = build(&values);
        let mut analysis = ProposedAnalysis::new(
            "analysis",
            AnalysisType::ALL[kind],
            context.variable("sbp").unwrap().clone(),
        );
        if with_predictor {
            analysis = analysis.with_predictor(context.variable("arm").unwrap().clone());
        }
        let first = check_feasibility(&analysis, &context);
        let second = check_feasibility(&analysis, &context);
        prop_assert_eq!(first.clone(), second);
        prop_assert_eq!(first.feasible, !first.issues.iter().any(|i| i.is_blocking()));
    }

    /// Even when every suggestion asks for it, only safe types run unreviewed.
    #[test]
    fn only_safe_types_are_auto_executed(
        values in proptest::collection::vec(100.0f64..200.0, 0..40),
        types in proptest::collection::vec(suggestion_type(), 8),
        descriptive in any::<bool>(),
        normality in any::<bool>(),
    ) {
        let (context, records) = build(&values);
        let config = AdvisorConfig::builder()
            .auto_execute_descriptive(descriptive)
            .auto_execute_normality(normality)
            .build()
            .unwrap();
        let mut suggestions = SuggestionEngine::with_default_rules(config.clone()).generate(&context);
        for (suggestion, kind) in suggestions.iter_mut().zip(types) {
            suggestion.suggestion_type = kind;
            suggestion.auto_execute = true;
        }

        let executor = Executor::new(config.clone());
        let queue = QueueManager::new(config)
            .initialize(suggestions, |s| executor.execute_suggestion(s, &records));
        for suggestion in &queue.auto_executed {
            prop_assert!(matches!(
                suggestion.suggestion_type,
                SuggestionType::Descriptive | SuggestionType::NormalityCheck
            ));
            prop_assert!(!suggestion.proposed_analysis.analysis_type.is_inferential());
        }
        if !descriptive && !normality {
            prop_assert!(queue.auto_executed.is_empty());
        }
    }

    #[test]
    fn queue_ids_stay_in_exactly_one_list(
        values in proptest::collection::vec(100.0f64..200.0, 0..40),
        steps in proptest::collection::vec((0usize..16, decision(), any::<bool>()), 0..24),
    ) {
        let (context, records) = build(&values);
        let config = AdvisorConfig::default();
        let suggestions = SuggestionEngine::with_default_rules(config.clone()).generate(&context);
        let all_ids: Vec<String> = suggestions.iter().map(|s| s.id.clone()).collect();

        let executor = Executor::new(config.clone());
        let manager = QueueManager::new(config);
        let mut queue = manager.initialize(suggestions, |s| executor.execute_suggestion(s, &records));
        prop_assert!(queue.check_invariant().is_ok());

        for (index, decision, execute) in steps {
            let id = &all_ids[index % all_ids.len()];
            prop_assert!(manager.review(&mut queue, &SuggestionReview::new(id.clone(), decision), &context).is_ok());
            if execute {
                manager.execute_accepted(&mut queue, |s| executor.execute_suggestion(s, &records));
            }
            prop_assert!(queue.check_invariant().is_ok());
            prop_assert_eq!(queue.len(), all_ids.len());
        }
    }

    #[test]
    fn merging_an_empty_plan_is_identity(values in proptest::collection::vec(0.0f64..300.0, 0..40)) {
        let (context, _) = build(&values);
        let engine = SuggestionEngine::with_default_rules(AdvisorConfig::default());
        let rule_based = engine.generate(&context);
        let merged = engine.merge(rule_based.clone(), Vec::new(), &context);
        prop_assert_eq!(merged, rule_based);
    }
}
