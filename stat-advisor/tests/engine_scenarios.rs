//! End-to-end scenarios for the advisor, driven through the public API only.
//!
//! Each test builds a small study (schema plus records), runs it through the
//! context builder and then exercises one component the way a host
//! application would.

use stat_advisor::classifier::classify;
use stat_advisor::config::AdvisorConfig;
use stat_advisor::context::ContextBuilder;
use stat_advisor::executor::Executor;
use stat_advisor::feasibility::check_feasibility;
use stat_advisor::model::{
    AnalysisContext, AnalysisResults, AnalysisType, DataType, EndpointTier, IssueKind,
    ProposedAnalysis, ProtocolVersion, Record, ReviewDecision, Role, SchemaNode, Severity,
    SuggestionReview, SuggestionStatus, SuggestionType, Variable, VariableKind,
};
use stat_advisor::queue::{QueueList, QueueManager};
use stat_advisor::selection::select_test;
use stat_advisor::suggestions::SuggestionEngine;

fn schema() -> Vec<SchemaNode> {
    vec![
        SchemaNode::new("arm", DataType::Categorical, Role::Predictor).with_name("Treatment Arm"),
        SchemaNode::new("sbp", DataType::Continuous, Role::Outcome)
            .with_name("Systolic BP")
            .with_tier(EndpointTier::Primary),
        SchemaNode::new("responder", DataType::Boolean, Role::Outcome)
            .with_tier(EndpointTier::Secondary),
    ]
}

/// Complete records, `size` per arm, in arm order.
fn records(arms: &[(&str, usize)]) -> Vec<Record> {
    let mut records = Vec::new();
    let mut i = 0usize;
    for (arm, size) in arms {
        for _ in 0..*size {
            records.push(
                Record::complete()
                    .with_field("enrollment", "arm", *arm)
                    .with_field("vitals", "sbp", 120.0 + ((i * 7) % 13) as f64)
                    .with_field("outcomes", "responder", i % 3 == 0),
            );
            i += 1;
        }
    }
    records
}

fn context(records: &[Record]) -> AnalysisContext {
    ContextBuilder::new(AdvisorConfig::default())
        .build(&ProtocolVersion::default(), &schema(), records, None, None)
        .unwrap()
        .context
}

fn t_test(context: &AnalysisContext) -> ProposedAnalysis {
    ProposedAnalysis::new(
        "analysis-t-test-sbp",
        AnalysisType::TTest,
        context.variable("sbp").unwrap().clone(),
    )
    .with_predictor(context.variable("arm").unwrap().clone())
}

#[test]
fn boolean_variables_are_binary() {
    let variable = Variable::new("flag", DataType::Boolean, Role::Outcome);
    assert_eq!(classify(&variable), VariableKind::Binary);
}

#[test]
fn continuous_outcome_with_binary_predictor_selects_t_test() {
    let records = records(&[("Drug", 20), ("Placebo", 20)]);
    let context = context(&records);
    let selection = select_test(
        context.variable("arm"),
        context.variable("sbp").unwrap(),
        context.protocol.study_design,
    );
    assert_eq!(selection.analysis_type, AnalysisType::TTest);
}

#[test]
fn eight_records_block_a_t_test() {
    let records = records(&[("Drug", 4), ("Placebo", 4)]);
    let context = context(&records);
    assert_eq!(context.data.completed_records, 8);

    let result = check_feasibility(&t_test(&context), &context);
    assert!(!result.feasible);
    assert!(result
        .issues
        .iter()
        .any(|i| i.kind == IssueKind::SampleSize && i.severity == Severity::Blocking));
    assert_eq!(result.minimum_sample_size, 20);
}

#[test]
fn skewed_continuous_outcome_is_summarised() {
    let schema = vec![SchemaNode::new("crp", DataType::Continuous, Role::Outcome)];
    let records: Vec<Record> = [1, 2, 3, 4, 5, 100]
        .iter()
        .map(|v| Record::complete().with_field("labs", "crp", *v))
        .collect();
    let context = ContextBuilder::default()
        .build(&ProtocolVersion::default(), &schema, &records, None, None)
        .unwrap()
        .context;

    let analysis = ProposedAnalysis::new(
        "analysis-desc-crp",
        AnalysisType::Descriptive,
        context.variable("crp").unwrap().clone(),
    );
    let result = Executor::default().execute(&analysis, &records);
    assert!(result.success);
    let Some(AnalysisResults::Descriptive(descriptive)) = result.results else {
        panic!("expected descriptive results");
    };
    let stats = descriptive.continuous.unwrap();
    assert_eq!(stats.n, 6);
    assert_eq!(stats.missing, 0);
    assert_eq!(stats.median, 3.5);
    assert!((stats.mean - 19.17).abs() < 0.005);
}

#[test]
fn tiny_group_blocks_comparison() {
    let records = records(&[("Drug", 3), ("Placebo", 30)]);
    let context = context(&records);

    let result = check_feasibility(&t_test(&context), &context);
    assert!(!result.feasible);
    assert!(result
        .issues
        .iter()
        .any(|i| i.kind == IssueKind::InsufficientGroups && i.severity == Severity::Blocking));
}

#[test]
fn feasible_primary_descriptive_runs_automatically() {
    let records = records(&[("Drug", 20), ("Placebo", 20)]);
    let context = context(&records);
    let config = AdvisorConfig::default();

    let suggestions = SuggestionEngine::with_default_rules(config.clone()).generate(&context);
    let descriptive = suggestions
        .iter()
        .find(|s| s.id == "descriptive-sbp")
        .unwrap();
    assert!(descriptive.feasibility.feasible);

    let executor = Executor::new(config.clone());
    let queue = QueueManager::new(config)
        .initialize(suggestions, |s| executor.execute_suggestion(s, &records));
    let (list, suggestion) = queue.find("descriptive-sbp").unwrap();
    assert_eq!(list, QueueList::AutoExecuted);
    assert_eq!(suggestion.status, SuggestionStatus::Executed);
    assert!(queue
        .auto_executed
        .iter()
        .all(|s| matches!(
            s.suggestion_type,
            SuggestionType::Descriptive | SuggestionType::NormalityCheck
        )));
}

#[test]
fn merging_nothing_keeps_the_rule_based_plan() {
    let records = records(&[("Drug", 20), ("Placebo", 20)]);
    let context = context(&records);
    let engine = SuggestionEngine::with_default_rules(AdvisorConfig::default());

    let rule_based = engine.generate(&context);
    let merged = engine.merge(rule_based.clone(), Vec::new(), &context);
    let ids = |list: &[stat_advisor::model::Suggestion]| -> Vec<String> {
        list.iter().map(|s| s.id.clone()).collect()
    };
    assert_eq!(ids(&merged), ids(&rule_based));
}

#[test]
fn review_and_execution_keep_each_id_in_one_list() {
    let records = records(&[("Drug", 20), ("Placebo", 20)]);
    let context = context(&records);
    let config = AdvisorConfig::review_everything();
    let engine = SuggestionEngine::with_default_rules(config.clone());
    let executor = Executor::new(config.clone());
    let manager = QueueManager::new(config);

    let mut queue = manager.initialize(engine.generate(&context), |s| {
        executor.execute_suggestion(s, &records)
    });
    assert!(queue.auto_executed.is_empty());
    let total = queue.len();

    let ids: Vec<String> = queue.pending.iter().map(|s| s.id.clone()).collect();
    let decisions = [
        ReviewDecision::Accept,
        ReviewDecision::Reject,
        ReviewDecision::Defer,
        ReviewDecision::Accept,
    ];
    for (id, decision) in ids.iter().zip(decisions.iter().cycle()) {
        manager
            .review(&mut queue, &SuggestionReview::new(id.clone(), *decision), &context)
            .unwrap();
        queue.check_invariant().unwrap();
    }
    manager.execute_accepted(&mut queue, |s| executor.execute_suggestion(s, &records));
    queue.check_invariant().unwrap();
    assert_eq!(queue.len(), total);
    assert!(queue.accepted.is_empty());

    // reviewing an executed suggestion is a no-op
    let executed = queue.executed[0].id.clone();
    let status = manager
        .review(
            &mut queue,
            &SuggestionReview::new(executed.clone(), ReviewDecision::Reject),
            &context,
        )
        .unwrap();
    assert_ne!(status, SuggestionStatus::Rejected);
    assert_eq!(queue.find(&executed).unwrap().0, QueueList::Executed);
}
