//! Integration tests for the statistician service with a scripted generator.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use stat_advisor::config::AdvisorConfig;
use stat_advisor::error::{AdvisorError, Result};
use stat_advisor::logging::LogConfig;
use stat_advisor::model::{
    AnalysisContext, AnalysisType, DataType, EndpointTier, ProtocolVersion, Record,
    ReviewDecision, Role, SchemaNode, SuggestionReview, SuggestionSource, SuggestionStatus,
};
use stat_advisor::planner::{AnalysisDomain, TextGenerator};
use stat_advisor::queue::QueueList;
use stat_advisor::service::StatisticianService;

/// Answers every prompt with the same plan, except prompts mentioning a
/// poisoned word, which fail.
struct ScriptedGenerator {
    plan: String,
    poisoned: Option<&'static str>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedGenerator {
    fn new(plan: &str) -> Self {
        Self {
            plan: plan.to_string(),
            poisoned: None,
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.poisoned.is_some_and(|word| prompt.contains(word)) {
            return Err(AdvisorError::generation("upstream refused the prompt"));
        }
        Ok(self.plan.clone())
    }
}

const PLAN: &str = r#"```json
{"suggestions": [
  {"suggestionType": "secondary-analysis", "priority": "recommended",
   "title": "Weight by arm",
   "rationale": "Weight change is a key safety signal.",
   "proposedAnalysis": {"analysisType": "t-test", "outcomeId": "Body Weight", "predictorId": "arm"},
   "confidence": 81},
  {"suggestionType": "descriptive", "autoExecute": true,
   "proposedAnalysis": {"analysisType": "descriptive", "outcomeId": "not_in_schema"}}
]}
```"#;

fn study() -> (AnalysisContext, Vec<Record>, StatisticianService) {
    let schema = vec![
        SchemaNode::new("arm", DataType::Categorical, Role::Predictor)
            .with_options(["Drug", "Placebo"]),
        SchemaNode::new("sbp", DataType::Continuous, Role::Outcome)
            .with_name("Systolic BP")
            .with_tier(EndpointTier::Primary),
        SchemaNode::new("weight", DataType::Continuous, Role::Outcome).with_name("Body Weight"),
    ];
    let records: Vec<Record> = (0..30)
        .map(|i| {
            Record::complete()
                .with_field("enrollment", "arm", if i % 2 == 0 { "Drug" } else { "Placebo" })
                .with_field("vitals", "sbp", 120 + (i * 7) % 13)
                .with_field("vitals", "weight", 70 + (i * 5) % 17)
        })
        .collect();
    let service =
        StatisticianService::new(AdvisorConfig::default()).with_log_config(LogConfig::verbose());
    let context = service
        .build_context(&ProtocolVersion::default(), &schema, &records, None, None)
        .unwrap()
        .context;
    (context, records, service)
}

#[tokio::test]
async fn drafted_suggestions_are_bound_and_queued_for_review() {
    let (context, records, service) = study();
    let generator = ScriptedGenerator::new(PLAN);

    let plan = service.generate_plan(&context, Some(&generator)).await;
    let drafted: Vec<_> = plan
        .iter()
        .filter(|s| s.source == SuggestionSource::Ai)
        .collect();
    assert_eq!(drafted.len(), 1, "unbound outcome must be dropped");
    assert_eq!(drafted[0].proposed_analysis.outcome.id, "weight");
    assert_eq!(drafted[0].id, "ai-t-test-weight-arm");

    let queue = service.initialize_queue(plan, &records);
    let (list, _) = queue.find("ai-t-test-weight-arm").unwrap();
    assert_eq!(list, QueueList::Pending);
    queue.check_invariant().unwrap();
}

#[tokio::test]
async fn batched_generation_survives_a_failing_domain() {
    let (context, _, service) = study();
    let mut generator = ScriptedGenerator::new(PLAN);
    generator.poisoned = Some(AnalysisDomain::Safety.focus());

    let mut seen = Vec::new();
    let plan = service
        .generate_plan_batched(&context, &generator, |progress| seen.push(progress))
        .await;

    assert_eq!(generator.calls.load(Ordering::SeqCst), AnalysisDomain::ALL.len());
    let safety = seen
        .iter()
        .find(|p| p.domain == AnalysisDomain::Safety)
        .unwrap();
    assert_eq!(safety.drafted, 0);
    assert!(plan.iter().any(|s| s.id == "ai-t-test-weight-arm"));
}

#[tokio::test]
async fn timeouts_fall_back_to_rule_based_plan() {
    let (context, _, _) = study();
    let config = AdvisorConfig::builder()
        .ai_timeout(Some(Duration::from_millis(10)))
        .build()
        .unwrap();
    let service = StatisticianService::new(config);
    let mut generator = ScriptedGenerator::new(PLAN);
    generator.delay = Some(Duration::from_secs(2));

    let plan = service.generate_plan(&context, Some(&generator)).await;
    assert!(!plan.is_empty());
    assert!(plan.iter().all(|s| s.source == SuggestionSource::RuleBased));
}

#[tokio::test]
async fn recommendation_prefers_usable_drafts() {
    let (context, _, service) = study();
    let arm = context.variable("arm").unwrap();
    let sbp = context.variable("sbp").unwrap();

    let generator = ScriptedGenerator::new(
        r#"{"recommendation": {"analysisType": "welch-t-test"}, "confidence": 90}"#,
    );
    let recommendation = service.recommend_test(Some(arm), sbp, &context, Some(&generator)).await;
    assert_eq!(recommendation.source, SuggestionSource::RuleBased);
    assert_eq!(recommendation.analysis_type, AnalysisType::TTest);
}

#[tokio::test]
async fn concurrent_reviewers_share_one_queue() {
    let (context, records, service) = study();
    let plan = service.generate_plan(&context, None).await;
    let queue = service.initialize_queue(plan, &records);
    let pending: Vec<String> = queue.pending.iter().map(|s| s.id.clone()).collect();
    assert!(!pending.is_empty());

    let session = service.start_session(queue, context, records);
    let reviewers: Vec<_> = pending
        .iter()
        .cloned()
        .map(|id| {
            let session = session.clone();
            tokio::spawn(async move {
                let review = SuggestionReview::new(id, ReviewDecision::Accept).with_reviewer("stat-1");
                session.review(&review).await
            })
        })
        .collect();
    for reviewer in reviewers {
        assert_eq!(reviewer.await.unwrap().unwrap(), SuggestionStatus::Accepted);
    }

    // a second reviewer arriving late cannot change the decision
    let late = SuggestionReview::new(pending[0].clone(), ReviewDecision::Reject);
    assert_eq!(session.review(&late).await.unwrap(), SuggestionStatus::Accepted);

    let summary = session.execute_accepted().await;
    assert_eq!(summary.executed + summary.failed, pending.len());

    let snapshot = session.snapshot().await;
    snapshot.check_invariant().unwrap();
    assert_eq!(snapshot.executed.len(), pending.len());
    assert!(snapshot
        .executed
        .iter()
        .all(|s| s.reviewed_by.as_deref() == Some("stat-1")));

    let unknown = SuggestionReview::new("missing", ReviewDecision::Accept);
    assert!(matches!(
        session.review(&unknown).await,
        Err(AdvisorError::SuggestionNotFound { .. })
    ));
}
