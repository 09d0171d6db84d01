//! The statistician service wires context building, plan generation, the
//! review queue and execution behind one configured object.
//!
//! Everything except talking to a [`TextGenerator`] is synchronous. The
//! generator call is the single suspension point; it is bounded by
//! [`AdvisorConfig::ai_timeout`] and any failure there degrades to the
//! rule-based plan with a `warn!` event.
//!
//! # Examples
//!
//! ```rust
//! use stat_advisor::config::AdvisorConfig;
//! use stat_advisor::model::{DataType, ProtocolVersion, Record, Role, SchemaNode};
//! use stat_advisor::service::StatisticianService;
//!
//! # async fn example() -> stat_advisor::error::Result<()> {
//! let service = StatisticianService::new(AdvisorConfig::default());
//! let schema = vec![SchemaNode::new("sbp", DataType::Continuous, Role::Outcome)];
//! let records: Vec<Record> = (0..10)
//!     .map(|i| Record::complete().with_field("vitals", "sbp", 120 + i))
//!     .collect();
//!
//! let built = service.build_context(&ProtocolVersion::default(), &schema, &records, None, None)?;
//! let plan = service.generate_plan(&built.context, None).await;
//! let queue = service.initialize_queue(plan, &records);
//! assert_eq!(queue.len(), 0);
//! # Ok(())
//! # }
//! ```

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::config::AdvisorConfig;
use crate::context::{BuiltContext, ContextBuilder};
use crate::error::{AdvisorError, Result};
use crate::executor::Executor;
use crate::logging::{truncate_field, LogConfig};
use crate::model::{
    AnalysisContext, FoundationalPaper, Pico, ProtocolVersion, Record, SchemaNode, Suggestion,
    SuggestionReview, SuggestionStatus, Variable,
};
use crate::perf_debug;
use crate::planner::{
    bind_to_context, parse_plan_response, parse_test_recommendation, test_recommendation_prompt,
    AnalysisDomain, PlanPrompt, TestRecommendation, TextGenerator,
};
use crate::queue::{AnalysisQueue, BatchSummary, QueueManager};
use crate::selection::select_test;
use crate::suggestions::SuggestionEngine;

/// Number of domain prompts in flight at once during batched generation.
const DOMAIN_CONCURRENCY: usize = 2;

/// Progress report emitted after each domain of a batched generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanProgress {
    pub domain: AnalysisDomain,
    /// Domains finished so far, including this one
    pub completed: usize,
    pub total: usize,
    /// Suggestions the domain contributed before merging
    pub drafted: usize,
}

/// Orchestrates the advisor.
#[derive(Debug, Clone)]
pub struct StatisticianService {
    config: AdvisorConfig,
    log_config: LogConfig,
    builder: ContextBuilder,
    engine: Arc<SuggestionEngine>,
    queue_manager: QueueManager,
    executor: Executor,
}

impl Default for StatisticianService {
    fn default() -> Self {
        Self::new(AdvisorConfig::default())
    }
}

impl StatisticianService {
    /// Creates a service with the default rule set.
    pub fn new(config: AdvisorConfig) -> Self {
        let engine = SuggestionEngine::with_default_rules(config.clone());
        Self::with_engine(config, engine)
    }

    /// Creates a service around a custom suggestion engine.
    pub fn with_engine(config: AdvisorConfig, engine: SuggestionEngine) -> Self {
        Self {
            builder: ContextBuilder::new(config.clone()),
            engine: Arc::new(engine),
            queue_manager: QueueManager::new(config.clone()),
            executor: Executor::new(config.clone()),
            log_config: LogConfig::default(),
            config,
        }
    }

    pub fn with_log_config(mut self, log_config: LogConfig) -> Self {
        self.builder = self.builder.with_log_config(log_config.clone());
        self.queue_manager = self.queue_manager.with_log_config(log_config.clone());
        self.executor = self.executor.with_log_config(log_config.clone());
        self.log_config = log_config;
        self
    }

    pub fn config(&self) -> &AdvisorConfig {
        &self.config
    }

    pub fn engine(&self) -> &SuggestionEngine {
        &self.engine
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    /// Builds the analysis context.
    ///
    /// # Errors
    ///
    /// Fails on a malformed schema.
    pub fn build_context(
        &self,
        protocol: &ProtocolVersion,
        schema: &[SchemaNode],
        records: &[Record],
        papers: Option<&[FoundationalPaper]>,
        pico: Option<&Pico>,
    ) -> Result<BuiltContext> {
        self.builder.build(protocol, schema, records, papers, pico)
    }

    /// Returns true if the study is small enough to draft a plan without asking.
    pub fn should_auto_generate(&self, context: &AnalysisContext) -> bool {
        context.variable_count() <= self.config.auto_generate_threshold
    }

    /// Generates the analysis plan.
    ///
    /// Without a generator this is the rule-based plan. With one, the drafted
    /// plan is merged into it; if drafting fails the rule-based plan is
    /// returned unchanged.
    #[instrument(skip_all, fields(variables = context.variable_count(), drafted = generator.is_some()))]
    pub async fn generate_plan(
        &self,
        context: &AnalysisContext,
        generator: Option<&dyn TextGenerator>,
    ) -> Vec<Suggestion> {
        let rule_based = self.engine.generate(context);
        let Some(generator) = generator else {
            return rule_based;
        };

        match self.draft(context, PlanPrompt::full(context), generator).await {
            Ok(drafted) => self.engine.merge(rule_based, drafted, context),
            Err(e) => {
                warn!(error = %e, "Plan drafting failed, keeping rule-based suggestions");
                rule_based
            }
        }
    }

    /// Generates the plan one analysis domain at a time.
    ///
    /// Domains are drafted [`DOMAIN_CONCURRENCY`] at a time, in
    /// [`AnalysisDomain::ALL`] order. A failing domain contributes nothing;
    /// the others are still merged. `progress` is called once per domain.
    #[instrument(skip_all, fields(variables = context.variable_count()))]
    pub async fn generate_plan_batched<P>(
        &self,
        context: &AnalysisContext,
        generator: &dyn TextGenerator,
        mut progress: P,
    ) -> Vec<Suggestion>
    where
        P: FnMut(PlanProgress),
    {
        let rule_based = self.engine.generate(context);
        let total = AnalysisDomain::ALL.len();

        let mut drafts = stream::iter(AnalysisDomain::ALL)
            .map(|domain| async move {
                let drafted = self
                    .draft(context, PlanPrompt::for_domain(context, domain), generator)
                    .await;
                (domain, drafted)
            })
            .buffered(DOMAIN_CONCURRENCY);

        let mut drafted = Vec::new();
        let mut completed = 0;
        while let Some((domain, result)) = drafts.next().await {
            completed += 1;
            let count = match result {
                Ok(suggestions) => {
                    let count = suggestions.len();
                    drafted.extend(suggestions);
                    count
                }
                Err(e) => {
                    warn!(domain = domain.as_str(), error = %e, "Domain drafting failed");
                    0
                }
            };
            debug!(domain = domain.as_str(), drafted = count, completed, total, "Domain drafted");
            progress(PlanProgress {
                domain,
                completed,
                total,
                drafted: count,
            });
        }

        self.engine.merge(rule_based, drafted, context)
    }

    /// Builds the review queue, running the suggestions that may run unreviewed.
    #[instrument(skip_all, fields(suggestions = suggestions.len(), records = records.len()))]
    pub fn initialize_queue(&self, suggestions: Vec<Suggestion>, records: &[Record]) -> AnalysisQueue {
        let queue = self
            .queue_manager
            .initialize(suggestions, |s| self.executor.execute_suggestion(s, records));
        info!(
            auto_executed = queue.auto_executed.len(),
            pending = queue.pending.len(),
            "Review queue initialized"
        );
        queue
    }

    /// Applies one review decision.
    ///
    /// # Errors
    ///
    /// Returns [`AdvisorError::SuggestionNotFound`] for an unknown id.
    pub fn review(
        &self,
        queue: &mut AnalysisQueue,
        review: &SuggestionReview,
        context: &AnalysisContext,
    ) -> Result<SuggestionStatus> {
        self.queue_manager.review(queue, review, context)
    }

    /// Executes every accepted suggestion. One failure never stops the batch.
    pub fn execute_accepted(&self, queue: &mut AnalysisQueue, records: &[Record]) -> BatchSummary {
        let summary = self
            .queue_manager
            .execute_accepted(queue, |s| self.executor.execute_suggestion(s, records));
        info!(executed = summary.executed, failed = summary.failed, "Accepted analyses executed");
        summary
    }

    /// Recommends a test for one pair.
    ///
    /// The rule-based selection is returned when there is no generator or the
    /// generated recommendation cannot be used.
    #[instrument(skip_all, fields(outcome = %outcome.id))]
    pub async fn recommend_test(
        &self,
        predictor: Option<&Variable>,
        outcome: &Variable,
        context: &AnalysisContext,
        generator: Option<&dyn TextGenerator>,
    ) -> TestRecommendation {
        let rule_based = TestRecommendation::from(select_test(
            predictor,
            outcome,
            context.protocol.study_design,
        ));
        let Some(generator) = generator else {
            return rule_based;
        };

        let drafted = async {
            let prompt = test_recommendation_prompt(predictor, outcome, context)?;
            let text = self.call(generator, &prompt).await?;
            parse_test_recommendation(&text)
        }
        .await;
        match drafted {
            Ok(recommendation) => recommendation,
            Err(e) => {
                warn!(error = %e, "Test recommendation drafting failed, keeping rule-based selection");
                rule_based
            }
        }
    }

    /// Opens a shared review session over a queue and the study it was planned from.
    pub fn start_session(
        &self,
        queue: AnalysisQueue,
        context: AnalysisContext,
        records: Vec<Record>,
    ) -> ReviewSession {
        ReviewSession {
            queue: Arc::new(Mutex::new(queue)),
            context: Arc::new(context),
            records: Arc::new(records),
            queue_manager: self.queue_manager.clone(),
            executor: self.executor.clone(),
        }
    }

    async fn draft(
        &self,
        context: &AnalysisContext,
        prompt: PlanPrompt<'_>,
        generator: &dyn TextGenerator,
    ) -> Result<Vec<Suggestion>> {
        let text = self.call(generator, &prompt.render()?).await?;
        perf_debug!(
            self.log_config,
            response = %truncate_field(&text, self.log_config.max_field_length),
            "Received drafted plan"
        );
        let parsed = parse_plan_response(&text)?;
        Ok(bind_to_context(parsed, context))
    }

    async fn call(&self, generator: &dyn TextGenerator, prompt: &str) -> Result<String> {
        match self.config.ai_timeout {
            Some(limit) => tokio::time::timeout(limit, generator.generate(prompt))
                .await
                .map_err(|_| AdvisorError::Timeout {
                    seconds: limit.as_secs(),
                })?,
            None => generator.generate(prompt).await,
        }
    }
}

/// A review queue shared between concurrent reviewers.
///
/// Every operation takes the lock once, so each transition is atomic with
/// respect to the others.
#[derive(Debug, Clone)]
pub struct ReviewSession {
    queue: Arc<Mutex<AnalysisQueue>>,
    context: Arc<AnalysisContext>,
    records: Arc<Vec<Record>>,
    queue_manager: QueueManager,
    executor: Executor,
}

impl ReviewSession {
    /// Applies one review decision.
    pub async fn review(&self, review: &SuggestionReview) -> Result<SuggestionStatus> {
        let mut queue = self.queue.lock().await;
        self.queue_manager.review(&mut queue, review, &self.context)
    }

    /// Executes every accepted suggestion under one lock.
    pub async fn execute_accepted(&self) -> BatchSummary {
        let mut queue = self.queue.lock().await;
        self.queue_manager
            .execute_accepted(&mut queue, |s| self.executor.execute_suggestion(s, &self.records))
    }

    /// A copy of the current queue.
    pub async fn snapshot(&self) -> AnalysisQueue {
        self.queue.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AnalysisResults, AnalysisType, ReviewDecision, SuggestionSource};
    use crate::queue::QueueList;
    use crate::test_fixtures::{trial_context, trial_records};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    const DRAFTED_PLAN: &str = r#"Sure. {"suggestions": [
        {"suggestionType": "primary-analysis", "priority": "critical",
         "title": "T-test on systolic BP",
         "grounding": {"literatureReference": "Smith et al. 2020"},
         "proposedAnalysis": {"analysisType": "t-test", "outcomeId": "sbp", "predictorId": "arm"},
         "confidence": 90},
        {"suggestionType": "exploratory-analysis", "priority": "optional",
         "title": "Age and blood pressure", "autoExecute": true,
         "proposedAnalysis": {"analysisType": "pearson-correlation", "outcomeId": "Systolic BP", "predictorId": "age"}}
    ]}"#;

    fn drafting(text: &'static str) -> impl TextGenerator {
        move |_prompt: String| async move { Ok::<_, AdvisorError>(text.to_string()) }
    }

    #[tokio::test]
    async fn test_rule_based_plan_without_generator() {
        let service = StatisticianService::default();
        let context = trial_context(40).unwrap();
        assert!(service.should_auto_generate(&context));

        let plan = service.generate_plan(&context, None).await;
        assert_eq!(plan.len(), 8);
        assert!(plan.iter().all(|s| s.source == SuggestionSource::RuleBased));
    }

    #[tokio::test]
    async fn test_drafted_plan_is_merged() {
        let service = StatisticianService::default();
        let context = trial_context(40).unwrap();
        let generator = drafting(DRAFTED_PLAN);

        let plan = service.generate_plan(&context, Some(&generator)).await;
        assert_eq!(plan.len(), 9);

        let primary = plan.iter().find(|s| s.id == "primary-analysis-sbp").unwrap();
        assert_eq!(primary.source, SuggestionSource::RuleBased);
        assert_eq!(
            primary.grounding.literature_reference.as_deref(),
            Some("Smith et al. 2020")
        );

        let drafted = plan.iter().find(|s| s.source == SuggestionSource::Ai).unwrap();
        assert_eq!(drafted.id, "ai-pearson-correlation-sbp-age");
        assert!(!drafted.auto_execute);
        assert_eq!(drafted.status, SuggestionStatus::Pending);
    }

    #[tokio::test]
    async fn test_generation_failures_fall_back_to_rules() {
        let service = StatisticianService::default();
        let context = trial_context(40).unwrap();

        let unparseable = drafting("I am unable to produce a plan.");
        let plan = service.generate_plan(&context, Some(&unparseable)).await;
        assert_eq!(plan.len(), 8);

        let failing = |_prompt: String| async move {
            Err::<String, _>(AdvisorError::generation("connection refused"))
        };
        let plan = service.generate_plan(&context, Some(&failing)).await;
        assert_eq!(plan.len(), 8);
    }

    #[tokio::test]
    async fn test_slow_generator_times_out() {
        let config = AdvisorConfig::builder()
            .ai_timeout(Some(Duration::from_millis(20)))
            .build()
            .unwrap();
        let service = StatisticianService::new(config);
        let context = trial_context(40).unwrap();
        let slow = |_prompt: String| async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, AdvisorError>(DRAFTED_PLAN.to_string())
        };

        let result = service.call(&slow, "prompt").await;
        assert!(matches!(result, Err(AdvisorError::Timeout { .. })));

        let plan = service.generate_plan(&context, Some(&slow)).await;
        assert_eq!(plan.len(), 8);
    }

    #[tokio::test]
    async fn test_batched_generation_reports_every_domain() {
        let service = StatisticianService::default();
        let context = trial_context(40).unwrap();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let generator = move |_prompt: String| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, AdvisorError>(DRAFTED_PLAN.to_string())
            }
        };

        let mut reports = Vec::new();
        let plan = service
            .generate_plan_batched(&context, &generator, |p| reports.push(p))
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), AnalysisDomain::ALL.len());
        assert_eq!(reports.len(), AnalysisDomain::ALL.len());
        assert_eq!(reports[0].domain, AnalysisDomain::ALL[0]);
        assert_eq!(reports.last().unwrap().completed, reports.last().unwrap().total);
        // every domain drafts the same correlation; it is merged once
        assert_eq!(plan.len(), 9);
    }

    #[tokio::test]
    async fn test_recommend_test() {
        let service = StatisticianService::default();
        let context = trial_context(40).unwrap();
        let arm = context.variable("arm").unwrap();
        let sbp = context.variable("sbp").unwrap();

        let rule_based = service.recommend_test(Some(arm), sbp, &context, None).await;
        assert_eq!(rule_based.analysis_type, AnalysisType::TTest);
        assert_eq!(rule_based.source, SuggestionSource::RuleBased);

        let generator = drafting(
            r#"{"recommendation": {"analysisType": "mann-whitney", "rationale": "small groups"}, "confidence": 77}"#,
        );
        let drafted = service.recommend_test(Some(arm), sbp, &context, Some(&generator)).await;
        assert_eq!(drafted.analysis_type, AnalysisType::MannWhitney);
        assert_eq!(drafted.confidence, 77);
        assert_eq!(drafted.source, SuggestionSource::Ai);

        let garbage = drafting("no idea");
        let fallback = service.recommend_test(Some(arm), sbp, &context, Some(&garbage)).await;
        assert_eq!(fallback, rule_based);
    }

    #[tokio::test]
    async fn test_queue_round_trip() {
        let service = StatisticianService::default();
        let records = trial_records(40);
        let context = trial_context(40).unwrap();
        let plan = service.generate_plan(&context, None).await;

        let mut queue = service.initialize_queue(plan, &records);
        assert_eq!(queue.auto_executed.len(), 5);
        assert!(queue.auto_executed.iter().all(|s| s.execution_result.as_ref().is_some_and(|r| r.success)));

        let review = SuggestionReview::new("primary-analysis-sbp", ReviewDecision::Accept);
        assert_eq!(service.review(&mut queue, &review, &context).unwrap(), SuggestionStatus::Accepted);
        let summary = service.execute_accepted(&mut queue, &records);
        assert_eq!(summary.executed, 1);

        let (list, executed) = queue.find("primary-analysis-sbp").unwrap();
        assert_eq!(list, QueueList::Executed);
        let result = executed.execution_result.as_ref().unwrap();
        assert!(matches!(result.results, Some(AnalysisResults::TTest(_))));
        queue.check_invariant().unwrap();
    }

    #[tokio::test]
    async fn test_review_session_serializes_concurrent_reviews() {
        let service = StatisticianService::default();
        let records = trial_records(40);
        let context = trial_context(40).unwrap();
        let plan = service.generate_plan(&context, None).await;
        let queue = service.initialize_queue(plan, &records);
        let pending: Vec<String> = queue.pending.iter().map(|s| s.id.clone()).collect();
        let session = service.start_session(queue, context, records);

        let handles: Vec<_> = pending
            .iter()
            .map(|id| {
                let session = session.clone();
                let review = SuggestionReview::new(id.clone(), ReviewDecision::Accept);
                tokio::spawn(async move { session.review(&review).await })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), SuggestionStatus::Accepted);
        }

        let summary = session.execute_accepted().await;
        assert_eq!(summary.executed + summary.failed, pending.len());
        let snapshot = session.snapshot().await;
        assert!(snapshot.pending.is_empty());
        assert!(snapshot.accepted.is_empty());
        snapshot.check_invariant().unwrap();
    }
}
