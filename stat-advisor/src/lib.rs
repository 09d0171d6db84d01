//! # stat-advisor - Statistical Analysis Planning for Clinical Studies
//!
//! stat-advisor turns a study protocol, its data-entry schema and the
//! collected records into a reviewed, executed statistical analysis plan. It
//! proposes the analyses a biostatistician would expect, checks that the data
//! can support them, and keeps every inferential test behind human review
//! while letting safe descriptive and diagnostic summaries run immediately.
//!
//! ## Quick Start
//!
//! ```rust
//! use stat_advisor::prelude::*;
//! use stat_advisor::model::{
//!     DataType, EndpointTier, ProtocolVersion, Record, ReviewDecision, Role, SchemaNode,
//!     SuggestionReview,
//! };
//!
//! # async fn example() -> stat_advisor::error::Result<()> {
//! let schema = vec![
//!     SchemaNode::new("arm", DataType::Categorical, Role::Predictor)
//!         .with_options(["Drug", "Placebo"]),
//!     SchemaNode::new("sbp", DataType::Continuous, Role::Outcome)
//!         .with_tier(EndpointTier::Primary),
//! ];
//! let records: Vec<Record> = (0..40)
//!     .map(|i| {
//!         Record::complete()
//!             .with_field("enrollment", "arm", if i % 2 == 0 { "Drug" } else { "Placebo" })
//!             .with_field("vitals", "sbp", 120 + (i * 7) % 13)
//!     })
//!     .collect();
//!
//! let service = StatisticianService::new(AdvisorConfig::default());
//! let built = service.build_context(&ProtocolVersion::default(), &schema, &records, None, None)?;
//!
//! // Rule-based plan; pass a `TextGenerator` to merge in a drafted one.
//! let plan = service.generate_plan(&built.context, None).await;
//!
//! // Descriptive statistics and normality checks run right away,
//! // everything else waits for review.
//! let mut queue = service.initialize_queue(plan, &records);
//! let primary = queue.pending[0].id.clone();
//! let review = SuggestionReview::new(primary, ReviewDecision::Accept);
//! service.review(&mut queue, &review, &built.context)?;
//! let summary = service.execute_accepted(&mut queue, &records);
//! assert_eq!(summary.executed, 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **`context`**: builds the immutable [`AnalysisContext`](model::AnalysisContext)
//!   from protocol, schema, records and literature, with field-resolution diagnostics
//! - **`classifier`**: continuous / categorical / binary / time-to-event
//! - **`selection`**: the test-selection decision table
//! - **`feasibility`**: sample size, missingness, normality and balance checks
//! - **`suggestions`**: rule-based suggestions and merging with drafted plans
//! - **`planner`**: prompts for and parsing of externally drafted plans
//! - **`queue`**: the review queue and its state machine
//! - **`executor`**: descriptive statistics, t-test, chi-square / Fisher,
//!   correlation and normality computations
//! - **`service`**: the orchestrating [`StatisticianService`](service::StatisticianService)
//!
//! ## Logging
//!
//! All components emit `tracing` events. Applications without a subscriber
//! can use [`logging::setup`]:
//!
//! ```rust,no_run
//! use stat_advisor::logging::setup::{init_logging, LoggingConfig};
//!
//! init_logging(LoggingConfig::development()).expect("logging");
//! ```

pub mod classifier;
pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod feasibility;
pub mod logging;
pub mod model;
pub mod planner;
pub mod prelude;
pub mod queue;
pub mod selection;
pub mod service;
pub mod stats;
pub mod suggestions;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_fixtures;
