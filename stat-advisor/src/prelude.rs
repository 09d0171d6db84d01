//! Prelude for commonly used types and traits in stat-advisor.

pub use crate::config::{AdvisorConfig, ResolutionConfig};
pub use crate::context::ContextBuilder;
pub use crate::error::{AdvisorError, Result};
pub use crate::executor::Executor;
pub use crate::logging::LogConfig;
pub use crate::planner::TextGenerator;
pub use crate::queue::{AnalysisQueue, QueueManager};
pub use crate::service::{ReviewSession, StatisticianService};
pub use crate::suggestions::{SuggestionEngine, SuggestionRule};
