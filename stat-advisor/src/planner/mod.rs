//! Externally drafted analysis plans.
//!
//! A [`TextGenerator`] turns a prompt into free text, usually by calling a
//! language model. [`PlanPrompt`] renders the analysis context into such a
//! prompt and [`parse_plan_response`] converts the answer into suggestions.
//! Drafted suggestions refer to variables by id, name or label; they are
//! re-bound to the context with [`bind_to_context`] before they are merged
//! with the rule-based list.
//!
//! Nothing in this module is required for a working plan: the service falls
//! back to rule-based suggestions whenever generation or parsing fails.

pub mod prompt;
pub mod response;

use async_trait::async_trait;
use std::future::Future;

use crate::error::Result;

pub use prompt::{test_recommendation_prompt, AnalysisDomain, PlanPrompt};
pub use response::{
    bind_to_context, parse_plan_response, parse_test_recommendation, TestRecommendation,
};

/// Source of free text for a prompt.
///
/// Implemented for any async closure taking the prompt by value:
///
/// ```rust
/// use stat_advisor::error::AdvisorError;
/// use stat_advisor::planner::TextGenerator;
///
/// # async fn example() -> stat_advisor::error::Result<()> {
/// let generator =
///     |prompt: String| async move { Ok::<_, AdvisorError>(format!("echo: {}", prompt.len())) };
/// assert_eq!(generator.generate("abc").await?, "echo: 3");
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generates text for the prompt.
    ///
    /// # Errors
    ///
    /// Returns [`AdvisorError::Generation`](crate::error::AdvisorError::Generation)
    /// when the backend cannot produce an answer.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

#[async_trait]
impl<F, Fut> TextGenerator for F
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<String>> + Send,
{
    async fn generate(&self, prompt: &str) -> Result<String> {
        (self)(prompt.to_string()).await
    }
}
