//! Suggestion lifecycle: the five-list queue and the review state machine.
//!
//! Every suggestion id lives in exactly one of the queue's lists. Moves are
//! remove-then-append, and reviews only ever move suggestions out of
//! `pending`. Nothing reaches `auto_executed` unless it passes
//! [`Suggestion::passes_auto_execution_gate`] and the configuration allows
//! its type.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{instrument, warn};

use crate::config::AdvisorConfig;
use crate::error::{AdvisorError, Result};
use crate::feasibility::check_feasibility;
use crate::log_queue;
use crate::logging::LogConfig;
use crate::model::{
    AnalysisContext, AnalysisExecutionResult, ReviewDecision, Suggestion, SuggestionReview,
    SuggestionStatus,
};

/// Next status of a suggestion after a review decision.
///
/// Only `pending` suggestions react to reviews. Every other status is final
/// for review purposes, so there is no way back to `pending` from a
/// rejected or executed suggestion.
///
/// ```rust
/// use stat_advisor::model::{ReviewDecision, SuggestionStatus};
/// use stat_advisor::queue::transition;
///
/// assert_eq!(
///     transition(SuggestionStatus::Pending, ReviewDecision::AcceptModified),
///     SuggestionStatus::Modified
/// );
/// assert_eq!(
///     transition(SuggestionStatus::Rejected, ReviewDecision::Accept),
///     SuggestionStatus::Rejected
/// );
/// ```
pub fn transition(status: SuggestionStatus, decision: ReviewDecision) -> SuggestionStatus {
    match (status, decision) {
        (SuggestionStatus::Pending, ReviewDecision::Accept) => SuggestionStatus::Accepted,
        (SuggestionStatus::Pending, ReviewDecision::AcceptModified) => SuggestionStatus::Modified,
        (SuggestionStatus::Pending, ReviewDecision::Reject) => SuggestionStatus::Rejected,
        (SuggestionStatus::Pending, ReviewDecision::Defer) => SuggestionStatus::Pending,
        (status, _) => status,
    }
}

/// One of the queue's five lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueueList {
    AutoExecuted,
    Pending,
    Accepted,
    Executed,
    Rejected,
}

impl QueueList {
    pub const ALL: [QueueList; 5] = [
        QueueList::AutoExecuted,
        QueueList::Pending,
        QueueList::Accepted,
        QueueList::Executed,
        QueueList::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueueList::AutoExecuted => "auto-executed",
            QueueList::Pending => "pending",
            QueueList::Accepted => "accepted",
            QueueList::Executed => "executed",
            QueueList::Rejected => "rejected",
        }
    }
}

/// Suggestions grouped by lifecycle stage, in arrival order within each list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisQueue {
    pub auto_executed: Vec<Suggestion>,
    pub pending: Vec<Suggestion>,
    pub accepted: Vec<Suggestion>,
    pub executed: Vec<Suggestion>,
    pub rejected: Vec<Suggestion>,
}

impl AnalysisQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list(&self, list: QueueList) -> &[Suggestion] {
        match list {
            QueueList::AutoExecuted => &self.auto_executed,
            QueueList::Pending => &self.pending,
            QueueList::Accepted => &self.accepted,
            QueueList::Executed => &self.executed,
            QueueList::Rejected => &self.rejected,
        }
    }

    fn list_mut(&mut self, list: QueueList) -> &mut Vec<Suggestion> {
        match list {
            QueueList::AutoExecuted => &mut self.auto_executed,
            QueueList::Pending => &mut self.pending,
            QueueList::Accepted => &mut self.accepted,
            QueueList::Executed => &mut self.executed,
            QueueList::Rejected => &mut self.rejected,
        }
    }

    /// Finds a suggestion and the list holding it.
    pub fn find(&self, id: &str) -> Option<(QueueList, &Suggestion)> {
        QueueList::ALL.iter().find_map(|&list| {
            self.list(list)
                .iter()
                .find(|s| s.id == id)
                .map(|s| (list, s))
        })
    }

    /// Every id in the queue, list by list.
    pub fn ids(&self) -> Vec<&str> {
        QueueList::ALL
            .iter()
            .flat_map(|&list| self.list(list).iter().map(|s| s.id.as_str()))
            .collect()
    }

    pub fn len(&self) -> usize {
        QueueList::ALL.iter().map(|&l| self.list(l).len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Verifies that no id appears twice across the lists.
    ///
    /// # Errors
    ///
    /// Returns [`AdvisorError::Internal`] naming the first duplicated id.
    pub fn check_invariant(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for id in self.ids() {
            if !seen.insert(id) {
                return Err(AdvisorError::Internal(format!(
                    "suggestion '{id}' is held by more than one queue list"
                )));
            }
        }
        Ok(())
    }
}

/// Counts from one batch execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    pub executed: usize,
    pub failed: usize,
}

/// Applies lifecycle operations to an [`AnalysisQueue`].
#[derive(Debug, Clone, Default)]
pub struct QueueManager {
    config: AdvisorConfig,
    log_config: LogConfig,
}

impl QueueManager {
    pub fn new(config: AdvisorConfig) -> Self {
        Self {
            config,
            log_config: LogConfig::default(),
        }
    }

    pub fn with_log_config(mut self, log_config: LogConfig) -> Self {
        self.log_config = log_config;
        self
    }

    /// Builds the initial queue.
    ///
    /// Suggestions passing the auto-execution gate are run with `run`. A
    /// successful run lands in `auto_executed` with its result attached; a
    /// failed run, and every other suggestion, lands in `pending`.
    #[instrument(skip_all, fields(suggestions = suggestions.len()))]
    pub fn initialize<F>(&self, suggestions: Vec<Suggestion>, mut run: F) -> AnalysisQueue
    where
        F: FnMut(&Suggestion) -> AnalysisExecutionResult,
    {
        let mut queue = AnalysisQueue::new();

        for mut suggestion in suggestions {
            suggestion.status = SuggestionStatus::Pending;
            if !self.may_auto_execute(&suggestion) {
                queue.pending.push(suggestion);
                continue;
            }

            let result = run(&suggestion);
            if result.success {
                suggestion.status = SuggestionStatus::Executed;
                suggestion.executed_at = Some(result.executed_at);
                suggestion.execution_result = Some(result);
                log_queue!(
                    self.log_config,
                    suggestion = %suggestion.id,
                    to = QueueList::AutoExecuted.as_str(),
                    "Auto-executed suggestion"
                );
                queue.auto_executed.push(suggestion);
            } else {
                warn!(
                    suggestion = %suggestion.id,
                    error = result.error.as_deref().unwrap_or("unknown"),
                    "Auto-execution failed, holding for review"
                );
                queue.pending.push(suggestion);
            }
        }

        log_queue!(
            self.log_config,
            auto_executed = queue.auto_executed.len(),
            pending = queue.pending.len(),
            "Initialized analysis queue"
        );
        queue
    }

    fn may_auto_execute(&self, suggestion: &Suggestion) -> bool {
        suggestion.passes_auto_execution_gate()
            && self.config.allows_auto_execution(suggestion.suggestion_type)
    }

    /// Applies a review decision and returns the suggestion's new status.
    ///
    /// Decisions on suggestions outside `pending` leave them untouched. A
    /// modification patch re-runs the feasibility check against `context`.
    ///
    /// # Errors
    ///
    /// Returns [`AdvisorError::SuggestionNotFound`] if no list holds the id.
    #[instrument(skip_all, fields(suggestion = %review.suggestion_id, decision = ?review.decision))]
    pub fn review(
        &self,
        queue: &mut AnalysisQueue,
        review: &SuggestionReview,
        context: &AnalysisContext,
    ) -> Result<SuggestionStatus> {
        let (list, current) = queue
            .find(&review.suggestion_id)
            .map(|(list, s)| (list, s.status))
            .ok_or_else(|| AdvisorError::SuggestionNotFound {
                id: review.suggestion_id.clone(),
            })?;

        if list != QueueList::Pending {
            log_queue!(
                self.log_config,
                list = list.as_str(),
                "Ignoring review of a suggestion outside pending"
            );
            return Ok(current);
        }

        let next = transition(current, review.decision);
        let index = queue
            .pending
            .iter()
            .position(|s| s.id == review.suggestion_id)
            .ok_or_else(|| AdvisorError::SuggestionNotFound {
                id: review.suggestion_id.clone(),
            })?;
        let mut suggestion = queue.pending.remove(index);

        suggestion.reviewed_at = Some(review.reviewed_at);
        suggestion.reviewed_by.clone_from(&review.reviewed_by);
        suggestion.status = next;

        let destination = match review.decision {
            ReviewDecision::Accept => QueueList::Accepted,
            ReviewDecision::AcceptModified => {
                suggestion.modification_notes.clone_from(&review.reason);
                if let Some(patch) = &review.modifications {
                    patch.apply_to(&mut suggestion.proposed_analysis);
                    suggestion.feasibility =
                        check_feasibility(&suggestion.proposed_analysis, context);
                }
                QueueList::Accepted
            }
            ReviewDecision::Reject => {
                suggestion.modification_notes.clone_from(&review.reason);
                QueueList::Rejected
            }
            ReviewDecision::Defer => QueueList::Pending,
        };

        log_queue!(
            self.log_config,
            from = QueueList::Pending.as_str(),
            to = destination.as_str(),
            status = ?next,
            "Reviewed suggestion"
        );

        if destination == QueueList::Pending {
            // Deferred suggestions keep their place
            queue.pending.insert(index, suggestion);
        } else {
            queue.list_mut(destination).push(suggestion);
        }
        Ok(next)
    }

    /// Runs every accepted suggestion in order and moves it to `executed`.
    ///
    /// A failed run marks the suggestion `failed` with the error attached and
    /// the batch carries on.
    #[instrument(skip_all, fields(accepted = queue.accepted.len()))]
    pub fn execute_accepted<F>(&self, queue: &mut AnalysisQueue, mut run: F) -> BatchSummary
    where
        F: FnMut(&Suggestion) -> AnalysisExecutionResult,
    {
        let mut summary = BatchSummary::default();

        for mut suggestion in std::mem::take(&mut queue.accepted) {
            let result = run(&suggestion);
            if result.success {
                suggestion.status = SuggestionStatus::Executed;
                summary.executed += 1;
            } else {
                warn!(
                    suggestion = %suggestion.id,
                    error = result.error.as_deref().unwrap_or("unknown"),
                    "Execution failed"
                );
                suggestion.status = SuggestionStatus::Failed;
                summary.failed += 1;
            }
            suggestion.executed_at = Some(result.executed_at);
            suggestion.execution_result = Some(result);

            log_queue!(
                self.log_config,
                suggestion = %suggestion.id,
                from = QueueList::Accepted.as_str(),
                to = QueueList::Executed.as_str(),
                "Executed suggestion"
            );
            queue.executed.push(suggestion);
        }

        summary
    }
}
