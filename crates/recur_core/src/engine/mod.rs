//! Recurrence evaluation and streak tracking.
//!
//! The engine is a pure function of a task's pattern, its completion log and
//! a caller-supplied "today". It never reads the system clock and never
//! mutates its inputs; every write operation returns a new snapshot.

mod calendar;
mod schedule;
mod status;
mod streak;

pub use schedule::DueDates;
pub use status::{Occurrence, OccurrenceStatus};
pub use streak::StreakSummary;

use crate::error::AppError;
use crate::model::{CompletionStatus, RecurringCompletion, RecurringTaskData};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use time::Date;

/// Decides due dates for `custom` patterns.
pub trait CustomEvaluator: Send + Sync {
    fn is_due(&self, rule: &str, date: Date) -> bool;

    /// First date on or after `from` for which [`CustomEvaluator::is_due`]
    /// holds, or `Ok(None)` when the rule never fires again.
    ///
    /// The default returns `Err(Unsupported)` and the engine falls back to a
    /// day-by-day scan. Sparse rules should implement this to jump ahead.
    fn next_on_or_after(&self, rule: &str, from: Date) -> Result<Option<Date>, Unsupported> {
        let _ = (rule, from);
        Err(Unsupported)
    }
}

/// Returned by [`CustomEvaluator::next_on_or_after`] when an evaluator can
/// only answer point queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unsupported;

impl<F> CustomEvaluator for F
where
    F: Fn(&str, Date) -> bool + Send + Sync,
{
    fn is_due(&self, rule: &str, date: Date) -> bool {
        self(rule, date)
    }
}

/// What `record_completion` does with a date the pattern does not select.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionPolicy {
    /// Reject with `invalid_date`.
    #[default]
    Strict,
    /// Store the entry anyway. It shows up in history but never counts toward a streak.
    AdHoc,
}

impl CompletionPolicy {
    pub fn label(self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::AdHoc => "ad_hoc",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, AppError> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "strict" => Ok(Self::Strict),
            "ad_hoc" | "adhoc" => Ok(Self::AdHoc),
            other => Err(AppError::invalid_input(format!(
                "unknown completion policy '{other}'"
            ))),
        }
    }
}

/// A completion to record against one occurrence date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub date: Date,
    pub status: CompletionStatus,
    pub notes: Option<String>,
    /// RFC 3339 timestamp of when the action was taken.
    pub completed_at: String,
}

#[derive(Clone, Default)]
pub struct RecurrenceEngine {
    policy: CompletionPolicy,
    custom: Option<Arc<dyn CustomEvaluator>>,
}

impl fmt::Debug for RecurrenceEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecurrenceEngine")
            .field("policy", &self.policy)
            .field("custom", &self.custom.is_some())
            .finish()
    }
}

impl RecurrenceEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(mut self, policy: CompletionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_custom_evaluator<E>(mut self, evaluator: E) -> Self
    where
        E: CustomEvaluator + 'static,
    {
        self.custom = Some(Arc::new(evaluator));
        self
    }

    pub fn policy(&self) -> CompletionPolicy {
        self.policy
    }

    fn custom_evaluator(&self) -> Option<&dyn CustomEvaluator> {
        self.custom.as_deref()
    }

    /// Upserts a completion and returns the task with refreshed streaks.
    ///
    /// Under [`CompletionPolicy::Strict`] a date the pattern does not select
    /// is rejected with `invalid_date`. The input task is never modified.
    pub fn record_completion(
        &self,
        task: &RecurringTaskData,
        request: CompletionRequest,
        today: Date,
    ) -> Result<RecurringTaskData, AppError> {
        let pattern = task.pattern()?;
        if self.policy == CompletionPolicy::Strict && !self.is_due(pattern, request.date) {
            return Err(AppError::invalid_date(format!(
                "{} is not a due date for {pattern}",
                request.date
            )));
        }

        let mut log: Vec<RecurringCompletion> = task
            .recurring_completions
            .iter()
            .filter(|entry| entry.date != request.date)
            .cloned()
            .collect();
        log.push(RecurringCompletion {
            date: request.date,
            completed_at: request.completed_at,
            status: request.status,
            notes: request.notes,
        });

        let mut updated = task.clone();
        updated.recurring_completions = normalize_completions(&log);
        let summary = self.compute_streaks(pattern, &updated.recurring_completions, today);
        summary.apply(&mut updated);

        tracing::debug!(
            date = %request.date,
            status = request.status.label(),
            current = summary.current,
            longest = summary.longest,
            "recorded completion"
        );

        Ok(updated)
    }

    /// Recomputes the derived caches of `task` without touching its log
    /// beyond collapsing duplicate dates. One-time tasks come back unchanged.
    pub fn refresh(
        &self,
        task: &RecurringTaskData,
        today: Date,
    ) -> Result<RecurringTaskData, AppError> {
        if !task.is_recurring() {
            return Ok(task.clone());
        }

        let pattern = task.pattern()?;
        let mut updated = task.clone();
        updated.recurring_completions = normalize_completions(&task.recurring_completions);
        self.compute_streaks(pattern, &updated.recurring_completions, today)
            .apply(&mut updated);
        Ok(updated)
    }
}

/// Collapses the log to one entry per date, keeping the entry written last,
/// and orders it by date.
pub fn normalize_completions(log: &[RecurringCompletion]) -> Vec<RecurringCompletion> {
    let mut by_date: BTreeMap<Date, &RecurringCompletion> = BTreeMap::new();
    for entry in log {
        by_date.insert(entry.date, entry);
    }

    let collapsed = log.len() - by_date.len();
    if collapsed > 0 {
        tracing::warn!(collapsed, "collapsed duplicate completion entries");
    }

    by_date.into_values().cloned().collect()
}
