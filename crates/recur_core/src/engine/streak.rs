use super::{RecurrenceEngine, normalize_completions};
use crate::model::{CompletionStatus, RecurrencePattern, RecurringCompletion, RecurringTaskData};
use serde::Serialize;
use std::collections::BTreeMap;
use time::Date;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakSummary {
    pub current: u32,
    pub longest: u32,
    #[serde(with = "crate::iso_date::option")]
    pub last_date: Option<Date>,
}

impl StreakSummary {
    pub(crate) fn apply(&self, task: &mut RecurringTaskData) {
        task.current_streak = self.current;
        task.longest_streak = self.longest;
        task.last_recurring_completion_date = self.last_date;
    }
}

impl RecurrenceEngine {
    /// Current and longest runs of consecutive completed or partial
    /// occurrences, as seen on `today`.
    ///
    /// The current run ends at the latest occurrence on or before `today`.
    /// Today's occurrence is not past due yet: it extends the run when it is
    /// completed or partial and is passed over otherwise, even when skipped.
    /// A skip or a missing entry on any earlier occurrence breaks the run.
    pub fn compute_streaks(
        &self,
        pattern: &RecurrencePattern,
        completions: &[RecurringCompletion],
        today: Date,
    ) -> StreakSummary {
        let log = normalize_completions(completions);
        let statuses: BTreeMap<Date, CompletionStatus> =
            log.iter().map(|entry| (entry.date, entry.status)).collect();

        let last_date = log
            .iter()
            .rev()
            .find(|entry| entry.status.counts_toward_streak())
            .map(|entry| entry.date);

        let horizon = log
            .last()
            .map(|entry| entry.date.max(today))
            .unwrap_or(today);
        let due: Vec<Date> = self
            .due_dates_between(pattern, pattern.start_date(), horizon)
            .collect();
        let counts = |date: &Date| {
            statuses
                .get(date)
                .is_some_and(|status| status.counts_toward_streak())
        };

        let mut longest = 0u32;
        let mut run = 0u32;
        for date in &due {
            if counts(date) {
                run += 1;
                longest = longest.max(run);
            } else {
                run = 0;
            }
        }

        let mut current = 0u32;
        for date in due.iter().rev().filter(|date| **date <= today) {
            if counts(date) {
                current += 1;
            } else if *date == today {
                continue;
            } else {
                break;
            }
        }

        tracing::debug!(current, longest, today = %today, "computed streaks");

        StreakSummary {
            current,
            longest: longest.max(current),
            last_date,
        }
    }
}
