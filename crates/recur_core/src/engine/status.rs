use super::{RecurrenceEngine, normalize_completions};
use crate::model::{CompletionStatus, RecurrencePattern, RecurringCompletion};
use serde::Serialize;
use std::collections::BTreeMap;
use time::Date;

/// Where a single calendar date stands for a task, as seen on some "today".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OccurrenceStatus {
    Completed,
    Partial,
    Skipped,
    /// Due before today with nothing recorded.
    Missed,
    /// Due today with nothing recorded yet.
    Pending,
    Upcoming,
    NotDue,
}

impl OccurrenceStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Partial => "partial",
            Self::Skipped => "skipped",
            Self::Missed => "missed",
            Self::Pending => "pending",
            Self::Upcoming => "upcoming",
            Self::NotDue => "not_due",
        }
    }

    fn classify(due: bool, recorded: Option<CompletionStatus>, date: Date, today: Date) -> Self {
        match recorded {
            Some(CompletionStatus::Completed) => Self::Completed,
            Some(CompletionStatus::Partial) => Self::Partial,
            Some(CompletionStatus::Skipped) => Self::Skipped,
            None if !due => Self::NotDue,
            None if date < today => Self::Missed,
            None if date == today => Self::Pending,
            None => Self::Upcoming,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Occurrence {
    #[serde(with = "crate::iso_date")]
    pub date: Date,
    pub due: bool,
    pub status: OccurrenceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl RecurrenceEngine {
    pub fn status_on(
        &self,
        pattern: &RecurrencePattern,
        completions: &[RecurringCompletion],
        date: Date,
        today: Date,
    ) -> OccurrenceStatus {
        // Later entries win, matching log normalization.
        let recorded = completions
            .iter()
            .rev()
            .find(|entry| entry.date == date)
            .map(|entry| entry.status);
        OccurrenceStatus::classify(self.is_due(pattern, date), recorded, date, today)
    }

    /// Every occurrence in `[from, to]` plus any entries logged on other
    /// dates in that window, ordered by date.
    pub fn history(
        &self,
        pattern: &RecurrencePattern,
        completions: &[RecurringCompletion],
        from: Date,
        to: Date,
        today: Date,
    ) -> Vec<Occurrence> {
        let log = normalize_completions(completions);
        let mut rows: BTreeMap<Date, Occurrence> = self
            .due_dates_between(pattern, from, to)
            .map(|date| {
                let row = Occurrence {
                    date,
                    due: true,
                    status: OccurrenceStatus::classify(true, None, date, today),
                    notes: None,
                };
                (date, row)
            })
            .collect();

        for entry in log.iter().filter(|entry| entry.date >= from && entry.date <= to) {
            let due = rows.contains_key(&entry.date);
            rows.insert(
                entry.date,
                Occurrence {
                    date: entry.date,
                    due,
                    status: OccurrenceStatus::classify(due, Some(entry.status), entry.date, today),
                    notes: entry.notes.clone(),
                },
            );
        }

        rows.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::OccurrenceStatus;
    use crate::engine::{CompletionPolicy, CompletionRequest, RecurrenceEngine};
    use crate::model::{
        CompletionStatus, RecurrencePattern, RecurringCompletion, RecurringTaskData, Rule,
    };
    use time::macros::date;

    fn entry(date: time::Date, status: CompletionStatus) -> RecurringCompletion {
        RecurringCompletion {
            date,
            completed_at: format!("{date}T07:30:00Z"),
            status,
            notes: None,
        }
    }

    #[test]
    fn status_on_classifies_each_case() {
        let engine = RecurrenceEngine::new();
        let pattern = RecurrencePattern::daily(date!(2024 - 01 - 01))
            .with_frequency(2)
            .unwrap();
        let log = vec![
            entry(date!(2024 - 01 - 01), CompletionStatus::Partial),
            entry(date!(2024 - 01 - 03), CompletionStatus::Skipped),
        ];
        let today = date!(2024 - 01 - 07);
        let status = |date| engine.status_on(&pattern, &log, date, today);

        assert_eq!(status(date!(2024 - 01 - 01)), OccurrenceStatus::Partial);
        assert_eq!(status(date!(2024 - 01 - 03)), OccurrenceStatus::Skipped);
        assert_eq!(status(date!(2024 - 01 - 05)), OccurrenceStatus::Missed);
        assert_eq!(status(date!(2024 - 01 - 07)), OccurrenceStatus::Pending);
        assert_eq!(status(date!(2024 - 01 - 09)), OccurrenceStatus::Upcoming);
        assert_eq!(status(date!(2024 - 01 - 06)), OccurrenceStatus::NotDue);
        assert_eq!(status(date!(2023 - 12 - 30)), OccurrenceStatus::NotDue);
    }

    #[test]
    fn history_includes_ad_hoc_entries() {
        let engine = RecurrenceEngine::new().with_policy(CompletionPolicy::AdHoc);
        let pattern = RecurrencePattern::new(Rule::Monthly { day: 1 }, date!(2024 - 01 - 01)).unwrap();
        let task = RecurringTaskData::recurring(pattern.clone());
        let task = engine
            .record_completion(
                &task,
                CompletionRequest {
                    date: date!(2024 - 01 - 15),
                    status: CompletionStatus::Completed,
                    notes: Some("caught up".to_string()),
                    completed_at: "2024-01-15T18:00:00Z".to_string(),
                },
                date!(2024 - 01 - 15),
            )
            .unwrap();

        let rows = engine.history(
            &pattern,
            &task.recurring_completions,
            date!(2024 - 01 - 01),
            date!(2024 - 02 - 29),
            date!(2024 - 02 - 01),
        );

        let summary: Vec<(time::Date, bool, OccurrenceStatus)> =
            rows.iter().map(|row| (row.date, row.due, row.status)).collect();
        assert_eq!(
            summary,
            vec![
                (date!(2024 - 01 - 01), true, OccurrenceStatus::Missed),
                (date!(2024 - 01 - 15), false, OccurrenceStatus::Completed),
                (date!(2024 - 02 - 01), true, OccurrenceStatus::Pending),
            ]
        );
        assert_eq!(rows[1].notes.as_deref(), Some("caught up"));
    }

    #[test]
    fn history_serializes_dates_as_iso_strings() {
        let engine = RecurrenceEngine::new();
        let pattern = RecurrencePattern::daily(date!(2024 - 01 - 01));
        let rows = engine.history(&pattern, &[], date!(2024 - 01 - 01), date!(2024 - 01 - 01), date!(2024 - 01 - 02));

        let json = serde_json::to_value(&rows).unwrap();
        assert_eq!(
            json,
            serde_json::json!([{ "date": "2024-01-01", "due": true, "status": "missed" }])
        );
    }
}
