use super::{RecurrencePattern, RecurringCompletion};
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use time::Date;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskType {
    OneTime,
    Recurring,
    Habit,
}

impl TaskType {
    pub fn label(self) -> &'static str {
        match self {
            Self::OneTime => "one-time",
            Self::Recurring => "recurring",
            Self::Habit => "habit",
        }
    }
}

/// Recurrence state attached to a task.
///
/// `current_streak`, `longest_streak` and `last_recurring_completion_date`
/// are caches derived from the pattern and the completion log; the engine
/// overwrites them on every evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurringTaskData {
    pub task_type: TaskType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence_pattern: Option<RecurrencePattern>,
    #[serde(default)]
    pub recurring_completions: Vec<RecurringCompletion>,
    #[serde(default)]
    pub current_streak: u32,
    #[serde(default)]
    pub longest_streak: u32,
    #[serde(
        default,
        with = "crate::iso_date::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_recurring_completion_date: Option<Date>,
}

impl RecurringTaskData {
    pub fn one_time() -> Self {
        Self::with_type(TaskType::OneTime, None)
    }

    pub fn recurring(pattern: RecurrencePattern) -> Self {
        Self::with_type(TaskType::Recurring, Some(pattern))
    }

    pub fn habit(pattern: RecurrencePattern) -> Self {
        Self::with_type(TaskType::Habit, Some(pattern))
    }

    fn with_type(task_type: TaskType, recurrence_pattern: Option<RecurrencePattern>) -> Self {
        Self {
            task_type,
            recurrence_pattern,
            recurring_completions: Vec::new(),
            current_streak: 0,
            longest_streak: 0,
            last_recurring_completion_date: None,
        }
    }

    /// One-time tasks never consult the recurrence engine.
    pub fn is_recurring(&self) -> bool {
        self.task_type != TaskType::OneTime
    }

    pub fn pattern(&self) -> Result<&RecurrencePattern, AppError> {
        if !self.is_recurring() {
            return Err(AppError::invalid_input("one-time tasks do not recur"));
        }
        self.recurrence_pattern.as_ref().ok_or_else(|| {
            AppError::invalid_data(format!(
                "{} task is missing recurrencePattern",
                self.task_type.label()
            ))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub created_at: String,
    #[serde(flatten)]
    pub data: RecurringTaskData,
}
