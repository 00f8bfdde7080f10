mod completion;
mod pattern;
mod task;

pub use completion::{CompletionStatus, RecurringCompletion};
pub use pattern::{RecurrencePattern, Rule, WeekdaySet};
pub use task::{RecurringTaskData, Task, TaskType};

use crate::error::AppError;
use time::Date;
use time::macros::format_description;

/// Parses a `YYYY-MM-DD` calendar date.
pub fn parse_date(raw: &str) -> Result<Date, AppError> {
    let trimmed = raw.trim();
    Date::parse(trimmed, format_description!("[year]-[month]-[day]"))
        .map_err(|_| AppError::invalid_date(format!("'{trimmed}' is not a YYYY-MM-DD date")))
}
