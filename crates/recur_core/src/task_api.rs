use crate::engine::{CompletionRequest, Occurrence, OccurrenceStatus, RecurrenceEngine, StreakSummary};
use crate::error::AppError;
use crate::model::{CompletionStatus, Task};
use crate::storage::json_store;
use std::path::Path;
use time::format_description::well_known::Rfc3339;
use time::{Date, OffsetDateTime};

#[derive(Debug, Clone)]
pub struct TaskOverview {
    pub task: Task,
    pub due_today: bool,
}

#[derive(Debug, Clone)]
pub struct CompletionInput<'a> {
    pub date: Date,
    pub status: CompletionStatus,
    pub notes: Option<&'a str>,
    /// When the action was taken; stored as RFC 3339 in UTC.
    pub completed_at: OffsetDateTime,
}

pub fn list_tasks(engine: &RecurrenceEngine, today: Date) -> Result<Vec<TaskOverview>, AppError> {
    let path = json_store::store_path()?;
    list_tasks_with_path(&path, engine, today)
}

pub fn due_on(engine: &RecurrenceEngine, date: Date, today: Date) -> Result<Vec<Task>, AppError> {
    let path = json_store::store_path()?;
    due_on_with_path(&path, engine, date, today)
}

pub fn upcoming(
    engine: &RecurrenceEngine,
    id: &str,
    from: Date,
    count: usize,
) -> Result<(Task, Vec<Date>), AppError> {
    let path = json_store::store_path()?;
    upcoming_with_path(&path, engine, id, from, count)
}

pub fn streak(
    engine: &RecurrenceEngine,
    id: &str,
    today: Date,
) -> Result<(Task, StreakSummary), AppError> {
    let path = json_store::store_path()?;
    streak_with_path(&path, engine, id, today)
}

pub fn status(
    engine: &RecurrenceEngine,
    id: &str,
    date: Date,
    today: Date,
) -> Result<(Task, OccurrenceStatus), AppError> {
    let path = json_store::store_path()?;
    status_with_path(&path, engine, id, date, today)
}

pub fn history(
    engine: &RecurrenceEngine,
    id: &str,
    from: Date,
    to: Date,
    today: Date,
) -> Result<(Task, Vec<Occurrence>), AppError> {
    let path = json_store::store_path()?;
    history_with_path(&path, engine, id, from, to, today)
}

pub fn record_completion(
    engine: &RecurrenceEngine,
    id: &str,
    input: CompletionInput<'_>,
    today: Date,
) -> Result<Task, AppError> {
    let path = json_store::store_path()?;
    record_completion_with_path(&path, engine, id, input, today)
}

pub fn validate(engine: &RecurrenceEngine, today: Date) -> Result<usize, AppError> {
    let path = json_store::store_path()?;
    validate_with_path(&path, engine, today)
}

fn find_task(tasks: Vec<Task>, id: &str) -> Result<Task, AppError> {
    let trimmed_id = id.trim();
    if trimmed_id.is_empty() {
        return Err(AppError::invalid_input("id is required"));
    }

    tasks
        .into_iter()
        .find(|task| task.id == trimmed_id)
        .ok_or_else(|| AppError::invalid_input("task not found"))
}

fn load_task(path: &Path, id: &str) -> Result<Task, AppError> {
    find_task(json_store::load_tasks(path)?, id)
}

fn list_tasks_with_path(
    path: &Path,
    engine: &RecurrenceEngine,
    today: Date,
) -> Result<Vec<TaskOverview>, AppError> {
    let tasks = json_store::load_tasks(path)?;
    let mut overviews = Vec::with_capacity(tasks.len());
    for mut task in tasks {
        task.data = engine.refresh(&task.data, today)?;
        let due_today = match task.data.pattern() {
            Ok(pattern) => engine.is_due(pattern, today),
            Err(_) => false,
        };
        overviews.push(TaskOverview { task, due_today });
    }
    Ok(overviews)
}

fn due_on_with_path(
    path: &Path,
    engine: &RecurrenceEngine,
    date: Date,
    today: Date,
) -> Result<Vec<Task>, AppError> {
    let mut due = Vec::new();
    for mut task in json_store::load_tasks(path)? {
        if !task.data.is_recurring() {
            continue;
        }
        if engine.is_due(task.data.pattern()?, date) {
            task.data = engine.refresh(&task.data, today)?;
            due.push(task);
        }
    }
    Ok(due)
}

fn upcoming_with_path(
    path: &Path,
    engine: &RecurrenceEngine,
    id: &str,
    from: Date,
    count: usize,
) -> Result<(Task, Vec<Date>), AppError> {
    let task = load_task(path, id)?;
    let dates = engine
        .next_due_dates(task.data.pattern()?, from, count)
        .collect();
    Ok((task, dates))
}

fn streak_with_path(
    path: &Path,
    engine: &RecurrenceEngine,
    id: &str,
    today: Date,
) -> Result<(Task, StreakSummary), AppError> {
    let task = load_task(path, id)?;
    let summary = engine.compute_streaks(
        task.data.pattern()?,
        &task.data.recurring_completions,
        today,
    );
    Ok((task, summary))
}

fn status_with_path(
    path: &Path,
    engine: &RecurrenceEngine,
    id: &str,
    date: Date,
    today: Date,
) -> Result<(Task, OccurrenceStatus), AppError> {
    let task = load_task(path, id)?;
    let status = engine.status_on(
        task.data.pattern()?,
        &task.data.recurring_completions,
        date,
        today,
    );
    Ok((task, status))
}

fn history_with_path(
    path: &Path,
    engine: &RecurrenceEngine,
    id: &str,
    from: Date,
    to: Date,
    today: Date,
) -> Result<(Task, Vec<Occurrence>), AppError> {
    if from > to {
        return Err(AppError::invalid_input("--from must not be after --to"));
    }

    let task = load_task(path, id)?;
    let rows = engine.history(
        task.data.pattern()?,
        &task.data.recurring_completions,
        from,
        to,
        today,
    );
    Ok((task, rows))
}

fn record_completion_with_path(
    path: &Path,
    engine: &RecurrenceEngine,
    id: &str,
    input: CompletionInput<'_>,
    today: Date,
) -> Result<Task, AppError> {
    let trimmed_id = id.trim();
    if trimmed_id.is_empty() {
        return Err(AppError::invalid_input("id is required"));
    }

    let notes = match input.notes {
        Some(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return Err(AppError::invalid_input("notes must not be blank"));
            }
            Some(trimmed.to_string())
        }
        None => None,
    };

    let completed_at = input
        .completed_at
        .to_offset(time::UtcOffset::UTC)
        .format(&Rfc3339)
        .map_err(|err| AppError::invalid_data(err.to_string()))?;

    let mut tasks = json_store::load_tasks(path)?;
    let task = tasks
        .iter_mut()
        .find(|task| task.id == trimmed_id)
        .ok_or_else(|| AppError::invalid_input("task not found"))?;

    let request = CompletionRequest {
        date: input.date,
        status: input.status,
        notes,
        completed_at,
    };
    task.data = engine.record_completion(&task.data, request, today)?;
    let updated = task.clone();

    json_store::save_tasks(path, &tasks)?;
    tracing::debug!(task_id = %updated.id, date = %input.date, "saved completion");

    Ok(updated)
}

fn validate_with_path(
    path: &Path,
    engine: &RecurrenceEngine,
    today: Date,
) -> Result<usize, AppError> {
    let tasks = json_store::load_tasks(path)?;
    for task in &tasks {
        engine.refresh(&task.data, today).map_err(|err| {
            AppError::invalid_data(format!("task '{}': {}", task.id, err.message()))
        })?;
    }
    Ok(tasks.len())
}
