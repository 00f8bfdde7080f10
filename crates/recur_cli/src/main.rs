use clap::Parser;
use clap::error::ErrorKind;
use recur_cli::cli::{Cli, Command, ConfigOverrideTarget, parse_config_override};
use recur_core::config::{self, Config, ConfigOverrides};
use recur_core::engine::{CompletionPolicy, Occurrence, StreakSummary};
use recur_core::error::AppError;
use recur_core::model::{CompletionStatus, Task, parse_date};
use recur_core::task_api::{self, CompletionInput, TaskOverview};
use tabled::settings::Style;
use tabled::{Table, Tabled};
use time::{Date, OffsetDateTime, UtcOffset};
use tracing_subscriber::EnvFilter;

const LOG_ENV_VAR: &str = "RECUR_LOG";

#[derive(Tabled)]
struct TaskRow {
    id: String,
    title: String,
    #[tabled(rename = "type")]
    kind: &'static str,
    due: &'static str,
    current: u32,
    longest: u32,
    #[tabled(rename = "last completed")]
    last_completed: String,
}

#[derive(Tabled)]
struct HistoryRow {
    date: String,
    day: String,
    due: &'static str,
    status: &'static str,
    notes: String,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .ok();
}

fn local_today() -> Date {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    OffsetDateTime::now_utc().to_offset(offset).date()
}

fn optional_date(raw: Option<&str>, fallback: Date) -> Result<Date, AppError> {
    raw.map(parse_date).transpose().map(|date| date.unwrap_or(fallback))
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

fn format_optional_date(date: Option<Date>) -> String {
    date.map(|date| date.to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn resolve_config(raw_overrides: &[String]) -> Result<Config, AppError> {
    let loaded = config::load_config_with_fallback();
    if let Some(err) = loaded.error.as_ref() {
        tracing::warn!(error = %err, "falling back to default configuration");
    }

    let mut overrides = ConfigOverrides::default();
    for raw in raw_overrides {
        let parsed = parse_config_override(raw).map_err(AppError::invalid_input)?;
        match parsed.target {
            ConfigOverrideTarget::CompletionPolicy => {
                overrides.completion_policy = Some(CompletionPolicy::parse(&parsed.value)?);
            }
            ConfigOverrideTarget::UpcomingCount => {
                let count = parsed.value.parse::<usize>().map_err(|_| {
                    AppError::invalid_input(format!(
                        "'{}' is not a valid upcoming count",
                        parsed.value
                    ))
                })?;
                overrides.upcoming_count = Some(config::validate_upcoming_count(count)?);
            }
        }
    }

    Ok(config::merge_overrides(&loaded.config, &overrides))
}

fn print_task_table(overviews: &[TaskOverview]) {
    if overviews.is_empty() {
        println!("No tasks");
        return;
    }

    let rows: Vec<TaskRow> = overviews
        .iter()
        .map(|overview| {
            let data = &overview.task.data;
            TaskRow {
                id: overview.task.id.clone(),
                title: overview.task.title.clone(),
                kind: data.task_type.label(),
                due: yes_no(overview.due_today),
                current: data.current_streak,
                longest: data.longest_streak,
                last_completed: format_optional_date(data.last_recurring_completion_date),
            }
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::psql());
    println!("{table}");
}

fn task_summary_json(task: &Task, due_today: Option<bool>) -> serde_json::Value {
    let mut value = serde_json::json!({
        "id": task.id,
        "title": task.title,
        "taskType": task.data.task_type.label(),
        "currentStreak": task.data.current_streak,
        "longestStreak": task.data.longest_streak,
        "lastRecurringCompletionDate": task
            .data
            .last_recurring_completion_date
            .map(|date| date.to_string()),
    });
    if let Some(due_today) = due_today {
        value["dueToday"] = serde_json::Value::Bool(due_today);
    }
    value
}

fn print_history(task: &Task, rows: &[Occurrence]) {
    if rows.is_empty() {
        println!("No occurrences for {} ({})", task.title, task.id);
        return;
    }

    let rows: Vec<HistoryRow> = rows
        .iter()
        .map(|row| HistoryRow {
            date: row.date.to_string(),
            day: row.date.weekday().to_string(),
            due: yes_no(row.due),
            status: row.status.label(),
            notes: row.notes.clone().unwrap_or_default(),
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::psql());
    println!("{table}");
}

fn print_streak(task: &Task, summary: &StreakSummary) {
    println!(
        "Streak for {} ({}): current {}, longest {}, last completed {}",
        task.title,
        task.id,
        summary.current,
        summary.longest,
        format_optional_date(summary.last_date)
    );
}

fn normalize_parse_error(err: clap::Error) -> AppError {
    let rendered = err.to_string();
    let first_line = rendered.lines().next().unwrap_or("invalid command").trim();
    let message = first_line
        .strip_prefix("error: ")
        .unwrap_or(first_line)
        .to_string();
    AppError::invalid_input(message)
}

fn run_command(cli: Cli) -> Result<(), AppError> {
    let config = resolve_config(&cli.config_override)?;
    let engine = config.engine();
    let today = optional_date(cli.today.as_deref(), local_today())?;
    tracing::debug!(today = %today, policy = config.completion_policy.label(), "resolved runtime");

    match cli.command {
        Command::List => {
            let overviews = task_api::list_tasks(&engine, today)?;
            if cli.json {
                let payload: Vec<serde_json::Value> = overviews
                    .iter()
                    .map(|overview| task_summary_json(&overview.task, Some(overview.due_today)))
                    .collect();
                println!("{}", serde_json::Value::Array(payload));
            } else {
                print_task_table(&overviews);
            }
        }
        Command::Due { date } => {
            let date = optional_date(date.as_deref(), today)?;
            let tasks = task_api::due_on(&engine, date, today)?;
            if cli.json {
                let payload: Vec<serde_json::Value> = tasks
                    .iter()
                    .map(|task| task_summary_json(task, None))
                    .collect();
                println!("{}", serde_json::Value::Array(payload));
            } else if tasks.is_empty() {
                println!("Nothing due on {date}");
            } else {
                for task in &tasks {
                    println!(
                        "{} | {} | streak {}",
                        task.id, task.title, task.data.current_streak
                    );
                }
            }
        }
        Command::Upcoming { id, from, count } => {
            let from = optional_date(from.as_deref(), today)?;
            let count = match count {
                Some(count) => config::validate_upcoming_count(count)?,
                None => config.upcoming_count,
            };
            let (task, dates) = task_api::upcoming(&engine, &id, from, count)?;
            if cli.json {
                let dates: Vec<String> = dates.iter().map(|date| date.to_string()).collect();
                println!(
                    "{}",
                    serde_json::json!({ "id": task.id, "from": from.to_string(), "dates": dates })
                );
            } else if dates.is_empty() {
                println!("No upcoming dates for {} ({})", task.title, task.id);
            } else {
                println!("Upcoming for {} ({}):", task.title, task.id);
                for date in &dates {
                    println!("{} {}", date, date.weekday());
                }
            }
        }
        Command::Streak { id } => {
            let (task, summary) = task_api::streak(&engine, &id, today)?;
            if cli.json {
                let mut value = serde_json::to_value(summary)?;
                value["id"] = serde_json::Value::String(task.id.clone());
                println!("{value}");
            } else {
                print_streak(&task, &summary);
            }
        }
        Command::Status { id, date } => {
            let date = parse_date(&date)?;
            let (task, status) = task_api::status(&engine, &id, date, today)?;
            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({
                        "id": task.id,
                        "date": date.to_string(),
                        "status": status,
                    })
                );
            } else {
                println!("{} ({}) on {}: {}", task.title, task.id, date, status.label());
            }
        }
        Command::History { id, from, to } => {
            let from = parse_date(&from)?;
            let to = parse_date(&to)?;
            let (task, rows) = task_api::history(&engine, &id, from, to, today)?;
            if cli.json {
                println!("{}", serde_json::to_value(&rows)?);
            } else {
                print_history(&task, &rows);
            }
        }
        Command::Record {
            id,
            date,
            status,
            notes,
        } => {
            let input = CompletionInput {
                date: parse_date(&date)?,
                status: CompletionStatus::parse(&status)?,
                notes: notes.as_deref(),
                completed_at: OffsetDateTime::now_utc(),
            };
            let recorded = input.status;
            let task = task_api::record_completion(&engine, &id, input, today)?;
            if cli.json {
                println!("{}", serde_json::to_value(&task)?);
            } else {
                println!(
                    "Recorded {} for {} ({}) on {}; streak {} (longest {})",
                    recorded.label(),
                    task.title,
                    task.id,
                    date.trim(),
                    task.data.current_streak,
                    task.data.longest_streak
                );
            }
        }
        Command::Validate => {
            let count = task_api::validate(&engine, today)?;
            if cli.json {
                println!("{}", serde_json::json!({ "tasks": count, "valid": true }));
            } else {
                println!("{count} tasks OK");
            }
        }
    }

    Ok(())
}

fn main() {
    init_tracing();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(err) => {
            eprintln!("ERROR: {}", normalize_parse_error(err));
            std::process::exit(1);
        }
    };

    if let Err(err) = run_command(cli) {
        eprintln!("ERROR: {}", err);
        std::process::exit(1);
    }
}
