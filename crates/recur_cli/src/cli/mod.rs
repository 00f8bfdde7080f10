use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about = "Recurring task and habit tracker", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Evaluate as if today were this date (YYYY-MM-DD)
    #[arg(long, value_name = "DATE", global = true)]
    pub today: Option<String>,

    /// Override configuration values (format KEY=VALUE)
    #[arg(long = "config-override", value_name = "KEY=VALUE", global = true)]
    pub config_override: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List all tasks with their streaks
    ///
    /// Example: recur list
    List,
    /// List recurring tasks due on a date (defaults to today)
    ///
    /// Example: recur due --date 2024-01-15
    Due {
        #[arg(long, value_name = "DATE")]
        date: Option<String>,
    },
    /// Show the next due dates of a task
    ///
    /// Example: recur upcoming journal --count 5
    Upcoming {
        id: String,
        #[arg(long, value_name = "DATE")]
        from: Option<String>,
        #[arg(long)]
        count: Option<usize>,
    },
    /// Show the current and longest streak of a task
    ///
    /// Example: recur streak journal
    Streak { id: String },
    /// Show the status of a task on one date
    ///
    /// Example: recur status journal 2024-01-03
    Status { id: String, date: String },
    /// Show every occurrence of a task in a date range
    ///
    /// Example: recur history journal --from 2024-01-01 --to 2024-01-31
    History {
        id: String,
        #[arg(long, value_name = "DATE")]
        from: String,
        #[arg(long, value_name = "DATE")]
        to: String,
    },
    /// Record a completion, skip or partial completion for a due date
    ///
    /// Example: recur record journal 2024-01-03
    /// Example: recur record journal 2024-01-04 --status skipped -m "travelling"
    Record {
        id: String,
        date: String,
        #[arg(long, default_value = "completed")]
        status: String,
        #[arg(short = 'm', long = "notes", value_name = "NOTES")]
        notes: Option<String>,
    },
    /// Check that every task in the task file is well formed
    ///
    /// Example: recur validate
    Validate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigOverrideTarget {
    CompletionPolicy,
    UpcomingCount,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedConfigOverride {
    pub target: ConfigOverrideTarget,
    pub value: String,
}

/// Parse a raw `KEY=VALUE` override string into a structured target.
pub fn parse_config_override(raw: &str) -> Result<ParsedConfigOverride, String> {
    let trimmed = raw.trim();
    let (key_raw, value_raw) = trimmed
        .split_once('=')
        .ok_or_else(|| "override must be in KEY=VALUE format".to_string())?;

    let value = value_raw.trim().to_string();
    if value.is_empty() {
        return Err("override value cannot be empty".to_string());
    }

    let canonical_field = canonicalize_flag_name(key_raw)
        .ok_or_else(|| "override key cannot be empty".to_string())?;

    let target = match canonical_field.as_str() {
        "policy" | "completion_policy" => ConfigOverrideTarget::CompletionPolicy,
        "upcoming" | "upcoming_count" => ConfigOverrideTarget::UpcomingCount,
        other => return Err(format!("unknown config field '{other}'")),
    };

    Ok(ParsedConfigOverride { target, value })
}

fn canonicalize_flag_name(name: &str) -> Option<String> {
    let mut cleaned = String::new();
    let mut previous_underscore = false;

    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            cleaned.push(ch.to_ascii_lowercase());
            previous_underscore = false;
        } else if !previous_underscore && !cleaned.is_empty() {
            cleaned.push('_');
            previous_underscore = true;
        }
    }

    let trimmed = cleaned.trim_matches('_');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
