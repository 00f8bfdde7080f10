use crate::error::AppError;
use serde::{Deserialize, Serialize};
use time::Date;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionStatus {
    #[default]
    Completed,
    Skipped,
    Partial,
}

impl CompletionStatus {
    /// Completed and partial entries keep a streak alive; skips break it.
    pub fn counts_toward_streak(self) -> bool {
        matches!(self, Self::Completed | Self::Partial)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Skipped => "skipped",
            Self::Partial => "partial",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, AppError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "completed" | "done" => Ok(Self::Completed),
            "skipped" | "skip" => Ok(Self::Skipped),
            "partial" => Ok(Self::Partial),
            other => Err(AppError::invalid_input(format!(
                "unknown completion status '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurringCompletion {
    #[serde(with = "crate::iso_date")]
    pub date: Date,
    pub completed_at: String,
    #[serde(default)]
    pub status: CompletionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}
