use crate::engine::{CompletionPolicy, RecurrenceEngine};
use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = "config.json";
const CONFIG_ENV_VAR: &str = "RECUR_CONFIG_PATH";
const DEFAULT_UPCOMING_COUNT: usize = 7;
const MAX_UPCOMING_COUNT: usize = 366;

fn default_upcoming_count() -> usize {
    DEFAULT_UPCOMING_COUNT
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default)]
    pub completion_policy: CompletionPolicy,
    #[serde(default = "default_upcoming_count")]
    pub upcoming_count: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            completion_policy: CompletionPolicy::default(),
            upcoming_count: DEFAULT_UPCOMING_COUNT,
        }
    }
}

impl Config {
    pub fn engine(&self) -> RecurrenceEngine {
        RecurrenceEngine::new().with_policy(self.completion_policy)
    }
}

#[derive(Debug, Clone)]
pub struct ConfigLoad {
    pub config: Config,
    pub error: Option<AppError>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub completion_policy: Option<CompletionPolicy>,
    pub upcoming_count: Option<usize>,
}

pub fn config_path() -> Result<PathBuf, AppError> {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR)
        && !path.trim().is_empty()
    {
        return Ok(PathBuf::from(path));
    }

    if cfg!(windows) {
        let appdata =
            std::env::var("APPDATA").map_err(|_| AppError::invalid_data("APPDATA is not set"))?;
        Ok(PathBuf::from(appdata).join("recur").join(CONFIG_FILE_NAME))
    } else {
        let home = std::env::var("HOME").map_err(|_| AppError::invalid_data("HOME is not set"))?;
        Ok(PathBuf::from(home)
            .join(".config")
            .join("recur")
            .join(CONFIG_FILE_NAME))
    }
}

/// Loads the config, falling back to defaults. A missing file is not an
/// error; an unreadable or invalid one is reported alongside the defaults.
pub fn load_config_with_fallback() -> ConfigLoad {
    match config_path() {
        Ok(path) => load_config_with_fallback_from_path(&path),
        Err(err) => ConfigLoad {
            config: Config::default(),
            error: Some(err),
        },
    }
}

fn load_config_with_fallback_from_path(path: &Path) -> ConfigLoad {
    if !path.exists() {
        return ConfigLoad {
            config: Config::default(),
            error: None,
        };
    }

    match load_config_from_path(path) {
        Ok(config) => ConfigLoad {
            config,
            error: None,
        },
        Err(err) => ConfigLoad {
            config: Config::default(),
            error: Some(err),
        },
    }
}

fn load_config_from_path(path: &Path) -> Result<Config, AppError> {
    let content = std::fs::read_to_string(path)
        .map_err(|err| AppError::io(format!("{}: {}", path.display(), err)))?;
    let config: Config = serde_json::from_str(&content).map_err(|err| {
        AppError::invalid_data(format!("invalid JSON in {}: {}", path.display(), err))
    })?;
    validate_upcoming_count(config.upcoming_count)
        .map_err(|err| AppError::invalid_data(format!("{}: {}", path.display(), err.message())))?;
    Ok(config)
}

pub fn validate_upcoming_count(count: usize) -> Result<usize, AppError> {
    if (1..=MAX_UPCOMING_COUNT).contains(&count) {
        Ok(count)
    } else {
        Err(AppError::invalid_input(format!(
            "upcoming count must be between 1 and {MAX_UPCOMING_COUNT}"
        )))
    }
}

pub fn merge_overrides(base: &Config, overrides: &ConfigOverrides) -> Config {
    let mut merged = base.clone();
    if let Some(policy) = overrides.completion_policy {
        merged.completion_policy = policy;
    }
    if let Some(count) = overrides.upcoming_count {
        merged.upcoming_count = count;
    }
    merged
}
