//! Configuration system for the CRS Arena evaluator.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> overrides.
//! Configuration is loaded from `~/.config/crs-arena/config.toml` and/or `.crs-arena/config.toml`
//! in the workspace directory.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::aggregate::DEFAULT_MIN_TURN_PAIRS;
use crate::error::{EvalError, Result};
use crate::evaluation::EvalOptions;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArenaConfig {
    #[serde(default)]
    pub gold: GoldConfig,
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    #[serde(default)]
    pub report: ReportConfig,
}

/// Where the gold annotations live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoldConfig {
    /// File path or `http(s)://` URL of the gold document.
    #[serde(default = "default_gold_location")]
    pub location: String,
    /// Request timeout for HTTP locations (seconds).
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GoldConfig {
    fn default() -> Self {
        Self {
            location: default_gold_location(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_gold_location() -> String {
    "crs_arena_eval/crs_arena_eval.json".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Minimum matched pairs for a turn index to appear in the turn trend.
    #[serde(default = "default_min_turn_pairs")]
    pub min_turn_pairs: usize,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            min_turn_pairs: default_min_turn_pairs(),
        }
    }
}

fn default_min_turn_pairs() -> usize {
    DEFAULT_MIN_TURN_PAIRS
}

impl EvaluationConfig {
    pub fn options(&self) -> EvalOptions {
        EvalOptions {
            min_turn_pairs: self.min_turn_pairs,
        }
    }
}

/// Report output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default)]
    pub format: OutputFormat,
    /// Decimal places for metric values.
    #[serde(default = "default_precision")]
    pub precision: usize,
    /// Highest turn index shown in the turn trend.
    #[serde(default = "default_max_trend_turn")]
    pub max_trend_turn: i64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::default(),
            precision: default_precision(),
            max_trend_turn: default_max_trend_turn(),
        }
    }
}

fn default_precision() -> usize {
    3
}

fn default_max_trend_turn() -> i64 {
    15
}

fn user_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("org", "crs-arena", "crs-arena")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

fn workspace_config_path(workspace: &Path) -> PathBuf {
    workspace.join(".crs-arena").join("config.toml")
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `CRS_ARENA_`)
/// 3. Workspace-local config (`.crs-arena/config.toml`)
/// 4. User config (`~/.config/crs-arena/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&ArenaConfig>,
) -> std::result::Result<ArenaConfig, Box<figment::Error>> {
    let mut figment = Figment::from(Serialized::defaults(ArenaConfig::default()));

    if let Some(user_config) = user_config_path() {
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = workspace_config_path(ws);
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // CRS_ARENA_GOLD__LOCATION, CRS_ARENA_REPORT__FORMAT, ...
    figment = figment.merge(Env::prefixed("CRS_ARENA_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    figment.extract().map_err(Box::new)
}

/// Whether a user-level or workspace-level config file exists.
pub fn config_exists(workspace: Option<&Path>) -> bool {
    if user_config_path().is_some_and(|p| p.exists()) {
        return true;
    }
    workspace.is_some_and(|ws| workspace_config_path(ws).exists())
}

/// Write `config` to the workspace config file, creating `.crs-arena/` if needed.
/// Returns the path written.
pub fn save_workspace_config(workspace: &Path, config: &ArenaConfig) -> Result<PathBuf> {
    let path = workspace_config_path(workspace);
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let toml_str = toml::to_string_pretty(config).map_err(|e| EvalError::Config(e.to_string()))?;
    std::fs::write(&path, toml_str)?;
    Ok(path)
}
