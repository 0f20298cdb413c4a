//! Service Configuration
//!
//! Read from environment variables (deployment default) or a JSON file.
//!
//! | Variable                 | Meaning                                      | Default |
//! |--------------------------|----------------------------------------------|---------|
//! | `YIELD_MODE`             | `auto` / `heuristic` (alias `production`)    | `auto`  |
//! | `NODE_ENV`               | `production` forces heuristic mode           | -       |
//! | `YIELD_MODEL_PATH`       | JSON model artifact                          | none    |
//! | `YIELD_MODEL_VERSION`    | required artifact version                    | none    |
//! | `YIELD_ITEM_TIMEOUT_MS`  | per-item model budget                        | none    |
//! | `YIELD_BATCH_TIMEOUT_MS` | whole-batch model budget                     | none    |
//! | `YIELD_PARALLEL`         | evaluate large batches with rayon            | `true`  |

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Whether the deployment allows the model path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionMode {
    /// Use the model when an artifact is present and loads
    #[default]
    Auto,
    /// Formula only (lightweight deployments)
    Heuristic,
}

impl PredictionMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" | "model" | "development" => Some(PredictionMode::Auto),
            "heuristic" | "production" | "lightweight" => Some(PredictionMode::Heuristic),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub mode: PredictionMode,
    pub model_path: Option<PathBuf>,
    pub expected_model_version: Option<String>,
    pub item_timeout_ms: Option<u64>,
    pub batch_timeout_ms: Option<u64>,
    pub parallel: bool,
    /// Batches smaller than this run sequentially
    pub parallel_threshold: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            mode: PredictionMode::Auto,
            model_path: None,
            expected_model_version: None,
            item_timeout_ms: None,
            batch_timeout_ms: None,
            parallel: true,
            parallel_threshold: 16,
        }
    }
}

impl ServiceConfig {
    /// Configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Configuration from any key → value lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let production = lookup("NODE_ENV")
            .map(|v| v.eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        let mode = if production {
            PredictionMode::Heuristic
        } else {
            lookup("YIELD_MODE")
                .and_then(|m| PredictionMode::parse(&m))
                .unwrap_or(defaults.mode)
        };

        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            mode,
            model_path: non_empty("YIELD_MODEL_PATH").map(PathBuf::from),
            expected_model_version: non_empty("YIELD_MODEL_VERSION"),
            item_timeout_ms: lookup("YIELD_ITEM_TIMEOUT_MS").and_then(|v| v.trim().parse().ok()),
            batch_timeout_ms: lookup("YIELD_BATCH_TIMEOUT_MS").and_then(|v| v.trim().parse().ok()),
            parallel: lookup("YIELD_PARALLEL")
                .and_then(|v| parse_bool(&v))
                .unwrap_or(defaults.parallel),
            parallel_threshold: defaults.parallel_threshold,
        }
    }

    /// Load configuration from a JSON file; missing keys take defaults
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read service config: {:?}", path))?;

        serde_json::from_str(&contents).with_context(|| "Failed to parse service config JSON")
    }

    pub fn heuristic_only() -> Self {
        Self {
            mode: PredictionMode::Heuristic,
            ..Self::default()
        }
    }

    pub fn with_model(path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: Some(path.into()),
            ..Self::default()
        }
    }

    pub fn item_timeout(&self) -> Option<Duration> {
        self.item_timeout_ms.map(Duration::from_millis)
    }

    pub fn batch_timeout(&self) -> Option<Duration> {
        self.batch_timeout_ms.map(Duration::from_millis)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
