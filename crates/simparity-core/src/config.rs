//! TOML configuration for SimParity.
//!
//! Every section is optional, so an empty file is a valid configuration:
//!
//! ```toml
//! [workload]
//! prompts = "data/prompts.jsonl"
//! num_decode_tokens = 128
//! tokenizer = "whitespace"
//!
//! [workload.arrival]
//! kind = "poisson"
//! seed = 42
//! poisson_rate_per_s = 2.0
//!
//! [real]
//! backend = "synthetic"
//! max_sleep_ms = 50
//!
//! [real.synthetic]
//! prefill_tokens_per_sec = 50000
//! decode_tokens_per_sec = 80
//!
//! [compare]
//! percentiles = [0.5, 0.9, 0.99]
//! exclude_errors = false
//! ```

use crate::compare::DEFAULT_PERCENTILES;
use crate::replay::ReplayOptions;
use crate::report::ReportOptions;
use crate::schedule::{ArrivalKind, ArrivalScheduleConfig};
use serde::{Deserialize, Serialize};
use simparity_backends::{available_backends, available_tokenizers, SyntheticBackendConfig};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid configuration: {0}")]
    Validation(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimParityConfig {
    #[serde(default)]
    pub workload: WorkloadSection,
    #[serde(default)]
    pub real: RealSection,
    #[serde(default)]
    pub sim: SimSection,
    #[serde(default)]
    pub compare: CompareSection,
}

/// Workload generation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadSection {
    /// Prompt corpus (JSONL).
    #[serde(default)]
    pub prompts: Option<PathBuf>,
    /// Fixed workload id. Derived from the inputs when unset.
    #[serde(default)]
    pub workload_id: Option<String>,
    /// Planned generation length for every request.
    #[serde(default = "default_num_decode_tokens")]
    pub num_decode_tokens: i64,
    /// Built-in tokenizer name.
    #[serde(default = "default_tokenizer")]
    pub tokenizer: String,
    #[serde(default)]
    pub arrival: ArrivalScheduleConfig,
}

fn default_num_decode_tokens() -> i64 {
    128
}

fn default_tokenizer() -> String {
    "whitespace".to_string()
}

impl Default for WorkloadSection {
    fn default() -> Self {
        Self {
            prompts: None,
            workload_id: None,
            num_decode_tokens: default_num_decode_tokens(),
            tokenizer: default_tokenizer(),
            arrival: ArrivalScheduleConfig::default(),
        }
    }
}

/// Real-path replay parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealSection {
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default)]
    pub run_id: Option<String>,
    /// Upper bound on one wait-loop sleep, in milliseconds.
    #[serde(default = "default_max_sleep_ms")]
    pub max_sleep_ms: u64,
    #[serde(default)]
    pub synthetic: SyntheticBackendConfig,
}

fn default_backend() -> String {
    "synthetic".to_string()
}

fn default_max_sleep_ms() -> u64 {
    50
}

impl Default for RealSection {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            run_id: None,
            max_sleep_ms: default_max_sleep_ms(),
            synthetic: SyntheticBackendConfig::default(),
        }
    }
}

/// Simulator ingestion parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimSection {
    #[serde(default)]
    pub run_id: Option<String>,
}

/// Comparison parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompareSection {
    #[serde(default = "default_percentiles")]
    pub percentiles: Vec<f64>,
    #[serde(default)]
    pub exclude_errors: bool,
    #[serde(default)]
    pub comparison_id: Option<String>,
}

fn default_percentiles() -> Vec<f64> {
    DEFAULT_PERCENTILES.to_vec()
}

impl Default for CompareSection {
    fn default() -> Self {
        Self {
            percentiles: default_percentiles(),
            exclude_errors: false,
            comparison_id: None,
        }
    }
}

impl SimParityConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, ConfigError> {
        let config: SimParityConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let workload = &self.workload;
        if workload.num_decode_tokens < 0 {
            return Err(ConfigError::Validation(format!(
                "num_decode_tokens must be >= 0, got {}",
                workload.num_decode_tokens
            )));
        }
        if !available_tokenizers().contains(&workload.tokenizer.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Unknown tokenizer '{}'. Available: {:?}",
                workload.tokenizer,
                available_tokenizers()
            )));
        }
        match workload.arrival.kind {
            ArrivalKind::FixedInterval if workload.arrival.inter_arrival_ns < 0 => {
                return Err(ConfigError::Validation(format!(
                    "inter_arrival_ns must be >= 0, got {}",
                    workload.arrival.inter_arrival_ns
                )));
            }
            ArrivalKind::Poisson if !(workload.arrival.poisson_rate_per_s > 0.0) => {
                return Err(ConfigError::Validation(format!(
                    "poisson_rate_per_s must be > 0, got {}",
                    workload.arrival.poisson_rate_per_s
                )));
            }
            _ => {}
        }

        if !available_backends().contains(&self.real.backend.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Unknown backend '{}'. Available: {:?}",
                self.real.backend,
                available_backends()
            )));
        }
        if self.real.max_sleep_ms == 0 {
            return Err(ConfigError::Validation(
                "max_sleep_ms must be > 0".to_string(),
            ));
        }
        if self.real.synthetic.prefill_tokens_per_sec <= 0.0 {
            return Err(ConfigError::Validation(
                "prefill_tokens_per_sec must be > 0".to_string(),
            ));
        }
        if self.real.synthetic.decode_tokens_per_sec <= 0.0 {
            return Err(ConfigError::Validation(
                "decode_tokens_per_sec must be > 0".to_string(),
            ));
        }

        if self.compare.percentiles.is_empty() {
            return Err(ConfigError::Validation(
                "percentiles must not be empty".to_string(),
            ));
        }
        if let Some(p) = self
            .compare
            .percentiles
            .iter()
            .find(|&&p| !(p > 0.0 && p <= 1.0))
        {
            return Err(ConfigError::Validation(format!(
                "percentiles must be in (0, 1], got {}",
                p
            )));
        }
        Ok(())
    }

    pub fn replay_options(&self) -> ReplayOptions {
        ReplayOptions {
            max_sleep: Duration::from_millis(self.real.max_sleep_ms),
        }
    }

    pub fn report_options(&self) -> ReportOptions {
        ReportOptions {
            percentiles: self.compare.percentiles.clone(),
            exclude_errors: self.compare.exclude_errors,
        }
    }
}
