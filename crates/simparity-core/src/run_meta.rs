//! Run and workload metadata records.

use crate::artifacts::utcnow_iso;
use crate::schedule::ArrivalScheduleConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Metadata schema version written to every record.
pub const SCHEMA_VERSION: &str = "v1";

/// What produced a run directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunType {
    Workload,
    Real,
    Sim,
    Compare,
}

impl std::fmt::Display for RunType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RunType::Workload => "workload",
            RunType::Real => "real",
            RunType::Sim => "sim",
            RunType::Compare => "compare",
        };
        write!(f, "{}", name)
    }
}

/// Contents of `run_meta.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMeta {
    pub schema_version: String,
    pub run_type: RunType,
    pub run_id: String,
    #[serde(default)]
    pub workload_id: Option<String>,
    #[serde(default)]
    pub backend: Option<String>,
    pub started_at: String,
    #[serde(default)]
    pub ended_at: Option<String>,
    /// Input and output locations, keyed by role.
    #[serde(default)]
    pub paths: BTreeMap<String, String>,
    /// Echoed configuration.
    #[serde(default)]
    pub params: serde_json::Value,
}

impl RunMeta {
    /// Start a record stamped with the current time.
    pub fn new(run_type: RunType, run_id: impl Into<String>) -> Self {
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            run_type,
            run_id: run_id.into(),
            workload_id: None,
            backend: None,
            started_at: utcnow_iso(),
            ended_at: None,
            paths: BTreeMap::new(),
            params: serde_json::Value::Null,
        }
    }

    pub fn with_workload_id(mut self, workload_id: impl Into<String>) -> Self {
        self.workload_id = Some(workload_id.into());
        self
    }

    pub fn with_backend(mut self, backend: impl Into<String>) -> Self {
        self.backend = Some(backend.into());
        self
    }

    pub fn with_path(mut self, role: impl Into<String>, path: impl Into<String>) -> Self {
        self.paths.insert(role.into(), path.into());
        self
    }

    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.params = params;
        self
    }

    /// Stamp the end time.
    pub fn finish(&mut self) {
        self.ended_at = Some(utcnow_iso());
    }
}

/// Contents of `workload_meta.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadMeta {
    pub schema_version: String,
    pub workload_id: String,
    pub created_at: String,
    pub num_requests: u64,
    pub tokenizer: String,
    pub num_decode_tokens: u64,
    pub arrival: ArrivalScheduleConfig,
    #[serde(default)]
    pub paths: BTreeMap<String, String>,
    #[serde(default)]
    pub params: serde_json::Value,
}
