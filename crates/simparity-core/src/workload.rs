//! Workload spec assembly and the workload directory.
//!
//! A workload directory holds everything both executors replay:
//!
//! ```text
//! <dir>/
//!   prompts.jsonl         prompt corpus
//!   trace_lengths.csv     request_id, prompt_id, num_prefill_tokens, num_decode_tokens
//!   trace_intervals.csv   request_id, inter_arrival_ns, arrival_time_ns
//!   workload_meta.json    ids, tokenizer, arrival config
//! ```

use crate::artifacts::{read_json, read_table, stable_id, utcnow_iso, write_json, write_table};
use crate::error::{Error, Result};
use crate::lengths::{plan_lengths, LengthRow};
use crate::prompts::{read_prompts_jsonl, write_prompts_jsonl, PromptRecord};
use crate::run_meta::{WorkloadMeta, SCHEMA_VERSION};
use crate::schedule::{build_schedule, ArrivalScheduleConfig, IntervalRow};
use serde::{Deserialize, Serialize};
use simparity_backends::Tokenizer;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

pub const PROMPTS_FILE: &str = "prompts.jsonl";
pub const TRACE_LENGTHS_FILE: &str = "trace_lengths.csv";
pub const TRACE_INTERVALS_FILE: &str = "trace_intervals.csv";
pub const WORKLOAD_META_FILE: &str = "workload_meta.json";

/// One request in canonical replay order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestSpec {
    pub request_id: u64,
    pub prompt_id: String,
    pub prompt_text: String,
    /// Offset from the start of replay.
    pub arrival_time_ns: i64,
    pub num_prefill_tokens: u64,
    pub num_decode_tokens: u64,
}

/// Immutable, validated list of requests sorted by `request_id`.
///
/// Request ids are dense from 0 and arrival times are non-decreasing in id
/// order, so id order is also dispatch order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkloadSpec {
    requests: Vec<RequestSpec>,
}

impl WorkloadSpec {
    pub fn requests(&self) -> &[RequestSpec] {
        &self.requests
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RequestSpec> {
        self.requests.iter()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn get(&self, request_id: u64) -> Option<&RequestSpec> {
        self.requests.get(usize::try_from(request_id).ok()?)
    }

    /// Arrival time of the last request.
    pub fn span_ns(&self) -> i64 {
        self.requests.last().map_or(0, |r| r.arrival_time_ns)
    }
}

/// Join length rows with schedule rows and resolve prompt text.
///
/// The join on `request_id` must be total in both directions.
pub fn assemble(
    prompts: &[PromptRecord],
    lengths: &[LengthRow],
    intervals: &[IntervalRow],
) -> Result<WorkloadSpec> {
    let text_by_id: HashMap<&str, &str> = prompts
        .iter()
        .map(|p| (p.prompt_id.as_str(), p.text.as_str()))
        .collect();

    let mut interval_by_id: HashMap<u64, &IntervalRow> = HashMap::with_capacity(intervals.len());
    for row in intervals {
        if interval_by_id.insert(row.request_id, row).is_some() {
            return Err(Error::InvalidInput(format!(
                "duplicate request_id {} in trace_intervals",
                row.request_id
            )));
        }
    }

    let mut requests = Vec::with_capacity(lengths.len());
    for length in lengths {
        let interval = interval_by_id.remove(&length.request_id).ok_or_else(|| {
            Error::MissingData(format!(
                "request_id {} has no trace_intervals row",
                length.request_id
            ))
        })?;
        let prompt_text = text_by_id.get(length.prompt_id.as_str()).ok_or_else(|| {
            Error::MissingData(format!(
                "prompt_id {:?} (request_id {}) missing from prompts",
                length.prompt_id, length.request_id
            ))
        })?;
        requests.push(RequestSpec {
            request_id: length.request_id,
            prompt_id: length.prompt_id.clone(),
            prompt_text: prompt_text.to_string(),
            arrival_time_ns: interval.arrival_time_ns,
            num_prefill_tokens: length.num_prefill_tokens,
            num_decode_tokens: length.num_decode_tokens,
        });
    }

    // Anything left over has no length row
    if let Some(orphan) = interval_by_id.keys().min() {
        return Err(Error::MissingData(format!(
            "request_id {} has no trace_lengths row",
            orphan
        )));
    }

    requests.sort_by_key(|r| r.request_id);

    let mut prev_arrival = 0i64;
    for (position, request) in requests.iter().enumerate() {
        if request.request_id != position as u64 {
            return Err(Error::InvalidInput(format!(
                "request ids must be dense from 0: expected {}, found {}",
                position, request.request_id
            )));
        }
        if request.arrival_time_ns < prev_arrival {
            return Err(Error::InvalidInput(format!(
                "arrival_time_ns decreases at request_id {} ({} < {})",
                request.request_id, request.arrival_time_ns, prev_arrival
            )));
        }
        prev_arrival = request.arrival_time_ns;
    }

    Ok(WorkloadSpec { requests })
}

/// Everything produced by one workload generation.
#[derive(Debug, Clone)]
pub struct GeneratedWorkload {
    pub prompts: Vec<PromptRecord>,
    pub lengths: Vec<LengthRow>,
    pub intervals: Vec<IntervalRow>,
    pub spec: WorkloadSpec,
    pub meta: WorkloadMeta,
}

/// Plan lengths, build the schedule and assemble the spec.
///
/// When `workload_id` is `None` a deterministic id is derived from the
/// prompts and every generation parameter.
pub fn generate_workload(
    prompts: Vec<PromptRecord>,
    tokenizer: &dyn Tokenizer,
    num_decode_tokens: i64,
    arrival: &ArrivalScheduleConfig,
    workload_id: Option<&str>,
) -> Result<GeneratedWorkload> {
    let lengths = plan_lengths(&prompts, tokenizer, num_decode_tokens)?;
    let intervals = build_schedule(prompts.len(), arrival)?;
    let spec = assemble(&prompts, &lengths, &intervals)?;

    let workload_id = match workload_id {
        Some(id) => id.to_string(),
        None => derive_workload_id(&prompts, tokenizer.name(), num_decode_tokens, arrival),
    };
    tracing::info!(
        "Generated workload {}: {} requests over {:.3}s",
        workload_id,
        spec.len(),
        spec.span_ns() as f64 / 1e9
    );

    let meta = WorkloadMeta {
        schema_version: SCHEMA_VERSION.to_string(),
        workload_id,
        created_at: utcnow_iso(),
        num_requests: spec.len() as u64,
        tokenizer: tokenizer.name().to_string(),
        num_decode_tokens: num_decode_tokens as u64,
        arrival: arrival.clone(),
        paths: BTreeMap::new(),
        params: serde_json::Value::Null,
    };

    Ok(GeneratedWorkload {
        prompts,
        lengths,
        intervals,
        spec,
        meta,
    })
}

fn derive_workload_id(
    prompts: &[PromptRecord],
    tokenizer: &str,
    num_decode_tokens: i64,
    arrival: &ArrivalScheduleConfig,
) -> String {
    let params = format!(
        "{}|{}|{}|{}|{}|{}",
        tokenizer,
        num_decode_tokens,
        arrival.kind,
        arrival.seed,
        arrival.inter_arrival_ns,
        arrival.poisson_rate_per_s
    );
    let mut parts: Vec<&str> = vec![&params];
    for prompt in prompts {
        parts.push(&prompt.prompt_id);
        parts.push(&prompt.text);
    }
    stable_id(&parts, "workload", 10)
}

/// Persist a generated workload into `dir`.
pub fn write_workload(dir: &Path, workload: &GeneratedWorkload) -> Result<()> {
    std::fs::create_dir_all(dir)?;

    let prompts_path = dir.join(PROMPTS_FILE);
    let lengths_path = dir.join(TRACE_LENGTHS_FILE);
    let intervals_path = dir.join(TRACE_INTERVALS_FILE);

    write_prompts_jsonl(&prompts_path, &workload.prompts)?;
    write_table(&lengths_path, &workload.lengths)?;
    write_table(&intervals_path, &workload.intervals)?;

    let mut meta = workload.meta.clone();
    for (role, path) in [
        ("prompts", &prompts_path),
        ("trace_lengths", &lengths_path),
        ("trace_intervals", &intervals_path),
    ] {
        meta.paths.insert(role.to_string(), path.display().to_string());
    }
    write_json(&dir.join(WORKLOAD_META_FILE), &meta)?;

    tracing::info!("Wrote workload {} to {}", meta.workload_id, dir.display());
    Ok(())
}

/// Load and assemble the workload stored in `dir`.
pub fn load_workload(dir: &Path) -> Result<WorkloadSpec> {
    let prompts = read_prompts_jsonl(&dir.join(PROMPTS_FILE))?;
    let lengths: Vec<LengthRow> = read_table(&dir.join(TRACE_LENGTHS_FILE))?;
    let intervals: Vec<IntervalRow> = read_table(&dir.join(TRACE_INTERVALS_FILE))?;
    assemble(&prompts, &lengths, &intervals)
}

/// Load `workload_meta.json` from `dir`, if present.
pub fn load_workload_meta(dir: &Path) -> Result<Option<WorkloadMeta>> {
    let path = dir.join(WORKLOAD_META_FILE);
    if !path.exists() {
        return Ok(None);
    }
    read_json(&path).map(Some)
}
