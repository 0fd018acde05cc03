//! SimParity: real vs. simulated LLM inference comparison.
//!
//! This crate generates a reproducible workload, replays it against a live
//! executor, converts simulator output into the same metrics schema, and
//! compares the two runs with percentile tables. Executors and tokenizers
//! from `simparity-backends` plug in through narrow traits.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────┐  ┌──────────┐
//! │ Schedule │  │ Lengths  │
//! └────┬─────┘  └────┬─────┘
//!      └──────┬──────┘
//!       ┌─────▼─────┐
//!       │ Workload  │──────────────────┐
//!       └─────┬─────┘                  │ sim trace
//!    ┌────────▼────────┐       ┌───────▼───────┐
//!    │ Replay (real)   │       │  Simulator    │
//!    │ + Metrics build │       │  (external)   │
//!    └────────┬────────┘       └───────┬───────┘
//!             │                ┌───────▼───────┐
//!             │                │  Sim adapter  │
//!             │                └───────┬───────┘
//!             └──────────┬─────────────┘
//!                  ┌─────▼─────┐     ┌──────────┐
//!                  │   Align   │────▶│  Report  │
//!                  └───────────┘     └──────────┘
//! ```

pub mod align;
pub mod artifacts;
pub mod clock;
pub mod compare;
pub mod config;
pub mod error;
pub mod lengths;
pub mod metrics;
pub mod prompts;
pub mod replay;
pub mod report;
pub mod run_meta;
pub mod schedule;
pub mod sim_adapter;
pub mod workload;

// Re-export key types for convenience.
pub use align::{align, AlignedTokens};
pub use clock::{ManualClock, MonotonicClock};
pub use compare::{compare, percentile_label, percentile_linear, PercentileRow};
pub use config::SimParityConfig;
pub use error::{Error, Result};
pub use lengths::{plan_lengths, LengthRow};
pub use metrics::{
    build_metrics, load_run, write_run, MetricsCollector, RequestMetricsRow, RequestStatus,
    RunMetrics, TokenMetricsRow,
};
pub use prompts::{read_prompts_jsonl, write_prompts_jsonl, PromptRecord};
pub use replay::{replay_real, ReplayOptions};
pub use report::{build_report, format_table, write_report, ComparisonReport, ReportOptions};
pub use run_meta::{RunMeta, RunType, WorkloadMeta};
pub use schedule::{build_schedule, ArrivalKind, ArrivalScheduleConfig, IntervalRow};
pub use sim_adapter::{standardize_sim_outputs, synthesize_token_times, write_sim_trace};
pub use workload::{
    assemble, generate_workload, load_workload, write_workload, GeneratedWorkload, RequestSpec,
    WorkloadSpec,
};

use artifacts::stable_id;
use simparity_backends::Clock;
use std::path::Path;
use std::rc::Rc;

fn config_params(config: &SimParityConfig) -> Result<serde_json::Value> {
    serde_json::to_value(config).map_err(|e| Error::Json {
        context: "config".to_string(),
        source: e,
    })
}

fn workload_id_of(workload_dir: &Path) -> Result<String> {
    Ok(workload::load_workload_meta(workload_dir)?
        .map(|m| m.workload_id)
        .unwrap_or_else(|| workload_dir.display().to_string()))
}

/// Generate a workload from the configured prompt corpus and write it to `out_dir`.
pub fn generate_workload_dir(
    config: &SimParityConfig,
    prompts_path: &Path,
    out_dir: &Path,
) -> Result<GeneratedWorkload> {
    let tokenizer = simparity_backends::tokenizer_by_name(&config.workload.tokenizer)
        .ok_or_else(|| {
            Error::InvalidConfig(format!("unknown tokenizer '{}'", config.workload.tokenizer))
        })?;
    let prompts = read_prompts_jsonl(prompts_path)?;
    let mut generated = generate_workload(
        prompts,
        tokenizer.as_ref(),
        config.workload.num_decode_tokens,
        &config.workload.arrival,
        config.workload.workload_id.as_deref(),
    )?;
    generated.meta.params = config_params(config)?;
    write_workload(out_dir, &generated)?;
    Ok(generated)
}

/// Replay the workload in `workload_dir` against the configured backend and
/// write the run to `out_dir`.
pub fn run_real(
    config: &SimParityConfig,
    workload_dir: &Path,
    out_dir: &Path,
    clock: Rc<dyn Clock>,
) -> Result<RunMetrics> {
    let spec = load_workload(workload_dir)?;
    let workload_id = workload_id_of(workload_dir)?;

    let tokenizer = simparity_backends::tokenizer_by_name(&config.workload.tokenizer)
        .ok_or_else(|| {
            Error::InvalidConfig(format!("unknown tokenizer '{}'", config.workload.tokenizer))
        })?;
    let mut backend = simparity_backends::backend_by_name(
        &config.real.backend,
        &config.real.synthetic,
        clock.clone(),
        tokenizer,
    )
    .ok_or_else(|| {
        Error::InvalidConfig(format!(
            "unknown backend '{}'. Available: {:?}",
            config.real.backend,
            simparity_backends::available_backends()
        ))
    })?;

    let run_id = config
        .real
        .run_id
        .clone()
        .unwrap_or_else(|| stable_id(&[&workload_id, &config.real.backend], "real", 10));
    let meta = RunMeta::new(RunType::Real, run_id)
        .with_workload_id(&workload_id)
        .with_backend(config.real.backend.clone())
        .with_path("workload_dir", workload_dir.display().to_string())
        .with_params(config_params(config)?);

    let run = replay_real(
        &spec,
        backend.as_mut(),
        clock.as_ref(),
        &config.replay_options(),
        meta,
    )?;
    write_run(out_dir, &run)?;
    Ok(run)
}

/// Convert a simulator request-metrics file into a run over `workload_dir`.
pub fn ingest_sim(
    config: &SimParityConfig,
    workload_dir: &Path,
    sim_metrics_csv: &Path,
    out_dir: &Path,
) -> Result<RunMetrics> {
    let spec = load_workload(workload_dir)?;
    let workload_id = workload_id_of(workload_dir)?;
    let timings = sim_adapter::read_sim_request_metrics(sim_metrics_csv)?;

    let source = sim_metrics_csv.display().to_string();
    let run_id = config
        .sim
        .run_id
        .clone()
        .unwrap_or_else(|| stable_id(&[&workload_id, &source], "sim", 10));
    let mut meta = RunMeta::new(RunType::Sim, run_id)
        .with_workload_id(workload_id)
        .with_backend(sim_adapter::SIM_BACKEND)
        .with_path("workload_dir", workload_dir.display().to_string())
        .with_path("sim_request_metrics", source)
        .with_params(config_params(config)?);
    meta.finish();

    let run = standardize_sim_outputs(&spec, &timings, meta)?;
    write_run(out_dir, &run)?;
    Ok(run)
}

/// Compare two run directories and write the report to `out_dir`.
pub fn compare_runs(
    config: &SimParityConfig,
    real_dir: &Path,
    sim_dir: &Path,
    out_dir: &Path,
) -> Result<ComparisonReport> {
    let real = load_run(real_dir)?;
    let sim = load_run(sim_dir)?;
    let report = build_report(&real, &sim, &config.report_options())?;

    let comparison_id = config.compare.comparison_id.clone().unwrap_or_else(|| {
        stable_id(
            &[&real.run_meta.run_id, &sim.run_meta.run_id],
            "compare",
            10,
        )
    });
    let mut meta = RunMeta::new(RunType::Compare, comparison_id)
        .with_path("real_run_dir", real_dir.display().to_string())
        .with_path("sim_run_dir", sim_dir.display().to_string())
        .with_params(config_params(config)?);
    if let Some(workload_id) = &real.run_meta.workload_id {
        meta = meta.with_workload_id(workload_id.clone());
    }
    meta.finish();

    write_report(out_dir, &report, &meta)?;
    Ok(report)
}
