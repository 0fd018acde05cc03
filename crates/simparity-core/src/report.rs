//! Comparison report.
//!
//! Layout of a report directory:
//!
//! ```text
//! <dir>/
//!   tables/ttft_percentiles.csv
//!   tables/token_latency_percentiles.csv
//!   summary.md
//!   run_meta.json
//! ```

use crate::align::align;
use crate::artifacts::{write_json, write_table};
use crate::compare::{compare, validate_percentiles, PercentileRow, DEFAULT_PERCENTILES};
use crate::error::Result;
use crate::metrics::{RunMetrics, RUN_META_FILE};
use crate::run_meta::{RunMeta, RunType};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const TABLES_DIR: &str = "tables";
pub const TTFT_TABLE_FILE: &str = "ttft_percentiles.csv";
pub const TOKEN_LATENCY_TABLE_FILE: &str = "token_latency_percentiles.csv";
pub const SUMMARY_FILE: &str = "summary.md";

pub const INTERPOLATION_NOTE: &str =
    "Simulated token latencies are interpolated evenly between first token and completion; they are estimates, not measurements.";
pub const ALIGNMENT_NOTE: &str =
    "Token alignment truncates both token series to the real run's num_decode_tokens_actual per request.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportOptions {
    pub percentiles: Vec<f64>,
    /// Drop `status=error` requests from the TTFT distributions.
    pub exclude_errors: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            percentiles: DEFAULT_PERCENTILES.to_vec(),
            exclude_errors: false,
        }
    }
}

/// Per-run figures shown next to the percentile tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub run_type: RunType,
    pub num_requests: usize,
    pub error_count: usize,
    pub error_request_ids: Vec<u64>,
    pub negative_ttft_count: usize,
    pub aligned_tokens: usize,
}

impl RunSummary {
    fn new(run: &RunMetrics, aligned_tokens: usize) -> Self {
        Self {
            run_id: run.run_meta.run_id.clone(),
            run_type: run.run_meta.run_type,
            num_requests: run.request_metrics.len(),
            error_count: run.error_count(),
            error_request_ids: run.error_request_ids(),
            negative_ttft_count: run.negative_ttft_count(),
            aligned_tokens,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonReport {
    pub ttft: Vec<PercentileRow>,
    pub token_latency: Vec<PercentileRow>,
    pub real: RunSummary,
    pub sim: RunSummary,
    pub exclude_errors: bool,
    pub notes: Vec<String>,
}

fn ttft_values(run: &RunMetrics, exclude_errors: bool) -> Vec<f64> {
    run.request_metrics
        .iter()
        .filter(|r| !(exclude_errors && r.is_error()))
        .map(|r| r.ttft_ns as f64)
        .collect()
}

/// Align both runs and compute the TTFT and token-latency tables.
pub fn build_report(real: &RunMetrics, sim: &RunMetrics, options: &ReportOptions) -> Result<ComparisonReport> {
    validate_percentiles(&options.percentiles)?;
    let aligned = align(real, sim)?;

    let ttft = compare(
        &ttft_values(real, options.exclude_errors),
        &ttft_values(sim, options.exclude_errors),
        &options.percentiles,
    )?;
    let token_latency = compare(
        &aligned.real_latencies(),
        &aligned.sim_latencies(),
        &options.percentiles,
    )?;

    let real_summary = RunSummary::new(real, aligned.real.len());
    let sim_summary = RunSummary::new(sim, aligned.sim.len());

    for summary in [&real_summary, &sim_summary] {
        if summary.error_count > 0 {
            tracing::warn!(
                "{} run {} has {} error requests: {:?}",
                summary.run_type,
                summary.run_id,
                summary.error_count,
                summary.error_request_ids
            );
        }
        if summary.negative_ttft_count > 0 {
            tracing::warn!(
                "{} run {} has {} requests with negative TTFT",
                summary.run_type,
                summary.run_id,
                summary.negative_ttft_count
            );
        }
    }

    let mut notes = vec![ALIGNMENT_NOTE.to_string(), INTERPOLATION_NOTE.to_string()];
    if options.exclude_errors {
        notes.push("Requests with status=error are excluded from TTFT percentiles.".to_string());
    } else if real_summary.error_count + sim_summary.error_count > 0 {
        notes.push("Requests with status=error are included in TTFT percentiles with ttft_ns=0.".to_string());
    }

    Ok(ComparisonReport {
        ttft,
        token_latency,
        real: real_summary,
        sim: sim_summary,
        exclude_errors: options.exclude_errors,
        notes,
    })
}

fn cell(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.1}", v))
}

fn markdown_table(rows: &[PercentileRow]) -> String {
    let mut out = String::from("| metric | real_ns | sim_ns |\n| --- | --- | --- |\n");
    for row in rows {
        out.push_str(&format!(
            "| {} | {} | {} |\n",
            row.metric,
            cell(row.real_ns),
            cell(row.sim_ns)
        ));
    }
    out
}

/// Render `summary.md`.
pub fn render_summary_md(report: &ComparisonReport) -> String {
    let mut out = String::from("# Compare runs summary\n\n");
    for (label, summary) in [("real", &report.real), ("sim", &report.sim)] {
        out.push_str(&format!(
            "- {}: `{}` ({} requests, {} errors, {} negative TTFT, {} aligned tokens)\n",
            label,
            summary.run_id,
            summary.num_requests,
            summary.error_count,
            summary.negative_ttft_count,
            summary.aligned_tokens
        ));
        if !summary.error_request_ids.is_empty() {
            out.push_str(&format!(
                "  - error request ids: {:?}\n",
                summary.error_request_ids
            ));
        }
    }
    out.push_str("\n## TTFT percentiles (ns)\n\n");
    out.push_str(&markdown_table(&report.ttft));
    out.push_str("\n## Decode token latency percentiles (ns)\n\n");
    out.push_str(&markdown_table(&report.token_latency));
    out.push_str("\nNotes:\n");
    for note in &report.notes {
        out.push_str(&format!("- {}\n", note));
    }
    out
}

/// Persist tables, summary and run metadata into `dir`.
pub fn write_report(dir: &Path, report: &ComparisonReport, run_meta: &RunMeta) -> Result<()> {
    let tables = dir.join(TABLES_DIR);
    let ttft_path = tables.join(TTFT_TABLE_FILE);
    let token_path = tables.join(TOKEN_LATENCY_TABLE_FILE);
    write_table(&ttft_path, &report.ttft)?;
    write_table(&token_path, &report.token_latency)?;
    std::fs::write(dir.join(SUMMARY_FILE), render_summary_md(report))?;

    let meta = run_meta
        .clone()
        .with_path("ttft_percentiles_csv", ttft_path.display().to_string())
        .with_path("token_latency_percentiles_csv", token_path.display().to_string());
    write_json(&dir.join(RUN_META_FILE), &meta)?;

    tracing::info!("Wrote comparison report to {}", dir.display());
    Ok(())
}

fn table_section(out: &mut String, title: &str, rows: &[PercentileRow]) {
    out.push_str(&format!("{:-<70}\n", format!("  {}  ", title)));
    out.push_str(&format!(
        "  {:<10} {:>16} {:>16} {:>16}\n",
        "Metric", "Real", "Sim", "Sim/Real"
    ));
    for row in rows {
        let ratio = match (row.real_ns, row.sim_ns) {
            (Some(r), Some(s)) if r != 0.0 => format!("{:.3}", s / r),
            _ => "n/a".to_string(),
        };
        out.push_str(&format!(
            "  {:<10} {:>16} {:>16} {:>16}\n",
            row.metric,
            cell(row.real_ns),
            cell(row.sim_ns),
            ratio
        ));
    }
}

/// Format a report as a terminal table.
pub fn format_table(report: &ComparisonReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "\n{:=<70}\n",
        format!("  {} vs {}  ", report.real.run_id, report.sim.run_id)
    ));
    out.push_str(&format!(
        "  Requests: {} real / {} sim | Errors: {} real / {} sim\n",
        report.real.num_requests,
        report.sim.num_requests,
        report.real.error_count,
        report.sim.error_count
    ));
    out.push_str(&format!(
        "  Aligned tokens: {} | Negative TTFT: {} real / {} sim\n",
        report.real.aligned_tokens, report.real.negative_ttft_count, report.sim.negative_ttft_count
    ));
    table_section(&mut out, "TTFT (ns)", &report.ttft);
    table_section(&mut out, "Token latency (ns)", &report.token_latency);
    out.push_str(&format!("{:=<70}\n", ""));
    out
}
