//! Simulator output adapter.
//!
//! The simulator only reports two aggregate timings per request: prefill
//! elapsed time and end-to-end elapsed time. This module turns those into
//! the common metrics schema, synthesizing evenly spaced token events
//! between the first token and completion. Synthesized token times are an
//! estimate, not a measurement; reports derived from them say so.
//!
//! It also exports the workload as the simulator's input trace.

use crate::artifacts::{read_table, write_table, Table};
use crate::error::{Error, Result};
use crate::metrics::{
    token_rows_from_times, MetricsCollector, RequestMetricsRow, RequestStatus, RunMetrics,
    TokenMetricsRow,
};
use crate::run_meta::RunMeta;
use crate::workload::WorkloadSpec;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;

pub const SIM_TRACE_FILE: &str = "sim_trace.csv";

/// Backend tag written on simulated request rows.
pub const SIM_BACKEND: &str = "sim";

/// Aggregate timings for one request, as reported by the simulator.
///
/// Extra simulator columns are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimRequestTiming {
    #[serde(rename = "Request Id")]
    pub request_id: u64,
    /// Arrival to completion, in seconds.
    pub request_e2e_time: f64,
    /// Arrival to first token, in seconds.
    pub prefill_e2e_time: f64,
}

impl Table for SimRequestTiming {
    const NAME: &'static str = "sim_request_metrics";
    const COLUMNS: &'static [&'static str] =
        &["Request Id", "request_e2e_time", "prefill_e2e_time"];
}

/// Load the simulator's per-request metrics file.
pub fn read_sim_request_metrics(path: &Path) -> Result<Vec<SimRequestTiming>> {
    read_table(path)
}

/// `n` evenly spaced timestamps from `first` to `completion`, inclusive.
///
/// Intermediate points round to the nearest nanosecond, ties to even.
pub fn synthesize_token_times(first_token_time_ns: i64, completion_time_ns: i64, n: u64) -> Vec<i64> {
    match n {
        0 => Vec::new(),
        1 => vec![first_token_time_ns],
        _ => {
            let first = first_token_time_ns as i128;
            let span = completion_time_ns as i128 - first;
            let den = (n - 1) as i128;
            (0..n)
                .map(|i| round_ratio_half_even(first * den + span * i as i128, den) as i64)
                .collect()
        }
    }
}

fn round_ratio_half_even(num: i128, den: i128) -> i128 {
    let q = num.div_euclid(den);
    let r = num.rem_euclid(den);
    match (2 * r).cmp(&den) {
        Ordering::Less => q,
        Ordering::Greater => q + 1,
        Ordering::Equal => q + q.rem_euclid(2),
    }
}

/// Build common-schema rows for one simulated request.
///
/// The planned decode length is taken as the actual length, and the status
/// is always `ok`.
pub fn adapt_request(
    request_id: u64,
    arrival_time_ns: i64,
    ttft_ns: i64,
    completion_time_ns: i64,
    num_prefill_tokens: u64,
    num_decode_tokens: u64,
) -> Result<(RequestMetricsRow, Vec<TokenMetricsRow>)> {
    if arrival_time_ns < 0 {
        return Err(Error::InvalidInput(format!(
            "arrival_time_ns must be >= 0, got {} (request_id {})",
            arrival_time_ns, request_id
        )));
    }
    let first_token_time_ns = arrival_time_ns.checked_add(ttft_ns).ok_or_else(|| {
        Error::InvalidInput(format!(
            "first token time overflows i64 (request_id {}, ttft_ns {})",
            request_id, ttft_ns
        ))
    })?;
    let times = synthesize_token_times(first_token_time_ns, completion_time_ns, num_decode_tokens);

    let row = RequestMetricsRow {
        request_id,
        arrival_time_ns,
        first_token_time_ns,
        ttft_ns,
        completion_time_ns,
        num_prefill_tokens,
        num_decode_tokens,
        num_decode_tokens_actual: num_decode_tokens,
        status: RequestStatus::Ok,
        backend: None,
    };
    Ok((row, token_rows_from_times(request_id, &times)))
}

fn seconds_to_ns(seconds: f64, request_id: u64, column: &str) -> Result<i64> {
    if !seconds.is_finite() {
        return Err(Error::InvalidInput(format!(
            "{} is not finite for request_id {}",
            column, request_id
        )));
    }
    let ns = (seconds * 1e9).round();
    // i64::MAX as f64 is 2^63, itself out of range
    if ns < i64::MIN as f64 || ns >= i64::MAX as f64 {
        return Err(Error::InvalidInput(format!(
            "{} = {}s is out of range for request_id {}",
            column, seconds, request_id
        )));
    }
    Ok(ns as i64)
}

/// Convert simulator timings into a run over `workload`.
///
/// Every workload request needs exactly one simulator row, and the
/// simulator may not report requests the workload does not contain.
pub fn standardize_sim_outputs(
    workload: &WorkloadSpec,
    timings: &[SimRequestTiming],
    run_meta: RunMeta,
) -> Result<RunMetrics> {
    let mut by_id: HashMap<u64, &SimRequestTiming> = HashMap::with_capacity(timings.len());
    for timing in timings {
        if by_id.insert(timing.request_id, timing).is_some() {
            return Err(Error::InvalidInput(format!(
                "duplicate simulator row for request_id {}",
                timing.request_id
            )));
        }
    }

    let mut collector = MetricsCollector::with_backend(SIM_BACKEND);
    for request in workload.iter() {
        let timing = by_id.remove(&request.request_id).ok_or_else(|| {
            Error::MissingData(format!(
                "simulator output has no row for request_id {}",
                request.request_id
            ))
        })?;
        let ttft_ns = seconds_to_ns(timing.prefill_e2e_time, request.request_id, "prefill_e2e_time")?;
        let e2e_ns = seconds_to_ns(timing.request_e2e_time, request.request_id, "request_e2e_time")?;

        let completion_time_ns = request.arrival_time_ns.checked_add(e2e_ns).ok_or_else(|| {
            Error::InvalidInput(format!(
                "completion time overflows i64 (request_id {}, request_e2e_time {}s)",
                request.request_id, timing.request_e2e_time
            ))
        })?;

        let (row, tokens) = adapt_request(
            request.request_id,
            request.arrival_time_ns,
            ttft_ns,
            completion_time_ns,
            request.num_prefill_tokens,
            request.num_decode_tokens,
        )?;
        collector.record(row, tokens);
    }

    if let Some(extra) = by_id.keys().min() {
        return Err(Error::MissingData(format!(
            "simulator reported request_id {} which is not in the workload",
            extra
        )));
    }

    tracing::info!(
        "Standardized {} simulated requests (token times interpolated)",
        collector.request_count()
    );
    Ok(collector.finish(run_meta))
}

/// One row of the simulator input trace.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimTraceRow {
    /// Arrival time in seconds.
    pub arrived_at: f64,
    pub num_prefill_tokens: u64,
    pub num_decode_tokens: u64,
}

impl Table for SimTraceRow {
    const NAME: &'static str = "sim_trace";
    const COLUMNS: &'static [&'static str] =
        &["arrived_at", "num_prefill_tokens", "num_decode_tokens"];
}

/// Simulator trace rows in request order.
pub fn sim_trace_rows(workload: &WorkloadSpec) -> Vec<SimTraceRow> {
    workload
        .iter()
        .map(|r| SimTraceRow {
            arrived_at: r.arrival_time_ns as f64 / 1e9,
            num_prefill_tokens: r.num_prefill_tokens,
            num_decode_tokens: r.num_decode_tokens,
        })
        .collect()
}

/// Write the simulator input trace for `workload`.
pub fn write_sim_trace(path: &Path, workload: &WorkloadSpec) -> Result<()> {
    write_table(path, &sim_trace_rows(workload))
}
