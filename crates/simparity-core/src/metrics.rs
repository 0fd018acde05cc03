//! Common metrics schema shared by every executor.
//!
//! Both the real replay path and the simulator adapter produce one
//! [`RequestMetricsRow`] per request and one [`TokenMetricsRow`] per observed
//! (or synthesized) token. All times are nanoseconds relative to the start of
//! replay.

use crate::artifacts::{read_json, read_table, write_json, write_table, Table};
use crate::error::{Error, Result};
use crate::run_meta::RunMeta;
use serde::{Deserialize, Serialize};
use simparity_backends::TokenEvent;
use std::path::Path;

pub const REQUEST_METRICS_FILE: &str = "request_metrics.csv";
pub const TOKEN_METRICS_FILE: &str = "token_metrics.csv";
pub const RUN_META_FILE: &str = "run_meta.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Ok,
    /// The executor produced no token events.
    Error,
}

/// Per-request record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestMetricsRow {
    pub request_id: u64,
    pub arrival_time_ns: i64,
    pub first_token_time_ns: i64,
    /// `first_token_time_ns - arrival_time_ns`. Never clamped.
    pub ttft_ns: i64,
    pub completion_time_ns: i64,
    pub num_prefill_tokens: u64,
    /// Planned generation length.
    pub num_decode_tokens: u64,
    /// Observed generation length.
    pub num_decode_tokens_actual: u64,
    pub status: RequestStatus,
    #[serde(default)]
    pub backend: Option<String>,
}

impl RequestMetricsRow {
    /// First token observed before the request arrived, which points at a
    /// clock-domain mismatch in the executor's instrumentation.
    pub fn has_negative_ttft(&self) -> bool {
        self.ttft_ns < 0
    }

    pub fn is_error(&self) -> bool {
        self.status == RequestStatus::Error
    }
}

impl Table for RequestMetricsRow {
    const NAME: &'static str = "request_metrics";
    const COLUMNS: &'static [&'static str] = &[
        "request_id",
        "arrival_time_ns",
        "first_token_time_ns",
        "ttft_ns",
        "completion_time_ns",
        "num_prefill_tokens",
        "num_decode_tokens",
        "num_decode_tokens_actual",
        "status",
        "backend",
    ];
    const REQUIRED: &'static [&'static str] = &[
        "request_id",
        "arrival_time_ns",
        "first_token_time_ns",
        "ttft_ns",
        "completion_time_ns",
        "num_prefill_tokens",
        "num_decode_tokens",
        "num_decode_tokens_actual",
        "status",
    ];
}

/// Per-token record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetricsRow {
    pub request_id: u64,
    pub token_index: u64,
    pub token_time_ns: i64,
    /// 0 for the first token, else the gap to the previous token.
    pub token_latency_ns: i64,
    #[serde(default)]
    pub token_id: Option<u32>,
}

impl Table for TokenMetricsRow {
    const NAME: &'static str = "token_metrics";
    const COLUMNS: &'static [&'static str] = &[
        "request_id",
        "token_index",
        "token_time_ns",
        "token_latency_ns",
        "token_id",
    ];
    const REQUIRED: &'static [&'static str] =
        &["request_id", "token_index", "token_time_ns", "token_latency_ns"];
}

/// Token rows for a request, indexed by position in `tokens`.
fn token_rows<I>(request_id: u64, tokens: I) -> Vec<TokenMetricsRow>
where
    I: IntoIterator<Item = (i64, Option<u32>)>,
{
    let mut prev: Option<i64> = None;
    tokens
        .into_iter()
        .enumerate()
        .map(|(index, (token_time_ns, token_id))| {
            let token_latency_ns = prev.map_or(0, |p| token_time_ns - p);
            prev = Some(token_time_ns);
            TokenMetricsRow {
                request_id,
                token_index: index as u64,
                token_time_ns,
                token_latency_ns,
                token_id,
            }
        })
        .collect()
}

/// Token rows for bare timestamps, with no token ids.
pub fn token_rows_from_times(request_id: u64, times: &[i64]) -> Vec<TokenMetricsRow> {
    token_rows(request_id, times.iter().map(|&t| (t, None)))
}

/// Derive request and token rows from raw token-completion events.
///
/// Events are taken in input order. Zero events yields a `status=error` row
/// whose timing fields collapse to the arrival time.
pub fn build_metrics(
    request_id: u64,
    arrival_time_ns: i64,
    events: &[TokenEvent],
    num_prefill_tokens: u64,
    num_decode_tokens: u64,
) -> Result<(RequestMetricsRow, Vec<TokenMetricsRow>)> {
    if arrival_time_ns < 0 {
        return Err(Error::InvalidInput(format!(
            "arrival_time_ns must be >= 0, got {} (request_id {})",
            arrival_time_ns, request_id
        )));
    }

    let tokens = token_rows(
        request_id,
        events.iter().map(|e| (e.token_time_ns, e.token_id)),
    );

    let row = match (events.first(), events.last()) {
        (Some(first), Some(last)) => RequestMetricsRow {
            request_id,
            arrival_time_ns,
            first_token_time_ns: first.token_time_ns,
            ttft_ns: first.token_time_ns - arrival_time_ns,
            completion_time_ns: last.token_time_ns,
            num_prefill_tokens,
            num_decode_tokens,
            num_decode_tokens_actual: events.len() as u64,
            status: RequestStatus::Ok,
            backend: None,
        },
        _ => RequestMetricsRow {
            request_id,
            arrival_time_ns,
            first_token_time_ns: arrival_time_ns,
            ttft_ns: 0,
            completion_time_ns: arrival_time_ns,
            num_prefill_tokens,
            num_decode_tokens,
            num_decode_tokens_actual: 0,
            status: RequestStatus::Error,
            backend: None,
        },
    };

    Ok((row, tokens))
}

/// The full output of one executor run.
#[derive(Debug, Clone)]
pub struct RunMetrics {
    pub request_metrics: Vec<RequestMetricsRow>,
    pub token_metrics: Vec<TokenMetricsRow>,
    pub run_meta: RunMeta,
}

impl RunMetrics {
    pub fn request(&self, request_id: u64) -> Option<&RequestMetricsRow> {
        self.request_metrics
            .iter()
            .find(|r| r.request_id == request_id)
    }

    pub fn error_count(&self) -> usize {
        self.request_metrics.iter().filter(|r| r.is_error()).count()
    }

    pub fn error_request_ids(&self) -> Vec<u64> {
        self.request_metrics
            .iter()
            .filter(|r| r.is_error())
            .map(|r| r.request_id)
            .collect()
    }

    pub fn negative_ttft_count(&self) -> usize {
        self.request_metrics
            .iter()
            .filter(|r| r.has_negative_ttft())
            .count()
    }
}

/// Accumulates rows request by request.
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector {
    requests: Vec<RequestMetricsRow>,
    tokens: Vec<TokenMetricsRow>,
    backend: Option<String>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag every recorded request row with `backend`.
    pub fn with_backend(backend: impl Into<String>) -> Self {
        Self {
            backend: Some(backend.into()),
            ..Self::default()
        }
    }

    pub fn record(&mut self, mut request: RequestMetricsRow, tokens: Vec<TokenMetricsRow>) {
        if request.backend.is_none() {
            request.backend = self.backend.clone();
        }
        if request.has_negative_ttft() {
            tracing::warn!(
                "request {} has negative ttft_ns={} (first token before arrival)",
                request.request_id,
                request.ttft_ns
            );
        }
        self.requests.push(request);
        self.tokens.extend(tokens);
    }

    pub fn request_count(&self) -> usize {
        self.requests.len()
    }

    pub fn finish(self, run_meta: RunMeta) -> RunMetrics {
        RunMetrics {
            request_metrics: self.requests,
            token_metrics: self.tokens,
            run_meta,
        }
    }
}

/// Persist a run into `dir`.
pub fn write_run(dir: &Path, run: &RunMetrics) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    write_table(&dir.join(REQUEST_METRICS_FILE), &run.request_metrics)?;
    write_table(&dir.join(TOKEN_METRICS_FILE), &run.token_metrics)?;
    write_json(&dir.join(RUN_META_FILE), &run.run_meta)?;
    tracing::info!(
        "Wrote {} run {} to {} ({} requests, {} tokens)",
        run.run_meta.run_type,
        run.run_meta.run_id,
        dir.display(),
        run.request_metrics.len(),
        run.token_metrics.len()
    );
    Ok(())
}

/// Load a run written by [`write_run`].
pub fn load_run(dir: &Path) -> Result<RunMetrics> {
    Ok(RunMetrics {
        request_metrics: read_table(&dir.join(REQUEST_METRICS_FILE))?,
        token_metrics: read_table(&dir.join(TOKEN_METRICS_FILE))?,
        run_meta: read_json(&dir.join(RUN_META_FILE))?,
    })
}
