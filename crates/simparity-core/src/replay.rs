//! Real-path workload replay.
//!
//! Requests are dispatched one at a time in `request_id` order. Before each
//! dispatch the driver sleeps in bounded increments until the clock reaches
//! `run_start + arrival_time_ns`, then blocks on the backend until the
//! request finishes. A request that arrives while the previous one is still
//! running is dispatched as soon as the backend returns.

use crate::error::Result;
use crate::metrics::{build_metrics, MetricsCollector, RunMetrics};
use crate::run_meta::RunMeta;
use crate::workload::WorkloadSpec;
use simparity_backends::{Clock, RealBackend, TimeBase, TokenEvent};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayOptions {
    /// Upper bound on a single wait-loop sleep.
    pub max_sleep: Duration,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self {
            max_sleep: Duration::from_millis(50),
        }
    }
}

/// Sleep until `clock` reaches `target_ns`, never sleeping longer than
/// `max_sleep` at a time.
pub fn wait_until(clock: &dyn Clock, target_ns: u64, max_sleep: Duration) {
    let max_ns = (max_sleep.as_nanos() as u64).max(1);
    loop {
        let now = clock.now_ns();
        if now >= target_ns {
            return;
        }
        clock.sleep(Duration::from_nanos((target_ns - now).min(max_ns)));
    }
}

fn to_run_relative(events: &mut [TokenEvent], time_base: TimeBase, run_start_ns: u64) {
    if time_base == TimeBase::Absolute {
        let offset = run_start_ns as i64;
        for event in events.iter_mut() {
            event.token_time_ns -= offset;
        }
    }
}

/// Replay `workload` against `backend`.
///
/// The backend is warmed up once before the run clock starts; a warmup
/// failure aborts the run. A failed request is recorded with
/// `status=error` and replay continues.
pub fn replay_real(
    workload: &WorkloadSpec,
    backend: &mut dyn RealBackend,
    clock: &dyn Clock,
    options: &ReplayOptions,
    mut run_meta: RunMeta,
) -> Result<RunMetrics> {
    tracing::info!("Warming up backend {}", backend.name());
    backend.warmup()?;

    let time_base = backend.time_base();
    let mut collector = MetricsCollector::with_backend(backend.name());
    let run_start_ns = clock.now_ns();
    tracing::info!(
        "Replaying {} requests against {}",
        workload.len(),
        backend.name()
    );

    for request in workload.iter() {
        let target_ns = run_start_ns.saturating_add(request.arrival_time_ns.max(0) as u64);
        wait_until(clock, target_ns, options.max_sleep);

        let mut events = match backend.run_request(&request.prompt_text, request.num_decode_tokens) {
            Ok(events) => events,
            Err(e) => {
                tracing::warn!("request {} failed: {}", request.request_id, e);
                Vec::new()
            }
        };
        events.sort_by_key(|e| e.token_index);
        to_run_relative(&mut events, time_base, run_start_ns);

        let (row, tokens) = build_metrics(
            request.request_id,
            request.arrival_time_ns,
            &events,
            request.num_prefill_tokens,
            request.num_decode_tokens,
        )?;
        if row.is_error() {
            tracing::warn!(
                "request {} produced no tokens, recorded as status=error",
                request.request_id
            );
        } else {
            tracing::debug!(
                "request {}: ttft={}ns tokens={}/{}",
                row.request_id,
                row.ttft_ns,
                row.num_decode_tokens_actual,
                row.num_decode_tokens
            );
        }
        collector.record(row, tokens);
    }

    run_meta.finish();
    let run = collector.finish(run_meta);
    tracing::info!(
        "Replay finished: {} requests, {} errors",
        run.request_metrics.len(),
        run.error_count()
    );
    Ok(run)
}
