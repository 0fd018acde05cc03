//! Token series alignment.
//!
//! A real run may stop early while the simulator always produces the planned
//! length, so the two token series differ in shape. Alignment truncates both
//! to the real run's observed length per request.

use crate::error::{Error, Result};
use crate::metrics::{RequestMetricsRow, RunMetrics, TokenMetricsRow};
use std::collections::{BTreeSet, HashMap};

/// Token rows from both runs, truncated and sorted by `(request_id, token_index)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlignedTokens {
    pub real: Vec<TokenMetricsRow>,
    pub sim: Vec<TokenMetricsRow>,
}

impl AlignedTokens {
    pub fn real_latencies(&self) -> Vec<f64> {
        self.real.iter().map(|t| t.token_latency_ns as f64).collect()
    }

    pub fn sim_latencies(&self) -> Vec<f64> {
        self.sim.iter().map(|t| t.token_latency_ns as f64).collect()
    }
}

fn request_ids(rows: &[RequestMetricsRow], run: &str) -> Result<BTreeSet<u64>> {
    let mut ids = BTreeSet::new();
    for row in rows {
        if !ids.insert(row.request_id) {
            return Err(Error::InvalidInput(format!(
                "duplicate request_id {} in {} request metrics",
                row.request_id, run
            )));
        }
    }
    Ok(ids)
}

/// Align the token series of a real and a simulated run of the same workload.
///
/// Both request tables must cover the same request ids, and every token row
/// must belong to a known request.
pub fn align(real: &RunMetrics, sim: &RunMetrics) -> Result<AlignedTokens> {
    let real_ids = request_ids(&real.request_metrics, "real")?;
    let sim_ids = request_ids(&sim.request_metrics, "sim")?;

    if let Some(id) = real_ids.difference(&sim_ids).next() {
        return Err(Error::MissingData(format!(
            "request_id {} is in the real run but missing from the sim run",
            id
        )));
    }
    if let Some(id) = sim_ids.difference(&real_ids).next() {
        return Err(Error::MissingData(format!(
            "request_id {} is in the sim run but missing from the real run",
            id
        )));
    }

    let limits: HashMap<u64, u64> = real
        .request_metrics
        .iter()
        .map(|r| (r.request_id, r.num_decode_tokens_actual))
        .collect();

    Ok(AlignedTokens {
        real: truncate(&real.token_metrics, &limits, "real")?,
        sim: truncate(&sim.token_metrics, &limits, "sim")?,
    })
}

fn truncate(
    tokens: &[TokenMetricsRow],
    limits: &HashMap<u64, u64>,
    run: &str,
) -> Result<Vec<TokenMetricsRow>> {
    let mut kept = Vec::with_capacity(tokens.len());
    for token in tokens {
        let limit = limits.get(&token.request_id).ok_or_else(|| {
            Error::MissingData(format!(
                "{} token row references unknown request_id {}",
                run, token.request_id
            ))
        })?;
        if token.token_index < *limit {
            kept.push(*token);
        }
    }
    kept.sort_by_key(|t| (t.request_id, t.token_index));
    Ok(kept)
}
