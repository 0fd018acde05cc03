//! Arrival schedule generation.
//!
//! A schedule assigns each request an inter-arrival gap and an absolute
//! arrival time relative to the start of replay. The same
//! [`ArrivalScheduleConfig`] and request count always yield byte-identical
//! output: the Poisson generator is a local [`ChaCha8Rng`] seeded once per
//! call, and arrival times are exact integer prefix sums of the gaps.

use crate::artifacts::Table;
use crate::error::{Error, Result};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Exp};
use serde::{Deserialize, Serialize};

/// Arrival policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrivalKind {
    /// Constant gap between consecutive requests.
    FixedInterval,
    /// Exponentially distributed gaps.
    Poisson,
}

impl std::fmt::Display for ArrivalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArrivalKind::FixedInterval => write!(f, "fixed_interval"),
            ArrivalKind::Poisson => write!(f, "poisson"),
        }
    }
}

/// Fully determines a schedule for a given request count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrivalScheduleConfig {
    pub kind: ArrivalKind,
    #[serde(default)]
    pub seed: u64,
    /// Gap for [`ArrivalKind::FixedInterval`].
    #[serde(default)]
    pub inter_arrival_ns: i64,
    /// Mean arrival rate for [`ArrivalKind::Poisson`].
    #[serde(default = "default_poisson_rate")]
    pub poisson_rate_per_s: f64,
}

fn default_poisson_rate() -> f64 {
    1.0
}

impl ArrivalScheduleConfig {
    pub fn fixed_interval(inter_arrival_ns: i64) -> Self {
        Self {
            kind: ArrivalKind::FixedInterval,
            seed: 0,
            inter_arrival_ns,
            poisson_rate_per_s: default_poisson_rate(),
        }
    }

    pub fn poisson(poisson_rate_per_s: f64, seed: u64) -> Self {
        Self {
            kind: ArrivalKind::Poisson,
            seed,
            inter_arrival_ns: 0,
            poisson_rate_per_s,
        }
    }
}

impl Default for ArrivalScheduleConfig {
    fn default() -> Self {
        Self::fixed_interval(0)
    }
}

/// One row of the `trace_intervals` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalRow {
    pub request_id: u64,
    pub inter_arrival_ns: i64,
    pub arrival_time_ns: i64,
}

impl Table for IntervalRow {
    const NAME: &'static str = "trace_intervals";
    const COLUMNS: &'static [&'static str] =
        &["request_id", "inter_arrival_ns", "arrival_time_ns"];
}

/// Build the arrival schedule for `num_requests` requests.
///
/// Request 0 always has a zero gap. Parameters are only checked when there
/// is more than one request, since otherwise they are never used.
pub fn build_schedule(num_requests: usize, config: &ArrivalScheduleConfig) -> Result<Vec<IntervalRow>> {
    let gaps = build_gaps(num_requests, config)?;

    let mut rows = Vec::with_capacity(num_requests);
    let mut arrival_time_ns: i64 = 0;
    for (request_id, gap) in gaps.into_iter().enumerate() {
        arrival_time_ns = arrival_time_ns.checked_add(gap).ok_or_else(|| {
            Error::InvalidConfig(format!(
                "arrival time overflows i64 at request {}",
                request_id
            ))
        })?;
        rows.push(IntervalRow {
            request_id: request_id as u64,
            inter_arrival_ns: gap,
            arrival_time_ns,
        });
    }
    Ok(rows)
}

fn build_gaps(num_requests: usize, config: &ArrivalScheduleConfig) -> Result<Vec<i64>> {
    let mut gaps = vec![0i64; num_requests];
    if num_requests <= 1 {
        return Ok(gaps);
    }

    match config.kind {
        ArrivalKind::FixedInterval => {
            if config.inter_arrival_ns < 0 {
                return Err(Error::InvalidConfig(format!(
                    "inter_arrival_ns must be >= 0, got {}",
                    config.inter_arrival_ns
                )));
            }
            for gap in gaps.iter_mut().skip(1) {
                *gap = config.inter_arrival_ns;
            }
        }
        ArrivalKind::Poisson => {
            // Also rejects NaN
            if !(config.poisson_rate_per_s > 0.0) {
                return Err(Error::InvalidConfig(format!(
                    "poisson_rate_per_s must be > 0, got {}",
                    config.poisson_rate_per_s
                )));
            }
            let exp = Exp::new(config.poisson_rate_per_s)
                .map_err(|e| Error::InvalidConfig(format!("poisson_rate_per_s: {}", e)))?;
            let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
            for gap in gaps.iter_mut().skip(1) {
                let seconds: f64 = exp.sample(&mut rng);
                *gap = ((seconds * 1e9).round() as i64).max(0);
            }
        }
    }
    Ok(gaps)
}
