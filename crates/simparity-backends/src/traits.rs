//! Capability trait definitions.
//!
//! Every executor the pipeline can replay a workload against implements
//! [`RealBackend`]; every prompt tokenizer implements [`Tokenizer`]. Both are
//! deliberately narrow: the pipeline only needs token counts from a tokenizer
//! and an ordered list of token-completion timestamps from an executor.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Backend warmup failed: {0}")]
    Warmup(String),
    #[error("Request failed: {0}")]
    Request(String),
    #[error("Backend used before warmup")]
    NotWarmedUp,
}

/// A single token completion observed by an executor.
///
/// `token_index` is 0-based and contiguous per request. Executors must emit
/// events in an order where index order equals time order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenEvent {
    pub token_index: u64,
    /// Completion timestamp in nanoseconds, see [`TimeBase`].
    pub token_time_ns: i64,
    pub token_id: Option<u32>,
}

/// Reference point for [`TokenEvent::token_time_ns`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeBase {
    /// Timestamps come from the replay [`Clock`] and must be offset by the
    /// run start before use.
    Absolute,
    /// Timestamps are already relative to the run start.
    RunRelative,
}

/// Monotonic clock interface shared between the replay loop and executors.
pub trait Clock {
    /// Nanoseconds since an arbitrary, fixed origin. Never decreases.
    fn now_ns(&self) -> u64;

    /// Block the calling thread for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Prompt tokenizer. Only the length of the encoding is consumed.
pub trait Tokenizer {
    fn encode(&self, text: &str) -> Vec<u32>;

    /// Human-readable name for run metadata.
    fn name(&self) -> &str;
}

/// A live executor that turns one prompt into a sequence of token events.
///
/// The replay driver calls [`warmup`](RealBackend::warmup) exactly once
/// before timed replay, then [`run_request`](RealBackend::run_request) once
/// per request, blocking until it returns.
pub trait RealBackend {
    fn warmup(&mut self) -> Result<(), BackendError>;

    fn run_request(
        &mut self,
        prompt: &str,
        max_new_tokens: u64,
    ) -> Result<Vec<TokenEvent>, BackendError>;

    /// Clock domain of the emitted event timestamps.
    fn time_base(&self) -> TimeBase {
        TimeBase::Absolute
    }

    /// Human-readable name for reports.
    fn name(&self) -> &str;
}
