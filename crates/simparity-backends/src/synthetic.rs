//! Deterministic stand-in executor.
//!
//! [`SyntheticBackend`] models a single-request engine with a fixed prefill
//! throughput and a fixed decode rate. It sleeps on the shared [`Clock`], so
//! under a virtual clock a whole replay completes instantly and produces
//! exact, reproducible timestamps. Generated token ids echo the prompt's own
//! token ids.

use crate::tokenizer::WhitespaceTokenizer;
use crate::traits::*;
use serde::{Deserialize, Serialize};
use std::rc::Rc;
use std::time::Duration;

/// Timing parameters for [`SyntheticBackend`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticBackendConfig {
    /// Prefill throughput in tokens/sec.
    #[serde(default = "default_prefill_tps")]
    pub prefill_tokens_per_sec: f64,
    /// Decode rate in tokens/sec for a single request.
    #[serde(default = "default_decode_tps")]
    pub decode_tokens_per_sec: f64,
    /// Time spent in warmup, in milliseconds.
    #[serde(default)]
    pub startup_time_ms: u64,
    /// Emulates an early end-of-sequence: never emit more than this many tokens.
    #[serde(default)]
    pub stop_after_tokens: Option<u64>,
}

fn default_prefill_tps() -> f64 {
    50_000.0
}

fn default_decode_tps() -> f64 {
    80.0
}

impl Default for SyntheticBackendConfig {
    fn default() -> Self {
        Self {
            prefill_tokens_per_sec: default_prefill_tps(),
            decode_tokens_per_sec: default_decode_tps(),
            startup_time_ms: 0,
            stop_after_tokens: None,
        }
    }
}

impl SyntheticBackendConfig {
    /// Prefill latency for a prompt of `tokens` tokens.
    pub fn prefill_latency(&self, tokens: usize) -> Duration {
        if self.prefill_tokens_per_sec <= 0.0 {
            return Duration::ZERO;
        }
        Duration::from_nanos((tokens as f64 / self.prefill_tokens_per_sec * 1e9).round() as u64)
    }

    /// Delay between consecutive decode tokens.
    pub fn inter_token_latency(&self) -> Duration {
        if self.decode_tokens_per_sec <= 0.0 {
            return Duration::ZERO;
        }
        Duration::from_nanos((1e9 / self.decode_tokens_per_sec).round() as u64)
    }
}

pub struct SyntheticBackend {
    config: SyntheticBackendConfig,
    clock: Rc<dyn Clock>,
    tokenizer: Box<dyn Tokenizer>,
    warmed_up: bool,
}

impl SyntheticBackend {
    pub fn new(config: SyntheticBackendConfig, clock: Rc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            tokenizer: Box::new(WhitespaceTokenizer::new()),
            warmed_up: false,
        }
    }

    /// Replace the tokenizer used to size the prefill phase.
    pub fn with_tokenizer(mut self, tokenizer: Box<dyn Tokenizer>) -> Self {
        self.tokenizer = tokenizer;
        self
    }

    pub fn config(&self) -> &SyntheticBackendConfig {
        &self.config
    }
}

impl RealBackend for SyntheticBackend {
    fn warmup(&mut self) -> Result<(), BackendError> {
        if self.config.startup_time_ms > 0 {
            tracing::info!(
                "Simulating backend startup time: {}ms",
                self.config.startup_time_ms
            );
            self.clock
                .sleep(Duration::from_millis(self.config.startup_time_ms));
        }
        self.warmed_up = true;
        Ok(())
    }

    fn run_request(
        &mut self,
        prompt: &str,
        max_new_tokens: u64,
    ) -> Result<Vec<TokenEvent>, BackendError> {
        if !self.warmed_up {
            return Err(BackendError::NotWarmedUp);
        }

        let prompt_ids = self.tokenizer.encode(prompt);
        self.clock
            .sleep(self.config.prefill_latency(prompt_ids.len()));

        let num_tokens = match self.config.stop_after_tokens {
            Some(cap) => max_new_tokens.min(cap),
            None => max_new_tokens,
        };
        let itl = self.config.inter_token_latency();

        let mut events = Vec::with_capacity(num_tokens as usize);
        for token_index in 0..num_tokens {
            if token_index > 0 {
                self.clock.sleep(itl);
            }
            let token_id = if prompt_ids.is_empty() {
                None
            } else {
                Some(prompt_ids[token_index as usize % prompt_ids.len()])
            };
            events.push(TokenEvent {
                token_index,
                token_time_ns: self.clock.now_ns() as i64,
                token_id,
            });
        }
        Ok(events)
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}
