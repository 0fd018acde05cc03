//! Token-length planning.

use crate::artifacts::Table;
use crate::error::{Error, Result};
use crate::prompts::PromptRecord;
use serde::{Deserialize, Serialize};
use simparity_backends::Tokenizer;

/// One row of the `trace_lengths` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LengthRow {
    pub request_id: u64,
    pub prompt_id: String,
    /// Measured prompt length under the workload tokenizer.
    pub num_prefill_tokens: u64,
    /// Planned generation length.
    pub num_decode_tokens: u64,
}

impl Table for LengthRow {
    const NAME: &'static str = "trace_lengths";
    const COLUMNS: &'static [&'static str] = &[
        "request_id",
        "prompt_id",
        "num_prefill_tokens",
        "num_decode_tokens",
    ];
}

/// Pair each prompt with its prefill length and the configured decode target.
///
/// Rows mirror prompt order and `request_id` is the 0-based position.
pub fn plan_lengths(
    prompts: &[PromptRecord],
    tokenizer: &dyn Tokenizer,
    num_decode_tokens: i64,
) -> Result<Vec<LengthRow>> {
    if num_decode_tokens < 0 {
        return Err(Error::InvalidConfig(format!(
            "num_decode_tokens must be >= 0, got {}",
            num_decode_tokens
        )));
    }

    Ok(prompts
        .iter()
        .enumerate()
        .map(|(request_id, prompt)| LengthRow {
            request_id: request_id as u64,
            prompt_id: prompt.prompt_id.clone(),
            num_prefill_tokens: tokenizer.encode(&prompt.text).len() as u64,
            num_decode_tokens: num_decode_tokens as u64,
        })
        .collect())
}
