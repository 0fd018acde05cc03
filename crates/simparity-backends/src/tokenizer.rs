//! Built-in tokenizers.
//!
//! Real model tokenizers are loaded outside this workspace. These two cover
//! offline workload generation and tests, where only a stable token count
//! per prompt is required.

use crate::traits::Tokenizer;

/// Splits on Unicode whitespace and hashes each word to a token id.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceTokenizer;

impl WhitespaceTokenizer {
    pub fn new() -> Self {
        Self
    }
}

impl Tokenizer for WhitespaceTokenizer {
    fn encode(&self, text: &str) -> Vec<u32> {
        text.split_whitespace().map(hash_word).collect()
    }

    fn name(&self) -> &str {
        "whitespace"
    }
}

/// One token per UTF-8 byte.
#[derive(Debug, Clone, Copy, Default)]
pub struct ByteTokenizer;

impl ByteTokenizer {
    pub fn new() -> Self {
        Self
    }
}

impl Tokenizer for ByteTokenizer {
    fn encode(&self, text: &str) -> Vec<u32> {
        text.bytes().map(u32::from).collect()
    }

    fn name(&self) -> &str {
        "byte"
    }
}

/// FNV-1a folded to 32 bits.
fn hash_word(word: &str) -> u32 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in word.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    (hash ^ (hash >> 32)) as u32
}
