//! Executor and tokenizer capabilities for SimParity.
//!
//! This crate provides the [`RealBackend`] and [`Tokenizer`] traits the
//! replay pipeline is written against, plus built-in implementations:
//!
//! | Capability | Name | Purpose |
//! |------------|------|---------|
//! | [`SyntheticBackend`] | `synthetic` | Deterministic stand-in executor |
//! | [`WhitespaceTokenizer`] | `whitespace` | Word-count prefill lengths |
//! | [`ByteTokenizer`] | `byte` | Byte-count prefill lengths |
//!
//! Model-serving engines live outside this workspace and plug in by
//! implementing [`RealBackend`].

pub mod synthetic;
pub mod tokenizer;
pub mod traits;

pub use synthetic::{SyntheticBackend, SyntheticBackendConfig};
pub use tokenizer::{ByteTokenizer, WhitespaceTokenizer};
pub use traits::*;

use std::rc::Rc;

/// Create a real-path backend by name.
///
/// `tokenizer` sizes the prefill phase for backends that model one.
pub fn backend_by_name(
    name: &str,
    synthetic: &SyntheticBackendConfig,
    clock: Rc<dyn Clock>,
    tokenizer: Box<dyn Tokenizer>,
) -> Option<Box<dyn RealBackend>> {
    match name {
        "synthetic" => Some(Box::new(
            SyntheticBackend::new(synthetic.clone(), clock).with_tokenizer(tokenizer),
        )),
        _ => None,
    }
}

/// List all available built-in backend names.
pub fn available_backends() -> Vec<&'static str> {
    vec!["synthetic"]
}

/// Create a tokenizer by name.
pub fn tokenizer_by_name(name: &str) -> Option<Box<dyn Tokenizer>> {
    match name {
        "whitespace" => Some(Box::new(WhitespaceTokenizer::new())),
        "byte" => Some(Box::new(ByteTokenizer::new())),
        _ => None,
    }
}

/// List all available built-in tokenizer names.
pub fn available_tokenizers() -> Vec<&'static str> {
    vec!["whitespace", "byte"]
}
