//! Prompt corpus I/O.
//!
//! Prompts are stored as JSONL, one `{"prompt_id": ..., "text": ...}` object
//! per line. Blank lines and lines starting with `#` are skipped.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

/// A single prompt. `prompt_id` is unique within a corpus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptRecord {
    pub prompt_id: String,
    pub text: String,
}

impl PromptRecord {
    pub fn new(prompt_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            prompt_id: prompt_id.into(),
            text: text.into(),
        }
    }
}

/// Load prompts from a JSONL file.
pub fn read_prompts_jsonl(path: &Path) -> Result<Vec<PromptRecord>> {
    let file = File::open(path)?;
    parse_prompts_jsonl(BufReader::new(file), &path.display().to_string())
}

/// Parse prompts JSONL from any reader. `source` names the input in errors.
pub fn parse_prompts_jsonl<R: Read>(reader: BufReader<R>, source: &str) -> Result<Vec<PromptRecord>> {
    let mut prompts = Vec::new();
    let mut seen = HashSet::new();
    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let record: PromptRecord = serde_json::from_str(trimmed).map_err(|e| Error::Json {
            context: format!("{}:{}", source, line_num + 1),
            source: e,
        })?;
        if !seen.insert(record.prompt_id.clone()) {
            return Err(Error::InvalidInput(format!(
                "{}:{}: duplicate prompt_id {:?}",
                source,
                line_num + 1,
                record.prompt_id
            )));
        }
        prompts.push(record);
    }
    Ok(prompts)
}

/// Write prompts as JSONL, creating parent directories.
pub fn write_prompts_jsonl(path: &Path, prompts: &[PromptRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    for prompt in prompts {
        let line = serde_json::to_string(prompt).map_err(|e| Error::Json {
            context: path.display().to_string(),
            source: e,
        })?;
        writeln!(writer, "{}", line)?;
    }
    writer.flush()?;
    Ok(())
}
