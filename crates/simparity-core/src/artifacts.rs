//! Persisted artifact I/O.
//!
//! Tables are CSV files with a header row. Column order is not significant
//! on read, but every column in [`Table::REQUIRED`] must be present; a
//! missing column is reported as [`Error::SchemaViolation`] before any row is
//! deserialized. Structured records (run and workload metadata) are
//! pretty-printed JSON.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// A row type persisted as one CSV table.
pub trait Table: Serialize + DeserializeOwned {
    /// Table name used in error context.
    const NAME: &'static str;
    /// Header written on output, in field declaration order.
    const COLUMNS: &'static [&'static str];
    /// Columns a loaded file must contain.
    const REQUIRED: &'static [&'static str] = Self::COLUMNS;
}

/// Fail with [`Error::SchemaViolation`] unless every required column is present.
pub fn assert_columns<S: AsRef<str>>(headers: &[S], required: &[&str], context: &str) -> Result<()> {
    let missing: Vec<String> = required
        .iter()
        .filter(|col| !headers.iter().any(|h| h.as_ref() == **col))
        .map(|col| col.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::SchemaViolation {
            context: context.to_string(),
            missing,
        })
    }
}

/// Read a table from a CSV file.
pub fn read_table<T: Table>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path)?;
    let context = format!("{} ({})", T::NAME, path.display());
    read_table_from(BufReader::new(file), &context)
}

/// Read a table from any reader.
pub fn read_table_from<T: Table, R: Read>(reader: R, context: &str) -> Result<Vec<T>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| csv_error(context, e))?
        .iter()
        .map(str::to_string)
        .collect();
    assert_columns(&headers, T::REQUIRED, context)?;

    rdr.deserialize()
        .map(|row| row.map_err(|e| csv_error(context, e)))
        .collect()
}

/// Write a table to a CSV file, creating parent directories.
///
/// The header is always written, so an empty table still round-trips.
pub fn write_table<T: Table>(path: &Path, rows: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    let context = format!("{} ({})", T::NAME, path.display());
    write_table_to(BufWriter::new(file), rows, &context)
}

/// Write a table to any writer.
pub fn write_table_to<T: Table, W: Write>(writer: W, rows: &[T], context: &str) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    wtr.write_record(T::COLUMNS)
        .map_err(|e| csv_error(context, e))?;
    for row in rows {
        wtr.serialize(row).map_err(|e| csv_error(context, e))?;
    }
    wtr.flush()?;
    Ok(())
}

fn csv_error(context: &str, source: csv::Error) -> Error {
    Error::Csv {
        context: context.to_string(),
        source,
    }
}

/// Read a JSON document.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path)?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| Error::Json {
        context: path.display().to_string(),
        source: e,
    })
}

/// Write a pretty-printed JSON document followed by a newline.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, value).map_err(|e| Error::Json {
        context: path.display().to_string(),
        source: e,
    })?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

/// Deterministic identifier: `<prefix>_<hex digest>`.
///
/// The digest is SHA-256 over the prefix and parts joined by `\x1f`,
/// truncated to `length` hex digits (at most 64).
pub fn stable_id(parts: &[&str], prefix: &str, length: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prefix.as_bytes());
    for part in parts {
        hasher.update(b"\x1f");
        hasher.update(part.as_bytes());
    }
    let digest = format!("{:x}", hasher.finalize());
    format!("{}_{}", prefix, &digest[..length.min(digest.len())])
}

/// Current UTC time as an RFC 3339 string with millisecond precision.
pub fn utcnow_iso() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
