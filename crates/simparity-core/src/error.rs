//! Pipeline error taxonomy.
//!
//! Every variant is fatal: the stage that raises it stops before writing a
//! partial artifact. Per-request executor failures are not errors; they are
//! recorded as `status=error` rows (see [`crate::metrics::RequestStatus`]).

use simparity_backends::BackendError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// Bad schedule, length-plan, or comparison parameters.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    /// A caller-supplied value violates a precondition.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    /// Join or reference integrity failure between tables.
    #[error("Missing data: {0}")]
    MissingData(String),
    /// A loaded table lacks required columns.
    #[error("{context}: missing required columns: {missing:?}")]
    SchemaViolation {
        context: String,
        missing: Vec<String>,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("{context}: CSV error: {source}")]
    Csv {
        context: String,
        source: csv::Error,
    },
    #[error("{context}: JSON error: {source}")]
    Json {
        context: String,
        source: serde_json::Error,
    },
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),
}

pub type Result<T> = std::result::Result<T, Error>;
