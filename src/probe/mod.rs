//! Probe execution
//!
//! A probe is a named SQL query run on a fixed interval against one
//! monitored database. This module defines the result shape handed to the
//! rule evaluator and the executor seam the scheduler talks to.

pub mod postgres;
pub mod value;

use async_trait::async_trait;
use std::time::Duration;

pub use postgres::PgProbeExecutor;
pub use value::Scalar;

/// Rows returned by a single probe execution
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeResult {
    /// Column names in select-list order
    pub columns: Vec<String>,
    /// One entry per row, parallel to `columns`
    pub rows: Vec<Vec<Scalar>>,
}

impl ProbeResult {
    /// Build a single-column result, one row per value
    pub fn single_column(column: impl Into<String>, values: Vec<Scalar>) -> Self {
        Self {
            columns: vec![column.into()],
            rows: values.into_iter().map(|v| vec![v]).collect(),
        }
    }

    /// The value rules are evaluated against: the first column of each row
    pub fn first_column(&self) -> impl Iterator<Item = &Scalar> {
        self.rows.iter().filter_map(|row| row.first())
    }
}

/// Runs probe SQL against one target
#[async_trait]
pub trait ProbeExecutor: Send + Sync {
    async fn execute(&self, sql: &str) -> Result<ProbeResult, ProbeError>;

    /// Release the underlying connections
    async fn close(&self) {}
}

/// Probe execution errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProbeError {
    #[error("query failed: {0}")]
    Query(String),

    #[error("failed to decode column '{column}': {message}")]
    Decode { column: String, message: String },

    #[error("query timed out after {0:?}")]
    Timeout(Duration),
}
