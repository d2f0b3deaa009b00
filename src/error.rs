//! Error types for the analysis pipeline.

use serde::Serialize;
use thiserror::Error;

/// Malformed input that halts the run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    #[error("{table}: required column `{column}` is missing")]
    MissingColumn { table: String, column: String },

    #[error("{table}: cannot parse `{value}` in column `{column}` (row {row})")]
    UnparseableValue {
        table: String,
        column: String,
        /// 1-indexed data row, not counting the header.
        row: usize,
        value: String,
    },
}

/// Why a single insight could not be derived. Never fatal.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InsightError {
    #[error("{table} is missing column `{column}`")]
    MissingDependency { table: String, column: String },

    #[error("{table} has no values in column `{column}`")]
    NoData { table: String, column: String },
}
