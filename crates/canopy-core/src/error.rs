//! Error taxonomy for the estimation engine.

use thiserror::Error;

use crate::tables::EvalId;

/// Errors surfaced by scope resolution and estimation.
///
/// Duplicate stratum rows are not errors: the stratification resolver drops
/// them and logs a warning. A zero denominator is not an error either; the
/// ratio is defined as zero.
#[derive(Error, Debug)]
pub enum EstimationError {
    /// No evaluation matches the requested scope or purpose, or the
    /// configuration itself is unusable.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// More than one evaluation matches and automatic resolution was not
    /// requested (or could not break the tie).
    #[error("Ambiguous evaluation for geography {geography}: candidates {candidates:?}")]
    Ambiguity {
        geography: u16,
        candidates: Vec<EvalId>,
    },

    /// Stratum-assignment cardinality violated, or a record's adjustment
    /// basis has no factor in its stratum.
    #[error("Data integrity error: {0}")]
    DataIntegrity(String),

    /// A filter or grouping expression cannot be evaluated against the
    /// available columns.
    #[error("Cannot evaluate domain expression `{expression}`: {reason}")]
    DomainExpression { expression: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EstimationError {
    pub(crate) fn expression(expression: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DomainExpression {
            expression: expression.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EstimationError>;
