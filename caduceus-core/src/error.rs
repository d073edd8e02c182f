//! Core error types for Caduceus

use thiserror::Error;

/// Errors produced by value-type construction and parsing
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid accession: {0}")]
    InvalidAccession(String),

    #[error("Invalid nucleotide sequence: {0}")]
    InvalidSequence(String),

    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    #[error("Invalid segment: {0}")]
    InvalidSegment(String),
}

/// Result type alias for core operations
pub type CoreResult<T> = Result<T, CoreError>;
