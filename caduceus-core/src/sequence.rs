//! Nucleotide sequence validation

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{CoreError, CoreResult};

// IUPAC nucleotide codes, including ambiguity codes.
static NUCLEOTIDES: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[ATCGRYKMSWBDHVN]+$").unwrap());

/// Check that a string is a non-empty IUPAC nucleotide sequence.
pub fn validate_nucleotides(sequence: &str) -> CoreResult<()> {
    if NUCLEOTIDES.is_match(sequence) {
        return Ok(());
    }

    let shown: String = sequence.chars().take(32).collect();

    Err(CoreError::InvalidSequence(format!(
        "'{shown}' is not a nucleotide sequence"
    )))
}
