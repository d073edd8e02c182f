//! RefSeq comment parsing

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{NcbiError, NcbiResult};

// Matches the standard RefSeq provenance note, eg.
// "PROVISIONAL REFSEQ: This record has not yet been subject to final NCBI
//  review. The reference sequence was derived from MF062125."
static REFSEQ_COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\w+ REFSEQ): [\w ]+\. [\w ]+ (\w+)\.").unwrap());

/// Parse a standard RefSeq comment into its status label and the predecessor
/// accession key the record was derived from.
pub fn parse_refseq_comment(comment: &str) -> NcbiResult<(String, String)> {
    if comment.is_empty() {
        return Err(NcbiError::InvalidComment("empty comment".to_string()));
    }

    let captures = REFSEQ_COMMENT
        .captures(comment)
        .ok_or_else(|| NcbiError::InvalidComment(comment.to_string()))?;

    Ok((captures[1].to_string(), captures[2].to_string()))
}
