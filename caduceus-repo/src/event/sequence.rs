//! Sequence-level event payloads

use caduceus_core::Accession;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The data for a `CreateSequence` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateSequenceData {
    pub id: Uuid,
    pub accession: Accession,
    pub definition: String,
    pub legacy_id: Option<String>,
    pub segment: Uuid,
    pub sequence: String,
}

/// The data for a `DeleteSequence` event.
///
/// The second part of a sequence replacement. Records which sequence
/// supersedes the deleted one and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteSequenceData {
    pub sequence_id: Uuid,
    pub replacement: Uuid,
    pub rationale: String,
}
