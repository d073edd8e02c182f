//! The sequence entity

use caduceus_core::Accession;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A nucleotide sequence in an OTU
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sequence {
    /// The sequence id.
    pub id: Uuid,

    /// The versioned GenBank accession.
    pub accession: Accession,

    /// The record definition line.
    pub definition: String,

    /// A string id carried over from a legacy reference repository, if the
    /// sequence was migrated from one.
    pub legacy_id: Option<String>,

    /// The id of the plan segment this sequence fills.
    pub segment: Uuid,

    /// The nucleotide sequence.
    pub sequence: String,
}
