//! The isolate entity

use caduceus_core::IsolateName;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A named biological sample grouping sequences under an OTU.
///
/// Sequences are owned by the OTU's arena; an isolate carries the ordered ids
/// of the sequences linked to it. Emptiness is a transient state during
/// construction only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Isolate {
    /// The isolate id.
    pub id: Uuid,

    /// A string id carried over from a legacy reference repository.
    pub legacy_id: Option<String>,

    /// The isolate's source name metadata.
    pub name: Option<IsolateName>,

    /// Ids of the sequences linked to this isolate, ordered.
    pub sequence_ids: Vec<Uuid>,
}

impl Isolate {
    /// Create a new, empty isolate.
    pub fn new(id: Uuid, legacy_id: Option<String>, name: Option<IsolateName>) -> Self {
        Self {
            id,
            legacy_id,
            name,
            sequence_ids: Vec::new(),
        }
    }

    pub fn contains_sequence(&self, sequence_id: &Uuid) -> bool {
        self.sequence_ids.contains(sequence_id)
    }
}
