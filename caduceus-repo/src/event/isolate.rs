//! Isolate-level event payloads

use caduceus_core::IsolateName;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The data for a `CreateIsolate` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateIsolateData {
    pub id: Uuid,
    pub legacy_id: Option<String>,
    pub name: Option<IsolateName>,
}

/// The data for a `DeleteIsolate` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteIsolateData {
    pub rationale: String,
}

/// The data for a `LinkSequence` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkSequenceData {
    pub sequence_id: Uuid,
}

/// The data for an `UnlinkSequence` event.
///
/// The first part of a sequence replacement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlinkSequenceData {
    pub sequence_id: Uuid,
}
