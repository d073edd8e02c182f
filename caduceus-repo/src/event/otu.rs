//! OTU-level event payloads

use std::collections::BTreeSet;

use caduceus_core::{Molecule, Plan};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The data for a `CreateOTU` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateOtuData {
    pub id: Uuid,
    pub acronym: String,
    pub legacy_id: Option<String>,
    pub molecule: Molecule,
    pub name: String,
    pub taxid: u32,
    pub plan: Plan,
}

/// The data for a `CreatePlan` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatePlanData {
    pub plan: Plan,
}

/// The data for a `SetRepresentativeIsolate` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetRepresentativeIsolateData {
    pub isolate_id: Uuid,
}

/// Whether accessions are being excluded from or allowed back into an OTU
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExcludedAccessionAction {
    Exclude,
    Allow,
}

/// The data for an `UpdateExcludedAccessions` event.
///
/// Emitted when accession keys are either allowed or disallowed from future
/// inclusion in the reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateExcludedAccessionsData {
    pub accessions: BTreeSet<String>,
    pub action: ExcludedAccessionAction,
}
