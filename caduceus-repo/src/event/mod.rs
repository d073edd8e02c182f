//! The event catalog
//!
//! Every mutation of the repository is one of the closed set of variants in
//! [`EventBody`]. Each variant pairs a data payload with a routing query
//! naming the aggregate(s) it targets. The on-disk form of an event is
//! `{id, timestamp, type, data, query}`, with `type` as the serde tag.

pub mod isolate;
pub mod otu;
pub mod repo;
pub mod sequence;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use caduceus_core::validate_nucleotides;

use crate::otu::{Isolate, Otu, Sequence};

pub use isolate::{CreateIsolateData, DeleteIsolateData, LinkSequenceData, UnlinkSequenceData};
pub use otu::{
    CreateOtuData, CreatePlanData, ExcludedAccessionAction, SetRepresentativeIsolateData,
    UpdateExcludedAccessionsData,
};
pub use repo::CreateRepoData;
pub use sequence::{CreateSequenceData, DeleteSequenceData};

/// A committed event with its store-assigned id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// The sequential event id. Ids are contiguous from 1 across the whole
    /// repository.
    pub id: u64,

    /// When the event was written.
    pub timestamp: DateTime<Utc>,

    #[serde(flatten)]
    pub body: EventBody,
}

/// Routing query for repository-level events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoQuery {
    pub repository_id: Uuid,
}

/// Routing query for OTU-level events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtuQuery {
    pub otu_id: Uuid,
}

/// Routing query for isolate-level events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IsolateQuery {
    pub otu_id: Uuid,
    pub isolate_id: Uuid,
}

/// Routing query for sequence-level events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceQuery {
    pub otu_id: Uuid,
    pub sequence_id: Uuid,
}

/// An error applying an event to an aggregate during rehydration.
///
/// These indicate a structurally invalid stored event sequence and are fatal
/// for the affected aggregate.
#[derive(Error, Debug)]
pub enum ApplyError {
    #[error("event does not apply to an existing OTU")]
    NotApplicable,

    #[error("isolate {0} does not exist in the OTU")]
    MissingIsolate(Uuid),

    #[error("sequence {0} does not exist in the OTU")]
    MissingSequence(Uuid),

    #[error("sequence {0} is already linked to the isolate")]
    AlreadyLinked(Uuid),

    #[error("sequence {0} is not linked to the isolate")]
    NotLinked(Uuid),

    #[error("{0}")]
    Invalid(String),
}

/// The closed set of event variants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EventBody {
    CreateRepo {
        data: CreateRepoData,
        query: RepoQuery,
    },

    #[serde(rename = "CreateOTU")]
    CreateOtu {
        data: CreateOtuData,
        query: OtuQuery,
    },

    CreatePlan {
        data: CreatePlanData,
        query: OtuQuery,
    },

    SetRepresentativeIsolate {
        data: SetRepresentativeIsolateData,
        query: OtuQuery,
    },

    UpdateExcludedAccessions {
        data: UpdateExcludedAccessionsData,
        query: OtuQuery,
    },

    CreateIsolate {
        data: CreateIsolateData,
        query: IsolateQuery,
    },

    DeleteIsolate {
        data: DeleteIsolateData,
        query: IsolateQuery,
    },

    CreateSequence {
        data: CreateSequenceData,
        query: SequenceQuery,
    },

    LinkSequence {
        data: LinkSequenceData,
        query: IsolateQuery,
    },

    UnlinkSequence {
        data: UnlinkSequenceData,
        query: IsolateQuery,
    },

    DeleteSequence {
        data: DeleteSequenceData,
        query: SequenceQuery,
    },
}

impl EventBody {
    /// The id of the OTU this event contributes to, if any.
    pub fn otu_id(&self) -> Option<Uuid> {
        match self {
            Self::CreateRepo { .. } => None,
            Self::CreateOtu { query, .. }
            | Self::CreatePlan { query, .. }
            | Self::SetRepresentativeIsolate { query, .. }
            | Self::UpdateExcludedAccessions { query, .. } => Some(query.otu_id),
            Self::CreateIsolate { query, .. }
            | Self::DeleteIsolate { query, .. }
            | Self::LinkSequence { query, .. }
            | Self::UnlinkSequence { query, .. } => Some(query.otu_id),
            Self::CreateSequence { query, .. } | Self::DeleteSequence { query, .. } => {
                Some(query.otu_id)
            }
        }
    }

    /// Instantiate a fresh aggregate from a root-creating variant.
    ///
    /// Returns `None` for every other variant.
    pub fn init_otu(&self) -> Option<Otu> {
        match self {
            Self::CreateOtu { data, .. } => Some(Otu::new(
                data.id,
                data.acronym.clone(),
                data.legacy_id.clone(),
                data.molecule,
                data.name.clone(),
                data.plan.clone(),
                data.taxid,
            )),
            _ => None,
        }
    }

    /// Apply a mutating variant to an aggregate, returning the mutated
    /// aggregate.
    pub fn apply(&self, mut otu: Otu) -> Result<Otu, ApplyError> {
        match self {
            Self::CreateRepo { .. } | Self::CreateOtu { .. } => Err(ApplyError::NotApplicable),

            Self::CreatePlan { data, .. } => {
                otu.plan = data.plan.clone();
                Ok(otu)
            }

            Self::SetRepresentativeIsolate { data, .. } => {
                otu.representative_isolate = Some(data.isolate_id);
                Ok(otu)
            }

            Self::UpdateExcludedAccessions { data, .. } => {
                match data.action {
                    ExcludedAccessionAction::Exclude => {
                        otu.excluded_accessions.extend(data.accessions.iter().cloned());
                    }
                    ExcludedAccessionAction::Allow => {
                        for accession in &data.accessions {
                            otu.excluded_accessions.remove(accession);
                        }
                    }
                }

                Ok(otu)
            }

            Self::CreateIsolate { data, .. } => {
                otu.add_isolate(Isolate::new(
                    data.id,
                    data.legacy_id.clone(),
                    data.name.clone(),
                ));

                Ok(otu)
            }

            Self::DeleteIsolate { query, .. } => {
                otu.delete_isolate(&query.isolate_id)?;
                Ok(otu)
            }

            Self::CreateSequence { data, .. } => {
                validate_nucleotides(&data.sequence)
                    .map_err(|e| ApplyError::Invalid(e.to_string()))?;

                otu.add_sequence(Sequence {
                    id: data.id,
                    accession: data.accession.clone(),
                    definition: data.definition.clone(),
                    legacy_id: data.legacy_id.clone(),
                    segment: data.segment,
                    sequence: data.sequence.clone(),
                });

                Ok(otu)
            }

            Self::LinkSequence { data, query } => {
                otu.link_sequence(&query.isolate_id, &data.sequence_id)?;
                Ok(otu)
            }

            Self::UnlinkSequence { data, query } => {
                otu.unlink_sequence(&query.isolate_id, &data.sequence_id)?;
                Ok(otu)
            }

            Self::DeleteSequence { data, .. } => {
                otu.delete_sequence(&data.sequence_id)?;
                Ok(otu)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caduceus_core::{MolType, Molecule, Plan, Segment, Strandedness, Topology};

    #[test]
    fn test_create_otu_wire_format() {
        let plan = Plan::new(vec![Segment::new(150, 0.03, None).unwrap()]).unwrap();
        let otu_id = Uuid::new_v4();

        let event = Event {
            id: 2,
            timestamp: Utc::now(),
            body: EventBody::CreateOtu {
                data: CreateOtuData {
                    id: otu_id,
                    acronym: "TMV".to_string(),
                    legacy_id: None,
                    molecule: Molecule {
                        strandedness: Strandedness::Single,
                        kind: MolType::Rna,
                        topology: Topology::Linear,
                    },
                    name: "Tobacco mosaic virus".to_string(),
                    taxid: 12242,
                    plan,
                },
                query: OtuQuery { otu_id },
            },
        };

        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["type"], "CreateOTU");
        assert_eq!(json["id"], 2);
        assert_eq!(json["query"]["otu_id"], otu_id.to_string());
        assert_eq!(json["data"]["taxid"], 12242);

        let decoded: Event = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn test_unknown_type_tag_fails() {
        let json = serde_json::json!({
            "id": 2,
            "timestamp": "2024-01-01T00:00:00Z",
            "type": "MalformedEvent",
            "data": {},
            "query": {},
        });

        assert!(serde_json::from_value::<Event>(json).is_err());
    }

    #[test]
    fn test_routing() {
        let otu_id = Uuid::new_v4();

        let body = EventBody::SetRepresentativeIsolate {
            data: SetRepresentativeIsolateData {
                isolate_id: Uuid::new_v4(),
            },
            query: OtuQuery { otu_id },
        };

        assert_eq!(body.otu_id(), Some(otu_id));
    }
}
