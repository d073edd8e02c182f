//! Repository error types
//!
//! Two kinds of failure flow through the engine and they are never mixed:
//!
//! - *Integrity faults* (`StoreError`, the rehydration variants here) mean the
//!   stored event log cannot be trusted for an aggregate. They are propagated
//!   to the caller and never recovered internally.
//! - *Invariant violations* and write-path not-found conditions are expected,
//!   recoverable outcomes. No event is written when one is raised.

use caduceus_core::{CoreError, IsolateName};
use caduceus_ncbi::NcbiError;
use thiserror::Error;
use uuid::Uuid;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum RepoError {
    // ------------------------------------------------------------------
    // Integrity faults. Unrecoverable for the affected aggregate.
    // ------------------------------------------------------------------
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("The first event ({event_id}) for an OTU is not a CreateOTU event")]
    FirstEventNotCreate { event_id: u64 },

    #[error("Event {event_id} is not an applicable event: {reason}")]
    EventNotApplicable { event_id: u64, reason: String },

    #[error("No repository creation event found")]
    MissingCreateRepo,

    // ------------------------------------------------------------------
    // Invariant violations and write-path validation failures.
    // ------------------------------------------------------------------
    #[error("An OTU with taxid {taxid} already exists")]
    DuplicateTaxid { taxid: u32 },

    #[error("An OTU with the name '{name}' already exists")]
    DuplicateName { name: String },

    #[error("An OTU with the legacy ID '{legacy_id}' already exists")]
    DuplicateLegacyId { legacy_id: String },

    #[error("Isolate name already exists: {name}")]
    DuplicateIsolateName { name: IsolateName },

    #[error("Taxonomy ID must be positive")]
    InvalidTaxid,

    #[error("OTU {otu_id} does not exist")]
    OtuNotFound { otu_id: Uuid },

    #[error("Isolate {isolate_id} not found in OTU")]
    IsolateNotFound { isolate_id: Uuid },

    #[error("Sequence {sequence_id} not found in OTU")]
    SequenceNotFound { sequence_id: Uuid },

    #[error("Segment {segment_id} is not in the OTU's plan")]
    SegmentNotInPlan { segment_id: Uuid },

    #[error("Sequence length {length} is outside the segment window [{min}, {max}]")]
    SequenceLengthOutOfTolerance { length: usize, min: u32, max: u32 },

    #[error("Accession {accession} is excluded from this OTU")]
    AccessionExcluded { accession: String },

    #[error("Accession {accession} belongs to a sequence currently in the OTU")]
    AccessionInUse { accession: String },

    #[error("Isolate {isolate_id} already contains accession {accession}")]
    AccessionAlreadyInIsolate { isolate_id: Uuid, accession: String },

    #[error("Isolate {isolate_id} is the representative isolate and cannot be deleted")]
    RepresentativeIsolate { isolate_id: Uuid },

    #[error("Sequence {sequence_id} is already linked to isolate {isolate_id}")]
    SequenceAlreadyLinked { sequence_id: Uuid, isolate_id: Uuid },

    #[error("Sequence {sequence_id} is not linked to isolate {isolate_id}")]
    SequenceNotLinked { sequence_id: Uuid, isolate_id: Uuid },

    #[error("No plan segment matches record segment {segment:?}")]
    NoMatchingSegment { segment: Option<String> },

    #[error("Invalid repository path: {0}")]
    InvalidPath(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Model(#[from] CoreError),

    #[error("Record source error: {0}")]
    Source(#[from] NcbiError),

    // ------------------------------------------------------------------
    // Transaction control.
    // ------------------------------------------------------------------
    /// Raised by callers inside a transaction scope to roll it back. Converted
    /// to `Ok(None)` by `Repo::use_transaction`; never observed outside one.
    #[error("Transaction aborted")]
    TransactionAborted,

    #[error("A transaction is already active")]
    TransactionActive,
}

pub type RepoResult<T> = Result<T, RepoError>;
