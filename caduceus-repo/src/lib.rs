//! The event-sourced repository engine for Caduceus
//!
//! An append-only log of domain events, a rebuildable secondary index, and
//! the aggregate reconstruction that replays events into consistent OTUs,
//! plus the transactional write path and the RefSeq accession replacement
//! protocol built on top of it.

pub mod error;
pub mod event;
pub mod index;
pub mod otu;
pub mod promote;
pub mod repo;
pub mod store;

pub use error::{RepoError, RepoResult};
pub use event::{Event, EventBody};
pub use index::Index;
pub use otu::{Isolate, Otu, Sequence};
pub use promote::{
    promote_otu_accessions, promote_otu_accessions_from_records,
    replace_otu_sequence_from_record, DeleteRationale,
};
pub use repo::{abort, Repo};
pub use store::{EventStore, StoreError};
