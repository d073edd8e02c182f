//! NCBI collaborator surface for Caduceus
//!
//! The repository engine never talks to NCBI directly. It consumes validated
//! record models through the [`RecordSource`] trait, and previously fetched
//! responses through the file-backed [`NcbiCache`]. Transport belongs to
//! implementors of `RecordSource`.

pub mod cache;
pub mod comment;
pub mod error;
pub mod models;
pub mod source;

pub use cache::NcbiCache;
pub use comment::parse_refseq_comment;
pub use error::{NcbiError, NcbiResult};
pub use models::{GenbankRecord, GenbankSource, TaxonomyRecord};
pub use source::{AccessionFilter, RecordSource};
