//! Test utilities for the Caduceus workspace
//!
//! Common fixtures, record factories, and a mock record source for use
//! across crate test suites.

pub mod fixtures;
pub mod mock;

pub use fixtures::{
    empty_repo, generate_nucleotides, genbank_record, initialized_repo, refseq_comment,
    tmv_molecule, tmv_plan, RepoFixture,
};
pub use mock::MockRecordSource;
