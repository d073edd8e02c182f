//! Core value types shared across all Caduceus crates

pub mod accession;
pub mod error;
pub mod models;
pub mod molecule;
pub mod name;
pub mod plan;
pub mod sequence;

pub use accession::{parse_accession_key, Accession};
pub use error::{CoreError, CoreResult};
pub use models::{DataType, OtuMinimal, RepoMeta, RepoSettings};
pub use molecule::{MolType, Molecule, Strandedness, Topology};
pub use name::{IsolateName, IsolateNameType};
pub use plan::{Plan, Segment, SegmentRule};
pub use sequence::validate_nucleotides;

/// Version information for the Caduceus project
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
