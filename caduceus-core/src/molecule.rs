//! Molecule metadata carried by an OTU

use serde::{Deserialize, Serialize};

/// Strandedness of the molecule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strandedness {
    Single,
    Double,
}

/// The type of molecular information in a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MolType {
    #[serde(rename = "DNA")]
    Dna,
    #[serde(rename = "RNA")]
    Rna,
    #[serde(rename = "cRNA")]
    CRna,
    #[serde(rename = "mRNA")]
    MRna,
    #[serde(rename = "tRNA")]
    TRna,
}

/// Topology of the molecule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topology {
    Linear,
    Circular,
}

/// Molecule metadata for an OTU
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Molecule {
    pub strandedness: Strandedness,

    #[serde(rename = "type")]
    pub kind: MolType,

    pub topology: Topology,
}
