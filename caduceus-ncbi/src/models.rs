//! Validated record models for NCBI Nucleotide and Taxonomy
//!
//! These are plain data carriers. Field validation happens when a
//! `RecordSource` implementation parses a raw response into them; the
//! repository engine trusts them as-is.

use caduceus_core::{Accession, MolType, Strandedness, Topology};
use serde::{Deserialize, Serialize};

/// Source-feature metadata from a GenBank record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenbankSource {
    /// The segment name, for multipartite genomes.
    pub segment: Option<String>,

    pub isolate: Option<String>,

    pub strain: Option<String>,

    pub clone: Option<String>,
}

/// A validated GenBank nucleotide record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenbankRecord {
    /// The unversioned accession key.
    pub accession: String,

    /// The accession version.
    pub version: u32,

    /// The record definition line.
    pub definition: String,

    /// The nucleotide sequence.
    pub sequence: String,

    /// The free-text comment field. Carries the RefSeq provenance note on
    /// curated records.
    pub comment: String,

    pub moltype: MolType,

    pub strandedness: Strandedness,

    pub topology: Topology,

    /// The NCBI Taxonomy id of the source organism.
    pub taxid: u32,

    pub source: GenbankSource,
}

impl GenbankRecord {
    /// The versioned accession string (eg. `NC_055390.1`).
    pub fn accession_version(&self) -> String {
        format!("{}.{}", self.accession, self.version)
    }

    /// The versioned accession.
    pub fn versioned_accession(&self) -> Accession {
        Accession::new(self.accession.clone(), self.version)
    }

    /// Whether this record comes from the curated RefSeq collection.
    pub fn refseq(&self) -> bool {
        self.accession.starts_with("NC_")
    }
}

/// A validated NCBI Taxonomy record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxonomyRecord {
    pub taxid: u32,

    /// The scientific name of the taxon.
    pub name: String,

    pub rank: Option<String>,

    /// Ancestor taxon names, most general first.
    pub lineage: Vec<String>,
}
