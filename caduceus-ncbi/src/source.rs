//! The transport-agnostic record source interface

use caduceus_core::Accession;
use chrono::{DateTime, Utc};

use crate::error::NcbiResult;
use crate::models::{GenbankRecord, TaxonomyRecord};

/// Server-side filters for accession listing by taxid
#[derive(Debug, Clone, Default)]
pub struct AccessionFilter {
    /// Only return accessions whose sequence length is at least this.
    pub sequence_min_length: Option<u32>,

    /// Only return accessions whose sequence length is at most this.
    pub sequence_max_length: Option<u32>,

    /// Only return curated RefSeq accessions.
    pub refseq_only: bool,

    /// Only return records modified on or after this date.
    pub modification_date_start: Option<DateTime<Utc>>,
}

/// A source of validated genomic records.
///
/// The repository engine calls these three operations and nothing else; how
/// records are fetched (HTTP, cache, fixtures) is up to the implementor.
pub trait RecordSource {
    /// Fetch the taxonomy record for `taxid`. `Ok(None)` when the taxid is
    /// unknown to the source.
    fn fetch_taxonomy_record(&self, taxid: u32) -> NcbiResult<Option<TaxonomyRecord>>;

    /// Fetch full GenBank records for the given accessions. Accessions the
    /// source does not know are omitted from the result.
    fn fetch_genbank_records(&self, accessions: &[String]) -> NcbiResult<Vec<GenbankRecord>>;

    /// List accessions filed under `taxid`, subject to `filter`.
    fn fetch_accessions_by_taxid(
        &self,
        taxid: u32,
        filter: &AccessionFilter,
    ) -> NcbiResult<Vec<Accession>>;
}
