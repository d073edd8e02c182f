//! An in-memory record source for tests

use std::collections::HashMap;

use caduceus_core::Accession;
use caduceus_ncbi::{
    AccessionFilter, GenbankRecord, NcbiResult, RecordSource, TaxonomyRecord,
};

/// A `RecordSource` backed by in-memory fixtures
#[derive(Default)]
pub struct MockRecordSource {
    taxonomy: HashMap<u32, TaxonomyRecord>,
    records: Vec<GenbankRecord>,
}

impl MockRecordSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(mut self, record: GenbankRecord) -> Self {
        self.records.push(record);
        self
    }

    pub fn with_taxonomy(mut self, record: TaxonomyRecord) -> Self {
        self.taxonomy.insert(record.taxid, record);
        self
    }
}

impl RecordSource for MockRecordSource {
    fn fetch_taxonomy_record(&self, taxid: u32) -> NcbiResult<Option<TaxonomyRecord>> {
        Ok(self.taxonomy.get(&taxid).cloned())
    }

    fn fetch_genbank_records(&self, accessions: &[String]) -> NcbiResult<Vec<GenbankRecord>> {
        Ok(self
            .records
            .iter()
            .filter(|record| {
                accessions.contains(&record.accession)
                    || accessions.contains(&record.accession_version())
            })
            .cloned()
            .collect())
    }

    fn fetch_accessions_by_taxid(
        &self,
        taxid: u32,
        filter: &AccessionFilter,
    ) -> NcbiResult<Vec<Accession>> {
        Ok(self
            .records
            .iter()
            .filter(|record| record.taxid == taxid)
            .filter(|record| !filter.refseq_only || record.refseq())
            .filter(|record| {
                let length = record.sequence.len();

                filter
                    .sequence_min_length
                    .map_or(true, |min| length >= min as usize)
                    && filter
                        .sequence_max_length
                        .map_or(true, |max| length <= max as usize)
            })
            .map(|record| record.versioned_accession())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{genbank_record, generate_nucleotides};

    #[test]
    fn test_taxonomy_lookup() {
        let source = MockRecordSource::new().with_taxonomy(TaxonomyRecord {
            taxid: 12242,
            name: "Tobacco mosaic virus".to_string(),
            rank: Some("species".to_string()),
            lineage: vec!["Viruses".to_string(), "Virgaviridae".to_string()],
        });

        let record = source.fetch_taxonomy_record(12242).unwrap().unwrap();

        assert_eq!(record.name, "Tobacco mosaic virus");
        assert!(source.fetch_taxonomy_record(438782).unwrap().is_none());
    }

    #[test]
    fn test_accession_listing_respects_filters() {
        let source = MockRecordSource::new()
            .with_record(genbank_record("NC_055390", &generate_nucleotides(150, 1)))
            .with_record(genbank_record("MF062125", &generate_nucleotides(150, 2)))
            .with_record(genbank_record("NC_099999", &generate_nucleotides(400, 3)));

        let accessions = source
            .fetch_accessions_by_taxid(
                12242,
                &AccessionFilter {
                    sequence_min_length: Some(145),
                    sequence_max_length: Some(154),
                    refseq_only: true,
                    ..AccessionFilter::default()
                },
            )
            .unwrap();

        assert_eq!(accessions, vec![Accession::new("NC_055390", 1)]);
    }
}
