//! The OTU aggregate
//!
//! An OTU exists only as a projection of its event sequence. The aggregate
//! owns all of its sequences in one insertion-ordered arena; isolates
//! reference them by id, and the id→position lookup maps are derived caches
//! rebuilt after canonical sorting, never a source of ownership.

pub mod isolate;
pub mod sequence;

use std::collections::{BTreeSet, HashMap};

use indexmap::IndexMap;
use uuid::Uuid;

use caduceus_core::{Accession, IsolateName, Molecule, Plan};

use crate::error::{RepoError, RepoResult};
use crate::event::ApplyError;

pub use isolate::Isolate;
pub use sequence::Sequence;

/// An OTU in a reference repository
#[derive(Debug, Clone, PartialEq)]
pub struct Otu {
    /// The OTU id.
    pub id: Uuid,

    /// The OTU acronym (eg. TMV for Tobacco mosaic virus).
    pub acronym: String,

    /// A string id carried over from a legacy reference repository.
    pub legacy_id: Option<String>,

    /// The name of the OTU (eg. Tobacco mosaic virus).
    pub name: String,

    /// The type of molecular information contained in this OTU.
    pub molecule: Molecule,

    /// The expected segment structure of the OTU.
    pub plan: Plan,

    /// The NCBI Taxonomy id for this OTU.
    pub taxid: u32,

    /// Accession keys that should not be retrieved in future fetch
    /// operations.
    pub excluded_accessions: BTreeSet<String>,

    /// The id of the representative isolate, once one is set.
    pub representative_isolate: Option<Uuid>,

    /// Isolates contained in this OTU, in canonical name order.
    pub isolates: Vec<Isolate>,

    /// All sequences in the OTU, linked or not, in insertion order.
    sequences: IndexMap<Uuid, Sequence>,

    /// Isolate id → position in `isolates`. Derived.
    isolate_positions: HashMap<Uuid, usize>,
}

impl Otu {
    /// Instantiate a fresh aggregate with no isolates or sequences.
    pub fn new(
        id: Uuid,
        acronym: String,
        legacy_id: Option<String>,
        molecule: Molecule,
        name: String,
        plan: Plan,
        taxid: u32,
    ) -> Self {
        Self {
            id,
            acronym,
            legacy_id,
            name,
            molecule,
            plan,
            taxid,
            excluded_accessions: BTreeSet::new(),
            representative_isolate: None,
            isolates: Vec::new(),
            sequences: IndexMap::new(),
            isolate_positions: HashMap::new(),
        }
    }

    /// Every sequence currently in the OTU, linked or not, in insertion
    /// order.
    pub fn sequences(&self) -> impl Iterator<Item = &Sequence> {
        self.sequences.values()
    }

    /// The accession keys of every sequence currently in the OTU, linked or
    /// not.
    pub fn accessions(&self) -> BTreeSet<String> {
        self.sequences
            .values()
            .map(|sequence| sequence.accession.key.clone())
            .collect()
    }

    /// The versioned accessions of every sequence currently in the OTU.
    pub fn versioned_accessions(&self) -> BTreeSet<Accession> {
        self.sequences
            .values()
            .map(|sequence| sequence.accession.clone())
            .collect()
    }

    /// Accession keys that should not be considered for addition: those
    /// already present plus those explicitly excluded.
    pub fn blocked_accessions(&self) -> BTreeSet<String> {
        let mut blocked = self.accessions();
        blocked.extend(self.excluded_accessions.iter().cloned());
        blocked
    }

    /// The ids of the isolates in the OTU.
    pub fn isolate_ids(&self) -> BTreeSet<Uuid> {
        self.isolates.iter().map(|isolate| isolate.id).collect()
    }

    pub fn get_isolate(&self, isolate_id: &Uuid) -> Option<&Isolate> {
        self.isolate_positions
            .get(isolate_id)
            .and_then(|&position| self.isolates.get(position))
    }

    /// Get the id of the isolate with the given name.
    pub fn get_isolate_id_by_name(&self, name: &IsolateName) -> Option<Uuid> {
        self.isolates
            .iter()
            .find(|isolate| isolate.name.as_ref() == Some(name))
            .map(|isolate| isolate.id)
    }

    pub fn get_sequence_by_id(&self, sequence_id: &Uuid) -> Option<&Sequence> {
        self.sequences.get(sequence_id)
    }

    /// Get a sequence by its accession key.
    pub fn get_sequence_by_accession(&self, accession_key: &str) -> Option<&Sequence> {
        self.sequences
            .values()
            .find(|sequence| sequence.accession.key == accession_key)
    }

    /// The isolate and sequence ids behind an accession key, if the accession
    /// is linked anywhere in the OTU.
    pub fn sequence_hierarchy_by_accession(&self, accession_key: &str) -> Option<(Uuid, Uuid)> {
        let sequence = self.get_sequence_by_accession(accession_key)?;

        self.isolates
            .iter()
            .find(|isolate| isolate.contains_sequence(&sequence.id))
            .map(|isolate| (isolate.id, sequence.id))
    }

    /// The ids of every isolate containing the given sequence.
    pub fn isolates_containing_sequence(&self, sequence_id: &Uuid) -> Vec<Uuid> {
        self.isolates
            .iter()
            .filter(|isolate| isolate.contains_sequence(sequence_id))
            .map(|isolate| isolate.id)
            .collect()
    }

    /// The sequences linked to an isolate, in the isolate's order.
    pub fn isolate_sequences<'a>(
        &'a self,
        isolate: &'a Isolate,
    ) -> impl Iterator<Item = &'a Sequence> {
        isolate
            .sequence_ids
            .iter()
            .filter_map(|sequence_id| self.sequences.get(sequence_id))
    }

    /// The accession keys linked to an isolate.
    pub fn isolate_accessions(&self, isolate: &Isolate) -> BTreeSet<String> {
        self.isolate_sequences(isolate)
            .map(|sequence| sequence.accession.key.clone())
            .collect()
    }

    // ------------------------------------------------------------------
    // Mutators. Called only through event application.
    // ------------------------------------------------------------------

    pub(crate) fn add_isolate(&mut self, isolate: Isolate) {
        self.isolate_positions.insert(isolate.id, self.isolates.len());
        self.isolates.push(isolate);
    }

    pub(crate) fn add_sequence(&mut self, sequence: Sequence) {
        self.sequences.insert(sequence.id, sequence);
    }

    pub(crate) fn delete_isolate(&mut self, isolate_id: &Uuid) -> Result<(), ApplyError> {
        let position = self
            .isolate_positions
            .remove(isolate_id)
            .ok_or(ApplyError::MissingIsolate(*isolate_id))?;

        let isolate = self.isolates.remove(position);

        for sequence_id in isolate.sequence_ids {
            self.sequences.shift_remove(&sequence_id);
        }

        self.rebuild_positions();

        Ok(())
    }

    pub(crate) fn link_sequence(
        &mut self,
        isolate_id: &Uuid,
        sequence_id: &Uuid,
    ) -> Result<(), ApplyError> {
        if !self.sequences.contains_key(sequence_id) {
            return Err(ApplyError::MissingSequence(*sequence_id));
        }

        let position = *self
            .isolate_positions
            .get(isolate_id)
            .ok_or(ApplyError::MissingIsolate(*isolate_id))?;

        let isolate = &mut self.isolates[position];

        if isolate.contains_sequence(sequence_id) {
            return Err(ApplyError::AlreadyLinked(*sequence_id));
        }

        isolate.sequence_ids.push(*sequence_id);

        Ok(())
    }

    pub(crate) fn unlink_sequence(
        &mut self,
        isolate_id: &Uuid,
        sequence_id: &Uuid,
    ) -> Result<(), ApplyError> {
        let position = *self
            .isolate_positions
            .get(isolate_id)
            .ok_or(ApplyError::MissingIsolate(*isolate_id))?;

        let isolate = &mut self.isolates[position];

        let index = isolate
            .sequence_ids
            .iter()
            .position(|id| id == sequence_id)
            .ok_or(ApplyError::NotLinked(*sequence_id))?;

        isolate.sequence_ids.remove(index);

        Ok(())
    }

    pub(crate) fn delete_sequence(&mut self, sequence_id: &Uuid) -> Result<(), ApplyError> {
        // Isolate link lists are left alone: the projection accessors resolve
        // ids through the arena, so a tombstoned sequence is omitted from any
        // isolate that still lists it.
        self.sequences
            .shift_remove(sequence_id)
            .ok_or(ApplyError::MissingSequence(*sequence_id))?;

        Ok(())
    }

    /// Put the aggregate into its canonical, reproducible order: isolates by
    /// `(name type, name value)` with unnamed isolates first, and each
    /// isolate's sequences by accession.
    pub(crate) fn sort_canonical(&mut self) {
        self.isolates.sort_by(|a, b| a.name.cmp(&b.name));

        let sequences = &self.sequences;

        for isolate in &mut self.isolates {
            isolate.sequence_ids.sort_by_key(|sequence_id| {
                sequences
                    .get(sequence_id)
                    .map(|sequence| sequence.accession.clone())
            });
        }

        self.rebuild_positions();
    }

    fn rebuild_positions(&mut self) {
        self.isolate_positions = self
            .isolates
            .iter()
            .enumerate()
            .map(|(position, isolate)| (isolate.id, position))
            .collect();
    }

    /// Check the aggregate-local invariants at a validation boundary.
    pub fn validate(&self) -> RepoResult<()> {
        if let Some(representative) = self.representative_isolate {
            if self.get_isolate(&representative).is_none() {
                return Err(RepoError::IsolateNotFound {
                    isolate_id: representative,
                });
            }
        }

        if let Some(accession) = self
            .accessions()
            .intersection(&self.excluded_accessions)
            .next()
        {
            return Err(RepoError::AccessionInUse {
                accession: accession.clone(),
            });
        }

        let mut names = std::collections::HashSet::new();

        for isolate in &self.isolates {
            if let Some(name) = &isolate.name {
                if !names.insert(name.clone()) {
                    return Err(RepoError::DuplicateIsolateName { name: name.clone() });
                }
            }
        }

        for sequence in self.sequences.values() {
            let segment = self.plan.get_segment(&sequence.segment).ok_or(
                RepoError::SegmentNotInPlan {
                    segment_id: sequence.segment,
                },
            )?;

            if !segment.conforms(sequence.sequence.len()) {
                let (min, max) = segment.length_window();

                return Err(RepoError::SequenceLengthOutOfTolerance {
                    length: sequence.sequence.len(),
                    min,
                    max,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caduceus_core::{
        IsolateNameType, MolType, Molecule, Segment, Strandedness, Topology,
    };

    fn otu() -> Otu {
        Otu::new(
            Uuid::new_v4(),
            "TMV".to_string(),
            None,
            Molecule {
                strandedness: Strandedness::Single,
                kind: MolType::Rna,
                topology: Topology::Linear,
            },
            "Tobacco mosaic virus".to_string(),
            Plan::new(vec![Segment::new(4, 0.0, None).unwrap()]).unwrap(),
            12242,
        )
    }

    fn sequence(otu: &Otu, key: &str) -> Sequence {
        Sequence {
            id: Uuid::new_v4(),
            accession: Accession::new(key, 1),
            definition: "TMV".to_string(),
            legacy_id: None,
            segment: otu.plan.segments[0].id,
            sequence: "ACGT".to_string(),
        }
    }

    #[test]
    fn test_link_and_accessions() {
        let mut otu = otu();

        let isolate = Isolate::new(
            Uuid::new_v4(),
            None,
            Some(IsolateName::new(IsolateNameType::Isolate, "A")),
        );
        let isolate_id = isolate.id;

        let seq = sequence(&otu, "TMVABC");
        let sequence_id = seq.id;

        otu.add_isolate(isolate);
        otu.add_sequence(seq);

        otu.link_sequence(&isolate_id, &sequence_id).unwrap();

        assert_eq!(otu.accessions(), BTreeSet::from(["TMVABC".to_string()]));
        assert_eq!(
            otu.isolates_containing_sequence(&sequence_id),
            vec![isolate_id]
        );
        assert_eq!(
            otu.sequence_hierarchy_by_accession("TMVABC"),
            Some((isolate_id, sequence_id))
        );
    }

    #[test]
    fn test_link_missing_sequence_fails() {
        let mut otu = otu();

        let isolate = Isolate::new(Uuid::new_v4(), None, None);
        let isolate_id = isolate.id;
        otu.add_isolate(isolate);

        assert!(matches!(
            otu.link_sequence(&isolate_id, &Uuid::new_v4()),
            Err(ApplyError::MissingSequence(_))
        ));
    }

    #[test]
    fn test_delete_sequence_hides_it_from_projection() {
        let mut otu = otu();

        let isolate = Isolate::new(Uuid::new_v4(), None, None);
        let isolate_id = isolate.id;
        otu.add_isolate(isolate);

        let seq = sequence(&otu, "TMVABC");
        let sequence_id = seq.id;
        otu.add_sequence(seq);

        otu.link_sequence(&isolate_id, &sequence_id).unwrap();
        otu.delete_sequence(&sequence_id).unwrap();

        assert!(otu.get_sequence_by_id(&sequence_id).is_none());

        let isolate = otu.get_isolate(&isolate_id).unwrap();

        assert_eq!(otu.isolate_sequences(isolate).count(), 0);
        assert!(otu.isolate_accessions(isolate).is_empty());
        assert!(otu.accessions().is_empty());
    }

    #[test]
    fn test_delete_isolate_removes_its_sequences() {
        let mut otu = otu();

        let isolate_a = Isolate::new(Uuid::new_v4(), None, None);
        let isolate_b = Isolate::new(
            Uuid::new_v4(),
            None,
            Some(IsolateName::new(IsolateNameType::Isolate, "B")),
        );
        let (a_id, b_id) = (isolate_a.id, isolate_b.id);

        otu.add_isolate(isolate_a);
        otu.add_isolate(isolate_b);

        let seq_a = sequence(&otu, "TMVABC");
        let seq_b = sequence(&otu, "NC_055390");
        let (seq_a_id, seq_b_id) = (seq_a.id, seq_b.id);

        otu.add_sequence(seq_a);
        otu.add_sequence(seq_b);

        otu.link_sequence(&a_id, &seq_a_id).unwrap();
        otu.link_sequence(&b_id, &seq_b_id).unwrap();

        otu.delete_isolate(&a_id).unwrap();

        assert!(otu.get_isolate(&a_id).is_none());
        assert!(otu.get_sequence_by_id(&seq_a_id).is_none());

        // The other isolate and its sequence are untouched.
        assert!(otu.get_sequence_by_id(&seq_b_id).is_some());
        assert!(otu.get_isolate(&b_id).unwrap().contains_sequence(&seq_b_id));
    }

    #[test]
    fn test_canonical_sort_unnamed_first() {
        let mut otu = otu();

        otu.add_isolate(Isolate::new(
            Uuid::new_v4(),
            None,
            Some(IsolateName::new(IsolateNameType::Isolate, "B")),
        ));
        otu.add_isolate(Isolate::new(
            Uuid::new_v4(),
            None,
            Some(IsolateName::new(IsolateNameType::Isolate, "A")),
        ));
        otu.add_isolate(Isolate::new(Uuid::new_v4(), None, None));

        otu.sort_canonical();

        let names: Vec<Option<String>> = otu
            .isolates
            .iter()
            .map(|isolate| isolate.name.as_ref().map(|n| n.value.clone()))
            .collect();

        assert_eq!(names, vec![None, Some("A".to_string()), Some("B".to_string())]);

        // Positions stay usable after sorting.
        for isolate in &otu.isolates {
            assert_eq!(otu.get_isolate(&isolate.id).unwrap().id, isolate.id);
        }
    }

    #[test]
    fn test_validate_representative_must_exist() {
        let mut otu = otu();
        otu.representative_isolate = Some(Uuid::new_v4());

        assert!(matches!(
            otu.validate(),
            Err(RepoError::IsolateNotFound { .. })
        ));
    }

    #[test]
    fn test_validate_excluded_disjoint() {
        let mut otu = otu();

        let seq = sequence(&otu, "TMVABC");
        otu.add_sequence(seq);
        otu.excluded_accessions.insert("TMVABC".to_string());

        assert!(matches!(
            otu.validate(),
            Err(RepoError::AccessionInUse { .. })
        ));
    }
}
