//! The event-sourced repository orchestrator
//!
//! `Repo` is the public operation surface. Every mutation is validated
//! against the current aggregate state, written as one or more events
//! through the store, indexed, and answered by re-deriving the aggregate
//! through the index. The engine assumes a single writer process operating
//! on one local repository at a time.

use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

use indexmap::IndexMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

use caduceus_core::{
    parse_accession_key, Accession, CoreError, DataType, IsolateName, Molecule, OtuMinimal,
    Plan, RepoMeta, RepoSettings,
};

use crate::error::{RepoError, RepoResult};
use crate::event::{
    CreateIsolateData, CreateOtuData, CreatePlanData, CreateRepoData, CreateSequenceData,
    DeleteIsolateData, DeleteSequenceData, Event, EventBody, ExcludedAccessionAction,
    IsolateQuery, LinkSequenceData, OtuQuery, RepoQuery, SequenceQuery,
    SetRepresentativeIsolateData, UnlinkSequenceData, UpdateExcludedAccessionsData,
};
use crate::index::Index;
use crate::otu::{Isolate, Otu, Sequence};
use crate::store::{EventStore, StoreError};

/// Roll back the enclosing transaction scope.
///
/// Returned from a `use_transaction` closure; the scope converts it to
/// `Ok(None)` after rolling back.
pub fn abort<T>() -> RepoResult<T> {
    Err(RepoError::TransactionAborted)
}

/// An event-sourced reference repository
pub struct Repo {
    path: PathBuf,
    store: EventStore,
    index: Index,
    meta: RepoMeta,
    settings: RepoSettings,
}

impl Repo {
    /// Create a new reference repository in an empty target directory and
    /// open it.
    ///
    /// Produces the on-disk layout (`src/` event directory plus `.cache/`)
    /// and writes the repository creation event as event id 1.
    pub fn new(
        data_type: DataType,
        name: &str,
        path: impl Into<PathBuf>,
        organism: &str,
        default_segment_length_tolerance: f64,
    ) -> RepoResult<Self> {
        let path = path.into();

        if path.is_file() {
            return Err(RepoError::InvalidPath(
                "the target path is a file".to_string(),
            ));
        }

        fs::create_dir_all(&path)?;

        if fs::read_dir(&path)?.next().is_some() {
            return Err(RepoError::InvalidPath(
                "the target path is not empty".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&default_segment_length_tolerance) {
            return Err(RepoError::Model(CoreError::InvalidSegment(format!(
                "length tolerance {default_segment_length_tolerance} is not in [0, 1]"
            ))));
        }

        fs::write(path.join(".gitignore"), ".cache\n")?;
        fs::create_dir_all(path.join(".cache"))?;

        let repository_id = Uuid::new_v4();

        let mut store = EventStore::open(path.join("src"))?;

        store.write_event(EventBody::CreateRepo {
            data: CreateRepoData {
                id: repository_id,
                data_type,
                name: name.to_string(),
                organism: organism.to_string(),
                settings: RepoSettings {
                    default_segment_length_tolerance,
                },
            },
            query: RepoQuery { repository_id },
        })?;

        drop(store);

        Self::open(path)
    }

    /// Open an existing repository.
    ///
    /// Verifies event log contiguity, reads the repository creation event,
    /// and loads the index — rebuilding it by full replay when the cached
    /// snapshot is missing or stale.
    pub fn open(path: impl Into<PathBuf>) -> RepoResult<Self> {
        let path = path.into();

        let store = EventStore::open(path.join("src"))?;

        let first = store.read_event(1).map_err(|e| match e {
            StoreError::EventNotFound { .. } => RepoError::MissingCreateRepo,
            e => e.into(),
        })?;

        let (meta, settings) = match &first.body {
            EventBody::CreateRepo { data, .. } => (
                RepoMeta {
                    id: data.id,
                    created_at: first.timestamp,
                    data_type: data.data_type,
                    name: data.name.clone(),
                    organism: data.organism.clone(),
                },
                data.settings.clone(),
            ),
            _ => return Err(RepoError::MissingCreateRepo),
        };

        let index = Index::load(path.join(".cache"), store.last_id());

        let mut repo = Self {
            path,
            store,
            index,
            meta,
            settings,
        };

        if repo.index.last_id() != repo.store.last_id() {
            info!("No index found. Rebuilding...");
            repo.rebuild_index()?;
        }

        Ok(repo)
    }

    /// The path to the repository directory.
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// The id of the most recently added event in the event store.
    pub fn last_id(&self) -> u64 {
        self.store.last_id()
    }

    /// The metadata for the repository.
    pub fn meta(&self) -> &RepoMeta {
        &self.meta
    }

    /// The settings for the repository.
    pub fn settings(&self) -> &RepoSettings {
        &self.settings
    }

    // ------------------------------------------------------------------
    // Read paths.
    // ------------------------------------------------------------------

    /// Get the OTU with the given id, or `None` if it does not exist.
    ///
    /// The aggregate is re-derived from its event sequence; the index's
    /// cached projection is refreshed as a side effect.
    pub fn get_otu(&mut self, otu_id: Uuid) -> RepoResult<Option<Otu>> {
        let Some(event_ids) = self.index.get_event_ids(&otu_id) else {
            return Ok(None);
        };

        let otu = rehydrate(&self.store, &event_ids)?;

        self.index.upsert_otu(&otu, self.store.last_id());

        Ok(Some(otu))
    }

    /// Get the OTU with the given taxid, or `None` if it does not exist.
    pub fn get_otu_by_taxid(&mut self, taxid: u32) -> RepoResult<Option<Otu>> {
        match self.get_otu_id_by_taxid(taxid) {
            Some(otu_id) => self.get_otu(otu_id),
            None => Ok(None),
        }
    }

    /// Get the id of the OTU with the given taxid.
    pub fn get_otu_id_by_taxid(&self, taxid: u32) -> Option<Uuid> {
        self.index.get_id_by_taxid(taxid)
    }

    /// Get the id of the OTU containing the given sequence.
    pub fn get_otu_id_by_sequence_id(&mut self, sequence_id: Uuid) -> RepoResult<Option<Uuid>> {
        for otu_id in self.index.otu_ids() {
            if let Some(otu) = self.get_otu(otu_id)? {
                if otu.get_sequence_by_id(&sequence_id).is_some() {
                    return Ok(Some(otu_id));
                }
            }
        }

        Ok(None)
    }

    /// All OTUs in the repository, re-derived through the index.
    pub fn iter_otus(&mut self) -> RepoResult<Vec<Otu>> {
        let mut otus = Vec::new();

        for otu_id in self.index.otu_ids() {
            let otu = self
                .get_otu(otu_id)?
                .ok_or(RepoError::OtuNotFound { otu_id })?;

            otus.push(otu);
        }

        Ok(otus)
    }

    /// Iterate minimal OTU projections without full replay.
    pub fn iter_minimal_otus(&self) -> impl Iterator<Item = &OtuMinimal> {
        self.index.iter_minimal()
    }

    /// All OTUs, reconstructed directly from the event log, bypassing the
    /// index.
    pub fn iter_otus_from_events(&self) -> RepoResult<Vec<Otu>> {
        let mut events_by_otu: IndexMap<Uuid, Vec<u64>> = IndexMap::new();

        for event in self.store.iter_events(1)? {
            let event = event?;

            if let Some(otu_id) = event.body.otu_id() {
                events_by_otu.entry(otu_id).or_default().push(event.id);
            }
        }

        events_by_otu
            .values()
            .map(|event_ids| rehydrate(&self.store, event_ids))
            .collect()
    }

    // ------------------------------------------------------------------
    // Write paths.
    // ------------------------------------------------------------------

    /// Create an OTU.
    ///
    /// Fails if the taxid, name, or legacy id is already in use.
    pub fn create_otu(
        &mut self,
        acronym: &str,
        legacy_id: Option<String>,
        molecule: Molecule,
        name: &str,
        plan: Plan,
        taxid: u32,
    ) -> RepoResult<Otu> {
        if taxid == 0 {
            return Err(RepoError::InvalidTaxid);
        }

        if self.index.get_id_by_taxid(taxid).is_some() {
            return Err(RepoError::DuplicateTaxid { taxid });
        }

        if self.index.get_id_by_name(name).is_some() {
            return Err(RepoError::DuplicateName {
                name: name.to_string(),
            });
        }

        if let Some(legacy_id) = &legacy_id {
            if self.index.get_id_by_legacy_id(legacy_id).is_some() {
                return Err(RepoError::DuplicateLegacyId {
                    legacy_id: legacy_id.clone(),
                });
            }
        }

        info!(taxid, name, "Creating new OTU");

        let otu_id = Uuid::new_v4();

        let event = self.write_event(EventBody::CreateOtu {
            data: CreateOtuData {
                id: otu_id,
                acronym: acronym.to_string(),
                legacy_id,
                molecule,
                name: name.to_string(),
                taxid,
                plan,
            },
            query: OtuQuery { otu_id },
        })?;

        debug!(event_id = event.id, %otu_id, "OTU written");

        self.require_otu(otu_id)
    }

    /// Create an isolate for the OTU with `otu_id`.
    ///
    /// Fails if the name is non-null and already used within the OTU.
    pub fn create_isolate(
        &mut self,
        otu_id: Uuid,
        legacy_id: Option<String>,
        name: Option<IsolateName>,
    ) -> RepoResult<Isolate> {
        let otu = self.require_otu(otu_id)?;

        if let Some(name) = &name {
            if otu.get_isolate_id_by_name(name).is_some() {
                return Err(RepoError::DuplicateIsolateName { name: name.clone() });
            }
        }

        let isolate_id = Uuid::new_v4();

        let event = self.write_event(EventBody::CreateIsolate {
            data: CreateIsolateData {
                id: isolate_id,
                legacy_id,
                name,
            },
            query: IsolateQuery { otu_id, isolate_id },
        })?;

        debug!(event_id = event.id, %isolate_id, "Isolate written");

        let otu = self.require_otu(otu_id)?;

        otu.get_isolate(&isolate_id)
            .cloned()
            .ok_or(RepoError::IsolateNotFound { isolate_id })
    }

    /// Delete an existing isolate from a given OTU.
    ///
    /// The representative isolate cannot be deleted.
    pub fn delete_isolate(
        &mut self,
        otu_id: Uuid,
        isolate_id: Uuid,
        rationale: &str,
    ) -> RepoResult<()> {
        let otu = self.require_otu(otu_id)?;

        if otu.get_isolate(&isolate_id).is_none() {
            return Err(RepoError::IsolateNotFound { isolate_id });
        }

        if otu.representative_isolate == Some(isolate_id) {
            return Err(RepoError::RepresentativeIsolate { isolate_id });
        }

        self.write_event(EventBody::DeleteIsolate {
            data: DeleteIsolateData {
                rationale: rationale.to_string(),
            },
            query: IsolateQuery { otu_id, isolate_id },
        })?;

        Ok(())
    }

    /// Create and return a new sequence within the given OTU, not yet linked
    /// to any isolate.
    ///
    /// If the accession key already exists in the OTU, no event is written
    /// and `Ok(None)` is returned.
    pub fn create_sequence(
        &mut self,
        otu_id: Uuid,
        accession: &str,
        definition: &str,
        legacy_id: Option<String>,
        segment: Uuid,
        sequence: &str,
    ) -> RepoResult<Option<Sequence>> {
        let otu = self.require_otu(otu_id)?;

        let versioned_accession: Accession = accession.parse().map_err(RepoError::Model)?;

        if otu.accessions().contains(&versioned_accession.key) {
            warn!(
                accession = %versioned_accession,
                %otu_id,
                "This accession already exists in the OTU"
            );
            return Ok(None);
        }

        if otu.excluded_accessions.contains(&versioned_accession.key) {
            return Err(RepoError::AccessionExcluded {
                accession: versioned_accession.key,
            });
        }

        caduceus_core::validate_nucleotides(sequence).map_err(RepoError::Model)?;

        let plan_segment =
            otu.plan
                .get_segment(&segment)
                .ok_or(RepoError::SegmentNotInPlan {
                    segment_id: segment,
                })?;

        if !plan_segment.conforms(sequence.len()) {
            let (min, max) = plan_segment.length_window();

            return Err(RepoError::SequenceLengthOutOfTolerance {
                length: sequence.len(),
                min,
                max,
            });
        }

        let sequence_id = Uuid::new_v4();

        let event = self.write_event(EventBody::CreateSequence {
            data: CreateSequenceData {
                id: sequence_id,
                accession: versioned_accession.clone(),
                definition: definition.to_string(),
                legacy_id,
                segment,
                sequence: sequence.to_string(),
            },
            query: SequenceQuery { otu_id, sequence_id },
        })?;

        debug!(
            event_id = event.id,
            %sequence_id,
            accession = %versioned_accession,
            "Sequence written"
        );

        let otu = self.require_otu(otu_id)?;

        Ok(otu.get_sequence_by_id(&sequence_id).cloned())
    }

    /// Link an existing sequence to an existing isolate.
    ///
    /// A sequence is owned by exactly one isolate; linking one that is
    /// already linked anywhere in the OTU is refused.
    pub fn link_sequence(
        &mut self,
        otu_id: Uuid,
        isolate_id: Uuid,
        sequence_id: Uuid,
    ) -> RepoResult<Sequence> {
        let otu = self.require_otu(otu_id)?;

        let isolate = otu
            .get_isolate(&isolate_id)
            .ok_or(RepoError::IsolateNotFound { isolate_id })?;

        let sequence = otu
            .get_sequence_by_id(&sequence_id)
            .ok_or(RepoError::SequenceNotFound { sequence_id })?;

        if let Some(&owner_id) = otu.isolates_containing_sequence(&sequence_id).first() {
            return Err(RepoError::SequenceAlreadyLinked {
                sequence_id,
                isolate_id: owner_id,
            });
        }

        if otu.isolate_accessions(isolate).contains(&sequence.accession.key) {
            return Err(RepoError::AccessionAlreadyInIsolate {
                isolate_id,
                accession: sequence.accession.key.clone(),
            });
        }

        let accession = sequence.accession.clone();

        let event = self.write_event(EventBody::LinkSequence {
            data: LinkSequenceData { sequence_id },
            query: IsolateQuery { otu_id, isolate_id },
        })?;

        debug!(
            event_id = event.id,
            %sequence_id,
            %isolate_id,
            accession = %accession,
            "Sequence linked to isolate"
        );

        let otu = self.require_otu(otu_id)?;

        otu.get_sequence_by_id(&sequence_id)
            .cloned()
            .ok_or(RepoError::SequenceNotFound { sequence_id })
    }

    /// Detach a sequence from an isolate.
    pub fn unlink_sequence(
        &mut self,
        otu_id: Uuid,
        isolate_id: Uuid,
        sequence_id: Uuid,
    ) -> RepoResult<()> {
        let otu = self.require_otu(otu_id)?;

        let isolate = otu
            .get_isolate(&isolate_id)
            .ok_or(RepoError::IsolateNotFound { isolate_id })?;

        if !isolate.contains_sequence(&sequence_id) {
            return Err(RepoError::SequenceNotLinked {
                sequence_id,
                isolate_id,
            });
        }

        self.write_event(EventBody::UnlinkSequence {
            data: UnlinkSequenceData { sequence_id },
            query: IsolateQuery { otu_id, isolate_id },
        })?;

        Ok(())
    }

    /// Replace a sequence under an isolate: unlink the old sequence, delete
    /// it with a pointer to its replacement, and link the new sequence, as
    /// one logical unit.
    ///
    /// Callers that group this with other operations, as the promotion
    /// protocol does, wrap it in a transaction scope.
    pub fn replace_sequence(
        &mut self,
        otu_id: Uuid,
        isolate_id: Uuid,
        sequence_id: Uuid,
        replaced_sequence_id: Uuid,
        rationale: &str,
    ) -> RepoResult<Sequence> {
        let otu = self.require_otu(otu_id)?;

        if otu.get_sequence_by_id(&sequence_id).is_none() {
            return Err(RepoError::SequenceNotFound { sequence_id });
        }

        if let Some(&owner_id) = otu.isolates_containing_sequence(&sequence_id).first() {
            return Err(RepoError::SequenceAlreadyLinked {
                sequence_id,
                isolate_id: owner_id,
            });
        }

        let isolate = otu
            .get_isolate(&isolate_id)
            .ok_or(RepoError::IsolateNotFound { isolate_id })?;

        if !isolate.contains_sequence(&replaced_sequence_id) {
            return Err(RepoError::SequenceNotLinked {
                sequence_id: replaced_sequence_id,
                isolate_id,
            });
        }

        self.write_event(EventBody::UnlinkSequence {
            data: UnlinkSequenceData {
                sequence_id: replaced_sequence_id,
            },
            query: IsolateQuery { otu_id, isolate_id },
        })?;

        self.write_event(EventBody::DeleteSequence {
            data: DeleteSequenceData {
                sequence_id: replaced_sequence_id,
                replacement: sequence_id,
                rationale: rationale.to_string(),
            },
            query: SequenceQuery {
                otu_id,
                sequence_id: replaced_sequence_id,
            },
        })?;

        self.write_event(EventBody::LinkSequence {
            data: LinkSequenceData { sequence_id },
            query: IsolateQuery { otu_id, isolate_id },
        })?;

        let otu = self.require_otu(otu_id)?;

        otu.get_sequence_by_id(&sequence_id)
            .cloned()
            .ok_or(RepoError::SequenceNotFound { sequence_id })
    }

    /// Set the isolate plan for an OTU.
    ///
    /// Every sequence currently in the OTU must still resolve to a segment
    /// of the new plan and conform to its length window.
    pub fn set_plan(&mut self, otu_id: Uuid, plan: Plan) -> RepoResult<Plan> {
        let otu = self.require_otu(otu_id)?;

        for sequence in otu.sequences() {
            let segment =
                plan.get_segment(&sequence.segment)
                    .ok_or(RepoError::SegmentNotInPlan {
                        segment_id: sequence.segment,
                    })?;

            if !segment.conforms(sequence.sequence.len()) {
                let (min, max) = segment.length_window();

                return Err(RepoError::SequenceLengthOutOfTolerance {
                    length: sequence.sequence.len(),
                    min,
                    max,
                });
            }
        }

        self.write_event(EventBody::CreatePlan {
            data: CreatePlanData { plan },
            query: OtuQuery { otu_id },
        })?;

        Ok(self.require_otu(otu_id)?.plan)
    }

    /// Set the representative isolate for an OTU.
    pub fn set_representative_isolate(
        &mut self,
        otu_id: Uuid,
        isolate_id: Uuid,
    ) -> RepoResult<Uuid> {
        let otu = self.require_otu(otu_id)?;

        if otu.get_isolate(&isolate_id).is_none() {
            return Err(RepoError::IsolateNotFound { isolate_id });
        }

        self.write_event(EventBody::SetRepresentativeIsolate {
            data: SetRepresentativeIsolateData { isolate_id },
            query: OtuQuery { otu_id },
        })?;

        Ok(isolate_id)
    }

    /// Exclude an accession from an OTU.
    ///
    /// The accession key will not be allowed in the repository in the
    /// future. Requesting an already-excluded key writes no event.
    pub fn exclude_accession(
        &mut self,
        otu_id: Uuid,
        accession: &str,
    ) -> RepoResult<BTreeSet<String>> {
        let key = parse_accession_key(accession)?;

        let otu = self.require_otu(otu_id)?;

        if otu.accessions().contains(&key) {
            return Err(RepoError::AccessionInUse { accession: key });
        }

        if otu.excluded_accessions.contains(&key) {
            debug!(accession = key, "Accession is already excluded");
            return Ok(otu.excluded_accessions);
        }

        self.write_event(EventBody::UpdateExcludedAccessions {
            data: UpdateExcludedAccessionsData {
                accessions: BTreeSet::from([key]),
                action: ExcludedAccessionAction::Exclude,
            },
            query: OtuQuery { otu_id },
        })?;

        Ok(self.require_otu(otu_id)?.excluded_accessions)
    }

    /// Add accession keys to an OTU's excluded accessions.
    ///
    /// Already-excluded keys are ignored; an event is only written when the
    /// exclusion set actually changes.
    pub fn exclude_accessions<I, S>(
        &mut self,
        otu_id: Uuid,
        accessions: I,
    ) -> RepoResult<BTreeSet<String>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let otu = self.require_otu(otu_id)?;

        let mut excludable = BTreeSet::new();

        for raw in accessions {
            excludable.insert(parse_accession_key(raw.as_ref())?);
        }

        if let Some(key) = excludable.intersection(&otu.accessions()).next() {
            return Err(RepoError::AccessionInUse {
                accession: key.clone(),
            });
        }

        let extant: BTreeSet<String> = excludable
            .intersection(&otu.excluded_accessions)
            .cloned()
            .collect();

        if !extant.is_empty() {
            info!(
                requested_exclusions = ?extant,
                "Ignoring already excluded accessions"
            );

            for key in &extant {
                excludable.remove(key);
            }
        }

        if !excludable.is_empty() {
            self.write_event(EventBody::UpdateExcludedAccessions {
                data: UpdateExcludedAccessionsData {
                    accessions: excludable.clone(),
                    action: ExcludedAccessionAction::Exclude,
                },
                query: OtuQuery { otu_id },
            })?;

            info!(
                taxid = otu.taxid,
                %otu_id,
                new_excluded_accessions = ?excludable,
                "Added accessions to excluded accession list"
            );
        }

        Ok(self.require_otu(otu_id)?.excluded_accessions)
    }

    /// Remove accession keys from an OTU's excluded accessions.
    ///
    /// Keys that are not currently excluded are ignored; an event is only
    /// written when the exclusion set actually changes.
    pub fn allow_accessions<I, S>(
        &mut self,
        otu_id: Uuid,
        accessions: I,
    ) -> RepoResult<BTreeSet<String>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let otu = self.require_otu(otu_id)?;

        let mut allowable = BTreeSet::new();

        for raw in accessions {
            allowable.insert(parse_accession_key(raw.as_ref())?);
        }

        let redundant: BTreeSet<String> = allowable
            .difference(&otu.excluded_accessions)
            .cloned()
            .collect();

        if !redundant.is_empty() {
            debug!(
                non_excluded_accessions = ?redundant,
                "Ignoring non-excluded accessions"
            );

            for key in &redundant {
                allowable.remove(key);
            }
        }

        if !allowable.is_empty() {
            self.write_event(EventBody::UpdateExcludedAccessions {
                data: UpdateExcludedAccessionsData {
                    accessions: allowable.clone(),
                    action: ExcludedAccessionAction::Allow,
                },
                query: OtuQuery { otu_id },
            })?;

            info!(
                taxid = otu.taxid,
                %otu_id,
                allowed_accessions = ?allowable,
                "Removed accessions from excluded accession list"
            );
        }

        Ok(self.require_otu(otu_id)?.excluded_accessions)
    }

    // ------------------------------------------------------------------
    // Transactions.
    // ------------------------------------------------------------------

    /// Run `f` as one all-or-nothing unit.
    ///
    /// Events written inside the scope are staged and only become part of
    /// the committed log when the closure returns `Ok`. Returning
    /// [`abort`]`()` rolls everything back and yields `Ok(None)`; any other
    /// error rolls back and propagates. Operations inside the scope observe
    /// their own staged writes. Nested transactions are refused.
    pub fn use_transaction<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> RepoResult<T>,
    ) -> RepoResult<Option<T>> {
        if self.store.staging() {
            return Err(RepoError::TransactionActive);
        }

        self.store.begin_staging().map_err(RepoError::from)?;

        let checkpoint = self.index.clone();

        match f(self) {
            Ok(value) => {
                self.store.commit_staging()?;
                self.index.persist();
                Ok(Some(value))
            }
            Err(RepoError::TransactionAborted) => {
                self.rollback(checkpoint)?;
                Ok(None)
            }
            Err(e) => {
                self.rollback(checkpoint)?;
                Err(e)
            }
        }
    }

    fn rollback(&mut self, checkpoint: Index) -> RepoResult<()> {
        self.store.abort_staging()?;
        self.index = checkpoint;
        self.index.persist();

        debug!(last_id = self.store.last_id(), "Transaction rolled back");

        Ok(())
    }

    // ------------------------------------------------------------------
    // Internals.
    // ------------------------------------------------------------------

    fn require_otu(&mut self, otu_id: Uuid) -> RepoResult<Otu> {
        self.get_otu(otu_id)?
            .ok_or(RepoError::OtuNotFound { otu_id })
    }

    /// Append an event and index it. The event is durable before the index
    /// is touched, so a crash between the two leaves the index
    /// reconstructible by full replay.
    fn write_event(&mut self, body: EventBody) -> RepoResult<Event> {
        let event = self.store.write_event(body)?;

        if let Some(otu_id) = event.body.otu_id() {
            self.index.add_event_id(event.id, otu_id);
        }

        Ok(event)
    }

    fn rebuild_index(&mut self) -> RepoResult<()> {
        self.index.reset();

        let mut events_by_otu: IndexMap<Uuid, Vec<u64>> = IndexMap::new();

        for event in self.store.iter_events(1)? {
            let event = event?;

            if let Some(otu_id) = event.body.otu_id() {
                events_by_otu.entry(otu_id).or_default().push(event.id);
            }
        }

        for (otu_id, event_ids) in &events_by_otu {
            let otu = rehydrate(&self.store, event_ids)?;

            for &event_id in event_ids {
                self.index.add_event_id(event_id, *otu_id);
            }

            self.index.upsert_otu(&otu, self.store.last_id());
        }

        self.index.record_last_id(self.store.last_id());
        self.index.persist();

        Ok(())
    }
}

/// Replay an OTU's event sequence into an aggregate.
///
/// The first event must be the OTU's creation event. Any event that fails to
/// apply aborts reconstruction with a fatal error naming the offending event
/// id. The result is put into canonical order, which is stable and
/// reproducible from the same event sequence.
fn rehydrate(store: &EventStore, event_ids: &[u64]) -> RepoResult<Otu> {
    let Some(&first_id) = event_ids.first() else {
        return Err(RepoError::FirstEventNotCreate { event_id: 0 });
    };

    let first = store.read_event(first_id)?;

    let mut otu = first
        .body
        .init_otu()
        .ok_or(RepoError::FirstEventNotCreate { event_id: first_id })?;

    for &event_id in &event_ids[1..] {
        let event = store.read_event(event_id)?;

        otu = event
            .body
            .apply(otu)
            .map_err(|e| RepoError::EventNotApplicable {
                event_id,
                reason: e.to_string(),
            })?;
    }

    otu.sort_canonical();

    Ok(otu)
}
