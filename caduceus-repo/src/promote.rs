//! RefSeq accession promotion
//!
//! When NCBI supersedes a submitted accession with a curated RefSeq record,
//! the predecessor must be replaced everywhere it is linked without ever
//! leaving an isolate pointing at a dangling or duplicate sequence. The
//! multi-event relink runs inside one transaction scope; any failure rolls
//! the OTU back to exactly its prior state.

use std::collections::BTreeSet;
use std::fmt;

use tracing::{debug, error, info};
use uuid::Uuid;

use caduceus_core::{Plan, Segment};
use caduceus_ncbi::{parse_refseq_comment, AccessionFilter, GenbankRecord, RecordSource};

use crate::error::{RepoError, RepoResult};
use crate::otu::Sequence;
use crate::repo::{abort, Repo};

/// Standard rationales recorded on sequence deletion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteRationale {
    User,
    RefSeq,
}

impl fmt::Display for DeleteRationale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "Requested by user"),
            Self::RefSeq => write!(f, "Superceded by RefSeq"),
        }
    }
}

/// The lowest conforming sequence length across segments.
pub fn segments_min_length(segments: &[Segment]) -> u32 {
    segments
        .iter()
        .map(|segment| segment.length_window().0)
        .min()
        .unwrap_or(0)
}

/// The highest conforming sequence length across segments.
pub fn segments_max_length(segments: &[Segment]) -> u32 {
    segments
        .iter()
        .map(|segment| segment.length_window().1)
        .max()
        .unwrap_or(0)
}

/// Determine the plan segment a record fills.
///
/// A monopartite plan takes every record on its single segment. Multipartite
/// plans match the record's source segment name against the plan's segment
/// names.
pub fn assign_segment_id_to_record(record: &GenbankRecord, plan: &Plan) -> Option<Uuid> {
    if plan.monopartite() {
        return Some(plan.segments[0].id);
    }

    plan.get_segment_by_name(record.source.segment.as_deref()?)
        .map(|segment| segment.id)
}

/// Fetch new accessions from the record source and promote accessions with
/// newly added RefSeq equivalents.
///
/// Returns the keys of the promoted accessions.
pub fn promote_otu_accessions(
    repo: &mut Repo,
    source: &dyn RecordSource,
    otu_id: Uuid,
) -> RepoResult<BTreeSet<String>> {
    let otu = repo
        .get_otu(otu_id)?
        .ok_or(RepoError::OtuNotFound { otu_id })?;

    info!(%otu_id, taxid = otu.taxid, "Checking for promotable sequences");

    let accessions = source.fetch_accessions_by_taxid(
        otu.taxid,
        &AccessionFilter {
            sequence_min_length: Some(segments_min_length(&otu.plan.segments)),
            sequence_max_length: Some(segments_max_length(&otu.plan.segments)),
            refseq_only: true,
            ..AccessionFilter::default()
        },
    )?;

    let blocked = otu.blocked_accessions();

    let fetch_set: Vec<String> = accessions
        .iter()
        .map(|accession| accession.key.clone())
        .filter(|key| !blocked.contains(key))
        .collect();

    if fetch_set.is_empty() {
        info!("Records are already up to date");
        return Ok(BTreeSet::new());
    }

    debug!(fetch_list = ?fetch_set, "New accessions found. Checking for promotable records");

    let records = source.fetch_genbank_records(&fetch_set)?;

    let promoted = promote_otu_accessions_from_records(repo, otu_id, &records)?;

    if promoted.is_empty() {
        info!("Records are already up to date");
    }

    Ok(promoted)
}

/// Check records against the contents of an OTU for promotable RefSeq
/// sequences and replace every predecessor found.
///
/// Returns the keys of the promoted accessions.
pub fn promote_otu_accessions_from_records(
    repo: &mut Repo,
    otu_id: Uuid,
    records: &[GenbankRecord],
) -> RepoResult<BTreeSet<String>> {
    let otu = repo
        .get_otu(otu_id)?
        .ok_or(RepoError::OtuNotFound { otu_id })?;

    let accessions = otu.accessions();

    let mut replacements: Vec<(Uuid, &GenbankRecord)> = Vec::new();

    for record in records.iter().filter(|record| record.refseq()) {
        let predecessor = match parse_refseq_comment(&record.comment) {
            Ok((_, predecessor)) => predecessor,
            Err(e) => {
                debug!(
                    accession = record.accession_version(),
                    error = %e,
                    "Skipping record without a parseable RefSeq comment"
                );
                continue;
            }
        };

        if accessions.contains(&predecessor) {
            debug!(
                predecessor_accession = predecessor,
                promoted_accession = record.accession,
                "Replaceable accession found"
            );

            // The predecessor key is present, so the sequence exists.
            if let Some(sequence) = otu.get_sequence_by_accession(&predecessor) {
                replacements.push((sequence.id, record));
            }
        }
    }

    let mut promoted = BTreeSet::new();

    for (sequence_id, record) in replacements {
        if let Some(sequence) =
            replace_otu_sequence_from_record(repo, otu_id, sequence_id, record, true)?
        {
            promoted.insert(sequence.accession.key.clone());
        }
    }

    if !promoted.is_empty() {
        info!(new_accessions = ?promoted, "Sequences promoted");
    }

    Ok(promoted)
}

/// Replace the sequence with `sequence_id` by a new sequence built from
/// `record`, in the isolate that links it.
///
/// Runs as one transaction: either the isolate ends up linked to the
/// replacement and the predecessor is deleted (and optionally excluded), or
/// the OTU is left exactly as it was. Returns `Ok(None)` when the
/// predecessor is not linked anywhere or the transaction was aborted.
pub fn replace_otu_sequence_from_record(
    repo: &mut Repo,
    otu_id: Uuid,
    sequence_id: Uuid,
    record: &GenbankRecord,
    exclude_accession: bool,
) -> RepoResult<Option<Sequence>> {
    let otu = repo
        .get_otu(otu_id)?
        .ok_or(RepoError::OtuNotFound { otu_id })?;

    let predecessor = otu
        .get_sequence_by_id(&sequence_id)
        .ok_or(RepoError::SequenceNotFound { sequence_id })?
        .clone();

    // A sequence is owned by exactly one isolate, so there is at most one
    // containing isolate to relink.
    let Some(isolate_id) = otu
        .isolates_containing_sequence(&sequence_id)
        .first()
        .copied()
    else {
        info!(%sequence_id, "Sequence not linked to any isolate");
        return Ok(None);
    };

    debug!(
        replaceable_sequence = %sequence_id,
        %isolate_id,
        "Isolate containing sequence found"
    );

    let segment_id = assign_segment_id_to_record(record, &otu.plan).ok_or_else(|| {
        RepoError::NoMatchingSegment {
            segment: record.source.segment.clone(),
        }
    })?;

    let versioned_accession = record.versioned_accession();

    let replacement_id = repo.use_transaction(|repo| {
        let otu = repo
            .get_otu(otu_id)?
            .ok_or(RepoError::OtuNotFound { otu_id })?;

        let replacement_id = if otu.versioned_accessions().contains(&versioned_accession) {
            info!(accession = record.accession, "Reusing extant sequence");

            match otu.get_sequence_by_accession(&record.accession) {
                Some(sequence) => sequence.id,
                None => {
                    error!("Extant replacement sequence could not be retrieved");
                    return abort();
                }
            }
        } else {
            match repo.create_sequence(
                otu_id,
                &record.accession_version(),
                &record.definition,
                None,
                segment_id,
                &record.sequence,
            )? {
                Some(sequence) => sequence.id,
                None => {
                    error!("Replacement sequence could not be created");
                    return abort();
                }
            }
        };

        repo.replace_sequence(
            otu_id,
            isolate_id,
            replacement_id,
            sequence_id,
            &DeleteRationale::RefSeq.to_string(),
        )?;

        if exclude_accession {
            repo.exclude_accession(otu_id, &predecessor.accession.key)?;
        }

        Ok(replacement_id)
    })?;

    match replacement_id {
        Some(replacement_id) => Ok(repo
            .get_otu(otu_id)?
            .and_then(|otu| otu.get_sequence_by_id(&replacement_id).cloned())),
        None => Ok(None),
    }
}
