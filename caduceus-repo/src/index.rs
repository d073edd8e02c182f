//! The secondary index
//!
//! Derived, rebuildable state: per-OTU event-id lists, minimal projections
//! for listing, and reverse maps from taxid, name, and legacy id to OTU id.
//! The index is never the source of truth for aggregate content — only for
//! locating and ordering the events that produce it.
//!
//! A MessagePack snapshot is persisted write-through at
//! `<repo>/.cache/index.bin`. A missing, unreadable, version-mismatched, or
//! stale snapshot (its recorded `last_id` differs from the log's) is simply
//! discarded; the repository then rebuilds the index by full replay. Deleting
//! the cache directory is always safe.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use caduceus_core::OtuMinimal;

use crate::otu::Otu;

const SNAPSHOT_VERSION: u32 = 1;
const SNAPSHOT_FILE: &str = "index.bin";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    /// The minimal projection. `None` for an OTU whose creation event has
    /// been indexed but whose aggregate has not been read yet.
    minimal: Option<OtuMinimal>,

    legacy_id: Option<String>,

    /// The log `last_id` at the time the projection was refreshed.
    at_event_id: u64,

    /// Ids of the events contributing to this OTU, ascending.
    event_ids: Vec<u64>,
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    last_id: u64,
    entries: IndexMap<Uuid, IndexEntry>,
}

/// Index for fast lookup of OTUs by key fields and of the events associated
/// with a given OTU id
#[derive(Debug, Clone)]
pub struct Index {
    path: PathBuf,
    last_id: u64,
    entries: IndexMap<Uuid, IndexEntry>,
    by_taxid: HashMap<u32, Uuid>,
    by_name: HashMap<String, Uuid>,
    by_legacy_id: HashMap<String, Uuid>,
}

impl Index {
    /// Load the index snapshot from `cache_dir`, or return an empty index
    /// when no usable snapshot exists.
    ///
    /// `store_last_id` is the event log's current `last_id`; a snapshot that
    /// does not match it exactly is stale and discarded.
    pub fn load(cache_dir: impl Into<PathBuf>, store_last_id: u64) -> Self {
        let cache_dir = cache_dir.into();

        let mut index = Self {
            path: cache_dir.join(SNAPSHOT_FILE),
            last_id: 0,
            entries: IndexMap::new(),
            by_taxid: HashMap::new(),
            by_name: HashMap::new(),
            by_legacy_id: HashMap::new(),
        };

        let bytes = match fs::read(&index.path) {
            Ok(bytes) => bytes,
            Err(_) => return index,
        };

        let snapshot: Snapshot = match rmp_serde::from_slice(&bytes) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "Discarding unreadable index snapshot");
                return index;
            }
        };

        if snapshot.version != SNAPSHOT_VERSION || snapshot.last_id != store_last_id {
            return index;
        }

        index.last_id = snapshot.last_id;
        index.entries = snapshot.entries;

        // Reverse maps are derived caches, recomputed on load.
        for (otu_id, entry) in &index.entries {
            if let Some(minimal) = &entry.minimal {
                index.by_taxid.insert(minimal.taxid, *otu_id);
                index.by_name.insert(minimal.name.clone(), *otu_id);
            }

            if let Some(legacy_id) = &entry.legacy_id {
                index.by_legacy_id.insert(legacy_id.clone(), *otu_id);
            }
        }

        index
    }

    /// The log `last_id` this index reflects.
    pub fn last_id(&self) -> u64 {
        self.last_id
    }

    /// Record that the index is current up to `last_id` even though no
    /// indexed event advanced it (used after a rebuild).
    pub fn record_last_id(&mut self, last_id: u64) {
        self.last_id = self.last_id.max(last_id);
    }

    /// Insert or refresh the projection and reverse mappings for an OTU.
    pub fn upsert_otu(&mut self, otu: &Otu, at_event_id: u64) {
        let entry = self.entries.entry(otu.id).or_insert_with(|| IndexEntry {
            minimal: None,
            legacy_id: None,
            at_event_id: 0,
            event_ids: Vec::new(),
        });

        entry.minimal = Some(OtuMinimal {
            id: otu.id,
            name: otu.name.clone(),
            acronym: otu.acronym.clone(),
            taxid: otu.taxid,
        });
        entry.legacy_id = otu.legacy_id.clone();
        entry.at_event_id = at_event_id;

        self.by_taxid.insert(otu.taxid, otu.id);
        self.by_name.insert(otu.name.clone(), otu.id);

        if let Some(legacy_id) = &otu.legacy_id {
            self.by_legacy_id.insert(legacy_id.clone(), otu.id);
        }

        self.record_last_id(at_event_id);
        self.save();
    }

    /// Associate an event id with an OTU.
    pub fn add_event_id(&mut self, event_id: u64, otu_id: Uuid) {
        let entry = self.entries.entry(otu_id).or_insert_with(|| IndexEntry {
            minimal: None,
            legacy_id: None,
            at_event_id: 0,
            event_ids: Vec::new(),
        });

        entry.event_ids.push(event_id);

        self.record_last_id(event_id);
        self.save();
    }

    /// The ids of the events contributing to an OTU, ascending.
    pub fn get_event_ids(&self, otu_id: &Uuid) -> Option<Vec<u64>> {
        self.entries.get(otu_id).map(|entry| entry.event_ids.clone())
    }

    pub fn get_id_by_taxid(&self, taxid: u32) -> Option<Uuid> {
        self.by_taxid.get(&taxid).copied()
    }

    pub fn get_id_by_name(&self, name: &str) -> Option<Uuid> {
        self.by_name.get(name).copied()
    }

    pub fn get_id_by_legacy_id(&self, legacy_id: &str) -> Option<Uuid> {
        self.by_legacy_id.get(legacy_id).copied()
    }

    /// All indexed OTU ids, in first-indexed order.
    pub fn otu_ids(&self) -> Vec<Uuid> {
        self.entries.keys().copied().collect()
    }

    /// Iterate the cached minimal projections.
    pub fn iter_minimal(&self) -> impl Iterator<Item = &OtuMinimal> {
        self.entries.values().filter_map(|entry| entry.minimal.as_ref())
    }

    /// Drop all derived state ahead of a rebuild.
    pub(crate) fn reset(&mut self) {
        self.last_id = 0;
        self.entries.clear();
        self.by_taxid.clear();
        self.by_name.clear();
        self.by_legacy_id.clear();
    }

    /// Persist the snapshot now.
    pub(crate) fn persist(&self) {
        self.save();
    }

    /// Persist the snapshot. Failures are logged and otherwise ignored: the
    /// snapshot is a disposable cache and full replay remains the recovery
    /// path.
    fn save(&self) {
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            last_id: self.last_id,
            entries: self.entries.clone(),
        };

        let result = self
            .path
            .parent()
            .map(fs::create_dir_all)
            .unwrap_or(Ok(()))
            .and_then(|_| {
                let bytes = rmp_serde::to_vec(&snapshot)
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
                fs::write(&self.path, bytes)
            });

        if let Err(e) = result {
            warn!(error = %e, "Failed to persist index snapshot");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caduceus_core::{MolType, Molecule, Plan, Segment, Strandedness, Topology};
    use tempfile::TempDir;

    fn otu(taxid: u32, name: &str, legacy_id: Option<&str>) -> Otu {
        Otu::new(
            Uuid::new_v4(),
            "TMV".to_string(),
            legacy_id.map(String::from),
            Molecule {
                strandedness: Strandedness::Single,
                kind: MolType::Rna,
                topology: Topology::Linear,
            },
            name.to_string(),
            Plan::new(vec![Segment::new(150, 0.03, None).unwrap()]).unwrap(),
            taxid,
        )
    }

    #[test]
    fn test_lookup_after_upsert() {
        let dir = TempDir::new().unwrap();
        let mut index = Index::load(dir.path().join(".cache"), 0);

        let otu = otu(12242, "Tobacco mosaic virus", Some("abcd1234"));

        index.add_event_id(2, otu.id);
        index.upsert_otu(&otu, 2);

        assert_eq!(index.get_id_by_taxid(12242), Some(otu.id));
        assert_eq!(index.get_id_by_name("Tobacco mosaic virus"), Some(otu.id));
        assert_eq!(index.get_id_by_legacy_id("abcd1234"), Some(otu.id));
        assert_eq!(index.get_event_ids(&otu.id), Some(vec![2]));
        assert_eq!(index.otu_ids(), vec![otu.id]);
    }

    #[test]
    fn test_snapshot_round_trip() {
        let dir = TempDir::new().unwrap();
        let cache = dir.path().join(".cache");

        let otu = otu(12242, "Tobacco mosaic virus", None);

        {
            let mut index = Index::load(&cache, 0);
            index.add_event_id(2, otu.id);
            index.upsert_otu(&otu, 2);
        }

        let reloaded = Index::load(&cache, 2);

        assert_eq!(reloaded.last_id(), 2);
        assert_eq!(reloaded.get_id_by_taxid(12242), Some(otu.id));
        assert_eq!(reloaded.iter_minimal().count(), 1);
    }

    #[test]
    fn test_stale_snapshot_discarded() {
        let dir = TempDir::new().unwrap();
        let cache = dir.path().join(".cache");

        let otu = otu(12242, "Tobacco mosaic virus", None);

        {
            let mut index = Index::load(&cache, 0);
            index.add_event_id(2, otu.id);
            index.upsert_otu(&otu, 2);
        }

        // The log has moved past the snapshot, so it must not be used.
        let reloaded = Index::load(&cache, 5);

        assert_eq!(reloaded.last_id(), 0);
        assert!(reloaded.otu_ids().is_empty());
    }

    #[test]
    fn test_corrupt_snapshot_discarded() {
        let dir = TempDir::new().unwrap();
        let cache = dir.path().join(".cache");

        fs::create_dir_all(&cache).unwrap();
        fs::write(cache.join(SNAPSHOT_FILE), b"not msgpack").unwrap();

        let index = Index::load(&cache, 3);

        assert_eq!(index.last_id(), 0);
        assert!(index.otu_ids().is_empty());
    }
}
