//! File-backed cache for fetched NCBI responses
//!
//! Stores opaque response payloads keyed by `(accession, version)` or taxid.
//! The cache root is passed in explicitly and its lifecycle belongs to the
//! caller; a miss is `Ok(None)`, never an error.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::error::NcbiResult;

/// On-disk cache for NCBI Nucleotide and Taxonomy responses
pub struct NcbiCache {
    path: PathBuf,
    genbank_path: PathBuf,
    taxonomy_path: PathBuf,
}

impl NcbiCache {
    /// Open (or create) a cache rooted at `path`.
    pub fn new(path: impl Into<PathBuf>) -> NcbiResult<Self> {
        let path = path.into();

        let genbank_path = path.join("genbank");
        let taxonomy_path = path.join("taxonomy");

        fs::create_dir_all(&genbank_path)?;
        fs::create_dir_all(&taxonomy_path)?;

        Ok(Self {
            path,
            genbank_path,
            taxonomy_path,
        })
    }

    /// Delete all cached responses and reset the cache directories.
    pub fn clear(&self) -> NcbiResult<()> {
        fs::remove_dir_all(&self.path)?;

        fs::create_dir_all(&self.genbank_path)?;
        fs::create_dir_all(&self.taxonomy_path)?;

        Ok(())
    }

    /// Cache a GenBank record payload under `(accession, version)`.
    pub fn cache_genbank_record(
        &self,
        data: &Value,
        accession: &str,
        version: u32,
    ) -> NcbiResult<()> {
        let path = self.genbank_record_path(accession, version);

        fs::write(&path, serde_json::to_vec(data)?)?;

        debug!(accession, version, "Cached GenBank record");

        Ok(())
    }

    /// Load a cached GenBank record payload.
    ///
    /// With `version = None`, the highest cached version for the accession is
    /// returned. A miss is `Ok(None)`.
    pub fn load_genbank_record(
        &self,
        accession: &str,
        version: Option<u32>,
    ) -> NcbiResult<Option<Value>> {
        let path = match version {
            Some(version) => self.genbank_record_path(accession, version),
            None => match self.latest_genbank_version(accession)? {
                Some(version) => self.genbank_record_path(accession, version),
                None => return Ok(None),
            },
        };

        read_json_if_present(&path)
    }

    /// Cache a taxonomy record payload under `taxid`.
    pub fn cache_taxonomy_record(&self, data: &Value, taxid: u32) -> NcbiResult<()> {
        let path = self.taxonomy_record_path(taxid);

        fs::write(&path, serde_json::to_vec(data)?)?;

        debug!(taxid, "Cached taxonomy record");

        Ok(())
    }

    /// Load a cached taxonomy record payload. A miss is `Ok(None)`.
    pub fn load_taxonomy_record(&self, taxid: u32) -> NcbiResult<Option<Value>> {
        read_json_if_present(&self.taxonomy_record_path(taxid))
    }

    fn genbank_record_path(&self, accession: &str, version: u32) -> PathBuf {
        self.genbank_path.join(format!("{accession}_{version}.json"))
    }

    fn taxonomy_record_path(&self, taxid: u32) -> PathBuf {
        self.taxonomy_path.join(format!("{taxid}.json"))
    }

    /// The highest version number cached for an accession, if any.
    fn latest_genbank_version(&self, accession: &str) -> NcbiResult<Option<u32>> {
        let prefix = format!("{accession}_");

        let mut latest = None;

        for entry in fs::read_dir(&self.genbank_path)? {
            let entry = entry?;

            let name = entry.file_name();
            let name = name.to_string_lossy();

            let Some(rest) = name.strip_prefix(&prefix) else {
                continue;
            };

            let Some(version) = rest.strip_suffix(".json") else {
                continue;
            };

            if let Ok(version) = version.parse::<u32>() {
                if latest.map_or(true, |v| version > v) {
                    latest = Some(version);
                }
            }
        }

        Ok(latest)
    }
}

fn read_json_if_present(path: &Path) -> NcbiResult<Option<Value>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
