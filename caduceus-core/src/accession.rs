//! Versioned GenBank accessions

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

static ACCESSION_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]+$").unwrap());

/// A versioned GenBank accession.
///
/// The string form is `KEY.VERSION` (eg. `NC_055390.1`). Accessions are
/// totally ordered by `(key, version)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Accession {
    /// The unversioned accession key (eg. `NC_055390`).
    pub key: String,

    /// The version number. Always positive.
    pub version: u32,
}

impl Accession {
    /// Build an accession from an already-validated key and version.
    pub fn new(key: impl Into<String>, version: u32) -> Self {
        Self {
            key: key.into(),
            version,
        }
    }
}

impl fmt::Display for Accession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.key, self.version)
    }
}

impl FromStr for Accession {
    type Err = CoreError;

    fn from_str(s: &str) -> CoreResult<Self> {
        let (key, version) = s
            .split_once('.')
            .ok_or_else(|| CoreError::InvalidAccession(format!("no version in '{s}'")))?;

        if !ACCESSION_KEY.is_match(key) {
            return Err(CoreError::InvalidAccession(format!("bad key in '{s}'")));
        }

        let version: u32 = version
            .parse()
            .map_err(|_| CoreError::InvalidAccession(format!("bad version in '{s}'")))?;

        if version == 0 {
            return Err(CoreError::InvalidAccession(format!(
                "version must be positive in '{s}'"
            )));
        }

        Ok(Self {
            key: key.to_string(),
            version,
        })
    }
}

impl Ord for Accession {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key
            .cmp(&other.key)
            .then(self.version.cmp(&other.version))
    }
}

impl PartialOrd for Accession {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Extract the validated accession key from a raw string.
///
/// Accepts both versioned (`TM100021.1`) and unversioned (`TM100021`) forms.
pub fn parse_accession_key(raw: &str) -> CoreResult<String> {
    let key = match raw.split_once('.') {
        Some((key, version)) => {
            version
                .parse::<u32>()
                .map_err(|_| CoreError::InvalidAccession(format!("bad version in '{raw}'")))?;
            key
        }
        None => raw,
    };

    if !ACCESSION_KEY.is_match(key) {
        return Err(CoreError::InvalidAccession(format!("bad key in '{raw}'")));
    }

    Ok(key.to_string())
}
