//! Repository-level models and projections

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of data a reference repository curates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Genome,
    Barcode,
}

/// A minimal OTU projection for listing without full replay
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtuMinimal {
    pub id: Uuid,
    pub name: String,
    pub acronym: String,
    pub taxid: u32,
}

/// Metadata for a reference repository, fixed at creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoMeta {
    /// The repository id.
    pub id: Uuid,

    /// When the repository was created.
    pub created_at: DateTime<Utc>,

    /// The repository data type.
    pub data_type: DataType,

    /// The repository name.
    pub name: String,

    /// The organism the repository curates.
    pub organism: String,
}

/// Repository-wide default settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoSettings {
    /// The deviation a sequence is allowed from its plan segment's length
    /// before it fails validation.
    pub default_segment_length_tolerance: f64,
}

impl Default for RepoSettings {
    fn default() -> Self {
        Self {
            default_segment_length_tolerance: 0.03,
        }
    }
}
