//! Repository-level event payloads

use caduceus_core::{DataType, RepoSettings};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The data for a `CreateRepo` event.
///
/// This is the root event of every repository and always carries event id 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateRepoData {
    pub id: Uuid,
    pub data_type: DataType,
    pub name: String,
    pub organism: String,
    pub settings: RepoSettings,
}
