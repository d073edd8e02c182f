//! Error types for the NCBI collaborator surface

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NcbiError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid RefSeq comment: {0}")]
    InvalidComment(String),

    #[error("Source error: {0}")]
    Source(String),
}

pub type NcbiResult<T> = Result<T, NcbiError>;
