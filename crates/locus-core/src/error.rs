//! Error types for the Locus data model.

use thiserror::Error;

/// Errors raised while reading a Locus from its JSON form.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocusError {
    #[error("Not a locus object: {0}")]
    InvalidLocus(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for LocusError {
    fn from(err: serde_json::Error) -> Self {
        LocusError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LocusError>;
