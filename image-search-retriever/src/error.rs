//! Error taxonomy shared by the workflows and the boundary API

use image_search_embed::EmbedError;
use serde::Serialize;
use std::path::PathBuf;

/// Result type for the search workflows.
pub type Result<T> = std::result::Result<T, SearchError>;

/// Serializable tag of a [`SearchError`], as it appears in API envelopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    DecodeError,
    ModelError,
    InvalidFolder,
    NotFound,
    FileMissing,
    NotReady,
    StoreError,
    IndexInProgress,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::DecodeError => "DecodeError",
            ErrorKind::ModelError => "ModelError",
            ErrorKind::InvalidFolder => "InvalidFolder",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::FileMissing => "FileMissing",
            ErrorKind::NotReady => "NotReady",
            ErrorKind::StoreError => "StoreError",
            ErrorKind::IndexInProgress => "IndexInProgress",
        };
        f.write_str(name)
    }
}

/// Everything that can make a search operation fail as a whole.
///
/// Per-file problems during indexing and per-hit problems during a query are
/// not errors; they are counted or annotated in the result instead.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// The uploaded payload or a file's bytes are not a decodable image
    #[error("Could not decode image: {message}")]
    Decode { message: String },

    /// The embedding model failed or could not be loaded
    #[error("Embedding model error: {source}")]
    Model {
        #[source]
        source: EmbedError,
    },

    #[error("Not a readable directory: {}", path.display())]
    InvalidFolder { path: PathBuf },

    #[error("Image not found: {id}")]
    NotFound { id: String },

    /// The record exists but its source file is gone
    #[error("Original file no longer exists: {}", path.display())]
    FileMissing { path: PathBuf },

    #[error("Image database is not ready")]
    NotReady,

    #[error("Indexing is in progress, try again when it finishes")]
    IndexInProgress,

    #[error("Store error: {source:#}")]
    Store {
        #[source]
        source: anyhow::Error,
    },
}

impl SearchError {
    pub fn decode<S: Into<String>>(message: S) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    pub fn store<E: Into<anyhow::Error>>(source: E) -> Self {
        Self::Store {
            source: source.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SearchError::Decode { .. } => ErrorKind::DecodeError,
            SearchError::Model { .. } => ErrorKind::ModelError,
            SearchError::InvalidFolder { .. } => ErrorKind::InvalidFolder,
            SearchError::NotFound { .. } => ErrorKind::NotFound,
            SearchError::FileMissing { .. } => ErrorKind::FileMissing,
            SearchError::NotReady => ErrorKind::NotReady,
            SearchError::IndexInProgress => ErrorKind::IndexInProgress,
            SearchError::Store { .. } => ErrorKind::StoreError,
        }
    }
}

impl From<EmbedError> for SearchError {
    fn from(err: EmbedError) -> Self {
        if err.is_decode_error() {
            SearchError::decode(err.to_string())
        } else {
            SearchError::Model { source: err }
        }
    }
}
